use conflux_core::types::{EquivClassId, JobDescriptor, ResourceDescriptor, TaskDescriptor};

use crate::CostModel;

/// Cost of routing through an aggregate rather than a direct preference.
const AGGREGATE_COST: i64 = 2;

/// Fixed penalty for leaving a task unplaced. Any idle machine beats it.
const UNSCHEDULED_PENALTY: i64 = 5;

/// Cost model that treats all placements as equally good. Placement arcs
/// are free, so the solver packs tasks onto whatever capacity exists.
pub struct TrivialCostModel;

impl TrivialCostModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TrivialCostModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CostModel for TrivialCostModel {
    fn name(&self) -> &str {
        "trivial"
    }

    fn task_to_unscheduled_cost(&self, _task: &TaskDescriptor) -> i64 {
        UNSCHEDULED_PENALTY
    }

    fn unscheduled_to_sink_cost(&self, _job: &JobDescriptor) -> i64 {
        0
    }

    fn task_to_resource_cost(&self, _task: &TaskDescriptor, _resource: &ResourceDescriptor) -> i64 {
        0
    }

    fn task_to_equiv_class_cost(&self, _task: &TaskDescriptor, _class: EquivClassId) -> i64 {
        AGGREGATE_COST
    }

    fn equiv_class_to_resource_cost(
        &self,
        _class: EquivClassId,
        _resource: &ResourceDescriptor,
    ) -> i64 {
        0
    }

    fn resource_to_resource_cost(
        &self,
        _parent: &ResourceDescriptor,
        _child: &ResourceDescriptor,
    ) -> i64 {
        0
    }

    fn leaf_to_sink_cost(&self, _leaf: &ResourceDescriptor) -> i64 {
        0
    }

    fn task_continuation_cost(&self, _task: &TaskDescriptor) -> i64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_common::*;

    #[test]
    fn placement_is_always_cheaper_than_waiting() {
        let model = TrivialCostModel::new();
        let job = make_test_job(1);
        let task = &job.tasks[0];
        let machine = make_machine("m0", &[]);

        let via_aggregate = model.task_to_equiv_class_cost(task, crate::CLUSTER_AGG_EC)
            + model.equiv_class_to_resource_cost(crate::CLUSTER_AGG_EC, &machine)
            + model.leaf_to_sink_cost(&machine);
        let waiting =
            model.task_to_unscheduled_cost(task) + model.unscheduled_to_sink_cost(&job);

        assert!(via_aggregate < waiting);
    }
}
