use tracing::debug;

use conflux_core::types::{
    EquivClassId, JobDescriptor, ResourceDescriptor, ResourceId, ResourceKind, TaskDescriptor,
};

use crate::{CostModel, ResourceMap, CLUSTER_AGG_EC};

/// One cost unit per MiB of data that would have to move.
const BYTES_PER_COST_UNIT: u64 = 1 << 20;

/// Base unscheduled penalty before the wait-time ramp kicks in.
const UNSCHEDULED_BASE: i64 = 100;

/// Each round spent waiting makes staying unscheduled this much worse.
const UNSCHEDULED_WAIT_FACTOR: i64 = 10;

/// Data-locality cost model in the Quincy mould: placing a task costs the
/// data it would have to fetch, so machines already holding its inputs win.
/// The penalty for waiting grows with each round a task sits unplaced,
/// which bounds starvation on congested clusters.
pub struct QuincyCostModel;

impl QuincyCostModel {
    pub fn new() -> Self {
        Self
    }

    /// Bytes of task input that are not resident on the machine.
    /// A cached path counts if it matches exactly or shares the input's
    /// directory prefix.
    fn missing_bytes(task: &TaskDescriptor, machine: &ResourceDescriptor) -> u64 {
        task.inputs
            .iter()
            .filter(|input| !Self::is_cached(&input.path, machine))
            .map(|input| input.size_bytes)
            .sum()
    }

    fn is_cached(path: &str, machine: &ResourceDescriptor) -> bool {
        if machine.cached_paths.iter().any(|c| c == path) {
            return true;
        }
        let prefix = path.rsplit_once('/').map(|(p, _)| p).unwrap_or(path);
        machine
            .cached_paths
            .iter()
            .any(|c| !prefix.is_empty() && c.starts_with(prefix))
    }

    fn transfer_units(bytes: u64) -> i64 {
        bytes.div_ceil(BYTES_PER_COST_UNIT) as i64
    }
}

impl Default for QuincyCostModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CostModel for QuincyCostModel {
    fn name(&self) -> &str {
        "quincy"
    }

    fn task_to_unscheduled_cost(&self, task: &TaskDescriptor) -> i64 {
        Self::transfer_units(task.total_input_bytes())
            + UNSCHEDULED_BASE
            + UNSCHEDULED_WAIT_FACTOR * task.rounds_unscheduled as i64
    }

    fn unscheduled_to_sink_cost(&self, _job: &JobDescriptor) -> i64 {
        0
    }

    fn task_to_resource_cost(&self, task: &TaskDescriptor, resource: &ResourceDescriptor) -> i64 {
        let cost = Self::transfer_units(Self::missing_bytes(task, resource));
        debug!(
            "Quincy cost for task {} on {}: {}",
            task.id, resource.name, cost
        );
        cost
    }

    fn task_to_equiv_class_cost(&self, task: &TaskDescriptor, _class: EquivClassId) -> i64 {
        // Entering the wildcard may land anywhere: price the worst case.
        Self::transfer_units(task.total_input_bytes())
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
        // Staying put moves nothing.
        0
    }

    fn preferred_resources(&self, task: &TaskDescriptor, resources: &ResourceMap) -> Vec<ResourceId> {
        let mut preferred: Vec<ResourceId> = resources
            .values()
            .filter(|r| r.kind == ResourceKind::Machine)
            .filter(|r| task.inputs.iter().any(|input| Self::is_cached(&input.path, r)))
            .map(|r| r.id)
            .collect();
        preferred.sort();
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_common::*;

    #[test]
    fn cached_machine_is_cheaper() {
        let model = QuincyCostModel::new();
        let task = make_task_with_inputs(1, &[("/data/part-0", 64 << 20)]);
        let with_data = make_machine("m1", &["/data/part-0"]);
        let without = make_machine("m2", &[]);

        assert_eq!(model.task_to_resource_cost(&task, &with_data), 0);
        assert_eq!(model.task_to_resource_cost(&task, &without), 64);
    }

    #[test]
    fn prefix_match_counts_as_cached() {
        let model = QuincyCostModel::new();
        let task = make_task_with_inputs(1, &[("/data/part-1", 8 << 20)]);
        let sibling = make_machine("m1", &["/data/part-0"]);

        assert_eq!(model.task_to_resource_cost(&task, &sibling), 0);
    }

    #[test]
    fn preferred_resources_are_machines_with_data() {
        let model = QuincyCostModel::new();
        let task = make_task_with_inputs(1, &[("/data/part-0", 1 << 20)]);
        let m1 = make_machine("m1", &["/data/part-0"]);
        let m2 = make_machine("m2", &["/other/blob"]);
        let resources = make_resource_map(&[m1.clone(), m2]);

        assert_eq!(model.preferred_resources(&task, &resources), vec![m1.id]);
    }

    #[test]
    fn unscheduled_penalty_grows_with_wait() {
        let model = QuincyCostModel::new();
        let mut task = make_task_with_inputs(1, &[("/data/part-0", 1 << 20)]);
        let fresh = model.task_to_unscheduled_cost(&task);
        task.rounds_unscheduled = 3;
        let waited = model.task_to_unscheduled_cost(&task);
        assert_eq!(waited - fresh, 3 * UNSCHEDULED_WAIT_FACTOR);
    }

    #[test]
    fn wildcard_prices_worst_case_transfer() {
        let model = QuincyCostModel::new();
        let task = make_task_with_inputs(1, &[("/data/a", 2 << 20), ("/data/b", 3 << 20)]);
        assert_eq!(model.task_to_equiv_class_cost(&task, CLUSTER_AGG_EC), 5);
    }
}
