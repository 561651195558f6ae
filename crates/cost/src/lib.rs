pub mod quincy;
pub mod random;
pub mod sjf;
pub mod trivial;

#[cfg(test)]
pub(crate) mod tests_common;

use std::sync::{Arc, Mutex};

use conflux_core::config::CostModelKind;
use conflux_core::knowledge::KnowledgeBase;
use conflux_core::types::{
    EquivClassId, JobDescriptor, ResourceDescriptor, ResourceId, ResourceKind, TaskDescriptor,
};

pub use conflux_core::types::ResourceMap;

/// The built-in wildcard equivalence class, realised by the cluster
/// aggregator node: "this task can run on any machine".
pub const CLUSTER_AGG_EC: EquivClassId = 0;

/// Policy mapping domain state to arc costs in the flow graph.
///
/// Implementations must be pure: identical descriptors must always yield
/// identical costs within one process, so that re-costing an unchanged
/// graph produces no change entries.
pub trait CostModel: Send {
    /// Name of the cost model.
    fn name(&self) -> &str;

    /// Penalty for leaving the task unscheduled this round.
    fn task_to_unscheduled_cost(&self, task: &TaskDescriptor) -> i64;

    /// Flow-completion cost on the job's unscheduled aggregator.
    fn unscheduled_to_sink_cost(&self, job: &JobDescriptor) -> i64;

    /// Preference of a task for one specific machine.
    fn task_to_resource_cost(&self, task: &TaskDescriptor, resource: &ResourceDescriptor) -> i64;

    /// Cost of entering an equivalence class (the wildcard included).
    fn task_to_equiv_class_cost(&self, task: &TaskDescriptor, class: EquivClassId) -> i64;

    fn equiv_class_to_resource_cost(
        &self,
        class: EquivClassId,
        resource: &ResourceDescriptor,
    ) -> i64;

    fn resource_to_resource_cost(
        &self,
        parent: &ResourceDescriptor,
        child: &ResourceDescriptor,
    ) -> i64;

    fn leaf_to_sink_cost(&self, leaf: &ResourceDescriptor) -> i64;

    /// Cost of keeping an already-placed task where it runs.
    fn task_continuation_cost(&self, task: &TaskDescriptor) -> i64;

    /// Equivalence classes the task is wired to. The wildcard class must
    /// always be present so every task can reach the cluster aggregator.
    fn task_equiv_classes(&self, _task: &TaskDescriptor) -> Vec<EquivClassId> {
        vec![CLUSTER_AGG_EC]
    }

    /// Machines the task gets a direct preference arc to.
    fn preferred_resources(
        &self,
        _task: &TaskDescriptor,
        _resources: &ResourceMap,
    ) -> Vec<ResourceId> {
        Vec::new()
    }

    /// Machines wired below a non-wildcard equivalence class node.
    /// The default is every machine, in id order for stable arc creation.
    fn equiv_class_resources(
        &self,
        _class: EquivClassId,
        resources: &ResourceMap,
    ) -> Vec<ResourceId> {
        all_machines(resources)
    }
}

/// All machine ids in the map, sorted for deterministic wiring.
pub fn all_machines(resources: &ResourceMap) -> Vec<ResourceId> {
    let mut machines: Vec<ResourceId> = resources
        .values()
        .filter(|r| r.kind == ResourceKind::Machine)
        .map(|r| r.id)
        .collect();
    machines.sort();
    machines
}

/// Instantiate the configured cost model.
pub fn create_cost_model(
    kind: CostModelKind,
    knowledge: Arc<Mutex<KnowledgeBase>>,
) -> Box<dyn CostModel> {
    match kind {
        CostModelKind::Trivial => Box::new(trivial::TrivialCostModel::new()),
        CostModelKind::Random => Box::new(random::RandomCostModel::new()),
        CostModelKind::Sjf => Box::new(sjf::SjfCostModel::new(knowledge)),
        CostModelKind::Quincy => Box::new(quincy::QuincyCostModel::new()),
    }
}

pub use quincy::QuincyCostModel;
pub use random::RandomCostModel;
pub use sjf::SjfCostModel;
pub use trivial::TrivialCostModel;
