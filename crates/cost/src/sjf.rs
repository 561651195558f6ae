use std::sync::{Arc, Mutex};

use tracing::debug;

use conflux_core::knowledge::KnowledgeBase;
use conflux_core::types::{
    EquivClassId, JobDescriptor, ResourceDescriptor, TaskDescriptor,
};

use crate::{CostModel, CLUSTER_AGG_EC};

/// Assumed runtime for classes with no completed samples yet.
const DEFAULT_ESTIMATE_MS: u64 = 60_000;

/// Estimates are clamped to one hour so ranks stay in a bounded band.
const MAX_ESTIMATE_MS: u64 = 3_600_000;

/// Extra cost for the wildcard class, so the per-class route is preferred
/// when both exist.
const WILDCARD_SURCHARGE: i64 = 10;

/// Shortest-job-first: tasks whose equivalence class has historically
/// finished quickly get cheaper placement arcs and win contended slots.
/// Runtime estimates come from the knowledge base fed by completions.
pub struct SjfCostModel {
    knowledge: Arc<Mutex<KnowledgeBase>>,
}

impl SjfCostModel {
    pub fn new(knowledge: Arc<Mutex<KnowledgeBase>>) -> Self {
        Self { knowledge }
    }

    /// Placement rank in [0, 3600]: seconds of estimated runtime.
    fn rank(&self, class: EquivClassId) -> i64 {
        let estimate_ms = self
            .knowledge
            .lock()
            .unwrap()
            .estimated_runtime_ms(class)
            .unwrap_or(DEFAULT_ESTIMATE_MS)
            .min(MAX_ESTIMATE_MS);
        (estimate_ms / 1000) as i64
    }
}

impl CostModel for SjfCostModel {
    fn name(&self) -> &str {
        "sjf"
    }

    fn task_to_unscheduled_cost(&self, task: &TaskDescriptor) -> i64 {
        // Above the maximum rank plus the wildcard surcharge.
        let cost = (MAX_ESTIMATE_MS / 1000) as i64 + WILDCARD_SURCHARGE + 1;
        debug!("SJF unscheduled cost for task {}: {}", task.id, cost);
        cost
    }

    fn unscheduled_to_sink_cost(&self, _job: &JobDescriptor) -> i64 {
        0
    }

    fn task_to_resource_cost(&self, task: &TaskDescriptor, _resource: &ResourceDescriptor) -> i64 {
        self.rank(task.equivalence_class())
    }

    fn task_to_equiv_class_cost(&self, task: &TaskDescriptor, class: EquivClassId) -> i64 {
        let rank = self.rank(task.equivalence_class());
        if class == CLUSTER_AGG_EC {
            rank + WILDCARD_SURCHARGE
        } else {
            rank
        }
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

    fn task_equiv_classes(&self, task: &TaskDescriptor) -> Vec<EquivClassId> {
        vec![CLUSTER_AGG_EC, task.equivalence_class()]
    }
}
