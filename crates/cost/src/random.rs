use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use conflux_core::types::{
    EquivClassId, JobDescriptor, ResourceDescriptor, ResourceId, TaskDescriptor,
};

use crate::CostModel;

/// Placement costs fall in [0, MAX_PLACEMENT_COST).
const MAX_PLACEMENT_COST: i64 = 100;

/// Cost model assigning uniform random costs, seeded from the entities on
/// each arc so that repeated queries for the same arc agree. Useful as a
/// tie-breaking baseline when no real policy signal exists.
pub struct RandomCostModel;

impl RandomCostModel {
    pub fn new() -> Self {
        Self
    }

    fn draw(seed: u64) -> i64 {
        let mut rng = StdRng::seed_from_u64(seed);
        rng.gen_range(0..MAX_PLACEMENT_COST)
    }
}

impl Default for RandomCostModel {
    fn default() -> Self {
        Self::new()
    }
}

fn mix(a: u64, b: u64) -> u64 {
    a.wrapping_mul(0x9e3779b97f4a7c15).rotate_left(31) ^ b
}

fn id_seed(id: &ResourceId) -> u64 {
    let (hi, lo) = id.as_u64_pair();
    hi ^ lo
}

impl CostModel for RandomCostModel {
    fn name(&self) -> &str {
        "random"
    }

    fn task_to_unscheduled_cost(&self, task: &TaskDescriptor) -> i64 {
        // Above the placement range, so waiting never wins by chance.
        MAX_PLACEMENT_COST + Self::draw(mix(task.id, 1))
    }

    fn unscheduled_to_sink_cost(&self, _job: &JobDescriptor) -> i64 {
        0
    }

    fn task_to_resource_cost(&self, task: &TaskDescriptor, resource: &ResourceDescriptor) -> i64 {
        Self::draw(mix(task.id, id_seed(&resource.id)))
    }

    fn task_to_equiv_class_cost(&self, task: &TaskDescriptor, class: EquivClassId) -> i64 {
        Self::draw(mix(task.id, class))
    }

    fn equiv_class_to_resource_cost(
        &self,
        class: EquivClassId,
        resource: &ResourceDescriptor,
    ) -> i64 {
        Self::draw(mix(class, id_seed(&resource.id)))
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
