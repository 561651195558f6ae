use conflux_core::types::{
    DataRef, JobDescriptor, ResourceDescriptor, ResourceKind, TaskDescriptor,
};
use uuid::Uuid;

use crate::ResourceMap;

pub fn make_test_job(num_tasks: u64) -> JobDescriptor {
    let mut job = JobDescriptor::new(Uuid::new_v4(), "test-job");
    for i in 0..num_tasks {
        job.tasks.push(TaskDescriptor::new(i + 1, job.id, "worker"));
    }
    job
}

pub fn make_task_with_inputs(id: u64, inputs: &[(&str, u64)]) -> TaskDescriptor {
    let mut task = TaskDescriptor::new(id, Uuid::new_v4(), "worker");
    task.inputs = inputs
        .iter()
        .map(|(path, size)| DataRef {
            path: path.to_string(),
            size_bytes: *size,
        })
        .collect();
    task
}

pub fn make_machine(name: &str, cached: &[&str]) -> ResourceDescriptor {
    let mut machine = ResourceDescriptor::new(Uuid::new_v4(), ResourceKind::Machine, name);
    machine.cached_paths = cached.iter().map(|p| p.to_string()).collect();
    machine
}

pub fn make_resource_map(machines: &[ResourceDescriptor]) -> ResourceMap {
    machines.iter().map(|m| (m.id, m.clone())).collect()
}
