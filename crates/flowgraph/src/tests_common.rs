use conflux_core::types::{
    DataRef, JobDescriptor, JobMap, ResourceDescriptor, ResourceKind, ResourceMap,
    ResourceTopology, TaskDescriptor,
};
use uuid::Uuid;

/// A machine subtree: machine -> socket -> N cores -> one PU each.
pub fn make_machine_topology(name: &str, pus: usize) -> ResourceTopology {
    let machine = ResourceDescriptor::new(Uuid::new_v4(), ResourceKind::Machine, name);
    let socket = ResourceDescriptor::new(
        Uuid::new_v4(),
        ResourceKind::Socket,
        format!("{}-socket0", name),
    );
    let mut socket_topo = ResourceTopology::leaf(socket);
    for i in 0..pus {
        let core = ResourceDescriptor::new(
            Uuid::new_v4(),
            ResourceKind::Core,
            format!("{}-core{}", name, i),
        );
        let pu = ResourceDescriptor::new(
            Uuid::new_v4(),
            ResourceKind::Pu,
            format!("{}-pu{}", name, i),
        );
        let mut core_topo = ResourceTopology::leaf(core);
        core_topo.children.push(ResourceTopology::leaf(pu));
        socket_topo.children.push(core_topo);
    }
    let mut machine_topo = ResourceTopology::leaf(machine);
    machine_topo.children.push(socket_topo);
    machine_topo
}

/// A coordinator root holding the given machine subtrees.
pub fn make_cluster_topology(machines: Vec<ResourceTopology>) -> ResourceTopology {
    let root = ResourceDescriptor::new(Uuid::new_v4(), ResourceKind::Coordinator, "head");
    let mut topo = ResourceTopology::leaf(root);
    topo.children = machines;
    topo
}

pub fn resource_map_of(topology: &ResourceTopology) -> ResourceMap {
    let mut map = ResourceMap::new();
    topology.for_each(&mut |t| {
        map.insert(t.descriptor.id, t.descriptor.clone());
    });
    map
}

pub fn make_job(name: &str, num_tasks: u64) -> JobDescriptor {
    let mut job = JobDescriptor::new(Uuid::new_v4(), name);
    for i in 0..num_tasks {
        job.tasks
            .push(TaskDescriptor::new(i + 1, job.id, format!("{}-t{}", name, i)));
    }
    job
}

pub fn job_map_of(jobs: &[JobDescriptor]) -> JobMap {
    jobs.iter().map(|j| (j.id, j.clone())).collect()
}

pub fn with_inputs(mut task: TaskDescriptor, inputs: &[(&str, u64)]) -> TaskDescriptor {
    task.inputs = inputs
        .iter()
        .map(|(path, size)| DataRef {
            path: path.to_string(),
            size_bytes: *size,
        })
        .collect();
    task
}
