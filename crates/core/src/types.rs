use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type JobId = Uuid;
pub type ResourceId = Uuid;
pub type TaskId = u64;
pub type EquivClassId = u64;

/// Flat view of all registered resources, keyed by id.
pub type ResourceMap = std::collections::HashMap<ResourceId, ResourceDescriptor>;

/// All live jobs, keyed by id. Task descriptors live inside their job.
pub type JobMap = std::collections::HashMap<JobId, JobDescriptor>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Runnable,
    Assigned,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    /// Whether the task is eligible for placement in the next round.
    pub fn is_runnable(&self) -> bool {
        matches!(self, TaskState::Created | TaskState::Runnable)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobState {
    New,
    Running,
    Completed,
    Failed,
}

/// A data object a task reads, with enough detail to cost a transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRef {
    pub path: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub job_id: JobId,
    pub name: String,
    pub state: TaskState,
    /// Input objects, used by locality-aware cost models.
    #[serde(default)]
    pub inputs: Vec<DataRef>,
    /// Rounds this task has stayed runnable without being placed.
    #[serde(default)]
    pub rounds_unscheduled: u64,
}

impl TaskDescriptor {
    pub fn new(id: TaskId, job_id: JobId, name: impl Into<String>) -> Self {
        Self {
            id,
            job_id,
            name: name.into(),
            state: TaskState::Runnable,
            inputs: Vec::new(),
            rounds_unscheduled: 0,
        }
    }

    /// Equivalence class of this task: tasks with the same name are assumed
    /// to behave alike (same binary, same runtime profile).
    pub fn equivalence_class(&self) -> EquivClassId {
        fnv1a(self.name.as_bytes())
    }

    pub fn total_input_bytes(&self) -> u64 {
        self.inputs.iter().map(|d| d.size_bytes).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: JobId,
    pub name: String,
    pub state: JobState,
    pub tasks: Vec<TaskDescriptor>,
}

impl JobDescriptor {
    pub fn new(id: JobId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: JobState::New,
            tasks: Vec::new(),
        }
    }

    pub fn runnable_tasks(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.tasks.iter().filter(|t| t.state.is_runnable())
    }
}

/// Level of a node in the hardware topology tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Coordinator,
    Machine,
    NumaNode,
    Socket,
    Cache,
    Core,
    Pu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub name: String,
    /// Data object paths resident on this resource (machines only).
    #[serde(default)]
    pub cached_paths: Vec<String>,
}

impl ResourceDescriptor {
    pub fn new(id: ResourceId, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            cached_paths: Vec::new(),
        }
    }
}

/// A snapshot of a resource subtree, as delivered by a registration event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTopology {
    pub descriptor: ResourceDescriptor,
    pub children: Vec<ResourceTopology>,
}

impl ResourceTopology {
    pub fn leaf(descriptor: ResourceDescriptor) -> Self {
        Self {
            descriptor,
            children: Vec::new(),
        }
    }

    /// Number of PU leaves in this subtree.
    pub fn num_leaves(&self) -> u64 {
        if self.descriptor.kind == ResourceKind::Pu {
            1
        } else {
            self.children.iter().map(|c| c.num_leaves()).sum()
        }
    }

    /// Depth-first walk over all subtrees, parents first.
    pub fn for_each(&self, f: &mut impl FnMut(&ResourceTopology)) {
        f(self);
        for child in &self.children {
            child.for_each(f);
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

// --- Display implementations ---

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Created => write!(f, "created"),
            TaskState::Runnable => write!(f, "runnable"),
            TaskState::Assigned => write!(f, "assigned"),
            TaskState::Running => write!(f, "running"),
            TaskState::Completed => write!(f, "completed"),
            TaskState::Failed => write!(f, "failed"),
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::New => write!(f, "new"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Coordinator => write!(f, "coordinator"),
            ResourceKind::Machine => write!(f, "machine"),
            ResourceKind::NumaNode => write!(f, "numa"),
            ResourceKind::Socket => write!(f, "socket"),
            ResourceKind::Cache => write!(f, "cache"),
            ResourceKind::Core => write!(f, "core"),
            ResourceKind::Pu => write!(f, "pu"),
        }
    }
}
