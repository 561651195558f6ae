use std::collections::{HashMap, HashSet};

use conflux_core::types::{EquivClassId, JobId, ResourceId, ResourceKind, TaskId};

use crate::arc::FlowArc;

/// Dense node id, assigned by the graph manager and never reused.
pub type NodeId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowNodeKind {
    RootTask,
    ScheduledTask,
    UnscheduledTask,
    JobAggregator,
    Sink,
    EquivalenceClass,
    Coordinator,
    Machine,
    NumaNode,
    Socket,
    Cache,
    Core,
    Pu,
}

impl FlowNodeKind {
    pub fn from_resource_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Coordinator => FlowNodeKind::Coordinator,
            ResourceKind::Machine => FlowNodeKind::Machine,
            ResourceKind::NumaNode => FlowNodeKind::NumaNode,
            ResourceKind::Socket => FlowNodeKind::Socket,
            ResourceKind::Cache => FlowNodeKind::Cache,
            ResourceKind::Core => FlowNodeKind::Core,
            ResourceKind::Pu => FlowNodeKind::Pu,
        }
    }
}

/// A node in the scheduling flow graph. Arcs are owned by their source
/// node's outgoing map; destinations only track the incoming id set.
#[derive(Debug)]
pub struct FlowNode {
    pub id: NodeId,
    pub excess: i64,
    pub kind: FlowNodeKind,
    pub job_id: Option<JobId>,
    pub resource_id: Option<ResourceId>,
    pub task_id: Option<TaskId>,
    pub equiv_class: Option<EquivClassId>,
    /// Free-form label for snapshot dumps.
    pub comment: String,
    pub outgoing: HashMap<NodeId, FlowArc>,
    pub incoming: HashSet<NodeId>,
    /// Scratch mark for graph traversals.
    pub visited: bool,
}

impl FlowNode {
    pub fn new(id: NodeId, kind: FlowNodeKind, excess: i64) -> Self {
        Self {
            id,
            excess,
            kind,
            job_id: None,
            resource_id: None,
            task_id: None,
            equiv_class: None,
            comment: String::new(),
            outgoing: HashMap::new(),
            incoming: HashSet::new(),
            visited: false,
        }
    }

    pub fn is_task_node(&self) -> bool {
        matches!(
            self.kind,
            FlowNodeKind::RootTask | FlowNodeKind::ScheduledTask | FlowNodeKind::UnscheduledTask
        )
    }

    pub fn is_resource_node(&self) -> bool {
        matches!(
            self.kind,
            FlowNodeKind::Coordinator
                | FlowNodeKind::Machine
                | FlowNodeKind::NumaNode
                | FlowNodeKind::Socket
                | FlowNodeKind::Cache
                | FlowNodeKind::Core
                | FlowNodeKind::Pu
        )
    }

    pub fn is_equivalence_class_node(&self) -> bool {
        self.kind == FlowNodeKind::EquivalenceClass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_predicates() {
        let task = FlowNode::new(3, FlowNodeKind::UnscheduledTask, 1);
        assert!(task.is_task_node());
        assert!(!task.is_resource_node());

        let pu = FlowNode::new(4, FlowNodeKind::Pu, 0);
        assert!(pu.is_resource_node());
        assert!(!pu.is_task_node());

        let ec = FlowNode::new(5, FlowNodeKind::EquivalenceClass, 0);
        assert!(ec.is_equivalence_class_node());
        assert!(!ec.is_resource_node());
    }

    #[test]
    fn resource_kind_mapping_covers_topology_levels() {
        assert_eq!(
            FlowNodeKind::from_resource_kind(ResourceKind::Machine),
            FlowNodeKind::Machine
        );
        assert_eq!(
            FlowNodeKind::from_resource_kind(ResourceKind::Pu),
            FlowNodeKind::Pu
        );
    }
}
