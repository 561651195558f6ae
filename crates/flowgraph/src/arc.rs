use crate::node::NodeId;

/// Role an arc plays in the scheduling graph. The extractor and the bound
/// task bookkeeping key off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowArcKind {
    TaskToEquivClass,
    TaskToResource,
    TaskToUnscheduled,
    ResourceToResource,
    EquivClassToResource,
    Running,
    Other,
}

/// A directed arc with capacity bounds and a cost per unit of flow.
#[derive(Debug, Clone)]
pub struct FlowArc {
    pub src: NodeId,
    pub dst: NodeId,
    pub cap_lower: u64,
    pub cap_upper: u64,
    pub cost: i64,
    pub kind: FlowArcKind,
}

impl FlowArc {
    pub fn new(
        src: NodeId,
        dst: NodeId,
        cap_lower: u64,
        cap_upper: u64,
        cost: i64,
        kind: FlowArcKind,
    ) -> Self {
        debug_assert!(cap_lower <= cap_upper);
        Self {
            src,
            dst,
            cap_lower,
            cap_upper,
            cost,
            kind,
        }
    }
}
