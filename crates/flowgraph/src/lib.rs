pub mod arc;
pub mod changelog;
pub mod dimacs;
pub mod graph;
pub mod node;

#[cfg(test)]
pub(crate) mod tests_common;

pub use arc::{FlowArc, FlowArcKind};
pub use changelog::{ChangeLog, ChangeStats, GraphChange};
pub use graph::{FlowGraph, CAP_INF, CLUSTER_AGG_ID, SINK_ID};
pub use node::{FlowNode, FlowNodeKind, NodeId};
