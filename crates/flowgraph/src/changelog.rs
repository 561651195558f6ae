use crate::arc::FlowArcKind;
use crate::node::{FlowNodeKind, NodeId};

/// One structural graph mutation, recorded in mutation order. The solver's
/// incremental interface is order sensitive, so entries are never reordered
/// or coalesced.
#[derive(Debug, Clone)]
pub enum GraphChange {
    AddNode {
        id: NodeId,
        kind: FlowNodeKind,
        excess: i64,
    },
    RemoveNode {
        id: NodeId,
    },
    /// Re-declaration of a node's excess (supply bookkeeping on the sink).
    UpdateExcess {
        id: NodeId,
        excess: i64,
    },
    AddArc {
        src: NodeId,
        dst: NodeId,
        cap_lower: u64,
        cap_upper: u64,
        cost: i64,
        kind: FlowArcKind,
    },
    RemoveArc {
        src: NodeId,
        dst: NodeId,
    },
    /// Cost-only update; capacity changes are recorded as remove plus add.
    ChangeArc {
        src: NodeId,
        dst: NodeId,
        cap_lower: u64,
        cap_upper: u64,
        cost: i64,
        kind: FlowArcKind,
        old_cost: i64,
    },
}

/// Ordered log of pending graph mutations since the last emission.
#[derive(Debug, Default)]
pub struct ChangeLog {
    pending: Vec<GraphChange>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: GraphChange) {
        self.pending.push(change);
    }

    pub fn pending(&self) -> &[GraphChange] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Empty the log, handing the entries to the caller. Done after a
    /// successful emission.
    pub fn drain(&mut self) -> Vec<GraphChange> {
        std::mem::take(&mut self.pending)
    }
}

/// Per-kind tally of a change batch, for round logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChangeStats {
    pub nodes_added: usize,
    pub nodes_removed: usize,
    pub excess_updates: usize,
    pub arcs_added: usize,
    pub arcs_removed: usize,
    pub arcs_changed: usize,
}

impl ChangeStats {
    pub fn summarize(changes: &[GraphChange]) -> Self {
        let mut stats = Self::default();
        for change in changes {
            match change {
                GraphChange::AddNode { .. } => stats.nodes_added += 1,
                GraphChange::RemoveNode { .. } => stats.nodes_removed += 1,
                GraphChange::UpdateExcess { .. } => stats.excess_updates += 1,
                GraphChange::AddArc { .. } => stats.arcs_added += 1,
                GraphChange::RemoveArc { .. } => stats.arcs_removed += 1,
                GraphChange::ChangeArc { .. } => stats.arcs_changed += 1,
            }
        }
        stats
    }
}

impl std::fmt::Display for ChangeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "+{}n -{}n ~{}n +{}a -{}a ~{}a",
            self.nodes_added,
            self.nodes_removed,
            self.excess_updates,
            self.arcs_added,
            self.arcs_removed,
            self.arcs_changed
        )
    }
}
