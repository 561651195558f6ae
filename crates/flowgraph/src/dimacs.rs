use std::fmt::Write;

use crate::changelog::GraphChange;
use crate::graph::FlowGraph;

/// Write a complete problem description: header, one node line per node
/// with nonzero excess, one arc line per arc. Lines are ordered by id so
/// identical graphs serialize identically.
pub fn write_full_snapshot<W: Write>(graph: &FlowGraph, out: &mut W) -> std::fmt::Result {
    writeln!(out, "c full problem description")?;
    writeln!(out, "p min {} {}", graph.num_nodes(), graph.num_arcs())?;
    let ids = graph.node_ids_sorted();
    for id in &ids {
        let node = graph.node(*id).unwrap();
        if node.excess != 0 {
            writeln!(out, "n {} {}", node.id, node.excess)?;
        }
    }
    for id in &ids {
        let node = graph.node(*id).unwrap();
        let mut dsts: Vec<u64> = node.outgoing.keys().copied().collect();
        dsts.sort_unstable();
        for dst in dsts {
            let arc = &node.outgoing[&dst];
            writeln!(
                out,
                "a {} {} {} {} {}",
                arc.src, arc.dst, arc.cap_lower, arc.cap_upper, arc.cost
            )?;
        }
    }
    writeln!(out, "c EOI")
}

/// Write queued change entries as an incremental patch, in mutation order.
pub fn write_delta<W: Write>(changes: &[GraphChange], out: &mut W) -> std::fmt::Result {
    for change in changes {
        match change {
            GraphChange::AddNode { id, excess, .. } => writeln!(out, "n {} {}", id, excess)?,
            GraphChange::UpdateExcess { id, excess } => writeln!(out, "n {} {}", id, excess)?,
            GraphChange::RemoveNode { id } => writeln!(out, "r {}", id)?,
            GraphChange::AddArc {
                src,
                dst,
                cap_lower,
                cap_upper,
                cost,
                ..
            } => writeln!(out, "a {} {} {} {} {}", src, dst, cap_lower, cap_upper, cost)?,
            GraphChange::RemoveArc { src, dst } => writeln!(out, "d {} {}", src, dst)?,
            GraphChange::ChangeArc { src, dst, cost, .. } => {
                writeln!(out, "x {} {} {}", src, dst, cost)?
            }
        }
    }
    writeln!(out, "c EOI")
}

pub fn full_snapshot_string(graph: &FlowGraph) -> String {
    let mut out = String::new();
    write_full_snapshot(graph, &mut out).expect("writing to a String cannot fail");
    out
}

pub fn delta_string(changes: &[GraphChange]) -> String {
    let mut out = String::new();
    write_delta(changes, &mut out).expect("writing to a String cannot fail");
    out
}
