use std::collections::HashMap;

use tracing::{debug, warn};

use conflux_core::types::{ResourceId, TaskId};
use conflux_flowgraph::{FlowGraph, FlowNodeKind, NodeId};

use crate::dispatcher::FlowRecord;

/// Scheduling action decoded from one task's unit of flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulingDelta {
    /// Bind the task to a machine; `leaf_id` is the PU its flow reached,
    /// which is what the graph pins the running arc to.
    Place {
        task_id: TaskId,
        resource_id: ResourceId,
        leaf_id: ResourceId,
    },
    /// The task is already running where its flow went.
    Noop { task_id: TaskId },
    /// Reserved: bindings are never revoked by the current graphs.
    Preempt { task_id: TaskId },
}

enum TaskRoute {
    Leaf(NodeId),
    Unscheduled,
    NoFlow,
    Stuck(NodeId),
}

/// Decode the solver's flow into per-task scheduling deltas.
///
/// Each task node carries one unit of supply, so walking arcs with
/// remaining flow from each task node in dense-id order decomposes the
/// aggregate flow into disjoint paths. Flow that reaches a job's
/// unscheduled aggregator produces no delta; flow that reaches a PU is a
/// placement on the machine containing it, or a noop if the task is
/// already bound there.
pub fn extract_deltas(
    graph: &FlowGraph,
    records: &[FlowRecord],
    bindings: &HashMap<TaskId, ResourceId>,
) -> Vec<SchedulingDelta> {
    let mut flow: HashMap<(NodeId, NodeId), u64> = HashMap::new();
    for record in records {
        if graph.node(record.src).is_none() || graph.node(record.dst).is_none() {
            warn!(
                "Flow record {} -> {} references unknown nodes, skipping",
                record.src, record.dst
            );
            continue;
        }
        *flow.entry((record.src, record.dst)).or_insert(0) += record.flow;
    }

    let mut deltas = Vec::new();
    for id in graph.node_ids_sorted() {
        let node = graph.node(id).unwrap();
        if !node.is_task_node() {
            continue;
        }
        let Some(task_id) = node.task_id else {
            continue;
        };
        match trace_task_flow(graph, &mut flow, id) {
            TaskRoute::Leaf(pu) => {
                let leaf_id = graph
                    .node(pu)
                    .and_then(|n| n.resource_id)
                    .expect("PU node lacks a resource id");
                let Some(machine) = graph.machine_for_leaf(pu) else {
                    warn!("Leaf node {} has no machine ancestor, skipping task {}", pu, task_id);
                    continue;
                };
                if bindings.get(&task_id) == Some(&machine) {
                    deltas.push(SchedulingDelta::Noop { task_id });
                } else {
                    deltas.push(SchedulingDelta::Place {
                        task_id,
                        resource_id: machine,
                        leaf_id,
                    });
                }
            }
            TaskRoute::Unscheduled => {
                debug!("Task {} stays unscheduled this round", task_id);
            }
            TaskRoute::NoFlow => {
                warn!("No flow left task node {} (task {})", id, task_id);
            }
            TaskRoute::Stuck(at) => {
                warn!(
                    "Flow from task {} dead-ends at node {}, skipping",
                    task_id, at
                );
            }
        }
    }
    deltas
}

fn trace_task_flow(
    graph: &FlowGraph,
    flow: &mut HashMap<(NodeId, NodeId), u64>,
    task_node: NodeId,
) -> TaskRoute {
    let Some(mut cur) = take_hop(graph, flow, task_node, true) else {
        return TaskRoute::NoFlow;
    };
    for _ in 0..64 {
        let node = graph.node(cur).expect("hop to a missing node");
        match node.kind {
            FlowNodeKind::JobAggregator => return TaskRoute::Unscheduled,
            FlowNodeKind::Pu => return TaskRoute::Leaf(cur),
            FlowNodeKind::Sink => return TaskRoute::Stuck(cur),
            _ => {}
        }
        match take_hop(graph, flow, cur, false) {
            Some(next) => cur = next,
            None => return TaskRoute::Stuck(cur),
        }
    }
    TaskRoute::Stuck(cur)
}

/// Consume one unit of flow out of `from`, preferring the smallest
/// destination id so decomposition is deterministic.
fn take_hop(
    graph: &FlowGraph,
    flow: &mut HashMap<(NodeId, NodeId), u64>,
    from: NodeId,
    warn_on_ambiguity: bool,
) -> Option<NodeId> {
    let node = graph.node(from)?;
    let mut carrying: Vec<NodeId> = node
        .outgoing
        .keys()
        .copied()
        .filter(|dst| flow.get(&(from, *dst)).copied().unwrap_or(0) > 0)
        .collect();
    carrying.sort_unstable();

    if warn_on_ambiguity && carrying.len() > 1 {
        warn!(
            "Task node {} has flow on {} outgoing arcs, taking the smallest destination",
            from,
            carrying.len()
        );
    }

    let dst = *carrying.first()?;
    *flow.get_mut(&(from, dst)).unwrap() -= 1;
    Some(dst)
}
