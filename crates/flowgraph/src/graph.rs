use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};
use uuid::Uuid;

use conflux_core::types::{
    EquivClassId, JobDescriptor, JobId, JobMap, ResourceDescriptor, ResourceId, ResourceKind,
    ResourceMap, ResourceTopology, TaskDescriptor, TaskId,
};
use conflux_cost::{CostModel, CLUSTER_AGG_EC};

use crate::arc::{FlowArc, FlowArcKind};
use crate::changelog::{ChangeLog, GraphChange};
use crate::node::{FlowNode, FlowNodeKind, NodeId};

/// The sink is always dense id 1 by convention.
pub const SINK_ID: NodeId = 1;

/// The cluster aggregator, created at graph initialisation.
pub const CLUSTER_AGG_ID: NodeId = 2;

/// Sentinel for an effectively unbounded arc capacity.
pub const CAP_INF: u64 = u64::MAX;

/// Live flow-graph mirror of the cluster. Owns every node and arc; task,
/// job and resource descriptors stay in their external maps and are looked
/// up by id. A missing descriptor means the event layer violated its
/// ordering contract, which is unrecoverable.
pub struct FlowGraph {
    nodes: HashMap<NodeId, FlowNode>,
    next_id: NodeId,
    num_arcs: usize,
    task_nodes: HashMap<TaskId, NodeId>,
    resource_nodes: HashMap<ResourceId, NodeId>,
    unsched_aggs: HashMap<JobId, NodeId>,
    equiv_class_nodes: HashMap<EquivClassId, NodeId>,
    cluster_descriptor: ResourceDescriptor,
    cost_model: Box<dyn CostModel>,
    changes: ChangeLog,
}

impl FlowGraph {
    pub fn new(cost_model: Box<dyn CostModel>) -> Self {
        let mut graph = Self {
            nodes: HashMap::new(),
            next_id: 1,
            num_arcs: 0,
            task_nodes: HashMap::new(),
            resource_nodes: HashMap::new(),
            unsched_aggs: HashMap::new(),
            equiv_class_nodes: HashMap::new(),
            cluster_descriptor: ResourceDescriptor::new(
                Uuid::nil(),
                ResourceKind::Coordinator,
                "cluster",
            ),
            cost_model,
            changes: ChangeLog::new(),
        };

        let sink = graph.alloc_node(FlowNodeKind::Sink, 0);
        debug_assert_eq!(sink, SINK_ID);
        graph.nodes.get_mut(&sink).unwrap().comment = "SINK".to_string();

        let agg = graph.alloc_node(FlowNodeKind::Coordinator, 0);
        debug_assert_eq!(agg, CLUSTER_AGG_ID);
        graph.nodes.get_mut(&agg).unwrap().comment = "CLUSTER_AGG".to_string();

        // Bootstrap arc so the aggregator is never disconnected from the
        // sink. Dropped once a real topology attaches below it.
        graph.insert_arc(CLUSTER_AGG_ID, SINK_ID, 0, CAP_INF, 0, FlowArcKind::Other);
        graph
    }

    // --- Accessors ---

    pub fn node(&self, id: NodeId) -> Option<&FlowNode> {
        self.nodes.get(&id)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_arcs(&self) -> usize {
        self.num_arcs
    }

    pub fn task_node_id(&self, task: TaskId) -> Option<NodeId> {
        self.task_nodes.get(&task).copied()
    }

    pub fn resource_node_id(&self, resource: ResourceId) -> Option<NodeId> {
        self.resource_nodes.get(&resource).copied()
    }

    pub fn unsched_agg_id(&self, job: JobId) -> Option<NodeId> {
        self.unsched_aggs.get(&job).copied()
    }

    pub fn node_ids_sorted(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn pending_changes(&self) -> &[GraphChange] {
        self.changes.pending()
    }

    pub fn drain_changes(&mut self) -> Vec<GraphChange> {
        self.changes.drain()
    }

    /// The machine that contains a leaf PU, resolved by walking the
    /// topology arcs upwards.
    pub fn machine_for_leaf(&self, leaf: NodeId) -> Option<ResourceId> {
        let mut cur = leaf;
        for _ in 0..64 {
            let node = self.nodes.get(&cur)?;
            if node.kind == FlowNodeKind::Machine {
                return node.resource_id;
            }
            if !node.is_resource_node() {
                return None;
            }
            cur = node.incoming.iter().copied().find(|src| {
                self.nodes.get(src).is_some_and(|n| {
                    n.is_resource_node()
                        && n.outgoing
                            .get(&node.id)
                            .is_some_and(|a| a.kind == FlowArcKind::ResourceToResource)
                })
            })?;
        }
        None
    }

    // --- Topology mutators ---

    /// Populate an otherwise-empty graph from a resource tree. A
    /// coordinator root merges onto the cluster aggregator; anything else
    /// attaches below it.
    pub fn add_resource_topology(&mut self, root: &ResourceTopology, resources: &ResourceMap) {
        info!(
            "Adding resource topology rooted at {} ({} leaves)",
            root.descriptor.name,
            root.num_leaves()
        );
        if root.descriptor.kind == ResourceKind::Coordinator {
            self.bind_coordinator_root(&root.descriptor);
            let parent_rd = self.cluster_descriptor.clone();
            for child in &root.children {
                self.attach_subtree(CLUSTER_AGG_ID, &parent_rd, child, resources);
            }
        } else {
            let parent_rd = self.cluster_descriptor.clone();
            self.attach_subtree(CLUSTER_AGG_ID, &parent_rd, root, resources);
        }
        self.restore_bypass_if_isolated();
    }

    /// Reconcile the live graph against a fresh topology snapshot.
    /// Costs of surviving arcs are recomputed, new resources attached,
    /// vanished resources removed. Returns the ids of tasks whose bound
    /// resource disappeared; they are re-routed to their unscheduled
    /// aggregator inside this same mutation.
    pub fn update_resource_topology(
        &mut self,
        root: &ResourceTopology,
        resources: &ResourceMap,
        jobs: &JobMap,
    ) -> Vec<TaskId> {
        let mut live: HashSet<ResourceId> = HashSet::new();
        if root.descriptor.kind == ResourceKind::Coordinator {
            self.bind_coordinator_root(&root.descriptor);
            live.insert(root.descriptor.id);
            let parent_rd = self.cluster_descriptor.clone();
            for child in &root.children {
                self.reconcile_subtree(CLUSTER_AGG_ID, &parent_rd, child, resources, &mut live);
            }
        } else {
            let parent_rd = self.cluster_descriptor.clone();
            self.reconcile_subtree(CLUSTER_AGG_ID, &parent_rd, root, resources, &mut live);
        }

        // Anything the snapshot no longer mentions is gone. Removal in
        // dense-id order keeps the emitted deltas reproducible.
        let mut vanished: Vec<(NodeId, ResourceId)> = self
            .resource_nodes
            .iter()
            .filter(|(rid, node_id)| !live.contains(*rid) && **node_id != CLUSTER_AGG_ID)
            .map(|(rid, node_id)| (*node_id, *rid))
            .collect();
        vanished.sort_unstable();
        let vanished: Vec<ResourceId> = vanished.into_iter().map(|(_, rid)| rid).collect();
        let mut orphans = Vec::new();
        for rid in vanished {
            if let Some(node_id) = self.resource_nodes.get(&rid).copied() {
                info!("Resource {} left the topology, removing node {}", rid, node_id);
                self.remove_resource_node(node_id, jobs, resources, &mut orphans);
            }
        }

        self.refresh_topology_capacities();
        self.restore_bypass_if_isolated();
        orphans
    }

    // --- Job mutators ---

    /// Create nodes and arcs for every runnable task of the job that does
    /// not have them yet. Calling this again with an unchanged job is a
    /// no-op and records no change entries.
    pub fn add_or_update_job_nodes(&mut self, job: &JobDescriptor, resources: &ResourceMap) {
        let sink_before = self.sink_excess();
        let agg_id = self.ensure_unsched_agg(job.id, &job.name);

        let mut added = 0usize;
        for (index, td) in job.tasks.iter().enumerate() {
            if !td.state.is_runnable() || self.task_nodes.contains_key(&td.id) {
                continue;
            }
            self.add_task_node(td, index == 0, agg_id, resources);
            added += 1;
        }

        // The aggregator's drain arc tracks the number of unbound tasks.
        let unbound = self.nodes[&agg_id].incoming.len() as u64;
        if self.nodes[&agg_id].outgoing.contains_key(&SINK_ID) {
            self.set_arc_capacity(agg_id, SINK_ID, unbound);
        } else {
            let cost = self.cost_model.unscheduled_to_sink_cost(job);
            self.insert_arc(agg_id, SINK_ID, 0, unbound, cost, FlowArcKind::Other);
        }

        self.record_sink_excess(sink_before);
        if added > 0 {
            debug!("Added {} task nodes for job {}", added, job.id);
        }
    }

    /// Pin a placed task: drop every outgoing arc except the one to the
    /// leaf it runs on, which becomes the running arc. Disables preemption
    /// and migration for this task in later rounds.
    pub fn update_arcs_for_bound_task(&mut self, td: &TaskDescriptor, leaf: ResourceId) {
        let tnode = self
            .task_node_id(td.id)
            .unwrap_or_else(|| panic!("no task node for bound task {}", td.id));
        let leaf_node = self
            .resource_node_id(leaf)
            .unwrap_or_else(|| panic!("no resource node for binding target {}", leaf));
        let job_id = self.nodes[&tnode]
            .job_id
            .expect("task node lacks a job id");

        let mut losers: Vec<NodeId> = self.nodes[&tnode]
            .outgoing
            .keys()
            .copied()
            .filter(|dst| *dst != leaf_node)
            .collect();
        losers.sort_unstable();
        for dst in losers {
            self.remove_arc_entry(tnode, dst);
        }

        let continuation = self.cost_model.task_continuation_cost(td);
        if self.nodes[&tnode].outgoing.contains_key(&leaf_node) {
            self.set_arc_cost(tnode, leaf_node, continuation);
            self.nodes
                .get_mut(&tnode)
                .unwrap()
                .outgoing
                .get_mut(&leaf_node)
                .unwrap()
                .kind = FlowArcKind::Running;
        } else {
            self.insert_arc(tnode, leaf_node, 0, 1, continuation, FlowArcKind::Running);
        }

        self.nodes.get_mut(&tnode).unwrap().kind = FlowNodeKind::ScheduledTask;
        self.refresh_unsched_capacity(job_id);
        debug!("Task {} pinned to leaf {} (node {})", td.id, leaf, leaf_node);
    }

    /// Re-derive the unscheduled-arc cost of every unbound task. Wait-time
    /// sensitive cost models move these between rounds without any graph
    /// event firing; models with static penalties produce no entries here.
    pub fn update_unscheduled_costs(&mut self, jobs: &JobMap) {
        let mut updates: Vec<(NodeId, NodeId, i64)> = Vec::new();
        for (task, node_id) in &self.task_nodes {
            let node = &self.nodes[node_id];
            if node.kind == FlowNodeKind::ScheduledTask {
                continue;
            }
            let job_id = node.job_id.expect("task node lacks a job id");
            let Some(&agg) = self.unsched_aggs.get(&job_id) else {
                continue;
            };
            let job = jobs
                .get(&job_id)
                .unwrap_or_else(|| panic!("job descriptor {} missing while re-costing", job_id));
            let td = job
                .tasks
                .iter()
                .find(|t| t.id == *task)
                .unwrap_or_else(|| panic!("task descriptor {} missing while re-costing", task));
            updates.push((*node_id, agg, self.cost_model.task_to_unscheduled_cost(td)));
        }
        updates.sort_unstable();
        for (src, dst, cost) in updates {
            self.set_arc_cost(src, dst, cost);
        }
    }

    /// Remove one task node and all its incident arcs.
    pub fn delete_task_node(&mut self, task: TaskId) {
        let sink_before = self.sink_excess();
        let node_id = self
            .task_nodes
            .remove(&task)
            .unwrap_or_else(|| panic!("no task node to delete for task {}", task));
        let job_id = self.nodes[&node_id].job_id;
        self.remove_all_incident_arcs(node_id);
        self.nodes.remove(&node_id);
        self.changes.push(GraphChange::RemoveNode { id: node_id });
        // One unit of supply left with the task.
        self.nodes.get_mut(&SINK_ID).unwrap().excess += 1;
        if let Some(job_id) = job_id {
            self.refresh_unsched_capacity(job_id);
        }
        self.record_sink_excess(sink_before);
        debug!("Deleted task node {} for task {}", node_id, task);
    }

    /// Remove every task node of the job plus its unscheduled aggregator.
    pub fn delete_nodes_for_job(&mut self, job: JobId) {
        let mut tasks: Vec<TaskId> = self
            .task_nodes
            .iter()
            .filter(|(_, node_id)| self.nodes[node_id].job_id == Some(job))
            .map(|(task, _)| *task)
            .collect();
        tasks.sort_unstable();
        for task in tasks {
            self.delete_task_node(task);
        }
        if let Some(agg) = self.unsched_aggs.remove(&job) {
            self.remove_all_incident_arcs(agg);
            self.nodes.remove(&agg);
            self.changes.push(GraphChange::RemoveNode { id: agg });
        }
        info!("Removed flow graph nodes for job {}", job);
    }

    // --- Invariant verification ---

    /// Check the structural invariants the mutators promise to preserve.
    /// Intended for tests and debug builds; violations indicate a bug in
    /// this module, not in callers.
    pub fn verify(&self) -> Result<(), String> {
        let mut supply: i64 = 0;
        let mut sinks = 0usize;
        let mut outgoing_total = 0usize;
        let mut incoming_total = 0usize;

        for node in self.nodes.values() {
            supply += node.excess;
            if node.kind == FlowNodeKind::Sink {
                sinks += 1;
                if node.id != SINK_ID {
                    return Err(format!("sink has dense id {}, expected {}", node.id, SINK_ID));
                }
            }
            outgoing_total += node.outgoing.len();
            incoming_total += node.incoming.len();

            for (dst, arc) in &node.outgoing {
                if arc.cap_lower > arc.cap_upper {
                    return Err(format!(
                        "arc {}->{} has lower {} > upper {}",
                        node.id, dst, arc.cap_lower, arc.cap_upper
                    ));
                }
                let dst_node = self
                    .nodes
                    .get(dst)
                    .ok_or_else(|| format!("arc {}->{} points at a missing node", node.id, dst))?;
                if !dst_node.incoming.contains(&node.id) {
                    return Err(format!("arc {}->{} missing from incoming set", node.id, dst));
                }
            }
            for src in &node.incoming {
                let src_node = self
                    .nodes
                    .get(src)
                    .ok_or_else(|| format!("incoming {}->{} from a missing node", src, node.id))?;
                if !src_node.outgoing.contains_key(&node.id) {
                    return Err(format!("incoming {}->{} has no forward arc", src, node.id));
                }
            }

            if node.is_task_node() {
                self.verify_task_node(node)?;
            }
            if node.kind == FlowNodeKind::Pu && !node.outgoing.contains_key(&SINK_ID) {
                return Err(format!("PU node {} has no sink arc", node.id));
            }
        }

        if sinks != 1 {
            return Err(format!("expected exactly one sink, found {}", sinks));
        }
        if supply != 0 {
            return Err(format!("graph supply sums to {}, expected 0", supply));
        }
        if outgoing_total != self.num_arcs || incoming_total != self.num_arcs {
            return Err(format!(
                "arc count mismatch: counter {}, outgoing {}, incoming {}",
                self.num_arcs, outgoing_total, incoming_total
            ));
        }
        Ok(())
    }

    fn verify_task_node(&self, node: &FlowNode) -> Result<(), String> {
        if node.kind == FlowNodeKind::ScheduledTask {
            if node.outgoing.len() != 1 {
                return Err(format!(
                    "bound task node {} has {} outgoing arcs, expected 1",
                    node.id,
                    node.outgoing.len()
                ));
            }
            return Ok(());
        }
        let agg = node
            .job_id
            .and_then(|job| self.unsched_aggs.get(&job).copied())
            .ok_or_else(|| format!("task node {} has no unscheduled aggregator", node.id))?;
        let unsched_arcs = node
            .outgoing
            .values()
            .filter(|a| a.kind == FlowArcKind::TaskToUnscheduled)
            .count();
        if unsched_arcs != 1 || !node.outgoing.contains_key(&agg) {
            return Err(format!(
                "task node {} has {} unscheduled arcs (aggregator {})",
                node.id, unsched_arcs, agg
            ));
        }
        Ok(())
    }

    // --- Node and arc plumbing ---

    fn alloc_node(&mut self, kind: FlowNodeKind, excess: i64) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, FlowNode::new(id, kind, excess));
        self.changes.push(GraphChange::AddNode { id, kind, excess });
        id
    }

    fn insert_arc(
        &mut self,
        src: NodeId,
        dst: NodeId,
        cap_lower: u64,
        cap_upper: u64,
        cost: i64,
        kind: FlowArcKind,
    ) {
        let arc = FlowArc::new(src, dst, cap_lower, cap_upper, cost, kind);
        let src_node = self
            .nodes
            .get_mut(&src)
            .unwrap_or_else(|| panic!("arc source node {} missing", src));
        let prev = src_node.outgoing.insert(dst, arc);
        assert!(prev.is_none(), "duplicate arc {}->{}", src, dst);
        self.nodes
            .get_mut(&dst)
            .unwrap_or_else(|| panic!("arc destination node {} missing", dst))
            .incoming
            .insert(src);
        self.num_arcs += 1;
        self.changes.push(GraphChange::AddArc {
            src,
            dst,
            cap_lower,
            cap_upper,
            cost,
            kind,
        });
    }

    fn remove_arc_entry(&mut self, src: NodeId, dst: NodeId) -> FlowArc {
        let arc = self
            .nodes
            .get_mut(&src)
            .and_then(|n| n.outgoing.remove(&dst))
            .unwrap_or_else(|| panic!("arc {}->{} not present", src, dst));
        if let Some(node) = self.nodes.get_mut(&dst) {
            node.incoming.remove(&src);
        }
        self.num_arcs -= 1;
        self.changes.push(GraphChange::RemoveArc { src, dst });
        arc
    }

    fn set_arc_cost(&mut self, src: NodeId, dst: NodeId, cost: i64) {
        let arc = self
            .nodes
            .get_mut(&src)
            .and_then(|n| n.outgoing.get_mut(&dst))
            .unwrap_or_else(|| panic!("arc {}->{} not present", src, dst));
        if arc.cost == cost {
            return;
        }
        let old_cost = arc.cost;
        arc.cost = cost;
        let (cap_lower, cap_upper, kind) = (arc.cap_lower, arc.cap_upper, arc.kind);
        self.changes.push(GraphChange::ChangeArc {
            src,
            dst,
            cap_lower,
            cap_upper,
            cost,
            kind,
            old_cost,
        });
    }

    /// Capacity changes are expressed as a remove plus an add so the
    /// serializer never has to describe them.
    fn set_arc_capacity(&mut self, src: NodeId, dst: NodeId, cap_upper: u64) {
        let arc = self
            .nodes
            .get(&src)
            .and_then(|n| n.outgoing.get(&dst))
            .unwrap_or_else(|| panic!("arc {}->{} not present", src, dst));
        if arc.cap_upper == cap_upper {
            return;
        }
        let (cap_lower, cost, kind) = (arc.cap_lower, arc.cost, arc.kind);
        self.changes.push(GraphChange::RemoveArc { src, dst });
        self.changes.push(GraphChange::AddArc {
            src,
            dst,
            cap_lower,
            cap_upper,
            cost,
            kind,
        });
        self.nodes
            .get_mut(&src)
            .unwrap()
            .outgoing
            .get_mut(&dst)
            .unwrap()
            .cap_upper = cap_upper;
    }

    fn remove_all_incident_arcs(&mut self, id: NodeId) {
        let mut incoming: Vec<NodeId> = self.nodes[&id].incoming.iter().copied().collect();
        incoming.sort_unstable();
        for src in incoming {
            self.remove_arc_entry(src, id);
        }
        let mut outgoing: Vec<NodeId> = self.nodes[&id].outgoing.keys().copied().collect();
        outgoing.sort_unstable();
        for dst in outgoing {
            self.remove_arc_entry(id, dst);
        }
    }

    fn sink_excess(&self) -> i64 {
        self.nodes[&SINK_ID].excess
    }

    fn record_sink_excess(&mut self, before: i64) {
        let now = self.sink_excess();
        if now != before {
            self.changes.push(GraphChange::UpdateExcess {
                id: SINK_ID,
                excess: now,
            });
        }
    }

    // --- Topology internals ---

    fn bind_coordinator_root(&mut self, rd: &ResourceDescriptor) {
        if self.cluster_descriptor.id != rd.id {
            self.resource_nodes.remove(&self.cluster_descriptor.id);
        }
        self.cluster_descriptor = rd.clone();
        self.resource_nodes.insert(rd.id, CLUSTER_AGG_ID);
        let node = self.nodes.get_mut(&CLUSTER_AGG_ID).unwrap();
        node.resource_id = Some(rd.id);
        node.comment = rd.name.clone();
    }

    fn attach_subtree(
        &mut self,
        parent_id: NodeId,
        parent_rd: &ResourceDescriptor,
        topo: &ResourceTopology,
        resources: &ResourceMap,
    ) {
        if parent_id == CLUSTER_AGG_ID && self.nodes[&CLUSTER_AGG_ID].outgoing.contains_key(&SINK_ID)
        {
            self.remove_arc_entry(CLUSTER_AGG_ID, SINK_ID);
        }

        let rd = &topo.descriptor;
        let kind = FlowNodeKind::from_resource_kind(rd.kind);
        let id = self.alloc_node(kind, 0);
        {
            let node = self.nodes.get_mut(&id).unwrap();
            node.resource_id = Some(rd.id);
            node.comment = rd.name.clone();
        }
        self.resource_nodes.insert(rd.id, id);

        let cap = topo.num_leaves();
        let cost = self.cost_model.resource_to_resource_cost(parent_rd, rd);
        self.insert_arc(parent_id, id, 0, cap, cost, FlowArcKind::ResourceToResource);

        if rd.kind == ResourceKind::Pu {
            let cost = self.cost_model.leaf_to_sink_cost(rd);
            self.insert_arc(id, SINK_ID, 0, 1, cost, FlowArcKind::Other);
        }
        if rd.kind == ResourceKind::Machine {
            self.wire_equiv_classes_to_machine(id, rd, cap, resources);
        }

        for child in &topo.children {
            self.attach_subtree(id, rd, child, resources);
        }
    }

    fn wire_equiv_classes_to_machine(
        &mut self,
        machine_node: NodeId,
        rd: &ResourceDescriptor,
        cap: u64,
        resources: &ResourceMap,
    ) {
        let mut classes: Vec<EquivClassId> = self.equiv_class_nodes.keys().copied().collect();
        classes.sort_unstable();
        for class in classes {
            let eligible = self.cost_model.equiv_class_resources(class, resources);
            if !eligible.contains(&rd.id) {
                continue;
            }
            let ec_node = self.equiv_class_nodes[&class];
            let cost = self.cost_model.equiv_class_to_resource_cost(class, rd);
            self.insert_arc(
                ec_node,
                machine_node,
                0,
                cap,
                cost,
                FlowArcKind::EquivClassToResource,
            );
        }
    }

    fn reconcile_subtree(
        &mut self,
        parent_id: NodeId,
        parent_rd: &ResourceDescriptor,
        topo: &ResourceTopology,
        resources: &ResourceMap,
        live: &mut HashSet<ResourceId>,
    ) {
        let rd = &topo.descriptor;
        match self.resource_nodes.get(&rd.id).copied() {
            Some(id) => {
                live.insert(rd.id);
                let cost = self.cost_model.resource_to_resource_cost(parent_rd, rd);
                self.set_arc_cost(parent_id, id, cost);
                if rd.kind == ResourceKind::Pu {
                    let cost = self.cost_model.leaf_to_sink_cost(rd);
                    self.set_arc_cost(id, SINK_ID, cost);
                }
                for child in &topo.children {
                    self.reconcile_subtree(id, rd, child, resources, live);
                }
            }
            None => {
                self.attach_subtree(parent_id, parent_rd, topo, resources);
                topo.for_each(&mut |t| {
                    live.insert(t.descriptor.id);
                });
            }
        }
    }

    fn remove_resource_node(
        &mut self,
        id: NodeId,
        jobs: &JobMap,
        resources: &ResourceMap,
        orphans: &mut Vec<TaskId>,
    ) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let rid = node.resource_id;

        // Bound tasks pointing here lose their running arc and fall back
        // to their unscheduled aggregator, keeping the supply routable.
        let mut severed: Vec<(NodeId, TaskId)> = Vec::new();
        let mut incoming: Vec<NodeId> = node.incoming.iter().copied().collect();
        incoming.sort_unstable();
        for src in incoming {
            let arc_kind = self.nodes[&src].outgoing[&id].kind;
            if arc_kind == FlowArcKind::Running {
                if let Some(task) = self.nodes[&src].task_id {
                    severed.push((src, task));
                }
            }
            self.remove_arc_entry(src, id);
        }
        let mut outgoing: Vec<NodeId> = self.nodes[&id].outgoing.keys().copied().collect();
        outgoing.sort_unstable();
        for dst in outgoing {
            self.remove_arc_entry(id, dst);
        }

        self.nodes.remove(&id);
        self.changes.push(GraphChange::RemoveNode { id });
        if let Some(rid) = rid {
            self.resource_nodes.remove(&rid);
        }

        for (task_node, task) in severed {
            warn!("Task {} lost its bound resource, re-queueing as unscheduled", task);
            self.reroute_task_to_unscheduled(task_node, task, jobs, resources);
            orphans.push(task);
        }
    }

    /// Rebuild the full arc fan-out of a task whose running arc was
    /// severed, so it is both unscheduled-routable and placeable again.
    fn reroute_task_to_unscheduled(
        &mut self,
        task_node: NodeId,
        task: TaskId,
        jobs: &JobMap,
        resources: &ResourceMap,
    ) {
        let job_id = self.nodes[&task_node]
            .job_id
            .expect("task node lacks a job id");
        let job = jobs
            .get(&job_id)
            .unwrap_or_else(|| panic!("job descriptor {} missing while re-routing task", job_id));
        let td = job
            .tasks
            .iter()
            .find(|t| t.id == task)
            .unwrap_or_else(|| panic!("task descriptor {} missing while re-routing", task))
            .clone();
        let agg = self
            .unsched_aggs
            .get(&job_id)
            .copied()
            .unwrap_or_else(|| panic!("job {} has no unscheduled aggregator", job_id));

        self.wire_task_arcs(task_node, &td, agg, resources);
        self.nodes.get_mut(&task_node).unwrap().kind = FlowNodeKind::UnscheduledTask;
        self.refresh_unsched_capacity(job_id);
    }

    /// Interior arc capacities mirror the PU count below their
    /// destination; structural updates can invalidate them wholesale.
    fn refresh_topology_capacities(&mut self) {
        let mut updates: Vec<(NodeId, NodeId, u64)> = Vec::new();
        for node in self.nodes.values() {
            for (dst, arc) in &node.outgoing {
                let counts = matches!(
                    arc.kind,
                    FlowArcKind::ResourceToResource | FlowArcKind::EquivClassToResource
                ) && *dst != SINK_ID;
                if !counts {
                    continue;
                }
                let cap = self.leaf_count(*dst);
                if cap != arc.cap_upper {
                    updates.push((node.id, *dst, cap));
                }
            }
        }
        updates.sort_unstable();
        for (src, dst, cap) in updates {
            self.set_arc_capacity(src, dst, cap);
        }
    }

    fn leaf_count(&self, id: NodeId) -> u64 {
        let node = &self.nodes[&id];
        if node.kind == FlowNodeKind::Pu {
            return 1;
        }
        node.outgoing
            .iter()
            .filter(|(dst, arc)| {
                arc.kind == FlowArcKind::ResourceToResource && **dst != SINK_ID
            })
            .map(|(dst, _)| self.leaf_count(*dst))
            .sum()
    }

    fn restore_bypass_if_isolated(&mut self) {
        if self.nodes[&CLUSTER_AGG_ID].outgoing.is_empty() {
            self.insert_arc(CLUSTER_AGG_ID, SINK_ID, 0, CAP_INF, 0, FlowArcKind::Other);
        }
    }

    // --- Job internals ---

    fn ensure_unsched_agg(&mut self, job: JobId, job_name: &str) -> NodeId {
        if let Some(&agg) = self.unsched_aggs.get(&job) {
            return agg;
        }
        let agg = self.alloc_node(FlowNodeKind::JobAggregator, 0);
        {
            let node = self.nodes.get_mut(&agg).unwrap();
            node.job_id = Some(job);
            node.comment = format!("UNSCHED_{}", job_name);
        }
        self.unsched_aggs.insert(job, agg);
        agg
    }

    fn add_task_node(
        &mut self,
        td: &TaskDescriptor,
        is_root: bool,
        agg_id: NodeId,
        resources: &ResourceMap,
    ) {
        let kind = if is_root {
            FlowNodeKind::RootTask
        } else {
            FlowNodeKind::UnscheduledTask
        };
        let id = self.alloc_node(kind, 1);
        {
            let node = self.nodes.get_mut(&id).unwrap();
            node.job_id = Some(td.job_id);
            node.task_id = Some(td.id);
            node.comment = td.name.clone();
        }
        self.task_nodes.insert(td.id, id);
        self.nodes.get_mut(&SINK_ID).unwrap().excess -= 1;
        self.wire_task_arcs(id, td, agg_id, resources);
    }

    /// Arc fan-out of an unbound task: the unscheduled escape hatch, its
    /// equivalence classes, and any direct machine preferences.
    fn wire_task_arcs(
        &mut self,
        id: NodeId,
        td: &TaskDescriptor,
        agg_id: NodeId,
        resources: &ResourceMap,
    ) {
        let cost = self.cost_model.task_to_unscheduled_cost(td);
        self.insert_arc(id, agg_id, 0, 1, cost, FlowArcKind::TaskToUnscheduled);

        for class in self.cost_model.task_equiv_classes(td) {
            let target = if class == CLUSTER_AGG_EC {
                CLUSTER_AGG_ID
            } else {
                self.ensure_equiv_class_node(class, resources)
            };
            let cost = self.cost_model.task_to_equiv_class_cost(td, class);
            self.insert_arc(id, target, 0, 1, cost, FlowArcKind::TaskToEquivClass);
        }

        for rid in self.cost_model.preferred_resources(td, resources) {
            let Some(&rnode) = self.resource_nodes.get(&rid) else {
                continue;
            };
            let rd = resources
                .get(&rid)
                .unwrap_or_else(|| panic!("resource descriptor {} missing", rid));
            let cost = self.cost_model.task_to_resource_cost(td, rd);
            self.insert_arc(id, rnode, 0, 1, cost, FlowArcKind::TaskToResource);
        }
    }

    fn ensure_equiv_class_node(&mut self, class: EquivClassId, resources: &ResourceMap) -> NodeId {
        if let Some(&id) = self.equiv_class_nodes.get(&class) {
            return id;
        }
        let id = self.alloc_node(FlowNodeKind::EquivalenceClass, 0);
        {
            let node = self.nodes.get_mut(&id).unwrap();
            node.equiv_class = Some(class);
            node.comment = format!("EC_{:x}", class);
        }
        self.equiv_class_nodes.insert(class, id);

        for rid in self.cost_model.equiv_class_resources(class, resources) {
            let Some(&rnode) = self.resource_nodes.get(&rid) else {
                continue;
            };
            let rd = resources
                .get(&rid)
                .unwrap_or_else(|| panic!("resource descriptor {} missing", rid));
            let cap = self.leaf_count(rnode);
            let cost = self.cost_model.equiv_class_to_resource_cost(class, rd);
            self.insert_arc(id, rnode, 0, cap, cost, FlowArcKind::EquivClassToResource);
        }
        id
    }

    fn refresh_unsched_capacity(&mut self, job: JobId) {
        let Some(&agg) = self.unsched_aggs.get(&job) else {
            return;
        };
        let unbound = self.nodes[&agg].incoming.len() as u64;
        if self.nodes[&agg].outgoing.contains_key(&SINK_ID) {
            self.set_arc_capacity(agg, SINK_ID, unbound);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    use conflux_cost::{QuincyCostModel, TrivialCostModel};

    use super::*;
    use crate::dimacs;
    use crate::tests_common::*;

    fn trivial_graph() -> FlowGraph {
        FlowGraph::new(Box::new(TrivialCostModel::new()))
    }

    fn first_pu(graph: &FlowGraph) -> NodeId {
        graph
            .node_ids_sorted()
            .into_iter()
            .find(|id| graph.node(*id).unwrap().kind == FlowNodeKind::Pu)
            .expect("no PU node in graph")
    }

    #[test]
    fn empty_graph_is_aggregator_and_sink() {
        let graph = trivial_graph();
        assert_eq!(graph.num_nodes(), 2);
        assert_eq!(graph.num_arcs(), 1);
        let agg = graph.node(CLUSTER_AGG_ID).unwrap();
        let bypass = agg.outgoing.get(&SINK_ID).expect("bootstrap arc missing");
        assert_eq!((bypass.cap_lower, bypass.cap_upper, bypass.cost), (0, CAP_INF, 0));
        graph.verify().unwrap();
    }

    #[test]
    fn topology_add_wires_leaves_to_sink() {
        let mut graph = trivial_graph();
        let topo = make_cluster_topology(vec![make_machine_topology("m0", 2)]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);

        // sink + aggregator + machine + socket + 2 cores + 2 PUs
        assert_eq!(graph.num_nodes(), 8);
        // The bootstrap bypass arc is gone once real capacity attaches.
        assert!(!graph
            .node(CLUSTER_AGG_ID)
            .unwrap()
            .outgoing
            .contains_key(&SINK_ID));

        let pu = first_pu(&graph);
        assert!(graph.node(pu).unwrap().outgoing.contains_key(&SINK_ID));
        let machine = graph.machine_for_leaf(pu).expect("PU has no machine");
        let machine_node = graph.resource_node_id(machine).unwrap();
        assert_eq!(graph.node(machine_node).unwrap().kind, FlowNodeKind::Machine);
        graph.verify().unwrap();
    }

    #[test]
    fn interior_arc_capacities_count_leaves() {
        let mut graph = trivial_graph();
        let topo = make_cluster_topology(vec![make_machine_topology("m0", 4)]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);

        let machine_node = graph
            .resource_node_id(topo.children[0].descriptor.id)
            .unwrap();
        let arc = &graph.node(CLUSTER_AGG_ID).unwrap().outgoing[&machine_node];
        assert_eq!(arc.cap_upper, 4);
        graph.verify().unwrap();
    }

    #[test]
    fn job_add_creates_unscheduled_route() {
        let mut graph = trivial_graph();
        let topo = make_cluster_topology(vec![make_machine_topology("m0", 1)]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);

        let job = make_job("batch", 2);
        graph.add_or_update_job_nodes(&job, &resources);

        let agg = graph.unsched_agg_id(job.id).unwrap();
        for td in &job.tasks {
            let node = graph.node(graph.task_node_id(td.id).unwrap()).unwrap();
            assert_eq!(node.excess, 1);
            assert!(node.outgoing.contains_key(&agg));
        }
        assert_eq!(graph.node(SINK_ID).unwrap().excess, -2);
        let drain = &graph.node(agg).unwrap().outgoing[&SINK_ID];
        assert_eq!(drain.cap_upper, 2);
        graph.verify().unwrap();
    }

    #[test]
    fn job_add_is_idempotent() {
        let mut graph = trivial_graph();
        let topo = make_cluster_topology(vec![make_machine_topology("m0", 1)]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);

        let job = make_job("batch", 2);
        graph.add_or_update_job_nodes(&job, &resources);
        graph.drain_changes();

        graph.add_or_update_job_nodes(&job, &resources);
        assert!(!graph.has_pending_changes());
        graph.verify().unwrap();
    }

    #[test]
    fn topology_update_is_idempotent() {
        let mut graph = trivial_graph();
        let topo = make_cluster_topology(vec![make_machine_topology("m0", 2)]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);
        graph.drain_changes();

        let orphans = graph.update_resource_topology(&topo, &resources, &JobMap::new());
        assert!(orphans.is_empty());
        assert!(!graph.has_pending_changes());
        graph.verify().unwrap();
    }

    #[test]
    fn topology_update_attaches_new_machines() {
        let mut graph = trivial_graph();
        let m0 = make_machine_topology("m0", 1);
        let topo = make_cluster_topology(vec![m0.clone()]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);
        let before = graph.num_nodes();

        let grown = make_cluster_topology(vec![m0, make_machine_topology("m1", 1)]);
        let resources = resource_map_of(&grown);
        let orphans = graph.update_resource_topology(&grown, &resources, &JobMap::new());
        assert!(orphans.is_empty());
        assert_eq!(graph.num_nodes(), before + 4);
        graph.verify().unwrap();
    }

    #[test]
    fn binding_prunes_non_winning_arcs() {
        let mut graph = trivial_graph();
        let topo = make_cluster_topology(vec![make_machine_topology("m0", 1)]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);

        let job = make_job("batch", 1);
        graph.add_or_update_job_nodes(&job, &resources);
        let arcs_before = graph.num_arcs();

        let pu = first_pu(&graph);
        let pu_rid = graph.node(pu).unwrap().resource_id.unwrap();
        graph.update_arcs_for_bound_task(&job.tasks[0], pu_rid);

        let tnode = graph.node(graph.task_node_id(1).unwrap()).unwrap();
        assert_eq!(tnode.kind, FlowNodeKind::ScheduledTask);
        assert_eq!(tnode.outgoing.len(), 1);
        assert_eq!(tnode.outgoing[&pu].kind, FlowArcKind::Running);
        // Two arcs pruned (unscheduled + wildcard), one running arc added.
        assert_eq!(graph.num_arcs(), arcs_before - 1);
        graph.verify().unwrap();
    }

    #[test]
    fn task_delete_restores_supply() {
        let mut graph = trivial_graph();
        let topo = make_cluster_topology(vec![make_machine_topology("m0", 1)]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);

        let job = make_job("batch", 1);
        graph.add_or_update_job_nodes(&job, &resources);
        graph.delete_task_node(1);

        assert!(graph.task_node_id(1).is_none());
        assert_eq!(graph.node(SINK_ID).unwrap().excess, 0);
        graph.verify().unwrap();
    }

    #[test]
    fn job_delete_removes_aggregator() {
        let mut graph = trivial_graph();
        let topo = make_cluster_topology(vec![make_machine_topology("m0", 1)]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);

        let job = make_job("batch", 3);
        graph.add_or_update_job_nodes(&job, &resources);
        graph.delete_nodes_for_job(job.id);

        assert!(graph.unsched_agg_id(job.id).is_none());
        assert_eq!(graph.node(SINK_ID).unwrap().excess, 0);
        // Back to the topology-only graph: sink, aggregator, machine,
        // socket, core, PU.
        assert_eq!(graph.num_nodes(), 6);
        graph.verify().unwrap();
    }

    #[test]
    fn machine_removal_reroutes_bound_task() {
        let mut graph = trivial_graph();
        let m0 = make_machine_topology("m0", 1);
        let m1 = make_machine_topology("m1", 1);
        let topo = make_cluster_topology(vec![m0.clone(), m1.clone()]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);

        let job = make_job("batch", 1);
        graph.add_or_update_job_nodes(&job, &resources);
        let jobs = job_map_of(&[job.clone()]);

        // Bind the task onto m0's PU, then drop m0 from the snapshot.
        let m0_pu = m0.children[0].children[0].children[0].descriptor.id;
        graph.update_arcs_for_bound_task(&job.tasks[0], m0_pu);
        graph.verify().unwrap();

        let shrunk = make_cluster_topology(vec![m1]);
        let resources = resource_map_of(&shrunk);
        let orphans = graph.update_resource_topology(&shrunk, &resources, &jobs);
        assert_eq!(orphans, vec![1]);

        let tnode = graph.node(graph.task_node_id(1).unwrap()).unwrap();
        assert_eq!(tnode.kind, FlowNodeKind::UnscheduledTask);
        let agg = graph.unsched_agg_id(job.id).unwrap();
        assert!(tnode.outgoing.contains_key(&agg));
        assert_eq!(tnode.excess, 1);
        graph.verify().unwrap();
    }

    #[test]
    fn last_machine_removal_restores_bypass() {
        let mut graph = trivial_graph();
        let m0 = make_machine_topology("m0", 1);
        let topo = make_cluster_topology(vec![m0]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);

        let empty = make_cluster_topology(vec![]);
        let resources = resource_map_of(&empty);
        graph.update_resource_topology(&empty, &resources, &JobMap::new());

        assert_eq!(graph.num_nodes(), 2);
        assert!(graph
            .node(CLUSTER_AGG_ID)
            .unwrap()
            .outgoing
            .contains_key(&SINK_ID));
        graph.verify().unwrap();
    }

    #[test]
    fn quincy_preference_creates_direct_arc() {
        let mut graph = FlowGraph::new(Box::new(QuincyCostModel::new()));
        let m0 = make_machine_topology("m0", 1);
        let mut m1 = make_machine_topology("m1", 1);
        m1.descriptor.cached_paths = vec!["/data/part-0".to_string()];
        let m1_id = m1.descriptor.id;
        let topo = make_cluster_topology(vec![m0, m1]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);

        let mut job = make_job("batch", 1);
        job.tasks[0] = with_inputs(job.tasks[0].clone(), &[("/data/part-0", 16 << 20)]);
        graph.add_or_update_job_nodes(&job, &resources);

        let tnode = graph.node(graph.task_node_id(1).unwrap()).unwrap();
        let m1_node = graph.resource_node_id(m1_id).unwrap();
        let preference = tnode.outgoing.get(&m1_node).expect("no direct arc to cached machine");
        assert_eq!(preference.kind, FlowArcKind::TaskToResource);
        assert_eq!(preference.cost, 0);
        graph.verify().unwrap();
    }

    // A cost model whose resource arc costs can be changed mid-test, to
    // exercise cost reconciliation on topology updates.
    struct SlidingCostModel {
        resource_cost: Arc<AtomicI64>,
    }

    impl conflux_cost::CostModel for SlidingCostModel {
        fn name(&self) -> &str {
            "sliding"
        }
        fn task_to_unscheduled_cost(&self, _: &conflux_core::types::TaskDescriptor) -> i64 {
            5
        }
        fn unscheduled_to_sink_cost(&self, _: &conflux_core::types::JobDescriptor) -> i64 {
            0
        }
        fn task_to_resource_cost(
            &self,
            _: &conflux_core::types::TaskDescriptor,
            _: &ResourceDescriptor,
        ) -> i64 {
            0
        }
        fn task_to_equiv_class_cost(
            &self,
            _: &conflux_core::types::TaskDescriptor,
            _: EquivClassId,
        ) -> i64 {
            2
        }
        fn equiv_class_to_resource_cost(&self, _: EquivClassId, _: &ResourceDescriptor) -> i64 {
            0
        }
        fn resource_to_resource_cost(
            &self,
            _: &ResourceDescriptor,
            _: &ResourceDescriptor,
        ) -> i64 {
            self.resource_cost.load(Ordering::Relaxed)
        }
        fn leaf_to_sink_cost(&self, _: &ResourceDescriptor) -> i64 {
            0
        }
        fn task_continuation_cost(&self, _: &conflux_core::types::TaskDescriptor) -> i64 {
            0
        }
    }

    #[test]
    fn topology_update_emits_cost_changes_only_when_changed() {
        let cost = Arc::new(AtomicI64::new(1));
        let mut graph = FlowGraph::new(Box::new(SlidingCostModel {
            resource_cost: cost.clone(),
        }));
        let topo = make_cluster_topology(vec![make_machine_topology("m0", 1)]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);
        graph.drain_changes();

        cost.store(3, Ordering::Relaxed);
        graph.update_resource_topology(&topo, &resources, &JobMap::new());
        let changed = graph
            .pending_changes()
            .iter()
            .filter(|c| matches!(c, GraphChange::ChangeArc { .. }))
            .count();
        // Four parent-child arcs re-costed: aggregator to machine, machine
        // to socket, socket to core, core to PU. The PU's sink arc keeps
        // its cost.
        assert_eq!(changed, 4);
        assert!(graph
            .pending_changes()
            .iter()
            .all(|c| matches!(c, GraphChange::ChangeArc { .. })));
        graph.verify().unwrap();
    }

    // --- Serialization round trips ---

    type NodeLine = (u64, i64);
    type ArcLine = (u64, u64, u64, u64, i64);

    fn parse_snapshot(text: &str) -> (BTreeMap<u64, i64>, BTreeSet<ArcLine>) {
        let mut nodes = BTreeMap::new();
        let mut arcs = BTreeSet::new();
        for line in text.lines() {
            let toks: Vec<&str> = line.split_whitespace().collect();
            match toks.first() {
                Some(&"n") => {
                    nodes.insert(toks[1].parse().unwrap(), toks[2].parse().unwrap());
                }
                Some(&"a") => {
                    arcs.insert((
                        toks[1].parse().unwrap(),
                        toks[2].parse().unwrap(),
                        toks[3].parse().unwrap(),
                        toks[4].parse().unwrap(),
                        toks[5].parse().unwrap(),
                    ));
                }
                _ => {}
            }
        }
        (nodes, arcs)
    }

    fn graph_state(graph: &FlowGraph) -> (BTreeMap<u64, i64>, BTreeSet<ArcLine>) {
        let mut nodes: BTreeMap<u64, i64> = BTreeMap::new();
        let mut arcs = BTreeSet::new();
        for id in graph.node_ids_sorted() {
            let node = graph.node(id).unwrap();
            if node.excess != 0 {
                nodes.insert(id, node.excess);
            }
            for arc in node.outgoing.values() {
                arcs.insert((arc.src, arc.dst, arc.cap_lower, arc.cap_upper, arc.cost));
            }
        }
        (nodes, arcs)
    }

    fn apply_delta(
        nodes: &mut BTreeMap<u64, i64>,
        arcs: &mut BTreeSet<ArcLine>,
        delta: &str,
    ) {
        for line in delta.lines() {
            let toks: Vec<&str> = line.split_whitespace().collect();
            match toks.first() {
                Some(&"n") => {
                    let id: u64 = toks[1].parse().unwrap();
                    let excess: i64 = toks[2].parse().unwrap();
                    // The comparison below only tracks nonzero excess, as
                    // the snapshot format does.
                    if excess != 0 {
                        nodes.insert(id, excess);
                    } else {
                        nodes.remove(&id);
                    }
                }
                Some(&"r") => {
                    let id: u64 = toks[1].parse().unwrap();
                    nodes.remove(&id);
                    arcs.retain(|a| a.0 != id && a.1 != id);
                }
                Some(&"a") => {
                    arcs.insert((
                        toks[1].parse().unwrap(),
                        toks[2].parse().unwrap(),
                        toks[3].parse().unwrap(),
                        toks[4].parse().unwrap(),
                        toks[5].parse().unwrap(),
                    ));
                }
                Some(&"d") => {
                    let src: u64 = toks[1].parse().unwrap();
                    let dst: u64 = toks[2].parse().unwrap();
                    arcs.retain(|a| !(a.0 == src && a.1 == dst));
                }
                Some(&"x") => {
                    let src: u64 = toks[1].parse().unwrap();
                    let dst: u64 = toks[2].parse().unwrap();
                    let cost: i64 = toks[3].parse().unwrap();
                    let old = arcs
                        .iter()
                        .find(|a| a.0 == src && a.1 == dst)
                        .copied()
                        .expect("cost change for unknown arc");
                    arcs.remove(&old);
                    arcs.insert((old.0, old.1, old.2, old.3, cost));
                }
                _ => {}
            }
        }
    }

    #[test]
    fn full_snapshot_parses_back_isomorphic() {
        let mut graph = trivial_graph();
        let topo = make_cluster_topology(vec![
            make_machine_topology("m0", 2),
            make_machine_topology("m1", 1),
        ]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);
        let job = make_job("batch", 3);
        graph.add_or_update_job_nodes(&job, &resources);

        let text = dimacs::full_snapshot_string(&graph);
        let (parsed_nodes, parsed_arcs) = parse_snapshot(&text);
        let (want_nodes, want_arcs) = graph_state(&graph);
        assert_eq!(parsed_nodes, want_nodes);
        assert_eq!(parsed_arcs, want_arcs);
        assert!(text.ends_with("c EOI\n"));
    }

    #[test]
    fn delta_replays_onto_previous_snapshot() {
        let mut graph = trivial_graph();
        let topo = make_cluster_topology(vec![make_machine_topology("m0", 2)]);
        let resources = resource_map_of(&topo);
        graph.add_resource_topology(&topo, &resources);
        graph.drain_changes();

        let snapshot = dimacs::full_snapshot_string(&graph);
        let (mut nodes, mut arcs) = parse_snapshot(&snapshot);

        let job = make_job("batch", 2);
        graph.add_or_update_job_nodes(&job, &resources);
        let pu = first_pu(&graph);
        let pu_rid = graph.node(pu).unwrap().resource_id.unwrap();
        graph.update_arcs_for_bound_task(&job.tasks[0], pu_rid);

        let delta = dimacs::delta_string(&graph.drain_changes());
        apply_delta(&mut nodes, &mut arcs, &delta);

        let (want_nodes, want_arcs) = graph_state(&graph);
        assert_eq!(nodes, want_nodes);
        assert_eq!(arcs, want_arcs);
    }
}
