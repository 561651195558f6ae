use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use uuid::Uuid;

use conflux_core::error::CoreError;
use conflux_core::types::{
    DataRef, JobDescriptor, ResourceDescriptor, ResourceKind, ResourceTopology, TaskDescriptor,
};
use conflux_solver::{FlowRecord, SolverBackend};

// --- Fixtures ---

pub fn make_machine_topology(name: &str, pus: usize) -> ResourceTopology {
    let machine = ResourceDescriptor::new(Uuid::new_v4(), ResourceKind::Machine, name);
    let mut machine_topo = ResourceTopology::leaf(machine);
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
        machine_topo.children.push(core_topo);
    }
    machine_topo
}

pub fn make_job(name: &str, first_task_id: u64, num_tasks: u64) -> JobDescriptor {
    let mut job = JobDescriptor::new(Uuid::new_v4(), name);
    for i in 0..num_tasks {
        job.tasks.push(TaskDescriptor::new(
            first_task_id + i,
            job.id,
            format!("{}-t{}", name, i),
        ));
    }
    job
}

pub fn task_with_inputs(task: &mut TaskDescriptor, inputs: &[(&str, u64)]) {
    task.inputs = inputs
        .iter()
        .map(|(path, size)| DataRef {
            path: path.to_string(),
            size_bytes: *size,
        })
        .collect();
}

// --- In-process reference solver ---

#[derive(Debug, Clone, Copy)]
struct ArcState {
    cap: u64,
    cost: i64,
}

/// Shared observation handles for a `ReferenceSolver` that has been moved
/// into a scheduler.
#[derive(Debug, Clone, Default)]
pub struct SolverProbe {
    pub submissions: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    pub full_snapshots: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    /// Set to fail the next submission, simulating a solver crash.
    pub fail_next: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl SolverProbe {
    pub fn submissions(&self) -> usize {
        self.submissions.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn full_snapshots(&self) -> usize {
        self.full_snapshots.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn fail_next_round(&self) {
        self.fail_next.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

/// A real min-cost max-flow solver that speaks the dispatcher's wire
/// format: it consumes full snapshots and incremental patches, keeps the
/// problem across rounds like the external solver would, and answers with
/// `f` records. Successive shortest augmenting paths; small inputs only.
#[derive(Debug, Default)]
pub struct ReferenceSolver {
    nodes: BTreeMap<u64, i64>,
    arcs: BTreeMap<(u64, u64), ArcState>,
    primed: bool,
    dead: bool,
    pub probe: SolverProbe,
}

impl ReferenceSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probe(probe: SolverProbe) -> Self {
        Self {
            probe,
            ..Self::default()
        }
    }

    fn apply(&mut self, problem: &str) {
        for line in problem.lines() {
            let toks: Vec<&str> = line.split_whitespace().collect();
            match toks.first().copied() {
                Some("p") => {
                    self.nodes.clear();
                    self.arcs.clear();
                    self.probe
                        .full_snapshots
                        .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
                Some("n") => {
                    let id: u64 = toks[1].parse().unwrap();
                    let excess: i64 = toks[2].parse().unwrap();
                    self.nodes.insert(id, excess);
                }
                Some("a") => {
                    let src: u64 = toks[1].parse().unwrap();
                    let dst: u64 = toks[2].parse().unwrap();
                    let cap: u64 = toks[4].parse().unwrap();
                    let cost: i64 = toks[5].parse().unwrap();
                    self.nodes.entry(src).or_insert(0);
                    self.nodes.entry(dst).or_insert(0);
                    self.arcs.insert((src, dst), ArcState { cap, cost });
                }
                Some("d") => {
                    let src: u64 = toks[1].parse().unwrap();
                    let dst: u64 = toks[2].parse().unwrap();
                    self.arcs.remove(&(src, dst));
                }
                Some("x") => {
                    let src: u64 = toks[1].parse().unwrap();
                    let dst: u64 = toks[2].parse().unwrap();
                    let cost: i64 = toks[3].parse().unwrap();
                    if let Some(arc) = self.arcs.get_mut(&(src, dst)) {
                        arc.cost = cost;
                    }
                }
                Some("r") => {
                    let id: u64 = toks[1].parse().unwrap();
                    self.nodes.remove(&id);
                    self.arcs.retain(|(s, d), _| *s != id && *d != id);
                }
                _ => {}
            }
        }
    }

    fn solve(&self) -> Vec<FlowRecord> {
        let ids: Vec<u64> = self.nodes.keys().copied().collect();
        let index: HashMap<u64, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let n = ids.len() + 2;
        let source = ids.len();
        let target = ids.len() + 1;

        let total_supply: u64 = self
            .nodes
            .values()
            .filter(|e| **e > 0)
            .map(|e| *e as u64)
            .sum();

        struct Edge {
            to: usize,
            cap: u64,
            cost: i64,
        }
        let mut edges: Vec<Edge> = Vec::new();
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
        fn add_edge(
            edges: &mut Vec<Edge>,
            adj: &mut [Vec<usize>],
            u: usize,
            v: usize,
            cap: u64,
            cost: i64,
        ) {
            adj[u].push(edges.len());
            edges.push(Edge { to: v, cap, cost });
            adj[v].push(edges.len());
            edges.push(Edge {
                to: u,
                cap: 0,
                cost: -cost,
            });
        }

        let arc_list: Vec<(u64, u64)> = self.arcs.keys().copied().collect();
        for (src, dst) in &arc_list {
            let arc = self.arcs[&(*src, *dst)];
            let cap = arc.cap.min(total_supply);
            add_edge(&mut edges, &mut adj, index[src], index[dst], cap, arc.cost);
        }
        for (id, excess) in &self.nodes {
            if *excess > 0 {
                add_edge(&mut edges, &mut adj, source, index[id], *excess as u64, 0);
            } else if *excess < 0 {
                add_edge(&mut edges, &mut adj, index[id], target, (-excess) as u64, 0);
            }
        }

        // Successive shortest paths with SPFA on the residual graph.
        loop {
            let mut dist = vec![i64::MAX; n];
            let mut prev_edge = vec![usize::MAX; n];
            let mut in_queue = vec![false; n];
            dist[source] = 0;
            let mut queue = std::collections::VecDeque::from([source]);
            while let Some(u) = queue.pop_front() {
                in_queue[u] = false;
                for &e in &adj[u] {
                    let edge = &edges[e];
                    if edge.cap == 0 || dist[u] == i64::MAX {
                        continue;
                    }
                    let candidate = dist[u] + edge.cost;
                    if candidate < dist[edge.to] {
                        dist[edge.to] = candidate;
                        prev_edge[edge.to] = e;
                        if !in_queue[edge.to] {
                            in_queue[edge.to] = true;
                            queue.push_back(edge.to);
                        }
                    }
                }
            }
            if dist[target] == i64::MAX {
                break;
            }

            let mut bottleneck = u64::MAX;
            let mut at = target;
            while at != source {
                let e = prev_edge[at];
                bottleneck = bottleneck.min(edges[e].cap);
                at = edges[e ^ 1].to;
            }
            let mut at = target;
            while at != source {
                let e = prev_edge[at];
                edges[e].cap -= bottleneck;
                edges[e ^ 1].cap += bottleneck;
                at = edges[e ^ 1].to;
            }
        }

        let mut records = Vec::new();
        for (i, (src, dst)) in arc_list.iter().enumerate() {
            let flow = edges[2 * i + 1].cap;
            if flow > 0 {
                records.push(FlowRecord {
                    src: *src,
                    dst: *dst,
                    flow,
                });
            }
        }
        records
    }
}

#[async_trait]
impl SolverBackend for ReferenceSolver {
    async fn submit(&mut self, problem: &str) -> Result<Vec<FlowRecord>, CoreError> {
        self.probe
            .submissions
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self
            .probe
            .fail_next
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            self.dead = true;
            return Err(CoreError::SolverTransport("injected crash".to_string()));
        }
        self.apply(problem);
        self.primed = true;
        self.dead = false;
        Ok(self.solve())
    }

    fn needs_full_snapshot(&self) -> bool {
        !self.primed || self.dead
    }

    async fn restart(&mut self) -> Result<(), CoreError> {
        self.nodes.clear();
        self.arcs.clear();
        self.primed = false;
        self.dead = false;
        Ok(())
    }
}
