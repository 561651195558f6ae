use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use conflux_core::config::ConfluxConfig;
use conflux_core::error::CoreError;
use conflux_core::knowledge::KnowledgeBase;
use conflux_core::types::{
    JobDescriptor, JobId, JobMap, ResourceDescriptor, ResourceId, ResourceKind, ResourceMap,
    ResourceTopology, TaskId, TaskState,
};
use conflux_cost::create_cost_model;
use conflux_flowgraph::{dimacs, ChangeStats, FlowGraph};
use conflux_solver::{extract_deltas, SchedulingDelta, SolverBackend, SolverProcess};

/// Min-cost flow scheduler: mirrors the cluster into a flow graph, hands
/// each round to the solver, and applies the decoded placements.
///
/// Every event handler takes the scheduling lock for its full duration,
/// the solver exchange included. Events racing in from several sources are
/// linearized here; ordering among truly concurrent events is arbitrary
/// but consistent afterwards.
pub struct FlowScheduler<S: SolverBackend> {
    inner: Mutex<Inner<S>>,
}

struct Inner<S> {
    graph: FlowGraph,
    solver: S,
    jobs: JobMap,
    task_index: HashMap<TaskId, JobId>,
    resources: ResourceMap,
    topology: ResourceTopology,
    bindings: HashMap<TaskId, ResourceId>,
    knowledge: Arc<StdMutex<KnowledgeBase>>,
    round: u64,
    dump_path: Option<PathBuf>,
}

impl<S: SolverBackend> FlowScheduler<S> {
    /// Build a scheduler around an already-constructed solver backend.
    pub fn with_solver(config: &ConfluxConfig, solver: S) -> Self {
        let knowledge = Arc::new(StdMutex::new(KnowledgeBase::new()));
        Self::with_solver_and_knowledge(config, solver, knowledge)
    }

    pub fn with_solver_and_knowledge(
        config: &ConfluxConfig,
        solver: S,
        knowledge: Arc<StdMutex<KnowledgeBase>>,
    ) -> Self {
        let cost_model = create_cost_model(config.scheduling.cost_model, knowledge.clone());
        info!("Flow scheduler using the {} cost model", config.scheduling.cost_model);
        let root = ResourceDescriptor::new(Uuid::new_v4(), ResourceKind::Coordinator, "head");
        Self {
            inner: Mutex::new(Inner {
                graph: FlowGraph::new(cost_model),
                solver,
                jobs: JobMap::new(),
                task_index: HashMap::new(),
                resources: ResourceMap::new(),
                topology: ResourceTopology::leaf(root),
                bindings: HashMap::new(),
                knowledge,
                round: 0,
                dump_path: config.scheduling.debug_dump_graph_path.clone(),
            }),
        }
    }

    /// Admit or update a job. Runs a scheduling round if the job has at
    /// least one runnable task; returns how many tasks got placed.
    pub async fn schedule_job(&self, job: JobDescriptor) -> u64 {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        info!("Scheduling job {} ({} tasks)", job.id, job.tasks.len());

        let job_id = job.id;
        for task in &job.tasks {
            inner.task_index.insert(task.id, job_id);
        }
        let runnable = job.runnable_tasks().count();
        inner.jobs.insert(job_id, job);
        if runnable == 0 {
            info!("Job {} has no runnable tasks, skipping round", job_id);
            return 0;
        }

        inner
            .graph
            .add_or_update_job_nodes(&inner.jobs[&job_id], &inner.resources);
        let placed = Self::run_round(inner).await;
        info!("Job {}: round placed {} tasks", job_id, placed);
        placed
    }

    /// All tasks of the job are done; drop its graph nodes, then its
    /// descriptors. Node removal strictly precedes descriptor removal.
    pub async fn handle_job_completion(&self, job: JobId) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        inner.graph.delete_nodes_for_job(job);
        if let Some(jd) = inner.jobs.remove(&job) {
            for task in &jd.tasks {
                inner.task_index.remove(&task.id);
                inner.bindings.remove(&task.id);
            }
        }
        info!("Job {} completed", job);
    }

    /// One task finished; record its observed runtime, drop its node, then
    /// its descriptor.
    pub async fn handle_task_completion(&self, task: TaskId, runtime_ms: u64) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let job_id = *inner
            .task_index
            .get(&task)
            .unwrap_or_else(|| panic!("completion for unknown task {}", task));
        {
            let jd = inner
                .jobs
                .get(&job_id)
                .unwrap_or_else(|| panic!("job descriptor {} missing on completion", job_id));
            let td = jd
                .tasks
                .iter()
                .find(|t| t.id == task)
                .unwrap_or_else(|| panic!("task descriptor {} missing on completion", task));
            inner
                .knowledge
                .lock()
                .unwrap()
                .record_runtime(td.equivalence_class(), runtime_ms);
        }

        inner.graph.delete_task_node(task);
        if let Some(jd) = inner.jobs.get_mut(&job_id) {
            jd.tasks.retain(|t| t.id != task);
        }
        inner.task_index.remove(&task);
        inner.bindings.remove(&task);
        info!("Task {} completed in {}ms", task, runtime_ms);
    }

    /// Merge a machine's (or whole coordinator's) topology snapshot and
    /// reconcile the flow graph against it.
    pub async fn register_resource(&self, topology: ResourceTopology) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if topology.descriptor.kind == ResourceKind::Coordinator {
            inner.topology = topology;
        } else {
            let id = topology.descriptor.id;
            if let Some(slot) = inner
                .topology
                .children
                .iter_mut()
                .find(|c| c.descriptor.id == id)
            {
                *slot = topology;
            } else {
                inner.topology.children.push(topology);
            }
        }
        Self::sync_topology(inner);
    }

    /// A machine left the cluster. Its subtree is removed from the graph;
    /// tasks bound there are reverted to runnable and rescheduled on a
    /// later round.
    pub async fn deregister_resource(&self, resource: ResourceId) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        inner.topology.children.retain(|c| c.descriptor.id != resource);
        Self::sync_topology(inner);
    }

    /// Drive one scheduling round outside of a job event (periodic
    /// rescheduling of waiting tasks).
    pub async fn run_scheduling_round(&self) -> u64 {
        let mut guard = self.inner.lock().await;
        Self::run_round(&mut guard).await
    }

    pub async fn binding_of(&self, task: TaskId) -> Option<ResourceId> {
        self.inner.lock().await.bindings.get(&task).copied()
    }

    pub async fn graph_stats(&self) -> (usize, usize) {
        let guard = self.inner.lock().await;
        (guard.graph.num_nodes(), guard.graph.num_arcs())
    }

    /// Structural invariant check, for tests and debug assertions.
    pub async fn verify_invariants(&self) -> Result<(), String> {
        self.inner.lock().await.graph.verify()
    }

    fn sync_topology(inner: &mut Inner<S>) {
        inner.resources.clear();
        let resources = &mut inner.resources;
        inner.topology.for_each(&mut |t| {
            resources.insert(t.descriptor.id, t.descriptor.clone());
        });

        if inner.graph.num_nodes() == 2 {
            inner.graph.add_resource_topology(&inner.topology, &inner.resources);
        } else {
            let orphans =
                inner
                    .graph
                    .update_resource_topology(&inner.topology, &inner.resources, &inner.jobs);
            for task in orphans {
                inner.bindings.remove(&task);
                if let Some(job_id) = inner.task_index.get(&task) {
                    if let Some(jd) = inner.jobs.get_mut(job_id) {
                        if let Some(td) = jd.tasks.iter_mut().find(|t| t.id == task) {
                            td.state = TaskState::Runnable;
                        }
                    }
                }
            }
        }
    }

    /// One round: refresh wait costs, serialize, solve, decode, apply.
    /// A solver transport failure costs the round (zero placements); the
    /// dispatcher already demands a full snapshot for the next one.
    async fn run_round(inner: &mut Inner<S>) -> u64 {
        inner.round += 1;
        let round = inner.round;
        inner.graph.update_unscheduled_costs(&inner.jobs);

        if let Some(dir) = inner.dump_path.clone() {
            Self::dump_snapshot(inner, &dir, round);
        }

        let input = if inner.solver.needs_full_snapshot() {
            let folded = inner.graph.drain_changes();
            debug!(
                "Round {}: emitting full snapshot ({} change entries folded in)",
                round,
                folded.len()
            );
            dimacs::full_snapshot_string(&inner.graph)
        } else {
            let changes = inner.graph.drain_changes();
            debug!(
                "Round {}: emitting delta [{}]",
                round,
                ChangeStats::summarize(&changes)
            );
            dimacs::delta_string(&changes)
        };

        let records = match inner.solver.submit(&input).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Round {} lost to solver failure: {}", round, e);
                return 0;
            }
        };

        let deltas = extract_deltas(&inner.graph, &records, &inner.bindings);
        let placed = Self::apply_deltas(inner, deltas);

        // Tasks that stayed runnable waited one more round.
        for jd in inner.jobs.values_mut() {
            for td in &mut jd.tasks {
                if td.state.is_runnable() {
                    td.rounds_unscheduled += 1;
                }
            }
        }

        debug!("Round {} placed {} tasks", round, placed);
        placed
    }

    /// Apply placement deltas: bind the descriptor, pin the running arc,
    /// move the job to running. Returns the number of placements applied.
    fn apply_deltas(inner: &mut Inner<S>, deltas: Vec<SchedulingDelta>) -> u64 {
        let mut placed = 0u64;
        let mut unapplied = 0usize;
        for delta in deltas {
            match delta {
                SchedulingDelta::Place {
                    task_id,
                    resource_id,
                    leaf_id,
                } => {
                    let job_id = *inner
                        .task_index
                        .get(&task_id)
                        .unwrap_or_else(|| panic!("placement for unknown task {}", task_id));
                    let jd = inner
                        .jobs
                        .get_mut(&job_id)
                        .unwrap_or_else(|| panic!("job descriptor {} missing", job_id));
                    let td = jd
                        .tasks
                        .iter_mut()
                        .find(|t| t.id == task_id)
                        .unwrap_or_else(|| panic!("task descriptor {} missing", task_id));
                    td.state = TaskState::Assigned;
                    let td_snapshot = td.clone();
                    if jd.state != conflux_core::types::JobState::Running {
                        jd.state = conflux_core::types::JobState::Running;
                    }
                    inner.graph.update_arcs_for_bound_task(&td_snapshot, leaf_id);
                    inner.bindings.insert(task_id, resource_id);
                    info!("Placed task {} on resource {}", task_id, resource_id);
                    placed += 1;
                }
                SchedulingDelta::Noop { task_id } => {
                    debug!("Task {} keeps its placement", task_id);
                }
                SchedulingDelta::Preempt { task_id } => {
                    warn!("Preemption delta for task {} is not supported", task_id);
                    unapplied += 1;
                }
            }
        }
        if unapplied > 0 {
            warn!("Not all deltas were actioned, {} remain", unapplied);
        }
        placed
    }

    fn dump_snapshot(inner: &Inner<S>, dir: &std::path::Path, round: u64) {
        let text = dimacs::full_snapshot_string(&inner.graph);
        let path = dir.join(format!("round-{}.dimacs", round));
        if let Err(e) = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, text)) {
            warn!("Could not dump round {} snapshot to {:?}: {}", round, path, e);
        }
    }
}

impl FlowScheduler<SolverProcess> {
    /// Production constructor: spawn the external solver configured in
    /// `config` and wire it up.
    pub fn from_config(config: &ConfluxConfig) -> Result<Self, CoreError> {
        let solver = SolverProcess::spawn(&config.solver)?;
        Ok(Self::with_solver(config, solver))
    }
}
