use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use uuid::Uuid;

use conflux_core::config::{self, ConfluxConfig, CostModelKind};
use conflux_core::types::{
    JobDescriptor, ResourceDescriptor, ResourceKind, ResourceTopology, TaskDescriptor,
};
use conflux_scheduler::FlowScheduler;

#[derive(Parser)]
#[command(name = "confluxd", about = "Conflux min-cost flow cluster scheduler")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cost model override: trivial, random, sjf or quincy
    #[arg(long)]
    cost_model: Option<CostModelKind>,

    /// Path to the external min-cost flow solver executable
    #[arg(long)]
    solver: Option<PathBuf>,

    /// Per-round solver timeout in milliseconds
    #[arg(long)]
    solver_timeout: Option<u64>,

    /// Dump each round's problem to this directory
    #[arg(long)]
    dump_graphs: Option<PathBuf>,

    /// Synthetic machines to register for the demo workload
    #[arg(long, default_value = "4")]
    machines: usize,

    /// PUs per synthetic machine
    #[arg(long, default_value = "8")]
    pus: usize,

    /// Tasks in the demo job (0 = register resources and idle)
    #[arg(long, default_value = "16")]
    tasks: u64,

    /// Log to stdout instead of the rolling file
    #[arg(long)]
    stdout_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.stdout_log {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .init();
        run(cli).await
    } else {
        let log_dir = config::log_dir();
        std::fs::create_dir_all(&log_dir)?;
        let file_appender = tracing_appender::rolling::daily(&log_dir, "confluxd.log");
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(non_blocking)
            .with_ansi(false)
            .init();
        run(cli).await
    }
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "confluxd=info,conflux_scheduler=info,conflux_flowgraph=info".into())
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config::data_dir().join("config.toml"));
    let mut config: ConfluxConfig = config::load_config(&config_path);

    if let Some(kind) = cli.cost_model {
        config.scheduling.cost_model = kind;
    }
    if let Some(path) = cli.solver {
        config.solver.solver_path = path;
    }
    if let Some(timeout) = cli.solver_timeout {
        config.solver.solver_timeout_ms = timeout;
    }
    if let Some(dir) = cli.dump_graphs {
        config.scheduling.debug_dump_graph_path = Some(dir);
    }

    info!(
        "Starting confluxd (cost model {}, solver {:?})",
        config.scheduling.cost_model, config.solver.solver_path
    );
    let scheduler = FlowScheduler::from_config(&config)?;

    for i in 0..cli.machines {
        scheduler
            .register_resource(synthetic_machine(&format!("m{}", i), cli.pus))
            .await;
    }
    info!("Registered {} machines with {} PUs each", cli.machines, cli.pus);

    if cli.tasks > 0 {
        let mut job = JobDescriptor::new(Uuid::new_v4(), "demo");
        for i in 0..cli.tasks {
            job.tasks
                .push(TaskDescriptor::new(i + 1, job.id, format!("demo-t{}", i)));
        }
        let total = cli.tasks;
        let mut placed = scheduler.schedule_job(job).await;
        info!("Demo job: {} of {} tasks placed on the first round", placed, total);

        // Keep rescheduling until the demand is met or progress stops.
        while placed < total {
            let round_placed = scheduler.run_scheduling_round().await;
            if round_placed == 0 {
                warn!(
                    "{} tasks remain unplaced and no progress was made, stopping",
                    total - placed
                );
                break;
            }
            placed += round_placed;
        }
        info!("Demo job: {} of {} tasks placed", placed, total);
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}

fn synthetic_machine(name: &str, pus: usize) -> ResourceTopology {
    let machine = ResourceDescriptor::new(Uuid::new_v4(), ResourceKind::Machine, name);
    let socket = ResourceDescriptor::new(
        Uuid::new_v4(),
        ResourceKind::Socket,
        format!("{}-socket0", name),
    );
    let mut socket_topo = ResourceTopology::leaf(socket);
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
        socket_topo.children.push(core_topo);
    }
    let mut machine_topo = ResourceTopology::leaf(machine);
    machine_topo.children.push(socket_topo);
    machine_topo
}
