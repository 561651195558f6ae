use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Cost model driving arc costs in the flow graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CostModelKind {
    Trivial,
    Random,
    Sjf,
    Quincy,
}

impl FromStr for CostModelKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trivial" => Ok(CostModelKind::Trivial),
            "random" => Ok(CostModelKind::Random),
            "sjf" => Ok(CostModelKind::Sjf),
            "quincy" => Ok(CostModelKind::Quincy),
            other => Err(CoreError::UnknownCostModel(other.to_string())),
        }
    }
}

impl std::fmt::Display for CostModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CostModelKind::Trivial => write!(f, "trivial"),
            CostModelKind::Random => write!(f, "random"),
            CostModelKind::Sjf => write!(f, "sjf"),
            CostModelKind::Quincy => write!(f, "quincy"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Path to the external min-cost flow solver executable.
    pub solver_path: PathBuf,
    /// Extra arguments passed to the solver on spawn.
    #[serde(default)]
    pub solver_args: Vec<String>,
    /// Per-round timeout; a slower solver is killed and respawned.
    pub solver_timeout_ms: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            solver_path: PathBuf::from("cs2"),
            solver_args: Vec::new(),
            solver_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub cost_model: CostModelKind,
    /// If set, each round's full snapshot is dumped here for offline
    /// inspection (one file per round).
    pub debug_dump_graph_path: Option<PathBuf>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            cost_model: CostModelKind::Trivial,
            debug_dump_graph_path: None,
        }
    }
}

/// Top-level configuration aggregating all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfluxConfig {
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub solver: SolverConfig,
}

/// Returns `~/.conflux/` for logs and graph dumps.
pub fn data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".conflux")
    } else {
        PathBuf::from(".conflux")
    }
}

pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Load configuration from a TOML file.
/// Falls back to defaults if the file is missing or unparsable.
pub fn load_config(path: &std::path::Path) -> ConfluxConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::warn!("Failed to parse config {:?}: {}, using defaults", path, e);
                ConfluxConfig::default()
            }
        },
        Err(_) => {
            tracing::debug!("Config file {:?} not found, using defaults", path);
            ConfluxConfig::default()
        }
    }
}

/// Save configuration to a TOML file, creating parent directories.
pub fn save_config(config: &ConfluxConfig, path: &std::path::Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    tracing::info!("Config saved to {:?}", path);
    Ok(())
}
