use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("solver transport error: {0}")]
    SolverTransport(String),

    #[error("malformed solver record: {0:?}")]
    MalformedRecord(String),

    #[error("solver timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("solver process is dead")]
    SolverDead,

    #[error("unknown cost model: {0:?}")]
    UnknownCostModel(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl CoreError {
    /// Transport-level solver failures are recovered by restarting the
    /// solver; everything else propagates.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::SolverTransport(_)
                | CoreError::Timeout(_)
                | CoreError::SolverDead
                | CoreError::Io(_)
        )
    }
}
