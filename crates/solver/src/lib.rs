pub mod dispatcher;
pub mod extractor;

pub use dispatcher::{FlowRecord, SolverBackend, SolverProcess};
pub use extractor::{extract_deltas, SchedulingDelta};
