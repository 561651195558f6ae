use std::collections::HashMap;

use tracing::debug;

use crate::types::EquivClassId;

/// Cap on retained samples per class; older observations age out of the
/// running average implicitly once this many have been folded in.
const MAX_SAMPLES_PER_CLASS: u64 = 1024;

#[derive(Debug, Default, Clone, Copy)]
struct RuntimeStats {
    total_ms: u64,
    samples: u64,
}

/// Accumulated runtime observations, keyed by task equivalence class.
///
/// Completion events feed it; runtime-aware cost models read estimates from
/// it. There is no persistence: a fresh process starts with no priors.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    runtimes: HashMap<EquivClassId, RuntimeStats>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observed task runtime into the class average.
    pub fn record_runtime(&mut self, class: EquivClassId, runtime_ms: u64) {
        let stats = self.runtimes.entry(class).or_default();
        if stats.samples >= MAX_SAMPLES_PER_CLASS {
            stats.total_ms -= stats.total_ms / stats.samples;
            stats.samples -= 1;
        }
        stats.total_ms += runtime_ms;
        stats.samples += 1;
        debug!(
            "Recorded runtime {}ms for class {:#x} ({} samples)",
            runtime_ms, class, stats.samples
        );
    }

    /// Average observed runtime for the class, if any task of it has
    /// completed yet.
    pub fn estimated_runtime_ms(&self, class: EquivClassId) -> Option<u64> {
        self.runtimes
            .get(&class)
            .filter(|s| s.samples > 0)
            .map(|s| s.total_ms / s.samples)
    }

    pub fn num_classes(&self) -> usize {
        self.runtimes.len()
    }
}
