//! Engine-wide tunables.
//!
//! The original reads most of these from command-line flags
//! (`rt_types.h`'s `RECURSION_LIMIT`, `WATCH_LIMIT`) rather than a struct;
//! this crate collects them into one value so embedders can override
//! them without touching process globals, following `dfir_rs`'s
//! `HydroflowBuilder`-style config-as-a-value convention.

/// Reduction limits and feature toggles for one [`crate::eval::Engine`].
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Maximum nested `reduce` call depth before treating further
    /// recursion as a fatal [`crate::error::EvalError::RecursionLimit`]
    /// rather than overflowing the native stack.
    pub recursion_limit: usize,
    /// Maximum number of priority-queue passes [`crate::reduce`] will run
    /// before giving up on a request that keeps returning `Delay`.
    pub delay_limit: usize,
    /// Maximum live alt-set field ids before
    /// [`crate::altset::AltIdAllocator`] refuses further allocation.
    /// Clamped to [`crate::altset::AltSet::FIELD_COUNT`] when the
    /// `Engine` is built — the bitmask physically cannot hold more.
    pub max_alt_ids: u32,
    /// Whether primitive operator handlers record trace journal entries
    /// for partial evaluation (spec.md §4.I). Disabled by default since
    /// the external codegen backend consuming the journal is out of
    /// scope here.
    pub trace_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recursion_limit: 5_000,
            delay_limit: 10_000,
            max_alt_ids: crate::altset::AltSet::FIELD_COUNT,
            trace_enabled: false,
        }
    }
}

impl EngineConfig {
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_delay_limit(mut self, limit: usize) -> Self {
        self.delay_limit = limit;
        self
    }

    pub fn with_max_alt_ids(mut self, max: u32) -> Self {
        self.max_alt_ids = max;
        self
    }

    pub fn with_trace_enabled(mut self, enabled: bool) -> Self {
        self.trace_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_altset_field_count() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_alt_ids, crate::altset::AltSet::FIELD_COUNT);
        assert!(!cfg.trace_enabled);
    }

    #[test]
    fn builder_methods_override_fields() {
        let cfg = EngineConfig::default()
            .with_recursion_limit(10)
            .with_delay_limit(20)
            .with_max_alt_ids(4)
            .with_trace_enabled(true);
        assert_eq!(cfg.recursion_limit, 10);
        assert_eq!(cfg.delay_limit, 20);
        assert_eq!(cfg.max_alt_ids, 4);
        assert!(cfg.trace_enabled);
    }
}
