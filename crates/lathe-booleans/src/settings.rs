//! Per-run settings for boolean operations.
//!
//! All knobs are passed explicitly into `perform`; there is no global
//! state, so concurrent runs with different settings cannot interfere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation token.
///
/// Clone freely; all clones observe the same flag. The kernel polls the
/// token between candidate pairs and between stages, so cancellation takes
/// effect at the next poll, not immediately.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Settings for one boolean run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Extra tolerance added on top of both shapes' stored tolerances at
    /// every proximity comparison. Negative values are clamped to zero.
    pub fuzzy_value: f64,
    /// Dispatch candidate pairs through rayon when true.
    pub run_parallel: bool,
    /// Cancellation token polled during the run.
    pub cancel: CancelToken,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            fuzzy_value: 0.0,
            run_parallel: true,
            cancel: CancelToken::new(),
        }
    }
}

impl RunSettings {
    /// Default settings with a fuzzy value.
    pub fn with_fuzzy(fuzzy_value: f64) -> Self {
        Self {
            fuzzy_value: fuzzy_value.max(0.0),
            ..Self::default()
        }
    }

    /// The fuzzy value, clamped to be non-negative.
    pub fn fuzzy(&self) -> f64 {
        self.fuzzy_value.max(0.0)
    }
}
