//! Optional phase timing
//!
//! Provers, verifiers and batch sessions report how long each protocol
//! phase took to an attached [`PhaseObserver`]. Nothing is recorded when no
//! observer is attached.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::debug;

/// Receives the duration of each completed phase
pub trait PhaseObserver: Send + Sync {
    fn on_phase(&self, phase: &str, elapsed: Duration);
}

/// Shared observer handle
pub type SharedObserver = Arc<dyn PhaseObserver>;

/// Emits one `debug!` line per phase
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl PhaseObserver for LogObserver {
    fn on_phase(&self, phase: &str, elapsed: Duration) {
        debug!("{phase} took {:.3} ms", elapsed.as_secs_f64() * 1000.0);
    }
}

/// Collects phase timings in memory
#[derive(Debug, Default)]
pub struct PhaseRecorder {
    phases: Mutex<Vec<(String, Duration)>>,
}

impl PhaseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded phases in completion order
    pub fn phases(&self) -> Vec<(String, Duration)> {
        self.phases.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Sum of all recorded phases whose name starts with `prefix`
    pub fn total(&self, prefix: &str) -> Duration {
        self.phases()
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(_, d)| *d)
            .sum()
    }
}

impl PhaseObserver for PhaseRecorder {
    fn on_phase(&self, phase: &str, elapsed: Duration) {
        if let Ok(mut phases) = self.phases.lock() {
            phases.push((phase.to_string(), elapsed));
        }
    }
}

/// Run `f`, reporting its duration under `phase`
pub(crate) fn observe<T>(observer: Option<&SharedObserver>, phase: &str, f: impl FnOnce() -> T) -> T {
    match observer {
        None => f(),
        Some(obs) => {
            let start = Instant::now();
            let out = f();
            obs.on_phase(phase, start.elapsed());
            out
        }
    }
}
