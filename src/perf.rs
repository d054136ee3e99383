//! Lightweight performance instrumentation.
//!
//! Timings and events go through `tracing`; nothing is printed unless a
//! subscriber is installed and, for scopes, reporting has been enabled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug)]
pub struct Scope {
    name: &'static str,
    start: Instant,
}

impl Scope {
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if !is_enabled() {
            return;
        }
        tracing::info!(
            target: "instaview::perf",
            scope = self.name,
            elapsed_ms = self.elapsed_ms(),
            "perf"
        );
    }
}

pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn scope(name: &'static str) -> Scope {
    Scope {
        name,
        start: Instant::now(),
    }
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn log_event(name: &str, detail: impl AsRef<str>) {
    tracing::debug!(target: "instaview::perf", event = name, detail = detail.as_ref());
}
