//! Wall-clock timer used for reporting only

use std::time::{Duration, Instant};

/// Start/stop stopwatch
#[derive(Debug, Clone, Default)]
pub struct Timer {
    started: Option<Instant>,
    elapsed: Duration,
}

impl Timer {
    /// New, stopped timer
    pub fn new() -> Self {
        Self::default()
    }

    /// New timer that is already running
    pub fn started() -> Self {
        let mut t = Self::new();
        t.start();
        t
    }

    /// Start (or restart) timing
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.elapsed = Duration::ZERO;
    }

    /// Stop timing and keep the elapsed interval
    pub fn stop(&mut self) {
        if let Some(start) = self.started.take() {
            self.elapsed = start.elapsed();
        }
    }

    /// Seconds between `start` and `stop`, or since `start` while running
    pub fn elapsed_secs(&self) -> f64 {
        match self.started {
            Some(start) => start.elapsed().as_secs_f64(),
            None => self.elapsed.as_secs_f64(),
        }
    }

    /// Log the elapsed time at info level and return it
    pub fn log_elapsed(&self, name: &str) -> f64 {
        let secs = self.elapsed_secs();
        log::info!("[{}]: {:.6} s", name, secs);
        secs
    }
}
