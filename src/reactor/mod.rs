//! The reactor loop and its supporting readiness/timer machinery.

mod core;
mod poller;
mod timer;

pub use core::{DEFAULT_QUANTUM, Reactor, ReactorHandle};

use std::io;
use std::time::Duration;

/// Builder for a [`Reactor`], mirroring a typical runtime's
/// `RuntimeBuilder` in spirit and name.
#[derive(Debug, Clone)]
pub struct ReactorBuilder {
    quantum: Duration,
    io_capacity: usize,
    trace_ticks: bool,
}

impl Default for ReactorBuilder {
    fn default() -> Self {
        Self {
            quantum: DEFAULT_QUANTUM,
            io_capacity: 64,
            trace_ticks: false,
        }
    }
}

impl ReactorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the default poll quantum — the longest the loop will
    /// block when no timer is pending.
    pub fn quantum(mut self, quantum: Duration) -> Self {
        self.quantum = quantum;
        self
    }

    /// Sets the initial capacity reserved for the fd→transport maps.
    pub fn io_capacity(mut self, capacity: usize) -> Self {
        self.io_capacity = capacity;
        self
    }

    /// Emits a `tracing` span around every loop iteration when enabled.
    pub fn trace_ticks(mut self, enabled: bool) -> Self {
        self.trace_ticks = enabled;
        self
    }

    pub fn build(self) -> io::Result<ReactorHandle> {
        Reactor::with_options(self.quantum, self.io_capacity, self.trace_ticks)
    }
}
