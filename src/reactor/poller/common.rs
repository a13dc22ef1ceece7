//! Platform-independent types shared by every `Poller` backend.

use std::os::unix::io::RawFd;

/// Readiness interest for a registered file descriptor.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Interest {
    pub(crate) read: bool,
    pub(crate) write: bool,
}

/// An I/O readiness event reported by the poller.
///
/// Produced by the poller, consumed by the reactor loop to enqueue
/// `on_read` / `on_write` callbacks for the registered transport.
#[derive(Debug)]
pub(crate) struct Event {
    /// File descriptor the event applies to.
    pub(crate) fd: RawFd,
    /// Whether the fd is readable.
    pub(crate) readable: bool,
    /// Whether the fd is writable.
    pub(crate) writable: bool,
}
