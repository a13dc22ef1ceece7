//! Platform-specific I/O readiness multiplexer.
//!
//! Provides a unified interface over the OS's native readiness
//! primitive (`epoll` on Linux, `kqueue` on BSD/macOS). The concrete
//! backend is selected at compile time; the reactor loop itself is
//! written once against the `Poller` alias.

pub(crate) mod common;

pub(crate) use common::{Event, Interest};

#[cfg(target_os = "linux")]
mod epoll;
#[cfg(target_os = "linux")]
pub(crate) type Poller = epoll::EpollPoller;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
mod kqueue;
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
pub(crate) type Poller = kqueue::KqueuePoller;
