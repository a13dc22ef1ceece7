//! The transport trait hierarchy and the composable adapter stack built
//! on top of it.

mod base;
mod bound;
mod buffered;
mod codec;
mod duplex;
mod packet;

pub use base::BaseTransport;
pub use bound::BoundTransport;
pub use buffered::BufferedTransport;
pub use codec::{CodecTransport, ErrorPolicy};
pub use duplex::DuplexStreamTransport;
pub use packet::PacketTransport;

use crate::deferred::Deferred;
use crate::error::Result;

use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::rc::Rc;

/// A recognized capability value in a transport's extension map.
///
/// Core components only ever consult the fixed `readable` / `writable`
/// / `buffered` flags on [`Properties`]; this extension map exists so
/// an adapter can advertise something more specific (e.g. an encoding
/// name) without every consumer needing to know about it.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// A transport's capability mapping.
///
/// Replaces the distilled source's dynamic capability dict with a
/// fixed set of boolean flags plus a small typed extension map —
/// consumers outside the core rely only on `readable`/`writable`/
/// `buffered`.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    pub readable: bool,
    pub writable: bool,
    pub buffered: bool,
    extra: HashMap<&'static str, PropertyValue>,
}

impl Properties {
    pub fn new(readable: bool, writable: bool) -> Self {
        Self {
            readable,
            writable,
            buffered: false,
            extra: HashMap::new(),
        }
    }

    pub fn with_buffered(mut self, buffered: bool) -> Self {
        self.buffered = buffered;
        self
    }

    pub fn set(&mut self, key: &'static str, value: PropertyValue) {
        self.extra.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.extra.get(key)
    }
}

/// The public contract every transport in the stack implements: a
/// handle over one fd (directly or indirectly) with a subset of the
/// capability set `{readable, writable}`.
///
/// Object-safe by construction — every adapter stores its inner
/// transport as `Rc<dyn Transport>`.
pub trait Transport {
    /// Reads up to `count` bytes. `count < 0` means "read all
    /// available without blocking" (read_all semantics at the base
    /// layer degrade to a single non-blocking read). Returns a
    /// zero-length result only at EOF.
    fn read(&self, count: isize) -> Deferred<Vec<u8>>;

    /// Resolves once all of `data` has been handed to the OS.
    fn write(&self, data: Vec<u8>) -> Deferred<()>;

    /// Resolves outstanding waiters with `TransportClosed`, releases
    /// the fd, and is idempotent.
    fn close(&self) -> Deferred<()>;

    /// Detaches the transport from the reactor without closing the fd.
    fn detach(&self);

    fn fileno(&self) -> RawFd;

    fn properties(&self) -> Properties;
}

/// Extends [`Transport`] with the callbacks the reactor invokes
/// directly on readiness. Only [`BaseTransport`] implements this — it
/// is the only transport type ever registered in the reactor's fd
/// maps; every adapter above it composes a `Transport`, never an
/// `IoHandler`.
pub trait IoHandler: Transport {
    /// Called when the fd becomes readable. `hint` is `-1` ("unknown
    /// readable byte count") when driven by the reactor loop.
    fn on_read(&self, hint: isize);

    /// Called when the fd becomes writable.
    fn on_write(&self, hint: isize);

    /// Called when the fd fails a readiness probe during bad-fd
    /// pruning, or otherwise encounters a fatal error.
    fn on_error(&self, err: crate::error::ReactorCoreError);
}

/// Shorthand used throughout the adapter stack: every adapter wraps an
/// inner transport behind this object-safe handle.
pub(crate) type Inner = Rc<dyn Transport>;

pub(crate) fn closed_result<T>() -> Result<T> {
    Err(crate::error::ReactorCoreError::TransportClosed)
}
