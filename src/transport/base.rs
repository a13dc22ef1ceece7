//! The bottom layer of the transport stack: a transport backed
//! directly by a file descriptor, registered with the reactor.

use super::{IoHandler, Properties, Transport};
use crate::deferred::Deferred;
use crate::error::ReactorCoreError;
use crate::reactor::ReactorHandle;

use std::cell::{Cell, RefCell};
use std::io;
use std::os::unix::io::RawFd;
use std::rc::{Rc, Weak};

/// Size of a single non-blocking read when the caller doesn't bound it
/// (`count < 0`, or while draining for `read_all`-style callers above
/// this layer).
const READ_CHUNK: usize = 64 * 1024;

struct ReadWaiter {
    deferred: Deferred<Vec<u8>>,
    count: isize,
}

struct WriteWaiter {
    deferred: Deferred<()>,
    remaining: Vec<u8>,
}

/// A transport directly backed by a raw fd in non-blocking mode.
///
/// Implements the fd registration state machine described for the
/// reactor loop: `unregistered -> read_pending -> unregistered` (and
/// analogously for write). A `read`/`write` call records the waiter
/// and registers with the reactor; the corresponding `on_read`/
/// `on_write` callback performs the actual non-blocking syscall,
/// resolves the waiter, and unregisters.
pub struct BaseTransport {
    reactor: ReactorHandle,
    fd: RawFd,
    readable: bool,
    writable: bool,
    closed: Cell<bool>,
    read_waiter: RefCell<Option<ReadWaiter>>,
    write_waiter: RefCell<Option<WriteWaiter>>,
    self_weak: Weak<BaseTransport>,
}

impl BaseTransport {
    /// Wraps `fd`, which must already be in non-blocking mode.
    pub fn new(reactor: ReactorHandle, fd: RawFd, readable: bool, writable: bool) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            reactor,
            fd,
            readable,
            writable,
            closed: Cell::new(false),
            read_waiter: RefCell::new(None),
            write_waiter: RefCell::new(None),
            self_weak: weak.clone(),
        })
    }

    fn handler(&self) -> Rc<dyn IoHandler> {
        self.self_weak
            .upgrade()
            .expect("BaseTransport outlives its own Rc while registering")
    }
}

impl Transport for BaseTransport {
    fn read(&self, count: isize) -> Deferred<Vec<u8>> {
        let deferred = Deferred::new(self.reactor.clone());

        if self.closed.get() {
            let _ = deferred.throw(ReactorCoreError::TransportClosed);
            return deferred;
        }
        if !self.readable {
            let _ = deferred.throw(ReactorCoreError::Programming(
                "read() called on a non-readable transport",
            ));
            return deferred;
        }
        if self.read_waiter.borrow().is_some() {
            let _ = deferred.throw(ReactorCoreError::Programming(
                "concurrent reads on the same transport are not permitted",
            ));
            return deferred;
        }

        *self.read_waiter.borrow_mut() = Some(ReadWaiter {
            deferred: deferred.clone(),
            count,
        });

        if let Err(err) = self.reactor.register_read(self.handler()) {
            *self.read_waiter.borrow_mut() = None;
            let _ = deferred.throw(err);
        }

        deferred
    }

    fn write(&self, data: Vec<u8>) -> Deferred<()> {
        let deferred = Deferred::new(self.reactor.clone());

        if self.closed.get() {
            let _ = deferred.throw(ReactorCoreError::TransportClosed);
            return deferred;
        }
        if !self.writable {
            let _ = deferred.throw(ReactorCoreError::Programming(
                "write() called on a non-writable transport",
            ));
            return deferred;
        }
        if self.write_waiter.borrow().is_some() {
            let _ = deferred.throw(ReactorCoreError::Programming(
                "concurrent writes on the same transport are not permitted",
            ));
            return deferred;
        }

        *self.write_waiter.borrow_mut() = Some(WriteWaiter {
            deferred: deferred.clone(),
            remaining: data,
        });

        if let Err(err) = self.reactor.register_write(self.handler()) {
            *self.write_waiter.borrow_mut() = None;
            let _ = deferred.throw(err);
        }

        deferred
    }

    fn close(&self) -> Deferred<()> {
        let deferred = Deferred::new(self.reactor.clone());

        if self.closed.replace(true) {
            let _ = deferred.set(());
            return deferred;
        }

        if let Some(waiter) = self.read_waiter.borrow_mut().take() {
            let _ = waiter.deferred.throw(ReactorCoreError::TransportClosed);
        }
        if let Some(waiter) = self.write_waiter.borrow_mut().take() {
            let _ = waiter.deferred.throw(ReactorCoreError::TransportClosed);
        }

        self.reactor.unregister_read(self.fd);
        self.reactor.unregister_write(self.fd);
        unsafe {
            libc::close(self.fd);
        }

        tracing::debug!(fd = self.fd, "transport closed");
        let _ = deferred.set(());
        deferred
    }

    fn detach(&self) {
        self.reactor.unregister_read(self.fd);
        self.reactor.unregister_write(self.fd);
    }

    fn fileno(&self) -> RawFd {
        self.fd
    }

    fn properties(&self) -> Properties {
        Properties::new(self.readable, self.writable)
    }
}

impl IoHandler for BaseTransport {
    fn on_read(&self, _hint: isize) {
        let waiter = match self.read_waiter.borrow_mut().take() {
            Some(w) => w,
            None => return,
        };

        let requested = if waiter.count < 0 {
            READ_CHUNK
        } else {
            waiter.count as usize
        };
        let mut buf = vec![0u8; requested.max(1)];
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut _, buf.len()) };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                *self.read_waiter.borrow_mut() = Some(waiter);
                return;
            }
            self.reactor.unregister_read(self.fd);
            let _ = waiter.deferred.throw(ReactorCoreError::Io(err));
            return;
        }

        buf.truncate(n as usize);
        self.reactor.unregister_read(self.fd);
        let _ = waiter.deferred.set(buf);
    }

    fn on_write(&self, _hint: isize) {
        let mut waiter = match self.write_waiter.borrow_mut().take() {
            Some(w) => w,
            None => return,
        };

        let n = unsafe {
            libc::write(
                self.fd,
                waiter.remaining.as_ptr() as *const _,
                waiter.remaining.len(),
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                *self.write_waiter.borrow_mut() = Some(waiter);
                return;
            }
            self.reactor.unregister_write(self.fd);
            let _ = waiter.deferred.throw(ReactorCoreError::Io(err));
            return;
        }

        waiter.remaining.drain(..n as usize);
        if waiter.remaining.is_empty() {
            self.reactor.unregister_write(self.fd);
            let _ = waiter.deferred.set(());
        } else {
            *self.write_waiter.borrow_mut() = Some(waiter);
        }
    }

    fn on_error(&self, err: ReactorCoreError) {
        if let Some(waiter) = self.read_waiter.borrow_mut().take() {
            let _ = waiter.deferred.throw(err.clone());
        }
        if let Some(waiter) = self.write_waiter.borrow_mut().take() {
            let _ = waiter.deferred.throw(err);
        }
        self.closed.set(true);
    }
}
