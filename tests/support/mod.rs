//! Shared test doubles and helpers for the integration suite.

use cordage::ReactorHandle;
use cordage::error::{ReactorCoreError, Result};
use cordage::reactor::Reactor;
use cordage::transport::{BaseTransport, Properties, Transport};

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::os::unix::io::RawFd;
use std::rc::Rc;

pub fn new_reactor() -> ReactorHandle {
    Reactor::new().expect("failed to construct reactor")
}

/// A connected, non-blocking OS pipe wrapped as a `BaseTransport` pair,
/// for tests that need real readiness-driven I/O rather than a mock.
pub fn pipe_pair(reactor: &ReactorHandle) -> (Rc<BaseTransport>, Rc<BaseTransport>) {
    let mut fds: [RawFd; 2] = [0; 2];
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK) };
    assert_eq!(rc, 0, "pipe2 failed: {}", std::io::Error::last_os_error());
    let read_side = BaseTransport::new(reactor.clone(), fds[0], true, false);
    let write_side = BaseTransport::new(reactor.clone(), fds[1], false, true);
    (read_side, write_side)
}

/// An in-memory `Transport` that hands back pre-queued chunks on
/// successive `read` calls (ignoring the requested count, since the
/// adapters under test request their own target size) and records
/// everything written to it. Every operation resolves synchronously —
/// there is never a `Pending` `Deferred` — so tests don't need to drive
/// a live reactor loop to observe results.
pub struct MockTransport {
    reactor: ReactorHandle,
    reads: RefCell<VecDeque<Vec<u8>>>,
    written: RefCell<Vec<u8>>,
    closed: Cell<bool>,
    props: Properties,
}

impl MockTransport {
    pub fn new(reactor: ReactorHandle, reads: Vec<Vec<u8>>) -> Rc<Self> {
        Rc::new(Self {
            reactor,
            reads: RefCell::new(reads.into_iter().collect()),
            written: RefCell::new(Vec::new()),
            closed: Cell::new(false),
            props: Properties::new(true, true),
        })
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

impl Transport for MockTransport {
    fn read(&self, _count: isize) -> cordage::Deferred<Vec<u8>> {
        let deferred = cordage::Deferred::new(self.reactor.clone());
        if self.closed.get() {
            let _ = deferred.throw(ReactorCoreError::TransportClosed);
            return deferred;
        }
        let chunk = self.reads.borrow_mut().pop_front().unwrap_or_default();
        let _ = deferred.set(chunk);
        deferred
    }

    fn write(&self, data: Vec<u8>) -> cordage::Deferred<()> {
        let deferred = cordage::Deferred::new(self.reactor.clone());
        if self.closed.get() {
            let _ = deferred.throw(ReactorCoreError::TransportClosed);
            return deferred;
        }
        self.written.borrow_mut().extend_from_slice(&data);
        let _ = deferred.set(());
        deferred
    }

    fn close(&self) -> cordage::Deferred<()> {
        let deferred = cordage::Deferred::new(self.reactor.clone());
        self.closed.set(true);
        let _ = deferred.set(());
        deferred
    }

    fn detach(&self) {}

    fn fileno(&self) -> RawFd {
        -1
    }

    fn properties(&self) -> Properties {
        self.props.clone()
    }
}

/// Runs `future` against a fresh reactor and unwraps both the reactor
/// result and the future's own result — the common case in tests where
/// a reactor-level failure is as much a test failure as a wrong value.
pub fn run<F, T>(reactor: &ReactorHandle, future: F) -> T
where
    F: std::future::Future<Output = Result<T>> + 'static,
    T: 'static,
{
    cordage::block_on(reactor, future)
        .expect("reactor failed")
        .expect("operation failed")
}
