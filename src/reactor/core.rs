//! The reactor: readiness polling, the callback queue, timers, and
//! fd→transport registration.

use super::poller::{Event, Interest, Poller};
use super::timer::TimerEntry;
use crate::error::{ReactorCoreError, Result};
use crate::transport::IoHandler;

use std::cell::{Cell, RefCell};
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Default poll quantum used when no timer bounds the wait (main loop step
/// 2): the loop blocks at most this long with no registrations and no
/// pending timers.
pub const DEFAULT_QUANTUM: Duration = Duration::from_secs(1);

/// Shared handle to a single-threaded reactor.
///
/// There is exactly one `Reactor` per thread. It is not `Send` or
/// `Sync` — nothing about it may cross a thread boundary — and it is
/// never a process-wide singleton: callers thread a `ReactorHandle` to
/// every transport explicitly at construction time.
pub type ReactorHandle = Rc<Reactor>;

/// Single-threaded cooperative I/O reactor.
///
/// Owns the callback queue, the two fd→transport maps (one per
/// direction), the timer min-heap, and the platform readiness
/// multiplexer.
pub struct Reactor {
    callback_queue: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    read_transports: RefCell<HashMap<RawFd, Rc<dyn IoHandler>>>,
    write_transports: RefCell<HashMap<RawFd, Rc<dyn IoHandler>>>,
    registered_with_poller: RefCell<HashSet<RawFd>>,
    timers: RefCell<BinaryHeap<TimerEntry>>,
    poller: RefCell<Poller>,
    running: Cell<bool>,
    quantum: Duration,
    trace_ticks: bool,
}

impl Reactor {
    /// Creates a reactor with the default poll quantum.
    pub fn new() -> std::io::Result<ReactorHandle> {
        Self::with_quantum(DEFAULT_QUANTUM)
    }

    pub(crate) fn with_quantum(quantum: Duration) -> std::io::Result<ReactorHandle> {
        Self::with_options(quantum, 64, false)
    }

    pub(crate) fn with_options(
        quantum: Duration,
        io_capacity_hint: usize,
        trace_ticks: bool,
    ) -> std::io::Result<ReactorHandle> {
        Ok(Rc::new(Self {
            callback_queue: RefCell::new(VecDeque::new()),
            read_transports: RefCell::new(HashMap::with_capacity(io_capacity_hint)),
            write_transports: RefCell::new(HashMap::with_capacity(io_capacity_hint)),
            registered_with_poller: RefCell::new(HashSet::with_capacity(io_capacity_hint)),
            timers: RefCell::new(BinaryHeap::new()),
            poller: RefCell::new(Poller::new()?),
            running: Cell::new(false),
            quantum,
            trace_ticks,
        }))
    }

    /// Enqueues a zero-argument closure. Never invoked inline — it
    /// only runs from inside `turn()`'s drain step.
    pub fn call<F>(&self, f: F)
    where
        F: FnOnce() + 'static,
    {
        self.callback_queue.borrow_mut().push_back(Box::new(f));
    }

    /// Schedules `f` to run at `now + delay`. Returns a cancellation
    /// flag; setting it before the deadline prevents the callback from
    /// running, but does not remove the timer from the heap.
    pub fn call_later<F>(&self, delay: Duration, f: F) -> Rc<Cell<bool>>
    where
        F: FnOnce() + 'static,
    {
        let cancelled = Rc::new(Cell::new(false));
        self.timers.borrow_mut().push(TimerEntry {
            deadline: Instant::now() + delay,
            callback: Box::new(f),
            cancelled: cancelled.clone(),
        });
        cancelled
    }

    /// Installs `handler` as the read-interested transport for its fd.
    /// Fails if a *different* transport already occupies that slot;
    /// re-registering the same transport is a no-op.
    pub fn register_read(&self, handler: Rc<dyn IoHandler>) -> Result<()> {
        let fd = handler.fileno();
        {
            let mut map = self.read_transports.borrow_mut();
            if let Some(existing) = map.get(&fd) {
                if Rc::ptr_eq(existing, &handler) {
                    return Ok(());
                }
                return Err(ReactorCoreError::Reactor(format!(
                    "fd {fd} already has a registered read transport"
                )));
            }
            map.insert(fd, handler);
        }
        self.sync_poller_registration(fd)
    }

    /// Installs `handler` as the write-interested transport for its fd.
    pub fn register_write(&self, handler: Rc<dyn IoHandler>) -> Result<()> {
        let fd = handler.fileno();
        {
            let mut map = self.write_transports.borrow_mut();
            if let Some(existing) = map.get(&fd) {
                if Rc::ptr_eq(existing, &handler) {
                    return Ok(());
                }
                return Err(ReactorCoreError::Reactor(format!(
                    "fd {fd} already has a registered write transport"
                )));
            }
            map.insert(fd, handler);
        }
        self.sync_poller_registration(fd)
    }

    /// Removes the read registration for `fd`, if present. Idempotent.
    pub fn unregister_read(&self, fd: RawFd) {
        self.read_transports.borrow_mut().remove(&fd);
        let _ = self.sync_poller_registration(fd);
    }

    /// Removes the write registration for `fd`, if present. Idempotent.
    pub fn unregister_write(&self, fd: RawFd) {
        self.write_transports.borrow_mut().remove(&fd);
        let _ = self.sync_poller_registration(fd);
    }

    fn sync_poller_registration(&self, fd: RawFd) -> Result<()> {
        let read = self.read_transports.borrow().contains_key(&fd);
        let write = self.write_transports.borrow().contains_key(&fd);
        let interest = Interest { read, write };
        let mut registered = self.registered_with_poller.borrow_mut();

        if !read && !write {
            if registered.remove(&fd) {
                self.poller.borrow().deregister(fd);
            }
            return Ok(());
        }

        let poller = self.poller.borrow();
        let result = if registered.contains(&fd) {
            poller.reregister(fd, interest)
        } else {
            poller.register(fd, interest)
        };

        match result {
            Ok(()) => {
                registered.insert(fd);
                Ok(())
            }
            Err(err) => Err(ReactorCoreError::Reactor(format!(
                "failed to register fd {fd} with poller: {err}"
            ))),
        }
    }

    /// Runs the loop until `stop()` is called.
    pub fn run(self: &ReactorHandle) -> Result<()> {
        self.running.set(true);
        while self.running.get() {
            self.turn()?;
        }
        Ok(())
    }

    /// Stops the loop after the current iteration.
    pub fn stop(&self) {
        self.running.set(false);
    }

    /// Runs iterations until `done()` returns `true`. Used by
    /// `task::block_on`.
    pub(crate) fn run_until(self: &ReactorHandle, mut done: impl FnMut() -> bool) -> Result<()> {
        while !done() {
            self.turn()?;
        }
        Ok(())
    }

    /// One iteration of the main loop.
    fn turn(self: &ReactorHandle) -> Result<()> {
        let span = self.trace_ticks.then(|| {
            tracing::debug_span!(
                "reactor.tick",
                callbacks_drained = tracing::field::Empty,
                fds_polled = tracing::field::Empty,
                timers_fired = tracing::field::Empty,
            )
        });
        let _guard = span.as_ref().map(|s| s.enter());

        // 1. Drain the callback queue completely. Only drain the
        // callbacks present at the start of this step — anything
        // enqueued while draining runs on the *next* iteration, which
        // bounds per-iteration work and preserves fairness.
        let pending = self.callback_queue.borrow().len();
        for _ in 0..pending {
            let cb = self.callback_queue.borrow_mut().pop_front();
            if let Some(cb) = cb {
                cb();
            }
        }
        if let Some(span) = &span {
            span.record("callbacks_drained", pending);
        }

        // 2. Compute the poll timeout from the next timer deadline,
        // capped at the default quantum. With nothing registered and
        // no pending timer, this naturally degenerates to "sleep for
        // the quantum" since the poll covers an empty fd set.
        let now = Instant::now();
        let timeout = match self.timers.borrow().peek() {
            Some(t) => t.deadline.saturating_duration_since(now).min(self.quantum),
            None => self.quantum,
        };

        // 3. Poll readiness over the union of registered fds.
        let mut events: Vec<Event> = Vec::new();
        let poll_result = self.poller.borrow_mut().poll(&mut events, Some(timeout));

        match poll_result {
            Ok(()) => {}
            Err(err) if err.raw_os_error() == Some(libc::EBADF) => {
                self.prune_bad_fds();
            }
            Err(err) => {
                return Err(ReactorCoreError::Reactor(format!(
                    "fatal error from readiness poller: {err}"
                )));
            }
        }

        if let Some(span) = &span {
            span.record("fds_polled", events.len());
        }

        // 4. Enqueue on_read/on_write for each ready fd.
        for event in events {
            if event.readable {
                if let Some(handler) = self.read_transports.borrow().get(&event.fd).cloned() {
                    self.call(move || handler.on_read(-1));
                }
            }
            if event.writable {
                if let Some(handler) = self.write_transports.borrow().get(&event.fd).cloned() {
                    self.call(move || handler.on_write(-1));
                }
            }
        }

        // Fire expired timers, routing each callback through the
        // queue rather than invoking it inline.
        let now = Instant::now();
        let mut timers_fired = 0usize;
        loop {
            let ready = matches!(self.timers.borrow().peek(), Some(t) if t.deadline <= now);
            if !ready {
                break;
            }
            let entry = self.timers.borrow_mut().pop().expect("peeked Some above");
            let TimerEntry {
                callback,
                cancelled,
                ..
            } = entry;
            self.call(move || {
                if !cancelled.get() {
                    callback();
                }
            });
            timers_fired += 1;
        }
        if let Some(span) = &span {
            span.record("timers_fired", timers_fired);
        }

        Ok(())
    }

    /// Bad-fd pruning: probe each registered fd individually; any fd
    /// that fails the probe is removed from both maps and its
    /// transport(s) are notified via `on_error`.
    fn prune_bad_fds(&self) {
        let fds: HashSet<RawFd> = self
            .read_transports
            .borrow()
            .keys()
            .chain(self.write_transports.borrow().keys())
            .copied()
            .collect();

        let mut bad = Vec::new();
        for fd in fds {
            if self.poller.borrow().probe(fd).is_err() {
                bad.push(fd);
            }
        }

        for fd in bad {
            let read_handler = self.read_transports.borrow_mut().remove(&fd);
            let write_handler = self.write_transports.borrow_mut().remove(&fd);
            self.poller.borrow().deregister(fd);
            self.registered_with_poller.borrow_mut().remove(&fd);

            tracing::warn!(fd, "pruning fd that failed readiness probe");
            let err = ReactorCoreError::Reactor(format!("fd {fd} failed readiness probe"));

            if let Some(handler) = read_handler {
                let err = err.clone();
                self.call(move || handler.on_error(err));
            }
            if let Some(handler) = write_handler {
                self.call(move || handler.on_error(err));
            }
        }
    }
}
