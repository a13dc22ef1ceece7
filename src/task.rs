//! Single-threaded task executor.
//!
//! `spawn`/`block_on` drive a boxed, pinned `async fn` body to
//! completion using the reactor's own callback queue as the run queue.
//! There is no work-stealing and no worker threads: tasks resume only
//! from waker callbacks posted onto the reactor's own queue.
//!
//! # How tasks work
//!
//! 1. A future is wrapped in a [`Task`] and polled once immediately.
//! 2. If it returns `Pending`, it's stashed until its waker fires.
//! 3. The waker (built from a `RawWaker` vtable) calls
//!    `reactor.call(move || task.poll())` when woken, so resumption
//!    always happens through the callback queue, never inline.
//! 4. The task is polled again and makes further progress, or
//!    completes and wakes anyone awaiting its [`JoinHandle`].

use crate::error::Result;
use crate::reactor::ReactorHandle;

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

/// A spawned unit of work: a boxed future plus the reactor it resumes
/// through. Not constructed directly — use [`spawn`] or [`block_on`].
struct Task {
    future: RefCell<Option<Pin<Box<dyn Future<Output = ()>>>>>,
    reactor: ReactorHandle,
}

/// A handle to a spawned task's eventual output.
///
/// Awaiting a `JoinHandle` suspends until the spawned future completes;
/// the reactor resumes the waiting task through the same callback
/// queue as every other continuation.
pub struct JoinHandle<T> {
    result: Rc<RefCell<Option<T>>>,
    waker: Rc<RefCell<Option<Waker>>>,
}

impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        if let Some(value) = self.result.borrow_mut().take() {
            return Poll::Ready(value);
        }
        *self.waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}

/// Spawns `future` onto `reactor`, returning a handle to its result.
///
/// The future is polled once immediately on the caller's stack (the
/// same as any freshly-constructed Rust future's first poll); every
/// subsequent resumption happens only when its waker fires, which
/// always schedules onto `reactor`'s callback queue.
pub fn spawn<F>(reactor: &ReactorHandle, future: F) -> JoinHandle<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    let result = Rc::new(RefCell::new(None));
    let waker_slot: Rc<RefCell<Option<Waker>>> = Rc::new(RefCell::new(None));

    let result_for_body = result.clone();
    let waker_for_body = waker_slot.clone();

    let wrapped = async move {
        let value = future.await;
        *result_for_body.borrow_mut() = Some(value);
        if let Some(waker) = waker_for_body.borrow_mut().take() {
            waker.wake();
        }
    };

    let task = Rc::new(Task {
        future: RefCell::new(Some(Box::pin(wrapped))),
        reactor: reactor.clone(),
    });
    poll_task(&task);

    JoinHandle {
        result,
        waker: waker_slot,
    }
}

/// Drives `future` to completion, running the reactor loop between
/// suspensions. Returns the future's output, or an error if the
/// reactor itself failed — a fatal poll error, not a failure of
/// `future` (those surface through `future`'s own `Output`).
pub fn block_on<F>(reactor: &ReactorHandle, future: F) -> Result<F::Output>
where
    F: Future + 'static,
    F::Output: 'static,
{
    let result: Rc<RefCell<Option<F::Output>>> = Rc::new(RefCell::new(None));
    let result_for_body = result.clone();

    let wrapped = async move {
        let value = future.await;
        *result_for_body.borrow_mut() = Some(value);
    };

    let task = Rc::new(Task {
        future: RefCell::new(Some(Box::pin(wrapped))),
        reactor: reactor.clone(),
    });
    poll_task(&task);

    reactor.run_until(|| result.borrow().is_some())?;

    Ok(result
        .borrow_mut()
        .take()
        .expect("run_until only returns once the result is populated"))
}

fn poll_task(task: &Rc<Task>) {
    let mut slot = task.future.borrow_mut();
    let Some(mut future) = slot.take() else {
        return;
    };

    let raw_waker = make_raw_waker(task.clone());
    let waker = unsafe { Waker::from_raw(raw_waker) };
    let mut cx = Context::from_waker(&waker);

    match future.as_mut().poll(&mut cx) {
        Poll::Ready(()) => {}
        Poll::Pending => *slot = Some(future),
    }
}

fn schedule(task: Rc<Task>) {
    let reactor = task.reactor.clone();
    reactor.call(move || poll_task(&task));
}

fn make_raw_waker(task: Rc<Task>) -> RawWaker {
    RawWaker::new(Rc::into_raw(task) as *const (), &VTABLE)
}

static VTABLE: RawWakerVTable =
    RawWakerVTable::new(waker_clone, waker_wake, waker_wake_by_ref, waker_drop);

unsafe fn waker_clone(ptr: *const ()) -> RawWaker {
    let task = unsafe { Rc::from_raw(ptr as *const Task) };
    let cloned = task.clone();
    std::mem::forget(task);
    RawWaker::new(Rc::into_raw(cloned) as *const (), &VTABLE)
}

unsafe fn waker_wake(ptr: *const ()) {
    let task = unsafe { Rc::from_raw(ptr as *const Task) };
    schedule(task);
}

unsafe fn waker_wake_by_ref(ptr: *const ()) {
    let task = unsafe { Rc::from_raw(ptr as *const Task) };
    schedule(task.clone());
    std::mem::forget(task);
}

unsafe fn waker_drop(ptr: *const ()) {
    unsafe { drop(Rc::from_raw(ptr as *const Task)) };
}

/// Collects multiple [`JoinHandle`]s and awaits them all in order.
pub struct JoinSet<T> {
    handles: Vec<JoinHandle<T>>,
}

impl<T> Default for JoinSet<T> {
    fn default() -> Self {
        Self {
            handles: Vec::new(),
        }
    }
}

impl<T> JoinSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: JoinHandle<T>) {
        self.handles.push(handle);
    }

    /// Awaits every handle in insertion order, collecting their
    /// results.
    pub async fn await_all(&mut self) -> Vec<T> {
        let mut results = Vec::with_capacity(self.handles.len());
        for handle in self.handles.drain(..) {
            results.push(handle.await);
        }
        results
    }
}
