//! `Deferred<T>`: a one-shot, single-threaded future/promise pair.
//!
//! This is the concurrency primitive every transport operation returns.
//! It is resolved exactly once, from anywhere, and every continuation
//! attached to it — including the `Future::poll` wakeup used by
//! `async`/`.await` — only ever resumes through the reactor's callback
//! queue, never on the resolving stack.

use crate::error::{ReactorCoreError, Result};
use crate::reactor::ReactorHandle;

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use std::cell::RefCell;

enum State<T> {
    Pending,
    Resolved(Result<T>),
}

struct Inner<T> {
    state: RefCell<State<T>>,
    subscribers: RefCell<Vec<Box<dyn FnOnce(Result<T>)>>>,
    waker: RefCell<Option<Waker>>,
    reactor: ReactorHandle,
}

/// A value that becomes available exactly once, at some later reactor
/// iteration.
///
/// Cloning is cheap — it's a reference-counted handle onto shared
/// state. Any number of observers may attach via [`subscribe`] or
/// `.await`; every one of them fires exactly once, in the order it
/// attached. This is independent of the "one in-flight waiter per
/// direction" invariant transports uphold themselves — that invariant
/// is about how many reads/writes a transport has outstanding, not
/// about how many parties may observe one `Deferred`'s outcome.
///
/// [`subscribe`]: Deferred::subscribe
pub struct Deferred<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// Creates an unresolved `Deferred` bound to `reactor`. There is no
    /// separate sender/receiver split — the handle is both.
    pub fn new(reactor: ReactorHandle) -> Self {
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(State::Pending),
                subscribers: RefCell::new(Vec::new()),
                waker: RefCell::new(None),
                reactor,
            }),
        }
    }

    /// Resolves with a success value.
    pub fn set(&self, value: T) -> Result<()> {
        self.resolve(Ok(value))
    }

    /// Resolves with a failure.
    pub fn throw(&self, error: ReactorCoreError) -> Result<()> {
        self.resolve(Err(error))
    }

    fn resolve(&self, result: Result<T>) -> Result<()> {
        {
            let mut state = self.inner.state.borrow_mut();
            if !matches!(*state, State::Pending) {
                return Err(ReactorCoreError::Programming("Deferred resolved twice"));
            }
            *state = State::Resolved(result);
        }

        // Every subscriber recorded before resolution runs through the
        // callback queue, never inline, and in the order it subscribed.
        let subscribers = std::mem::take(&mut *self.inner.subscribers.borrow_mut());
        if !subscribers.is_empty() {
            let value = self.resolved_value();
            for subscriber in subscribers {
                let value = value.clone();
                self.inner.reactor.call(move || subscriber(value));
            }
        }

        // Waking our own task Waker only ever enqueues a resumption via
        // `reactor.call` (see `task.rs`'s wake implementation) — it
        // never runs the continuation on this stack.
        if let Some(waker) = self.inner.waker.borrow_mut().take() {
            waker.wake();
        }

        Ok(())
    }

    fn resolved_value(&self) -> Result<T> {
        match &*self.inner.state.borrow() {
            State::Resolved(result) => result.clone(),
            State::Pending => unreachable!("resolved_value called before resolution"),
        }
    }

    /// Registers `continuation` to run once this `Deferred` resolves.
    ///
    /// Fires synchronously, on the caller's stack, if already resolved.
    /// Otherwise the continuation is recorded and, when `set`/`throw`
    /// resolves this `Deferred`, scheduled onto the reactor's callback
    /// queue rather than invoked inline. Subscribers fire in the order
    /// they were registered.
    pub fn subscribe<F>(&self, continuation: F)
    where
        F: FnOnce(Result<T>) + 'static,
    {
        let already_resolved = matches!(*self.inner.state.borrow(), State::Resolved(_));
        if already_resolved {
            continuation(self.resolved_value());
        } else {
            self.inner
                .subscribers
                .borrow_mut()
                .push(Box::new(continuation));
        }
    }
}

impl<T: Clone + 'static> Future for Deferred<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if matches!(*self.inner.state.borrow(), State::Resolved(_)) {
            return Poll::Ready(self.resolved_value());
        }
        *self.inner.waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::Reactor;
    use std::cell::RefCell;

    #[test]
    fn subscribers_fire_exactly_once_in_subscription_order() {
        let reactor = Reactor::new().expect("reactor");
        let deferred: Deferred<u32> = Deferred::new(reactor.clone());

        let order: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));

        for tag in [1u32, 2, 3] {
            let order = order.clone();
            deferred.subscribe(move |result| {
                order.borrow_mut().push(tag);
                assert_eq!(result.unwrap(), 42);
            });
        }

        deferred.set(42).unwrap();
        reactor
            .run_until(|| order.borrow().len() == 3)
            .expect("reactor run");

        assert_eq!(*order.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn late_subscriber_fires_synchronously() {
        let reactor = Reactor::new().expect("reactor");
        let deferred: Deferred<u32> = Deferred::new(reactor.clone());
        deferred.set(7).unwrap();

        let seen = Rc::new(RefCell::new(None));
        let seen_for_sub = seen.clone();
        deferred.subscribe(move |result| {
            *seen_for_sub.borrow_mut() = Some(result.unwrap());
        });

        assert_eq!(*seen.borrow(), Some(7));
    }

    #[test]
    fn double_resolution_is_a_programming_error() {
        let reactor = Reactor::new().expect("reactor");
        let deferred: Deferred<u32> = Deferred::new(reactor);
        deferred.set(1).unwrap();
        let err = deferred.set(2).unwrap_err();
        assert!(matches!(err, ReactorCoreError::Programming(_)));
    }
}
