//! Quota adapter: enforces independent read-side and write-side byte
//! budgets against an inner transport, so a length-prefixed sub-stream
//! can be consumed safely and the outer stream resumed afterward.

use super::{Inner, Properties, Transport};
use crate::deferred::Deferred;
use crate::error::{ReactorCoreError, Result};
use crate::reactor::ReactorHandle;
use crate::task;

use std::cell::Cell;
use std::rc::{Rc, Weak};

const SKIP_CHUNK: usize = 64 * 1024;

/// Wraps an inner transport with read/write byte quotas. `None` means
/// unbounded on that side.
pub struct BoundTransport {
    inner: Inner,
    reactor: ReactorHandle,
    read_remaining: Cell<Option<usize>>,
    write_remaining: Cell<Option<usize>>,
    skip_on_close: bool,
    close_underlying: bool,
    self_weak: Weak<BoundTransport>,
}

impl BoundTransport {
    pub fn new(
        reactor: ReactorHandle,
        inner: Inner,
        read_length: Option<usize>,
        write_length: Option<usize>,
        skip_on_close: bool,
        close_underlying: bool,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            inner,
            reactor,
            read_remaining: Cell::new(read_length),
            write_remaining: Cell::new(write_length),
            skip_on_close,
            close_underlying,
            self_weak: weak.clone(),
        })
    }

    fn rc(&self) -> Rc<Self> {
        self.self_weak
            .upgrade()
            .expect("BoundTransport outlives its own Rc")
    }

    pub fn remaining_read(&self) -> Option<usize> {
        self.read_remaining.get()
    }

    pub fn remaining_write(&self) -> Option<usize> {
        self.write_remaining.get()
    }

    async fn read_impl(self: Rc<Self>, count: isize) -> Result<Vec<u8>> {
        match self.read_remaining.get() {
            None => self.inner.read(count).await,
            Some(0) => Ok(Vec::new()),
            Some(remaining) => {
                let effective = if count < 0 {
                    remaining
                } else {
                    (count as usize).min(remaining)
                };
                let data = self.inner.read(effective as isize).await?;
                self.read_remaining.set(Some(remaining - data.len()));
                Ok(data)
            }
        }
    }

    async fn write_impl(self: Rc<Self>, data: Vec<u8>) -> Result<()> {
        match self.write_remaining.get() {
            None => self.inner.write(data).await,
            Some(remaining) => {
                if data.len() > remaining {
                    return Err(ReactorCoreError::EndOfStream { partial: Vec::new() });
                }
                let len = data.len();
                self.inner.write(data).await?;
                self.write_remaining.set(Some(remaining - len));
                Ok(())
            }
        }
    }

    async fn skip_impl(self: Rc<Self>, count: isize) -> Result<usize> {
        let mut remaining: i64 = if count < 0 {
            match self.read_remaining.get() {
                Some(r) => r as i64,
                None => return Ok(0),
            }
        } else {
            count as i64
        };

        let mut actually_read = 0usize;
        while remaining > 0 {
            let chunk = remaining.min(SKIP_CHUNK as i64) as isize;
            let data = self.clone().read_impl(chunk).await?;
            if data.is_empty() {
                break;
            }
            actually_read += data.len();
            remaining -= data.len() as i64;
        }
        Ok(actually_read)
    }

    /// Reads and discards up to `count` bytes (or the remaining read
    /// quota if `count < 0`). Returns the number of bytes consumed.
    pub async fn skip(self: &Rc<Self>, count: isize) -> Result<usize> {
        self.clone().skip_impl(count).await
    }

    async fn close_impl(self: Rc<Self>) -> Result<()> {
        if self.skip_on_close {
            self.clone().skip_impl(-1).await?;
        }
        if self.close_underlying {
            self.inner.close().await?;
        }
        Ok(())
    }
}

impl Transport for BoundTransport {
    fn read(&self, count: isize) -> Deferred<Vec<u8>> {
        let deferred = Deferred::new(self.reactor.clone());
        let this = self.rc();
        let subscriber = deferred.clone();
        task::spawn(&self.reactor, async move {
            match this.read_impl(count).await {
                Ok(data) => {
                    let _ = subscriber.set(data);
                }
                Err(err) => {
                    let _ = subscriber.throw(err);
                }
            }
        });
        deferred
    }

    fn write(&self, data: Vec<u8>) -> Deferred<()> {
        let deferred = Deferred::new(self.reactor.clone());
        let this = self.rc();
        let subscriber = deferred.clone();
        task::spawn(&self.reactor, async move {
            match this.write_impl(data).await {
                Ok(()) => {
                    let _ = subscriber.set(());
                }
                Err(err) => {
                    let _ = subscriber.throw(err);
                }
            }
        });
        deferred
    }

    fn close(&self) -> Deferred<()> {
        let deferred = Deferred::new(self.reactor.clone());
        let this = self.rc();
        let subscriber = deferred.clone();
        task::spawn(&self.reactor, async move {
            match this.close_impl().await {
                Ok(()) => {
                    let _ = subscriber.set(());
                }
                Err(err) => {
                    let _ = subscriber.throw(err);
                }
            }
        });
        deferred
    }

    fn detach(&self) {
        self.inner.detach();
    }

    fn fileno(&self) -> std::os::unix::io::RawFd {
        self.inner.fileno()
    }

    fn properties(&self) -> Properties {
        self.inner.properties()
    }
}
