//! Buffering adapter: accumulates reads and writes against an inner
//! transport, and adds the line/delimiter/exact-count read helpers
//! every higher adapter in the stack is built from.

use super::{Inner, Properties, Transport};
use crate::deferred::Deferred;
use crate::error::{ReactorCoreError, Result};
use crate::reactor::ReactorHandle;
use crate::task;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Wraps an inner transport with a read-side and write-side byte
/// accumulator, each with a target size.
pub struct BufferedTransport {
    inner: Inner,
    reactor: ReactorHandle,
    read_buffer: RefCell<Vec<u8>>,
    write_buffer: RefCell<Vec<u8>>,
    read_target: usize,
    write_target: usize,
    writable: bool,
    self_weak: Weak<BufferedTransport>,
}

impl BufferedTransport {
    pub fn new(reactor: ReactorHandle, inner: Inner) -> Rc<Self> {
        Self::with_capacity(reactor, inner, DEFAULT_BUFFER_SIZE, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(
        reactor: ReactorHandle,
        inner: Inner,
        read_target: usize,
        write_target: usize,
    ) -> Rc<Self> {
        let writable = inner.properties().writable;
        Rc::new_cyclic(|weak| Self {
            inner,
            reactor,
            read_buffer: RefCell::new(Vec::new()),
            write_buffer: RefCell::new(Vec::new()),
            read_target,
            write_target,
            writable,
            self_weak: weak.clone(),
        })
    }

    fn rc(&self) -> Rc<Self> {
        self.self_weak
            .upgrade()
            .expect("BufferedTransport outlives its own Rc")
    }

    /// Fills the read buffer with up to `count` additional bytes via
    /// one or more inner reads, stopping early on a short read.
    /// Returns whether EOF was observed.
    async fn fill_rbuf(self: Rc<Self>, mut count: usize) -> Result<bool> {
        while count > 0 {
            let data = match self.inner.read(count as isize).await {
                Ok(data) => data,
                Err(ReactorCoreError::TransportClosed) => Vec::new(),
                Err(err) => return Err(err),
            };
            if data.is_empty() {
                return Ok(true);
            }
            let got = data.len();
            self.read_buffer.borrow_mut().extend_from_slice(&data);
            if got < count {
                break;
            }
            count -= got;
        }
        Ok(false)
    }

    async fn read_impl(self: Rc<Self>, count: isize) -> Result<Vec<u8>> {
        if count < 0 {
            return self.read_all_impl(DEFAULT_BUFFER_SIZE).await;
        }
        let count = count as usize;
        let current_len = self.read_buffer.borrow().len();
        if count > current_len {
            let target = self.read_target.saturating_sub(current_len);
            self.clone().fill_rbuf(target).await?;
        }
        let mut buf = self.read_buffer.borrow_mut();
        let take = count.min(buf.len());
        Ok(buf.drain(..take).collect())
    }

    /// Reads exactly `count` bytes, repeatedly filling until satisfied
    /// or EOF. On EOF short of `count`, fails with `EndOfStream`
    /// carrying the partial result when `raise_on_eof`.
    pub async fn read_exactly(self: &Rc<Self>, count: usize, raise_on_eof: bool) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(count);
        let mut remaining = count;
        while remaining > 0 {
            let data = self.clone().read_impl(remaining as isize).await?;
            if data.is_empty() {
                break;
            }
            remaining -= data.len();
            out.extend(data);
        }
        if raise_on_eof && remaining > 0 {
            return Err(ReactorCoreError::EndOfStream { partial: out });
        }
        Ok(out)
    }

    async fn read_all_impl(self: Rc<Self>, chunk: usize) -> Result<Vec<u8>> {
        let mut data = std::mem::take(&mut *self.read_buffer.borrow_mut());
        loop {
            let chunk_data = self.inner.read(chunk as isize).await?;
            if chunk_data.is_empty() {
                break;
            }
            data.extend(chunk_data);
        }
        Ok(data)
    }

    /// Drains the inner transport to EOF, concatenating with whatever
    /// was already buffered.
    pub async fn read_all(self: &Rc<Self>, chunk: usize) -> Result<Vec<u8>> {
        self.clone().read_all_impl(chunk).await
    }

    /// Returns bytes up to (and, if `include_pattern`, including) the
    /// earliest occurrence of any of `patterns`. The scan returns as
    /// soon as a match is found in the *current* buffer; the inner
    /// fill (and EOF check) only runs when no match is present yet.
    pub async fn read_until(
        self: &Rc<Self>,
        patterns: &[&[u8]],
        raise_on_eof: bool,
        include_pattern: bool,
    ) -> Result<Vec<u8>> {
        let longest = patterns.iter().map(|p| p.len()).max().unwrap_or(0);
        let mut eof = false;
        let mut last_index = 0usize;

        loop {
            let found = {
                let buf = self.read_buffer.borrow();
                find_earliest(&buf, patterns, last_index)
            };

            if let Some((index, pattern_len)) = found {
                let mut buf = self.read_buffer.borrow_mut();
                let cut = if include_pattern {
                    index + pattern_len
                } else {
                    index
                };
                let data: Vec<u8> = buf.drain(..cut).collect();
                if !include_pattern {
                    buf.drain(..pattern_len);
                }
                return Ok(data);
            }

            if eof {
                let remainder = std::mem::take(&mut *self.read_buffer.borrow_mut());
                if raise_on_eof {
                    return Err(ReactorCoreError::EndOfStream { partial: remainder });
                }
                return Ok(remainder);
            }

            // Snapshot the length *before* this fill: the next scan must
            // resume from here minus the longest pattern, so a match
            // straddling the old/new boundary is still caught. Using the
            // post-fill length instead would skip straight past any match
            // that starts in the bytes already scanned this round.
            let pre_fill_len = self.read_buffer.borrow().len();
            eof = self.clone().fill_rbuf(self.read_target).await?;
            last_index = pre_fill_len.saturating_sub(longest);
        }
    }

    /// `read_until` over `{"\r\n", "\r", "\n"}`; earliest index wins,
    /// ties broken in favor of the longer pattern (`"\r\n"` beats
    /// `"\r"` at the same position).
    pub async fn read_line(self: &Rc<Self>, include_newline: bool) -> Result<Vec<u8>> {
        self.read_until(&[b"\r\n", b"\r", b"\n"], false, include_newline)
            .await
    }

    async fn flush_impl(self: Rc<Self>) -> Result<()> {
        let data = std::mem::take(&mut *self.write_buffer.borrow_mut());
        self.inner.write(data).await
    }

    /// Writes the entire write buffer through to the inner transport.
    pub async fn flush(self: &Rc<Self>) -> Result<()> {
        self.clone().flush_impl().await
    }
}

fn find_earliest(buf: &[u8], patterns: &[&[u8]], start: usize) -> Option<(usize, usize)> {
    let start = start.min(buf.len());
    let mut best: Option<(usize, usize)> = None;

    for pattern in patterns {
        if pattern.is_empty() {
            continue;
        }
        if let Some(relative) = find_subslice(&buf[start..], pattern) {
            let index = start + relative;
            best = Some(match best {
                None => (index, pattern.len()),
                Some((best_index, best_len)) => {
                    if index < best_index || (index == best_index && pattern.len() > best_len) {
                        (index, pattern.len())
                    } else {
                        (best_index, best_len)
                    }
                }
            });
        }
    }

    best
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl Transport for BufferedTransport {
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
            this.write_buffer.borrow_mut().extend_from_slice(&data);
            let should_flush = this.write_buffer.borrow().len() > this.write_target;
            let result = if should_flush {
                this.clone().flush_impl().await
            } else {
                Ok(())
            };
            match result {
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
        let writable = self.writable;
        task::spawn(&self.reactor, async move {
            if writable {
                if let Err(err) = this.clone().flush_impl().await {
                    let _ = subscriber.throw(err);
                    return;
                }
            }
            match this.inner.close().await {
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
        let mut props = self.inner.properties();
        props.buffered = true;
        props
    }
}
