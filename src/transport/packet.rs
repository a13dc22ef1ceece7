//! Packet framing adapter: 4-byte unsigned big-endian length-prefixed
//! messages over a buffered inner transport.
//!
//! Construction always wraps the inner transport in a
//! [`BufferedTransport`] when one isn't supplied directly — framing
//! relies on `read_exactly` to pull precisely the header and body
//! bytes off the wire, one fill at a time, which only the buffering
//! adapter provides.

use super::{BufferedTransport, Inner, Properties, Transport};
use crate::deferred::Deferred;
use crate::error::{ReactorCoreError, Result};
use crate::reactor::ReactorHandle;
use crate::task;

use std::rc::{Rc, Weak};

const HEADER_LEN: usize = 4;

/// Length-prefixed message framing over a [`BufferedTransport`].
///
/// A receiver with `max_length > 0` rejects any frame whose declared
/// length exceeds it — checked against the header alone, before a
/// single body byte is read off the wire.
pub struct PacketTransport {
    inner: Rc<BufferedTransport>,
    reactor: ReactorHandle,
    max_length: u32,
    self_weak: Weak<PacketTransport>,
}

impl PacketTransport {
    /// Wraps an already-buffered inner transport. `max_length == 0`
    /// disables the oversized-frame check.
    pub fn new(reactor: ReactorHandle, inner: Rc<BufferedTransport>, max_length: u32) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            inner,
            reactor,
            max_length,
            self_weak: weak.clone(),
        })
    }

    /// Wraps an arbitrary transport, auto-installing a
    /// [`BufferedTransport`] underneath it first.
    pub fn with_raw(reactor: ReactorHandle, inner: Inner, max_length: u32) -> Rc<Self> {
        let buffered = BufferedTransport::new(reactor.clone(), inner);
        Self::new(reactor, buffered, max_length)
    }

    fn rc(&self) -> Rc<Self> {
        self.self_weak
            .upgrade()
            .expect("PacketTransport outlives its own Rc")
    }

    /// Emits the 4-byte length header followed by `data`, flushing the
    /// inner buffer when `flush` is true.
    pub async fn send(&self, data: Vec<u8>, flush: bool) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| {
            ReactorCoreError::Reactor(format!(
                "packet payload of {} bytes exceeds u32 length header",
                data.len()
            ))
        })?;

        let mut frame = Vec::with_capacity(HEADER_LEN + data.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(&data);

        self.inner.write(frame).await?;
        if flush {
            self.inner.flush().await?;
        }
        Ok(())
    }

    /// Reads one frame: exactly 4 header bytes, then exactly the
    /// declared number of body bytes. `await_header -> await_body(L)
    /// -> complete`; EOF at either stage propagates as `EndOfStream`.
    pub async fn recv(&self) -> Result<Vec<u8>> {
        let header = self.inner.read_exactly(HEADER_LEN, true).await?;
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);

        if self.max_length > 0 && length > self.max_length {
            return Err(ReactorCoreError::PacketTooLong {
                length,
                max: self.max_length,
            });
        }

        self.inner.read_exactly(length as usize, true).await
    }

    pub async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }
}

impl Transport for PacketTransport {
    /// Reads one raw chunk off the inner transport directly — `recv()`
    /// is the framed operation; `read`/`write` remain pass-through so a
    /// `PacketTransport` still satisfies the base contract.
    fn read(&self, count: isize) -> Deferred<Vec<u8>> {
        self.inner.read(count)
    }

    fn write(&self, data: Vec<u8>) -> Deferred<()> {
        self.inner.write(data)
    }

    fn close(&self) -> Deferred<()> {
        let deferred = Deferred::new(self.reactor.clone());
        let this = self.rc();
        let subscriber = deferred.clone();
        task::spawn(&self.reactor, async move {
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
        self.inner.properties()
    }
}
