//! Text-decoding adapter: wraps a binary transport and exposes a text
//! interface using an incremental UTF-8 decoder under a configurable
//! error policy.
//!
//! The underlying encoding is fixed to UTF-8 — the platform filesystem
//! encoding on every Unix target this crate builds for — so encoding a
//! `&str` (already guaranteed valid UTF-8 by the type) never fails;
//! only decoding incoming bytes can hit the error policy.

use super::{Inner, Properties, Transport};
use crate::deferred::Deferred;
use crate::error::{ReactorCoreError, Result};
use crate::reactor::ReactorHandle;
use crate::task;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// How the decoder reacts to a byte sequence that isn't valid UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Fail the read with a `Codec` error.
    Strict,
    /// Substitute `U+FFFD` and continue.
    Lossy,
}

#[derive(Default)]
struct IncrementalDecoder {
    pending: Vec<u8>,
}

impl IncrementalDecoder {
    fn push(&mut self, data: &[u8], finalize: bool, policy: ErrorPolicy) -> Result<String> {
        self.pending.extend_from_slice(data);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    let valid = std::str::from_utf8(&self.pending[..valid_up_to])
                        .expect("valid_up_to bounds a valid prefix");
                    out.push_str(valid);

                    match err.error_len() {
                        Some(bad_len) => match policy {
                            ErrorPolicy::Strict => {
                                return Err(ReactorCoreError::Codec(format!(
                                    "invalid UTF-8 sequence at byte {valid_up_to}"
                                )));
                            }
                            ErrorPolicy::Lossy => {
                                out.push('\u{FFFD}');
                                self.pending.drain(..valid_up_to + bad_len);
                            }
                        },
                        None => {
                            // Trailing bytes are an incomplete sequence, not
                            // an invalid one. Hold them for the next push
                            // unless this is the final call.
                            if finalize {
                                match policy {
                                    ErrorPolicy::Strict => {
                                        return Err(ReactorCoreError::Codec(
                                            "incomplete UTF-8 sequence at end of stream".into(),
                                        ));
                                    }
                                    ErrorPolicy::Lossy => {
                                        out.push('\u{FFFD}');
                                        self.pending.clear();
                                    }
                                }
                            } else {
                                self.pending.drain(..valid_up_to);
                            }
                            break;
                        }
                    }
                }
            }
        }

        Ok(out)
    }
}

/// Wraps an inner binary transport, decoding reads and encoding writes
/// as UTF-8 text.
pub struct CodecTransport {
    inner: Inner,
    reactor: ReactorHandle,
    policy: ErrorPolicy,
    decoder: RefCell<IncrementalDecoder>,
    self_weak: Weak<CodecTransport>,
}

impl CodecTransport {
    pub fn new(reactor: ReactorHandle, inner: Inner, policy: ErrorPolicy) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            inner,
            reactor,
            policy,
            decoder: RefCell::new(IncrementalDecoder::default()),
            self_weak: weak.clone(),
        })
    }

    fn rc(&self) -> Rc<Self> {
        self.self_weak
            .upgrade()
            .expect("CodecTransport outlives its own Rc")
    }

    /// Reads up to `count` raw bytes and decodes them. `count` is
    /// expressed in raw bytes, not code points; a multibyte sequence
    /// split across the boundary is held inside the decoder until the
    /// next call.
    pub async fn read_text(&self, count: isize) -> Result<String> {
        let raw = self.inner.read(count).await?;
        let finalize = raw.is_empty();
        self.decoder.borrow_mut().push(&raw, finalize, self.policy)
    }

    pub async fn write_text(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.inner.write(text.as_bytes().to_vec()).await
    }
}

impl Transport for CodecTransport {
    fn read(&self, count: isize) -> Deferred<Vec<u8>> {
        let deferred = Deferred::new(self.reactor.clone());
        let this = self.rc();
        let subscriber = deferred.clone();
        task::spawn(&self.reactor, async move {
            match this.read_text(count).await {
                Ok(text) => {
                    let _ = subscriber.set(text.into_bytes());
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
            let text = match String::from_utf8(data) {
                Ok(text) => text,
                Err(err) => {
                    let _ = subscriber.throw(ReactorCoreError::Codec(err.to_string()));
                    return;
                }
            };
            match this.write_text(&text).await {
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
        // No trailing encoder state to flush: encoding a complete `&str`
        // is always a complete byte sequence under UTF-8.
        self.inner.close()
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
