//! `File::open`: parses a mode string and dispatches the blocking
//! `open(2)` syscall through the reactor's callback queue, so it runs
//! synchronously but never inline ahead of whatever step currently
//! holds the thread.

use crate::deferred::Deferred;
use crate::error::ReactorCoreError;
use crate::reactor::ReactorHandle;
use crate::transport::BaseTransport;

use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;

/// Parses a mode string: `readable` iff it contains `r` or `+`;
/// `writable` iff it contains `a`, `w`, or `+`. `t`/`b` are accepted
/// and ignored — every transport in this crate is binary; text
/// conversion belongs solely to the codec adapter.
fn parse_mode(mode: &str) -> (bool, bool, i32) {
    let has = |c: char| mode.contains(c);
    let readable = has('r') || has('+');
    let writable = has('a') || has('w') || has('+');

    let mut flags = match (has('a'), has('w'), has('+')) {
        (true, _, true) => libc::O_RDWR | libc::O_CREAT | libc::O_APPEND,
        (true, _, false) => libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND,
        (_, true, true) => libc::O_RDWR | libc::O_CREAT | libc::O_TRUNC,
        (_, true, false) => libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
        (_, _, true) => libc::O_RDWR,
        _ => libc::O_RDONLY,
    };
    flags |= libc::O_NONBLOCK;

    (readable, writable, flags)
}

/// Opens files as reactor-registered [`BaseTransport`]s. There is no
/// `File` value distinct from the transport it hands back — opening
/// simply produces a transport capability, same as any other fd
/// source in this crate.
pub struct File;

impl File {
    /// Opens `path` under `mode`, resolving to a [`BaseTransport`] whose
    /// capabilities follow the mode-string rules above.
    pub fn open(
        reactor: ReactorHandle,
        path: impl Into<String>,
        mode: impl Into<String>,
    ) -> Deferred<Rc<BaseTransport>> {
        let deferred = Deferred::new(reactor.clone());
        let subscriber = deferred.clone();
        let path = path.into();
        let mode = mode.into();
        let reactor_for_open = reactor.clone();

        // Offloaded through the callback queue rather than run inline:
        // `open(2)` still blocks the thread while it runs, but only
        // during its own queued turn, not while some other step is
        // mid-flight.
        reactor.call(move || {
            let (readable, writable, flags) = parse_mode(&mode);

            let opened: Result<RawFd, ReactorCoreError> = CString::new(path)
                .map_err(|err| ReactorCoreError::Io(io::Error::new(io::ErrorKind::InvalidInput, err)))
                .and_then(|c_path| {
                    let fd = unsafe { libc::open(c_path.as_ptr(), flags, 0o644) };
                    if fd < 0 {
                        Err(ReactorCoreError::Io(io::Error::last_os_error()))
                    } else {
                        Ok(fd)
                    }
                });

            match opened {
                Ok(fd) => {
                    let transport = BaseTransport::new(reactor_for_open, fd, readable, writable);
                    let _ = subscriber.set(transport);
                }
                Err(err) => {
                    let _ = subscriber.throw(err);
                }
            }
        });

        deferred
    }
}
