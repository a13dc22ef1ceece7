//! Standard stream transports.

use crate::reactor::ReactorHandle;
use crate::transport::BaseTransport;

use std::os::unix::io::RawFd;
use std::rc::Rc;

const STDIN_FD: RawFd = 0;
const STDOUT_FD: RawFd = 1;
const STDERR_FD: RawFd = 2;

fn set_nonblocking(fd: RawFd) {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags >= 0 {
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }
    }
}

/// Exposes `stdin`/`stdout`/`stderr` as pipe-style transports
/// registered against their well-known fds.
pub struct Stdio;

impl Stdio {
    pub fn stdin(reactor: ReactorHandle) -> Rc<BaseTransport> {
        set_nonblocking(STDIN_FD);
        BaseTransport::new(reactor, STDIN_FD, true, false)
    }

    pub fn stdout(reactor: ReactorHandle) -> Rc<BaseTransport> {
        set_nonblocking(STDOUT_FD);
        BaseTransport::new(reactor, STDOUT_FD, false, true)
    }

    pub fn stderr(reactor: ReactorHandle) -> Rc<BaseTransport> {
        set_nonblocking(STDERR_FD);
        BaseTransport::new(reactor, STDERR_FD, false, true)
    }
}
