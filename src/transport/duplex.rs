//! Duplex adapter: pairs an independent input transport and output
//! transport behind one readable+writable handle. Useful for
//! stream pairs that don't share an fd, e.g. `stdin`/`stdout`.

use super::{Inner, Properties, Transport};
use crate::deferred::Deferred;
use crate::error::ReactorCoreError;
use crate::reactor::ReactorHandle;
use crate::task;

use std::rc::{Rc, Weak};

/// Composes a read-side and a write-side transport into one handle.
/// `read` delegates entirely to the input side; `write` to the output
/// side. `close` closes both, aggregating errors if both sides fail.
pub struct DuplexStreamTransport {
    input: Inner,
    output: Inner,
    reactor: ReactorHandle,
    self_weak: Weak<DuplexStreamTransport>,
}

impl DuplexStreamTransport {
    pub fn new(reactor: ReactorHandle, input: Inner, output: Inner) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            input,
            output,
            reactor,
            self_weak: weak.clone(),
        })
    }

    fn rc(&self) -> Rc<Self> {
        self.self_weak
            .upgrade()
            .expect("DuplexStreamTransport outlives its own Rc")
    }
}

impl Transport for DuplexStreamTransport {
    fn read(&self, count: isize) -> Deferred<Vec<u8>> {
        self.input.read(count)
    }

    fn write(&self, data: Vec<u8>) -> Deferred<()> {
        self.output.write(data)
    }

    fn close(&self) -> Deferred<()> {
        let deferred = Deferred::new(self.reactor.clone());
        let this = self.rc();
        let subscriber = deferred.clone();
        task::spawn(&self.reactor, async move {
            let input_result = this.input.close().await;
            let output_result = this.output.close().await;

            match (input_result, output_result) {
                (Ok(()), Ok(())) => {
                    let _ = subscriber.set(());
                }
                (Err(err), Ok(())) | (Ok(()), Err(err)) => {
                    let _ = subscriber.throw(err);
                }
                (Err(input_err), Err(output_err)) => {
                    let _ = subscriber.throw(ReactorCoreError::Reactor(format!(
                        "duplex close failed on both sides: input: {input_err}; output: {output_err}"
                    )));
                }
            }
        });
        deferred
    }

    fn detach(&self) {
        self.input.detach();
        self.output.detach();
    }

    fn fileno(&self) -> std::os::unix::io::RawFd {
        // Informational only: a duplex pair is never registered as a
        // single unit, each side registers itself independently when
        // its own `read`/`write` is invoked.
        self.input.fileno()
    }

    fn properties(&self) -> Properties {
        let input = self.input.properties();
        let output = self.output.properties();
        Properties::new(input.readable, output.writable).with_buffered(input.buffered && output.buffered)
    }
}
