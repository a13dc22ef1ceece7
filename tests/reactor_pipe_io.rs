mod support;

use cordage::ReactorCoreError;
use cordage::transport::{BaseTransport, Transport};
use support::{new_reactor, pipe_pair};

#[test]
fn write_then_read_round_trips_over_a_real_pipe() {
    let reactor = new_reactor();
    let (read_side, write_side) = pipe_pair(&reactor);

    let data = cordage::block_on(&reactor, async move {
        write_side.write(b"ping".to_vec()).await?;
        read_side.read(4).await
    })
    .expect("reactor failed")
    .expect("pipe round trip failed");

    assert_eq!(data, b"ping");
}

#[test]
fn read_past_eof_on_a_closed_write_end_returns_empty() {
    let reactor = new_reactor();
    let (read_side, write_side) = pipe_pair(&reactor);

    let data = cordage::block_on(&reactor, async move {
        write_side.close().await?;
        read_side.read(16).await
    })
    .expect("reactor failed")
    .expect("read after close failed");

    assert!(data.is_empty());
}

#[test]
fn registering_a_different_transport_on_an_occupied_fd_is_fatal() {
    let reactor = new_reactor();
    let (read_side, _write_side) = pipe_pair(&reactor);
    let fd = read_side.fileno();

    // Issuing a read registers `read_side` itself as the fd's read
    // handler; a second, distinct transport over the same fd must
    // collide with it.
    let _pending = read_side.read(1);

    let shadow = BaseTransport::new(reactor.clone(), fd, true, false);
    let result = reactor.register_read(shadow);
    assert!(matches!(result, Err(ReactorCoreError::Reactor(_))));
}

#[test]
fn reregistering_the_same_transport_is_a_no_op() {
    let reactor = new_reactor();
    let (read_side, _write_side) = pipe_pair(&reactor);

    let _pending = read_side.read(1);
    let result = reactor.register_read(read_side);
    assert!(result.is_ok());
}
