mod support;

use cordage::ReactorCoreError;
use cordage::transport::PacketTransport;
use support::{MockTransport, new_reactor, run};

#[test]
fn send_emits_four_byte_big_endian_length_header() {
    let reactor = new_reactor();
    let mock = MockTransport::new(reactor.clone(), Vec::new());
    let packet = PacketTransport::with_raw(reactor.clone(), mock.clone(), 0);

    run(&reactor, async move { packet.send(b"hello".to_vec(), true).await });

    assert_eq!(
        mock.written(),
        vec![0x00, 0x00, 0x00, 0x05, b'h', b'e', b'l', b'l', b'o']
    );
}

#[test]
fn recv_reads_header_then_exactly_the_declared_body_length() {
    let reactor = new_reactor();
    // Header and body arrive split across two inner reads, the way a
    // socket would deliver them across two readiness events.
    let mock = MockTransport::new(
        reactor.clone(),
        vec![vec![0x00, 0x00, 0x00, 0x05, b'w'], b"orld".to_vec()],
    );
    let packet = PacketTransport::with_raw(reactor.clone(), mock, 0);

    let frame = run(&reactor, async move { packet.recv().await });
    assert_eq!(frame, b"world");
}

#[test]
fn recv_rejects_oversized_frame_from_header_alone() {
    let reactor = new_reactor();
    let mock = MockTransport::new(
        reactor.clone(),
        vec![vec![0x00, 0x00, 0x00, 0x05], b"abcde".to_vec()],
    );
    let packet = PacketTransport::with_raw(reactor.clone(), mock, 4);

    let result = cordage::block_on(&reactor, async move { packet.recv().await })
        .expect("reactor failed");

    match result {
        Err(ReactorCoreError::PacketTooLong { length, max }) => {
            assert_eq!(length, 5);
            assert_eq!(max, 4);
        }
        other => panic!("expected PacketTooLong, got {other:?}"),
    }
}

#[test]
fn recv_on_truncated_stream_raises_end_of_stream() {
    let reactor = new_reactor();
    let mock = MockTransport::new(reactor.clone(), vec![vec![0x00, 0x00], Vec::new()]);
    let packet = PacketTransport::with_raw(reactor.clone(), mock, 0);

    let result = cordage::block_on(&reactor, async move { packet.recv().await })
        .expect("reactor failed");

    assert!(matches!(result, Err(ReactorCoreError::EndOfStream { .. })));
}
