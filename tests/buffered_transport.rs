mod support;

use cordage::transport::BufferedTransport;
use support::{MockTransport, new_reactor, run};

#[test]
fn read_until_across_chunks_excludes_pattern() {
    let reactor = new_reactor();
    let inner = MockTransport::new(reactor.clone(), vec![b"abXX".to_vec(), b"YYcd".to_vec()]);
    let buffered = BufferedTransport::new(reactor.clone(), inner);

    let head = run(&reactor, {
        let buffered = buffered.clone();
        async move { buffered.read_until(&[b"XXYY"], false, false).await }
    });
    assert_eq!(head, b"ab");

    let rest = run(&reactor, {
        let buffered = buffered.clone();
        async move { buffered.read_all(4096).await }
    });
    assert_eq!(rest, b"cd");
}

#[test]
fn read_until_including_pattern() {
    let reactor = new_reactor();
    let inner = MockTransport::new(reactor.clone(), vec![b"abXX".to_vec(), b"YYcd".to_vec()]);
    let buffered = BufferedTransport::new(reactor.clone(), inner);

    let head = run(&reactor, async move { buffered.read_until(&[b"XXYY"], false, true).await });
    assert_eq!(head, b"abXXYY");
}

#[test]
fn read_exactly_returns_exact_count_and_leaves_remainder_buffered() {
    let reactor = new_reactor();
    let inner = MockTransport::new(reactor.clone(), vec![b"hello world".to_vec()]);
    let buffered = BufferedTransport::new(reactor.clone(), inner);

    let head = run(&reactor, {
        let buffered = buffered.clone();
        async move { buffered.read_exactly(5, true).await }
    });
    assert_eq!(head, b"hello");

    let rest = run(&reactor, async move { buffered.read_all(4096).await });
    assert_eq!(rest, b" world");
}

#[test]
fn read_exactly_short_of_target_raises_end_of_stream_with_partial() {
    let reactor = new_reactor();
    let inner = MockTransport::new(reactor.clone(), vec![b"hi".to_vec(), Vec::new()]);
    let buffered = BufferedTransport::new(reactor.clone(), inner);

    let result = cordage::block_on(&reactor, async move { buffered.read_exactly(5, true).await })
        .expect("reactor failed");

    match result {
        Err(cordage::ReactorCoreError::EndOfStream { partial }) => assert_eq!(partial, b"hi"),
        other => panic!("expected EndOfStream, got {other:?}"),
    }
}

#[test]
fn read_line_tie_break_prefers_crlf_over_bare_cr() {
    let reactor = new_reactor();
    let inner = MockTransport::new(reactor.clone(), vec![b"a\r\nb".to_vec(), Vec::new()]);
    let buffered = BufferedTransport::new(reactor.clone(), inner);

    let line = run(&reactor, {
        let buffered = buffered.clone();
        async move { buffered.read_line(false).await }
    });
    assert_eq!(line, b"a");

    let rest = run(&reactor, async move { buffered.read_all(4096).await });
    assert_eq!(rest, b"b");
}

#[test]
fn read_all_reassembles_every_chunking_of_the_stream() {
    let reactor = new_reactor();
    let chunks: Vec<Vec<u8>> = vec![
        b"one ".to_vec(),
        b"two ".to_vec(),
        b"three".to_vec(),
        Vec::new(),
    ];
    let inner = MockTransport::new(reactor.clone(), chunks);
    let buffered = BufferedTransport::new(reactor.clone(), inner);

    let all = run(&reactor, async move { buffered.read_all(4096).await });
    assert_eq!(all, b"one two three");
}
