mod support;

use cordage::ReactorCoreError;
use cordage::transport::{CodecTransport, ErrorPolicy};
use support::{MockTransport, new_reactor, run};

#[test]
fn multibyte_codepoint_split_across_read_boundary_decodes_whole() {
    let reactor = new_reactor();
    let mock = MockTransport::new(
        reactor.clone(),
        vec![b"caf\xC3".to_vec(), b"\xA9!".to_vec(), Vec::new()],
    );
    let codec = CodecTransport::new(reactor.clone(), mock, ErrorPolicy::Strict);

    let mut text = String::new();
    for _ in 0..3 {
        text.push_str(&run(&reactor, {
            let codec = codec.clone();
            async move { codec.read_text(4096).await }
        }));
    }
    assert_eq!(text, "café!");
}

#[test]
fn strict_policy_fails_on_invalid_byte() {
    let reactor = new_reactor();
    let mock = MockTransport::new(reactor.clone(), vec![b"a\xFFb".to_vec()]);
    let codec = CodecTransport::new(reactor.clone(), mock, ErrorPolicy::Strict);

    let result = cordage::block_on(&reactor, async move { codec.read_text(4096).await })
        .expect("reactor failed");

    assert!(matches!(result, Err(ReactorCoreError::Codec(_))));
}

#[test]
fn lossy_policy_substitutes_replacement_character() {
    let reactor = new_reactor();
    let mock = MockTransport::new(reactor.clone(), vec![b"a\xFFb".to_vec()]);
    let codec = CodecTransport::new(reactor.clone(), mock, ErrorPolicy::Lossy);

    let text = run(&reactor, async move { codec.read_text(4096).await });
    assert_eq!(text, "a\u{FFFD}b");
}

#[test]
fn write_text_round_trips_through_inner_bytes() {
    let reactor = new_reactor();
    let mock = MockTransport::new(reactor.clone(), Vec::new());
    let codec = CodecTransport::new(reactor.clone(), mock.clone(), ErrorPolicy::Strict);

    run(&reactor, async move { codec.write_text("héllo").await });
    assert_eq!(mock.written(), "héllo".as_bytes());
}
