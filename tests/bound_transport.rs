mod support;

use cordage::ReactorCoreError;
use cordage::transport::BoundTransport;
use support::{MockTransport, new_reactor, run};

#[test]
fn read_quota_caps_bytes_and_tracks_remaining() {
    let reactor = new_reactor();
    let inner = MockTransport::new(reactor.clone(), vec![b"abc".to_vec(), b"defghij".to_vec()]);
    let bound = BoundTransport::new(reactor.clone(), inner, Some(10), None, false, false);

    let first = run(&reactor, {
        let bound = bound.clone();
        async move { bound.read(3).await }
    });
    assert_eq!(first, b"abc");
    assert_eq!(bound.remaining_read(), Some(7));

    let second = run(&reactor, {
        let bound = bound.clone();
        async move { bound.read(100).await }
    });
    assert_eq!(second, b"defghij");
    assert_eq!(bound.remaining_read(), Some(0));
}

#[test]
fn exhausted_read_quota_yields_eof_without_touching_inner() {
    let reactor = new_reactor();
    let inner = MockTransport::new(reactor.clone(), vec![b"xyz".to_vec()]);
    let bound = BoundTransport::new(reactor.clone(), inner, Some(0), None, false, false);

    let data = run(&reactor, async move { bound.read(10).await });
    assert!(data.is_empty());
}

#[test]
fn write_over_quota_fails_before_touching_inner() {
    let reactor = new_reactor();
    let inner = MockTransport::new(reactor.clone(), Vec::new());
    let bound = BoundTransport::new(reactor.clone(), inner, None, Some(4), false, false);

    let result = cordage::block_on(&reactor, async move { bound.write(b"toolong".to_vec()).await })
        .expect("reactor failed");

    assert!(matches!(result, Err(ReactorCoreError::EndOfStream { .. })));
}

#[test]
fn skip_on_close_drains_remaining_read_quota_from_inner() {
    let reactor = new_reactor();
    let inner = MockTransport::new(reactor.clone(), vec![b"abc".to_vec(), b"defghij".to_vec()]);
    let bound = BoundTransport::new(reactor.clone(), inner, Some(10), None, true, false);

    run(&reactor, {
        let bound = bound.clone();
        async move {
            bound.read(3).await?;
            Ok(())
        }
    });
    assert_eq!(bound.remaining_read(), Some(7));

    run(&reactor, {
        let bound = bound.clone();
        async move { bound.close().await }
    });
    assert_eq!(bound.remaining_read(), Some(0));
}

#[test]
fn close_without_flags_leaves_inner_untouched() {
    let reactor = new_reactor();
    let inner = MockTransport::new(reactor.clone(), vec![b"abc".to_vec()]);
    let bound = BoundTransport::new(reactor.clone(), inner.clone(), Some(10), None, false, false);

    run(&reactor, async move { bound.close().await });
    assert!(!inner.is_closed());
}
