mod support;

use cordage::fs::File;
use cordage::transport::Transport;
use support::new_reactor;

fn scratch_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("cordage_test_{name}_{}.txt", std::process::id()))
}

#[test]
fn write_mode_creates_and_truncates_the_file_on_disk() {
    let reactor = new_reactor();
    let path = scratch_path("create_truncate");
    std::fs::remove_file(&path).ok();
    let path_str = path.to_str().unwrap().to_string();

    cordage::block_on(&reactor, {
        let reactor = reactor.clone();
        async move {
            let file = File::open(reactor, path_str, "w").await?;
            file.close().await
        }
    })
    .expect("reactor failed")
    .expect("open/close failed");

    let metadata = std::fs::metadata(&path).expect("file was not created");
    assert_eq!(metadata.len(), 0);
    std::fs::remove_file(&path).ok();
}

#[test]
fn opening_a_nonexistent_file_for_reading_fails() {
    let reactor = new_reactor();
    let path = scratch_path("missing");
    std::fs::remove_file(&path).ok();
    let path_str = path.to_str().unwrap().to_string();

    let result = cordage::block_on(&reactor, {
        let reactor = reactor.clone();
        async move { File::open(reactor, path_str, "r").await }
    })
    .expect("reactor failed");

    assert!(result.is_err());
}

#[test]
fn mode_string_grants_capabilities_per_rwa_rules() {
    let reactor = new_reactor();

    let write_only = scratch_path("mode_w");
    std::fs::remove_file(&write_only).ok();
    let props = cordage::block_on(&reactor, {
        let reactor = reactor.clone();
        let path = write_only.to_str().unwrap().to_string();
        async move {
            let file = File::open(reactor, path, "w").await?;
            file.close().await?;
            Ok(file.properties())
        }
    })
    .expect("reactor failed")
    .expect("open failed");
    assert!(!props.readable);
    assert!(props.writable);
    std::fs::remove_file(&write_only).ok();

    let read_write = scratch_path("mode_plus");
    std::fs::remove_file(&read_write).ok();
    let props = cordage::block_on(&reactor, {
        let reactor = reactor.clone();
        let path = read_write.to_str().unwrap().to_string();
        async move {
            let file = File::open(reactor, path, "w+").await?;
            file.close().await?;
            Ok(file.properties())
        }
    })
    .expect("reactor failed")
    .expect("open failed");
    assert!(props.readable);
    assert!(props.writable);
    std::fs::remove_file(&read_write).ok();
}
