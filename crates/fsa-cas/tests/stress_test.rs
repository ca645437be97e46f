use std::sync::Arc;
use std::thread;
use std::time::Instant;

use fsa_cas::{ContentStore, HashAlgorithm, ShardLayout};
use tempfile::TempDir;

fn open(temp: &TempDir) -> ContentStore {
    ContentStore::open(
        temp.path().join("base"),
        temp.path().join("spool"),
        ShardLayout::Core,
        HashAlgorithm::Sha256,
    )
    .unwrap()
}

#[test]
fn stress_test_mass_store() {
    // Quick stress test for CI
    const BLOB_COUNT: usize = 200;

    let temp = TempDir::new().unwrap();
    let store = open(&temp);

    let start = Instant::now();
    for i in 0..BLOB_COUNT {
        // Alternating content to test dedup (50% unique)
        let content = if i % 2 == 0 {
            format!("content unique {}", i)
        } else {
            "shared content".to_string()
        };
        store.put(content.as_bytes()).unwrap();
    }
    println!("Spooling took: {:?}", start.elapsed());

    let start = Instant::now();
    let report = store.sweep();
    println!("Sweep took: {:?} ({:?})", start.elapsed(), report);

    // 100 unique blobs + 1 shared blob
    assert_eq!(report.moved, 101);
    let stats = store.shards().stats().unwrap();
    assert_eq!(stats.compressed_blobs, 101);
    assert_eq!(store.spool().backlog().unwrap(), 0);
}

#[test]
fn concurrent_writers_of_identical_content() {
    const THREADS: usize = 16;

    let temp = TempDir::new().unwrap();
    let store = Arc::new(open(&temp));
    let payload = b"every thread writes these exact bytes".repeat(64);

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = Arc::clone(&store);
            let payload = payload.clone();
            thread::spawn(move || store.put(&payload).unwrap().hash)
        })
        .collect();

    let hashes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(hashes.windows(2).all(|w| w[0] == w[1]));

    store.sweep();
    assert_eq!(store.shards().stats().unwrap().blob_count(), 1);
    assert_eq!(store.spool().backlog().unwrap(), 0);
    assert_eq!(
        std::fs::read_dir(store.spool().staging_dir()).unwrap().count(),
        0,
        "no temp files may be left behind"
    );
    assert_eq!(store.read(&hashes[0]).unwrap().unwrap(), payload);
}

#[test]
fn readers_never_miss_while_mover_runs() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(open(&temp));

    let hashes: Vec<_> = (0..100)
        .map(|i| store.put(format!("racing {}", i).as_bytes()).unwrap().hash)
        .collect();

    let mover = {
        let store = Arc::clone(&store);
        thread::spawn(move || store.sweep())
    };

    for (i, hash) in hashes.iter().enumerate() {
        let data = store.read(hash).unwrap().expect("blob visible in spool or shard");
        assert_eq!(data, format!("racing {}", i).as_bytes());
    }

    mover.join().unwrap();
}
