//! Cycle chaining, the enable toggle, retry after failed cycles, and the
//! watch bridge the loop starts after its first cycle

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cloudsync_sync::engine::CycleReport;
use cloudsync_sync::sync_loop::SyncLoop;
use cloudsync_sync::watch_bridge::WatchBridge;

use crate::common::*;

const DELAY: Duration = Duration::from_millis(20);

async fn next_report(rx: &mut mpsc::UnboundedReceiver<CycleReport>) -> CycleReport {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for a cycle")
        .expect("report channel closed")
}

fn watching_loop(harness: &Harness) -> SyncLoop {
    let bridge = WatchBridge::new(
        harness.engine.clone(),
        Duration::from_millis(100),
        Duration::from_millis(5),
    );
    SyncLoop::new(harness.engine.clone(), DELAY).with_watch_bridge(bridge)
}

/// Polls `done` every 10ms for up to five seconds
async fn eventually(done: impl Fn() -> bool) -> bool {
    for _ in 0..500 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    done()
}

#[tokio::test]
async fn cycles_alternate_starting_with_upload_pass() {
    let harness = Harness::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sync_loop = SyncLoop::new(harness.engine.clone(), DELAY).with_report_channel(tx);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(sync_loop.run(cancel.clone()));

    let passes = [
        next_report(&mut rx).await.deletion_pass,
        next_report(&mut rx).await.deletion_pass,
        next_report(&mut rx).await.deletion_pass,
        next_report(&mut rx).await.deletion_pass,
    ];

    cancel.cancel();
    let cycles = task.await.unwrap();
    assert_eq!(passes, [false, true, false, true]);
    assert!(cycles >= 4);
}

#[tokio::test]
async fn disabled_loop_waits_and_resumes_with_upload_pass() {
    let harness = Harness::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sync_loop = SyncLoop::new(harness.engine.clone(), DELAY).with_report_channel(tx);
    let toggle = sync_loop.toggle();
    toggle.disable();

    let cancel = CancellationToken::new();
    let task = tokio::spawn(sync_loop.run(cancel.clone()));

    let idle = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
    assert!(idle.is_err(), "no cycle may run while disabled");
    assert_eq!(harness.remote.fetches(), 0);

    toggle.enable();
    assert!(!next_report(&mut rx).await.deletion_pass);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn pausing_after_a_cycle_stops_the_chain() {
    let harness = Harness::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sync_loop = SyncLoop::new(harness.engine.clone(), Duration::from_millis(200))
        .with_report_channel(tx);
    let toggle = sync_loop.toggle();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(sync_loop.run(cancel.clone()));

    next_report(&mut rx).await;
    toggle.disable();
    let fetches = harness.remote.fetches();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(harness.remote.fetches(), fetches);

    toggle.enable();
    assert!(!next_report(&mut rx).await.deletion_pass);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn failed_cycles_are_retried_after_the_delay() {
    let harness = Harness::new();
    harness.remote.set_fetch_failure(true);
    let sync_loop = SyncLoop::new(harness.engine.clone(), DELAY);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(sync_loop.run(cancel.clone()));

    for _ in 0..200 {
        if harness.remote.fetches() >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(harness.remote.fetches() >= 3);

    harness.remote.set_fetch_failure(false);
    harness.write_local("Personal/late.txt", b"late", now_secs() - 5);

    // The next upload pass picks the file up once the remote recovers
    for _ in 0..500 {
        if !harness.remote.uploads().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(
        harness.remote.uploads(),
        vec![(OWN_DIR.to_string(), "late.txt".to_string())]
    );
}

#[tokio::test]
async fn cancellation_stops_the_loop() {
    let harness = Harness::new();
    let sync_loop = SyncLoop::new(harness.engine.clone(), Duration::from_secs(3600));
    let cancel = CancellationToken::new();
    let task = tokio::spawn(sync_loop.run(cancel.clone()));

    while harness.remote.fetches() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();

    let cycles = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("loop did not stop")
        .unwrap();
    assert_eq!(cycles, 1);
}

#[tokio::test]
async fn watcher_survives_an_offline_start_without_a_sync_root() {
    let harness = Harness::with_missing_root();
    harness.remote.set_fetch_failure(true);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sync_loop = watching_loop(&harness).with_report_channel(tx);
    let toggle = sync_loop.toggle();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(sync_loop.run(cancel.clone()));

    assert!(eventually(|| harness.remote.fetches() >= 2).await);
    assert!(harness.path("Personal").is_dir());
    harness.remote.set_fetch_failure(false);
    next_report(&mut rx).await;

    // Only the watcher can upload from here on
    toggle.disable();
    tokio::time::sleep(Duration::from_millis(200)).await;
    harness.remote.reset_calls();
    let fetches = harness.remote.fetches();

    std::fs::write(harness.path("Personal/late.txt"), b"late").unwrap();
    let uploaded = eventually(|| {
        harness
            .remote
            .uploads()
            .contains(&(OWN_DIR.to_string(), "late.txt".to_string()))
    })
    .await;

    cancel.cancel();
    task.await.unwrap();
    assert!(uploaded, "watched write was never uploaded");
    assert_eq!(harness.remote.fetches(), fetches);
}

#[tokio::test]
async fn watch_bridge_starts_once_across_cycles() {
    let harness = Harness::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sync_loop = watching_loop(&harness).with_report_channel(tx);
    let toggle = sync_loop.toggle();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(sync_loop.run(cancel.clone()));

    // Several cycles, each of which would start another watcher if the
    // bridge were not taken on the first one
    for _ in 0..4 {
        next_report(&mut rx).await;
    }
    toggle.disable();
    tokio::time::sleep(Duration::from_millis(200)).await;
    harness.remote.reset_calls();

    std::fs::write(harness.path("Personal/pushed.txt"), b"pushed").unwrap();
    assert!(
        eventually(|| !harness.remote.uploads().is_empty()).await,
        "watched write was never uploaded"
    );

    // Give a second watcher time to report the same settled change
    tokio::time::sleep(Duration::from_millis(500)).await;

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(
        harness.remote.uploads(),
        vec![(OWN_DIR.to_string(), "pushed.txt".to_string())]
    );
}
