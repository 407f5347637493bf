//! Watch fast path: settled events pushed straight to the remote

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use cloudsync_sync::watch_bridge::{BridgeOutcome, WatchBridge};
use cloudsync_sync::watcher::ChangeEvent;

use crate::common::*;

fn bridge(harness: &Harness) -> WatchBridge {
    WatchBridge::new(
        harness.engine.clone(),
        Duration::from_millis(100),
        Duration::from_millis(5),
    )
}

async fn synced_harness() -> Harness {
    let harness = Harness::new();
    harness
        .engine
        .run_cycle(false, &CancellationToken::new())
        .await
        .unwrap();
    harness.remote.reset_calls();
    harness
}

#[tokio::test]
async fn removal_issues_remote_delete() {
    let harness = synced_harness().await;
    harness
        .remote
        .put_file(OWN_DIR, "reports/q1.csv", b"a,b", now_secs());

    let outcome = bridge(&harness)
        .handle_event(&ChangeEvent::Removed(harness.path("Personal/reports/q1.csv")))
        .await;

    assert_eq!(outcome, BridgeOutcome::RemoteDeleted);
    assert_eq!(
        harness.remote.deletes(),
        vec![(OWN_DIR.to_string(), "reports/q1.csv".to_string())]
    );
    assert!(harness.remote.file(OWN_DIR, "reports/q1.csv").is_none());
}

#[tokio::test]
async fn addition_uploads_into_parent_path() {
    let harness = synced_harness().await;
    let path = harness.write_local("Projects/Alpha/x/y.txt", b"payload", now_secs());

    let outcome = bridge(&harness)
        .handle_event(&ChangeEvent::Added(path))
        .await;

    assert_eq!(outcome, BridgeOutcome::Uploaded);
    assert_eq!(
        harness.remote.uploads(),
        vec![(ALPHA_DIR.to_string(), "x/y.txt".to_string())]
    );
}

#[tokio::test]
async fn change_at_top_of_root_uploads_with_empty_parent() {
    let harness = synced_harness().await;
    let path = harness.write_local("Shared/From Bob/notes.md", b"# notes", now_secs());

    let outcome = bridge(&harness)
        .handle_event(&ChangeEvent::Changed(path))
        .await;

    assert_eq!(outcome, BridgeOutcome::Uploaded);
    assert_eq!(
        harness.remote.uploads(),
        vec![(SHARED_DIR.to_string(), "notes.md".to_string())]
    );
}

#[tokio::test]
async fn unmapped_paths_are_ignored() {
    let harness = synced_harness().await;
    let unknown = harness.write_local("Projects/Unknown/x", b"?", now_secs());
    let bridge = bridge(&harness);

    assert_eq!(
        bridge.handle_event(&ChangeEvent::Added(unknown)).await,
        BridgeOutcome::Ignored
    );
    assert_eq!(
        bridge
            .handle_event(&ChangeEvent::Removed(harness.path("Personal")))
            .await,
        BridgeOutcome::Ignored
    );
    assert_eq!(
        bridge
            .handle_event(&ChangeEvent::Removed(harness.path("Projects/Unknown")))
            .await,
        BridgeOutcome::Ignored
    );
    assert!(harness.remote.deletes().is_empty());
    assert!(harness.remote.uploads().is_empty());
}

#[tokio::test]
async fn removing_a_project_folder_deletes_its_remote_top() {
    let harness = synced_harness().await;

    let outcome = bridge(&harness)
        .handle_event(&ChangeEvent::Removed(harness.path("Projects/Alpha")))
        .await;

    assert_eq!(outcome, BridgeOutcome::RemoteDeleted);
    assert_eq!(
        harness.remote.deletes(),
        vec![(ALPHA_DIR.to_string(), String::new())]
    );
}

#[tokio::test]
async fn lock_files_and_directories_are_not_uploaded() {
    let harness = synced_harness().await;
    let lock = harness.write_local("Personal/~$doc.docx", b"lock", now_secs());
    std::fs::create_dir_all(harness.path("Personal/new-folder")).unwrap();
    let bridge = bridge(&harness);

    assert_eq!(
        bridge.handle_event(&ChangeEvent::Added(lock)).await,
        BridgeOutcome::Ignored
    );
    assert_eq!(
        bridge
            .handle_event(&ChangeEvent::Added(harness.path("Personal/new-folder")))
            .await,
        BridgeOutcome::Ignored
    );
    assert!(harness.remote.uploads().is_empty());
}

#[tokio::test]
async fn vanished_file_is_ignored() {
    let harness = synced_harness().await;

    let outcome = bridge(&harness)
        .handle_event(&ChangeEvent::Changed(harness.path("Personal/gone.txt")))
        .await;

    assert_eq!(outcome, BridgeOutcome::Ignored);
    assert!(harness.remote.uploads().is_empty());
}

#[tokio::test]
async fn events_before_first_tree_are_ignored() {
    let harness = Harness::new();
    let path = harness.write_local("Personal/early.txt", b"early", now_secs());

    let outcome = bridge(&harness)
        .handle_event(&ChangeEvent::Added(path))
        .await;

    assert_eq!(outcome, BridgeOutcome::Ignored);
}

#[tokio::test]
async fn running_bridge_pushes_new_files() {
    let harness = synced_harness().await;
    let cancel = CancellationToken::new();
    let task = tokio::spawn(bridge(&harness).run(cancel.clone()));

    // Give the OS watcher time to register before writing
    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(harness.path("Personal/watched.txt"), b"seen").unwrap();

    let mut uploaded = false;
    for _ in 0..100 {
        if harness
            .remote
            .uploads()
            .contains(&(OWN_DIR.to_string(), "watched.txt".to_string()))
        {
            uploaded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    cancel.cancel();
    task.await.unwrap().unwrap();
    assert!(uploaded, "watched file was never uploaded");
}
