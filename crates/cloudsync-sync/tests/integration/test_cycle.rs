//! Full reconciliation cycles against the in-memory remote

use std::collections::HashMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use cloudsync_core::domain::entry::Entry;
use cloudsync_sync::filesystem::LocalFileSystemAdapter;
use cloudsync_sync::snapshot::Snapshotter;
use cloudsync_sync::SyncError;

use crate::common::*;

async fn local_hashes(harness: &Harness, relative_root: &str) -> HashMap<String, String> {
    let snapshotter = Snapshotter::new(std::sync::Arc::new(LocalFileSystemAdapter::new()));
    snapshotter
        .snapshot(&harness.path(relative_root))
        .await
        .unwrap()
        .iter()
        .filter_map(Entry::as_file)
        .map(|f| {
            let path = if f.path.is_empty() {
                f.name.clone()
            } else {
                format!("{}/{}", f.dir_path(), f.name)
            };
            (path, f.hash.to_string())
        })
        .collect()
}

#[tokio::test]
async fn end_to_end_upload_and_download() {
    let harness = Harness::new();
    harness.write_local("Personal/A.txt", b"alpha content", now_secs() - 10);
    let hash_b = harness
        .remote
        .put_file(OWN_DIR, "B.txt", b"bravo content", now_secs() - 10);

    let report = harness
        .engine
        .run_cycle(false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.uploaded, 1);
    assert!(report.failures.is_empty());
    assert_eq!(harness.remote.downloads(), vec![hash_b.clone()]);
    assert_eq!(
        harness.remote.uploads(),
        vec![(OWN_DIR.to_string(), "A.txt".to_string())]
    );

    let local = local_hashes(&harness, "Personal").await;
    assert_eq!(local.len(), 2);
    assert_eq!(local["B.txt"], hash_b);
    assert_eq!(
        harness.remote.file(OWN_DIR, "A.txt").unwrap().hash,
        local["A.txt"]
    );
    assert_eq!(harness.remote.paths(OWN_DIR), vec!["A.txt", "B.txt"]);
}

#[tokio::test]
async fn second_cycle_over_identical_state_is_idle() {
    let harness = Harness::new();
    harness.write_local("Personal/docs/A.txt", b"alpha", now_secs() - 10);
    harness
        .remote
        .put_file(OWN_DIR, "docs/B.txt", b"bravo", now_secs() - 10);

    let cancel = CancellationToken::new();
    harness.engine.run_cycle(false, &cancel).await.unwrap();
    harness.remote.reset_calls();

    let report = harness.engine.run_cycle(false, &cancel).await.unwrap();

    assert_eq!(report.actions(), 0);
    assert!(harness.remote.uploads().is_empty());
    assert!(harness.remote.downloads().is_empty());
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn deletion_pass_respects_grace_window() {
    let harness = Harness::new();
    let young = harness.write_local("Personal/young.txt", b"new", now_secs() - 30);
    let old = harness.write_local("Personal/old.txt", b"stale", now_secs() - 90);

    let report = harness
        .engine
        .run_cycle(true, &CancellationToken::new())
        .await
        .unwrap();

    assert!(young.exists());
    assert!(!old.exists());
    assert_eq!(report.deleted_local, 1);
    assert_eq!(report.within_grace, 1);
    assert!(harness.remote.uploads().is_empty());
}

#[tokio::test]
async fn deletion_pass_still_downloads_remote_only() {
    let harness = Harness::new();
    harness
        .remote
        .put_file(OWN_DIR, "fresh.txt", b"from cloud", now_secs() - 5);

    let report = harness
        .engine
        .run_cycle(true, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(
        harness.read_local("Personal/fresh.txt").as_deref(),
        Some(&b"from cloud"[..])
    );
}

#[tokio::test]
async fn newer_local_copy_is_uploaded() {
    let harness = Harness::new();
    harness
        .remote
        .put_file(OWN_DIR, "doc.txt", b"cloud version", now_secs() - 1000);
    harness.write_local("Personal/doc.txt", b"local version", now_secs() - 10);

    let report = harness
        .engine
        .run_cycle(false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.uploaded, 1);
    assert_eq!(report.downloaded, 0);
    assert!(harness.remote.downloads().is_empty());
    assert_eq!(
        harness.remote.file(OWN_DIR, "doc.txt").unwrap().hash,
        sha1_hex(b"local version")
    );
}

#[tokio::test]
async fn newer_remote_copy_is_downloaded() {
    let harness = Harness::new();
    harness
        .remote
        .put_file(OWN_DIR, "doc.txt", b"cloud version", now_secs() - 10);
    harness.write_local("Personal/doc.txt", b"local version", now_secs() - 1000);

    let report = harness
        .engine
        .run_cycle(false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.uploaded, 0);
    assert_eq!(
        harness.read_local("Personal/doc.txt").as_deref(),
        Some(&b"cloud version"[..])
    );
}

#[tokio::test]
async fn equal_timestamps_with_divergent_content_transfer_nothing() {
    let harness = Harness::new();
    let stamp = now_secs() - 500;
    harness
        .remote
        .put_file(OWN_DIR, "doc.txt", b"cloud version", stamp);
    harness.write_local("Personal/doc.txt", b"local version", stamp);

    let report = harness
        .engine
        .run_cycle(false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.actions(), 0);
    assert_eq!(report.ambiguous, 1);
    assert!(report.failures.is_empty());
    assert_eq!(
        harness.read_local("Personal/doc.txt").as_deref(),
        Some(&b"local version"[..])
    );
}

#[tokio::test]
async fn deletion_pass_defers_divergent_common_files() {
    let harness = Harness::new();
    harness
        .remote
        .put_file(OWN_DIR, "doc.txt", b"cloud version", now_secs() - 1000);
    harness.write_local("Personal/doc.txt", b"local version", now_secs() - 10);

    let report = harness
        .engine
        .run_cycle(true, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.deferred, 1);
    assert_eq!(report.actions(), 0);
    assert!(harness.remote.uploads().is_empty());
}

#[tokio::test]
async fn lock_files_are_never_uploaded_nor_deleted() {
    let harness = Harness::new();
    let lock = harness.write_local("Personal/~$report.docx", b"lock", now_secs() - 3600);

    let cancel = CancellationToken::new();
    let report = harness.engine.run_cycle(false, &cancel).await.unwrap();
    assert!(harness.remote.uploads().is_empty());
    assert!(report.failures.is_empty());
    assert_eq!(report.lock_files_skipped, 1);

    let report = harness.engine.run_cycle(true, &cancel).await.unwrap();
    assert!(lock.exists());
    assert_eq!(report.deleted_local, 0);
}

#[tokio::test]
async fn project_and_shared_roots_are_reconciled() {
    let harness = Harness::new();
    harness.write_local("Projects/Alpha/x/y.txt", b"project file", now_secs() - 10);
    harness.write_local("Projects/Ghost/orphan.txt", b"no such project", now_secs() - 10);
    harness
        .remote
        .put_file(SHARED_DIR, "notes/n.md", b"# shared", now_secs() - 10);

    let report = harness
        .engine
        .run_cycle(false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.roots, 3);
    assert_eq!(
        harness.remote.uploads(),
        vec![(ALPHA_DIR.to_string(), "x/y.txt".to_string())]
    );
    assert_eq!(
        harness.read_local("Shared/From Bob/notes/n.md").as_deref(),
        Some(&b"# shared"[..])
    );
}

#[tokio::test]
async fn empty_remote_folders_materialize_locally() {
    let harness = Harness::new();

    harness
        .engine
        .run_cycle(false, &CancellationToken::new())
        .await
        .unwrap();

    assert!(harness.path("Personal").is_dir());
    assert!(harness.path("Projects/Alpha").is_dir());
    assert!(harness.path("Shared/From Bob").is_dir());
}

#[tokio::test]
async fn failed_download_does_not_stop_the_root() {
    let harness = Harness::new();
    harness.remote.put_dangling_file(OWN_DIR, "broken.bin", now_secs() - 10);
    harness
        .remote
        .put_file(OWN_DIR, "ok.txt", b"fine", now_secs() - 10);
    harness.write_local("Personal/mine.txt", b"mine", now_secs() - 10);

    let report = harness
        .engine
        .run_cycle(false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].contains("broken.bin"));
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.uploaded, 1);
    assert!(harness.path("Personal/ok.txt").exists());
    assert!(!harness.path("Personal/broken.bin").exists());
}

#[tokio::test]
async fn failed_tree_fetch_aborts_the_cycle() {
    let harness = Harness::new();
    harness.write_local("Personal/A.txt", b"alpha", now_secs() - 10);
    harness.remote.set_fetch_failure(true);

    let result = harness
        .engine
        .run_cycle(false, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(SyncError::TreeUnavailable(_))));
    assert!(harness.remote.uploads().is_empty());
    assert!(harness.engine.current_tree().await.is_none());
}

#[tokio::test]
async fn failed_first_fetch_still_creates_the_sync_root() {
    let harness = Harness::with_missing_root();
    harness.remote.set_fetch_failure(true);
    assert!(!harness.root.exists());

    let result = harness
        .engine
        .run_cycle(false, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(SyncError::TreeUnavailable(_))));
    assert!(harness.path("Personal").is_dir());
    assert!(harness.path("Projects").is_dir());
    assert!(harness.path("Shared").is_dir());
}

#[tokio::test]
async fn cancelled_cycle_stops_between_actions() {
    let harness = Harness::new();
    harness.write_local("Personal/A.txt", b"alpha", now_secs() - 10);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = harness.engine.run_cycle(false, &cancel).await.unwrap();

    assert!(report.interrupted);
    assert_eq!(report.actions(), 0);
}

#[tokio::test]
async fn zero_grace_window_deletes_immediately() {
    let harness = Harness::with_grace(Duration::ZERO);
    let path = harness.write_local("Personal/just-now.txt", b"x", now_secs());

    harness
        .engine
        .run_cycle(true, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!path.exists());
}
