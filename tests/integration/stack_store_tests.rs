//! Stack store: compose-file storage, status grouping, and orchestration.

use std::path::Path;

use deckhand::config::StackConfig;
use deckhand::stacks::StackStore;
use deckhand::AppError;

use super::test_helpers::{labeled_summary, FakeEngine};

fn store_at(dir: &Path, compose_command: &[&str]) -> StackStore {
    std::fs::create_dir_all(dir).expect("stacks dir");
    StackStore::new(&StackConfig {
        dir: dir.to_path_buf(),
        compose_command: compose_command.iter().map(ToString::to_string).collect(),
    })
}

#[tokio::test]
async fn save_list_delete_roundtrip() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = store_at(&tmp.path().join("stacks"), &["true"]);

    store
        .save("web", "services:\n  app:\n    image: nginx\n")
        .await
        .expect("save must succeed");
    store.save("db", "services: {}\n").await.expect("save");

    assert_eq!(store.list().await.expect("list"), vec!["db", "web"]);

    store.delete("db").await.expect("delete");
    assert_eq!(store.list().await.expect("list"), vec!["web"]);

    let missing = store.delete("db").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn stack_names_with_separators_or_traversal_are_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = store_at(&tmp.path().join("stacks"), &["true"]);

    for name in ["../escape", "a/b", "", ".."] {
        let result = store.save(name, "services: {}\n").await;
        assert!(
            matches!(result, Err(AppError::Validation(_))),
            "name {name:?} must be rejected, got: {result:?}"
        );
    }
}

#[tokio::test]
async fn status_groups_containers_by_project_label() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = store_at(&tmp.path().join("stacks"), &["true"]);
    store.save("web", "services: {}\n").await.expect("save");

    let engine = FakeEngine::default();
    engine.set_summaries(vec![
        labeled_summary("web-app-1", Some("web")),
        labeled_summary("web-db-1", Some("web")),
        labeled_summary("loner", None),
    ]);

    let stacks = store.status(&engine).await.expect("status");
    assert_eq!(stacks.len(), 1);
    assert_eq!(stacks[0].name, "web");
    assert_eq!(stacks[0].status, "Running (2/2)");
    assert_eq!(stacks[0].containers.len(), 2);
}

#[tokio::test]
async fn after_down_the_entry_persists_with_zero_running_containers() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = store_at(&tmp.path().join("stacks"), &["true"]);
    store.save("web", "services: {}\n").await.expect("save");

    let engine = FakeEngine::default();
    engine.set_summaries(vec![labeled_summary("web-app-1", Some("web"))]);
    let stacks = store.status(&engine).await.expect("status");
    assert_eq!(stacks[0].status, "Running (1/1)");

    // Containers gone (stack taken down) — the directory entry remains
    // until explicitly deleted.
    engine.set_summaries(Vec::new());
    let stacks = store.status(&engine).await.expect("status");
    assert_eq!(stacks.len(), 1);
    assert_eq!(stacks[0].name, "web");
    assert_eq!(stacks[0].status, "Not Running");
    assert!(stacks[0].containers.is_empty());

    store.delete("web").await.expect("delete");
    let stacks = store.status(&engine).await.expect("status");
    assert!(stacks.is_empty());
}

#[tokio::test]
async fn up_succeeds_when_the_compose_command_exits_zero() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = store_at(&tmp.path().join("stacks"), &["true"]);
    store.save("web", "services: {}\n").await.expect("save");

    store.up("web").await.expect("up must succeed");
    store.down("web").await.expect("down must succeed");
}

#[tokio::test]
async fn up_surfaces_a_failing_compose_command() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = store_at(&tmp.path().join("stacks"), &["false"]);
    store.save("web", "services: {}\n").await.expect("save");

    let result = store.up("web").await;
    assert!(
        matches!(result, Err(AppError::Upstream(_))),
        "non-zero compose exit must surface, got: {result:?}"
    );
}

#[tokio::test]
async fn operations_on_an_unknown_stack_are_not_found() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = store_at(&tmp.path().join("stacks"), &["true"]);

    assert!(matches!(store.up("ghost").await, Err(AppError::NotFound(_))));
    assert!(matches!(
        store.down("ghost").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        store.follow_logs("ghost"),
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn follow_logs_streams_the_subprocess_output() {
    use futures_util::StreamExt;

    let tmp = tempfile::tempdir().expect("tempdir");
    // `echo logs -f` prints its arguments and exits: a one-shot stand-in
    // for the follow subprocess.
    let store = store_at(&tmp.path().join("stacks"), &["echo"]);
    store.save("web", "services: {}\n").await.expect("save");

    let (mut chunks, handle) = store.follow_logs("web").expect("follow must launch");

    let mut collected = Vec::new();
    while let Some(chunk) = chunks.next().await {
        collected.extend_from_slice(&chunk.expect("chunk"));
    }
    assert_eq!(String::from_utf8_lossy(&collected).trim(), "logs -f");

    handle.terminate().await;
    assert!(handle.has_exited().await);
}
