//! Provisioning runner: discovery, validation, and streamed runs.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;

use deckhand::config::ProvisionConfig;
use deckhand::provision::PlaybookRunner;
use deckhand::AppError;

fn runner_at(root: &Path, command: &str) -> PlaybookRunner {
    let playbook_dir = root.join("playbooks");
    let inventory_dir = root.join("inventory");
    std::fs::create_dir_all(&playbook_dir).expect("playbook dir");
    std::fs::create_dir_all(&inventory_dir).expect("inventory dir");

    PlaybookRunner::new(&ProvisionConfig {
        playbook_dir,
        inventory_dir,
        allowed_extensions: vec![".yml".into(), ".yaml".into()],
        command: command.to_owned(),
    })
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("parent dir");
    }
    std::fs::write(path, contents).expect("write file");
}

#[test]
fn list_playbooks_returns_allowed_extensions_recursively() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let runner = runner_at(tmp.path(), "echo");

    write(tmp.path(), "playbooks/site.yml", "---\n");
    write(tmp.path(), "playbooks/deploy.yaml", "---\n");
    write(tmp.path(), "playbooks/notes.txt", "not a playbook\n");
    write(tmp.path(), "playbooks/roles/db.yml", "---\n");

    let playbooks = runner.list_playbooks().expect("list must succeed");
    assert_eq!(playbooks, vec!["deploy.yaml", "roles/db.yml", "site.yml"]);
}

#[tokio::test]
async fn run_streams_the_tool_output_line_by_line() {
    let tmp = tempfile::tempdir().expect("tempdir");
    // `echo -i <inventory> <playbook>` prints its arguments: the run
    // completes immediately with one line of output.
    let runner = runner_at(tmp.path(), "echo");
    write(tmp.path(), "inventory/hosts.ini", "[all]\n");
    write(tmp.path(), "playbooks/site.yml", "---\n");

    let output = runner
        .start_run("hosts.ini", "site.yml")
        .expect("run must launch");

    let lines: Vec<String> = output
        .map(|chunk| String::from_utf8_lossy(&chunk.expect("chunk")).into_owned())
        .collect()
        .await;

    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("-i "), "got: {}", lines[0]);
    assert!(lines[0].contains("hosts.ini"));
    assert!(lines[0].trim_end().ends_with("site.yml"));
}

#[tokio::test]
async fn traversal_in_the_playbook_name_is_rejected_before_launch() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let runner = runner_at(tmp.path(), "echo");
    write(tmp.path(), "inventory/hosts.ini", "[all]\n");

    let result = runner.start_run("hosts.ini", "../escape.yml");
    assert!(
        matches!(result, Err(AppError::PathViolation(_))),
        "traversal must be rejected, got: {:?}",
        result.err()
    );
}

#[tokio::test]
async fn missing_files_and_bad_extensions_fail_validation() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let runner = runner_at(tmp.path(), "echo");
    write(tmp.path(), "inventory/hosts.ini", "[all]\n");
    write(tmp.path(), "playbooks/notes.txt", "not a playbook\n");

    let missing = runner.start_run("hosts.ini", "ghost.yml");
    assert!(matches!(missing, Err(AppError::Validation(_))));

    let bad_ext = runner.start_run("hosts.ini", "notes.txt");
    assert!(matches!(bad_ext, Err(AppError::Validation(_))));

    let empty = runner.start_run("", "site.yml");
    assert!(matches!(empty, Err(AppError::Validation(_))));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn dropping_the_stream_kills_the_running_child() {
    let tmp = tempfile::tempdir().expect("tempdir");
    // `sh -i <inventory> <playbook>` executes the inventory file as a
    // script; a long sleep stands in for a long provisioning run.
    let runner = runner_at(tmp.path(), "sh");
    write(tmp.path(), "inventory/long.yml", "sleep 30\n");
    write(tmp.path(), "playbooks/site.yml", "---\n");

    let output = runner
        .start_run("long.yml", "site.yml")
        .expect("run must launch");
    let pid = output.handle().pid().await.expect("child pid");

    // The response stream owns the child: dropping it must kill the run.
    drop(output);

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        if process_dead(pid) {
            break;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "child {pid} must die after the stream is dropped"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// A process counts as dead when its /proc entry is gone or it has become a
/// zombie awaiting reap.
#[cfg(target_os = "linux")]
fn process_dead(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Err(_) => true,
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .and_then(|rest| rest.split_whitespace().next())
            .is_some_and(|state| state == "Z" || state == "X"),
    }
}
