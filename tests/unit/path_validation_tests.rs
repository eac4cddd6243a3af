//! Unit tests for file-area path validation.

use deckhand::files::validate_path;
use deckhand::AppError;

#[test]
fn relative_path_inside_root_resolves() {
    let tmp = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(tmp.path().join("sub")).expect("mkdir");

    let resolved = validate_path(tmp.path(), "sub/file.txt").expect("path inside root is valid");
    assert!(resolved.starts_with(tmp.path().canonicalize().expect("canonical root")));
}

#[test]
fn empty_path_resolves_to_the_root() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let resolved = validate_path(tmp.path(), "").expect("empty path is the root");
    assert_eq!(resolved, tmp.path().canonicalize().expect("canonical root"));
}

#[test]
fn traversal_escape_is_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let result = validate_path(tmp.path(), "../outside.txt");
    assert!(
        matches!(result, Err(AppError::PathViolation(_))),
        "`..` escape must be rejected, got: {result:?}"
    );
}

#[test]
fn interior_parent_segments_that_stay_inside_are_allowed() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let resolved = validate_path(tmp.path(), "a/../b.txt").expect("normalizes to b.txt");
    assert!(resolved.ends_with("b.txt"));
}

#[cfg(unix)]
#[test]
fn symlink_escaping_the_root_is_rejected() {
    let outside = tempfile::tempdir().expect("outside tempdir");
    let root = tempfile::tempdir().expect("root tempdir");
    std::os::unix::fs::symlink(outside.path(), root.path().join("link")).expect("symlink");

    let result = validate_path(root.path(), "link");
    assert!(
        matches!(result, Err(AppError::PathViolation(_))),
        "symlink escape must be rejected, got: {result:?}"
    );
}
