//! Tests for core data models

use vcslog_core::{ChangeKind, ChangedPath, CommitDetail, Root, VcsError, VcsUser};

fn detail(message: &str) -> CommitDetail {
    let user = VcsUser::new("Ada", "ada@example.com");
    CommitDetail {
        hash: "f00dfeed".to_string(),
        root: Root::new("/work/engine"),
        parents: vec![],
        author: user.clone(),
        committer: user,
        author_time: 1_700_000_000,
        commit_time: 1_700_000_100,
        full_message: message.to_string(),
        changes: vec![ChangedPath { path_id: 1, kind: ChangeKind::Added }],
    }
}

#[test]
fn test_subject_is_first_line() {
    assert_eq!(detail("Fix flush order\n\nLonger body").subject(), "Fix flush order");
    assert_eq!(detail("").subject(), "");
}

#[test]
fn test_detail_id_carries_root() {
    let d = detail("x");
    let id = d.id();
    assert_eq!(id.hash, "f00dfeed");
    assert_eq!(id.root, Root::new("/work/engine"));
}

#[test]
fn test_user_display() {
    assert_eq!(VcsUser::new("Ada", "ada@example.com").to_string(), "Ada <ada@example.com>");
    assert_eq!(VcsUser::new("Ada", "").to_string(), "Ada");
}

#[test]
fn test_backend_error_mentions_root() {
    let err = VcsError::backend(&Root::new("/work/engine"), "object not found");
    assert!(!err.is_cancelled());
    assert!(err.to_string().contains("/work/engine"));
    assert!(VcsError::Cancelled.is_cancelled());
}
