//! CLI integration tests
//!
//! These tests run the compiled `vcslog` binary directly against throwaway
//! Git repositories.

use git2::{Repository, Signature, Time};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_vcslog"))
}

fn run(data_dir: &Path, args: &[&str]) -> Output {
    bin()
        .env("NO_COLOR", "1")
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .output()
        .expect("failed to run binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Repository with two commits touching `src/main.rs`
fn sample_repo(dir: &Path) -> anyhow::Result<()> {
    let repo = Repository::init(dir)?;
    let signature = Signature::new("Alice", "alice@example.com", &Time::new(1_700_000_000, 0))?;
    let mut parent = None;

    for (content, message) in [
        ("fn main() {}\n", "Add entry point"),
        ("fn main() { println!(\"hi\"); }\n", "Greet on startup"),
    ] {
        fs::create_dir_all(dir.join("src"))?;
        fs::write(dir.join("src/main.rs"), content)?;
        let mut index = repo.index()?;
        index.add_path(Path::new("src/main.rs"))?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let parents: Vec<git2::Commit<'_>> = parent.iter().map(|id| repo.find_commit(*id)).collect::<Result<_, _>>()?;
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        parent = Some(repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)?);
    }
    Ok(())
}

// ── help / version ────────────────────────────────────────────────────────────

#[test]
fn test_help_exits_zero() {
    let status = bin().arg("--help").status().expect("failed to run binary");
    assert!(status.success(), "--help should exit 0");
}

#[test]
fn test_version_flag() {
    let output = bin().arg("--version").output().expect("failed to run binary");
    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("vcslog"), "version output should contain binary name, got: {}", stdout);
}

// ── empty data directory ──────────────────────────────────────────────────────

#[test]
fn test_stats_on_empty_data_dir() {
    let tmp = TempDir::new().unwrap();
    let output = run(&tmp.path().join("data"), &["stats"]);
    assert!(output.status.success(), "stats on empty data dir should exit 0");
    assert!(stdout(&output).contains("Indexed commits"));
}

#[test]
fn test_resume_of_repository_that_is_not_paused() {
    let tmp = TempDir::new().unwrap();
    let output = run(&tmp.path().join("data"), &["resume", "/no/such/repo"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("not paused"));
}

#[test]
fn test_index_fails_outside_a_repository() {
    let tmp = TempDir::new().unwrap();
    let plain = tmp.path().join("plain");
    fs::create_dir_all(&plain).unwrap();

    let output = run(&tmp.path().join("data"), &["index", "--repo", plain.to_str().unwrap()]);
    assert!(!output.status.success(), "indexing a plain directory should fail");
}

// ── index then query ──────────────────────────────────────────────────────────

#[test]
fn test_index_then_search_and_history() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let repo = tmp.path().join("repo");
    sample_repo(&repo)?;
    let data = tmp.path().join("data");
    let repo_arg = repo.to_str().unwrap();

    let output = run(&data, &["--log-level", "warn", "index", "--repo", repo_arg]);
    assert!(output.status.success(), "index failed: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("2 commits indexed"));

    let output = run(&data, &["search", "greet", "--repo", repo_arg]);
    assert!(output.status.success());
    let found = stdout(&output);
    assert!(found.contains("Greet on startup"), "unexpected search output: {}", found);
    assert!(!found.contains("Add entry point"));

    let output = run(&data, &["search", "nothing-like-this", "--repo", repo_arg]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No commits found"));

    let output = run(&data, &["history", "src/main.rs", "--repo", repo_arg]);
    assert!(output.status.success());
    let history = stdout(&output);
    assert!(history.contains("Add entry point") && history.contains("Greet on startup"));

    let output = run(&data, &["stats", "--repo", repo_arg]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("indexed"));
    Ok(())
}
