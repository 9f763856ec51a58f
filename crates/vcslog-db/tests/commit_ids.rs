//! Tests for the commit id storage

use anyhow::Result;
use tempfile::TempDir;
use vcslog_core::{CommitIdResolver, Root};
use vcslog_db::{CommitIdStorage, StorageId, COMMIT_ID_KIND};

const SHA1: &str = "abc1234567890abcdef01234567890abcdef0123";
const SHA2: &str = "def1234567890abcdef01234567890abcdef0456";

#[test]
fn test_indices_are_dense_and_per_root() -> Result<()> {
    let tmp = TempDir::new()?;
    let storage = CommitIdStorage::open(&StorageId::new(tmp.path(), COMMIT_ID_KIND, "p", 1))?;
    let first = Root::new("/a");
    let second = Root::new("/b");

    assert_eq!(storage.commit_index(SHA1, &first)?, 0);
    assert_eq!(storage.commit_index(SHA2, &first)?, 1);
    // Same hash in another root is a different commit
    assert_eq!(storage.commit_index(SHA1, &second)?, 2);
    assert_eq!(storage.commit_index(SHA1, &first)?, 0);

    let id = storage.commit_id(2)?.expect("index 2 was assigned");
    assert_eq!(id.hash, SHA1);
    assert_eq!(id.root, second);
    assert_eq!(storage.commit_id(99)?, None);
    Ok(())
}

#[test]
fn test_indices_survive_reopen() -> Result<()> {
    let tmp = TempDir::new()?;
    let id = StorageId::new(tmp.path(), COMMIT_ID_KIND, "p", 1);
    let root = Root::new("/a");
    {
        let storage = CommitIdStorage::open(&id)?;
        storage.commit_index(SHA1, &root)?;
        storage.flush()?;
    }

    let storage = CommitIdStorage::open(&id)?;
    assert_eq!(storage.find_index(SHA1, &root)?, Some(0));
    assert_eq!(storage.find_index(SHA2, &root)?, None);
    assert_eq!(storage.commit_index(SHA2, &root)?, 1);
    assert_eq!(storage.len(), 2);
    Ok(())
}
