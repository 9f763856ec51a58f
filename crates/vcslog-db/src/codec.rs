//! Key encoding and id enumeration shared by the sled trees
//!
//! Integer keys are stored big-endian so that sled's lexicographic order
//! matches numeric order and composite keys can be prefix-scanned.

use anyhow::{Context, Result};
use vcslog_core::CommitIndex;

pub(crate) fn index_key(index: CommitIndex) -> [u8; 4] {
    index.to_be_bytes()
}

pub(crate) fn decode_u32(bytes: &[u8]) -> Result<u32> {
    let array: [u8; 4] = bytes.try_into().context("Malformed 4-byte value")?;
    Ok(u32::from_be_bytes(array))
}

/// `prefix ++ index`, used for inverted indices scanned by prefix
pub(crate) fn composite_key(prefix: &[u8], index: CommitIndex) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 4);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&index_key(index));
    key
}

/// Commit index stored in the last four bytes of a composite key
pub(crate) fn suffix_index(key: &[u8]) -> Result<CommitIndex> {
    let start = key.len().checked_sub(4).context("Composite key too short")?;
    decode_u32(&key[start..])
}

pub(crate) fn flush_tree(tree: &sled::Tree) -> Result<()> {
    tree.flush().context("Failed to flush tree")?;
    Ok(())
}

/// Persistent bidirectional mapping between byte keys and dense `u32` ids.
///
/// Ids are handed out from a counter kept in `counters` under `name`, so
/// they stay dense across restarts.
pub(crate) struct Enumerator {
    name: &'static str,
    forward: sled::Tree,
    backward: sled::Tree,
    counters: sled::Tree,
}

impl Enumerator {
    pub(crate) fn open(db: &sled::Db, name: &'static str) -> Result<Self> {
        let forward = db
            .open_tree(format!("{}_ids", name))
            .with_context(|| format!("Failed to open {} id tree", name))?;
        let backward = db
            .open_tree(format!("{}_by_id", name))
            .with_context(|| format!("Failed to open {} reverse tree", name))?;
        let counters = db.open_tree("counters").context("Failed to open counters tree")?;
        Ok(Self {
            name,
            forward,
            backward,
            counters,
        })
    }

    /// Returns the id of `key`, assigning the next free one if it has none
    pub(crate) fn enumerate(&self, key: &[u8]) -> Result<u32> {
        if let Some(id) = self.try_enumerate(key)? {
            return Ok(id);
        }

        let next = self
            .counters
            .update_and_fetch(self.name, |old| {
                let current = old
                    .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
                    .map(u32::from_be_bytes)
                    .unwrap_or(0);
                Some(current.wrapping_add(1).to_be_bytes().to_vec())
            })
            .with_context(|| format!("Failed to allocate {} id", self.name))?
            .context("Id counter vanished")?;
        let id = decode_u32(&next)?
            .checked_sub(1)
            .with_context(|| format!("{} id space exhausted", self.name))?;

        let swap = self
            .forward
            .compare_and_swap(key, None as Option<&[u8]>, Some(&id.to_be_bytes()[..]))
            .with_context(|| format!("Failed to store {} id", self.name))?;
        match swap {
            Ok(()) => {
                self.backward
                    .insert(id.to_be_bytes(), key)
                    .with_context(|| format!("Failed to store {} reverse mapping", self.name))?;
                Ok(id)
            }
            // Lost a race: another writer enumerated the same key first
            Err(cas) => decode_u32(&cas.current.context("Concurrent enumeration left no id")?),
        }
    }

    pub(crate) fn try_enumerate(&self, key: &[u8]) -> Result<Option<u32>> {
        match self.forward.get(key)? {
            Some(bytes) => Ok(Some(decode_u32(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn key_of(&self, id: u32) -> Result<Option<sled::IVec>> {
        self.backward
            .get(id.to_be_bytes())
            .with_context(|| format!("Failed to read {} #{}", self.name, id))
    }

    /// Every enumerated key, in id order
    pub(crate) fn keys(&self) -> impl Iterator<Item = Result<sled::IVec>> + '_ {
        self.backward
            .iter()
            .values()
            .map(|value| value.with_context(|| format!("Failed to read {} key", self.name)))
    }

    pub(crate) fn len(&self) -> usize {
        self.forward.len()
    }

    pub(crate) fn flush(&self) -> Result<()> {
        flush_tree(&self.forward)?;
        flush_tree(&self.backward)?;
        flush_tree(&self.counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_composite_key_roundtrip_suffix() -> Result<()> {
        let key = composite_key(b"abc", 258);
        assert_eq!(&key[..3], b"abc");
        assert_eq!(suffix_index(&key)?, 258);
        assert!(suffix_index(b"ab").is_err());
        Ok(())
    }

    #[test]
    fn test_enumerator_is_dense_and_stable() -> Result<()> {
        let tmp = TempDir::new()?;
        {
            let db = sled::open(tmp.path())?;
            let users = Enumerator::open(&db, "users")?;
            assert_eq!(users.enumerate(b"alice")?, 0);
            assert_eq!(users.enumerate(b"bob")?, 1);
            assert_eq!(users.enumerate(b"alice")?, 0);
            assert_eq!(users.key_of(1)?.as_deref(), Some(&b"bob"[..]));
            users.flush()?;
        }

        let db = sled::open(tmp.path())?;
        let users = Enumerator::open(&db, "users")?;
        assert_eq!(users.try_enumerate(b"bob")?, Some(1));
        assert_eq!(users.enumerate(b"carol")?, 2);
        assert_eq!(users.len(), 3);
        Ok(())
    }
}
