//! Versioned on-disk layout of a storage

use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use vcslog_core::Root;

/// Identifies one versioned storage directory.
///
/// Layout: `<base_dir>/<kind>/<log_id>.<version>/`. Bumping `version` makes
/// every directory of an older version stale; stale directories are removed
/// the next time the storage is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageId {
    base_dir: PathBuf,
    kind: String,
    log_id: String,
    version: u32,
}

impl StorageId {
    pub fn new<P: AsRef<Path>>(base_dir: P, kind: &str, log_id: &str, version: u32) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            kind: kind.to_string(),
            log_id: log_id.to_string(),
            version,
        }
    }

    /// Computes a stable id for a project and its set of roots.
    ///
    /// The same roots in any order yield the same id.
    pub fn calc_log_id(project_name: &str, roots: &[Root]) -> String {
        let mut paths: Vec<String> = roots.iter().map(|r| r.path().display().to_string()).collect();
        paths.sort();

        let mut hasher = Sha256::new();
        for path in &paths {
            hasher.update(path.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();

        let name: String = project_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}.{}", name, HEXLOWER.encode(&digest[..8]))
    }

    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Directory holding every version of every storage of this kind
    pub fn subdir(&self) -> PathBuf {
        self.base_dir.join(&self.kind)
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.subdir().join(format!("{}.{}", self.log_id, self.version))
    }

    pub fn exists(&self) -> bool {
        self.storage_dir().exists()
    }

    /// Removes every version of this storage, current one included.
    ///
    /// Returns `false` if anything could not be deleted.
    pub fn cleanup_all_storage_files(&self) -> bool {
        self.remove_matching(|_| true).is_ok()
    }

    /// Removes directories left behind by other versions of this storage
    pub fn cleanup_stale_versions(&self) -> io::Result<usize> {
        let current = format!("{}.{}", self.log_id, self.version);
        self.remove_matching(|name| name != current)
    }

    fn remove_matching<F: Fn(&str) -> bool>(&self, filter: F) -> io::Result<usize> {
        let subdir = self.subdir();
        let entries = match fs::read_dir(&subdir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let prefix = format!("{}.", self.log_id);
        let mut removed = 0;
        let mut first_error = None;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(version) = name.strip_prefix(&prefix) else { continue };
            if version.parse::<u32>().is_err() || !filter(&name) {
                continue;
            }

            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => {
                    log::debug!("Removed storage files at {:?}", path);
                    removed += 1;
                }
                Err(e) => {
                    log::warn!("Could not remove storage files at {:?}: {}", path, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_id_ignores_root_order() {
        let a = Root::new("/src/a");
        let b = Root::new("/src/b");
        let first = StorageId::calc_log_id("my project", &[a.clone(), b.clone()]);
        let second = StorageId::calc_log_id("my project", &[b, a]);
        assert_eq!(first, second);
        assert!(first.starts_with("my_project."));
    }

    #[test]
    fn test_log_id_depends_on_roots() {
        let first = StorageId::calc_log_id("p", &[Root::new("/src/a")]);
        let second = StorageId::calc_log_id("p", &[Root::new("/src/b")]);
        assert_ne!(first, second);
    }

    #[test]
    fn test_cleanup_stale_versions_keeps_current() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let old = StorageId::new(tmp.path(), "index", "proj.0011", 3);
        let current = StorageId::new(tmp.path(), "index", "proj.0011", 4);
        let other = StorageId::new(tmp.path(), "index", "other.0022", 3);
        for id in [&old, &current, &other] {
            fs::create_dir_all(id.storage_dir())?;
        }

        assert_eq!(current.cleanup_stale_versions()?, 1);
        assert!(!old.exists());
        assert!(current.exists());
        assert!(other.exists());

        assert!(current.cleanup_all_storage_files());
        assert!(!current.exists());
        assert!(other.exists());
        Ok(())
    }

    #[test]
    fn test_cleanup_of_missing_subdir_succeeds() {
        let tmp = TempDir::new().unwrap();
        let id = StorageId::new(tmp.path().join("nowhere"), "index", "proj", 1);
        assert!(id.cleanup_all_storage_files());
    }
}
