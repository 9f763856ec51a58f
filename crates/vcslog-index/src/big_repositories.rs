//! Registry of roots whose indexing was paused for taking too long

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use vcslog_core::{Listeners, Root, Subscription};

/// Change of a root's big flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BigRepositoryEvent {
    Added(Root),
    Removed(Root),
}

impl BigRepositoryEvent {
    pub fn root(&self) -> &Root {
        match self {
            Self::Added(root) | Self::Removed(root) => root,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedList {
    repositories: BTreeSet<Root>,
}

/// Shared set of big roots.
///
/// Optionally backed by a JSON file so the pause survives restarts; the file
/// is rewritten on every change. Listeners are notified after the change is
/// visible through [`is_big`](Self::is_big).
pub struct BigRepositoriesList {
    roots: Mutex<BTreeSet<Root>>,
    listeners: Listeners<BigRepositoryEvent>,
    file: Option<PathBuf>,
}

impl BigRepositoriesList {
    /// In-memory registry
    pub fn new() -> Self {
        Self {
            roots: Mutex::new(BTreeSet::new()),
            listeners: Listeners::new(),
            file: None,
        }
    }

    /// Registry persisted at `file`; a missing file means no big roots
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref().to_path_buf();
        let persisted = if file.exists() {
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read big repositories list {:?}", file))?;
            serde_json::from_str::<PersistedList>(&content)
                .with_context(|| format!("Failed to parse big repositories list {:?}", file))?
        } else {
            PersistedList::default()
        };

        Ok(Self {
            roots: Mutex::new(persisted.repositories),
            listeners: Listeners::new(),
            file: Some(file),
        })
    }

    pub fn is_big(&self, root: &Root) -> bool {
        self.lock().contains(root)
    }

    /// Returns false if `root` was already big
    pub fn add_repository(&self, root: Root) -> bool {
        let added = {
            let mut roots = self.lock();
            let added = roots.insert(root.clone());
            if added {
                self.save(&roots);
            }
            added
        };
        if added {
            log::info!("Marked {} as a big repository", root.name());
            self.listeners.notify(&BigRepositoryEvent::Added(root));
        }
        added
    }

    /// Returns false if `root` was not big
    pub fn remove_repository(&self, root: &Root) -> bool {
        let removed = {
            let mut roots = self.lock();
            let removed = roots.remove(root);
            if removed {
                self.save(&roots);
            }
            removed
        };
        if removed {
            log::info!("Removed {} from big repositories", root.name());
            self.listeners.notify(&BigRepositoryEvent::Removed(root.clone()));
        }
        removed
    }

    pub fn repositories(&self) -> Vec<Root> {
        self.lock().iter().cloned().collect()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&BigRepositoryEvent) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<Root>> {
        self.roots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self, roots: &BTreeSet<Root>) {
        let Some(file) = &self.file else { return };
        let persisted = PersistedList {
            repositories: roots.clone(),
        };
        let result = serde_json::to_string_pretty(&persisted)
            .context("Failed to serialize big repositories list")
            .and_then(|json| {
                if let Some(parent) = file.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(file, json).with_context(|| format!("Failed to write {:?}", file))
            });
        if let Err(e) = result {
            log::warn!("Could not save big repositories list: {:#}", e);
        }
    }
}

impl Default for BigRepositoriesList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_add_and_remove_notify_listeners() {
        let list = BigRepositoriesList::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let _subscription = list.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        let root = Root::new("/big");
        assert!(list.add_repository(root.clone()));
        assert!(!list.add_repository(root.clone()));
        assert!(list.is_big(&root));
        assert!(list.remove_repository(&root));
        assert!(!list.remove_repository(&root));

        assert_eq!(
            *events.lock().unwrap(),
            vec![BigRepositoryEvent::Added(root.clone()), BigRepositoryEvent::Removed(root)]
        );
    }

    #[test]
    fn test_persisted_list_survives_reload() -> Result<()> {
        let tmp = TempDir::new()?;
        let file = tmp.path().join("big_repositories.json");
        {
            let list = BigRepositoriesList::load(&file)?;
            assert!(list.repositories().is_empty());
            list.add_repository(Root::new("/a"));
            list.add_repository(Root::new("/b"));
            list.remove_repository(&Root::new("/a"));
        }

        let list = BigRepositoriesList::load(&file)?;
        assert_eq!(list.repositories(), vec![Root::new("/b")]);
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_an_error() -> Result<()> {
        let tmp = TempDir::new()?;
        let file = tmp.path().join("big_repositories.json");
        fs::write(&file, "not json")?;
        assert!(BigRepositoriesList::load(&file).is_err());
        Ok(())
    }
}
