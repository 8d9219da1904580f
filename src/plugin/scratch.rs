//! Run-scoped scratch storage for plugins.
//!
//! Plugins that precompute large per-component data (calculated profiles,
//! coordinate caches) can park it in a [`ScratchStore`] instead of holding
//! it in memory. The store lives in a directory that is removed when the
//! store that created it is dropped.
//!
//! To hand the data to a worker in another process, [`share`](ScratchStore::share)
//! the owning store into a serializable [`ScratchStoreState`] and
//! [`attach`](ScratchStore::attach) on the other side. Attached stores are
//! read-only views: they never write and never delete, so any number of
//! them may come and go while the owner is alive. Attaching fails if the
//! directory has gone away.

use crate::error::PluginError;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const MARKER_FILE: &str = ".scratch";

/// A directory-backed key → bytes store.
#[derive(Debug)]
pub struct ScratchStore {
    root: PathBuf,
    handle: File,
    owner: bool,
    counter: AtomicU64,
}

/// Handle-free representation of a [`ScratchStore`]. Carries no ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScratchStoreState {
    pub root: PathBuf,
}

impl ScratchStore {
    /// Creates a fresh store under `parent`, or the system temporary
    /// directory when `None`.
    pub fn create(parent: Option<&Path>) -> Result<Self, PluginError> {
        let parent = parent.map_or_else(std::env::temp_dir, Path::to_path_buf);
        let root = parent.join(format!("ensemble-fit-{:016x}", rand::random::<u64>()));

        fs::create_dir_all(&root).map_err(|source| PluginError::Storage {
            path: root.clone(),
            source,
        })?;
        let handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(root.join(MARKER_FILE))
            .map_err(|source| PluginError::Storage {
                path: root.clone(),
                source,
            })?;

        Ok(Self {
            root,
            handle,
            owner: true,
            counter: AtomicU64::new(0),
        })
    }

    /// Opens a read-only view of a shared store.
    pub fn attach(state: ScratchStoreState) -> Result<Self, PluginError> {
        let handle = File::open(state.root.join(MARKER_FILE))
            .map_err(|source| PluginError::Storage {
                path: state.root.clone(),
                source,
            })?;

        Ok(Self {
            root: state.root,
            handle,
            owner: false,
            counter: AtomicU64::new(0),
        })
    }

    /// State from which workers can [`attach`](Self::attach). The store
    /// keeps ownership of the directory.
    pub fn share(&self) -> ScratchStoreState {
        ScratchStoreState {
            root: self.root.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `true` for the store that created the directory.
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Stores `data` under `key`, generating a unique key when `None`.
    /// Returns the key used. Attached stores refuse with
    /// [`PluginError::ReadOnly`].
    pub fn put(&self, data: &[u8], key: Option<&str>) -> Result<String, PluginError> {
        if !self.owner {
            return Err(PluginError::ReadOnly(self.root.clone()));
        }
        let key = match key {
            Some(k) => {
                validate_key(k)?;
                k.to_string()
            }
            None => format!(
                "{:08x}-{:016x}",
                self.counter.fetch_add(1, Ordering::Relaxed),
                rand::random::<u64>()
            ),
        };

        let path = self.root.join(&key);
        fs::write(&path, data).map_err(|source| PluginError::Storage { path, source })?;
        Ok(key)
    }

    /// Fetches the bytes stored under `key`.
    pub fn get(&self, key: &str) -> Result<Vec<u8>, PluginError> {
        validate_key(key)?;
        let path = self.root.join(key);
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => PluginError::MissingKey(key.to_string()),
            _ => PluginError::Storage { path, source },
        })
    }

    /// Confirms the store's handle still refers to a live file.
    pub fn is_live(&self) -> bool {
        self.handle.metadata().is_ok() && self.root.join(MARKER_FILE).exists()
    }
}

impl Drop for ScratchStore {
    fn drop(&mut self) {
        if self.owner {
            let _ = fs::remove_dir_all(&self.root);
        }
    }
}

fn validate_key(key: &str) -> Result<(), PluginError> {
    let valid = !key.is_empty()
        && key != MARKER_FILE
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(PluginError::msg(format!("invalid scratch key \"{key}\"")))
    }
}
