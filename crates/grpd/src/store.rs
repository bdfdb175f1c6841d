//! Per-window property store for serialized caches
//!
//! File layout: a single JSON document
//! ```text
//! { "version": 1, "session": ":0", "windows": { "<window id>": "<cache blob>", ... } }
//! ```
//! written to `<path>.tmp` and renamed over `<path>` on flush.
//!
//! Window ids are only meaningful within one display server session, and the
//! server hands out recycled ids after a restart. A store opened for a session
//! other than the one recorded in the file starts empty.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::event::WindowId;

/// Current store file version
const STORE_VERSION: u32 = 1;

/// Key-value store holding one serialized cache per window
pub trait PropertyStore {
    /// Fetch the blob stored for `window`
    fn load(&self, window: WindowId) -> Result<Option<String>>;

    /// Store `blob` for `window`, replacing any previous value
    fn save(&self, window: WindowId, blob: &str) -> Result<()>;

    /// Drop whatever is stored for `window`
    fn forget(&self, window: WindowId) -> Result<()>;

    /// Make pending changes durable
    fn flush(&self) -> Result<()>;
}

/// Store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    windows: RwLock<BTreeMap<WindowId, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl PropertyStore for MemoryStore {
    fn load(&self, window: WindowId) -> Result<Option<String>> {
        Ok(self.windows.read().get(&window).cloned())
    }

    fn save(&self, window: WindowId, blob: &str) -> Result<()> {
        self.windows.write().insert(window, blob.to_string());
        Ok(())
    }

    fn forget(&self, window: WindowId) -> Result<()> {
        self.windows.write().remove(&window);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session: Option<String>,
    windows: BTreeMap<WindowId, String>,
}

/// JSON file-backed store
pub struct FileStore {
    path: PathBuf,
    session: Option<String>,
    windows: RwLock<BTreeMap<WindowId, String>>,
    dirty: RwLock<bool>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    ///
    /// # Arguments
    /// * `session` - Identity of the running display session. Caches recorded
    ///   under any other session are discarded, and the next flush rewrites the
    ///   file for this one. `None` takes the file as it is (inspection only).
    pub fn open<P: AsRef<Path>>(path: P, session: Option<&str>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = Self::read_file(&path)?;

        let mut dirty = false;
        let mut windows = file.windows;
        let session = match session {
            Some(current) => {
                if file.session.as_deref() != Some(current) && !windows.is_empty() {
                    info!(
                        "Store {:?} was written for session {:?}, not {:?}; discarding {} window caches",
                        path,
                        file.session.as_deref().unwrap_or("<none>"),
                        current,
                        windows.len()
                    );
                    windows.clear();
                    dirty = true;
                }
                Some(current.to_string())
            }
            None => file.session,
        };

        Ok(Self {
            path,
            session,
            windows: RwLock::new(windows),
            dirty: RwLock::new(dirty),
        })
    }

    fn read_file(path: &Path) -> Result<StoreFile> {
        if !path.exists() {
            info!("No store file at {:?}, starting empty", path);
            return Ok(StoreFile {
                version: STORE_VERSION,
                ..StoreFile::default()
            });
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read store file {:?}", path))?;
        let file: StoreFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse store file {:?}", path))?;

        if file.version != STORE_VERSION {
            bail!(
                "Unsupported store version {} in {:?} (expected {})",
                file.version,
                path,
                STORE_VERSION
            );
        }

        info!("Loaded {} window caches from {:?}", file.windows.len(), path);
        Ok(file)
    }

    /// Stored `(window, blob)` pairs in window order
    pub fn entries(&self) -> Vec<(WindowId, String)> {
        self.windows
            .read()
            .iter()
            .map(|(window, blob)| (*window, blob.clone()))
            .collect()
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Session the stored caches belong to
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }
}

impl PropertyStore for FileStore {
    fn load(&self, window: WindowId) -> Result<Option<String>> {
        Ok(self.windows.read().get(&window).cloned())
    }

    fn save(&self, window: WindowId, blob: &str) -> Result<()> {
        self.windows.write().insert(window, blob.to_string());
        *self.dirty.write() = true;
        Ok(())
    }

    fn forget(&self, window: WindowId) -> Result<()> {
        if self.windows.write().remove(&window).is_some() {
            *self.dirty.write() = true;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut dirty = self.dirty.write();
        if !*dirty {
            return Ok(());
        }

        let file = StoreFile {
            version: STORE_VERSION,
            session: self.session.clone(),
            windows: self.windows.read().clone(),
        };
        let content =
            serde_json::to_string_pretty(&file).context("Failed to serialize store")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory {:?}", parent))?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content).with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace store file {:?}", self.path))?;

        *dirty = false;
        debug!("Flushed {} window caches to {:?}", file.windows.len(), self.path);
        Ok(())
    }
}
