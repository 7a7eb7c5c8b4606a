//! Durable named store of integer preferences
//!
//! The store is a JSON object persisted at `<dir>/<name>.preferences.json`.
//! All writes go through [`PreferencesStore::update_data`], which serializes
//! read-modify-write cycles behind one async mutex and publishes every
//! committed snapshot on a watch channel.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::error::{LabError, Result};

/// Snapshot of every key in a store
pub type Preferences = BTreeMap<String, i64>;

/// One process owns the file. After the first load the in-memory snapshot is
/// authoritative: edits made to the file by anyone else are not read back and
/// are overwritten by the next commit.
#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    /// `None` until the file has been read once
    state: Mutex<Option<Preferences>>,
    changes: watch::Sender<Preferences>,
}

impl PreferencesStore {
    /// Open the store `name` inside `dir`. Nothing is read until first access.
    pub fn open(dir: &Path, name: &str) -> Self {
        let (changes, _) = watch::channel(Preferences::new());
        Self {
            path: dir.join(format!("{}.preferences.json", name)),
            state: Mutex::new(None),
            changes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current snapshot of the store
    pub async fn data(&self) -> Result<Preferences> {
        let mut state = self.state.lock().await;
        Ok(self.loaded(&mut state).await?.clone())
    }

    /// Apply `transform` to a copy of the current snapshot and persist it.
    ///
    /// The new snapshot becomes visible only after it reached disk; if either
    /// `transform` or the write fails the stored value is left untouched.
    pub async fn update_data<F>(&self, transform: F) -> Result<Preferences>
    where
        F: FnOnce(&mut Preferences) -> Result<()>,
    {
        let mut state = self.state.lock().await;
        let mut next = self.loaded(&mut state).await?.clone();
        transform(&mut next)?;

        self.persist(&next).await?;
        *state = Some(next.clone());
        self.changes.send_replace(next.clone());
        debug!("Committed {} preferences to {:?}", next.len(), self.path);
        Ok(next)
    }

    /// Receiver primed with the current snapshot, notified on every commit
    pub async fn subscribe(&self) -> Result<watch::Receiver<Preferences>> {
        let mut state = self.state.lock().await;
        self.loaded(&mut state).await?;
        let mut rx = self.changes.subscribe();
        rx.mark_unchanged();
        Ok(rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    async fn loaded<'a>(&self, state: &'a mut Option<Preferences>) -> Result<&'a Preferences> {
        if state.is_none() {
            let prefs = self.read_file().await?;
            self.changes.send_replace(prefs.clone());
            *state = Some(prefs);
        }
        Ok(state.get_or_insert_with(Preferences::new))
    }

    async fn read_file(&self) -> Result<Preferences> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let prefs: Preferences = serde_json::from_slice(&bytes).map_err(|e| {
                    LabError::StorageFailure(format!("corrupted store {:?}: {}", self.path, e))
                })?;
                info!("Loaded {} preferences from {:?}", prefs.len(), self.path);
                Ok(prefs)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No preferences at {:?} yet (first run)", self.path);
                Ok(Preferences::new())
            }
            Err(e) => Err(LabError::StorageFailure(format!(
                "failed to read {:?}: {}",
                self.path, e
            ))),
        }
    }

    async fn persist(&self, prefs: &Preferences) -> Result<()> {
        let write_err =
            |e: std::io::Error| LabError::StorageFailure(format!("failed to write {:?}: {}", self.path, e));

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let data = serde_json::to_vec_pretty(prefs)
            .map_err(|e| LabError::StorageFailure(format!("failed to encode preferences: {}", e)))?;

        // Write next to the target, then rename over it so readers never see a torn file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write_err)?;
        Ok(())
    }
}
