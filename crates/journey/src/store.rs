//! Local key-value storage for the persisted step order and the mirrored
//! run state. `FileStore` stands in for browser local storage; `MemoryStore`
//! backs tests and throwaway sessions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use funnel_core::{AnswerMap, FunnelError, FunnelResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const ORDER_KEY: &str = "quiz_order";
pub const ANSWERS_KEY: &str = "quizAnswers";
pub const CURRENT_STEP_KEY: &str = "currentStep";

/// String-valued key-value storage. Access is simple read-modify-write with
/// no cross-process locking.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> FunnelResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> FunnelResult<()>;
    fn remove(&self, key: &str) -> FunnelResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> FunnelResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> FunnelResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> FunnelResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// A JSON object file on disk. Every write rewrites the whole file through a
/// temporary sibling and a rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> FunnelResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                FunnelError::Store(format!("{} is not a JSON object: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> FunnelResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> FunnelResult<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> FunnelResult<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> FunnelResult<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// Reads the persisted custom order. A missing, unreadable or corrupt value
/// yields `None`, which means catalog order.
pub fn load_order(store: &dyn LocalStore) -> Option<Vec<String>> {
    let raw = match store.get(ORDER_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(error = %e, "failed to read persisted step order, using catalog order");
            return None;
        }
    };
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(ids) => {
            debug!(steps = ids.len(), "loaded persisted step order");
            Some(ids)
        }
        Err(e) => {
            warn!(error = %e, "persisted step order is corrupt, using catalog order");
            None
        }
    }
}

pub fn save_order(store: &dyn LocalStore, ids: &[String]) -> FunnelResult<()> {
    store.set(ORDER_KEY, &serde_json::to_string(ids)?)?;
    info!(steps = ids.len(), "saved custom step order");
    Ok(())
}

pub fn clear_order(store: &dyn LocalStore) -> FunnelResult<()> {
    store.remove(ORDER_KEY)?;
    info!("custom step order cleared, catalog order restored");
    Ok(())
}

/// Run state mirrored to local storage after each navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedProgress {
    pub answers: AnswerMap,
    pub current_step: String,
}

pub fn save_progress(store: &dyn LocalStore, progress: &SavedProgress) -> FunnelResult<()> {
    store.set(ANSWERS_KEY, &serde_json::to_string(&progress.answers)?)?;
    store.set(CURRENT_STEP_KEY, &progress.current_step)?;
    Ok(())
}

/// Reads the mirrored run state; anything missing, unreadable or corrupt
/// yields `None`.
pub fn load_progress(store: &dyn LocalStore) -> Option<SavedProgress> {
    let answers = read_progress_key(store, ANSWERS_KEY)?;
    let current_step = read_progress_key(store, CURRENT_STEP_KEY)?;
    match serde_json::from_str(&answers) {
        Ok(answers) => Some(SavedProgress {
            answers,
            current_step,
        }),
        Err(e) => {
            warn!(error = %e, "saved answers are corrupt, starting fresh");
            None
        }
    }
}

fn read_progress_key(store: &dyn LocalStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "failed to read saved progress, starting fresh");
            None
        }
    }
}

/// Forgets the mirrored run state once a run is over. The custom order stays.
pub fn clear_progress(store: &dyn LocalStore) -> FunnelResult<()> {
    store.remove(ANSWERS_KEY)?;
    store.remove(CURRENT_STEP_KEY)?;
    debug!("saved progress cleared");
    Ok(())
}

/// Removes the custom order and the mirrored run state.
pub fn clear_local_state(store: &dyn LocalStore) -> FunnelResult<()> {
    for key in [ORDER_KEY, ANSWERS_KEY, CURRENT_STEP_KEY] {
        store.remove(key)?;
    }
    info!("local quiz state cleared");
    Ok(())
}
