use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, unbounded};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use super::player::PlayerRecord;

#[derive(Debug, Error)]
pub enum IdentityCacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("identity cache JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Identity fields remembered for a uid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fight_point: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_hp: Option<u64>,
}

/// Identity metadata that outlives player-table clears.
///
/// Players are recreated lazily after every clear; the decoder only reports
/// names and professions occasionally, so new records are pre-filled from
/// here. Current HP is cached too but never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityCache {
    entries: BTreeMap<u64, CachedIdentity>,
    #[serde(skip)]
    hp: HashMap<u64, u64>,
    #[serde(skip)]
    dirty: bool,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, IdentityCacheError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), IdentityCacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn get(&self, uid: u64) -> Option<&CachedIdentity> {
        self.entries.get(&uid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record_name(&mut self, uid: u64, name: &str) {
        let entry = self.entries.entry(uid).or_default();
        if entry.name.as_deref() != Some(name) {
            entry.name = Some(name.to_string());
            self.dirty = true;
        }
    }

    pub fn record_profession(&mut self, uid: u64, profession: &str) {
        let entry = self.entries.entry(uid).or_default();
        if entry.profession.as_deref() != Some(profession) {
            entry.profession = Some(profession.to_string());
            self.dirty = true;
        }
    }

    pub fn record_fight_point(&mut self, uid: u64, fight_point: u64) {
        let entry = self.entries.entry(uid).or_default();
        if entry.fight_point != Some(fight_point) {
            entry.fight_point = Some(fight_point);
            self.dirty = true;
        }
    }

    pub fn record_max_hp(&mut self, uid: u64, max_hp: u64) {
        let entry = self.entries.entry(uid).or_default();
        if entry.max_hp != Some(max_hp) {
            entry.max_hp = Some(max_hp);
            self.dirty = true;
        }
    }

    /// Copy of the cache if a persisted field changed since the last call.
    pub fn take_changes(&mut self) -> Option<IdentityCache> {
        if !std::mem::take(&mut self.dirty) {
            return None;
        }
        Some(self.clone())
    }

    pub fn record_hp(&mut self, uid: u64, hp: u64) {
        self.hp.insert(uid, hp);
    }

    /// Pre-fill a freshly created record with everything known about its uid.
    pub fn apply_to(&self, player: &mut PlayerRecord) {
        let uid = player.uid();
        if let Some(identity) = self.entries.get(&uid) {
            if let Some(name) = &identity.name {
                player.set_name(name);
            }
            if let Some(profession) = &identity.profession {
                player.set_profession(profession);
            }
            if let Some(fight_point) = identity.fight_point {
                player.set_fight_point(fight_point);
            }
            if let Some(max_hp) = identity.max_hp {
                player.set_attr("max_hp", json!(max_hp));
            }
        }
        if let Some(hp) = self.hp.get(&uid) {
            player.set_attr("hp", json!(hp));
        }
    }
}

/// Saves identity snapshots to one JSON file from a background thread.
///
/// Snapshots queued behind a newer one are skipped. Dropping the writer
/// waits for the pending save.
#[derive(Debug)]
pub struct IdentityWriter {
    tx: Option<Sender<IdentityCache>>,
    worker: Option<JoinHandle<()>>,
}

impl IdentityWriter {
    pub fn spawn(path: impl Into<PathBuf>) -> Result<Self, IdentityCacheError> {
        let path = path.into();
        let (tx, rx) = unbounded::<IdentityCache>();
        let worker = thread::Builder::new()
            .name("identity-writer".to_string())
            .spawn(move || {
                while let Ok(mut cache) = rx.recv() {
                    if let Some(newer) = rx.try_iter().last() {
                        cache = newer;
                    }
                    match cache.save(&path) {
                        Ok(()) => tracing::debug!(
                            players = cache.len(),
                            path = %path.display(),
                            "identity cache saved"
                        ),
                        Err(err) => tracing::warn!(
                            error = %err,
                            path = %path.display(),
                            "failed to save identity cache"
                        ),
                    }
                }
            })?;
        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    pub fn submit(&self, cache: IdentityCache) {
        let sent = self.tx.as_ref().map(|tx| tx.send(cache).is_ok());
        if sent != Some(true) {
            tracing::warn!("identity writer has stopped");
        }
    }
}

impl Drop for IdentityWriter {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("identity writer panicked");
            }
        }
    }
}
