//! Shared access to the aggregation engine.
//!
//! The processing thread mutates through [`EngineHandle::lock`]; snapshot
//! readers (a UI, the CLI's periodic printer) go through the copying helpers
//! and never hold the lock across anything slow.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::EngineConfig;
use crate::stats::AggregationEngine;
use crate::{EnemySummary, PlayerSkillData, PlayerSummary};

#[derive(Debug, Clone)]
pub struct EngineHandle {
    inner: Arc<Mutex<AggregationEngine>>,
}

impl EngineHandle {
    pub fn new(engine: AggregationEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Exclusive access. A panic in another holder does not poison the
    /// engine for everyone else.
    pub fn lock(&self) -> MutexGuard<'_, AggregationEngine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn all_users(&self) -> BTreeMap<u64, PlayerSummary> {
        self.lock().all_users()
    }

    pub fn user_skills(&self, uid: u64) -> Option<PlayerSkillData> {
        self.lock().user_skills(uid)
    }

    pub fn enemies(&self) -> Vec<EnemySummary> {
        self.lock().enemies()
    }

    pub fn clear_all(&self, now_ms: u64) {
        self.lock().clear_all(now_ms);
    }

    pub fn set_config(&self, config: EngineConfig) {
        self.lock().set_config(config);
    }
}
