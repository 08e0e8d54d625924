use std::collections::{BTreeSet, HashMap};

use crate::EnemySummary;

/// Name and HP cache for non-player entities, fed by the protocol decoder.
#[derive(Debug, Default, Clone)]
pub struct EnemyCache {
    names: HashMap<u64, String>,
    hp: HashMap<u64, u64>,
    max_hp: HashMap<u64, u64>,
}

impl EnemyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, id: u64, name: &str) {
        self.names.insert(id, name.to_string());
    }

    pub fn set_hp(&mut self, id: u64, hp: u64) {
        self.hp.insert(id, hp);
    }

    pub fn set_max_hp(&mut self, id: u64, max_hp: u64) {
        self.max_hp.insert(id, max_hp);
    }

    pub fn remove(&mut self, id: u64) {
        self.names.remove(&id);
        self.hp.remove(&id);
        self.max_hp.remove(&id);
    }

    pub fn clear(&mut self) {
        self.names.clear();
        self.hp.clear();
        self.max_hp.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.hp.is_empty() && self.max_hp.is_empty()
    }

    /// Union of every id known to any of the three maps, ordered by id.
    pub fn snapshot(&self) -> Vec<EnemySummary> {
        let ids: BTreeSet<u64> = self
            .names
            .keys()
            .chain(self.hp.keys())
            .chain(self.max_hp.keys())
            .copied()
            .collect();
        ids.into_iter()
            .map(|id| EnemySummary {
                id,
                name: self.names.get(&id).cloned(),
                hp: self.hp.get(&id).copied(),
                max_hp: self.max_hp.get(&id).copied(),
            })
            .collect()
    }
}
