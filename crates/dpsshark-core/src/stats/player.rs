use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::{PlayerSkillData, PlayerSummary, SkillBreakdown, SkillKind};

use super::counter::SlidingWindowCounter;
use super::subprofession::sub_profession_for_skill;

/// Profession shown until the decoder reports one.
pub const UNKNOWN_PROFESSION: &str = "Unknown";

/// Per-skill map key; damage and healing skills share ids but never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkillKey {
    pub kind: SkillKind,
    pub id: u32,
}

impl SkillKey {
    pub fn damage(id: u32) -> Self {
        Self {
            kind: SkillKind::Damage,
            id,
        }
    }

    pub fn healing(id: u32) -> Self {
        Self {
            kind: SkillKind::Healing,
            id,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SkillUsage {
    element: String,
    counter: SlidingWindowCounter,
}

/// Aggregate statistics for one player.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    uid: u64,
    name: String,
    profession: String,
    sub_profession: String,
    fight_point: u64,
    damage: SlidingWindowCounter,
    healing: SlidingWindowCounter,
    taken_damage: u64,
    dead_count: u32,
    skills: HashMap<SkillKey, SkillUsage>,
    attr: BTreeMap<String, Value>,
}

impl PlayerRecord {
    pub fn new(uid: u64) -> Self {
        Self {
            uid,
            name: String::new(),
            profession: UNKNOWN_PROFESSION.to_string(),
            sub_profession: String::new(),
            fight_point: 0,
            damage: SlidingWindowCounter::new(),
            healing: SlidingWindowCounter::new(),
            taken_damage: 0,
            dead_count: 0,
            skills: HashMap::new(),
            attr: BTreeMap::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_damage(
        &mut self,
        now_ms: u64,
        skill_id: u32,
        element: &str,
        damage: u64,
        is_crit: bool,
        is_lucky: bool,
        causes_lucky: bool,
        hp_lessen: u64,
    ) {
        self.damage
            .add_record(now_ms, damage, is_crit, is_lucky, hp_lessen);
        self.record_skill(
            SkillKey::damage(skill_id),
            element,
            now_ms,
            damage,
            is_crit,
            causes_lucky,
            hp_lessen,
        );
        self.apply_sub_profession(skill_id);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_healing(
        &mut self,
        now_ms: u64,
        skill_id: u32,
        element: &str,
        healing: u64,
        is_crit: bool,
        is_lucky: bool,
        causes_lucky: bool,
    ) {
        self.healing
            .add_record(now_ms, healing, is_crit, is_lucky, 0);
        self.record_skill(
            SkillKey::healing(skill_id),
            element,
            now_ms,
            healing,
            is_crit,
            causes_lucky,
            0,
        );
        self.apply_sub_profession(skill_id);
    }

    pub fn add_taken_damage(&mut self, damage: u64, is_dead: bool) {
        self.taken_damage += damage;
        if is_dead {
            self.dead_count += 1;
        }
    }

    /// Refresh the realtime window of the damage and healing counters.
    pub fn update_realtime(&mut self, now_ms: u64) {
        self.damage.update_realtime_stats(now_ms);
        self.healing.update_realtime_stats(now_ms);
    }

    #[allow(clippy::too_many_arguments)]
    fn record_skill(
        &mut self,
        key: SkillKey,
        element: &str,
        now_ms: u64,
        value: u64,
        is_crit: bool,
        is_lucky: bool,
        extra: u64,
    ) {
        let usage = self.skills.entry(key).or_insert_with(|| SkillUsage {
            element: element.to_string(),
            counter: SlidingWindowCounter::new(),
        });
        usage
            .counter
            .add_record(now_ms, value, is_crit, is_lucky, extra);
        // Per-skill realtime rates are not tracked.
        usage.counter.clear_window();
    }

    fn apply_sub_profession(&mut self, skill_id: u32) {
        if let Some(label) = sub_profession_for_skill(skill_id) {
            self.sub_profession = label.to_string();
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Set the profession; a different profession invalidates the sub-profession.
    pub fn set_profession(&mut self, profession: &str) {
        if self.profession != profession {
            self.sub_profession.clear();
        }
        self.profession = profession.to_string();
    }

    pub fn set_fight_point(&mut self, fight_point: u64) {
        self.fight_point = fight_point;
    }

    pub fn set_attr(&mut self, key: &str, value: Value) {
        self.attr.insert(key.to_string(), value);
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profession(&self) -> &str {
        &self.profession
    }

    pub fn sub_profession(&self) -> &str {
        &self.sub_profession
    }

    pub fn fight_point(&self) -> u64 {
        self.fight_point
    }

    pub fn damage(&self) -> &SlidingWindowCounter {
        &self.damage
    }

    pub fn healing(&self) -> &SlidingWindowCounter {
        &self.healing
    }

    pub fn taken_damage(&self) -> u64 {
        self.taken_damage
    }

    pub fn dead_count(&self) -> u32 {
        self.dead_count
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attr.get(key)
    }

    /// Profession label, suffixed with the sub-profession when known.
    pub fn display_profession(&self) -> String {
        if self.sub_profession.is_empty() {
            self.profession.clone()
        } else {
            format!("{}-{}", self.profession, self.sub_profession)
        }
    }

    pub fn summary(&self) -> PlayerSummary {
        let damage_rt = self.damage.realtime();
        let healing_rt = self.healing.realtime();
        PlayerSummary {
            uid: self.uid,
            name: self.name.clone(),
            profession: self.display_profession(),
            fight_point: self.fight_point,
            realtime_dps: damage_rt.value,
            realtime_dps_max: damage_rt.max,
            total_dps: self.damage.total_per_second(),
            total_damage: *self.damage.stats(),
            total_count: self.damage.count().merged(self.healing.count()),
            realtime_hps: healing_rt.value,
            realtime_hps_max: healing_rt.max,
            total_hps: self.healing.total_per_second(),
            total_healing: *self.healing.stats(),
            taken_damage: self.taken_damage,
            dead_count: self.dead_count,
            hp: self.attr.get("hp").and_then(Value::as_u64),
            max_hp: self.attr.get("max_hp").and_then(Value::as_u64),
        }
    }

    /// Per-skill breakdown in stable (kind, id) order.
    pub fn skill_summary(&self) -> Vec<SkillBreakdown> {
        let mut keys: Vec<&SkillKey> = self.skills.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| {
                let usage = &self.skills[key];
                let count = *usage.counter.count();
                let rate = |n: u64| {
                    if count.total > 0 {
                        n as f64 / count.total as f64
                    } else {
                        0.0
                    }
                };
                SkillBreakdown {
                    skill_id: key.id,
                    kind: key.kind,
                    element: usage.element.clone(),
                    total: usage.counter.stats().total,
                    total_count: count.total,
                    crit_count: count.critical,
                    lucky_count: count.lucky,
                    crit_rate: rate(count.critical),
                    lucky_rate: rate(count.lucky),
                    value_breakdown: *usage.counter.stats(),
                    count_breakdown: count,
                }
            })
            .collect()
    }

    pub fn skill_data(&self) -> PlayerSkillData {
        PlayerSkillData {
            uid: self.uid,
            name: self.name.clone(),
            profession: self.display_profession(),
            skills: self.skill_summary(),
            attr: self.attr.clone(),
        }
    }
}
