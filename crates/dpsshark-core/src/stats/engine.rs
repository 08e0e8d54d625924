use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::archive::{Archive, Encounter, NullArchive};
use crate::clock::millis_to_rfc3339;
use crate::config::EngineConfig;
use crate::{EnemySummary, PlayerSkillData, PlayerSummary};

use super::enemy::EnemyCache;
use super::identity::IdentityCache;
use super::player::PlayerRecord;

/// One damage event as reported by the protocol decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DamageEvent<'a> {
    pub uid: u64,
    pub skill_id: u32,
    pub element: &'a str,
    pub value: u64,
    pub is_crit: bool,
    pub is_lucky: bool,
    pub causes_lucky: bool,
    /// Damage that actually reduced the target's HP.
    pub hp_lessen: u64,
    pub target_uid: u64,
}

/// One healing event as reported by the protocol decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealingEvent<'a> {
    pub uid: u64,
    pub skill_id: u32,
    pub element: &'a str,
    pub value: u64,
    pub is_crit: bool,
    pub is_lucky: bool,
    pub causes_lucky: bool,
    pub target_uid: u64,
}

/// Owner of the player table and enemy cache.
///
/// All mutations take the event time in milliseconds; the engine never reads
/// the clock itself. Readers get owned snapshots.
pub struct AggregationEngine {
    config: EngineConfig,
    players: HashMap<u64, PlayerRecord>,
    enemies: EnemyCache,
    identities: IdentityCache,
    epoch_start_ms: Option<u64>,
    last_activity_ms: Option<u64>,
    fight_log: Vec<String>,
    archive: Box<dyn Archive>,
}

impl std::fmt::Debug for AggregationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationEngine")
            .field("config", &self.config)
            .field("players", &self.players.len())
            .field("epoch_start_ms", &self.epoch_start_ms)
            .field("last_activity_ms", &self.last_activity_ms)
            .finish_non_exhaustive()
    }
}

impl AggregationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            players: HashMap::new(),
            enemies: EnemyCache::new(),
            identities: IdentityCache::new(),
            epoch_start_ms: None,
            last_activity_ms: None,
            fight_log: Vec::new(),
            archive: Box::new(NullArchive),
        }
    }

    pub fn with_archive(mut self, archive: Box<dyn Archive>) -> Self {
        self.archive = archive;
        self
    }

    pub fn with_identities(mut self, identities: IdentityCache) -> Self {
        self.identities = identities;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the recording policy with a new snapshot.
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    fn player_mut(&mut self, uid: u64) -> &mut PlayerRecord {
        let identities = &self.identities;
        self.players.entry(uid).or_insert_with(|| {
            let mut player = PlayerRecord::new(uid);
            identities.apply_to(&mut player);
            player
        })
    }

    fn touch(&mut self, now_ms: u64) {
        self.epoch_start_ms.get_or_insert(now_ms);
        self.last_activity_ms = Some(now_ms);
    }

    fn check_idle_timeout(&mut self, now_ms: u64) {
        if !self.config.auto_clear_on_timeout || self.players.is_empty() {
            return;
        }
        let Some(last) = self.last_activity_ms else {
            return;
        };
        if now_ms.saturating_sub(last) > self.config.idle_timeout_ms {
            self.clear_all(now_ms);
            tracing::info!(idle_ms = now_ms - last, "idle timeout reached, statistics cleared");
        }
    }

    pub fn add_damage(&mut self, now_ms: u64, event: &DamageEvent<'_>) {
        if self.config.only_record_practice_target
            && event.target_uid != self.config.practice_target_id
        {
            return;
        }
        self.check_idle_timeout(now_ms);
        self.player_mut(event.uid).add_damage(
            now_ms,
            event.skill_id,
            event.element,
            event.value,
            event.is_crit,
            event.is_lucky,
            event.causes_lucky,
            event.hp_lessen,
        );
        self.touch(now_ms);
    }

    pub fn add_healing(&mut self, now_ms: u64, event: &HealingEvent<'_>) {
        self.check_idle_timeout(now_ms);
        if event.uid == 0 {
            return;
        }
        self.player_mut(event.uid).add_healing(
            now_ms,
            event.skill_id,
            event.element,
            event.value,
            event.is_crit,
            event.is_lucky,
            event.causes_lucky,
        );
        self.touch(now_ms);
    }

    pub fn add_taken_damage(&mut self, now_ms: u64, uid: u64, damage: u64, is_dead: bool) {
        self.check_idle_timeout(now_ms);
        self.player_mut(uid).add_taken_damage(damage, is_dead);
        self.touch(now_ms);
    }

    pub fn set_name(&mut self, uid: u64, name: &str) {
        let player = self.player_mut(uid);
        if player.name() == name {
            return;
        }
        player.set_name(name);
        self.identities.record_name(uid, name);
        tracing::info!(uid, name, "player name found");
    }

    pub fn set_profession(&mut self, uid: u64, profession: &str) {
        let player = self.player_mut(uid);
        if player.profession() == profession {
            return;
        }
        player.set_profession(profession);
        self.identities.record_profession(uid, profession);
        tracing::info!(uid, profession, "player profession found");
    }

    pub fn set_fight_point(&mut self, uid: u64, fight_point: u64) {
        let player = self.player_mut(uid);
        if player.fight_point() == fight_point {
            return;
        }
        player.set_fight_point(fight_point);
        self.identities.record_fight_point(uid, fight_point);
        tracing::info!(uid, fight_point, "player fight point found");
    }

    /// Store an arbitrary attribute; `hp` and `max_hp` are also remembered
    /// across clears.
    pub fn set_attr(&mut self, uid: u64, key: &str, value: Value) {
        let number = value.as_u64();
        let player = self.player_mut(uid);
        if player.attr(key) == Some(&value) {
            return;
        }
        player.set_attr(key, value);
        tracing::info!(uid, key, "player attribute updated");
        match (key, number) {
            ("hp", Some(hp)) => self.identities.record_hp(uid, hp),
            ("max_hp", Some(max_hp)) => self.identities.record_max_hp(uid, max_hp),
            _ => {}
        }
    }

    /// Append a line to the current encounter's fight log, if enabled.
    pub fn add_log(&mut self, now_ms: u64, line: &str) {
        if !self.config.fight_log {
            return;
        }
        let stamp = millis_to_rfc3339(now_ms).unwrap_or_else(|| now_ms.to_string());
        self.fight_log.push(format!("[{stamp}] {line}"));
    }

    pub fn set_enemy_name(&mut self, id: u64, name: &str) {
        self.enemies.set_name(id, name);
    }

    pub fn set_enemy_hp(&mut self, id: u64, hp: u64) {
        self.enemies.set_hp(id, hp);
    }

    pub fn set_enemy_max_hp(&mut self, id: u64, max_hp: u64) {
        self.enemies.set_max_hp(id, max_hp);
    }

    pub fn remove_enemy(&mut self, id: u64) {
        self.enemies.remove(id);
    }

    /// Periodic tick: refresh every player's realtime window.
    pub fn update_all_realtime(&mut self, now_ms: u64) {
        for player in self.players.values_mut() {
            player.update_realtime(now_ms);
        }
    }

    /// Start a new epoch; the previous table goes to the archive.
    pub fn clear_all(&mut self, now_ms: u64) {
        let players = std::mem::take(&mut self.players);
        let log = std::mem::take(&mut self.fight_log);
        let started_at_ms = self.epoch_start_ms.unwrap_or(now_ms);
        self.epoch_start_ms = Some(now_ms);
        self.last_activity_ms = None;

        if players.is_empty() {
            return;
        }
        let encounter = Encounter {
            started_at_ms,
            ended_at_ms: now_ms,
            players,
            log,
        };
        if let Err(err) = self.archive.archive(encounter) {
            tracing::warn!(error = %err, "failed to archive encounter");
        }
    }

    /// Wait for the archive to persist everything handed over so far.
    pub fn flush_archive(&mut self) {
        if let Err(err) = self.archive.flush() {
            tracing::warn!(error = %err, "failed to flush archive");
        }
    }

    /// Reaction to the reassembler locking onto a new server flow.
    pub fn on_server_change(&mut self, now_ms: u64) {
        self.enemies.clear();
        if !self.config.auto_clear_on_server_change
            || self.last_activity_ms.is_none()
            || self.players.is_empty()
        {
            return;
        }
        self.clear_all(now_ms);
        tracing::info!("server changed, statistics cleared");
    }

    pub fn all_users(&self) -> BTreeMap<u64, PlayerSummary> {
        self.players
            .iter()
            .map(|(uid, player)| (*uid, player.summary()))
            .collect()
    }

    pub fn user_skills(&self, uid: u64) -> Option<PlayerSkillData> {
        self.players.get(&uid).map(PlayerRecord::skill_data)
    }

    pub fn user_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.players.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn enemies(&self) -> Vec<EnemySummary> {
        self.enemies.snapshot()
    }

    pub fn player(&self, uid: u64) -> Option<&PlayerRecord> {
        self.players.get(&uid)
    }

    pub fn identities(&self) -> &IdentityCache {
        &self.identities
    }

    /// Snapshot of the identity cache if it changed since the last call.
    pub fn take_identity_changes(&mut self) -> Option<IdentityCache> {
        self.identities.take_changes()
    }

    pub fn epoch_start(&self) -> Option<u64> {
        self.epoch_start_ms
    }

    pub fn last_activity(&self) -> Option<u64> {
        self.last_activity_ms
    }
}

#[cfg(test)]
mod tests {
    use super::{AggregationEngine, DamageEvent, HealingEvent};
    use crate::archive::{Archive, ArchiveError, Encounter};
    use crate::config::EngineConfig;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Encounter>>>);

    impl Archive for Recorder {
        fn archive(&mut self, encounter: Encounter) -> Result<(), ArchiveError> {
            self.0.lock().unwrap().push(encounter);
            Ok(())
        }
    }

    fn damage(uid: u64, value: u64) -> DamageEvent<'static> {
        DamageEvent {
            uid,
            skill_id: 100,
            element: "fire",
            value,
            target_uid: 75,
            ..DamageEvent::default()
        }
    }

    fn engine_with(config: EngineConfig) -> (AggregationEngine, Recorder) {
        let recorder = Recorder::default();
        let engine = AggregationEngine::new(config).with_archive(Box::new(recorder.clone()));
        (engine, recorder)
    }

    #[test]
    fn idle_timeout_clears_before_applying_event() {
        let (mut engine, recorder) = engine_with(EngineConfig {
            auto_clear_on_timeout: true,
            idle_timeout_ms: 20_000,
            ..EngineConfig::default()
        });
        engine.add_damage(1_000, &damage(1, 100));
        engine.add_damage(22_000, &damage(2, 50));

        assert_eq!(engine.user_ids(), vec![2]);
        assert_eq!(engine.epoch_start(), Some(22_000));
        let archived = recorder.0.lock().unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].started_at_ms, 1_000);
        assert_eq!(archived[0].ended_at_ms, 22_000);
        assert!(archived[0].players.contains_key(&1));
    }

    #[test]
    fn idle_timeout_disabled_keeps_table() {
        let (mut engine, recorder) = engine_with(EngineConfig::default());
        engine.add_damage(1_000, &damage(1, 100));
        engine.add_damage(100_000, &damage(1, 100));
        assert_eq!(engine.all_users()[&1].total_damage.total, 200);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn activity_within_timeout_keeps_table() {
        let (mut engine, _recorder) = engine_with(EngineConfig {
            auto_clear_on_timeout: true,
            idle_timeout_ms: 20_000,
            ..EngineConfig::default()
        });
        engine.add_damage(0, &damage(1, 1));
        engine.add_taken_damage(19_000, 1, 5, false);
        engine.add_damage(38_000, &damage(1, 1));
        assert_eq!(engine.all_users()[&1].total_damage.total, 2);
    }

    #[test]
    fn practice_target_filter_drops_other_targets() {
        let (mut engine, _recorder) = engine_with(EngineConfig {
            only_record_practice_target: true,
            ..EngineConfig::default()
        });
        let mut event = damage(1, 10);
        event.target_uid = 3;
        engine.add_damage(0, &event);
        assert!(engine.all_users().is_empty());

        engine.add_damage(0, &damage(1, 10));
        assert_eq!(engine.all_users()[&1].total_damage.total, 10);
    }

    #[test]
    fn healing_without_actor_is_ignored() {
        let (mut engine, _recorder) = engine_with(EngineConfig::default());
        engine.add_healing(
            0,
            &HealingEvent {
                uid: 0,
                value: 10,
                ..HealingEvent::default()
            },
        );
        assert!(engine.all_users().is_empty());
        assert_eq!(engine.last_activity(), None);
    }

    #[test]
    fn server_change_clears_enemies_and_only_active_tables() {
        let (mut engine, recorder) = engine_with(EngineConfig::default());
        engine.set_enemy_name(9, "Boss");
        engine.set_name(1, "Alice");
        engine.on_server_change(10);
        assert!(engine.enemies().is_empty());
        assert_eq!(engine.user_ids(), vec![1]);
        assert!(recorder.0.lock().unwrap().is_empty());

        engine.add_damage(20, &damage(1, 10));
        engine.on_server_change(30);
        assert!(engine.all_users().is_empty());
        assert_eq!(recorder.0.lock().unwrap().len(), 1);

        engine.on_server_change(40);
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn server_change_respects_policy() {
        let (mut engine, recorder) = engine_with(EngineConfig {
            auto_clear_on_server_change: false,
            ..EngineConfig::default()
        });
        engine.add_damage(0, &damage(1, 10));
        engine.on_server_change(10);
        assert_eq!(engine.user_ids(), vec![1]);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn identity_survives_clear() {
        let (mut engine, _recorder) = engine_with(EngineConfig::default());
        engine.set_name(1, "Alice");
        engine.set_profession(1, "Marksman");
        engine.set_fight_point(1, 9000);
        engine.set_attr(1, "max_hp", json!(5000));
        engine.set_attr(1, "hp", json!(4000));
        engine.add_damage(0, &damage(1, 10));
        engine.clear_all(100);
        assert!(engine.all_users().is_empty());

        engine.add_damage(200, &damage(1, 10));
        let summary = &engine.all_users()[&1];
        assert_eq!(summary.name, "Alice");
        assert_eq!(summary.profession, "Marksman");
        assert_eq!(summary.fight_point, 9000);
        assert_eq!(summary.max_hp, Some(5000));
        assert_eq!(summary.hp, Some(4000));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn attribute_changes_are_logged_once() {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let (mut engine, _recorder) = engine_with(EngineConfig::default());

        tracing::subscriber::with_default(subscriber, || {
            engine.set_attr(1, "level", json!(60));
            engine.set_attr(1, "level", json!(60));
            engine.set_attr(1, "level", json!(61));
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("player attribute updated").count(), 2);
        assert!(output.contains("key=\"level\""));
        assert_eq!(engine.player(1).and_then(|p| p.attr("level")), Some(&json!(61)));
    }

    #[test]
    fn identity_changes_are_reported_once() {
        let (mut engine, _recorder) = engine_with(EngineConfig::default());
        assert!(engine.take_identity_changes().is_none());

        engine.set_name(1, "Alice");
        let snapshot = engine.take_identity_changes().expect("changed identities");
        assert_eq!(snapshot.get(1).and_then(|i| i.name.as_deref()), Some("Alice"));
        assert!(engine.take_identity_changes().is_none());

        engine.set_name(1, "Alice");
        engine.set_attr(1, "hp", json!(10));
        assert!(engine.take_identity_changes().is_none());
    }

    #[test]
    fn fight_log_moves_into_archived_encounter() {
        let (mut engine, recorder) = engine_with(EngineConfig {
            fight_log: true,
            ..EngineConfig::default()
        });
        engine.add_damage(0, &damage(1, 10));
        engine.add_log(0, "Alice hit Boss for 10");
        engine.clear_all(1_000);
        engine.add_log(2_000, "dropped with the empty table");
        engine.clear_all(3_000);

        let archived = recorder.0.lock().unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].log, vec!["[1970-01-01T00:00:00Z] Alice hit Boss for 10".to_string()]);
    }

    #[test]
    fn fight_log_disabled_by_default() {
        let (mut engine, recorder) = engine_with(EngineConfig::default());
        engine.add_damage(0, &damage(1, 10));
        engine.add_log(0, "dropped");
        engine.clear_all(1_000);
        assert!(recorder.0.lock().unwrap()[0].log.is_empty());
    }

    #[test]
    fn realtime_refresh_fans_out_to_players() {
        let (mut engine, _recorder) = engine_with(EngineConfig::default());
        engine.add_damage(0, &damage(1, 10));
        engine.add_damage(900, &damage(2, 5));
        engine.update_all_realtime(950);
        let users = engine.all_users();
        assert_eq!(users[&1].realtime_dps, 10);
        assert_eq!(users[&2].realtime_dps, 5);

        engine.update_all_realtime(1_100);
        let users = engine.all_users();
        assert_eq!(users[&1].realtime_dps, 0);
        assert_eq!(users[&1].realtime_dps_max, 10);
    }

    #[test]
    fn skill_snapshot_for_unknown_user_is_none() {
        let (mut engine, _recorder) = engine_with(EngineConfig::default());
        assert!(engine.user_skills(5).is_none());
        engine.add_damage(0, &damage(5, 1));
        let data = engine.user_skills(5).unwrap();
        assert_eq!(data.uid, 5);
        assert_eq!(data.skills.len(), 1);
        assert_eq!(data.skills[0].element, "fire");
    }
}
