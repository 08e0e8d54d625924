//! dpsshark core library: passive combat statistics from game traffic.
//!
//! Captured frames flow through a fixed pipeline: packet sources feed the
//! ingestion queue, the flow reassembler identifies the scene server and
//! rebuilds its byte stream into length-prefixed frames, a frame decoder turns
//! frames into gameplay events, and the aggregation engine keeps per-player
//! totals and sliding-window rates. All I/O stays in `source`, `archive` and
//! `config`; reassembly and statistics are pure state machines driven by an
//! explicit millisecond clock.
//!
//! Invariants:
//! - Exactly one server flow is reassembled at a time.
//! - Frames reach the decoder in stream order, length prefix included.
//! - Realtime rates only change on the periodic refresh.
//!
//! Version française (résumé):
//! Cette crate reconstruit le flux TCP du serveur de scène (défragmentation
//! IP, réordonnancement TCP, découpage en trames préfixées) et agrège les
//! statistiques de combat par joueur avec fenêtre glissante d'une seconde.
//!
//! # Examples
//! ```no_run
//! use std::path::Path;
//!
//! use dpsshark_core::{Config, replay_pcap_file};
//!
//! let report = replay_pcap_file(Path::new("capture.pcapng"), &Config::default())?;
//! println!("players seen: {}", report.players.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod archive;
pub mod clock;
pub mod config;
pub mod ingest;
pub mod net;
pub mod protocols;
pub mod reassembly;
mod replay;
pub mod session;
pub mod source;
pub mod stats;
pub mod sync;

pub use archive::{Archive, ArchiveError, BackgroundArchive, Encounter, JsonArchive, NullArchive};
pub use config::{Config, ConfigError};
pub use reassembly::{FlowEvent, FlowKey, FlowReassembler, ReassemblyStats};
pub use replay::{ReplayError, replay_pcap_file, replay_source};
pub use session::{DiscardFrames, FrameDecoder, ServerInfo, Session};
pub use source::{PacketEvent, PacketSource, PcapFileSource, SourceError};
pub use stats::{
    AggregationEngine, CountBreakdown, DamageEvent, HealingEvent, IdentityCache, IdentityWriter,
    SlidingWindowCounter, ValueBreakdown,
};
pub use sync::EngineHandle;

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no capture time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Result of replaying one capture, in deterministic order.
///
/// # Examples
/// ```
/// use dpsshark_core::make_stub_report;
///
/// let report = make_stub_report("capture.pcapng", 123);
/// assert_eq!(report.report_version, dpsshark_core::REPORT_VERSION);
/// assert!(report.server.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    pub tool: ToolInfo,
    /// RFC3339 time of the last captured packet, for reproducible output.
    pub generated_at: String,
    pub input: InputInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_summary: Option<CaptureSummary>,
    /// Last identified scene server, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerInfo>,
    pub reassembly: ReassemblyStats,
    pub frames: DiscardFrames,
    /// Players ordered by uid.
    pub players: Vec<PlayerSummary>,
    /// Enemies ordered by id.
    pub enemies: Vec<EnemySummary>,
}

/// Tool metadata embedded in reports.
///
/// # Examples
/// ```
/// use dpsshark_core::ToolInfo;
///
/// let tool = ToolInfo {
///     name: "dpsshark".to_string(),
///     version: "0.1.0".to_string(),
/// };
/// assert_eq!(tool.name, "dpsshark");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

/// Input capture metadata embedded in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input path as provided to the replay.
    pub path: String,
    pub bytes: u64,
}

/// Packet count and time span of the capture.
///
/// # Examples
/// ```
/// use dpsshark_core::CaptureSummary;
///
/// let summary = CaptureSummary {
///     packets_total: 10,
///     time_start: None,
///     time_end: None,
/// };
/// assert_eq!(summary.packets_total, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub packets_total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
}

/// Snapshot of one player's statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub uid: u64,
    pub name: String,
    /// Profession, suffixed `-Sub` once a sub-profession is known.
    pub profession: String,
    pub fight_point: u64,
    /// Damage over the last second, as of the latest refresh.
    pub realtime_dps: u64,
    pub realtime_dps_max: u64,
    pub total_dps: f64,
    pub total_damage: ValueBreakdown,
    /// Damage and healing hits combined.
    pub total_count: CountBreakdown,
    pub realtime_hps: u64,
    pub realtime_hps_max: u64,
    pub total_hps: f64,
    pub total_healing: ValueBreakdown,
    pub taken_damage: u64,
    pub dead_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hp: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    Damage,
    Healing,
}

/// Per-skill totals and hit rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillBreakdown {
    pub skill_id: u32,
    pub kind: SkillKind,
    pub element: String,
    pub total: u64,
    pub total_count: u64,
    pub crit_count: u64,
    pub lucky_count: u64,
    pub crit_rate: f64,
    pub lucky_rate: f64,
    pub value_breakdown: ValueBreakdown,
    pub count_breakdown: CountBreakdown,
}

/// Skill breakdown of one player together with its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSkillData {
    pub uid: u64,
    pub name: String,
    pub profession: String,
    pub skills: Vec<SkillBreakdown>,
    pub attr: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemySummary {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hp: Option<u64>,
}

/// Build a report with base fields filled and empty aggregates.
///
/// # Examples
/// ```
/// use dpsshark_core::make_stub_report;
///
/// let report = make_stub_report("capture.pcapng", 123);
/// assert_eq!(report.input.bytes, 123);
/// assert!(report.players.is_empty());
/// ```
pub fn make_stub_report(input_path: &str, input_bytes: u64) -> ReplayReport {
    ReplayReport {
        report_version: REPORT_VERSION,
        tool: ToolInfo {
            name: "dpsshark".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            path: input_path.to_string(),
            bytes: input_bytes,
        },
        capture_summary: None,
        server: None,
        reassembly: ReassemblyStats::default(),
        frames: DiscardFrames::default(),
        players: vec![],
        enemies: vec![],
    }
}
