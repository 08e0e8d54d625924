use std::path::Path;

use thiserror::Error;

use crate::clock::millis_to_rfc3339;
use crate::config::Config;
use crate::session::{DiscardFrames, Session, SessionError};
use crate::source::{PacketSource, PcapFileSource, SourceError};
use crate::stats::AggregationEngine;
use crate::sync::EngineHandle;
use crate::{CaptureSummary, DEFAULT_GENERATED_AT, ReplayReport, make_stub_report};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Replay a capture file with a fresh engine built from `config`.
pub fn replay_pcap_file(path: &Path, config: &Config) -> Result<ReplayReport, ReplayError> {
    let source = PcapFileSource::open(path)?;
    let engine = EngineHandle::new(AggregationEngine::new(config.engine.clone()));
    replay_source(path, source, &engine, config)
}

/// Replay `source` into `engine` and summarize the result.
///
/// Frames are counted but not decoded; the report carries reassembly
/// counters together with whatever the engine holds afterwards.
pub fn replay_source<S: PacketSource>(
    path: &Path,
    mut source: S,
    engine: &EngineHandle,
    config: &Config,
) -> Result<ReplayReport, ReplayError> {
    let mut session = Session::new(config, engine.clone(), DiscardFrames::default());
    let progress = session.replay(&mut source)?;

    let mut report = make_stub_report(&path.display().to_string(), path.metadata()?.len());
    let time_start = ts_to_rfc3339(progress.first_ts);
    let time_end = ts_to_rfc3339(progress.last_ts);
    report.generated_at = time_end
        .clone()
        .or_else(|| time_start.clone())
        .unwrap_or_else(|| DEFAULT_GENERATED_AT.to_string());
    report.capture_summary = Some(CaptureSummary {
        packets_total: progress.packets,
        time_start,
        time_end,
    });
    report.server = session.server();
    report.reassembly = session.reassembler().stats();
    report.frames = *session.decoder();
    report.players = engine.all_users().into_values().collect();
    report.enemies = engine.enemies();
    Ok(report)
}

fn ts_to_rfc3339(ts: Option<f64>) -> Option<String> {
    let ts = ts?;
    if !ts.is_finite() || ts < 0.0 {
        return None;
    }
    millis_to_rfc3339((ts * 1000.0) as u64)
}
