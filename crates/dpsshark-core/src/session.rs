//! Drives a [`FlowReassembler`] and a [`FrameDecoder`] against the shared
//! engine.
//!
//! A session owns all reassembly state and runs on a single thread. Periodic
//! work (realtime window refresh, fragment eviction, the flow watchdog) is
//! scheduled from the same clock that stamps packets, so replaying a capture
//! behaves like watching it live. The cleanup tick also hands changed
//! identities to an [`IdentityWriter`], when one is attached.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::{millis_to_rfc3339, unix_millis};
use crate::config::Config;
use crate::protocols::scene::ServerSignature;
use crate::reassembly::{FlowEvent, FlowKey, FlowReassembler};
use crate::source::{PacketEvent, PacketSource, SourceError};
use crate::stats::{AggregationEngine, IdentityWriter};
use crate::sync::EngineHandle;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),
}

/// Application-protocol decoder fed with reassembled frames.
///
/// Frames arrive in stream order with their 4-byte length prefix. The decoder
/// reports gameplay events through the engine's mutation API.
pub trait FrameDecoder {
    fn decode(&mut self, frame: &[u8], now_ms: u64, engine: &mut AggregationEngine);
}

impl<F> FrameDecoder for F
where
    F: FnMut(&[u8], u64, &mut AggregationEngine),
{
    fn decode(&mut self, frame: &[u8], now_ms: u64, engine: &mut AggregationEngine) {
        self(frame, now_ms, engine)
    }
}

/// Decoder that only counts what it is given.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardFrames {
    pub frames: u64,
    pub bytes: u64,
}

impl FrameDecoder for DiscardFrames {
    fn decode(&mut self, frame: &[u8], _now_ms: u64, _engine: &mut AggregationEngine) {
        self.frames += 1;
        self.bytes += frame.len() as u64;
    }
}

/// The most recently identified scene server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub flow: String,
    pub signature: ServerSignature,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identified_at: Option<String>,
    /// Still locked when the snapshot was taken.
    pub active: bool,
}

/// Packet count and timestamp bounds of a replayed source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplayProgress {
    pub packets: u64,
    pub first_ts: Option<f64>,
    pub last_ts: Option<f64>,
}

impl ReplayProgress {
    fn observe(&mut self, ts: Option<f64>) {
        self.packets += 1;
        let Some(ts) = ts else {
            return;
        };
        self.first_ts = Some(self.first_ts.map_or(ts, |first| first.min(ts)));
        self.last_ts = Some(self.last_ts.map_or(ts, |last| last.max(ts)));
    }
}

pub struct Session<D> {
    reassembler: FlowReassembler,
    decoder: D,
    engine: EngineHandle,
    realtime_refresh_ms: u64,
    cleanup_interval_ms: u64,
    next_refresh_ms: Option<u64>,
    next_cleanup_ms: Option<u64>,
    clock_ms: Option<u64>,
    server: Option<(FlowKey, ServerSignature, u64)>,
    identity_writer: Option<IdentityWriter>,
}

impl<D: FrameDecoder> Session<D> {
    pub fn new(config: &Config, engine: EngineHandle, decoder: D) -> Self {
        Self {
            reassembler: FlowReassembler::new(config.reassembly.clone()),
            decoder,
            engine,
            realtime_refresh_ms: config.schedule.realtime_refresh_ms.max(1),
            cleanup_interval_ms: config.schedule.cleanup_interval_ms.max(1),
            next_refresh_ms: None,
            next_cleanup_ms: None,
            clock_ms: None,
            server: None,
            identity_writer: None,
        }
    }

    pub fn with_identity_writer(mut self, writer: IdentityWriter) -> Self {
        self.identity_writer = Some(writer);
        self
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn reassembler(&self) -> &FlowReassembler {
        &self.reassembler
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut D {
        &mut self.decoder
    }

    pub fn server(&self) -> Option<ServerInfo> {
        let (flow, signature, at_ms) = self.server?;
        Some(ServerInfo {
            flow: flow.to_string(),
            signature,
            identified_at: millis_to_rfc3339(at_ms),
            active: self.reassembler.active_flow() == Some(flow),
        })
    }

    /// Process one frame stamped `now_ms`, then run any periodic work due.
    pub fn handle_packet(&mut self, event: &PacketEvent, now_ms: u64) {
        let now_ms = self.tick(now_ms);
        let events = self
            .reassembler
            .process_packet(event.linktype, &event.data, now_ms);
        if !events.is_empty() {
            let mut engine = self.engine.lock();
            for flow_event in events {
                match flow_event {
                    FlowEvent::ServerChanged { flow, signature } => {
                        self.server = Some((flow, signature, now_ms));
                        engine.on_server_change(now_ms);
                    }
                    FlowEvent::Frame(frame) => self.decoder.decode(&frame, now_ms, &mut engine),
                }
            }
        }
        self.run_due(now_ms);
    }

    /// Run periodic work due at `now_ms` without a packet.
    pub fn advance(&mut self, now_ms: u64) {
        let now_ms = self.tick(now_ms);
        self.run_due(now_ms);
    }

    /// The session clock never goes backwards.
    fn tick(&mut self, now_ms: u64) -> u64 {
        let now_ms = self.clock_ms.map_or(now_ms, |clock| clock.max(now_ms));
        self.clock_ms = Some(now_ms);
        now_ms
    }

    fn run_due(&mut self, now_ms: u64) {
        let next_refresh = *self
            .next_refresh_ms
            .get_or_insert(now_ms + self.realtime_refresh_ms);
        if now_ms >= next_refresh {
            self.engine.lock().update_all_realtime(now_ms);
            self.next_refresh_ms = Some(now_ms + self.realtime_refresh_ms);
        }

        let next_cleanup = *self
            .next_cleanup_ms
            .get_or_insert(now_ms + self.cleanup_interval_ms);
        if now_ms >= next_cleanup {
            self.reassembler.expire(now_ms);
            if let Some(writer) = &self.identity_writer {
                let changes = self.engine.lock().take_identity_changes();
                if let Some(identities) = changes {
                    writer.submit(identities);
                }
            }
            self.next_cleanup_ms = Some(now_ms + self.cleanup_interval_ms);
        }
    }

    /// Drain `source`, driving time from capture timestamps.
    pub fn replay<S: PacketSource>(&mut self, source: &mut S) -> Result<ReplayProgress, SessionError> {
        let mut progress = ReplayProgress::default();
        while let Some(event) = source.next_packet()? {
            progress.observe(event.ts);
            let now_ms = event
                .ts_ms()
                .unwrap_or_else(|| self.clock_ms.unwrap_or(0));
            self.handle_packet(&event, now_ms);
        }
        if let Some(now_ms) = self.clock_ms {
            self.engine.lock().update_all_realtime(now_ms);
        }
        tracing::debug!(packets = progress.packets, "replay finished");
        Ok(progress)
    }

    /// Consume the ingestion queue on wall-clock time until `running` is
    /// cleared or every producer is gone.
    pub fn run(&mut self, rx: &Receiver<PacketEvent>, running: &AtomicBool) {
        let idle = Duration::from_millis(self.realtime_refresh_ms);
        while running.load(Ordering::SeqCst) {
            match rx.recv_timeout(idle) {
                Ok(event) => self.handle_packet(&event, unix_millis()),
                Err(RecvTimeoutError::Timeout) => self.advance(unix_millis()),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::info!("processing loop stopped");
    }
}
