//! Turns captured frames into the scene server's application frames.
//!
//! The reassembler starts in [`FlowState::Searching`] and inspects every TCP
//! payload for a scene-server signature. Once one matches it locks onto that
//! flow and rebuilds its byte stream: IPv4 fragments are merged, TCP segments
//! are put back in sequence order, and the stream is split on 4-byte
//! big-endian length prefixes. Other flows keep being checked for signatures
//! so a server switch is picked up immediately.
//!
//! Nothing here blocks or reads the clock; callers pass the capture time in
//! milliseconds and call [`FlowReassembler::expire`] periodically.

pub mod flow;
pub mod fragment;
pub mod frames;
pub mod tcp;

pub use flow::{FlowKey, FlowState};
pub use fragment::{FragmentCache, FragmentKey};
pub use frames::{FrameError, StreamBuffer};
pub use tcp::{Disposition, TcpReorder};

use pcap_parser::Linktype;
use serde::{Deserialize, Serialize};

use crate::config::ReassemblyConfig;
use crate::net::{parse_ipv4_packet, parse_tcp_segment};
use crate::protocols::scene::{ServerSignature, identify_server};

/// Output of [`FlowReassembler::process_packet`], in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    /// A new scene server was identified; all previous stream state is gone.
    ServerChanged {
        flow: FlowKey,
        signature: ServerSignature,
    },
    /// One complete application frame, length prefix included.
    Frame(Vec<u8>),
}

/// Counters describing what the reassembler has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassemblyStats {
    pub packets: u64,
    pub ignored_packets: u64,
    pub malformed_packets: u64,
    pub fragments_buffered: u64,
    pub fragments_reassembled: u64,
    pub fragments_expired: u64,
    pub duplicate_segments: u64,
    pub bytes_merged: u64,
    pub frames_emitted: u64,
    pub server_changes: u64,
    pub corrupt_length_resets: u64,
    pub watchdog_resets: u64,
}

#[derive(Debug)]
pub struct FlowReassembler {
    config: ReassemblyConfig,
    state: FlowState,
    fragments: FragmentCache,
    reorder: TcpReorder,
    stream: StreamBuffer,
    last_stream_ms: Option<u64>,
    stats: ReassemblyStats,
}

impl FlowReassembler {
    pub fn new(config: ReassemblyConfig) -> Self {
        let stream = StreamBuffer::new(config.max_frame_len);
        Self {
            config,
            state: FlowState::Searching,
            fragments: FragmentCache::new(),
            reorder: TcpReorder::new(),
            stream,
            last_stream_ms: None,
            stats: ReassemblyStats::default(),
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn active_flow(&self) -> Option<FlowKey> {
        self.state.active_flow()
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }

    pub fn pending_fragments(&self) -> usize {
        self.fragments.len()
    }

    pub fn pending_segments(&self) -> usize {
        self.reorder.pending()
    }

    /// Feed one link-layer frame captured at `now_ms`.
    pub fn process_packet(&mut self, linktype: Linktype, data: &[u8], now_ms: u64) -> Vec<FlowEvent> {
        self.stats.packets += 1;
        let mut events = Vec::new();

        let ip = match parse_ipv4_packet(linktype, data) {
            Ok(Some(ip)) if ip.is_tcp() => ip,
            Ok(_) => {
                self.stats.ignored_packets += 1;
                return events;
            }
            Err(err) => {
                self.stats.malformed_packets += 1;
                tracing::trace!(error = %err, "dropping malformed frame");
                return events;
            }
        };

        let reassembled;
        let ip_payload = if ip.is_fragment() {
            self.stats.fragments_buffered += 1;
            let key = FragmentKey {
                id: ip.identification,
                src: ip.src,
                dst: ip.dst,
                protocol: ip.protocol,
            };
            match self
                .fragments
                .push(key, ip.fragment_offset, ip.more_fragments, ip.payload, now_ms)
            {
                Some(payload) => {
                    self.stats.fragments_reassembled += 1;
                    reassembled = payload;
                    reassembled.as_slice()
                }
                None => return events,
            }
        } else {
            ip.payload
        };

        let tcp = match parse_tcp_segment(ip_payload) {
            Ok(tcp) => tcp,
            Err(err) => {
                self.stats.malformed_packets += 1;
                tracing::trace!(error = %err, "dropping malformed segment");
                return events;
            }
        };
        if tcp.payload.is_empty() {
            return events;
        }

        let flow = FlowKey {
            src: ip.src,
            src_port: tcp.src_port,
            dst: ip.dst,
            dst_port: tcp.dst_port,
        };
        self.handle_segment(flow, tcp.seq, tcp.payload, now_ms, &mut events);
        events
    }

    fn handle_segment(
        &mut self,
        flow: FlowKey,
        seq: u32,
        payload: &[u8],
        now_ms: u64,
        events: &mut Vec<FlowEvent>,
    ) {
        if self.state != FlowState::Locked(flow) {
            if let Some(signature) = identify_server(payload) {
                self.lock(flow, signature, seq.wrapping_add(payload.len() as u32), now_ms);
                events.push(FlowEvent::ServerChanged { flow, signature });
            }
            return;
        }

        if self.reorder.next_seq().is_none() {
            if !self.plausible_stream_start(payload) {
                return;
            }
            tracing::debug!(flow = %flow, seq, "resynchronizing stream");
            self.reorder.seed(seq);
        }

        if self.reorder.push(seq, payload) == Disposition::Duplicate {
            self.stats.duplicate_segments += 1;
        }
        let merged = self.reorder.drain();
        if !merged.is_empty() {
            self.stats.bytes_merged += merged.len() as u64;
            self.last_stream_ms = Some(now_ms);
            self.stream.extend(&merged);
        }

        loop {
            match self.stream.next_frame() {
                Ok(Some(frame)) => {
                    self.stats.frames_emitted += 1;
                    events.push(FlowEvent::Frame(frame));
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::error!(
                        flow = %flow,
                        error = %err,
                        buffered = self.stream.len(),
                        "corrupt frame length, resetting stream"
                    );
                    self.stats.corrupt_length_resets += 1;
                    self.reorder.reset();
                    self.stream.clear();
                    break;
                }
            }
        }
    }

    /// Payload looks like it starts at a frame boundary.
    fn plausible_stream_start(&self, payload: &[u8]) -> bool {
        payload.len() > frames::LENGTH_PREFIX_LEN
            && u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]])
                < self.config.max_frame_len
    }

    fn lock(&mut self, flow: FlowKey, signature: ServerSignature, next_seq: u32, now_ms: u64) {
        self.state = FlowState::Locked(flow);
        self.reorder.reset();
        self.reorder.seed(next_seq);
        self.stream.clear();
        self.last_stream_ms = Some(now_ms);
        self.stats.server_changes += 1;
        tracing::info!(flow = %flow, signature = ?signature, "scene server identified");
    }

    /// Evict stale fragment groups and release a flow that went quiet.
    ///
    /// Returns the released flow, if the watchdog fired.
    pub fn expire(&mut self, now_ms: u64) -> Option<FlowKey> {
        let evicted = self.fragments.evict(now_ms, self.config.fragment_timeout_ms);
        if evicted > 0 {
            self.stats.fragments_expired += evicted as u64;
            tracing::debug!(evicted, "expired IP fragment groups");
        }

        let flow = self.state.active_flow()?;
        let last = self.last_stream_ms?;
        if now_ms.saturating_sub(last) <= self.config.flow_idle_timeout_ms {
            return None;
        }
        tracing::warn!(
            flow = %flow,
            next_seq = ?self.reorder.next_seq(),
            "no stream data from server, searching again"
        );
        self.stats.watchdog_resets += 1;
        self.release();
        Some(flow)
    }

    fn release(&mut self) {
        self.state = FlowState::Searching;
        self.reorder.reset();
        self.stream.clear();
        self.last_stream_ms = None;
    }

    /// Forget everything except the counters.
    pub fn reset(&mut self) {
        self.release();
        self.fragments.clear();
    }
}
