//! Packet sources: capture files and, with the `live` feature, network
//! interfaces.

#[cfg(feature = "live")]
pub mod live;
mod file;

pub use file::PcapFileSource;

use pcap_parser::Linktype;
use thiserror::Error;

use crate::clock::seconds_to_millis;

/// One captured link-layer frame.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    /// Capture timestamp in seconds since the Unix epoch.
    pub ts: Option<f64>,
    pub linktype: Linktype,
    pub data: Vec<u8>,
}

impl PacketEvent {
    pub fn new(ts: Option<f64>, linktype: Linktype, data: Vec<u8>) -> Self {
        Self { ts, linktype, data }
    }

    /// Capture timestamp in milliseconds, when the source provided one.
    pub fn ts_ms(&self) -> Option<u64> {
        self.ts.map(seconds_to_millis)
    }
}

pub trait PacketSource {
    /// Next frame, or `None` once the source is exhausted.
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError>;
}

/// Frames held in memory, yielded in order.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    events: std::collections::VecDeque<PacketEvent>,
}

impl MemorySource {
    pub fn new(events: impl IntoIterator<Item = PacketEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }
}

impl PacketSource for MemorySource {
    fn next_packet(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        Ok(self.events.pop_front())
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error: {0}")]
    Pcap(String),
    #[error("no capture device: {0}")]
    NoDevice(String),
    #[error("capture error: {0}")]
    Capture(String),
}

impl From<file::error::PcapSourceError> for SourceError {
    fn from(value: file::error::PcapSourceError) -> Self {
        match value {
            file::error::PcapSourceError::Io(err) => SourceError::Io(err),
            file::error::PcapSourceError::Pcap {
                format,
                stage,
                message,
            } => SourceError::Pcap(format!("{format} {stage}: {message}")),
        }
    }
}
