//! Live capture through libpcap.

use std::sync::atomic::{AtomicBool, Ordering};

use pcap::{Active, Capture, Device};
use pcap_parser::Linktype;

use crate::config::CaptureConfig;
use crate::ingest::CaptureHandle;

use super::{PacketEvent, SourceError};

impl From<pcap::Error> for SourceError {
    fn from(err: pcap::Error) -> Self {
        SourceError::Capture(err.to_string())
    }
}

/// Name and description of a capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub description: Option<String>,
}

pub fn list_interfaces() -> Result<Vec<InterfaceInfo>, SourceError> {
    Ok(Device::list()?
        .into_iter()
        .map(|device| InterfaceInfo {
            name: device.name,
            description: device.desc,
        })
        .collect())
}

/// An open capture handle on one interface.
pub struct LiveCapture {
    cap: Capture<Active>,
    linktype: Linktype,
    interface: String,
}

impl LiveCapture {
    pub fn open(config: &CaptureConfig) -> Result<Self, SourceError> {
        let device = match &config.interface {
            Some(name) => Device::list()?
                .into_iter()
                .find(|d| d.name == *name)
                .ok_or_else(|| SourceError::NoDevice(format!("interface '{name}' not found")))?,
            None => Device::lookup()?
                .ok_or_else(|| SourceError::NoDevice("no default device found".into()))?,
        };
        let interface = device.name.clone();

        let mut cap = Capture::from_device(device)?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.read_timeout_ms)
            .open()?;
        if !config.filter.is_empty() {
            cap.filter(&config.filter, true)?;
        }
        let linktype = Linktype(cap.get_datalink().0);

        tracing::info!(
            interface = %interface,
            promiscuous = config.promiscuous,
            snaplen = config.snaplen,
            filter = %config.filter,
            "capture started"
        );
        Ok(Self {
            cap,
            linktype,
            interface,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Next frame, or `None` when the read timeout expired.
    pub fn next_event(&mut self) -> Result<Option<PacketEvent>, SourceError> {
        match self.cap.next_packet() {
            Ok(packet) => {
                let ts = packet.header.ts.tv_sec as f64 + packet.header.ts.tv_usec as f64 * 1e-6;
                Ok(Some(PacketEvent::new(
                    Some(ts),
                    self.linktype,
                    packet.data.to_vec(),
                )))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Feed frames into the ingestion queue until `running` is cleared.
    pub fn pump(&mut self, handle: &CaptureHandle, running: &AtomicBool) -> Result<(), SourceError> {
        while running.load(Ordering::SeqCst) {
            if let Some(event) = self.next_event()? {
                handle.offer(event);
            }
        }
        tracing::info!(interface = %self.interface, "capture stopped");
        Ok(())
    }
}
