//! Capture-file source for legacy PCAP and PCAPNG.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::PcapFileSource;
