//! Link, IPv4 and TCP decoding for captured frames.
//!
//! Only IPv4 is handled; everything else is reported as "not ours" with
//! `Ok(None)` rather than an error.

pub mod error;
pub mod parser;

pub use error::NetError;
pub use parser::{Ipv4Packet, TcpSegment, parse_ipv4_packet, parse_tcp_segment};
