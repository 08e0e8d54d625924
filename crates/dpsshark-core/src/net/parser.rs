use std::net::Ipv4Addr;

use etherparse::{NetSlice, SlicedPacket, TcpHeaderSlice};
use pcap_parser::Linktype;

use super::error::NetError;

/// IP protocol number of TCP.
pub const IPPROTO_TCP: u8 = 6;

/// IPv4 datagram, possibly a single fragment of a larger one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Packet<'a> {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub identification: u16,
    pub protocol: u8,
    pub more_fragments: bool,
    /// Fragment offset in bytes.
    pub fragment_offset: usize,
    pub payload: &'a [u8],
}

impl Ipv4Packet<'_> {
    pub fn is_fragment(&self) -> bool {
        self.more_fragments || self.fragment_offset != 0
    }

    pub fn is_tcp(&self) -> bool {
        self.protocol == IPPROTO_TCP
    }
}

/// TCP header fields needed for stream reassembly, plus the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpSegment<'a> {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub payload: &'a [u8],
}

/// Parse an IPv4 datagram from a link-layer frame.
///
/// Returns `Ok(None)` for unsupported link types and non-IPv4 traffic.
pub fn parse_ipv4_packet(
    linktype: Linktype,
    data: &[u8],
) -> Result<Option<Ipv4Packet<'_>>, NetError> {
    let sliced = match linktype {
        Linktype::ETHERNET => {
            SlicedPacket::from_ethernet(data).map_err(|e| NetError::Slice(e.to_string()))?
        }
        Linktype::RAW | Linktype::IPV4 => {
            SlicedPacket::from_ip(data).map_err(|e| NetError::Slice(e.to_string()))?
        }
        _ => return Ok(None),
    };

    let net = sliced.net.ok_or(NetError::MissingNetworkLayer)?;
    let (src, dst, identification, protocol, more_fragments, fragment_offset) = match net {
        NetSlice::Ipv4(ref ipv4) => {
            let header = ipv4.header();
            (
                header.source_addr(),
                header.destination_addr(),
                header.identification(),
                header.protocol().0,
                header.more_fragments(),
                usize::from(header.fragments_offset().value()) * 8,
            )
        }
        _ => return Ok(None),
    };
    let ip_payload = net.ip_payload_ref().ok_or(NetError::MissingIpPayload)?;

    Ok(Some(Ipv4Packet {
        src,
        dst,
        identification,
        protocol,
        more_fragments,
        fragment_offset,
        payload: ip_payload.payload,
    }))
}

/// Parse a TCP segment from a complete (unfragmented or reassembled) IP payload.
pub fn parse_tcp_segment(data: &[u8]) -> Result<TcpSegment<'_>, NetError> {
    let header = TcpHeaderSlice::from_slice(data).map_err(|e| NetError::TcpHeader(e.to_string()))?;
    let header_len = header.slice().len();
    Ok(TcpSegment {
        src_port: header.source_port(),
        dst_port: header.destination_port(),
        seq: header.sequence_number(),
        payload: &data[header_len..],
    })
}
