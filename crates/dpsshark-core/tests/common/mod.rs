#![allow(dead_code)]

use std::fs;
use std::path::Path;

use etherparse::PacketBuilder;

pub const SERVER: [u8; 4] = [172, 16, 0, 9];
pub const CLIENT: [u8; 4] = [192, 168, 1, 20];
pub const SERVER_PORT: u16 = 5003;
pub const CLIENT_PORT: u16 = 51000;

pub fn tcp_frame(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16, seq: u32, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
        .ipv4(src, dst, 64)
        .tcp(sport, dport, seq, 4096);
    let mut packet = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut packet, payload).expect("build tcp frame");
    packet
}

/// Server-to-client segment on the default flow.
pub fn server_segment(seq: u32, payload: &[u8]) -> Vec<u8> {
    tcp_frame(SERVER, CLIENT, SERVER_PORT, CLIENT_PORT, seq, payload)
}

pub fn login_return() -> Vec<u8> {
    let mut payload = vec![0x11u8; 0x62];
    payload[..10].copy_from_slice(&[0x00, 0x00, 0x00, 0x62, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    payload[14..20].copy_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x0a, 0x4e]);
    payload
}

pub fn scene_batch() -> Vec<u8> {
    let mut body = vec![0u8; 12];
    body[5..11].copy_from_slice(&[0x00, 0x63, 0x33, 0x53, 0x42, 0x00]);
    let mut payload = vec![0u8; 10];
    payload.extend_from_slice(&((body.len() + 4) as u32).to_be_bytes());
    payload.extend_from_slice(&body);
    payload
}

/// Length-prefixed application frame.
pub fn app_frame(body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 4) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(body);
    out
}

/// Split one server segment into Ethernet-framed IPv4 fragments.
///
/// `cuts` are byte offsets into the IP payload; all but the last must be
/// multiples of 8.
pub fn fragmented_server_segment(id: u16, seq: u32, payload: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let builder = PacketBuilder::ipv4(SERVER, CLIENT, 64).tcp(SERVER_PORT, CLIENT_PORT, seq, 4096);
    let mut packet = Vec::new();
    builder.write(&mut packet, payload).expect("build ip packet");
    let ip_payload = &packet[20..];

    let mut bounds = vec![0];
    bounds.extend_from_slice(cuts);
    bounds.push(ip_payload.len());
    bounds
        .windows(2)
        .map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            let more = end != ip_payload.len();
            ethernet_ipv4(id, start, more, &ip_payload[start..end])
        })
        .collect()
}

fn ethernet_ipv4(id: u16, offset: usize, more_fragments: bool, data: &[u8]) -> Vec<u8> {
    let mut frame = vec![7, 8, 9, 10, 11, 12, 1, 2, 3, 4, 5, 6, 0x08, 0x00];
    let total_len = (20 + data.len()) as u16;
    let flags_offset = ((more_fragments as u16) << 13) | (offset / 8) as u16;
    frame.extend_from_slice(&[0x45, 0x00]);
    frame.extend_from_slice(&total_len.to_be_bytes());
    frame.extend_from_slice(&id.to_be_bytes());
    frame.extend_from_slice(&flags_offset.to_be_bytes());
    frame.extend_from_slice(&[64, 6, 0, 0]);
    frame.extend_from_slice(&SERVER);
    frame.extend_from_slice(&CLIENT);
    frame.extend_from_slice(data);
    frame
}

/// Write a legacy little-endian pcap file with an Ethernet linktype.
pub fn write_pcap(path: &Path, records: &[(u32, u32, Vec<u8>)]) {
    let mut out = Vec::new();
    out.extend_from_slice(&[0xd4, 0xc3, 0xb2, 0xa1]);
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&65535u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    for (sec, usec, data) in records {
        out.extend_from_slice(&sec.to_le_bytes());
        out.extend_from_slice(&usec.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
    }
    fs::write(path, out).expect("write pcap");
}
