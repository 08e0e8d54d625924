/// Byte that must be zero for a payload to be a small-packet batch.
pub const SMALL_PACKET_FLAG_OFFSET: usize = 4;
/// Header skipped before the first sub-packet of a batch.
pub const SMALL_PACKET_HEADER_LEN: usize = 10;
/// Big-endian length prefix of every sub-packet (counts itself).
pub const LENGTH_PREFIX_LEN: usize = 4;
/// Sub-packet lengths above this are implausible and end the walk.
pub const MAX_SUBPACKET_LEN: u32 = 0x000F_FFFF;

/// Scene marker inside a sub-packet body (after its length prefix).
pub const SCENE_MARKER_RANGE: std::ops::Range<usize> = 5..11;
pub const SCENE_MARKER: [u8; 6] = [0x00, 0x63, 0x33, 0x53, 0x42, 0x00];

pub const LOGIN_RETURN_LEN: usize = 0x62;
pub const LOGIN_RETURN_HEAD_RANGE: std::ops::Range<usize> = 0..10;
pub const LOGIN_RETURN_HEAD: [u8; 10] = [0x00, 0x00, 0x00, 0x62, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01];
/// Bytes 10..14 vary per session and are not compared.
pub const LOGIN_RETURN_TAIL_RANGE: std::ops::Range<usize> = 14..20;
pub const LOGIN_RETURN_TAIL: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x0a, 0x4e];
