use super::layout;

/// Bounded view over a TCP payload.
pub struct SceneReader<'a> {
    payload: &'a [u8],
}

impl<'a> SceneReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn read_u8(&self, offset: usize) -> Option<u8> {
        self.payload.get(offset).copied()
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Option<&'a [u8]> {
        self.payload.get(range)
    }

    /// Sub-packets following the small-packet header, if any.
    pub fn sub_packets(&self) -> SubPackets<'a> {
        SubPackets {
            rest: self
                .payload
                .get(layout::SMALL_PACKET_HEADER_LEN..)
                .unwrap_or_default(),
        }
    }
}

/// Walks 4-byte big-endian length-prefixed sub-packets, yielding each body.
///
/// Iteration ends on an implausible length (`<= 4` or above
/// [`layout::MAX_SUBPACKET_LEN`]) or on a truncated sub-packet.
pub struct SubPackets<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for SubPackets<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let prefix = self.rest.get(..layout::LENGTH_PREFIX_LEN)?;
        let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        if len as usize <= layout::LENGTH_PREFIX_LEN || len > layout::MAX_SUBPACKET_LEN {
            self.rest = &[];
            return None;
        }
        let Some(body) = self.rest.get(layout::LENGTH_PREFIX_LEN..len as usize) else {
            self.rest = &[];
            return None;
        };
        self.rest = &self.rest[len as usize..];
        Some(body)
    }
}
