use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Identifies the fragments of one IPv4 datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    pub id: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
}

#[derive(Debug)]
struct FragmentGroup {
    parts: Vec<(usize, Vec<u8>)>,
    last_seen_ms: u64,
}

/// Pending IPv4 fragment groups.
///
/// A datagram is rebuilt when its final fragment (more-fragments clear)
/// arrives. The result spans `max(offset + len)` over the parts seen so far;
/// holes are left zero-filled. Groups that never complete are dropped by
/// [`FragmentCache::evict`].
#[derive(Debug, Default)]
pub struct FragmentCache {
    groups: HashMap<FragmentKey, FragmentGroup>,
}

impl FragmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one fragment; returns the rebuilt payload once `more_fragments` is
    /// clear.
    pub fn push(
        &mut self,
        key: FragmentKey,
        offset: usize,
        more_fragments: bool,
        payload: &[u8],
        now_ms: u64,
    ) -> Option<Vec<u8>> {
        let group = self.groups.entry(key).or_insert_with(|| FragmentGroup {
            parts: Vec::new(),
            last_seen_ms: now_ms,
        });
        group.parts.push((offset, payload.to_vec()));
        group.last_seen_ms = now_ms;

        if more_fragments {
            return None;
        }

        let group = self.groups.remove(&key)?;
        let total = group
            .parts
            .iter()
            .map(|(offset, data)| offset + data.len())
            .max()
            .unwrap_or(0);
        let mut assembled = vec![0u8; total];
        for (offset, data) in &group.parts {
            assembled[*offset..offset + data.len()].copy_from_slice(data);
        }
        Some(assembled)
    }

    /// Drop groups idle for longer than `timeout_ms`; returns how many.
    pub fn evict(&mut self, now_ms: u64, timeout_ms: u64) -> usize {
        let before = self.groups.len();
        self.groups
            .retain(|_, group| now_ms.saturating_sub(group.last_seen_ms) <= timeout_ms);
        before - self.groups.len()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}
