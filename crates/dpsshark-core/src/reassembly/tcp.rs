use std::collections::HashMap;

/// Whether a pushed segment was kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Cached,
    /// Already consumed or already cached; the cached copy is replaced.
    Duplicate,
}

/// Sequence-ordered merge of one TCP direction.
///
/// Sequence numbers wrap at 2^32. A segment strictly behind `next_seq` is
/// dropped; anything else waits in the cache until the stream reaches it.
#[derive(Debug, Default)]
pub struct TcpReorder {
    next_seq: Option<u32>,
    cache: HashMap<u32, Vec<u8>>,
}

/// `seq` is at or after `next` in wrapping sequence space.
pub fn seq_not_behind(next: u32, seq: u32) -> bool {
    (next.wrapping_sub(seq) as i32) <= 0
}

impl TcpReorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_seq(&self) -> Option<u32> {
        self.next_seq
    }

    pub fn seed(&mut self, seq: u32) {
        self.next_seq = Some(seq);
    }

    pub fn pending(&self) -> usize {
        self.cache.len()
    }

    pub fn push(&mut self, seq: u32, payload: &[u8]) -> Disposition {
        if let Some(next) = self.next_seq {
            if !seq_not_behind(next, seq) {
                return Disposition::Duplicate;
            }
        }
        match self.cache.insert(seq, payload.to_vec()) {
            Some(_) => Disposition::Duplicate,
            None => Disposition::Cached,
        }
    }

    /// Remove and concatenate every segment contiguous with `next_seq`.
    pub fn drain(&mut self) -> Vec<u8> {
        let mut merged = Vec::new();
        let Some(mut next) = self.next_seq else {
            return merged;
        };
        while let Some(data) = self.cache.remove(&next) {
            next = next.wrapping_add(data.len() as u32);
            merged.extend_from_slice(&data);
        }
        self.next_seq = Some(next);
        merged
    }

    pub fn reset(&mut self) {
        self.next_seq = None;
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{Disposition, TcpReorder, seq_not_behind};

    #[test]
    fn wrapping_comparison() {
        assert!(seq_not_behind(10, 10));
        assert!(seq_not_behind(10, 11));
        assert!(!seq_not_behind(10, 9));
        assert!(seq_not_behind(u32::MAX - 1, 3));
        assert!(!seq_not_behind(3, u32::MAX - 1));
    }

    #[test]
    fn out_of_order_segments_merge_in_sequence() {
        let mut reorder = TcpReorder::new();
        reorder.seed(1000);
        reorder.push(1100, &[2; 50]);
        reorder.push(1150, &[3; 30]);
        assert!(reorder.drain().is_empty());

        reorder.push(1000, &[1; 100]);
        let merged = reorder.drain();
        assert_eq!(merged.len(), 180);
        assert_eq!(&merged[..100], &[1; 100][..]);
        assert_eq!(&merged[100..150], &[2; 50][..]);
        assert_eq!(reorder.next_seq(), Some(1180));
        assert_eq!(reorder.pending(), 0);
    }

    #[test]
    fn segments_behind_are_dropped() {
        let mut reorder = TcpReorder::new();
        reorder.seed(500);
        reorder.push(500, &[1; 10]);
        reorder.drain();
        assert_eq!(reorder.push(500, &[1; 10]), Disposition::Duplicate);
        assert!(reorder.drain().is_empty());
        assert_eq!(reorder.pending(), 0);
    }

    #[test]
    fn repeated_future_segment_is_a_duplicate() {
        let mut reorder = TcpReorder::new();
        reorder.seed(0);
        assert_eq!(reorder.push(10, &[1]), Disposition::Cached);
        assert_eq!(reorder.push(10, &[1]), Disposition::Duplicate);
        assert_eq!(reorder.pending(), 1);
    }

    #[test]
    fn merge_crosses_sequence_wrap() {
        let mut reorder = TcpReorder::new();
        let start = u32::MAX - 1;
        reorder.seed(start);
        reorder.push(0, &[2, 2]);
        reorder.push(start, &[1, 1]);
        assert_eq!(reorder.drain(), vec![1, 1, 2, 2]);
        assert_eq!(reorder.next_seq(), Some(2));
    }
}
