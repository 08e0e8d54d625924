use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;

/// Direction-sensitive TCP 4-tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FlowKey {
    pub src: Ipv4Addr,
    pub src_port: u16,
    pub dst: Ipv4Addr,
    pub dst_port: u16,
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.src, self.src_port, self.dst, self.dst_port
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// No server known; every payload is checked for signatures.
    Searching,
    /// Reassembling the given server-to-client flow.
    Locked(FlowKey),
}

impl FlowState {
    pub fn active_flow(&self) -> Option<FlowKey> {
        match self {
            FlowState::Searching => None,
            FlowState::Locked(flow) => Some(*flow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FlowKey, FlowState};
    use std::net::Ipv4Addr;

    #[test]
    fn display_matches_arrow_notation() {
        let flow = FlowKey {
            src: Ipv4Addr::new(1, 2, 3, 4),
            src_port: 5000,
            dst: Ipv4Addr::new(10, 0, 0, 2),
            dst_port: 61000,
        };
        assert_eq!(flow.to_string(), "1.2.3.4:5000 -> 10.0.0.2:61000");
        assert_eq!(FlowState::Locked(flow).active_flow(), Some(flow));
        assert_eq!(FlowState::Searching.active_flow(), None);
    }
}
