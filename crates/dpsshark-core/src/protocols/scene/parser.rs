use serde::{Deserialize, Serialize};

use super::layout;
use super::reader::SceneReader;

/// Which heuristic recognized the scene server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerSignature {
    /// A small-packet batch containing the scene marker.
    SceneNotify,
    /// The fixed-size login return packet.
    LoginReturn,
}

/// Check a TCP payload for either scene-server signature.
///
/// # Examples
/// ```
/// use dpsshark_core::protocols::scene::{ServerSignature, identify_server};
///
/// let mut payload = vec![0u8; 0x62];
/// payload[..10].copy_from_slice(&[0, 0, 0, 0x62, 0, 3, 0, 0, 0, 1]);
/// payload[18..20].copy_from_slice(&[0x0a, 0x4e]);
/// assert_eq!(identify_server(&payload), Some(ServerSignature::LoginReturn));
/// assert_eq!(identify_server(&[1, 2, 3]), None);
/// ```
pub fn identify_server(payload: &[u8]) -> Option<ServerSignature> {
    let reader = SceneReader::new(payload);
    if is_scene_batch(&reader) {
        return Some(ServerSignature::SceneNotify);
    }
    if is_login_return(&reader) {
        return Some(ServerSignature::LoginReturn);
    }
    None
}

fn is_scene_batch(reader: &SceneReader<'_>) -> bool {
    if reader.read_u8(layout::SMALL_PACKET_FLAG_OFFSET) != Some(0) {
        return false;
    }
    reader.sub_packets().any(|body| {
        body.get(layout::SCENE_MARKER_RANGE) == Some(&layout::SCENE_MARKER[..])
    })
}

fn is_login_return(reader: &SceneReader<'_>) -> bool {
    reader.len() == layout::LOGIN_RETURN_LEN
        && reader.read_slice(layout::LOGIN_RETURN_HEAD_RANGE) == Some(&layout::LOGIN_RETURN_HEAD[..])
        && reader.read_slice(layout::LOGIN_RETURN_TAIL_RANGE) == Some(&layout::LOGIN_RETURN_TAIL[..])
}

#[cfg(test)]
mod tests {
    use super::{ServerSignature, identify_server};
    use crate::protocols::scene::layout;

    fn scene_batch() -> Vec<u8> {
        let mut body = vec![0u8; 16];
        body[layout::SCENE_MARKER_RANGE].copy_from_slice(&layout::SCENE_MARKER);
        let mut payload = vec![0u8; layout::SMALL_PACKET_HEADER_LEN];
        payload.extend_from_slice(&8u32.to_be_bytes());
        payload.extend_from_slice(&[7, 7, 7, 7]);
        payload.extend_from_slice(&((body.len() + 4) as u32).to_be_bytes());
        payload.extend_from_slice(&body);
        payload
    }

    fn login_return() -> Vec<u8> {
        let mut payload = vec![0xEEu8; layout::LOGIN_RETURN_LEN];
        payload[layout::LOGIN_RETURN_HEAD_RANGE].copy_from_slice(&layout::LOGIN_RETURN_HEAD);
        payload[layout::LOGIN_RETURN_TAIL_RANGE].copy_from_slice(&layout::LOGIN_RETURN_TAIL);
        payload
    }

    #[test]
    fn scene_marker_in_later_sub_packet() {
        assert_eq!(identify_server(&scene_batch()), Some(ServerSignature::SceneNotify));
    }

    #[test]
    fn scene_marker_requires_zero_flag_byte() {
        let mut payload = scene_batch();
        payload[layout::SMALL_PACKET_FLAG_OFFSET] = 1;
        assert_eq!(identify_server(&payload), None);
    }

    #[test]
    fn scene_marker_after_bad_length_is_ignored() {
        let mut payload = vec![0u8; layout::SMALL_PACKET_HEADER_LEN];
        payload.extend_from_slice(&2u32.to_be_bytes());
        payload.extend_from_slice(&scene_batch()[layout::SMALL_PACKET_HEADER_LEN..]);
        assert_eq!(identify_server(&payload), None);
    }

    #[test]
    fn login_return_matches_with_any_session_bytes() {
        let mut payload = login_return();
        payload[10..14].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(identify_server(&payload), Some(ServerSignature::LoginReturn));
    }

    #[test]
    fn login_return_requires_exact_length() {
        let mut payload = login_return();
        payload.push(0);
        assert_eq!(identify_server(&payload), None);
    }

    #[test]
    fn login_return_requires_tail() {
        let mut payload = login_return();
        payload[19] = 0;
        assert_eq!(identify_server(&payload), None);
    }
}
