mod common;

use common::{
    CLIENT, CLIENT_PORT, SERVER, SERVER_PORT, app_frame, fragmented_server_segment, login_return,
    scene_batch, server_segment, tcp_frame,
};
use dpsshark_core::config::ReassemblyConfig;
use dpsshark_core::protocols::scene::ServerSignature;
use dpsshark_core::reassembly::FlowState;
use dpsshark_core::{FlowEvent, FlowReassembler};
use pcap_parser::Linktype;

const ISN: u32 = 40_000;

fn frames(events: Vec<FlowEvent>) -> Vec<Vec<u8>> {
    events
        .into_iter()
        .filter_map(|event| match event {
            FlowEvent::Frame(frame) => Some(frame),
            FlowEvent::ServerChanged { .. } => None,
        })
        .collect()
}

/// Reassembler locked on the default server flow; the stream starts at the
/// returned sequence number.
fn locked() -> (FlowReassembler, u32) {
    let mut reassembler = FlowReassembler::new(ReassemblyConfig::default());
    let login = login_return();
    let events = reassembler.process_packet(Linktype::ETHERNET, &server_segment(ISN, &login), 0);
    assert_eq!(events.len(), 1);
    (reassembler, ISN + login.len() as u32)
}

#[test]
fn scene_batch_locks_onto_sender() {
    let mut reassembler = FlowReassembler::new(ReassemblyConfig::default());
    let events = reassembler.process_packet(Linktype::ETHERNET, &server_segment(7, &scene_batch()), 0);
    match events.as_slice() {
        [FlowEvent::ServerChanged { flow, signature }] => {
            assert_eq!(*signature, ServerSignature::SceneNotify);
            assert_eq!(flow.to_string(), "172.16.0.9:5003 -> 192.168.1.20:51000");
        }
        other => panic!("unexpected events: {other:?}"),
    }
    assert!(matches!(reassembler.state(), FlowState::Locked(_)));
}

#[test]
fn out_of_order_segments_yield_frames_in_stream_order() {
    let (mut reassembler, base) = locked();
    let a = app_frame(&[0xA; 96]);
    let b = app_frame(&[0xB; 46]);
    let c = app_frame(&[0xC; 26]);

    let mut out = Vec::new();
    out.extend(frames(reassembler.process_packet(
        Linktype::ETHERNET,
        &server_segment(base + 100, &b),
        1,
    )));
    out.extend(frames(reassembler.process_packet(
        Linktype::ETHERNET,
        &server_segment(base + 150, &c),
        2,
    )));
    assert!(out.is_empty());
    out.extend(frames(reassembler.process_packet(
        Linktype::ETHERNET,
        &server_segment(base, &a),
        3,
    )));

    assert_eq!(out, vec![a, b, c]);
    assert_eq!(reassembler.pending_segments(), 0);
}

#[test]
fn duplicate_segments_are_emitted_once() {
    let (mut reassembler, base) = locked();
    let a = app_frame(&[1; 10]);
    let b = app_frame(&[2; 10]);
    let first = frames(reassembler.process_packet(Linktype::ETHERNET, &server_segment(base, &a), 1));
    let again = frames(reassembler.process_packet(Linktype::ETHERNET, &server_segment(base, &a), 2));
    let next = frames(reassembler.process_packet(
        Linktype::ETHERNET,
        &server_segment(base + a.len() as u32, &b),
        3,
    ));

    assert_eq!(first, vec![a]);
    assert!(again.is_empty());
    assert_eq!(next, vec![b]);
    assert_eq!(reassembler.stats().duplicate_segments, 1);
}

#[test]
fn frame_split_across_segments_waits_for_all_bytes() {
    let (mut reassembler, base) = locked();
    let frame = app_frame(&(0..60u8).collect::<Vec<_>>());
    let (head, rest) = frame.split_at(3);
    let (middle, tail) = rest.split_at(30);

    assert!(frames(reassembler.process_packet(Linktype::ETHERNET, &server_segment(base, head), 1)).is_empty());
    assert!(
        frames(reassembler.process_packet(Linktype::ETHERNET, &server_segment(base + 3, middle), 2))
            .is_empty()
    );
    let out = frames(reassembler.process_packet(
        Linktype::ETHERNET,
        &server_segment(base + 33, tail),
        3,
    ));
    assert_eq!(out, vec![frame]);
}

#[test]
fn fragments_rebuild_segment_regardless_of_order() {
    let (mut reassembler, base) = locked();
    let frame = app_frame(&[0x5A; 151]);
    let mut pieces = fragmented_server_segment(99, base, &frame, &[104, 152]);
    let last = pieces.pop().unwrap();
    pieces.reverse();

    for piece in &pieces {
        assert!(reassembler.process_packet(Linktype::ETHERNET, piece, 1).is_empty());
    }
    assert_eq!(reassembler.pending_fragments(), 1);
    let out = frames(reassembler.process_packet(Linktype::ETHERNET, &last, 2));

    assert_eq!(out, vec![frame]);
    let stats = reassembler.stats();
    assert_eq!(stats.fragments_buffered, 3);
    assert_eq!(stats.fragments_reassembled, 1);
    assert_eq!(reassembler.pending_fragments(), 0);
}

#[test]
fn stale_fragments_are_evicted() {
    let (mut reassembler, base) = locked();
    let pieces = fragmented_server_segment(5, base, &app_frame(&[1; 40]), &[16]);
    reassembler.process_packet(Linktype::ETHERNET, &pieces[0], 1_000);
    reassembler.process_packet(Linktype::ETHERNET, &server_segment(base, &app_frame(&[0])), 20_000);

    reassembler.expire(31_001);
    assert_eq!(reassembler.pending_fragments(), 0);
    assert_eq!(reassembler.stats().fragments_expired, 1);
    assert!(reassembler.active_flow().is_some());
}

#[test]
fn other_flow_signature_switches_server() {
    let (mut reassembler, base) = locked();
    let other = [203, 0, 113, 5];

    let events = reassembler.process_packet(
        Linktype::ETHERNET,
        &tcp_frame(other, CLIENT, 6000, CLIENT_PORT, 900, &login_return()),
        5,
    );
    let new_flow = match events.as_slice() {
        [FlowEvent::ServerChanged { flow, .. }] => *flow,
        other => panic!("unexpected events: {other:?}"),
    };
    assert_eq!(reassembler.active_flow(), Some(new_flow));

    let stale = reassembler.process_packet(
        Linktype::ETHERNET,
        &server_segment(base, &app_frame(&[1; 4])),
        6,
    );
    assert!(stale.is_empty());

    let fresh = app_frame(&[2; 4]);
    let out = frames(reassembler.process_packet(
        Linktype::ETHERNET,
        &tcp_frame(other, CLIENT, 6000, CLIENT_PORT, 900 + 0x62, &fresh),
        7,
    ));
    assert_eq!(out, vec![fresh]);
    assert_eq!(reassembler.stats().server_changes, 2);
}

#[test]
fn server_switch_discards_partial_stream_of_old_flow() {
    let (mut reassembler, base) = locked();
    let half = app_frame(&[3; 40]);
    let head = &half[..20];
    let events = reassembler.process_packet(Linktype::ETHERNET, &server_segment(base, head), 1);
    assert!(events.is_empty());
    let future = app_frame(&[4; 12]);
    let events = reassembler.process_packet(
        Linktype::ETHERNET,
        &server_segment(base + 500, &future),
        2,
    );
    assert!(events.is_empty());
    assert_eq!(reassembler.pending_segments(), 1);

    let other = [203, 0, 113, 6];
    let events = reassembler.process_packet(
        Linktype::ETHERNET,
        &tcp_frame(other, CLIENT, 6001, CLIENT_PORT, 7_000, &login_return()),
        3,
    );
    assert!(matches!(events.as_slice(), [FlowEvent::ServerChanged { .. }]));
    assert_eq!(reassembler.pending_segments(), 0);

    let fresh = app_frame(&[5; 6]);
    let out = frames(reassembler.process_packet(
        Linktype::ETHERNET,
        &tcp_frame(other, CLIENT, 6001, CLIENT_PORT, 7_000 + 0x62, &fresh),
        4,
    ));
    assert_eq!(out, vec![fresh]);
}

#[test]
fn client_to_server_direction_is_not_reassembled() {
    let (mut reassembler, base) = locked();
    let events = reassembler.process_packet(
        Linktype::ETHERNET,
        &tcp_frame(CLIENT, SERVER, CLIENT_PORT, SERVER_PORT, base, &app_frame(&[9; 8])),
        1,
    );
    assert!(events.is_empty());
}

#[test]
fn reset_returns_to_searching() {
    let (mut reassembler, _) = locked();
    reassembler.reset();
    assert_eq!(reassembler.state(), FlowState::Searching);
    assert_eq!(reassembler.stats().server_changes, 1);
}
