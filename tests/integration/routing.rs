//! Scenario 5 (unknown-source prompt) and scenario 6 (wrong-destination
//! drop) from the spec's end-to-end scenarios.

use std::time::Duration;

use h42_can_bridge::addressing::{self, MessageType};

use crate::support::Harness;

#[test]
fn unknown_source_triggers_a_reannounce_prompt() {
    let harness = Harness::new();

    harness.send_isotp_frame(7, addressing::ADDRESS_MASTER, vec![0x03, b'h', b'i', 0]);

    let prompt = harness
        .bus
        .node_recv(Duration::from_secs(1))
        .expect("bridge should prompt the unknown node to re-announce");
    let id = prompt.id.value();
    assert_eq!(id, addressing::make_can_id(MessageType::AddressRequest, 0, 7));
    assert_eq!(prompt.dlc(), 0);

    // The original ISOTP frame must not have been delivered anywhere; the
    // server-wide output queue should have nothing queued for it.
    assert!(harness.bus.node_recv(Duration::from_millis(100)).is_none());
}

#[test]
fn frame_addressed_to_a_peer_other_than_master_is_dropped() {
    let harness = Harness::new();
    let identity = h42_can_bridge::identity::NodeIdentity::new([1, 2, 3, 4, 5, 6]);
    let (status, addr) = harness.announce(identity);
    assert_eq!((status, addr), (0, 1));

    // src=1 is registered, but dst=2 is not the master; the frame must be
    // dropped silently with no response on the bus.
    harness.send_isotp_frame(1, 2, vec![0x03, 1, 2, 3]);

    assert!(harness.bus.node_recv(Duration::from_millis(200)).is_none());
}
