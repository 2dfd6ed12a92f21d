//! Scenario 4: a 2048-byte round trip through a node's ISO-TP session,
//! driven by a second [`SoftwareIsotp`] engine standing in for the peer
//! node on the other side of the loopback bus.

use std::thread;
use std::time::Duration;

use h42_can_bridge::addressing::{self, MessageType};
use h42_can_bridge::identity::NodeIdentity;
use h42_can_bridge::isotp::{IsotpParams, IsotpTransport, RxFn, SoftwareIsotp, TxFn};
use h42_can_bridge::packet::SendPacket;

use crate::support::Harness;

const TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds a peer-side ISO-TP engine that speaks for node `addr` over the
/// harness's loopback bus: it reads/writes raw CAN frame payloads exactly
/// as a real node's transceiver would.
fn peer_engine(harness: &Harness, addr: u8) -> SoftwareIsotp {
    let bus = harness.bus.clone();
    let rxfn: RxFn = Box::new(move |timeout| bus.node_recv(timeout).map(|f| f.data));

    let bus = harness.bus.clone();
    let txfn: TxFn = Box::new(move |data: &[u8]| {
        let id = addressing::make_can_id(MessageType::Isotp, addr, addressing::ADDRESS_MASTER);
        bus.node_send(h42_can_bridge::can_frame::Frame::new_extended(id, data.to_vec()));
    });

    let mut engine = SoftwareIsotp::new(rxfn, txfn, IsotpParams::default());
    engine.start();
    engine
}

#[test]
fn two_kilobyte_payload_round_trips_through_the_session() {
    let harness = Harness::new();
    let identity = NodeIdentity::new([9, 9, 9, 9, 9, 9]);
    let (status, addr) = harness.announce(identity);
    assert_eq!((status, addr), (0, 1));

    let peer = peer_engine(&harness, addr);

    let downlink = vec![b'X'; 2048];
    let send_data = downlink.clone();
    let server = &harness.server;
    thread::scope(|scope| {
        let handle = scope.spawn(|| {
            server
                .send_packet(SendPacket::new(addr, send_data).unwrap())
                .expect("send to a known node should succeed");
        });

        let received = peer.recv(TRANSFER_TIMEOUT).expect("peer should reassemble the downlink");
        assert_eq!(received, downlink);
        handle.join().unwrap();
    });

    let uplink = vec![b'X'; 2048];
    peer.send(&uplink).expect("peer send should complete flow control");
    let packet = harness.server.recv_packet();
    assert_eq!(packet.src_addr, addr);
    assert_eq!(packet.data(), uplink.as_slice());
}
