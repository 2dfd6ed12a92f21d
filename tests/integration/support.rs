//! Shared scaffolding for the integration tests: a [`CanServer`] wired to a
//! [`LoopbackBus`], plus helpers for driving the address-request handshake
//! a real node would perform before sending ISO-TP traffic.

use std::sync::Arc;
use std::time::Duration;

use h42_can_bridge::addressing::{self, MessageType};
use h42_can_bridge::can_frame::Frame;
use h42_can_bridge::identity::NodeIdentity;
use h42_can_bridge::server::CanServer;
use h42_can_bridge::transport::LoopbackBus;

pub const BUS_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Harness {
    pub bus: Arc<LoopbackBus>,
    pub server: CanServer,
}

impl Harness {
    pub fn new() -> Self {
        let bus = Arc::new(LoopbackBus::new());
        let server = CanServer::new(bus.clone());
        Self { bus, server }
    }

    /// Sends an ADDRESS_REQUEST frame for `identity` and returns the parsed
    /// `(status, new_addr)` from the bridge's response.
    pub fn announce(&self, identity: NodeIdentity) -> (u8, u8) {
        let id = addressing::make_can_id(MessageType::AddressRequest, 0, addressing::ADDRESS_MASTER);
        self.bus.node_send(Frame::new_extended(id, identity.as_bytes().to_vec()));
        let response = self
            .bus
            .node_recv(BUS_TIMEOUT)
            .expect("bridge should answer an address request");
        assert_eq!(response.dlc(), 8);
        let data = &response.data;
        (data[6], data[7])
    }

    /// Simulates a node at `src_addr` sending a raw ISO-TP frame to the master.
    pub fn send_isotp_frame(&self, src_addr: u8, dst_addr: u8, data: Vec<u8>) {
        let id = addressing::make_can_id(MessageType::Isotp, src_addr, dst_addr);
        self.bus.node_send(Frame::new_extended(id, data));
    }
}
