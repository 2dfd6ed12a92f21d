//! The CAN demultiplexer: the single reader of the bus, responsible for the
//! addressing protocol and for routing ISO-TP frames to the right session.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::addressing::{self, MessageType, MsgHeader};
use crate::can_frame::Frame;
use crate::error::BridgeError;
use crate::packet::{RecvPacket, SendPacket};
use crate::registry::{Registry, MIN_ADDR};
use crate::transport::CanBus;

const BUS_RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// The public surface the TCP fan-out bridge (or any other consumer) drives:
/// a blocking uplink queue and a (possibly blocking) downlink call.
pub struct CanServer {
    bus: Arc<dyn CanBus>,
    registry: Arc<Registry>,
    recv_packet_rx: Mutex<Receiver<RecvPacket>>,
    _recv_worker: JoinHandle<()>,
}

impl CanServer {
    pub fn new(bus: Arc<dyn CanBus>) -> Self {
        let registry = Arc::new(Registry::new());
        let (recv_packet_tx, recv_packet_rx) = mpsc::channel();

        let worker_bus = bus.clone();
        let worker_registry = registry.clone();
        let worker_recv_tx = recv_packet_tx.clone();
        let recv_worker = thread::spawn(move || recv_worker(worker_bus, worker_registry, worker_recv_tx));

        Self {
            bus,
            registry,
            recv_packet_rx: Mutex::new(recv_packet_rx),
            _recv_worker: recv_worker,
        }
    }

    /// Blocks on the server-wide output queue for the next reassembled
    /// packet from any session.
    pub fn recv_packet(&self) -> RecvPacket {
        self.recv_packet_rx
            .lock()
            .unwrap()
            .recv()
            .expect("recv worker outlives the server")
    }

    /// Sends a packet to the session addressed by `packet.dst_addr`. May
    /// block while ISO-TP segments and flow-controls the transfer.
    pub fn send_packet(&self, packet: SendPacket) -> Result<(), BridgeError> {
        self.registry.send_to(packet.dst_addr, packet.data())
    }
}

fn recv_worker(bus: Arc<dyn CanBus>, registry: Arc<Registry>, recv_packet_tx: Sender<RecvPacket>) {
    loop {
        let frame = match bus.recv(BUS_RECV_TIMEOUT) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(err) => {
                warn!(%err, "error receiving CAN frame");
                continue;
            }
        };

        if frame.is_remote {
            continue;
        }
        if frame.is_error {
            warn!("error frame received");
            continue;
        }
        if !frame.is_extended() {
            warn!("unexpected standard-id CAN message");
            continue;
        }

        let header = match MsgHeader::parse(&frame) {
            Ok(header) => header,
            Err(err) => {
                warn!(%err, "malformed frame");
                continue;
            }
        };

        match header.msg_type {
            Some(MessageType::AddressRequest) => {
                handle_address_request(&bus, &registry, &frame, &recv_packet_tx);
            }
            Some(MessageType::Isotp) => {
                handle_isotp_frame(&bus, &registry, &frame, header.src_addr, header.dst_addr);
            }
            other => {
                warn!(?other, "unexpected packet type");
            }
        }
    }
}

fn handle_isotp_frame(bus: &Arc<dyn CanBus>, registry: &Arc<Registry>, frame: &Frame, src_addr: u8, dst_addr: u8) {
    if dst_addr != addressing::ADDRESS_MASTER {
        warn!(dst_addr, "unexpected destination address");
        return;
    }
    if src_addr < MIN_ADDR || !registry.has_addr(src_addr) {
        info!(src_addr, "message from unknown node; prompting it to re-announce");
        let prompt = addressing::make_address_request_prompt(src_addr);
        if let Err(err) = bus.send(&prompt) {
            warn!(%err, "failed to send address-request prompt");
        }
        return;
    }

    let mut masked = frame.clone();
    masked.id = crate::can_frame::Id::Extended(addressing::mask_arbitration_id(frame.id.value()));
    registry.deliver(src_addr, masked);
}

fn handle_address_request(
    bus: &Arc<dyn CanBus>,
    registry: &Arc<Registry>,
    frame: &Frame,
    recv_packet_tx: &Sender<RecvPacket>,
) {
    let identity = match addressing::parse_address_request(frame) {
        Ok(identity) => identity,
        Err(err) => {
            warn!(%err, "malformed address request");
            return;
        }
    };
    info!(%identity, "address request");

    let (status, new_addr) = match registry.find_by_identity(identity) {
        Some(addr) => {
            info!(addr, "node already registered");
            (0, addr)
        }
        None => {
            let bus_for_session = bus.clone();
            match registry.add(identity, move |frame| {
                if let Err(err) = bus_for_session.send(&frame) {
                    warn!(%err, "failed to send frame from session");
                }
            }, recv_packet_tx.clone()) {
                Ok(addr) => {
                    info!(addr, "new node added");
                    (0, addr)
                }
                Err(err) => {
                    warn!(%err, "could not register node");
                    (1, 0)
                }
            }
        }
    };

    let response = addressing::make_address_response(status, new_addr, identity);
    if let Err(err) = bus.send(&response) {
        warn!(%err, "failed to send address response");
    }
    debug!(status, new_addr, "address response sent");
}
