//! A per-node session: one ISO-TP transport bound to a logical address, fed
//! by an inbound CAN-frame queue and draining reassembled packets onto the
//! server-wide output queue.

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::can_frame::Frame;
use crate::error::BridgeError;
use crate::identity::NodeIdentity;
use crate::isotp::{IsotpParams, IsotpTransport, RxFn, SoftwareIsotp, TxFn};
use crate::packet::RecvPacket;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Parameters mirroring the original daemon's per-node configuration.
pub fn default_params() -> IsotpParams {
    IsotpParams::default()
}

pub struct Session {
    identity: NodeIdentity,
    addr: u8,
    inbound_tx: Sender<Frame>,
    isotp: Arc<dyn IsotpTransport>,
    _drain_worker: JoinHandle<()>,
}

impl Session {
    /// `send_frame` is how the session's ISO-TP engine hands a raw CAN
    /// frame to the bus; it is the per-node wrapper around the server's
    /// shared transmit path.
    pub fn new(
        identity: NodeIdentity,
        addr: u8,
        send_frame: impl Fn(Frame) + Send + Sync + 'static,
        recv_packet_tx: Sender<RecvPacket>,
    ) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel::<Frame>();
        let inbound_rx = Mutex::new(inbound_rx);

        let rxfn: RxFn = Box::new(move |timeout| {
            inbound_rx.lock().unwrap().recv_timeout(timeout).ok().map(|f| f.data)
        });
        let txfn: TxFn = Box::new(move |bytes: &[u8]| {
            send_frame(Frame::new_extended(addr as u32, bytes.to_vec()));
        });

        let mut engine = SoftwareIsotp::new(rxfn, txfn, default_params());
        engine.start();
        let isotp: Arc<dyn IsotpTransport> = Arc::new(engine);

        let drain_worker = {
            let isotp = isotp.clone();
            thread::spawn(move || loop {
                if let Some(data) = isotp.recv(DRAIN_TIMEOUT) {
                    if let Ok(packet) = RecvPacket::new(addr, data) {
                        if recv_packet_tx.send(packet).is_err() {
                            return;
                        }
                    }
                }
            })
        };

        Self {
            identity,
            addr,
            inbound_tx,
            isotp,
            _drain_worker: drain_worker,
        }
    }

    pub fn identity(&self) -> NodeIdentity {
        self.identity
    }

    pub fn addr(&self) -> u8 {
        self.addr
    }

    /// Enqueues a classified CAN frame (arbitration id already masked by the
    /// demultiplexer) for this session's ISO-TP engine to reassemble.
    pub fn deliver(&self, frame: Frame) {
        let _ = self.inbound_tx.send(frame);
    }

    /// Sends a packet destined for this session's node. The destination must
    /// match this session's address; ISO-TP enforces the byte-length bound.
    pub fn send(&self, dst_addr: u8, data: &[u8]) -> Result<(), BridgeError> {
        if dst_addr != self.addr {
            return Err(BridgeError::WrongDestination {
                dst: dst_addr,
                addr: self.addr,
            });
        }
        self.isotp.send(data).map_err(BridgeError::from)
    }
}
