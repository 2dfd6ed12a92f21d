//! The node registry: allocates logical addresses and owns every session
//! for the lifetime of the process.

use std::sync::mpsc::Sender;
use std::sync::Mutex;

use crate::can_frame::Frame;
use crate::error::BridgeError;
use crate::identity::NodeIdentity;
use crate::packet::RecvPacket;
use crate::session::Session;

pub const MIN_ADDR: u8 = 1;
pub const MAX_ADDR: u8 = 254;
const MAX_NODES: usize = MAX_ADDR as usize;

/// Append-only collection of sessions, indexed by identity (linear scan) and
/// by address (direct index under the `address == index + 1` invariant).
pub struct Registry {
    sessions: Mutex<Vec<Session>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Registers a newly seen identity, constructing its session. Fails if
    /// the identity is already registered or the address space is exhausted.
    pub fn add(
        &self,
        identity: NodeIdentity,
        send_frame: impl Fn(Frame) + Send + Sync + 'static,
        recv_packet_tx: Sender<RecvPacket>,
    ) -> Result<u8, BridgeError> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(existing) = sessions.iter().find(|s| s.identity() == identity) {
            return Err(BridgeError::Duplicate {
                identity: identity.to_string(),
                addr: existing.addr(),
            });
        }
        if sessions.len() >= MAX_NODES {
            return Err(BridgeError::Exhausted { max: MAX_NODES });
        }
        let addr = (sessions.len() + MIN_ADDR as usize) as u8;
        sessions.push(Session::new(identity, addr, send_frame, recv_packet_tx));
        Ok(addr)
    }

    pub fn find_by_identity(&self, identity: NodeIdentity) -> Option<u8> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.identity() == identity)
            .map(|s| s.addr())
    }

    /// Delivers a classified CAN frame to the session at `addr`, if one exists.
    pub fn deliver(&self, addr: u8, frame: Frame) -> bool {
        debug_assert!((MIN_ADDR..=MAX_ADDR).contains(&addr));
        let sessions = self.sessions.lock().unwrap();
        if addr as usize > sessions.len() {
            return false;
        }
        sessions[(addr - MIN_ADDR) as usize].deliver(frame);
        true
    }

    pub fn has_addr(&self, addr: u8) -> bool {
        if !(MIN_ADDR..=MAX_ADDR).contains(&addr) {
            return false;
        }
        (addr as usize) <= self.sessions.lock().unwrap().len()
    }

    /// Sends a packet to the session at `dst_addr`. This may block while the
    /// session's ISO-TP engine segments and flow-controls the transfer.
    pub fn send_to(&self, dst_addr: u8, data: &[u8]) -> Result<(), BridgeError> {
        debug_assert!((MIN_ADDR..=MAX_ADDR).contains(&dst_addr));
        let sessions = self.sessions.lock().unwrap();
        if dst_addr as usize > sessions.len() {
            return Err(BridgeError::UnknownNode { addr: dst_addr });
        }
        let session = &sessions[(dst_addr - MIN_ADDR) as usize];
        session.send(dst_addr, data)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
