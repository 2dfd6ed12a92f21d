//! An in-memory bus double used by tests in place of real hardware.
//!
//! Mirrors a two-queue loopback: frames a simulated node "transmits" land in
//! the bridge's receive queue via [`LoopbackBus::node_send`], and frames the
//! bridge sends are drained by the test harness via [`LoopbackBus::node_recv`].

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::Duration;

use crate::can_frame::Frame;
use crate::error::CanError;
use crate::transport::CanBus;

pub struct LoopbackBus {
    to_bridge_tx: Sender<Frame>,
    to_bridge_rx: Mutex<Receiver<Frame>>,
    from_bridge_tx: Sender<Frame>,
    from_bridge_rx: Mutex<Receiver<Frame>>,
}

impl Default for LoopbackBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackBus {
    pub fn new() -> Self {
        let (to_bridge_tx, to_bridge_rx) = mpsc::channel();
        let (from_bridge_tx, from_bridge_rx) = mpsc::channel();
        Self {
            to_bridge_tx,
            to_bridge_rx: Mutex::new(to_bridge_rx),
            from_bridge_tx,
            from_bridge_rx: Mutex::new(from_bridge_rx),
        }
    }

    /// Simulates a node transmitting `frame` onto the bus.
    pub fn node_send(&self, frame: Frame) {
        let _ = self.to_bridge_tx.send(frame);
    }

    /// Blocks until the bridge sends a frame, simulating a node's receive.
    pub fn node_recv(&self, timeout: Duration) -> Option<Frame> {
        self.from_bridge_rx.lock().unwrap().recv_timeout(timeout).ok()
    }
}

impl CanBus for LoopbackBus {
    fn send(&self, frame: &Frame) -> Result<(), CanError> {
        self.from_bridge_tx
            .send(frame.clone())
            .map_err(|_| CanError::Send {
                source: std::io::Error::other("loopback peer dropped"),
            })
    }

    fn recv(&self, timeout: Duration) -> Result<Option<Frame>, CanError> {
        match self.to_bridge_rx.lock().unwrap().recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}
