//! ISO-TP (ISO 15765-2) segmentation over classical CAN, behind a narrow
//! callback-driven contract — treated as a self-contained collaborator, not
//! generalized beyond what a single node's session needs.

mod engine;

use std::time::Duration;

pub use engine::{RxFn, SoftwareIsotp, TxFn};

/// Parameters mirroring the original daemon's per-node transport config.
#[derive(Clone, Copy, Debug)]
pub struct IsotpParams {
    /// If true, `send` blocks the caller until the whole transfer (including
    /// any flow-control handshake) completes.
    pub blocking_send: bool,
    /// Minimum spacing between consecutive frames this side transmits.
    pub stmin: Duration,
    /// How long `send` waits for a peer's flow-control frame before giving up.
    pub rx_flowcontrol_timeout: Duration,
}

impl Default for IsotpParams {
    fn default() -> Self {
        Self {
            blocking_send: true,
            stmin: Duration::from_millis(2),
            rx_flowcontrol_timeout: Duration::from_millis(2000),
        }
    }
}

/// The send/receive contract a per-node session drives its ISO-TP engine
/// through. `rxfn`/`txfn` are supplied at construction and carry raw CAN
/// frame payloads (8 bytes, PCI byte included) to/from the bus.
pub trait IsotpTransport: Send {
    /// Starts the engine's background reassembly/flow-control worker.
    fn start(&mut self);

    /// Sends one reassembled payload, segmenting it if it exceeds a single frame.
    fn send(&self, data: &[u8]) -> Result<(), crate::error::CanError>;

    /// Waits up to `timeout` for one fully reassembled inbound payload.
    fn recv(&self, timeout: Duration) -> Option<Vec<u8>>;
}
