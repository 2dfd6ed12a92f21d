//! The CAN driver boundary: a minimal blocking send/receive contract any
//! bus implementation (real hardware or a test double) must satisfy.

mod loopback;
#[cfg(feature = "socketcan-bus")]
mod socketcan_bus;

use std::time::Duration;

pub use loopback::LoopbackBus;
#[cfg(feature = "socketcan-bus")]
pub use socketcan_bus::SocketCanBus;

use crate::can_frame::Frame;
use crate::error::CanError;

/// A CAN interface capable of blocking send/receive of classical data frames.
///
/// Implementations own whatever bus bring-up (bitrate, interface state) is
/// needed; this crate never configures the interface itself.
pub trait CanBus: Send + Sync {
    fn send(&self, frame: &Frame) -> Result<(), CanError>;

    /// Blocks for up to `timeout` waiting for a frame. Returns `Ok(None)` on
    /// a plain timeout, matching `python-can`'s `bus.recv(timeout)` contract.
    fn recv(&self, timeout: Duration) -> Result<Option<Frame>, CanError>;
}
