//! Bridges a fleet of CAN-bus nodes to a backend MQTT broker over per-node
//! TCP connections. See `README`/`SPEC_FULL.md` for the protocol this crate
//! implements; this root only re-exports the pieces `main.rs` wires together.

pub mod addressing;
pub mod bridge;
pub mod can_frame;
pub mod config;
pub mod error;
pub mod identity;
pub mod isotp;
pub mod logging;
pub mod mqttdbg;
pub mod packet;
pub mod registry;
pub mod server;
pub mod session;
pub mod transport;

pub use bridge::{BackendAddr, TcpBridge};
pub use error::BridgeError;
pub use identity::NodeIdentity;
pub use server::CanServer;
