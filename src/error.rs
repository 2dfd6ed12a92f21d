//! Crate-wide error taxonomy.

use std::io;

use thiserror::Error;

/// Everything that can go wrong while bridging a node's CAN traffic to its
/// backend TCP connection.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("packet of {len} bytes exceeds the {max} byte ISO-TP payload limit")]
    TooLarge { len: usize, max: usize },

    #[error("node with identity {identity} already holds address {addr}")]
    Duplicate { identity: String, addr: u8 },

    #[error("registry is full: {max} addresses are already assigned")]
    Exhausted { max: usize },

    #[error("no node is registered at address {addr}")]
    UnknownNode { addr: u8 },

    #[error("packet destined for {dst} was handed to the session for node {addr}")]
    WrongDestination { dst: u8, addr: u8 },

    #[error(transparent)]
    Can(#[from] CanError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failures surfaced by the CAN transport boundary (the driver and the
/// software ISO-TP engine sitting on top of it).
#[derive(Error, Debug)]
pub enum CanError {
    #[error("failed to open CAN interface `{iface}`")]
    Open { iface: String, source: io::Error },

    #[error("failed to send CAN frame")]
    Send { source: io::Error },

    #[error("failed to receive CAN frame")]
    Recv { source: io::Error },

    #[error("ISO-TP flow-control wait timed out after {0:?}")]
    FlowControlTimeout(std::time::Duration),

    #[error("ISO-TP consecutive frame received out of sequence (expected index {expected}, got {got})")]
    SequenceError { expected: u8, got: u8 },

    #[error("ISO-TP reassembly buffer would exceed {max} bytes")]
    ReassemblyOverflow { max: usize },
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
