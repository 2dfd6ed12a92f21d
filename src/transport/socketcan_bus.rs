//! The production CAN driver: a thin wrapper over a Linux SocketCAN raw
//! socket. Interface bring-up (bitrate, `ip link set up`) is the operator's
//! responsibility, per the external-interfaces contract — this type only
//! opens an already-configured interface by name.

use std::time::Duration;

use socketcan::{CanFrame as SocketCanFrame, CanSocket, ExtendedId, Frame as _, Id as SocketCanId, Socket};

use crate::can_frame::{Frame, Id};
use crate::error::CanError;
use crate::transport::CanBus;

pub struct SocketCanBus {
    socket: CanSocket,
}

impl SocketCanBus {
    pub fn open(iface: &str) -> Result<Self, CanError> {
        let socket = CanSocket::open(iface).map_err(|source| CanError::Open {
            iface: iface.to_owned(),
            source,
        })?;
        Ok(Self { socket })
    }
}

impl CanBus for SocketCanBus {
    fn send(&self, frame: &Frame) -> Result<(), CanError> {
        let id = match frame.id {
            Id::Extended(raw) => SocketCanId::Extended(
                ExtendedId::new(raw).ok_or(CanError::Send {
                    source: std::io::Error::other("arbitration id exceeds 29 bits"),
                })?,
            ),
            Id::Standard(raw) => SocketCanId::Standard(
                socketcan::StandardId::new(raw as u16).ok_or(CanError::Send {
                    source: std::io::Error::other("arbitration id exceeds 11 bits"),
                })?,
            ),
        };
        let can_frame = SocketCanFrame::new(id, &frame.data).ok_or(CanError::Send {
            source: std::io::Error::other("frame data exceeds 8 bytes"),
        })?;
        self.socket
            .write_frame(&can_frame)
            .map_err(|source| CanError::Send { source })
    }

    fn recv(&self, timeout: Duration) -> Result<Option<Frame>, CanError> {
        self.socket
            .set_read_timeout(timeout)
            .map_err(|source| CanError::Recv { source })?;
        match self.socket.read_frame() {
            Ok(frame) => Ok(Some(convert_frame(frame))),
            Err(err) if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(source) => Err(CanError::Recv { source }),
        }
    }
}

fn convert_frame(frame: SocketCanFrame) -> Frame {
    let id = match frame.id() {
        SocketCanId::Standard(id) => Id::Standard(id.as_raw() as u32),
        SocketCanId::Extended(id) => Id::Extended(id.as_raw()),
    };
    Frame {
        id,
        data: frame.data().to_vec(),
        is_remote: frame.is_remote_frame(),
        is_error: frame.is_error_frame(),
    }
}
