//
// drivers/socketcan.rs
//
// SocketCAN transport driver.
//

use crate::drivers::{AsyncCanDriver, BusEvent, TransportError};
use crate::frame::CanFrame;

use socketcan::{tokio::CanSocket, CanFrame as SocketCanFrame};

use async_trait::async_trait;
use embedded_can::Frame;
use futures_util::StreamExt;
use thiserror::Error;

use std::io;

impl From<CanFrame> for SocketCanFrame {
    fn from(value: CanFrame) -> Self {
        // Using unwrap is fine since our frame type enforces the same limits
        SocketCanFrame::new(value.id(), value.data()).unwrap()
    }
}

#[derive(Debug, Error)]
pub enum SocketCanDriverError {
    #[error("Failed to open CAN device")]
    OpenError(#[from] io::Error),
}

pub struct SocketCanDriver(CanSocket);

impl SocketCanDriver {
    pub fn new(can_interface: &str) -> Result<SocketCanDriver, SocketCanDriverError> {
        CanSocket::open(can_interface)
            .map(SocketCanDriver)
            .map_err(SocketCanDriverError::OpenError)
    }
}

#[async_trait]
impl AsyncCanDriver for SocketCanDriver {
    async fn recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.0.next().await? {
                // Frames with extended identifiers are outside the
                // simulator's scope and are skipped here
                Ok(frame) => {
                    if let Some(frame) = CanFrame::new(frame.id(), frame.data()) {
                        return Some(BusEvent::Frame(frame));
                    }
                }
                Err(e) => return Some(BusEvent::Error(TransportError::Recv(Box::new(e)))),
            }
        }
    }

    async fn send(&mut self, frame: CanFrame) -> Result<(), TransportError> {
        self.0
            .write_frame(SocketCanFrame::from(frame))
            .await
            .map_err(|e| TransportError::Send(Box::new(e)))
    }
}
