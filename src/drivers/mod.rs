//
// drivers/mod.rs
//
// Transport abstraction over the physical CAN bus.
//
pub mod socketcan;

use self::socketcan::{SocketCanDriver, SocketCanDriverError};

use crate::frame::CanFrame;
use crate::DriverOpts;

use async_trait::async_trait;
use thiserror::Error;

/// Driver initialization errors
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Error initializing socketcan driver: {0}")]
    SocketCanError(#[from] SocketCanDriverError),
}

/// A transport fault reported while the bus keeps running. Non-fatal: the
/// router logs it and frame flow resumes on the next cycle.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("CAN receive error: {0}")]
    Recv(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("CAN transmit error: {0}")]
    Send(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Inbound activity on the transport: a captured frame or a recoverable fault
#[derive(Debug)]
pub enum BusEvent {
    Frame(CanFrame),
    Error(TransportError),
}

#[async_trait]
pub trait AsyncCanDriver {
    /// Receive the next bus event; `None` once the transport is closed
    async fn recv(&mut self) -> Option<BusEvent>;
    /// Send a CAN frame
    async fn send(&mut self, frame: CanFrame) -> Result<(), TransportError>;
}
pub type AsyncCanDriverPtr = Box<dyn AsyncCanDriver + Sync + Send>;

impl TryFrom<DriverOpts> for AsyncCanDriverPtr {
    type Error = DriverError;

    fn try_from(value: DriverOpts) -> Result<Self, Self::Error> {
        match value {
            DriverOpts::SocketCan(can_interface) => SocketCanDriver::new(&can_interface)
                .map(|driver| upcast(Box::new(driver)))
                .map_err(DriverError::SocketCanError),
        }
    }
}

fn upcast<T: AsyncCanDriver + Sync + Send + 'static>(a: Box<T>) -> AsyncCanDriverPtr {
    a
}
