//
// frame.rs
//
// CAN frame carried between the transport, router and responder.
//

use embedded_can::{Frame, Id, StandardId};

use std::time::Instant;

/// CAN frame common to all drivers. Standard (11-bit) identifiers only;
/// the capture timestamp is taken when the frame is built.
#[derive(Debug, Clone)]
pub struct CanFrame {
    id: StandardId,
    dlc: usize,
    data: [u8; 8],
    stamp: Instant,
}

impl CanFrame {
    /// Raw 11-bit identifier value
    pub fn raw_id(&self) -> u16 {
        self.id.as_raw()
    }

    /// Time point at which this frame was captured/built
    pub fn stamp(&self) -> Instant {
        self.stamp
    }
}

impl Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Standard(id) if data.len() <= 8 => {
                let mut payload = [0u8; 8];
                payload[..data.len()].copy_from_slice(data);

                Some(CanFrame { id, dlc: data.len(), data: payload, stamp: Instant::now() })
            }
            // Extended identifiers are out of scope for the simulator
            _ => None,
        }
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        match id.into() {
            Id::Standard(id) if dlc <= 8 => {
                Some(CanFrame { id, dlc, data: [0u8; 8], stamp: Instant::now() })
            }
            _ => None,
        }
    }

    fn id(&self) -> Id {
        Id::Standard(self.id)
    }

    fn is_extended(&self) -> bool {
        false
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn dlc(&self) -> usize {
        self.dlc
    }

    fn data(&self) -> &[u8] {
        &self.data[..self.dlc]
    }
}
