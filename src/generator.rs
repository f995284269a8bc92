//
// generator.rs
//
// Synthetic request source used when no CAN transport is present.
//

use crate::frame::CanFrame;
use crate::responder::{OBD_REQUEST_ID, PID_SPEED, SERVICE_CURRENT_DATA};

use embedded_can::{Frame, StandardId};
use tokio::sync::{mpsc, watch};

use std::time::Duration;

/// Offers a speed request into the inbound path at a fixed cadence so the
/// responder can be exercised without a physical bus.
pub struct TrafficGenerator {
    inbound: mpsc::Sender<CanFrame>,
    period: Duration,
    shutdown: watch::Receiver<bool>,
}

impl TrafficGenerator {
    pub fn new(
        inbound: mpsc::Sender<CanFrame>,
        period: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { inbound, period, shutdown }
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.period);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                _ = ticker.tick() => {
                    // If the inbound channel is full, skip this beat
                    let _ = self.inbound.try_send(speed_request());
                }
            }
        }
    }
}

fn speed_request() -> CanFrame {
    let id = StandardId::new(OBD_REQUEST_ID).unwrap();
    CanFrame::new(id, &[0x02, SERVICE_CURRENT_DATA, PID_SPEED]).unwrap()
}
