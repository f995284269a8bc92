//
// router.rs
//
// Multiplexes frame flows between the transport driver and the responder.
//

use crate::drivers::{AsyncCanDriverPtr, BusEvent};
use crate::format::{self, TraceLine};
use crate::frame::CanFrame;

use tokio::sync::{mpsc, watch};

use std::time::Instant;

/// Message router worker. Owns the transport driver and moves traffic in
/// both directions: inbound frames go to the responder in arrival order,
/// outbound frames go to the bus. Transport faults are logged and the flow
/// resumes on the next cycle.
pub struct Router {
    driver: AsyncCanDriverPtr,
    inbound: mpsc::Sender<CanFrame>,
    outbound: mpsc::Receiver<CanFrame>,
    shutdown: watch::Receiver<bool>,
}

impl Router {
    pub fn new(
        driver: AsyncCanDriverPtr,
        inbound: mpsc::Sender<CanFrame>,
        outbound: mpsc::Receiver<CanFrame>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { driver, inbound, outbound, shutdown }
    }

    pub async fn run(mut self) {
        println!("Starting CAN receiver");

        let start_time = Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                event = self.driver.recv() => match event {
                    Some(BusEvent::Frame(frame)) => {
                        println!("{}", TraceLine::new(&frame, start_time));
                        if self.inbound.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Some(BusEvent::Error(e)) => format::print_error(&e),
                    None => break,
                },
                Some(frame) = self.outbound.recv() => {
                    if let Err(e) = self.driver.send(frame).await {
                        format::print_error(&e);
                    }
                }
            }
        }
    }
}
