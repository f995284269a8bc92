//
// main.rs
//
// Worker wiring for the car simulator.
//

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, watch};

use cansim::{
    console,
    drivers::AsyncCanDriverPtr,
    generator::TrafficGenerator,
    responder::Responder,
    router::Router,
    state::VehicleState,
    Args,
};

use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let driver: Result<AsyncCanDriverPtr, _> = args.interface.try_into();
    let transport_present = driver.is_ok();

    let state = VehicleState::shared(transport_present);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (ignition_tx, ignition_rx) = watch::channel(false);
    let (redraw_tx, redraw_rx) = watch::channel(());
    let (inbound_tx, inbound_rx) = mpsc::channel(10);
    let (outbound_tx, outbound_rx) = mpsc::channel(10);
    let (command_tx, command_rx) = mpsc::channel(1);

    let mut workers = Vec::new();

    // With no usable transport the simulator degrades to a synthetic
    // request generator feeding the same inbound path
    match driver {
        Ok(driver) => {
            let router = Router::new(driver, inbound_tx, outbound_rx, shutdown_rx.clone());
            workers.push(tokio::spawn(router.run()));
        }
        Err(e) => {
            eprintln!("Warning: {}; falling back to the traffic generator", e);

            // outbound_rx drops here: with no bus to write to, responses
            // surface as trace lines only and the responder's try_send
            // lands on a closed channel
            let generator = TrafficGenerator::new(
                inbound_tx,
                Duration::from_millis(args.gen_period),
                shutdown_rx.clone(),
            );
            workers.push(tokio::spawn(generator.run()));
        }
    }

    let responder = Responder::new(
        state.clone(),
        ignition_rx,
        inbound_rx,
        outbound_tx,
        shutdown_rx.clone(),
    );
    workers.push(tokio::spawn(responder.run()));

    workers.push(tokio::spawn(console::read_task(command_tx, shutdown_rx.clone())));
    workers.push(tokio::spawn(console::apply_task(
        command_rx,
        state.clone(),
        ignition_tx,
        redraw_tx,
        shutdown_rx.clone(),
    )));
    workers.push(tokio::spawn(console::paint_task(state, redraw_rx, shutdown_rx)));

    tokio::signal::ctrl_c().await.context("Failed to listen for the shutdown signal")?;
    let _ = shutdown_tx.send(true);

    for worker in workers {
        let _ = worker.await;
    }

    // The console reader leaves a blocking stdin read behind; exit directly
    // so runtime teardown does not wait on it
    std::process::exit(0);
}
