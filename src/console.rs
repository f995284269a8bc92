//
// console.rs
//
// Operator console: line reader, command applier and telemetry dashboard.
//

use crate::command::{Command, VIN_PRESET_1, VIN_PRESET_2};
use crate::state::SharedState;

use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use std::io;

/// Reads console lines and forwards parsed commands to the applier
pub async fn read_task(commands: mpsc::Sender<Command>, mut shutdown: watch::Receiver<bool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    // Recognized fields with unparseable values are skipped
                    if let Some(command) = Command::parse(&line) {
                        if commands.send(command).await.is_err() {
                            break;
                        }
                    }
                }
                _ => break,
            },
        }
    }
}

/// Applies commands to the vehicle state. Sole writer of the shared state;
/// ignition toggles go out on their own single-slot channel and every
/// successful field update raises the redraw signal.
pub async fn apply_task(
    mut commands: mpsc::Receiver<Command>,
    state: SharedState,
    ignition: watch::Sender<bool>,
    redraw: watch::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            command = commands.recv() => match command {
                Some(command) => apply(command, &state, &ignition, &redraw),
                None => break,
            },
        }
    }
}

fn apply(
    command: Command,
    state: &SharedState,
    ignition: &watch::Sender<bool>,
    redraw: &watch::Sender<()>,
) {
    match command {
        Command::SetSpeed(speed) => {
            state.write().unwrap().speed = speed;
            let _ = redraw.send(());
        }
        Command::SetEngine(engine) => {
            state.write().unwrap().engine = engine;
            let _ = redraw.send(());
        }
        Command::SetAir(temp) => {
            state.write().unwrap().temp = temp;
            let _ = redraw.send(());
        }
        Command::SetVin(vin) => {
            state.write().unwrap().vin = vin;
            let _ = redraw.send(());
        }
        Command::SetVinPreset(preset) => {
            let vin = if preset == 1 { VIN_PRESET_1 } else { VIN_PRESET_2 };
            state.write().unwrap().vin = vin.to_owned();
            let _ = redraw.send(());
        }
        Command::Start => {
            let _ = ignition.send(true);
            println!("Ignition: true");
        }
        Command::Stop => {
            let _ = ignition.send(false);
            println!("Ignition: false");
        }
        Command::Invalid => usage(),
    }
}

/// Repaints the dashboard whenever the applier raises the redraw signal
pub async fn paint_task(
    state: SharedState,
    mut redraw: watch::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    paint(&state);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            changed = redraw.changed() => match changed {
                Ok(()) => paint(&state),
                Err(_) => break,
            },
        }
    }
}

/// Clear the screen and paint the telemetry dashboard
pub fn paint(state: &SharedState) {
    let car = state.read().unwrap().clone();

    let _ = execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0));

    if !car.transport_present {
        println!("*** No CAN transport detected ***\n");
    }
    println!("\n\tSpeed (Km/h): {}\t\t\tEngine RPM: {:.2}\t\t", car.speed, car.engine);
    println!("\n\n\tAir Ambient Temperature (C): {}\t\tVIN: {}\t\t\n", car.temp, car.vin);
}

fn usage() {
    println!("Invalid command");
    println!("Help:");
    println!("speed xxxx -> Sets a speed");
    println!("engine xxxx -> Sets a rpm");
    println!("air xxxx -> Sets an air temperature");
    println!("vin xxxx -> Sets a VIN");
    println!("start / stop -> Toggles the ignition");
    println!();
    println!("Some VIN presets are:");
    println!("vin preset 1 -> Renault Laguna II 2002: {}", VIN_PRESET_1);
    println!("vin preset 2 -> Ford Fiesta 2011: {}", VIN_PRESET_2);
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::state::VehicleState;

    fn fixture() -> (SharedState, watch::Sender<bool>, watch::Receiver<bool>, watch::Sender<()>) {
        let state = VehicleState::shared(false);
        let (ignition_tx, ignition_rx) = watch::channel(false);
        let (redraw_tx, _redraw_rx) = watch::channel(());
        (state, ignition_tx, ignition_rx, redraw_tx)
    }

    #[test]
    fn apply_updates_fields() {
        let (state, ignition, _ignition_rx, redraw) = fixture();

        apply(Command::SetSpeed(88), &state, &ignition, &redraw);
        apply(Command::SetEngine(1500.5), &state, &ignition, &redraw);
        apply(Command::SetAir(-5), &state, &ignition, &redraw);
        apply(Command::SetVin("WVWZZZ1JZXW000001".into()), &state, &ignition, &redraw);

        let car = state.read().unwrap().clone();
        assert_eq!(car.speed, 88);
        assert_eq!(car.engine, 1500.5);
        assert_eq!(car.temp, -5);
        assert_eq!(car.vin, "WVWZZZ1JZXW000001");
    }

    #[test]
    fn apply_vin_presets() {
        let (state, ignition, _ignition_rx, redraw) = fixture();

        apply(Command::SetVinPreset(1), &state, &ignition, &redraw);
        assert_eq!(state.read().unwrap().vin, VIN_PRESET_1);

        apply(Command::SetVinPreset(2), &state, &ignition, &redraw);
        assert_eq!(state.read().unwrap().vin, VIN_PRESET_2);
    }

    #[test]
    fn apply_ignition_toggles() {
        let (state, ignition, ignition_rx, redraw) = fixture();

        apply(Command::Start, &state, &ignition, &redraw);
        assert!(*ignition_rx.borrow());

        apply(Command::Stop, &state, &ignition, &redraw);
        assert!(!*ignition_rx.borrow());
    }
}
