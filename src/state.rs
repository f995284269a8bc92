//
// state.rs
//
// Telemetry shared between the command applier and the diagnostic responder.
//

use std::sync::{Arc, RwLock};

/// Current vehicle telemetry.
///
/// The command applier is the only writer; the responder takes whole-struct
/// snapshots under the read guard, so a reader always observes a state that
/// was fully applied by one command.
#[derive(Debug, Clone, Default)]
pub struct VehicleState {
    /// Vehicle speed in km/h
    pub speed: i64,
    /// Engine speed in RPM
    pub engine: f64,
    /// Ambient air temperature in degrees Celsius
    pub temp: i64,
    /// Vehicle identification number, uppercase, 17 characters when complete
    pub vin: String,
    /// Whether a real CAN transport was configured at startup. Set once,
    /// read-only afterwards.
    pub transport_present: bool,
}

pub type SharedState = Arc<RwLock<VehicleState>>;

impl VehicleState {
    pub fn shared(transport_present: bool) -> SharedState {
        Arc::new(RwLock::new(VehicleState { transport_present, ..Default::default() }))
    }

    /// VIN byte at `index`, space-padded past the end of an incomplete VIN
    pub fn vin_byte(&self, index: usize) -> u8 {
        self.vin.as_bytes().get(index).copied().unwrap_or(b' ')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vin_bytes_padded() {
        let car = VehicleState { vin: "WVW".into(), ..Default::default() };

        assert_eq!(car.vin_byte(0), b'W');
        assert_eq!(car.vin_byte(2), b'W');
        assert_eq!(car.vin_byte(3), b' ');
        assert_eq!(car.vin_byte(16), b' ');
    }
}
