//
// responder.rs
//
// OBD-II diagnostic responder: classifies incoming requests and answers
// them from the current vehicle telemetry.
//

use crate::format::TraceLine;
use crate::frame::CanFrame;
use crate::state::{SharedState, VehicleState};

use embedded_can::{Frame, StandardId};
use tokio::sync::{mpsc, watch};

/// Identifier of broadcast OBD-II requests
pub const OBD_REQUEST_ID: u16 = 0x7DF;
/// Identifier the emulated ECU answers from
pub const OBD_RESPONSE_ID: u16 = 0x7E8;

/// Service 0x01: current data
pub const SERVICE_CURRENT_DATA: u8 = 0x01;
/// Service 0x09: vehicle information
pub const SERVICE_VEHICLE_INFO: u8 = 0x09;
/// ISO 15765-2 flow control: continue a pending multi-frame transfer
const FLOW_CONTROL: u8 = 0x30;

/// Vehicle speed, km/h, 1 byte
pub const PID_SPEED: u8 = 0x0D;
/// Engine speed, 2 bytes of RPM x 4
pub const PID_RPM: u8 = 0x0C;
/// Ambient air temperature, 1 byte offset by +40
pub const PID_AMBIENT_TEMP: u8 = 0x46;
/// Service 0x09: vehicle identification number
pub const PID_VIN: u8 = 0x02;

/// What a service-0x01 PID contributes to the response payload
enum PidEncoder {
    Speed,
    Rpm,
    AmbientTemp,
    SupportBitmap([u8; 4]),
}

/// Service 0x01 dispatch table, PID byte to encoder. Only the PID 0x40
/// support bitmap advertises anything (PID 0x0D's group).
static CURRENT_DATA_PIDS: &[(u8, PidEncoder)] = &[
    (PID_RPM, PidEncoder::Rpm),
    (PID_SPEED, PidEncoder::Speed),
    (PID_AMBIENT_TEMP, PidEncoder::AmbientTemp),
    (0x00, PidEncoder::SupportBitmap([0x00, 0x00, 0x00, 0x00])),
    (0x20, PidEncoder::SupportBitmap([0x00, 0x00, 0x00, 0x00])),
    (0x40, PidEncoder::SupportBitmap([0x00, 0x00, 0x40, 0x00])),
    (0x60, PidEncoder::SupportBitmap([0x00, 0x00, 0x00, 0x00])),
    (0x80, PidEncoder::SupportBitmap([0x00, 0x00, 0x00, 0x00])),
    (0xA0, PidEncoder::SupportBitmap([0x00, 0x00, 0x00, 0x00])),
];

impl PidEncoder {
    /// Encoded value bytes for this PID against a telemetry snapshot
    fn encode(&self, car: &VehicleState) -> ([u8; 4], usize) {
        match self {
            // Speed wraps modulo 256 rather than saturating
            PidEncoder::Speed => ([car.speed as u8, 0, 0, 0], 1),
            PidEncoder::Rpm => {
                let raw = (car.engine * 4.0).round() as u16;
                ([(raw >> 8) as u8, raw as u8, 0, 0], 2)
            }
            PidEncoder::AmbientTemp => ([(car.temp + 40) as u8, 0, 0, 0], 1),
            PidEncoder::SupportBitmap(bitmap) => (*bitmap, 4),
        }
    }
}

fn encoder_for(pid: u8) -> Option<&'static PidEncoder> {
    CURRENT_DATA_PIDS.iter().find(|(p, _)| *p == pid).map(|(_, e)| e)
}

/// Build a response frame addressed from the ECU. The identifier and
/// payload size are statically valid.
fn response_frame(data: &[u8; 8]) -> CanFrame {
    let id = StandardId::new(OBD_RESPONSE_ID).unwrap();
    CanFrame::new(id, &data[..]).unwrap()
}

/// Answer one classified diagnostic request against a telemetry snapshot.
/// Empty when the request is not one the simulator implements.
fn respond(request: &CanFrame, car: &VehicleState) -> Vec<CanFrame> {
    let data = request.data();
    if data.is_empty() {
        return Vec::new();
    }

    // A flow control frame continues the VIN transfer announced by the
    // first-frame response below
    if data[0] == FLOW_CONTROL {
        return vin_continuation(car);
    }

    let len = data[0] as usize;
    if len < 2 || data.len() < 2 {
        return Vec::new();
    }

    let service = data[1];
    let pids = &data[2..data.len().min(len + 1)];

    let frame = match service {
        SERVICE_CURRENT_DATA => current_data(service, pids, car),
        SERVICE_VEHICLE_INFO => vehicle_info(service, pids, car),
        _ => None,
    };

    frame.map(|data| vec![response_frame(&data)]).unwrap_or_default()
}

/// Service 0x01: one result block per requested PID, packed from offset 2.
/// The length byte tracks the bytes written after every block.
fn current_data(service: u8, pids: &[u8], car: &VehicleState) -> Option<[u8; 8]> {
    let mut data = [0u8; 8];
    data[1] = service + 0x40;

    let mut cursor = 2;
    for &pid in pids {
        if cursor >= 8 {
            break;
        }

        data[cursor] = pid;
        cursor += 1;

        if let Some(encoder) = encoder_for(pid) {
            let (bytes, count) = encoder.encode(car);
            for &byte in &bytes[..count] {
                if cursor < 8 {
                    data[cursor] = byte;
                    cursor += 1;
                }
            }
        }

        data[0] = cursor as u8 - 1;
    }

    (cursor > 2).then_some(data)
}

/// Service 0x09: VIN transfer first frame, or the supported-PIDs bitmap
fn vehicle_info(service: u8, pids: &[u8], car: &VehicleState) -> Option<[u8; 8]> {
    match pids.first() {
        Some(&PID_VIN) => {
            // ISO 15765-2 first frame: 20 bytes total, sequence info 0x01,
            // then as many VIN characters as fit. The rest goes out with
            // the flow control continuation.
            let mut data = [0x10, 0x14, service + 0x40, PID_VIN, 0x01, 0, 0, 0];
            for (i, slot) in data.iter_mut().enumerate().skip(5) {
                *slot = car.vin_byte(i - 5);
            }
            Some(data)
        }
        Some(&0x00) => {
            // Only the VIN (PID 0x02) is advertised
            Some([0x06, service + 0x40, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00])
        }
        _ => None,
    }
}

/// The two continuation frames of the VIN transfer: sequence 0x21 carries
/// VIN[3..10], sequence 0x22 carries VIN[10..17]. Together with the three
/// characters front-loaded into the first frame this covers all 17
/// characters with no gap or overlap.
fn vin_continuation(car: &VehicleState) -> Vec<CanFrame> {
    (1..=2u8)
        .map(|seq| {
            let mut data = [0u8; 8];
            data[0] = 0x20 + seq;
            for (i, slot) in data.iter_mut().enumerate().skip(1) {
                *slot = car.vin_byte((seq as usize - 1) * 7 + 2 + i);
            }
            response_frame(&data)
        })
        .collect()
}

/// Responder worker. Consumes inbound frames in arrival order, answers them
/// against the current telemetry and hands responses to the router.
pub struct Responder {
    state: SharedState,
    ignition: watch::Receiver<bool>,
    inbound: mpsc::Receiver<CanFrame>,
    outbound: mpsc::Sender<CanFrame>,
    shutdown: watch::Receiver<bool>,
}

impl Responder {
    pub fn new(
        state: SharedState,
        ignition: watch::Receiver<bool>,
        inbound: mpsc::Receiver<CanFrame>,
        outbound: mpsc::Sender<CanFrame>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { state, ignition, inbound, outbound, shutdown }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                frame = self.inbound.recv() => match frame {
                    Some(frame) => self.handle(frame),
                    None => break,
                },
            }
        }
    }

    fn handle(&mut self, request: CanFrame) {
        // The ignition gate is observed before anything else. Requests
        // received while the ignition is off are dropped without an answer.
        if !*self.ignition.borrow() {
            return;
        }

        let car = self.state.read().unwrap().clone();

        for response in respond(&request, &car) {
            println!("{}", TraceLine::new(&response, request.stamp()));

            // Best-effort bus: a saturated outbound path drops the response
            let _ = self.outbound.try_send(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::state::VehicleState;

    use tokio::time::timeout;

    use std::sync::{Arc, RwLock};
    use std::time::Duration;

    fn request(data: &[u8]) -> CanFrame {
        let id = StandardId::new(OBD_REQUEST_ID).unwrap();
        CanFrame::new(id, data).unwrap()
    }

    fn car() -> VehicleState {
        VehicleState {
            speed: 250,
            engine: 3000.0,
            temp: -10,
            vin: "VF1BG0A0524085422".to_owned(),
            transport_present: true,
        }
    }

    #[test]
    fn speed_response() {
        let frames = respond(&request(&[0x02, 0x01, 0x0D]), &car());

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].raw_id(), OBD_RESPONSE_ID);
        assert_eq!(frames[0].data(), &[0x03, 0x41, 0x0D, 0xFA, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn speed_wraps_past_eight_bits() {
        let mut car = car();
        car.speed = 300;

        let frames = respond(&request(&[0x02, 0x01, 0x0D]), &car);
        assert_eq!(frames[0].data()[3], 0x2C);
    }

    #[test]
    fn rpm_response_big_endian() {
        let frames = respond(&request(&[0x02, 0x01, 0x0C]), &car());

        // 3000 rpm x 4 = 12000 = 0x2EE0
        assert_eq!(frames[0].data(), &[0x04, 0x41, 0x0C, 0x2E, 0xE0, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn ambient_temperature_offset() {
        let frames = respond(&request(&[0x02, 0x01, 0x46]), &car());

        assert_eq!(frames[0].data(), &[0x03, 0x41, 0x46, 0x1E, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn support_bitmaps() {
        let frames = respond(&request(&[0x02, 0x01, 0x40]), &car());
        assert_eq!(frames[0].data(), &[0x06, 0x41, 0x40, 0x00, 0x00, 0x40, 0x00, 0x00]);

        for pid in [0x00, 0x20, 0x60, 0x80, 0xA0] {
            let frames = respond(&request(&[0x02, 0x01, pid]), &car());
            assert_eq!(frames[0].data()[3..7], [0x00, 0x00, 0x00, 0x00]);
        }
    }

    #[test]
    fn multiple_pids_packed_consecutively() {
        let frames = respond(&request(&[0x03, 0x01, 0x0D, 0x46]), &car());

        assert_eq!(frames[0].data(), &[0x05, 0x41, 0x0D, 0xFA, 0x46, 0x1E, 0x00, 0x00]);
    }

    #[test]
    fn unknown_pid_is_echoed_without_value() {
        let frames = respond(&request(&[0x02, 0x01, 0x05]), &car());

        assert_eq!(frames[0].data(), &[0x02, 0x41, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn unknown_service_is_ignored() {
        assert!(respond(&request(&[0x02, 0x07, 0x0D]), &car()).is_empty());
        assert!(respond(&request(&[0x01, 0x01]), &car()).is_empty());
        assert!(respond(&request(&[]), &car()).is_empty());
    }

    #[test]
    fn truncated_request_clamps_to_frame_length() {
        // Length byte claims more PID bytes than the frame carries
        let frames = respond(&request(&[0x04, 0x01, 0x0D]), &car());

        assert_eq!(frames[0].data(), &[0x03, 0x41, 0x0D, 0xFA, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn vin_first_frame() {
        let frames = respond(&request(&[0x02, 0x09, 0x02]), &car());

        assert_eq!(frames[0].data(), &[0x10, 0x14, 0x49, 0x02, 0x01, b'V', b'F', b'1']);
    }

    #[test]
    fn vehicle_info_support_bitmap() {
        let frames = respond(&request(&[0x02, 0x09, 0x00]), &car());

        assert_eq!(frames[0].data(), &[0x06, 0x49, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn vin_round_trip() {
        let car = car();

        let first = respond(&request(&[0x02, 0x09, 0x02]), &car);
        let continuation = respond(&request(&[0x30, 0x00, 0x00]), &car);

        assert_eq!(continuation.len(), 2);
        assert_eq!(continuation[0].data()[0], 0x21);
        assert_eq!(continuation[1].data()[0], 0x22);

        let mut vin = Vec::new();
        vin.extend_from_slice(&first[0].data()[5..8]);
        vin.extend_from_slice(&continuation[0].data()[1..8]);
        vin.extend_from_slice(&continuation[1].data()[1..8]);

        assert_eq!(String::from_utf8(vin).unwrap(), "VF1BG0A0524085422");
    }

    #[test]
    fn short_vin_padded_with_spaces() {
        let mut car = car();
        car.vin = "ABC".to_owned();

        let continuation = respond(&request(&[0x30, 0x00, 0x00]), &car);
        assert!(continuation[0].data()[1..].iter().all(|&b| b == b' '));
    }

    fn spawn_responder(
        ignition_on: bool,
    ) -> (
        mpsc::Sender<CanFrame>,
        mpsc::Receiver<CanFrame>,
        watch::Sender<bool>,
        watch::Sender<bool>,
        tokio::task::JoinHandle<()>,
    ) {
        let state = Arc::new(RwLock::new(car()));
        let (ignition_tx, ignition_rx) = watch::channel(ignition_on);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (inbound_tx, inbound_rx) = mpsc::channel(10);
        let (outbound_tx, outbound_rx) = mpsc::channel(10);

        let responder = Responder::new(state, ignition_rx, inbound_rx, outbound_tx, shutdown_rx);
        let handle = tokio::spawn(responder.run());

        (inbound_tx, outbound_rx, ignition_tx, shutdown_tx, handle)
    }

    #[tokio::test]
    async fn ignition_gates_responses() {
        let (inbound, mut outbound, ignition, _shutdown, _handle) = spawn_responder(false);

        inbound.send(request(&[0x02, 0x01, 0x0D])).await.unwrap();
        assert!(timeout(Duration::from_millis(50), outbound.recv()).await.is_err());

        ignition.send(true).unwrap();
        inbound.send(request(&[0x02, 0x01, 0x0D])).await.unwrap();

        let response = timeout(Duration::from_millis(500), outbound.recv())
            .await
            .expect("no response after ignition on")
            .unwrap();
        assert_eq!(response.raw_id(), OBD_RESPONSE_ID);
    }

    #[tokio::test]
    async fn saturated_outbound_drops_newest_response() {
        let state = Arc::new(RwLock::new(car()));
        let (_ignition_tx, ignition_rx) = watch::channel(true);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (inbound_tx, inbound_rx) = mpsc::channel(10);
        let (outbound_tx, mut outbound_rx) = mpsc::channel(1);

        let responder = Responder::new(state, ignition_rx, inbound_rx, outbound_tx, shutdown_rx);
        let _handle = tokio::spawn(responder.run());

        // The speed response fills the single-slot outbound channel; the rpm
        // response finds it full and is dropped without blocking the loop
        inbound_tx.send(request(&[0x02, 0x01, 0x0D])).await.unwrap();
        inbound_tx.send(request(&[0x02, 0x01, 0x0C])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let first = outbound_rx.recv().await.unwrap();
        assert_eq!(first.data()[2], 0x0D);

        // The loop is still alive: a fresh request lands in the freed slot,
        // and the dropped rpm response never shows up in between
        inbound_tx.send(request(&[0x02, 0x01, 0x46])).await.unwrap();

        let next = timeout(Duration::from_millis(500), outbound_rx.recv())
            .await
            .expect("responder stopped answering")
            .unwrap();
        assert_eq!(next.data()[2], 0x46);
    }

    #[tokio::test]
    async fn shutdown_stops_the_responder() {
        let (inbound, mut outbound, _ignition, shutdown, handle) = spawn_responder(true);

        shutdown.send(true).unwrap();
        timeout(Duration::from_millis(500), handle)
            .await
            .expect("responder did not stop")
            .unwrap();

        // Requests arriving after shutdown produce nothing
        let _ = inbound.send(request(&[0x02, 0x01, 0x0D])).await;
        assert!(timeout(Duration::from_millis(50), outbound.recv()).await.is_err());
    }
}
