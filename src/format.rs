//
// format.rs
//
// Trace rendering for the observability sink.
//

use crate::frame::CanFrame;

use std::fmt;
use std::time::Instant;

use embedded_can::Frame;

/// Renders a frame as a bus trace line, timed relative to an origin point:
/// `<seconds> <id> <dlc> [<data bytes>]`.
///
/// Received frames are traced against the start of the message loop;
/// responses are traced against the originating request's timestamp.
pub struct TraceLine<'a> {
    frame: &'a CanFrame,
    origin: Instant,
}

impl<'a> TraceLine<'a> {
    pub fn new(frame: &'a CanFrame, origin: Instant) -> Self {
        TraceLine { frame, origin }
    }
}

impl fmt::Display for TraceLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let offset = self.frame.stamp().saturating_duration_since(self.origin);

        let data_string = self
            .frame
            .data()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<String>>()
            .join(" ");

        write!(
            f,
            "{:15.6} {:03x} {} [{}]",
            offset.as_secs_f64(),
            self.frame.raw_id(),
            self.frame.dlc(),
            data_string
        )
    }
}

/// Render a transport fault on the trace output
pub fn print_error(err: &impl fmt::Display) {
    println!("Error occurred: {}", err);
}

#[cfg(test)]
mod tests {
    use super::*;

    use embedded_can::StandardId;

    #[test]
    fn trace_line_layout() {
        let id = StandardId::new(0x7E8).unwrap();
        let frame = CanFrame::new(id, &[0x03, 0x41, 0x0D, 0xFA]).unwrap();

        // Origin equal to the frame's own stamp pins the offset to zero
        let line = TraceLine::new(&frame, frame.stamp()).to_string();
        assert_eq!(line, "       0.000000 7e8 4 [03 41 0d fa]");
    }

    #[test]
    fn trace_line_empty_frame() {
        let id = StandardId::new(0x100).unwrap();
        let frame = CanFrame::new(id, &[]).unwrap();

        let line = TraceLine::new(&frame, frame.stamp()).to_string();
        assert_eq!(line, "       0.000000 100 0 []");
    }
}
