//! Original CZ-TACG1 protocol.
//!
//! Frames carry a zero-sum checksum: all bytes of a valid frame, including
//! the checksum, add up to zero. The shortest frame the unit sends is 12 bytes.
//! Polls are sent when the poll interval has elapsed since the last transmission.

use super::{Layout, PowerLayout, Revision, RevisionKind, private};
use crate::{
    frame::{Checksum, Framing},
    scheduler::PollPolicy,
};

const POLL_PAYLOAD: [u8; 10] = [0x00; 10];

/// Byte layout of the classic revision.
pub const LAYOUT: Layout = Layout {
    control_len: 10,
    poll_payload: &POLL_PAYLOAD,
    mode: 0,
    target_temperature: 1,
    mild_dry: 2,
    fan_speed: 3,
    swing: 4,
    features: 5,
    eco: 8,
    preset_mask: 0x0f,
    inside_temperature: [16, 19],
    outside_temperature: [17, 20],
    power: PowerLayout {
        low: 26,
        high: 27,
        offset: 28,
    },
};

/// Classic protocol revision.
#[derive(Debug)]
pub struct Classic;

impl Revision for Classic {
    fn kind(&self) -> RevisionKind {
        RevisionKind::Classic
    }

    fn framing(&self) -> Framing {
        Framing {
            checksum: Checksum::ZeroSum,
            min_len: 12,
        }
    }

    fn layout(&self) -> &'static Layout {
        &LAYOUT
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::SinceLastSent
    }
}

impl private::Sealed for Classic {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{frame, revision::decode, state::FanSpeed};

    #[test]
    fn poll_frame() {
        let frame = frame::encode(
            Classic.framing(),
            frame::Header::Poll,
            LAYOUT.poll_payload,
            0,
        )
        .unwrap();

        assert_eq!(
            frame,
            [
                0x70, 0x0a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x86
            ],
            "poll frame should be correct"
        );
    }

    #[test]
    fn quiet_fan_byte() {
        let mut control = [0x34, 0x30, 0x80, 0x28, 0x36, 0x04, 0x00, 0x00, 0x00, 0x00];

        assert_eq!(
            decode(&Classic, &control).unwrap().fan_speed,
            FanSpeed::Quiet,
            "quiet should be read from the fan byte"
        );

        Classic.encode_fan_speed(&mut control, FanSpeed::High);

        assert_eq!(control[3], 0x60, "fan byte should be written");
        assert_eq!(control[5], 0x04, "feature byte should be untouched");
    }
}
