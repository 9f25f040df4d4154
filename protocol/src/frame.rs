//! Wire framing.
//!
//! Frames have no delimiter: the receive buffer is considered a complete
//! frame once the line has been idle for the read timeout
//! (see [`Assembler`]). A frame is laid out as
//!
//! ```text
//! [header] [length] [payload ...] [counter]? [checksum]
//! ```
//!
//! where the counter byte only exists in the sequenced revision.

use alloc::vec::Vec;
use core::{
    fmt::{Display, Formatter},
    num::Wrapping,
    time::Duration,
};
use log::{trace, warn};
use strum::FromRepr;

/// Largest frame the length byte can describe, including overhead.
pub const MAX_FRAME_LEN: usize = 255 + 4;

/// Frame header.
#[derive(FromRepr, PartialEq, Eq, Copy, Clone, Debug)]
#[repr(u8)]
pub enum Header {
    /// Full state request or report.
    Poll = 0x70,
    /// Requested state change.
    Control = 0xf0,
}

/// Checksum algorithm.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Checksum {
    /// The wrapping sum of all frame bytes, including the checksum, is zero.
    ZeroSum,
    /// A counter byte follows the payload; the checksum is the wrapping sum
    /// of the payload bytes and the counter.
    Sequenced,
}

/// Framing parameters of a protocol revision.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Framing {
    /// Checksum algorithm.
    pub checksum: Checksum,
    /// Shortest acceptable frame in bytes.
    pub min_len: usize,
}

impl Framing {
    /// Returns the number of non-payload bytes in a frame.
    #[must_use]
    pub const fn overhead(&self) -> usize {
        match self.checksum {
            Checksum::ZeroSum => 3,
            Checksum::Sequenced => 4,
        }
    }
}

/// Reason a frame was rejected.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug)]
pub enum FrameError {
    /// The frame is shorter than the revision allows.
    TooShort(usize),
    /// The header byte is unknown.
    UnknownHeader(u8),
    /// The length byte doesn't match the payload length.
    LengthMismatch {
        /// Value of the length byte.
        declared: u8,
        /// Payload length derived from the frame size.
        actual: usize,
    },
    /// The checksum byte is incorrect.
    ChecksumMismatch {
        /// Checksum computed over the frame.
        expected: u8,
        /// Checksum contained in the frame.
        actual: u8,
    },
    /// The payload doesn't fit into a frame.
    PayloadTooLong(usize),
}

impl Display for FrameError {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self {
            Self::TooShort(len) => write!(f, "frame too short ({len} bytes)"),
            Self::UnknownHeader(header) => write!(f, "unknown header {header:#04x}"),
            Self::LengthMismatch { declared, actual } => {
                write!(f, "length mismatch (declared {declared}, actual {actual})")
            }
            Self::ChecksumMismatch { expected, actual } => {
                write!(
                    f,
                    "checksum mismatch (expected {expected:#04x}, actual {actual:#04x})"
                )
            }
            Self::PayloadTooLong(len) => write!(f, "payload too long ({len} bytes)"),
        }
    }
}

impl core::error::Error for FrameError {}

/// Validated frame borrowing its payload from the receive buffer.
#[derive(PartialEq, Eq, Debug)]
pub struct Frame<'a> {
    /// Frame header.
    pub header: Header,
    /// Payload bytes.
    pub payload: &'a [u8],
    /// Counter byte, if the revision uses one.
    pub counter: Option<u8>,
}

fn compute_checksum(data: &[u8]) -> u8 {
    data.iter().map(|&x| Wrapping(x)).sum::<Wrapping<_>>().0
}

/// Validates a raw frame.
///
/// The checks run in order: minimum length, header, length byte, checksum.
/// Nothing is interpreted before all of them passed.
pub fn validate(framing: Framing, buf: &[u8]) -> Result<Frame<'_>, FrameError> {
    let overhead = framing.overhead();

    if buf.len() < framing.min_len.max(overhead) {
        return Err(FrameError::TooShort(buf.len()));
    }

    let header = Header::from_repr(buf[0]).ok_or(FrameError::UnknownHeader(buf[0]))?;
    let len = buf.len() - overhead;

    if usize::from(buf[1]) != len {
        return Err(FrameError::LengthMismatch {
            declared: buf[1],
            actual: len,
        });
    }

    let payload = &buf[2..2 + len];
    let actual = buf[buf.len() - 1];

    match framing.checksum {
        Checksum::ZeroSum => {
            let expected = compute_checksum(&buf[..buf.len() - 1]).wrapping_neg();

            if expected != actual {
                return Err(FrameError::ChecksumMismatch { expected, actual });
            }

            Ok(Frame {
                header,
                payload,
                counter: None,
            })
        }
        Checksum::Sequenced => {
            let counter = buf[2 + len];
            let expected = compute_checksum(payload).wrapping_add(counter);

            if expected != actual {
                return Err(FrameError::ChecksumMismatch { expected, actual });
            }

            Ok(Frame {
                header,
                payload,
                counter: Some(counter),
            })
        }
    }
}

/// Encodes a frame.
///
/// The counter is only written by the sequenced revision and ignored otherwise.
pub fn encode(
    framing: Framing,
    header: Header,
    payload: &[u8],
    counter: u8,
) -> Result<Vec<u8>, FrameError> {
    let len = u8::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLong(payload.len()))?;
    let mut frame = Vec::with_capacity(payload.len() + framing.overhead());

    frame.push(header as u8);
    frame.push(len);
    frame.extend_from_slice(payload);

    match framing.checksum {
        Checksum::ZeroSum => frame.push(compute_checksum(&frame).wrapping_neg()),
        Checksum::Sequenced => {
            frame.push(counter);
            frame.push(compute_checksum(payload).wrapping_add(counter));
        }
    }

    Ok(frame)
}

/// Collects received bytes until the line goes idle.
#[derive(Debug)]
pub struct Assembler {
    buf: Vec<u8>,
    last_read: Duration,
    timeout: Duration,
}

impl Assembler {
    /// Constructs an empty assembler with the given inactivity timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            buf: Vec::new(),
            last_read: Duration::ZERO,
            timeout,
        }
    }

    /// Appends received bytes and records the time of reception.
    pub fn push(&mut self, bytes: &[u8], now: Duration) {
        if bytes.is_empty() {
            return;
        }

        self.buf.extend_from_slice(bytes);
        self.last_read = now;

        if self.buf.len() > MAX_FRAME_LEN {
            warn!(
                "Dropping {} buffered bytes, no frame boundary found",
                self.buf.len()
            );

            self.buf.clear();
        }
    }

    /// Returns `true` if the buffer holds a complete frame.
    #[must_use]
    pub fn is_ready(&self, now: Duration) -> bool {
        !self.buf.is_empty() && now.saturating_sub(self.last_read) > self.timeout
    }

    /// Returns `true` if no bytes are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Takes the buffered bytes, leaving the assembler empty.
    pub fn take(&mut self) -> Vec<u8> {
        let buf = core::mem::take(&mut self.buf);

        trace!("Assembled frame: {buf:02x?}");

        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::init_logger;
    use alloc::vec;

    const CLASSIC: Framing = Framing {
        checksum: Checksum::ZeroSum,
        min_len: 12,
    };
    const SEQUENCED: Framing = Framing {
        checksum: Checksum::Sequenced,
        min_len: 13,
    };
    const CONTROL: [u8; 10] = [0x34, 0x30, 0x80, 0xa0, 0x36, 0x00, 0x00, 0x00, 0x00, 0x00];

    #[test]
    fn encode_poll() {
        let mut expected = vec![0x70, 0x0a];

        expected.extend_from_slice(&[0x00; 10]);
        expected.push(0x86);

        assert_eq!(
            encode(CLASSIC, Header::Poll, &[0x00; 10], 0),
            Ok(expected),
            "poll frame should be correct"
        );
    }

    #[test]
    fn encode_control() {
        let frame = encode(CLASSIC, Header::Control, &CONTROL, 0).unwrap();

        assert_eq!(frame[..2], [0xf0, 0x0a], "header should be correct");
        assert_eq!(frame[12], 0x4c, "checksum should be correct");

        let frame = encode(SEQUENCED, Header::Control, &CONTROL, 0x01).unwrap();

        assert_eq!(frame.len(), 14, "frame should contain counter");
        assert_eq!(frame[12..], [0x01, 0xbb], "counter and checksum should be correct");
    }

    #[test]
    fn round_trip() {
        for framing in [CLASSIC, SEQUENCED] {
            for header in [Header::Poll, Header::Control] {
                let frame = encode(framing, header, &CONTROL, 0x2a).unwrap();
                let decoded = validate(framing, &frame).unwrap();

                assert_eq!(decoded.header, header, "header should survive encoding");
                assert_eq!(decoded.payload, CONTROL, "payload should survive encoding");
            }
        }

        let frame = encode(SEQUENCED, Header::Poll, &CONTROL, 0x2a).unwrap();

        assert_eq!(
            validate(SEQUENCED, &frame).unwrap().counter,
            Some(0x2a),
            "counter should survive encoding"
        );
    }

    #[test]
    fn reject_short() {
        init_logger();

        for framing in [CLASSIC, SEQUENCED] {
            let frame = encode(framing, Header::Poll, &CONTROL, 0).unwrap();

            for len in 0..framing.min_len {
                assert_eq!(
                    validate(framing, &frame[..len]),
                    Err(FrameError::TooShort(len)),
                    "truncated frame should be rejected"
                );
            }
        }
    }

    #[test]
    fn reject_corruption() {
        init_logger();

        for framing in [CLASSIC, SEQUENCED] {
            let frame = encode(framing, Header::Poll, &CONTROL, 0x07).unwrap();

            for idx in 0..frame.len() {
                let mut corrupted = frame.clone();

                corrupted[idx] = corrupted[idx].wrapping_add(1);

                assert!(
                    validate(framing, &corrupted).is_err(),
                    "corrupted byte {idx} should be rejected"
                );
            }
        }
    }

    #[test]
    fn reject_header_and_length() {
        let mut frame = encode(CLASSIC, Header::Poll, &CONTROL, 0).unwrap();

        frame[0] = 0x55;

        assert_eq!(
            validate(CLASSIC, &frame),
            Err(FrameError::UnknownHeader(0x55)),
            "unknown header should be rejected"
        );

        let mut frame = encode(CLASSIC, Header::Poll, &CONTROL, 0).unwrap();

        frame.push(0x00);

        assert_eq!(
            validate(CLASSIC, &frame),
            Err(FrameError::LengthMismatch {
                declared: 10,
                actual: 11
            }),
            "trailing byte should be rejected"
        );
    }

    #[test]
    fn reject_long_payload() {
        assert_eq!(
            encode(CLASSIC, Header::Control, &[0x00; 256], 0),
            Err(FrameError::PayloadTooLong(256)),
            "oversized payload should be rejected"
        );
    }

    #[test]
    fn assemble_on_idle() {
        init_logger();

        let mut asm = Assembler::new(Duration::from_millis(20));

        asm.push(&[0x70, 0x0a], Duration::from_millis(100));
        asm.push(&[0x00; 4], Duration::from_millis(110));

        assert!(
            !asm.is_ready(Duration::from_millis(125)),
            "frame should not be complete while line is active"
        );
        assert!(
            asm.is_ready(Duration::from_millis(131)),
            "frame should be complete after timeout"
        );
        assert_eq!(asm.take().len(), 6, "buffer should contain all bytes");
        assert!(asm.is_empty(), "buffer should be empty after take");
        assert!(
            !asm.is_ready(Duration::from_secs(1)),
            "empty buffer should never be complete"
        );
    }

    #[test]
    fn assemble_overflow() {
        init_logger();

        let mut asm = Assembler::new(Duration::from_millis(20));

        asm.push(&[0x00; MAX_FRAME_LEN], Duration::ZERO);
        asm.push(&[0x00], Duration::ZERO);

        assert!(asm.is_empty(), "overflowing buffer should be dropped");
    }
}
