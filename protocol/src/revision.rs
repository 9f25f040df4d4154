//! Protocol revisions.
//!
//! Different indoor unit generations speak slightly different dialects of
//! the CN-CNT protocol. The framing, the position of the readings and the
//! meaning of some feature bits differ, while the 10-byte control block is
//! shared. Each dialect is described by a constant [`Layout`] table and a
//! [`Revision`] implementation in its own submodule.
//!
//! All offsets are relative to the start of the frame payload.

pub mod classic;
pub mod sequenced;

use crate::{
    frame::Framing,
    scheduler::PollPolicy,
    state::{
        FanSpeed, Feature, HorizontalSwing, Mode, Preset, SwingMode, TEMPERATURE_STEP,
        TEMPERATURE_THRESHOLD, VerticalSwing,
    },
};
use alloc::vec::Vec;
use core::fmt::{Debug, Display, Formatter};
use log::{trace, warn};
use strum::{EnumString, VariantNames};

/// Marker for readings the unit doesn't support.
pub const NOT_SUPPORTED: u8 = 0x80;

/// Mild dry enabled.
const MILD_DRY_ON: u8 = 0x7f;

/// Mild dry disabled.
const MILD_DRY_OFF: u8 = 0x80;

/// Eco enabled.
const ECO_ON: u8 = 0x40;

/// Eco disabled.
const ECO_OFF: u8 = 0x00;

mod private {
    pub trait Sealed {}
}

/// Identifies a protocol revision.
#[derive(
    strum::Display, EnumString, VariantNames, PartialEq, Eq, Copy, Clone, Debug, Default,
)]
#[strum(serialize_all = "snake_case")]
pub enum RevisionKind {
    /// Original CZ-TACG1 protocol with a zero-sum checksum.
    #[default]
    Classic,
    /// Newer protocol with a frame counter.
    Sequenced,
}

/// Location of the power consumption bytes.
#[derive(PartialEq, Eq, Debug)]
pub struct PowerLayout {
    /// Low byte.
    pub low: usize,
    /// High byte.
    pub high: usize,
    /// Byte subtracted from the result.
    pub offset: usize,
}

/// Byte positions and masks of a revision.
#[derive(PartialEq, Eq, Debug)]
pub struct Layout {
    /// Length of the control block at the start of the payload.
    pub control_len: usize,
    /// Payload of a poll request.
    pub poll_payload: &'static [u8],
    /// Mode and power byte.
    pub mode: usize,
    /// Target temperature byte.
    pub target_temperature: usize,
    /// Mild dry byte.
    pub mild_dry: usize,
    /// Fan speed byte.
    pub fan_speed: usize,
    /// Swing byte.
    pub swing: usize,
    /// Preset and feature byte.
    pub features: usize,
    /// Eco byte.
    pub eco: usize,
    /// Bits of the feature byte that select the preset.
    pub preset_mask: u8,
    /// Primary and fallback inside temperature bytes.
    pub inside_temperature: [usize; 2],
    /// Primary and fallback outside temperature bytes.
    pub outside_temperature: [usize; 2],
    /// Power consumption bytes.
    pub power: PowerLayout,
}

/// Protocol revision.
///
/// This trait is sealed and can't be implemented outside of this crate.
/// Use [`select`] to obtain the implementation for a [`RevisionKind`].
pub trait Revision: private::Sealed + Debug + Sync {
    /// Returns the revision's identifier.
    fn kind(&self) -> RevisionKind;

    /// Returns the framing parameters.
    fn framing(&self) -> Framing;

    /// Returns the byte layout.
    fn layout(&self) -> &'static Layout;

    /// Returns the poll timing rule.
    fn poll_policy(&self) -> PollPolicy;

    /// Decodes the fan speed from a control block.
    fn decode_fan_speed(&self, control: &[u8]) -> FanSpeed {
        decode_fan_byte(control[self.layout().fan_speed])
    }

    /// Writes the fan speed into a control block.
    fn encode_fan_speed(&self, control: &mut [u8], speed: FanSpeed) {
        control[self.layout().fan_speed] = speed as u8;
    }

    /// Decodes the power consumption in `W` from a payload.
    fn power_consumption(&self, payload: &[u8]) -> Option<i32> {
        let power = &self.layout().power;
        let low = *payload.get(power.low)?;
        let high = *payload.get(power.high)?;
        let offset = *payload.get(power.offset)?;

        Some(i32::from(low) + i32::from(high) * 256 - i32::from(offset))
    }
}

/// Returns the implementation of a protocol revision.
#[must_use]
pub fn select(kind: RevisionKind) -> &'static dyn Revision {
    match kind {
        RevisionKind::Classic => &classic::Classic,
        RevisionKind::Sequenced => &sequenced::Sequenced,
    }
}

/// Reason a poll payload couldn't be decoded.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug)]
pub enum DecodeError {
    /// The payload doesn't contain a full control block.
    PayloadTooShort {
        /// Payload length.
        len: usize,
        /// Required length.
        required: usize,
    },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self {
            Self::PayloadTooShort { len, required } => {
                write!(f, "payload too short ({len} of {required} bytes)")
            }
        }
    }
}

impl core::error::Error for DecodeError {}

/// Contents of a poll response.
#[derive(PartialEq, Clone, Debug)]
pub struct Decoded {
    /// Raw control block, used as the baseline for commands.
    pub control: Vec<u8>,
    /// Operating mode.
    pub mode: Mode,
    /// Target temperature in `°C`, if plausible.
    pub target_temperature: Option<f32>,
    /// Fan speed.
    pub fan_speed: FanSpeed,
    /// Vertical vane position.
    pub vertical_swing: VerticalSwing,
    /// Horizontal vane position.
    pub horizontal_swing: HorizontalSwing,
    /// Combined swing mode.
    pub swing_mode: SwingMode,
    /// Active preset.
    pub preset: Preset,
    /// nanoe switch.
    pub nanoe: bool,
    /// Eco switch.
    pub eco: bool,
    /// Econavi switch.
    pub econavi: bool,
    /// Mild dry switch.
    pub mild_dry: bool,
    /// Inside temperature in `°C`.
    pub inside_temperature: Option<i8>,
    /// Outside temperature in `°C`.
    pub outside_temperature: Option<i8>,
    /// Power consumption in `W`.
    pub power_consumption: Option<i32>,
}

/// Decodes the payload of a poll response.
///
/// Unknown enumeration values fall back to a default and are logged;
/// only a payload without a full control block fails the decode.
pub fn decode(revision: &dyn Revision, payload: &[u8]) -> Result<Decoded, DecodeError> {
    let layout = revision.layout();

    if payload.len() < layout.control_len {
        return Err(DecodeError::PayloadTooShort {
            len: payload.len(),
            required: layout.control_len,
        });
    }

    let control = &payload[..layout.control_len];
    let features = Feature::from_bits_retain(control[layout.features]);
    let eco = decode_eco(control[layout.eco]);
    let swing = control[layout.swing];
    let vertical_swing = decode_vertical_swing(swing >> 4);
    let horizontal_swing = decode_horizontal_swing(swing & 0x0f);

    let decoded = Decoded {
        control: control.to_vec(),
        mode: decode_mode(control[layout.mode]),
        target_temperature: decode_target_temperature(control[layout.target_temperature]),
        fan_speed: revision.decode_fan_speed(control),
        vertical_swing,
        horizontal_swing,
        swing_mode: swing_mode(vertical_swing, horizontal_swing),
        preset: decode_preset(control[layout.features] & layout.preset_mask, eco),
        nanoe: features.contains(Feature::Nanoe),
        eco,
        econavi: features.contains(Feature::Econavi),
        mild_dry: decode_mild_dry(control[layout.mild_dry]),
        inside_temperature: decode_reading(payload, layout.inside_temperature),
        outside_temperature: decode_reading(payload, layout.outside_temperature),
        power_consumption: revision.power_consumption(payload),
    };

    trace!("Decoded poll response: {decoded:?}");

    Ok(decoded)
}

fn decode_mode(byte: u8) -> Mode {
    if byte & 0x0f == 0x00 {
        return Mode::Off;
    }

    match byte >> 4 {
        0x00 => Mode::Auto,
        0x02 => Mode::Dry,
        0x03 => Mode::Cool,
        0x04 => Mode::Heat,
        0x06 => Mode::FanOnly,
        _ => {
            warn!("Received unknown mode {byte:#04x}");

            Mode::Off
        }
    }
}

fn decode_target_temperature(byte: u8) -> Option<f32> {
    let temp = f32::from(byte) * TEMPERATURE_STEP;

    if temp > TEMPERATURE_THRESHOLD {
        warn!("Received out of range target temperature {temp}");

        return None;
    }

    Some(temp)
}

fn decode_mild_dry(byte: u8) -> bool {
    match byte {
        MILD_DRY_ON => true,
        MILD_DRY_OFF => false,
        _ => {
            warn!("Received unknown mild dry value {byte:#04x}");

            false
        }
    }
}

fn decode_fan_byte(byte: u8) -> FanSpeed {
    FanSpeed::from_repr(byte).unwrap_or_else(|| {
        warn!("Received unknown fan speed {byte:#04x}");

        FanSpeed::Auto
    })
}

fn decode_vertical_swing(nibble: u8) -> VerticalSwing {
    VerticalSwing::from_repr(nibble).unwrap_or_else(|| {
        warn!("Received unknown vertical swing position {nibble:#x}");

        VerticalSwing::Unknown
    })
}

fn decode_horizontal_swing(nibble: u8) -> HorizontalSwing {
    HorizontalSwing::from_repr(nibble).unwrap_or_else(|| {
        warn!("Received unknown horizontal swing position {nibble:#x}");

        HorizontalSwing::Unknown
    })
}

fn swing_mode(vertical: VerticalSwing, horizontal: HorizontalSwing) -> SwingMode {
    match (vertical, horizontal) {
        (VerticalSwing::Auto, HorizontalSwing::Auto) => SwingMode::Both,
        (VerticalSwing::Auto, _) => SwingMode::Vertical,
        (_, HorizontalSwing::Auto) => SwingMode::Horizontal,
        _ => SwingMode::Off,
    }
}

fn decode_eco(byte: u8) -> bool {
    match byte {
        ECO_ON => true,
        ECO_OFF => false,
        _ => {
            warn!("Received unknown eco value {byte:#04x}");

            false
        }
    }
}

fn decode_preset(bits: u8, eco: bool) -> Preset {
    if eco {
        return Preset::Eco;
    }

    match bits {
        // 0x04 is the legacy quiet preset
        0x00 | 0x04 => Preset::None,
        0x02 => Preset::Boost,
        _ => {
            warn!("Received unknown preset bits {bits:#04x}");

            Preset::None
        }
    }
}

fn decode_reading(payload: &[u8], [primary, fallback]: [usize; 2]) -> Option<i8> {
    let byte = [primary, fallback]
        .into_iter()
        .filter_map(|idx| payload.get(idx).copied())
        .find(|&byte| byte != NOT_SUPPORTED)?;
    let temp = i8::from_ne_bytes([byte]);

    if f32::from(temp) > TEMPERATURE_THRESHOLD {
        warn!("Received out of range temperature {temp}");

        return None;
    }

    Some(temp)
}

/// Encodes a target temperature for the control block.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn encode_target_temperature(temp: f32) -> u8 {
    // Rounds to the nearest step, callers have range checked the temperature
    (temp / TEMPERATURE_STEP + 0.5) as u8
}

/// Encodes the mild dry switch for the control block.
pub(crate) fn encode_mild_dry(on: bool) -> u8 {
    if on { MILD_DRY_ON } else { MILD_DRY_OFF }
}

/// Encodes the eco switch for the control block.
pub(crate) fn encode_eco(on: bool) -> u8 {
    if on { ECO_ON } else { ECO_OFF }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tests::init_logger;
    use alloc::vec;

    /// Builds a poll response payload around a control block.
    pub fn status_payload(control: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x00; 32];

        payload[..control.len()].copy_from_slice(control);
        payload[16] = 22;
        payload[17] = 9;
        payload[19] = NOT_SUPPORTED;
        payload[20] = NOT_SUPPORTED;
        payload[26] = 0x2c;
        payload[27] = 0x01;
        payload[28] = 0x0a;

        payload
    }

    const CONTROL: [u8; 10] = [0x34, 0x30, 0x80, 0xa0, 0x36, 0x00, 0x00, 0x00, 0x00, 0x00];

    #[test]
    fn decode_control_block() {
        init_logger();

        let decoded = decode(select(RevisionKind::Classic), &status_payload(&CONTROL)).unwrap();

        assert_eq!(decoded.mode, Mode::Cool, "mode should be cool");
        assert_eq!(
            decoded.target_temperature,
            Some(24.0),
            "target temperature should be correct"
        );
        assert_eq!(decoded.fan_speed, FanSpeed::Auto, "fan speed should be auto");
        assert_eq!(decoded.swing_mode, SwingMode::Off, "swing mode should be off");
        assert_eq!(
            decoded.vertical_swing,
            VerticalSwing::Middle,
            "vertical swing should be centered"
        );
        assert_eq!(
            decoded.horizontal_swing,
            HorizontalSwing::Center,
            "horizontal swing should be centered"
        );
        assert_eq!(decoded.preset, Preset::None, "preset should be none");
        assert!(!decoded.mild_dry, "mild dry should be off");
        assert_eq!(decoded.control, CONTROL, "control block should be kept");
    }

    #[test]
    fn decode_power_state() {
        let mut control = CONTROL;

        control[0] = 0x30;

        assert_eq!(
            decode(select(RevisionKind::Classic), &status_payload(&control))
                .unwrap()
                .mode,
            Mode::Off,
            "cleared power nibble should be off"
        );

        control[0] = 0x74;

        assert_eq!(
            decode(select(RevisionKind::Classic), &status_payload(&control))
                .unwrap()
                .mode,
            Mode::Off,
            "unknown mode should fall back to off"
        );
    }

    #[test]
    fn decode_swing() {
        let cases = [
            (0xfd, SwingMode::Both),
            (0x36, SwingMode::Off),
            (0xf6, SwingMode::Vertical),
            (0x3d, SwingMode::Horizontal),
            (0xe9, SwingMode::Off),
        ];

        for (byte, mode) in cases {
            assert_eq!(
                swing_mode(
                    decode_vertical_swing(byte >> 4),
                    decode_horizontal_swing(byte & 0x0f)
                ),
                mode,
                "swing byte {byte:#04x} should be decoded correctly"
            );
        }

        assert_eq!(
            decode_vertical_swing(0x07),
            VerticalSwing::Unknown,
            "unknown nibble should be unknown"
        );
        assert_eq!(
            decode_horizontal_swing(0x00),
            HorizontalSwing::Unsupported,
            "zero nibble should be unsupported"
        );
    }

    #[test]
    fn decode_presets() {
        assert_eq!(decode_preset(0x00, false), Preset::None);
        assert_eq!(decode_preset(0x02, false), Preset::Boost);
        assert_eq!(
            decode_preset(0x04, false),
            Preset::None,
            "legacy quiet preset should be none"
        );
        assert_eq!(
            decode_preset(0x02, true),
            Preset::Eco,
            "eco should take priority over boost"
        );
        assert_eq!(
            decode_preset(0x09, false),
            Preset::None,
            "unknown bits should fall back to none"
        );
    }

    #[test]
    fn decode_readings() {
        let payload = status_payload(&CONTROL);
        let decoded = decode(select(RevisionKind::Classic), &payload).unwrap();

        assert_eq!(
            decoded.inside_temperature,
            Some(22),
            "inside temperature should be read from primary byte"
        );
        assert_eq!(
            decoded.outside_temperature,
            Some(9),
            "outside temperature should be read from primary byte"
        );
        assert_eq!(
            decoded.power_consumption,
            Some(290),
            "power consumption should be correct"
        );

        let mut payload = payload;

        payload[16] = NOT_SUPPORTED;
        payload[19] = 0xfe;
        payload[17] = NOT_SUPPORTED;

        let decoded = decode(select(RevisionKind::Classic), &payload).unwrap();

        assert_eq!(
            decoded.inside_temperature,
            Some(-2),
            "inside temperature should be read from fallback byte"
        );
        assert_eq!(
            decoded.outside_temperature, None,
            "unsupported reading should be none"
        );

        let decoded = decode(select(RevisionKind::Classic), &CONTROL).unwrap();

        assert_eq!(
            decoded.inside_temperature, None,
            "missing reading should be none"
        );
        assert_eq!(
            decoded.power_consumption, None,
            "missing power consumption should be none"
        );
    }

    #[test]
    fn decode_short_payload() {
        assert_eq!(
            decode(select(RevisionKind::Classic), &CONTROL[..9]),
            Err(DecodeError::PayloadTooShort {
                len: 9,
                required: 10
            }),
            "truncated control block should fail"
        );
    }

    #[test]
    fn encode_temperature() {
        assert_eq!(encode_target_temperature(24.0), 0x30);
        assert_eq!(encode_target_temperature(22.5), 0x2d);
        assert_eq!(
            encode_target_temperature(22.7),
            0x2d,
            "temperature should be rounded to the nearest step"
        );
    }
}
