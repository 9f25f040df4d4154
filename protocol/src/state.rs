//! Semantic device state.
//!
//! [`DeviceState`] is the snapshot published to the entity layer. It is
//! filled from decoded poll frames and, for presets, optimistically from
//! setter calls (see [`driver`](crate::driver)).
//!
//! The enumerations with a `u8` representation carry the value used on the wire,
//! so they can be converted with [`FromRepr`] when decoding and cast back when
//! building commands.

use bitflags_derive::{FlagsDebug, FlagsDisplay};
use strum::{Display, EnumString, FromRepr, VariantNames};

/// Lowest target temperature accepted by the unit, in `°C`.
pub const MIN_TEMPERATURE: f32 = 16.0;

/// Highest target temperature accepted by the unit, in `°C`.
pub const MAX_TEMPERATURE: f32 = 30.0;

/// Resolution of the target temperature byte, in `°C` per unit.
pub const TEMPERATURE_STEP: f32 = 0.5;

/// Hysteresis used when deriving the current [`Action`], in `°C`.
pub const TEMPERATURE_TOLERANCE: f32 = 2.0;

/// Readings above this value are treated as garbage and dropped, in `°C`.
pub const TEMPERATURE_THRESHOLD: f32 = 100.0;

/// Climate operating mode.
///
/// The unit encodes the mode in the high nibble of the first control byte
/// and the power state in the low nibble. A cleared low nibble means off,
/// regardless of the selected mode.
#[derive(Display, EnumString, VariantNames, PartialEq, Eq, Copy, Clone, Debug, Default)]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    /// Unit is powered off.
    #[default]
    Off,
    /// Automatic heating or cooling (`heat_cool`).
    Auto,
    /// Cooling.
    Cool,
    /// Heating.
    Heat,
    /// Dehumidifying.
    Dry,
    /// Fan only, without heating or cooling.
    FanOnly,
}

/// Fan speed.
///
/// The discriminant is the value of the fan speed control byte.
#[derive(
    FromRepr, Display, EnumString, VariantNames, PartialEq, Eq, Copy, Clone, Debug, Default,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum FanSpeed {
    /// Unit selects the speed.
    #[default]
    Auto = 0xa0,
    /// Quiet operation.
    Quiet = 0x28,
    /// Speed 1.
    Diffuse = 0x30,
    /// Speed 2.
    Low = 0x40,
    /// Speed 3.
    Medium = 0x50,
    /// Speed 4.
    High = 0x60,
    /// Speed 5.
    Focus = 0x70,
}

/// Vertical vane position, stored in the high nibble of the swing byte.
#[derive(
    FromRepr, Display, EnumString, VariantNames, PartialEq, Eq, Copy, Clone, Debug, Default,
)]
#[strum(serialize_all = "title_case")]
#[repr(u8)]
pub enum VerticalSwing {
    /// Unit has no vertical vane.
    Unsupported = 0x00,
    /// Top position.
    Top = 0x01,
    /// Between top and middle.
    TopMiddle = 0x02,
    /// Middle position.
    Middle = 0x03,
    /// Between middle and bottom.
    BottomMiddle = 0x04,
    /// Bottom position.
    Bottom = 0x05,
    /// Continuous sweep.
    Swing = 0x0e,
    /// Unit selects the position.
    Auto = 0x0f,
    /// Nibble value not recognized.
    #[default]
    Unknown = 0xff,
}

impl VerticalSwing {
    /// Returns `true` if the position can be requested from the unit.
    #[must_use]
    pub fn is_settable(self) -> bool {
        !matches!(self, Self::Unsupported | Self::Unknown)
    }
}

/// Horizontal vane position, stored in the low nibble of the swing byte.
#[derive(
    FromRepr, Display, EnumString, VariantNames, PartialEq, Eq, Copy, Clone, Debug, Default,
)]
#[strum(serialize_all = "title_case")]
#[repr(u8)]
pub enum HorizontalSwing {
    /// Unit has no horizontal vane.
    Unsupported = 0x00,
    /// Center position.
    Center = 0x06,
    /// Leftmost position.
    Left = 0x09,
    /// Between left and center.
    LeftCenter = 0x0a,
    /// Between center and right.
    RightCenter = 0x0b,
    /// Rightmost position.
    Right = 0x0c,
    /// Unit selects the position.
    Auto = 0x0d,
    /// Nibble value not recognized.
    #[default]
    Unknown = 0xff,
}

impl HorizontalSwing {
    /// Returns `true` if the position can be requested from the unit.
    #[must_use]
    pub fn is_settable(self) -> bool {
        !matches!(self, Self::Unsupported | Self::Unknown)
    }
}

/// Climate swing mode, combining both vane axes.
///
/// The discriminant is the full swing byte written when the mode is requested.
/// Axes that are not swinging are reset to their center position.
#[derive(
    FromRepr, Display, EnumString, VariantNames, PartialEq, Eq, Copy, Clone, Debug, Default,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum SwingMode {
    /// Both vanes centered.
    #[default]
    Off = 0x36,
    /// Both vanes on auto.
    Both = 0xfd,
    /// Vertical vane on auto, horizontal centered.
    Vertical = 0xf6,
    /// Horizontal vane on auto, vertical centered.
    Horizontal = 0x3d,
}

/// Climate preset.
#[derive(Display, EnumString, VariantNames, PartialEq, Eq, Copy, Clone, Debug, Default)]
#[strum(serialize_all = "snake_case")]
pub enum Preset {
    /// No preset active.
    #[default]
    None,
    /// Powerful mode.
    Boost,
    /// Energy saving mode.
    Eco,
}

/// What the unit is currently doing, derived from mode and temperatures.
#[derive(Display, PartialEq, Eq, Copy, Clone, Debug)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    /// Unit is off.
    Off,
    /// Actively cooling.
    Cooling,
    /// Actively heating.
    Heating,
    /// Dehumidifying.
    Drying,
    /// On, but neither heating nor cooling.
    Idle,
    /// Only running the fan.
    Fan,
}

bitflags::bitflags! {
    /// Feature bits packed into the preset byte.
    ///
    /// Only the low nibble takes part in preset selection; the high nibble
    /// carries independent feature switches.
    #[derive(FlagsDisplay, FlagsDebug, PartialEq, Eq, Copy, Clone)]
    pub struct Feature: u8 {
        /// Powerful mode.
        const Boost = 0x02;
        /// Quiet fan. Older firmware used this bit as a quiet preset.
        const Quiet = 0x04;
        /// Econavi presence/sunlight sensing.
        const Econavi = 0x10;
        /// nanoe air purification.
        const Nanoe = 0x40;
    }
}

/// Decoded snapshot of the unit.
///
/// Fields that the unit has not reported yet are `None`, or hold their
/// default value for enumerations.
#[derive(PartialEq, Clone, Debug, Default)]
pub struct DeviceState {
    /// Operating mode.
    pub mode: Mode,
    /// Target temperature in `°C`.
    pub target_temperature: Option<f32>,
    /// Current room temperature in `°C`.
    ///
    /// Taken from the unit's inside sensor, unless an external sensor
    /// is configured.
    pub current_temperature: Option<f32>,
    /// Fan speed.
    pub fan_speed: FanSpeed,
    /// Combined swing mode.
    pub swing_mode: SwingMode,
    /// Vertical vane position.
    pub vertical_swing: VerticalSwing,
    /// Horizontal vane position.
    pub horizontal_swing: HorizontalSwing,
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
    /// Inside temperature reading in `°C`.
    pub inside_temperature: Option<i8>,
    /// Outside temperature reading in `°C`.
    pub outside_temperature: Option<i8>,
    /// Power consumption in `W`.
    pub power_consumption: Option<i32>,
}

impl DeviceState {
    /// Derives the current [`Action`].
    ///
    /// Heating and cooling are only reported when both the current and the
    /// target temperature are known.
    #[must_use]
    pub fn action(&self) -> Action {
        match self.mode {
            Mode::Off => Action::Off,
            Mode::FanOnly => Action::Fan,
            Mode::Dry => Action::Drying,
            mode => match (self.current_temperature, self.target_temperature) {
                (Some(current), Some(target))
                    if matches!(mode, Mode::Cool | Mode::Auto)
                        && current + TEMPERATURE_TOLERANCE >= target =>
                {
                    Action::Cooling
                }
                (Some(current), Some(target))
                    if matches!(mode, Mode::Heat | Mode::Auto)
                        && current - TEMPERATURE_TOLERANCE <= target =>
                {
                    Action::Heating
                }
                _ => Action::Idle,
            },
        }
    }
}
