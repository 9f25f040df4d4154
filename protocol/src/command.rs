//! Command building.
//!
//! A command is a full control block. The first change after a transmission
//! seeds the [`Command`] from the last control block reported by the unit,
//! and every further change edits it in place until it is sent.

use crate::{
    revision::{self, Layout, Revision},
    state::{
        FanSpeed, Feature, HorizontalSwing, MAX_TEMPERATURE, MIN_TEMPERATURE, Mode, Preset,
        SwingMode, VerticalSwing,
    },
};
use alloc::vec::Vec;
use log::{trace, warn};

/// Single requested change of the control block.
#[derive(PartialEq, Copy, Clone, Debug)]
pub enum Change {
    /// Operating mode.
    Mode(Mode),
    /// Target temperature in `°C`.
    TargetTemperature(f32),
    /// Fan speed.
    FanSpeed(FanSpeed),
    /// Combined swing mode.
    SwingMode(SwingMode),
    /// Vertical vane position.
    VerticalSwing(VerticalSwing),
    /// Horizontal vane position.
    HorizontalSwing(HorizontalSwing),
    /// Preset.
    Preset(Preset),
    /// nanoe switch.
    Nanoe(bool),
    /// Econavi switch.
    Econavi(bool),
    /// Mild dry switch.
    MildDry(bool),
    /// Eco switch.
    Eco(bool),
}

impl Change {
    /// Returns `true` if the change can be sent to the unit.
    ///
    /// Rejected changes are logged.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match *self {
            Self::TargetTemperature(temp)
                if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temp) =>
            {
                warn!("Rejecting out of range target temperature {temp}");

                false
            }
            Self::VerticalSwing(pos) if !pos.is_settable() => {
                warn!("Rejecting vertical swing position {pos}");

                false
            }
            Self::HorizontalSwing(pos) if !pos.is_settable() => {
                warn!("Rejecting horizontal swing position {pos}");

                false
            }
            _ => true,
        }
    }
}

/// Pending command.
#[derive(Default, Debug)]
pub struct Command {
    buf: Option<Vec<u8>>,
}

impl Command {
    /// Constructs an empty command.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a command is waiting to be sent.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.buf.is_some()
    }

    /// Returns the pending control block, seeding it from `baseline` if necessary.
    pub fn seed(&mut self, baseline: &[u8]) -> &mut [u8] {
        self.buf.get_or_insert_with(|| {
            trace!("Seeding command from {baseline:02x?}");

            baseline.to_vec()
        })
    }

    /// Returns the pending control block without taking it.
    #[must_use]
    pub fn peek(&self) -> Option<&[u8]> {
        self.buf.as_deref()
    }

    /// Takes the pending control block for transmission.
    pub fn take(&mut self) -> Option<Vec<u8>> {
        self.buf.take()
    }
}

/// Applies a change to a control block.
///
/// The change must have been checked with [`Change::is_valid`].
pub fn apply(revision: &dyn Revision, control: &mut [u8], change: Change) {
    let layout = revision.layout();

    match change {
        Change::Mode(mode) => control[layout.mode] = encode_mode(control[layout.mode], mode),
        Change::TargetTemperature(temp) => {
            control[layout.target_temperature] = revision::encode_target_temperature(temp);
        }
        Change::FanSpeed(speed) => revision.encode_fan_speed(control, speed),
        Change::SwingMode(mode) => control[layout.swing] = mode as u8,
        Change::VerticalSwing(pos) => {
            control[layout.swing] = (control[layout.swing] & 0x0f) | ((pos as u8) << 4);
        }
        Change::HorizontalSwing(pos) => {
            control[layout.swing] = (control[layout.swing] & 0xf0) | (pos as u8 & 0x0f);
        }
        Change::Preset(preset) => encode_preset(layout, control, preset),
        Change::Nanoe(on) => set_feature(layout, control, Feature::Nanoe, on),
        Change::Econavi(on) => set_feature(layout, control, Feature::Econavi, on),
        Change::MildDry(on) => control[layout.mild_dry] = revision::encode_mild_dry(on),
        Change::Eco(true) => encode_preset(layout, control, Preset::Eco),
        Change::Eco(false) => control[layout.eco] = revision::encode_eco(false),
    }
}

/// Clears the preset bits after a fan speed change.
///
/// An active eco preset is switched off as well.
pub fn clear_preset(layout: &Layout, control: &mut [u8], previous: Preset) {
    control[layout.features] &= !layout.preset_mask;

    if previous == Preset::Eco {
        control[layout.eco] = revision::encode_eco(false);
    }
}

fn encode_mode(current: u8, mode: Mode) -> u8 {
    match mode {
        Mode::Auto => 0x04,
        Mode::Dry => 0x24,
        Mode::Cool => 0x34,
        Mode::Heat => 0x44,
        Mode::FanOnly => 0x64,
        // Keep the mode, clear the power nibble
        Mode::Off => current & 0xf0,
    }
}

fn encode_preset(layout: &Layout, control: &mut [u8], preset: Preset) {
    let base = control[layout.features] & !layout.preset_mask;

    let (features, eco) = match preset {
        Preset::None => (base, false),
        Preset::Boost => (base | Feature::Boost.bits(), false),
        Preset::Eco => (base, true),
    };

    control[layout.features] = features;
    control[layout.eco] = revision::encode_eco(eco);
}

fn set_feature(layout: &Layout, control: &mut [u8], feature: Feature, on: bool) {
    let mut features = Feature::from_bits_retain(control[layout.features]);

    features.set(feature, on);
    control[layout.features] = features.bits();
}
