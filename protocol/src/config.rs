//! Driver configuration.

use crate::{revision::RevisionKind, state::SwingMode};
use alloc::vec::Vec;
use bitflags_derive::{FlagsDebug, FlagsDisplay, FlagsFromStr};
use core::time::Duration;

/// Default interval between poll frames.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Default minimum spacing between two transmitted frames.
pub const COMMAND_INTERVAL: Duration = Duration::from_millis(250);

/// Default line inactivity after which the receive buffer is a complete frame.
pub const READ_TIMEOUT: Duration = Duration::from_millis(20);

/// Default time after which an outstanding response is abandoned.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default lifetime of an optimistic preset update.
pub const SUPPRESSION_WINDOW: Duration = Duration::from_secs(10);

bitflags::bitflags! {
    /// Optional sensors wired to the driver.
    #[derive(FlagsDisplay, FlagsFromStr, FlagsDebug, PartialEq, Eq, Copy, Clone)]
    pub struct Sensors: u8 {
        /// Publish the unit's inside temperature reading.
        const InsideTemperature = 0x01;
        /// Publish the unit's outside temperature reading.
        const OutsideTemperature = 0x02;
        /// Publish the unit's power consumption.
        const PowerConsumption = 0x04;
        /// Current temperature is supplied externally
        /// (see [`Driver::set_current_temperature`](crate::driver::Driver::set_current_temperature)).
        const ExternalCurrentTemperature = 0x08;
    }
}

/// Driver configuration.
///
/// Create it using [`Config::default`] and adjust it with the `with_*` methods.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Config {
    /// Protocol revision spoken by the unit.
    pub revision: RevisionKind,
    /// Unit has a vertical vane.
    pub vertical_swing: bool,
    /// Unit has a horizontal vane.
    pub horizontal_swing: bool,
    /// Interval between poll frames.
    pub poll_interval: Duration,
    /// Minimum spacing between two transmitted frames.
    pub command_interval: Duration,
    /// Line inactivity that terminates a frame.
    pub read_timeout: Duration,
    /// Time after which an outstanding response is abandoned.
    pub response_timeout: Duration,
    /// Lifetime of an optimistic preset update.
    pub suppression_window: Duration,
    /// Enabled sensors.
    pub sensors: Sensors,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            revision: RevisionKind::default(),
            vertical_swing: true,
            horizontal_swing: true,
            poll_interval: POLL_INTERVAL,
            command_interval: COMMAND_INTERVAL,
            read_timeout: READ_TIMEOUT,
            response_timeout: RESPONSE_TIMEOUT,
            suppression_window: SUPPRESSION_WINDOW,
            sensors: Sensors::InsideTemperature
                | Sensors::OutsideTemperature
                | Sensors::PowerConsumption,
        }
    }
}

impl Config {
    /// Sets the protocol revision.
    #[must_use]
    pub fn with_revision(mut self, revision: RevisionKind) -> Self {
        self.revision = revision;
        self
    }

    /// Enables or disables the swing axes.
    #[must_use]
    pub fn with_swing(mut self, vertical: bool, horizontal: bool) -> Self {
        self.vertical_swing = vertical;
        self.horizontal_swing = horizontal;
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the minimum spacing between transmitted frames.
    #[must_use]
    pub fn with_command_interval(mut self, interval: Duration) -> Self {
        self.command_interval = interval;
        self
    }

    /// Sets the frame inactivity timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the response timeout.
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Sets the lifetime of optimistic preset updates.
    #[must_use]
    pub fn with_suppression_window(mut self, window: Duration) -> Self {
        self.suppression_window = window;
        self
    }

    /// Sets the enabled sensors.
    #[must_use]
    pub fn with_sensors(mut self, sensors: Sensors) -> Self {
        self.sensors = sensors;
        self
    }

    /// Returns the swing modes supported by the enabled axes.
    #[must_use]
    pub fn swing_modes(&self) -> Vec<SwingMode> {
        let mut modes = Vec::new();

        if self.vertical_swing || self.horizontal_swing {
            modes.push(SwingMode::Off);
        }

        if self.vertical_swing {
            modes.push(SwingMode::Vertical);
        }

        if self.horizontal_swing {
            modes.push(SwingMode::Horizontal);
        }

        if self.vertical_swing && self.horizontal_swing {
            modes.push(SwingMode::Both);
        }

        modes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swing_modes() {
        assert_eq!(
            Config::default().swing_modes(),
            [
                SwingMode::Off,
                SwingMode::Vertical,
                SwingMode::Horizontal,
                SwingMode::Both
            ],
            "both axes should support every swing mode"
        );
        assert_eq!(
            Config::default().with_swing(true, false).swing_modes(),
            [SwingMode::Off, SwingMode::Vertical],
            "vertical axis should only support vertical swing"
        );
        assert!(
            Config::default()
                .with_swing(false, false)
                .swing_modes()
                .is_empty(),
            "no axes should not support swing"
        );
    }

    #[test]
    fn parse_sensors() {
        assert_eq!(
            "InsideTemperature | PowerConsumption"
                .parse::<Sensors>()
                .ok(),
            Some(Sensors::InsideTemperature | Sensors::PowerConsumption),
            "sensors should parse from their names"
        );
    }
}
