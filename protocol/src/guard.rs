//! Optimistic preset updates.
//!
//! The unit keeps reporting the old preset for a while after a preset
//! command has been sent. To keep the published state from flickering, the
//! requested preset is published right away and contradicting poll responses
//! are ignored until the unit confirms the change or the window expires.

use crate::state::Preset;
use core::time::Duration;
use log::{debug, info};

/// Expected preset state and the time until which it is protected.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct SuppressionWindow {
    /// End of the window.
    pub deadline: Duration,
    /// Requested preset.
    pub preset: Preset,
    /// Requested eco switch state.
    pub eco: bool,
}

/// Outcome of checking a poll response against the open window.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Verdict {
    /// Apply the reported preset and eco state.
    Apply,
    /// Keep the optimistic preset and eco state.
    Suppress,
}

/// Tracks the suppression window.
#[derive(Default, Debug)]
pub struct Guard {
    window: Option<SuppressionWindow>,
}

impl Guard {
    /// Constructs a guard without an open window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a window, replacing any previous one.
    pub fn open(&mut self, deadline: Duration, preset: Preset, eco: bool) {
        debug!("Suppressing preset updates until {deadline:?}, expecting {preset} (eco {eco})");

        self.window = Some(SuppressionWindow {
            deadline,
            preset,
            eco,
        });
    }

    /// Closes the window.
    pub fn close(&mut self) {
        self.window = None;
    }

    /// Returns the open window, if any.
    #[must_use]
    pub fn window(&self) -> Option<&SuppressionWindow> {
        self.window.as_ref()
    }

    /// Checks a reported preset and eco state against the open window.
    ///
    /// The window closes once the unit confirms the expected state or the
    /// deadline has passed.
    pub fn check(&mut self, now: Duration, preset: Preset, eco: bool) -> Verdict {
        let Some(window) = self.window else {
            return Verdict::Apply;
        };

        if now > window.deadline {
            info!(
                "Unit didn't confirm preset {} in time, using reported preset {preset}",
                window.preset
            );

            self.window = None;

            Verdict::Apply
        } else if window.preset == preset && window.eco == eco {
            debug!("Unit confirmed preset {preset}");

            self.window = None;

            Verdict::Apply
        } else {
            debug!(
                "Ignoring reported preset {preset} (eco {eco}), expecting {}",
                window.preset
            );

            Verdict::Suppress
        }
    }
}
