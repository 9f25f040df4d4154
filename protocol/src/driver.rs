//! Protocol driver.
//!
//! [`Driver`] owns all protocol state and performs no I/O. Received bytes are
//! handed to [`Driver::receive`], and [`Driver::tick`] is called periodically
//! to process complete frames and obtain the next frame to transmit.
//! [`Interface`](crate::Interface) wraps a driver and an asynchronous port.
//!
//! Decoded state is reported through a [`Publisher`], which connects the
//! driver to the surrounding entity layer.
//!
//! # Examples
//!
//! ```
//! use core::time::Duration;
//! use panasonic_ac::{
//!     config::Config,
//!     driver::{Driver, Publisher, Sensor},
//!     state::DeviceState,
//! };
//!
//! struct Printer;
//!
//! impl Publisher for Printer {
//!     fn publish_state(&mut self, state: &DeviceState) {
//!         println!("{state:?}");
//!     }
//!
//!     fn publish_sensor(&mut self, sensor: Sensor, value: f32) {
//!         println!("{sensor}: {value}");
//!     }
//! }
//!
//! let mut drv = Driver::new(Config::default(), Printer);
//!
//! // The first poll is sent right away
//! let frame = drv.tick(Duration::ZERO);
//!
//! assert_eq!(frame.as_deref().map(|f| f[0]), Some(0x70));
//! ```

use crate::{
    command::{self, Change, Command},
    config::{Config, Sensors},
    frame::{self, Assembler, FrameError, Header},
    guard::{Guard, SuppressionWindow, Verdict},
    revision::{self, Decoded, Revision},
    scheduler::{Scheduler, Transmission},
    state::{DeviceState, FanSpeed, HorizontalSwing, Mode, Preset, SwingMode, VerticalSwing},
};
use alloc::{vec, vec::Vec};
use core::time::Duration;
use log::{debug, info, trace, warn};
use strum::Display;

/// Receiver of state updates.
pub trait Publisher {
    /// Called with the full state after every accepted poll response
    /// and every optimistic update.
    fn publish_state(&mut self, state: &DeviceState);

    /// Called when an enabled sensor reports a new value.
    fn publish_sensor(&mut self, sensor: Sensor, value: f32);
}

impl<T: Publisher + ?Sized> Publisher for &mut T {
    fn publish_state(&mut self, state: &DeviceState) {
        (**self).publish_state(state);
    }

    fn publish_sensor(&mut self, sensor: Sensor, value: f32) {
        (**self).publish_sensor(sensor, value);
    }
}

/// Sensor reported by the unit.
#[derive(Display, PartialEq, Eq, Copy, Clone, Debug)]
#[strum(serialize_all = "title_case")]
pub enum Sensor {
    /// Inside temperature in `°C`.
    InsideTemperature,
    /// Outside temperature in `°C`.
    OutsideTemperature,
    /// Power consumption in `W`.
    PowerConsumption,
}

/// Session state.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
pub enum Session {
    /// No poll response received yet. Setters are ignored.
    #[default]
    Initializing,
    /// The unit has reported its state.
    Ready,
}

/// Batch of climate changes, applied in field order.
#[derive(PartialEq, Clone, Debug, Default)]
pub struct ClimateCall {
    /// Operating mode.
    pub mode: Option<Mode>,
    /// Target temperature in `°C`.
    pub target_temperature: Option<f32>,
    /// Fan speed.
    pub fan_speed: Option<FanSpeed>,
    /// Combined swing mode.
    pub swing_mode: Option<SwingMode>,
    /// Preset.
    pub preset: Option<Preset>,
}

/// Protocol driver for a single indoor unit.
#[derive(Debug)]
pub struct Driver<U> {
    config: Config,
    revision: &'static dyn Revision,
    assembler: Assembler,
    scheduler: Scheduler,
    guard: Guard,
    command: Command,
    session: Session,
    control: Vec<u8>,
    state: DeviceState,
    published: [Option<i32>; 3],
    counter: u8,
    publisher: U,
}

impl<U: Publisher> Driver<U> {
    /// Constructs a new driver.
    pub fn new(config: Config, publisher: U) -> Self {
        let revision = revision::select(config.revision);

        debug!("Using {} protocol revision", revision.kind());

        Self {
            revision,
            assembler: Assembler::new(config.read_timeout),
            scheduler: Scheduler::new(revision.poll_policy(), &config),
            guard: Guard::new(),
            command: Command::new(),
            session: Session::Initializing,
            control: vec![0x00; revision.layout().control_len],
            state: DeviceState::default(),
            published: [None; 3],
            counter: 0,
            publisher,
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the protocol revision.
    pub fn revision(&self) -> &'static dyn Revision {
        self.revision
    }

    /// Returns the current device state.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Returns the session state.
    pub fn session(&self) -> Session {
        self.session
    }

    /// Returns the control block waiting to be sent, if any.
    pub fn pending_command(&self) -> Option<&[u8]> {
        self.command.peek()
    }

    /// Returns the open suppression window, if any.
    pub fn suppression(&self) -> Option<&SuppressionWindow> {
        self.guard.window()
    }

    /// Returns the publisher.
    pub fn publisher(&self) -> &U {
        &self.publisher
    }

    /// Returns the publisher mutably.
    pub fn publisher_mut(&mut self) -> &mut U {
        &mut self.publisher
    }

    /// Hands received bytes to the driver.
    pub fn receive(&mut self, bytes: &[u8], now: Duration) {
        self.assembler.push(bytes, now);
    }

    /// Advances the driver.
    ///
    /// Processes a complete frame, if one has been received, and returns the
    /// frame that should be transmitted next. At most one frame is returned
    /// per call.
    pub fn tick(&mut self, now: Duration) -> Option<Vec<u8>> {
        if self.assembler.is_ready(now) {
            let buf = self.assembler.take();

            self.handle_frame(&buf, now);
        }

        self.transmit(now)
    }

    /// Sets the operating mode.
    pub fn set_mode(&mut self, mode: Mode) {
        self.submit(Change::Mode(mode));
    }

    /// Sets the target temperature in `°C`.
    ///
    /// Temperatures outside of the supported range are ignored.
    pub fn set_target_temperature(&mut self, temp: f32) {
        self.submit(Change::TargetTemperature(temp));
    }

    /// Sets the fan speed.
    ///
    /// An active preset is cancelled and the change is published immediately.
    pub fn set_fan_speed(&mut self, speed: FanSpeed) {
        if !self.submit(Change::FanSpeed(speed)) {
            return;
        }

        let previous = self.state.preset;

        if previous != Preset::None {
            debug!("Fan speed change cancels preset {previous}");

            let layout = self.revision.layout();
            let cmd = self.command.seed(&self.control);

            command::clear_preset(layout, cmd, previous);
            command::clear_preset(layout, &mut self.control, previous);
            self.guard.close();

            self.state.preset = Preset::None;

            if previous == Preset::Eco {
                self.state.eco = false;
            }

            self.publisher.publish_state(&self.state);
        }
    }

    /// Sets the swing mode.
    ///
    /// Modes not listed in [`Config::swing_modes`] are ignored.
    pub fn set_swing_mode(&mut self, mode: SwingMode) {
        self.submit(Change::SwingMode(mode));
    }

    /// Sets the vertical vane position.
    ///
    /// Ignored if the vertical axis is disabled or the vane is already at `pos`.
    pub fn set_vertical_swing(&mut self, pos: VerticalSwing) {
        self.submit_if_changed(Change::VerticalSwing(pos));
    }

    /// Sets the horizontal vane position.
    ///
    /// Ignored if the horizontal axis is disabled or the vane is already at `pos`.
    pub fn set_horizontal_swing(&mut self, pos: HorizontalSwing) {
        self.submit_if_changed(Change::HorizontalSwing(pos));
    }

    /// Sets the preset.
    ///
    /// The preset is published immediately and protected against stale
    /// poll responses until the unit confirms it.
    pub fn set_preset(&mut self, preset: Preset, now: Duration) {
        let change = Change::Preset(preset);

        if self.submit(change) {
            command::apply(self.revision, &mut self.control, change);
            self.assume(preset, preset == Preset::Eco, now);
        }
    }

    /// Sets the eco switch.
    ///
    /// Turning eco on selects the eco preset. Turning it off drops an active
    /// eco preset. Like [`Driver::set_preset`], the change is published
    /// immediately.
    pub fn set_eco(&mut self, on: bool, now: Duration) {
        let change = Change::Eco(on);

        if self.submit_if_changed(change) {
            let preset = match (on, self.state.preset) {
                (true, _) => Preset::Eco,
                (false, Preset::Eco) => Preset::None,
                (false, preset) => preset,
            };

            command::apply(self.revision, &mut self.control, change);
            self.assume(preset, on, now);
        }
    }

    /// Sets the nanoe switch.
    ///
    /// This and the other switch setters do nothing if the switch is
    /// already in the requested position.
    pub fn set_nanoe(&mut self, on: bool) {
        self.submit_if_changed(Change::Nanoe(on));
    }

    /// Sets the econavi switch.
    pub fn set_econavi(&mut self, on: bool) {
        self.submit_if_changed(Change::Econavi(on));
    }

    /// Sets the mild dry switch.
    pub fn set_mild_dry(&mut self, on: bool) {
        self.submit_if_changed(Change::MildDry(on));
    }

    /// Supplies the current temperature from an external sensor.
    ///
    /// Only has a lasting effect with [`Sensors::ExternalCurrentTemperature`]
    /// enabled, otherwise the next poll response overwrites it.
    pub fn set_current_temperature(&mut self, temp: f32) {
        self.state.current_temperature = Some(temp);
        self.publisher.publish_state(&self.state);
    }

    /// Applies a batch of climate changes.
    pub fn control(&mut self, call: &ClimateCall, now: Duration) {
        if let Some(mode) = call.mode {
            self.set_mode(mode);
        }

        if let Some(temp) = call.target_temperature {
            self.set_target_temperature(temp);
        }

        if let Some(speed) = call.fan_speed {
            self.set_fan_speed(speed);
        }

        if let Some(mode) = call.swing_mode {
            self.set_swing_mode(mode);
        }

        if let Some(preset) = call.preset {
            self.set_preset(preset, now);
        }
    }

    fn submit(&mut self, change: Change) -> bool {
        if self.session != Session::Ready {
            trace!("Ignoring {change:?}, unit hasn't reported its state yet");

            return false;
        }

        if !change.is_valid() || !self.is_supported(change) {
            return false;
        }

        debug!("Requesting {change:?}");

        let cmd = self.command.seed(&self.control);

        command::apply(self.revision, cmd, change);

        true
    }

    fn submit_if_changed(&mut self, change: Change) -> bool {
        let current = self.command.peek().unwrap_or(&self.control[..]);
        let mut requested = current.to_vec();

        command::apply(self.revision, &mut requested, change);

        if requested == current {
            trace!("Ignoring {change:?}, nothing would change");

            return false;
        }

        self.submit(change)
    }

    fn is_supported(&self, change: Change) -> bool {
        let supported = match change {
            Change::SwingMode(mode) => self.config.swing_modes().contains(&mode),
            Change::VerticalSwing(_) => self.config.vertical_swing,
            Change::HorizontalSwing(_) => self.config.horizontal_swing,
            _ => true,
        };

        if !supported {
            warn!("Rejecting {change:?}, swing axis is disabled");
        }

        supported
    }

    fn assume(&mut self, preset: Preset, eco: bool, now: Duration) {
        info!("Preset set to {preset} (eco {eco})");

        self.state.preset = preset;
        self.state.eco = eco;
        self.guard.open(
            now.saturating_add(self.config.suppression_window),
            preset,
            eco,
        );
        self.publisher.publish_state(&self.state);
    }

    fn handle_frame(&mut self, buf: &[u8], now: Duration) {
        let frame = match frame::validate(self.revision.framing(), buf) {
            Ok(frame) => frame,
            Err(err @ (FrameError::TooShort(_) | FrameError::UnknownHeader(_))) => {
                warn!("Dropping invalid frame: {err}");

                return;
            }
            Err(err) => {
                debug!("Dropping invalid frame: {err}");

                return;
            }
        };

        self.scheduler.received(now);

        match frame.header {
            Header::Poll => self.handle_poll(frame.payload, now),
            Header::Control => debug!("Ignoring control frame"),
        }
    }

    fn handle_poll(&mut self, payload: &[u8], now: Duration) {
        let mut decoded = match revision::decode(self.revision, payload) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("Dropping poll response: {err}");

                return;
            }
        };

        let verdict = self.guard.check(now, decoded.preset, decoded.eco);

        if verdict == Verdict::Suppress {
            // Keep the requested preset in the command baseline
            let layout = self.revision.layout();
            let mask = layout.preset_mask;
            let features = &mut decoded.control[layout.features];

            *features = (*features & !mask) | (self.control[layout.features] & mask);
            decoded.control[layout.eco] = self.control[layout.eco];
        }

        self.update_state(decoded, verdict);
        self.publisher.publish_state(&self.state);
        self.publish_sensors();

        if self.session == Session::Initializing {
            info!("Unit reported its state, ready for commands");

            self.session = Session::Ready;
        }
    }

    fn update_state(&mut self, decoded: Decoded, verdict: Verdict) {
        let state = &mut self.state;

        if state.mode != decoded.mode {
            info!("Mode changed to {}", decoded.mode);
        }

        state.mode = decoded.mode;

        if decoded.target_temperature.is_some() {
            state.target_temperature = decoded.target_temperature;
        }

        state.fan_speed = decoded.fan_speed;
        state.swing_mode = decoded.swing_mode;
        state.vertical_swing = decoded.vertical_swing;
        state.horizontal_swing = decoded.horizontal_swing;
        state.nanoe = decoded.nanoe;
        state.econavi = decoded.econavi;
        state.mild_dry = decoded.mild_dry;

        if verdict == Verdict::Apply {
            if state.preset != decoded.preset {
                info!("Preset changed to {}", decoded.preset);
            }

            state.preset = decoded.preset;
            state.eco = decoded.eco;
        }

        if !self
            .config
            .sensors
            .contains(Sensors::ExternalCurrentTemperature)
        {
            if let Some(temp) = decoded.inside_temperature {
                state.current_temperature = Some(f32::from(temp));
            }
        }

        state.inside_temperature = decoded.inside_temperature;
        state.outside_temperature = decoded.outside_temperature;
        state.power_consumption = decoded.power_consumption;

        self.control = decoded.control;
    }

    #[allow(clippy::cast_precision_loss)]
    fn publish_sensors(&mut self) {
        let readings = [
            (
                Sensor::InsideTemperature,
                Sensors::InsideTemperature,
                self.state.inside_temperature.map(i32::from),
            ),
            (
                Sensor::OutsideTemperature,
                Sensors::OutsideTemperature,
                self.state.outside_temperature.map(i32::from),
            ),
            (
                Sensor::PowerConsumption,
                Sensors::PowerConsumption,
                self.state.power_consumption,
            ),
        ];

        for ((sensor, flag, reading), last) in readings.into_iter().zip(&mut self.published) {
            let Some(val) = reading else {
                continue;
            };

            if !self.config.sensors.contains(flag) || *last == Some(val) {
                continue;
            }

            *last = Some(val);
            self.publisher.publish_sensor(sensor, val as f32);
        }
    }

    fn transmit(&mut self, now: Duration) -> Option<Vec<u8>> {
        let frame = match self.scheduler.next(now, self.command.is_pending())? {
            Transmission::Command => {
                let cmd = self.command.take()?;

                debug!("Sending command");

                let frame = self.encode(Header::Control, &cmd)?;

                // Further changes build on the sent block until the next poll
                self.control = cmd;

                frame
            }
            Transmission::Poll => {
                debug!("Polling unit");

                self.encode(Header::Poll, self.revision.layout().poll_payload)?
            }
        };

        self.scheduler.sent(now);

        trace!("TX: {frame:02x?}");

        Some(frame)
    }

    fn encode(&mut self, header: Header, payload: &[u8]) -> Option<Vec<u8>> {
        match frame::encode(self.revision.framing(), header, payload, self.counter) {
            Ok(frame) => {
                self.counter = self.counter.wrapping_add(1);

                Some(frame)
            }
            Err(err) => {
                warn!("Failed to encode frame: {err}");

                None
            }
        }
    }
}
