//! Control Panasonic air conditioners via their CN-CNT connector.
//!
//! # Overview
//!
//! The `panasonic-ac` crate implements the serial protocol spoken by the
//! indoor unit's control board on the CN-CNT connector, which is also used by
//! the CZ-TACG1 wireless adapter. It translates the binary frames into a
//! semantic [`DeviceState`](state::DeviceState) and turns requested changes
//! back into control frames.
//!
//! The crate is `no_std` and split into two layers:
//!
//! - The [`driver`] module contains a sans-I/O [`Driver`](driver::Driver) that
//!   owns all protocol state and is advanced by calling
//!   [`Driver::tick`](driver::Driver::tick) with the current time.
//! - The [`Interface`] wraps a driver and an asynchronous port implementing
//!   [`Read`], [`ReadReady`] and [`Write`].
//!
//! # Getting started
//!
//! The CN-CNT connector exposes a 5 V UART configured as follows:
//!
//! - **Baud rate:** 9600
//! - **Parity:** Even
//! - **Data bits:** 8
//! - **Stop bits:** 1
//!
//! If you enable the `native-serial` feature, you can obtain a compatible
//! serial port instance using [`serial::open`].
//!
//! # Examples
//!
//! Implement [`Publisher`](driver::Publisher) to receive state updates and
//! tick the [`Interface`] from your event loop:
//!
//! ```no_run
//! use panasonic_ac::{
//!     Interface,
//!     config::Config,
//!     driver::{Publisher, Sensor},
//!     embedded_io_async::{Read, ReadReady, Write},
//!     state::DeviceState,
//! };
//! use std::time::Instant;
//!
//! struct Printer;
//!
//! impl Publisher for Printer {
//!     fn publish_state(&mut self, state: &DeviceState) {
//!         println!("{state:?} ({})", state.action());
//!     }
//!
//!     fn publish_sensor(&mut self, sensor: Sensor, value: f32) {
//!         println!("{sensor}: {value}");
//!     }
//! }
//!
//! async fn run<P>(port: P) -> panasonic_ac::Result<(), P::Error>
//! where
//!     P: Read + ReadReady + Write,
//! {
//!     let mut intf = Interface::new(port, Config::default(), Printer);
//!     let start = Instant::now();
//!
//!     loop {
//!         intf.tick(start.elapsed()).await?;
//!
//!         // Wait a few milliseconds using the runtime's timer
//!     }
//! }
//! ```
//!
//! # Protocol details
//!
//! Frames are not delimited; a frame ends when the line has been idle for
//! 20 ms. The unit only speaks when spoken to: it answers poll requests with
//! its full state and accepts control frames containing a complete 10-byte
//! control block. Newer units use a slightly different
//! [revision](revision::RevisionKind) of the protocol with a frame counter.

#![no_std]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

pub mod command;
pub mod config;
pub mod driver;
pub mod frame;
pub mod guard;
pub mod revision;
pub mod scheduler;
pub mod state;

#[cfg(feature = "native-serial")]
#[cfg_attr(docsrs, doc(cfg(feature = "native-serial")))]
pub mod serial;

pub use embedded_io_async;

use config::Config;
use core::{
    fmt::{Display, Formatter},
    time::Duration,
};
use driver::{Driver, Publisher};
use embedded_io_async::{Read, ReadReady, Write};
use log::trace;

/// A specialized [`Result`] type for [`Interface`] operations.
///
/// Uses [`Error<E>`] as the error variant, which can include port-specific errors.
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Error type for [`Interface`] operations.
///
/// Protocol errors such as corrupted frames are handled by the driver and
/// never surface here. The generic parameter `E` carries the port-specific error.
///
/// This enum is marked `#[non_exhaustive]` to allow for future variants.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug)]
pub enum Error<E> {
    /// A port-specific input/output error.
    Io(E),
}

impl<E: core::error::Error> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "input/output error: {err}"),
        }
    }
}

impl<E: core::error::Error> core::error::Error for Error<E> {}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Self::Io(err)
    }
}

/// Asynchronous protocol interface.
///
/// Couples a [`Driver`] with a port that implements [`Read`], [`ReadReady`]
/// and [`Write`]. [`Interface::tick`] has to be called periodically, ideally
/// every few milliseconds, so frame boundaries are detected on time.
#[derive(Debug)]
pub struct Interface<P, U> {
    port: P,
    driver: Driver<U>,
}

impl<P: Read + ReadReady + Write, U: Publisher> Interface<P, U> {
    /// Constructs a new interface.
    pub fn new(port: P, config: Config, publisher: U) -> Self {
        Self {
            port,
            driver: Driver::new(config, publisher),
        }
    }

    /// Returns the driver.
    pub fn driver(&self) -> &Driver<U> {
        &self.driver
    }

    /// Returns the driver mutably, e.g. to request changes.
    pub fn driver_mut(&mut self) -> &mut Driver<U> {
        &mut self.driver
    }

    /// Releases the port and the driver.
    pub fn into_parts(self) -> (P, Driver<U>) {
        (self.port, self.driver)
    }

    /// Advances the interface.
    ///
    /// Reads all bytes the port has available, advances the driver and writes
    /// the frame it produces, if any. `now` is the time since an arbitrary,
    /// fixed point in the past.
    pub async fn tick(&mut self, now: Duration) -> Result<(), P::Error> {
        let mut buf = [0x00; 64];

        while self.port.read_ready()? {
            let len = self.port.read(&mut buf).await?;

            if len == 0 {
                break;
            }

            trace!("Read from port: {:02x?}", &buf[..len]);

            self.driver.receive(&buf[..len], now);
        }

        if let Some(frame) = self.driver.tick(now) {
            trace!("Write to port: {frame:02x?}");

            self.port.write_all(&frame).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        driver::{Sensor, Session},
        frame::Header,
        revision::{RevisionKind, select, tests::status_payload},
        state::{DeviceState, Mode},
    };
    use alloc::{collections::VecDeque, vec::Vec};
    use core::convert::Infallible;
    use embedded_io_async::ErrorType;
    use log::LevelFilter;

    pub fn init_logger() {
        let _ = env_logger::builder()
            .filter_level(LevelFilter::max())
            .is_test(true)
            .try_init();
    }

    /// Publisher that records everything it receives.
    #[derive(Default, Debug)]
    pub struct Recorder {
        pub states: Vec<DeviceState>,
        pub sensors: Vec<(Sensor, f32)>,
    }

    impl Publisher for Recorder {
        fn publish_state(&mut self, state: &DeviceState) {
            self.states.push(state.clone());
        }

        fn publish_sensor(&mut self, sensor: Sensor, value: f32) {
            self.sensors.push((sensor, value));
        }
    }

    #[derive(Default, Debug)]
    struct MockPort {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
    }

    impl ErrorType for MockPort {
        type Error = Infallible;
    }

    impl ReadReady for MockPort {
        fn read_ready(&mut self) -> core::result::Result<bool, Infallible> {
            Ok(!self.rx.is_empty())
        }
    }

    impl Read for MockPort {
        async fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Infallible> {
            let len = buf.len().min(self.rx.len());

            for (dst, src) in buf.iter_mut().zip(self.rx.drain(..len)) {
                *dst = src;
            }

            Ok(len)
        }
    }

    impl Write for MockPort {
        async fn write(&mut self, buf: &[u8]) -> core::result::Result<usize, Infallible> {
            self.tx.extend_from_slice(buf);

            Ok(buf.len())
        }

        async fn flush(&mut self) -> core::result::Result<(), Infallible> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn tick_cycle() -> Result<(), Infallible> {
        init_logger();

        let mut recorder = Recorder::default();
        let mut intf = Interface::new(MockPort::default(), Config::default(), &mut recorder);

        intf.tick(Duration::ZERO).await?;

        let mut poll = alloc::vec![0x70, 0x0a];

        poll.extend_from_slice(&[0x00; 10]);
        poll.push(0x86);

        assert_eq!(intf.port.tx, poll, "poll should be written");

        let response = frame::encode(
            select(RevisionKind::Classic).framing(),
            Header::Poll,
            &status_payload(&[0x34, 0x30, 0x80, 0xa0, 0x36, 0x00, 0x00, 0x00, 0x00, 0x00]),
            0,
        )
        .unwrap();

        intf.port.rx.extend(&response);
        intf.tick(Duration::from_millis(100)).await?;

        assert!(intf.port.rx.is_empty(), "port should be drained");
        assert_eq!(
            intf.driver().session(),
            Session::Initializing,
            "frame should not be complete yet"
        );

        intf.tick(Duration::from_millis(130)).await?;

        assert_eq!(intf.driver().session(), Session::Ready, "driver should be ready");

        intf.driver_mut().set_mode(Mode::Off);
        intf.tick(Duration::from_millis(400)).await?;

        let (port, _) = intf.into_parts();

        assert_eq!(port.tx.len(), 26, "command should be written");
        assert_eq!(port.tx[13..16], [0xf0, 0x0a, 0x30], "command should turn unit off");
        assert_eq!(recorder.states.len(), 1, "state should be published");

        Ok(())
    }
}
