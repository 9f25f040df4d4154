//! Native asynchronous serial port support for [`Interface`](crate::Interface).
//!
//! Uses the [`serial2-tokio`](https://crates.io/crates/serial2-tokio) crate.
//! A background task reads from the port and forwards the received chunks,
//! so [`ReadReady`] can be answered without waiting on the line.
//!
//! ```no_run
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> panasonic_ac::Result<(), panasonic_ac::serial::PortError> {
//! let mut port = panasonic_ac::serial::open("/dev/ttyUSB0")?;
//! # Ok(())
//! # }
//! ```

extern crate std;

use crate::Error;
use alloc::{collections::VecDeque, sync::Arc, vec::Vec};
use embedded_io_async::{ErrorType, Read, ReadReady, Write};
use log::debug;
use serial2_tokio::{CharSize, Parity, SerialPort, Settings, StopBits};
use std::io;
use tokio::sync::mpsc::{self, UnboundedReceiver, error::TryRecvError};

/// Port-specific error type to be used as `E` for the generic [`Error<E>`] type.
pub type PortError = io::Error;

/// Serial port implementing [`Read`], [`ReadReady`] and [`Write`].
#[derive(Debug)]
pub struct Port {
    port: Arc<SerialPort>,
    rx: UnboundedReceiver<io::Result<Vec<u8>>>,
    pending: VecDeque<u8>,
}

impl Port {
    /// Wraps an opened serial port and spawns its reader task.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(port: SerialPort) -> Self {
        let port = Arc::new(port);
        let reader = Arc::clone(&port);
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut buf = [0x00; 64];

            loop {
                let res = reader.read(&mut buf).await.map(|len| buf[..len].to_vec());
                let failed = res.is_err();

                if tx.send(res).is_err() || failed {
                    debug!("Serial reader task stopped");

                    break;
                }
            }
        });

        Self {
            port,
            rx,
            pending: VecDeque::new(),
        }
    }
}

impl ErrorType for Port {
    type Error = io::Error;
}

impl ReadReady for Port {
    fn read_ready(&mut self) -> Result<bool, io::Error> {
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => self.pending.extend(chunk?),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.pending.is_empty() {
                        return Err(io::ErrorKind::BrokenPipe.into());
                    }

                    break;
                }
            }
        }

        Ok(!self.pending.is_empty())
    }
}

impl Read for Port {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        if self.pending.is_empty() {
            match self.rx.recv().await {
                Some(chunk) => self.pending.extend(chunk?),
                None => return Ok(0),
            }
        }

        let len = buf.len().min(self.pending.len());

        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..len)) {
            *dst = src;
        }

        Ok(len)
    }
}

impl Write for Port {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        self.port.write(buf).await
    }

    async fn flush(&mut self) -> Result<(), io::Error> {
        Ok(())
    }
}

/// Opens a native serial port at the given path.
///
/// Returns a [`Port`] that can be passed to [`Interface::new`](crate::Interface::new).
/// Must be called from within a Tokio runtime.
pub fn open(path: &str) -> Result<Port, Error<io::Error>> {
    let port = SerialPort::open(path, |mut settings: Settings| {
        settings.set_raw();
        settings.set_baud_rate(9600)?;
        settings.set_char_size(CharSize::Bits8);
        settings.set_parity(Parity::Even);
        settings.set_stop_bits(StopBits::One);

        Ok(settings)
    })?;

    port.discard_buffers()?;

    Ok(Port::new(port))
}
