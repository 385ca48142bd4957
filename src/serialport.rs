//! [`Transport`] over a local serial port using the `serialport` crate.
//!
//! LCUS boards enumerate as a CH340 USB serial bridge and talk 9600 baud, 8N1.

use crate::{Result, Transport};
use std::io::{self, Read, Write};
use std::time::Duration;

pub const BAUD_RATE: u32 = 9600;

pub struct SerialTransport {
    serial: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    /// Opens `port`; `timeout` bounds every read and therefore ends a status burst.
    pub fn open(port: &str, timeout: Duration) -> Result<Self> {
        log::debug!("open serial port '{port}' with timeout {timeout:?}");
        Ok(Self {
            serial: serialport::new(port, BAUD_RATE)
                .data_bits(serialport::DataBits::Eight)
                .parity(serialport::Parity::None)
                .stop_bits(serialport::StopBits::One)
                .flow_control(serialport::FlowControl::None)
                .timeout(timeout)
                .open()?,
        })
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        log::trace!("set timeout to {timeout:?}");
        self.serial.set_timeout(timeout)?;
        Ok(())
    }

    pub fn name(&self) -> Option<String> {
        self.serial.name()
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.serial.name())
            .finish()
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.serial.write_all(bytes)
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        read_line_from(&mut self.serial)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        loop {
            let pending = self.serial.bytes_to_read()?;
            if pending == 0 {
                return Ok(());
            }
            log::trace!("Got {pending} pending bytes");
            let mut buf: Vec<u8> = vec![0; 64];
            let received = self.serial.read(buf.as_mut_slice())?;
            log::trace!("Discard {} pending bytes: {:02X?}", received, &buf[..received]);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.serial.flush()
    }
}

/// Reads byte by byte until `\n`, end of stream or a read timeout.
///
/// A timeout in the middle of a line returns the partial line, the remainder is returned by
/// the next call.
fn read_line_from<R: Read + ?Sized>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                line.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::TimedOut => {
                log::trace!("read timed out after {} bytes", line.len());
                break;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(line)
}

// The port itself is closed when `serial` is dropped.
impl Drop for SerialTransport {
    fn drop(&mut self) {
        if let Err(err) = self.serial.flush() {
            log::warn!("Cannot flush serial connection: {err}");
        }
    }
}
