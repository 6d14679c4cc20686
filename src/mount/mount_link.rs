// This file is part of run_mount_controller.
//
// Developed for the equatorial mount control system.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use log::{debug, info};
use serialport::{ClearBuffer, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::constants::{LINK_READ_TIMEOUT_MS, LINK_TERMINATOR};
use crate::error::{MountError, Result};

// Size of one read from the port.
const READ_CHUNK_SIZE: usize = 256;

/// Line-oriented byte link to the mount firmware.
pub trait MountLink: Send {
    /// Write one line. The terminator is appended by the link.
    ///
    /// # Arguments
    /// * `line` - Line without the terminator.
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Read one line with a bounded wait.
    ///
    /// # Arguments
    /// * `timeout` - Maximum wait.
    ///
    /// # Returns
    /// The line without the terminator, or None if nothing arrives in time.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>>;

    /// Drop the received input that nobody has read, such as a reply that
    /// arrives after its timeout.
    fn clear_input(&mut self) -> Result<()>;
}

/// Splitter of the received bytes into lines. Both "\r" and "\n" end a line
/// and the empty lines are dropped.
#[derive(Debug, Default)]
pub struct LineBuffer {
    _buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the received bytes.
    ///
    /// # Arguments
    /// * `data` - Received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self._buffer.extend_from_slice(data);
    }

    /// Take the first complete line.
    ///
    /// # Returns
    /// The line without the terminator, or None if no line is complete.
    pub fn pop_line(&mut self) -> Option<String> {
        while let Some(index) = self
            ._buffer
            .iter()
            .position(|byte| *byte == b'\r' || *byte == b'\n')
        {
            let line: Vec<u8> = self._buffer.drain(..=index).collect();
            if index > 0 {
                return Some(String::from_utf8_lossy(&line[..index]).into_owned());
            }
        }

        None
    }

    pub fn clear(&mut self) {
        self._buffer.clear();
    }

    pub fn is_empty(&self) -> bool {
        self._buffer.is_empty()
    }
}

/// Link over the serial port of the mount. The port should be configured
/// already except the baud rate.
pub struct SerialLink {
    _name: String,
    _port: Box<dyn SerialPort>,
    _lines: LineBuffer,
}

impl SerialLink {
    /// Open the serial port.
    ///
    /// # Arguments
    /// * `path` - Path of the device.
    /// * `baud_rate` - Baud rate.
    ///
    /// # Returns
    /// A new serial link.
    ///
    /// # Errors
    /// Serial if the port can not be opened.
    pub fn open(path: &Path, baud_rate: u32) -> Result<Self> {
        let name = path.to_string_lossy().into_owned();
        info!("Opening serial port: {name} at {baud_rate} bps.");

        let port = serialport::new(name.as_str(), baud_rate)
            .timeout(Duration::from_millis(LINK_READ_TIMEOUT_MS))
            .open()?;

        Ok(Self {
            _name: name,
            _port: port,
            _lines: LineBuffer::new(),
        })
    }
}

impl MountLink for SerialLink {
    fn write_line(&mut self, line: &str) -> Result<()> {
        self._port.write_all(line.as_bytes())?;
        self._port.write_all(LINK_TERMINATOR.as_bytes())?;
        self._port.flush()?;

        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0; READ_CHUNK_SIZE];

        loop {
            if let Some(line) = self._lines.pop_line() {
                return Ok(Some(line));
            }

            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) if !remaining.is_zero() => remaining,
                _ => return Ok(None),
            };
            self._port.set_timeout(remaining)?;

            match self._port.read(&mut chunk) {
                Ok(0) => {
                    return Err(MountError::Link(format!("{} is closed", self._name)));
                }

                Ok(size) => self._lines.push(&chunk[..size]),

                Err(error)
                    if matches!(
                        error.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    continue
                }

                Err(error) => return Err(error.into()),
            }
        }
    }

    fn clear_input(&mut self) -> Result<()> {
        if !self._lines.is_empty() {
            debug!("{} drops the unread input.", self._name);
        }

        self._lines.clear();
        self._port.clear(ClearBuffer::Input)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_line() {
        let mut lines = LineBuffer::new();

        lines.push(b"1 2 3\r\n\r\n:busy\rok");

        assert_eq!(lines.pop_line().unwrap(), "1 2 3");
        assert_eq!(lines.pop_line().unwrap(), ":busy");

        // Not complete yet.
        assert!(lines.pop_line().is_none());

        lines.push(b"\n");

        assert_eq!(lines.pop_line().unwrap(), "ok");
        assert!(lines.pop_line().is_none());
        assert!(lines.is_empty());
    }

    #[test]
    fn test_pop_line_only_terminators() {
        let mut lines = LineBuffer::new();

        lines.push(b"\r\n\n\r");

        assert!(lines.pop_line().is_none());
        assert!(lines.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut lines = LineBuffer::new();

        lines.push(b"0 5 5\r\n0 7");
        lines.clear();
        lines.push(b"0 7 7\r\n");

        assert_eq!(lines.pop_line().unwrap(), "0 7 7");
    }

    #[test]
    fn test_open_fail() {
        assert!(matches!(
            SerialLink::open(Path::new("/wrong/device"), 115200),
            Err(MountError::Serial(_))
        ));
    }
}
