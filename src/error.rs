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

use thiserror::Error;

/// Result type used by the mount control system.
pub type Result<T> = std::result::Result<T, MountError>;

/// Errors of the mount control system.
#[derive(Error, Debug)]
pub enum MountError {
    /// No reply from the mount within the read timeout, or the link is gone.
    #[error("Mount link failure: {0}")]
    Link(String),

    /// I/O errors of the physical link or the TCP/IP server.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors of the serial port of the mount.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The firmware replied with a line that can not be parsed.
    #[error("Protocol parse error: {0}")]
    ProtocolParse(String),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for MountError {
    fn from(error: config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

impl MountError {
    /// Create a new protocol parse error.
    ///
    /// # Arguments
    /// * `reply` - Reply that fails to parse.
    /// * `reason` - Reason of the failure.
    ///
    /// # Returns
    /// Protocol parse error.
    pub fn protocol_parse(reply: &str, reason: &str) -> Self {
        Self::ProtocolParse(format!("{reason} in the reply: {reply:?}"))
    }

    /// The error means the mount is disconnected or not.
    ///
    /// # Returns
    /// True if the link is lost, false otherwise.
    pub fn is_link_failure(&self) -> bool {
        matches!(self, Self::Link(_) | Self::Io(_) | Self::Serial(_))
    }
}
