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

use serde::{Deserialize, Serialize};
use std::path::Path;
use time::UtcOffset;

use crate::constants::{DEFAULT_BAUD_RATE, DEFAULT_LOOKAHEAD_FACTOR};
use crate::coordinate::coordinate_system::CoordinateSystem;
use crate::error::{MountError, Result};
use crate::utility::get_config;

fn default_lookahead_factor() -> f64 {
    DEFAULT_LOOKAHEAD_FACTOR
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Config {
    // Steps per full rotation of the hour-angle axis.
    pub x_steps: i64,
    // Steps per full rotation of the declination axis.
    pub y_steps: i64,
    // Seconds per full rotation of the hour-angle axis at the maximum speed.
    pub x_rotation_time: f64,
    // Seconds per full rotation of the declination axis at the maximum speed.
    pub y_rotation_time: f64,
    // Longitude of the site in degree. East is positive.
    pub longitude: f64,
    // Latitude of the site in degree.
    pub latitude: f64,
    // Offset of the local timezone from UTC in hour.
    pub timezone: i8,
    // The tracker plans the segments this many ticks ahead.
    #[serde(default = "default_lookahead_factor")]
    pub lookahead_factor: f64,
    // Baud rate of the serial port of the mount.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

impl Config {
    /// Read the configuration.
    ///
    /// # Arguments
    /// * `filepath` - Path of the configuration file.
    ///
    /// # Returns
    /// A new config object.
    ///
    /// # Errors
    /// Config if the file can not be read or a value is invalid.
    pub fn new(filepath: &Path) -> Result<Self> {
        let config: Self = get_config(filepath)?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Validate the values.
    ///
    /// # Errors
    /// Config if a value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.x_steps <= 0 || self.y_steps <= 0 {
            return Err(MountError::Config(String::from(
                "Steps per rotation should be positive",
            )));
        }

        if self.x_rotation_time <= 0.0 || self.y_rotation_time <= 0.0 {
            return Err(MountError::Config(String::from(
                "Rotation time should be positive",
            )));
        }

        if self.lookahead_factor <= 0.0 {
            return Err(MountError::Config(String::from(
                "Lookahead factor should be positive",
            )));
        }

        if self.baud_rate == 0 {
            return Err(MountError::Config(String::from(
                "Baud rate should be positive",
            )));
        }

        if self.latitude.abs() >= 90.0 {
            return Err(MountError::Config(String::from(
                "Latitude should be in (-90, 90)",
            )));
        }

        self.utc_offset()?;

        Ok(())
    }

    /// Offset of the local timezone.
    ///
    /// # Returns
    /// UTC offset.
    ///
    /// # Errors
    /// Config if the timezone is out of range.
    pub fn utc_offset(&self) -> Result<UtcOffset> {
        UtcOffset::from_hms(self.timezone, 0, 0)
            .map_err(|error| MountError::Config(format!("Invalid timezone: {error}")))
    }

    /// Coordinate system of the site.
    ///
    /// # Returns
    /// Coordinate system.
    ///
    /// # Errors
    /// Config if the timezone is out of range.
    pub fn coordinate_system(&self) -> Result<CoordinateSystem> {
        Ok(CoordinateSystem::new(
            self.utc_offset()?,
            self.longitude,
            self.latitude,
        ))
    }
}
