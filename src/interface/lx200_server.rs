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

use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::constants::{LX200_TERMINATOR, SIDEREAL_SYNC_SPEED};
use crate::coordinate::sexagesimal::{format_dms, format_hms, parse_dms, parse_hms};
use crate::error::Result;
use crate::mount::mount_system::MountSystem;

const REPLY_TRUE: &str = "1#";
const REPLY_FALSE: &str = "0#";
const REPLY_SYNC: &str = "#";

/// Operations of the mount used by the LX200 protocol.
pub trait Lx200Mount {
    /// Right ascension in hour and declination in degree.
    fn current_position_ra_dec(&self) -> (f64, f64);

    /// Manual speed in second of time and arcsecond per hour.
    fn set_speed_ha_dec(&mut self, speed_ha: f64, speed_dec: f64);

    /// Slew to the right ascension and declination.
    fn goto_position_ra_dec(&mut self, ra: f64, dec: f64) -> Result<()>;
}

impl Lx200Mount for MountSystem {
    fn current_position_ra_dec(&self) -> (f64, f64) {
        MountSystem::current_position_ra_dec(self)
    }

    fn set_speed_ha_dec(&mut self, speed_ha: f64, speed_dec: f64) {
        MountSystem::set_speed_ha_dec(self, speed_ha, speed_dec)
    }

    fn goto_position_ra_dec(&mut self, ra: f64, dec: f64) -> Result<()> {
        MountSystem::goto_position_ra_dec(self, ra, dec)
    }
}

/// Parser and dispatcher of the LX200 commands. The commands end with "#".
pub struct Lx200Server<M: Lx200Mount> {
    _mount: Arc<Mutex<M>>,
    // Received bytes without a complete command.
    _buffer: Vec<u8>,
    // Target set by ":Sr" and ":Sd".
    _target_ra: f64,
    _target_dec: f64,
}

impl<M: Lx200Mount> Lx200Server<M> {
    /// Create a new LX200 server.
    ///
    /// # Arguments
    /// * `mount` - Shared mount.
    ///
    /// # Returns
    /// A new LX200 server.
    pub fn new(mount: Arc<Mutex<M>>) -> Self {
        Self {
            _mount: mount,
            _buffer: Vec::new(),
            _target_ra: 0.0,
            _target_dec: 0.0,
        }
    }

    fn lock(&self) -> MutexGuard<'_, M> {
        self._mount
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop the incomplete command. This is called for a new client.
    pub fn reset(&mut self) {
        self._buffer.clear();
    }

    /// Buffered target (right ascension, declination).
    pub fn target(&self) -> (f64, f64) {
        (self._target_ra, self._target_dec)
    }

    /// Process the received bytes.
    ///
    /// # Arguments
    /// * `data` - Received bytes. A command can be split across the calls.
    ///
    /// # Returns
    /// Replies of the complete commands.
    pub fn process(&mut self, data: &[u8]) -> Vec<u8> {
        self._buffer.extend_from_slice(data);

        let mut replies = Vec::new();
        while let Some(index) = self
            ._buffer
            .iter()
            .position(|byte| *byte == LX200_TERMINATOR)
        {
            let command: Vec<u8> = self._buffer.drain(..=index).collect();
            let command = String::from_utf8_lossy(&command).into_owned();

            replies.extend_from_slice(self.handle_command(&command).as_bytes());
        }

        replies
    }

    /// Handle one command.
    ///
    /// # Arguments
    /// * `command` - Command with the terminator.
    ///
    /// # Returns
    /// Reply. Empty if there is nothing to reply.
    pub fn handle_command(&mut self, command: &str) -> String {
        debug!("LX200 server receives: {command}.");

        let command = command.trim_start();

        match command {
            ":GR#" => {
                let (ra, _) = self.lock().current_position_ra_dec();
                format!("{}#", format_hms(ra))
            }

            ":GD#" => {
                let (_, dec) = self.lock().current_position_ra_dec();
                format!("{}#", format_dms(dec))
            }

            ":Q#" => {
                self.lock().set_speed_ha_dec(SIDEREAL_SYNC_SPEED, 0.0);
                String::new()
            }

            ":MS#" => {
                let (ra, dec) = self.target();
                info!("LX200 goto RA {} and Dec {}.", format_hms(ra), format_dms(dec));

                if let Err(error) = self.lock().goto_position_ra_dec(ra, dec) {
                    warn!("LX200 goto fails: {error}.");
                }

                String::from(REPLY_FALSE)
            }

            ":CM#" => String::from(REPLY_SYNC),

            _ => self.handle_set_command(command),
        }
    }

    /// Handle the commands beginning with ":S".
    ///
    /// # Arguments
    /// * `command` - Command with the terminator.
    ///
    /// # Returns
    /// Reply. Empty if the command is unknown.
    fn handle_set_command(&mut self, command: &str) -> String {
        let body = match command
            .strip_prefix(":S")
            .and_then(|body| body.strip_suffix('#'))
        {
            Some(body) => body,
            None => return String::new(),
        };

        if let Some(text) = body.strip_prefix('r') {
            return match parse_hms(text) {
                Some(ra) => {
                    self._target_ra = ra;
                    String::from(REPLY_TRUE)
                }
                None => String::from(REPLY_FALSE),
            };
        }

        if let Some(text) = body.strip_prefix('d') {
            return match parse_dms(text) {
                Some(dec) => {
                    self._target_dec = dec;
                    String::from(REPLY_TRUE)
                }
                None => String::from(REPLY_FALSE),
            };
        }

        if !body.is_empty() && body.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(speed) = body.parse::<f64>() {
                self.lock().set_speed_ha_dec(speed * 3600.0 / 60.0, 0.0);
                return String::from(REPLY_TRUE);
            }
        }

        debug!("LX200 server ignores: {command}.");

        String::new()
    }
}
