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

pub const QUEUE_SIZE: i32 = 2;
pub const TID_PERIOD: i32 = 128;

pub const DEFAULT_BAUD_RATE: u32 = 115200;

// Bounded wait of one link transaction in millisecond.
pub const LINK_READ_TIMEOUT_MS: u64 = 3000;

// Step period in microsecond of a segment without motion.
pub const IDLE_STEP_PERIOD_US: i64 = 100;

pub const HOURS_PER_DAY: f64 = 24.0;
pub const DEGREES_PER_ROUND: f64 = 360.0;
pub const SECONDS_PER_DAY: f64 = 86400.0;
pub const SIDEREAL_DAY_SECONDS: f64 = 86164.090530833;

// Hour-angle speed (seconds of hour angle per hour) that holds a star.
pub const SIDEREAL_SYNC_SPEED: f64 = SECONDS_PER_DAY / SIDEREAL_DAY_SECONDS * 3600.0;

pub const DEFAULT_LOOKAHEAD_FACTOR: f64 = 4.0;

pub const LOCAL_HOST: &str = "127.0.0.1";
pub const ALL_HOST: &str = "0.0.0.0";
pub const LINK_TERMINATOR: &str = "\r\n";
pub const LX200_TERMINATOR: u8 = b'#';

// Idle wait of the LX200 server in millisecond.
pub const LX200_POLL_PERIOD_MS: u64 = 10;

pub const CONFIG_FILE: &str = "config/parameters_app.yaml";
