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

//! # Mount Control System
//!
//! This library drives an equatorial (hour angle and declination) telescope
//! mount: the coordinate conversions, the firmware command queue, the
//! velocity-limited tracking, and the LX200 protocol for the planetarium
//! software.
pub mod application;
pub mod config;
pub mod constants;
pub mod control;
pub mod coordinate;
pub mod enums;
pub mod error;
pub mod interface;
pub mod mock;
pub mod mount;
pub mod utility;
