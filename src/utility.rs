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

use config::Config;
use serde::de::DeserializeOwned;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use crate::error::{MountError, Result};

/// Get the configuation from the file.
///
/// # Parameters
/// * `filepath` - Path to the config file.
///
/// # Returns
/// The configuration.
///
/// # Errors
/// Config if the file can not be read.
pub fn get_config(filepath: &Path) -> Result<Config> {
    let name = filepath.to_str().ok_or_else(|| {
        MountError::Config(format!("Should have the file name in the {:?}", filepath))
    })?;

    Ok(Config::builder()
        .add_source(config::File::with_name(name))
        .build()?)
}

/// Get the parameter from the file.
///
/// # Parameters
/// * `filepath` - Path to the config file.
/// * `key` - Key to find the parameter in the config file.
///
/// # Returns
/// The parameter.
///
/// # Errors
/// Config if the file can not be read or the key is missing.
pub fn get_parameter<T: DeserializeOwned>(filepath: &Path, key: &str) -> Result<T> {
    Ok(get_config(filepath)?.get::<T>(key)?)
}

/// TCP/IP client writes the message and sleep.
///
/// # Arguments
/// * `client` - TCP/IP client.
/// * `message` - Message to write.
/// * `sleep_time` - Sleep time in milliseconds.
///
/// # Panics
/// If the TCP stream of the client cannot write or flush.
pub fn client_write_and_sleep(client: &mut TcpStream, message: &str, sleep_time: u64) {
    client
        .write_all(message.as_bytes())
        .expect("Tcp stream should write.");
    client.flush().expect("Tcp stream should flush.");

    sleep(Duration::from_millis(sleep_time));
}

/// TCP/IP client reads the message and assert.
///
/// # Arguments
/// * `client` - TCP/IP client.
/// * `expected` - Expected message.
///
/// # Panics
/// If the TCP stream of the client cannot read.
pub fn client_read_and_assert(client: &mut TcpStream, expected: &str) {
    let mut buffer = vec![0; expected.len()];
    client
        .read_exact(&mut buffer)
        .expect("Tcp stream of the client should read.");

    assert_eq!(std::str::from_utf8(&buffer).unwrap(), expected);
}
