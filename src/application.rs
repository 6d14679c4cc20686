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

use log::{error, info, warn};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag::register,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{sleep, spawn, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::constants::{ALL_HOST, LX200_POLL_PERIOD_MS};
use crate::error::{MountError, Result};
use crate::interface::lx200_server::Lx200Server;
use crate::interface::tcp_server::TcpServer;
use crate::mock::mock_mount::MockMount;
use crate::mount::mount_controller::MountController;
use crate::mount::mount_link::{MountLink, SerialLink};
use crate::mount::mount_system::MountSystem;
use crate::utility::get_parameter;

/// Run the application.
///
/// # Arguments
/// * `config_file` - Configuration file.
/// * `device` - Serial device of the mount. Not used in the simulation mode.
/// * `port_lx200` - Port of the LX200 server. If the value is 0, the port is
/// read from the configuration file.
/// * `is_simulation_mode` - Is the simulation mode or not.
///
/// # Errors
/// Config if the configuration is invalid. Serial, Link, Io, or ProtocolParse
/// if the mount can not be connected or is disconnected.
pub fn run(
    config_file: &Path,
    device: Option<&Path>,
    port_lx200: i32,
    is_simulation_mode: bool,
) -> Result<()> {
    // Log the running mode
    let mode = if is_simulation_mode {
        "simulation mode"
    } else {
        "hardware mode"
    };
    info!("Run the mount control system in {mode}.");

    let config = Config::new(config_file)?;
    let tick_period: f64 = get_parameter(config_file, "tick_period")?;
    let final_port_lx200 = get_final_port(config_file, port_lx200)?;

    // Connect the mount
    let link = open_link(&config, device, is_simulation_mode)?;
    let controller = MountController::connect(link)?;
    let mount_system = Arc::new(Mutex::new(MountSystem::new(controller, &config)?));

    // Register the signals that stop the application
    let stop = Arc::new(AtomicBool::new(false));
    for signal in [SIGTERM, SIGINT].iter() {
        let _ = register(*signal, stop.clone());
    }

    // Run the LX200 server
    let server = TcpServer::new(
        "LX200 server",
        ALL_HOST,
        final_port_lx200,
        LX200_POLL_PERIOD_MS,
        &stop,
    )?;
    info!("LX200 server listens on the port {}.", server.get_port());
    let handle = spawn_lx200_server(server, &mount_system);

    // Run the main loop
    let result = run_tick_loop(&mount_system, tick_period, &stop);

    info!("Stopping the mount control system...");

    stop.store(true, Ordering::Relaxed);
    if handle.join().is_err() {
        error!("LX200 server is stopped abnormally.");
    }

    info!("Mount control system is stopped.");

    result
}

/// Get the final port.
///
/// # Arguments
/// * `config_file` - Configuration file.
/// * `port_lx200` - Port of the LX200 server. If the value is 0, the port is
/// read from the configuration file.
///
/// # Returns
/// Final port.
///
/// # Errors
/// Config if the port is not in the configuration file.
fn get_final_port(config_file: &Path, port_lx200: i32) -> Result<i32> {
    if port_lx200 == 0 {
        get_parameter(config_file, "port_lx200")
    } else {
        Ok(port_lx200)
    }
}

/// Open the link to the mount.
///
/// # Arguments
/// * `config` - Configuration.
/// * `device` - Serial device of the mount.
/// * `is_simulation_mode` - Is the simulation mode or not.
///
/// # Returns
/// Link to the mount.
///
/// # Errors
/// Config if there is no device in the hardware mode. Serial if the device
/// can not be opened.
fn open_link(
    config: &Config,
    device: Option<&Path>,
    is_simulation_mode: bool,
) -> Result<Box<dyn MountLink>> {
    if is_simulation_mode {
        // Declination 0 at the start.
        let mock = MockMount::new_realtime();
        mock.set_position(0, config.y_steps / 2);

        return Ok(Box::new(mock));
    }

    match device {
        Some(path) => Ok(Box::new(SerialLink::open(path, config.baud_rate)?)),
        None => Err(MountError::Config(String::from(
            "Mount device is required in the hardware mode",
        ))),
    }
}

/// Run the LX200 server in a separate thread.
///
/// # Arguments
/// * `server` - TCP/IP server.
/// * `mount_system` - Shared mount system.
///
/// # Returns
/// Handle of the thread.
fn spawn_lx200_server(
    mut server: TcpServer,
    mount_system: &Arc<Mutex<MountSystem>>,
) -> JoinHandle<()> {
    let mut lx200 = Lx200Server::new(mount_system.clone());

    spawn(move || {
        server.run(process_lx200, Some(reset_lx200), &mut lx200);
    })
}

fn process_lx200(server: &mut TcpServer, lx200: &mut Lx200Server<MountSystem>) {
    let data = server.read_bytes();
    if data.is_empty() {
        sleep(Duration::from_millis(server.timeout));
        return;
    }

    let replies = lx200.process(&data);
    server.write_bytes(&replies);
}

fn reset_lx200(_server: &mut TcpServer, lx200: &mut Lx200Server<MountSystem>) {
    lx200.reset();
}

/// Run the ticks until the stop or the disconnection of the mount.
///
/// # Arguments
/// * `mount_system` - Shared mount system.
/// * `tick_period` - Tick period in second.
/// * `stop` - Stop the loop.
///
/// # Errors
/// Link, Io or ProtocolParse if the mount is disconnected.
fn run_tick_loop(
    mount_system: &Arc<Mutex<MountSystem>>,
    tick_period: f64,
    stop: &Arc<AtomicBool>,
) -> Result<()> {
    let period = Duration::from_secs_f64(tick_period);

    while !stop.load(Ordering::Relaxed) {
        let start = Instant::now();

        if let Err(error) = tick(mount_system, tick_period) {
            error!("Mount is disconnected: {error}.");
            return Err(error);
        }

        if let Some(remaining) = period.checked_sub(start.elapsed()) {
            sleep(remaining);
        }
    }

    Ok(())
}

/// One tick of the control: read the position and queue the next tracking
/// segment. The pier side is only changed by the explicit commands.
///
/// # Arguments
/// * `mount_system` - Shared mount system.
/// * `delta_t` - Tick period in second.
///
/// # Errors
/// Link, Io or ProtocolParse if the position can not be read, or the link is
/// lost in the tracking.
pub fn tick(mount_system: &Mutex<MountSystem>, delta_t: f64) -> Result<()> {
    let mut mount_system = mount_system
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    mount_system.read_position()?;

    match mount_system.tracking_periodic(delta_t) {
        Ok(_) => Ok(()),
        Err(error) if error.is_link_failure() => Err(error),
        Err(error) => {
            warn!("Tracking is skipped: {error}.");
            Ok(())
        }
    }
}
