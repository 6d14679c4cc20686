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
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::constants::{LINK_READ_TIMEOUT_MS, QUEUE_SIZE, TID_PERIOD};
use crate::error::{MountError, Result};
use crate::mount::firmware_command::{parse_position_reply, step_period, FirmwareCommand};
use crate::mount::mount_link::MountLink;

/// Next sequence ID in the cyclic space 1..=128.
///
/// # Arguments
/// * `tid` - Current sequence ID.
///
/// # Returns
/// Next sequence ID.
fn next_tid(tid: i32) -> i32 {
    tid.rem_euclid(TID_PERIOD) + 1
}

/// Number of the issued segments that the firmware has not started yet.
///
/// # Arguments
/// * `tid` - Sequence ID of the last issued segment.
/// * `reported_tid` - Sequence ID reported by the firmware.
///
/// # Returns
/// Forward distance from the reported to the issued sequence ID.
fn tid_delta(tid: i32, reported_tid: i32) -> i32 {
    (tid - reported_tid).rem_euclid(TID_PERIOD)
}

/// Free lines in the firmware queue.
///
/// # Arguments
/// * `tid` - Sequence ID of the last issued segment.
/// * `reported_tid` - Sequence ID reported by the firmware.
///
/// # Returns
/// Free lines. Zero or negative means the queue is full.
fn free_queue_lines(tid: i32, reported_tid: i32) -> i32 {
    QUEUE_SIZE - tid_delta(tid, reported_tid) - 1
}

struct ControllerState {
    // Link to the firmware.
    link: Box<dyn MountLink>,
    // Sequence ID of the last issued segment.
    tid: i32,
}

pub struct MountController {
    // Every transaction holds this lock from the write to the reply.
    _state: Mutex<ControllerState>,
    // Bounded wait of a reply.
    _read_timeout: Duration,
}

impl MountController {
    /// Connect to the mount firmware. The position is read once and the
    /// reported sequence ID is adopted, so a firmware that keeps running
    /// across the restarts of this controller does not look busy.
    ///
    /// # Arguments
    /// * `link` - Link to the firmware.
    ///
    /// # Returns
    /// A new mount controller.
    ///
    /// # Errors
    /// Link or ProtocolParse if the first position read fails.
    pub fn connect(link: Box<dyn MountLink>) -> Result<Self> {
        let controller = Self {
            _state: Mutex::new(ControllerState { link: link, tid: 0 }),
            _read_timeout: Duration::from_millis(LINK_READ_TIMEOUT_MS),
        };

        {
            let mut state = controller.lock();
            let (reported_tid, x, y) = controller.read_position_locked(&mut state)?;
            state.tid = reported_tid;

            info!("Mount is connected at ({x}, {y}) with the sequence ID {reported_tid}.");
        }

        Ok(controller)
    }

    /// Lock the state. A poisoned lock is still usable because every
    /// transaction is complete or failed as a whole.
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self._state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write the command and wait for the reply. The unread input (a reply
    /// later than its timeout) is dropped first, and the asynchronous
    /// firmware messages (beginning with ":") are discarded.
    ///
    /// # Arguments
    /// * `state` - Locked state.
    /// * `command` - Command.
    ///
    /// # Returns
    /// Reply.
    ///
    /// # Errors
    /// Link if there is no reply within the timeout.
    fn transaction(&self, state: &mut ControllerState, command: &FirmwareCommand) -> Result<String> {
        let line = command.to_string();
        debug!("Send to the mount: {line}.");

        state.link.clear_input()?;
        state.link.write_line(&line)?;

        loop {
            match state.link.read_line(self._read_timeout)? {
                Some(reply) => {
                    let reply = reply.trim();
                    if reply.is_empty() || reply.starts_with(':') {
                        debug!("Discard the firmware message: {reply}.");
                        continue;
                    }

                    debug!("Receive from the mount: {reply}.");
                    return Ok(String::from(reply));
                }

                None => {
                    return Err(MountError::Link(format!(
                        "No reply to {line:?} within {} ms",
                        self._read_timeout.as_millis()
                    )));
                }
            }
        }
    }

    fn read_position_locked(&self, state: &mut ControllerState) -> Result<(i32, i64, i64)> {
        let reply = self.transaction(state, &FirmwareCommand::ReadPosition)?;

        parse_position_reply(&reply)
    }

    fn free_queue_lines_locked(&self, state: &mut ControllerState) -> Result<i32> {
        let (reported_tid, _, _) = self.read_position_locked(state)?;

        Ok(free_queue_lines(state.tid, reported_tid))
    }

    /// Sequence ID of the last issued segment.
    pub fn tid(&self) -> i32 {
        self.lock().tid
    }

    /// Read the position.
    ///
    /// # Returns
    /// Position (x, y) in step.
    ///
    /// # Errors
    /// Link if the mount does not reply, ProtocolParse if the reply is
    /// malformed.
    pub fn read_position(&self) -> Result<(i64, i64)> {
        let mut state = self.lock();
        let (_, x, y) = self.read_position_locked(&mut state)?;

        Ok((x, y))
    }

    /// The firmware queue has a free line or not.
    ///
    /// # Returns
    /// True if there is a free line. False if the queue is full or the link
    /// fails.
    pub fn has_queue_space(&self) -> bool {
        let mut state = self.lock();
        match self.free_queue_lines_locked(&mut state) {
            Ok(free_lines) => free_lines > 0,
            Err(error) => {
                warn!("Fail to check the queue of the mount: {error}.");
                false
            }
        }
    }

    /// Disable the stepper motors.
    ///
    /// # Errors
    /// Link if the mount does not reply.
    pub fn disable_steppers(&self) -> Result<()> {
        let mut state = self.lock();
        self.transaction(&mut state, &FirmwareCommand::Disable)?;

        Ok(())
    }

    /// Queue a linear motion segment.
    ///
    /// # Arguments
    /// * `dx` - Steps of the x axis.
    /// * `dy` - Steps of the y axis.
    /// * `time_us` - Duration of the segment in microsecond.
    ///
    /// # Returns
    /// True if the segment is queued. False if the queue is full and nothing
    /// is sent (retry later).
    ///
    /// # Errors
    /// Link or ProtocolParse if a transaction fails.
    pub fn goto(&self, dx: i64, dy: i64, time_us: i64) -> Result<bool> {
        let mut state = self.lock();

        if self.free_queue_lines_locked(&mut state)? <= 0 {
            debug!("Queue of the mount is full.");
            return Ok(false);
        }

        let tid = next_tid(state.tid);
        let command = FirmwareCommand::Goto {
            tid: tid,
            dx: dx,
            dy: dy,
            period: step_period(dx, dy, time_us),
        };
        self.transaction(&mut state, &command)?;

        state.tid = tid;

        Ok(true)
    }

    /// Set the position registers without motion.
    ///
    /// # Arguments
    /// * `x` - Position of the x axis in step.
    /// * `y` - Position of the y axis in step.
    ///
    /// # Errors
    /// Link if the mount does not reply.
    pub fn set_position(&self, x: i64, y: i64) -> Result<()> {
        let mut state = self.lock();
        self.transaction(&mut state, &FirmwareCommand::SetPosition { x: x, y: y })?;

        Ok(())
    }
}
