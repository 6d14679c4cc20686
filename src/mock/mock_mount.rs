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

use log::debug;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::constants::QUEUE_SIZE;
use crate::error::Result;
use crate::mount::firmware_command::{format_position_reply, FirmwareCommand};
use crate::mount::mount_link::MountLink;

const REPLY_OK: &str = "OK";
const REPLY_ERROR: &str = "ERR";
const REPLY_CHATTER: &str = ":busy";
const REPLY_MALFORMED: &str = "1 2";

#[derive(Debug, Clone, Copy)]
struct Segment {
    tid: i32,
    dx: i64,
    dy: i64,
    duration_us: i64,
}

#[derive(Debug, Clone, Copy)]
struct RunningSegment {
    segment: Segment,
    // Position when the segment started.
    start: (i64, i64),
    elapsed_us: i64,
}

impl RunningSegment {
    fn position(&self) -> (i64, i64) {
        if self.segment.duration_us <= 0 {
            return self.start;
        }

        let fraction = |steps: i64| steps * self.elapsed_us / self.segment.duration_us;
        (
            self.start.0 + fraction(self.segment.dx),
            self.start.1 + fraction(self.segment.dy),
        )
    }
}

struct MockFirmware {
    // Position when no segment is running.
    position: (i64, i64),
    // Sequence ID of the last started segment.
    reported_tid: i32,
    // Sequence ID of the last received segment.
    last_received_tid: i32,
    running: Option<RunningSegment>,
    pending: VecDeque<Segment>,
    is_enabled: bool,
    is_connected: bool,
    has_chatter: bool,
    is_malformed: bool,
    replies: VecDeque<String>,
    // Reads that time out before the reply arrives.
    delayed_reads: usize,
    // Record the received commands or not.
    is_recording: bool,
    history: Vec<FirmwareCommand>,
    last_update: Instant,
}

impl MockFirmware {
    fn new(is_recording: bool) -> Self {
        Self {
            position: (0, 0),
            reported_tid: 0,
            last_received_tid: 0,
            running: None,
            pending: VecDeque::new(),
            is_enabled: false,
            is_connected: true,
            has_chatter: false,
            is_malformed: false,
            replies: VecDeque::new(),
            delayed_reads: 0,
            is_recording: is_recording,
            history: Vec::new(),
            last_update: Instant::now(),
        }
    }

    fn current_position(&self) -> (i64, i64) {
        match self.running {
            Some(running) => running.position(),
            None => self.position,
        }
    }

    fn start_next_segment(&mut self) {
        if let Some(segment) = self.pending.pop_front() {
            self.reported_tid = segment.tid;
            self.running = Some(RunningSegment {
                segment: segment,
                start: self.position,
                elapsed_us: 0,
            });
        }
    }

    fn advance(&mut self, elapsed_us: i64) {
        let mut budget = elapsed_us;
        while let Some(mut running) = self.running {
            let remaining = running.segment.duration_us - running.elapsed_us;
            if budget < remaining {
                running.elapsed_us += budget;
                self.running = Some(running);
                break;
            }

            budget -= remaining;
            self.position = (
                running.start.0 + running.segment.dx,
                running.start.1 + running.segment.dy,
            );
            self.running = None;
            self.start_next_segment();
        }
    }

    fn execute(&mut self, line: &str) -> String {
        let command = match line.parse::<FirmwareCommand>() {
            Ok(command) => command,
            Err(_) => return String::from(REPLY_ERROR),
        };

        if self.is_recording {
            self.history.push(command);
        }

        match command {
            FirmwareCommand::ReadPosition => {
                if self.is_malformed {
                    return String::from(REPLY_MALFORMED);
                }

                let (x, y) = self.current_position();
                format_position_reply(self.reported_tid, x, y)
            }

            FirmwareCommand::Disable => {
                self.position = self.current_position();
                self.running = None;
                self.pending.clear();
                self.reported_tid = self.last_received_tid;
                self.is_enabled = false;

                String::from(REPLY_OK)
            }

            FirmwareCommand::Goto {
                tid,
                dx,
                dy,
                period,
            } => {
                if self.running.is_some() && self.pending.len() >= (QUEUE_SIZE - 1) as usize {
                    return String::from(REPLY_ERROR);
                }

                self.pending.push_back(Segment {
                    tid: tid,
                    dx: dx,
                    dy: dy,
                    duration_us: period * dx.abs().max(dy.abs()),
                });
                self.last_received_tid = tid;
                self.is_enabled = true;

                if self.running.is_none() {
                    self.start_next_segment();
                }

                String::from(REPLY_OK)
            }

            FirmwareCommand::SetPosition { x, y } => {
                let (current_x, current_y) = self.current_position();
                match self.running.as_mut() {
                    Some(running) => {
                        running.start.0 += x - current_x;
                        running.start.1 += y - current_y;
                    }
                    None => self.position = (x, y),
                }

                String::from(REPLY_OK)
            }
        }
    }
}

/// Simulator of the stepper-motor firmware. The clones share the same
/// firmware, so a test can keep one clone to inspect and drive the firmware
/// while the controller owns the other one as its link.
#[derive(Clone)]
pub struct MockMount {
    _firmware: Arc<Mutex<MockFirmware>>,
    // Advance the firmware with the wall clock on every command.
    _is_realtime: bool,
}

impl MockMount {
    /// Create a new mock mount that only advances with advance(). The
    /// received commands are recorded.
    ///
    /// # Returns
    /// A new mock mount.
    pub fn new() -> Self {
        Self {
            _firmware: Arc::new(Mutex::new(MockFirmware::new(true))),
            _is_realtime: false,
        }
    }

    /// Create a new mock mount that follows the wall clock. This is used in
    /// the simulation mode, so nothing is recorded.
    ///
    /// # Returns
    /// A new mock mount.
    pub fn new_realtime() -> Self {
        Self {
            _firmware: Arc::new(Mutex::new(MockFirmware::new(false))),
            _is_realtime: true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockFirmware> {
        self._firmware
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Advance the firmware time.
    ///
    /// # Arguments
    /// * `elapsed` - Elapsed time.
    pub fn advance(&self, elapsed: Duration) {
        self.lock().advance(elapsed.as_micros() as i64);
    }

    /// Set the sequence ID reported by the firmware.
    ///
    /// # Arguments
    /// * `tid` - Sequence ID.
    pub fn set_reported_tid(&self, tid: i32) {
        let mut firmware = self.lock();
        firmware.reported_tid = tid;
        firmware.last_received_tid = tid;
    }

    /// Set the position of an idle firmware.
    ///
    /// # Arguments
    /// * `x` - Position of the x axis in step.
    /// * `y` - Position of the y axis in step.
    pub fn set_position(&self, x: i64, y: i64) {
        self.lock().position = (x, y);
    }

    /// Current position.
    ///
    /// # Returns
    /// Position (x, y) in step.
    pub fn position(&self) -> (i64, i64) {
        self.lock().current_position()
    }

    /// Stop replying, as if the cable is unplugged.
    pub fn disconnect(&self) {
        self.lock().is_connected = false;
    }

    /// Emit an asynchronous message before every reply.
    ///
    /// # Arguments
    /// * `has_chatter` - Emit the message or not.
    pub fn set_chatter(&self, has_chatter: bool) {
        self.lock().has_chatter = has_chatter;
    }

    /// The replies of the next reads arrive after the timeout of the reader.
    ///
    /// # Arguments
    /// * `count` - Number of the late replies.
    pub fn delay_replies(&self, count: usize) {
        self.lock().delayed_reads = count;
    }

    /// Reply the position read with a wrong field count.
    ///
    /// # Arguments
    /// * `is_malformed` - Malformed reply or not.
    pub fn set_malformed_reply(&self, is_malformed: bool) {
        self.lock().is_malformed = is_malformed;
    }

    /// The stepper motors are enabled or not.
    pub fn is_enabled(&self) -> bool {
        self.lock().is_enabled
    }

    /// Last received command.
    pub fn last_command(&self) -> Option<FirmwareCommand> {
        self.lock().history.last().copied()
    }

    /// All the received commands.
    pub fn commands(&self) -> Vec<FirmwareCommand> {
        self.lock().history.clone()
    }

    /// Received goto segments.
    pub fn goto_commands(&self) -> Vec<FirmwareCommand> {
        self.commands()
            .into_iter()
            .filter(|command| matches!(command, FirmwareCommand::Goto { .. }))
            .collect()
    }
}

impl MountLink for MockMount {
    fn write_line(&mut self, line: &str) -> Result<()> {
        let is_realtime = self._is_realtime;
        let mut firmware = self.lock();

        if is_realtime {
            let now = Instant::now();
            let elapsed = now.duration_since(firmware.last_update);
            firmware.last_update = now;
            firmware.advance(elapsed.as_micros() as i64);
        }

        if !firmware.is_connected {
            return Ok(());
        }

        let reply = firmware.execute(line);
        debug!("Mock mount replies {reply} to {line}.");

        if firmware.has_chatter {
            firmware.replies.push_back(String::from(REPLY_CHATTER));
        }
        firmware.replies.push_back(reply);

        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<Option<String>> {
        let mut firmware = self.lock();
        if !firmware.is_connected {
            return Ok(None);
        }

        if firmware.delayed_reads > 0 {
            firmware.delayed_reads -= 1;
            return Ok(None);
        }

        Ok(firmware.replies.pop_front())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.lock().replies.clear();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(10);

    fn send(mock: &mut MockMount, line: &str) -> String {
        mock.write_line(line).unwrap();
        mock.read_line(TIMEOUT).unwrap().unwrap()
    }

    #[test]
    fn test_read_position() {
        let mut mock = MockMount::new();
        mock.set_position(8, -8);

        assert_eq!(send(&mut mock, "P"), "0 10 -10");
    }

    #[test]
    fn test_goto_and_advance() {
        let mut mock = MockMount::new();

        // 100 steps in 1 second.
        assert_eq!(send(&mut mock, "G 1 144 0 23420"), REPLY_OK);
        assert!(mock.is_enabled());

        mock.advance(Duration::from_millis(500));
        assert_eq!(mock.position(), (50, 0));

        mock.advance(Duration::from_millis(500));
        assert_eq!(mock.position(), (100, 0));
    }

    #[test]
    fn test_queue_full() {
        let mut mock = MockMount::new();

        assert_eq!(send(&mut mock, "G 1 12 0 1"), REPLY_OK);
        assert_eq!(send(&mut mock, "G 2 12 0 1"), REPLY_OK);
        assert_eq!(send(&mut mock, "G 3 12 0 1"), REPLY_ERROR);

        // Only the first one is started.
        assert_eq!(send(&mut mock, "P"), "1 0 0");

        mock.advance(Duration::from_micros(10));
        assert_eq!(send(&mut mock, "P"), "2 12 0");
    }

    #[test]
    fn test_disable() {
        let mut mock = MockMount::new();

        send(&mut mock, "G 1 144 0 23420");
        send(&mut mock, "G 2 144 0 23420");
        mock.advance(Duration::from_millis(500));

        assert_eq!(send(&mut mock, "D"), REPLY_OK);
        assert!(!mock.is_enabled());

        // Motion stops and the queue is flushed.
        mock.advance(Duration::from_secs(5));
        assert_eq!(mock.position(), (50, 0));
        assert_eq!(send(&mut mock, "P"), "2 62 0");
    }

    #[test]
    fn test_set_position() {
        let mut mock = MockMount::new();

        assert_eq!(send(&mut mock, "S -10 20"), REPLY_OK);
        assert_eq!(mock.position(), (-8, 16));
    }

    #[test]
    fn test_unknown_command() {
        let mut mock = MockMount::new();

        assert_eq!(send(&mut mock, "X 1"), REPLY_ERROR);
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn test_chatter() {
        let mut mock = MockMount::new();
        mock.set_chatter(true);

        assert_eq!(send(&mut mock, "P"), REPLY_CHATTER);
        assert_eq!(mock.read_line(TIMEOUT).unwrap().unwrap(), "0 0 0");
    }

    #[test]
    fn test_disconnect() {
        let mut mock = MockMount::new();
        mock.disconnect();

        mock.write_line("P").unwrap();

        assert!(mock.read_line(TIMEOUT).unwrap().is_none());
    }

    #[test]
    fn test_realtime() {
        let mut mock = MockMount::new_realtime();

        // 10 steps in 10 ms.
        send(&mut mock, "G 1 12 0 1750");
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(send(&mut mock, "P"), "1 12 0");

        // Nothing is recorded in the simulation.
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn test_delay_replies() {
        let mut mock = MockMount::new();
        mock.delay_replies(1);

        mock.write_line("P").unwrap();

        assert!(mock.read_line(TIMEOUT).unwrap().is_none());
        assert_eq!(mock.read_line(TIMEOUT).unwrap().unwrap(), "0 0 0");

        mock.delay_replies(1);
        mock.write_line("P").unwrap();
        assert!(mock.read_line(TIMEOUT).unwrap().is_none());

        mock.clear_input().unwrap();

        assert!(mock.read_line(TIMEOUT).unwrap().is_none());
    }
}
