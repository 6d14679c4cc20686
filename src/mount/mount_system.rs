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
use time::OffsetDateTime;

use crate::config::Config;
use crate::constants::{DEGREES_PER_ROUND, HOURS_PER_DAY};
use crate::control::tracker::{Tracker, TrackingTarget};
use crate::coordinate::coordinate_system::{normalize_hours, CoordinateSystem};
use crate::enums::{PierSide, TrackingMode};
use crate::error::Result;
use crate::mount::mount_controller::MountController;

// Manual speeds are in second of time (hour angle) or arcsecond
// (declination) per hour.
const MANUAL_SPEED_SCALE: f64 = 3600.0 * 3600.0;

/// Coordinate broker between the sky, the tracker, and the mechanical steps.
pub struct MountSystem {
    _controller: MountController,
    _coordinate_system: CoordinateSystem,
    _tracker: Tracker,
    // Steps per full rotation of each axis.
    _x_steps: i64,
    _y_steps: i64,
    // The declination axis is flipped over the meridian or not.
    _dec_invert: bool,
    // Last known position (hour angle, declination).
    _position: (f64, f64),
    // Manual speed in hour and degree per second.
    _speed: Option<(f64, f64)>,
    // Fractional steps not commanded yet.
    _step_residual: (f64, f64),
    // Source of the current time.
    _clock: fn() -> OffsetDateTime,
}

impl MountSystem {
    /// Create a new mount system. The position is read once.
    ///
    /// # Arguments
    /// * `controller` - Connected mount controller.
    /// * `config` - Configuration.
    ///
    /// # Returns
    /// A new mount system.
    ///
    /// # Errors
    /// Config if the timezone is invalid. Link or ProtocolParse if the
    /// position can not be read.
    pub fn new(controller: MountController, config: &Config) -> Result<Self> {
        Self::new_with_clock(controller, config, OffsetDateTime::now_utc)
    }

    /// Create a new mount system with a specific source of the current time.
    ///
    /// # Arguments
    /// * `controller` - Connected mount controller.
    /// * `config` - Configuration.
    /// * `clock` - Source of the current time.
    ///
    /// # Returns
    /// A new mount system.
    ///
    /// # Errors
    /// Config if the timezone is invalid. Link or ProtocolParse if the
    /// position can not be read.
    pub fn new_with_clock(
        controller: MountController,
        config: &Config,
        clock: fn() -> OffsetDateTime,
    ) -> Result<Self> {
        let coordinate_system = config.coordinate_system()?;

        let mut mount_system = Self {
            _controller: controller,
            _coordinate_system: coordinate_system,
            _tracker: Tracker::new(coordinate_system, config, clock()),
            _x_steps: config.x_steps,
            _y_steps: config.y_steps,
            _dec_invert: false,
            _position: (0.0, 0.0),
            _speed: None,
            _step_residual: (0.0, 0.0),
            _clock: clock,
        };

        let (ha, dec) = mount_system.read_position()?;
        mount_system._tracker.init_track_ha_dec(ha, dec);
        mount_system._tracker.stop_tracking();

        info!(
            "Mount system starts at HA {ha} h and Dec {dec} deg at {}.",
            mount_system.local_time()
        );

        Ok(mount_system)
    }

    fn now(&self) -> OffsetDateTime {
        (self._clock)()
    }

    /// Current time in the local timezone of the site for the logs.
    pub fn local_time(&self) -> String {
        self._coordinate_system.format_local_time(self.now())
    }

    pub fn coordinate_system(&self) -> &CoordinateSystem {
        &self._coordinate_system
    }

    pub fn tracker(&self) -> &Tracker {
        &self._tracker
    }

    /// Convert the hour angle and declination to the mechanical position.
    ///
    /// # Arguments
    /// * `ha` - Hour angle in hour.
    /// * `dec` - Declination in degree.
    ///
    /// # Returns
    /// Position (x, y) in step.
    pub fn convert_to_xy(&self, ha: f64, dec: f64) -> (i64, i64) {
        let (ha, dec) = if self._dec_invert {
            self._coordinate_system.inverted_ha_dec(ha, dec)
        } else {
            (ha, dec)
        };

        let x = ha / HOURS_PER_DAY * (self._x_steps as f64);
        let y = dec / DEGREES_PER_ROUND * (self._y_steps as f64) + (self._y_steps as f64) / 2.0;

        (x.round() as i64, y.round() as i64)
    }

    /// Convert the mechanical position to the hour angle and declination.
    ///
    /// # Arguments
    /// * `x` - Position of the x axis in step.
    /// * `y` - Position of the y axis in step.
    ///
    /// # Returns
    /// Hour angle in [0, 24) and declination in degree.
    pub fn convert_from_xy(&self, x: i64, y: i64) -> (f64, f64) {
        let ha = (x as f64) / (self._x_steps as f64) * HOURS_PER_DAY;
        let dec = ((y as f64) - (self._y_steps as f64) / 2.0) / (self._y_steps as f64)
            * DEGREES_PER_ROUND;

        let (ha, dec) = if self._dec_invert {
            self._coordinate_system.inverted_ha_dec(ha, dec)
        } else {
            (ha, dec)
        };

        (normalize_hours(ha), dec)
    }

    /// Read the position from the mount.
    ///
    /// # Returns
    /// Hour angle and declination.
    ///
    /// # Errors
    /// Link or ProtocolParse if the read fails.
    pub fn read_position(&mut self) -> Result<(f64, f64)> {
        let (x, y) = self._controller.read_position()?;
        self._position = self.convert_from_xy(x, y);

        Ok(self._position)
    }

    /// Declare the mount to be at the position. Nothing moves.
    ///
    /// # Arguments
    /// * `position` - Hour angle and declination.
    ///
    /// # Errors
    /// Link if the mount does not reply.
    fn apply_position(&mut self, position: (f64, f64)) -> Result<()> {
        let (x, y) = self.convert_to_xy(position.0, position.1);
        self._controller.set_position(x, y)?;

        self._position = (normalize_hours(position.0), position.1);
        self._speed = None;
        self._step_residual = (0.0, 0.0);

        info!(
            "Mount position is set to HA {} h and Dec {} deg at {}.",
            self._position.0,
            self._position.1,
            self.local_time()
        );

        Ok(())
    }

    /// Declare the mount to be at the hour angle and declination, and hold
    /// them.
    ///
    /// # Arguments
    /// * `ha` - Hour angle in hour.
    /// * `dec` - Declination in degree.
    ///
    /// # Errors
    /// Link if the mount does not reply.
    pub fn set_position_ha_dec(&mut self, ha: f64, dec: f64) -> Result<()> {
        self.apply_position((ha, dec))?;
        self._tracker.init_track_ha_dec(ha, dec);

        Ok(())
    }

    /// Declare the mount to be at the right ascension and declination, and
    /// follow them.
    ///
    /// # Arguments
    /// * `ra` - Right ascension in hour.
    /// * `dec` - Declination in degree.
    ///
    /// # Errors
    /// Link if the mount does not reply.
    pub fn set_position_ra_dec(&mut self, ra: f64, dec: f64) -> Result<()> {
        let now = self.now();
        let ha = self._coordinate_system.convert_ra_to_ha(ra, now);

        self.apply_position((ha, dec))?;
        self._tracker.init_track_ra_dec(ra, dec, now);

        Ok(())
    }

    /// Declare the mount to be at the azimuth and altitude, and hold them.
    ///
    /// # Arguments
    /// * `az` - Azimuth in degree.
    /// * `alt` - Altitude in degree.
    ///
    /// # Errors
    /// Link if the mount does not reply.
    pub fn set_position_az_alt(&mut self, az: f64, alt: f64) -> Result<()> {
        let position = self._coordinate_system.convert_from_az_alt(az, alt);

        self.apply_position(position)?;
        self._tracker.init_track_az_alt(az, alt);

        Ok(())
    }

    /// Stop the motion and restart the tracker from the actual position.
    ///
    /// # Errors
    /// Link or ProtocolParse if the mount does not reply.
    fn init_goto(&mut self) -> Result<()> {
        self._speed = None;

        self._controller.disable_steppers()?;
        let (ha, dec) = self.read_position()?;

        self._tracker.init_track_ha_dec(ha, dec);
        self._step_residual = (0.0, 0.0);

        Ok(())
    }

    /// Move to the hour angle and declination and hold them. The motion is
    /// done by the following ticks.
    ///
    /// # Arguments
    /// * `ha` - Hour angle in hour.
    /// * `dec` - Declination in degree.
    ///
    /// # Errors
    /// Link or ProtocolParse if the mount does not reply.
    pub fn goto_position_ha_dec(&mut self, ha: f64, dec: f64) -> Result<()> {
        self.init_goto()?;
        self._tracker.set_target_ha_dec(ha, dec);

        info!("Go to HA {ha} h and Dec {dec} deg at {}.", self.local_time());

        Ok(())
    }

    /// Move to the right ascension and declination and follow them.
    ///
    /// # Arguments
    /// * `ra` - Right ascension in hour.
    /// * `dec` - Declination in degree.
    ///
    /// # Errors
    /// Link or ProtocolParse if the mount does not reply.
    pub fn goto_position_ra_dec(&mut self, ra: f64, dec: f64) -> Result<()> {
        self.init_goto()?;
        self._tracker.set_target_ra_dec(ra, dec);

        info!("Go to RA {ra} h and Dec {dec} deg at {}.", self.local_time());

        Ok(())
    }

    /// Move to the azimuth and altitude and hold them.
    ///
    /// # Arguments
    /// * `az` - Azimuth in degree.
    /// * `alt` - Altitude in degree.
    ///
    /// # Errors
    /// Link or ProtocolParse if the mount does not reply.
    pub fn goto_position_az_alt(&mut self, az: f64, alt: f64) -> Result<()> {
        self.init_goto()?;
        self._tracker.set_target_az_alt(az, alt);

        info!("Go to Az {az} deg and Alt {alt} deg at {}.", self.local_time());

        Ok(())
    }

    /// Queue the next segment of the tracking. This is called once per tick.
    ///
    /// # Arguments
    /// * `delta_t` - Tick period in second.
    ///
    /// # Returns
    /// True if a segment is queued.
    ///
    /// # Errors
    /// Link or ProtocolParse if the goto fails.
    pub fn tracking_periodic(&mut self, delta_t: f64) -> Result<bool> {
        if let Some((speed_ha, speed_dec)) = self._speed {
            self._tracker
                .offset_target(speed_ha * delta_t, speed_dec * delta_t);
        }

        if !self._controller.has_queue_space() {
            return Ok(false);
        }

        let tracker = self._tracker.clone();
        let step_residual = self._step_residual;

        let delta = self._tracker.process_track(delta_t, self.now());
        if delta.is_zero() {
            self._tracker = tracker;
            return Ok(false);
        }

        let dx = delta.ha / HOURS_PER_DAY * (self._x_steps as f64) + step_residual.0;
        let mut dy = delta.dec / DEGREES_PER_ROUND * (self._y_steps as f64);
        if self._dec_invert {
            dy = -dy;
        }
        dy += step_residual.1;

        let dx_steps = dx.round() as i64;
        let dy_steps = dy.round() as i64;
        self._step_residual = (dx - dx_steps as f64, dy - dy_steps as f64);

        let time_us = (delta.delta_t * 1e6) as i64;
        match self._controller.goto(dx_steps, dy_steps, time_us) {
            Ok(true) => {
                debug!("Queue the segment ({dx_steps}, {dy_steps}) in {time_us} us.");
                Ok(true)
            }

            Ok(false) => {
                self._tracker = tracker;
                self._step_residual = step_residual;
                Ok(false)
            }

            Err(error) => {
                self._tracker = tracker;
                self._step_residual = step_residual;
                Err(error)
            }
        }
    }

    /// Flip the pier side if the declination is out of [-90, 90].
    ///
    /// # Returns
    /// True if the pier side is flipped.
    pub fn normalize_coordinates(&mut self) -> bool {
        if self._position.1.abs() > 90.0 {
            self.invert_coordinates();
            return true;
        }

        false
    }

    /// Flip the pier side. The mechanics and the motion are not changed, only
    /// the way to read them.
    pub fn invert_coordinates(&mut self) {
        self._dec_invert = !self._dec_invert;

        self._tracker.invert_coordinates();
        self._position = self
            ._coordinate_system
            .inverted_ha_dec(self._position.0, self._position.1);

        info!(
            "Pier side is {} at {}.",
            PierSide::from_dec_invert(self._dec_invert).as_ref(),
            self.local_time()
        );
    }

    /// Set the orientation of the declination axis. The tracking stops if the
    /// orientation changes.
    ///
    /// # Arguments
    /// * `invert` - The declination axis is flipped or not.
    pub fn set_dec_axis_direction(&mut self, invert: bool) {
        if invert == self._dec_invert {
            return;
        }

        self._dec_invert = invert;
        self._position = self
            ._coordinate_system
            .inverted_ha_dec(self._position.0, self._position.1);

        self._tracker.stop_tracking();
        self._speed = None;

        warn!(
            "Declination axis direction is changed to {}. Tracking is stopped.",
            PierSide::from_dec_invert(invert).as_ref()
        );
    }

    pub fn dec_axis_direction(&self) -> bool {
        self._dec_invert
    }

    pub fn pier_side(&self) -> PierSide {
        PierSide::from_dec_invert(self._dec_invert)
    }

    /// Move with the manual speed. Both zero holds the current point.
    ///
    /// # Arguments
    /// * `speed_ha` - Hour angle speed in second of time per hour.
    /// * `speed_dec` - Declination speed in arcsecond per hour.
    pub fn set_speed_ha_dec(&mut self, speed_ha: f64, speed_dec: f64) {
        let (ha, dec) = if self._tracker.mode() == TrackingMode::None {
            self._position
        } else {
            self._tracker.point()
        };

        self._tracker.init_track_ha_dec(ha, dec);

        self._speed = if (speed_ha == 0.0) && (speed_dec == 0.0) {
            None
        } else {
            Some((speed_ha / MANUAL_SPEED_SCALE, speed_dec / MANUAL_SPEED_SCALE))
        };

        info!("Manual speed is set to ({speed_ha}, {speed_dec}).");
    }

    /// Disable the stepper motors. The tracking stops.
    ///
    /// # Errors
    /// Link if the mount does not reply.
    pub fn disable_steppers(&mut self) -> Result<()> {
        self._tracker.stop_tracking();
        self._speed = None;
        self._step_residual = (0.0, 0.0);

        self._controller.disable_steppers()?;

        info!("Stepper motors are disabled.");

        Ok(())
    }

    pub fn current_position_ha_dec(&self) -> (f64, f64) {
        self._position
    }

    pub fn current_position_ra_dec(&self) -> (f64, f64) {
        (
            self._coordinate_system
                .convert_ha_to_ra(self._position.0, self.now()),
            self._position.1,
        )
    }

    pub fn current_position_az_alt(&self) -> (f64, f64) {
        self._coordinate_system
            .convert_to_az_alt(self._position.0, self._position.1)
    }

    pub fn current_target(&self) -> TrackingTarget {
        self._tracker.tracking_target()
    }

    pub fn tracking_mode(&self) -> TrackingMode {
        self._tracker.mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::time::Duration;
    use time::macros::datetime;

    use crate::error::MountError;
    use crate::mock::mock_mount::MockMount;
    use crate::mount::firmware_command::FirmwareCommand;

    const EPSILON: f64 = 1e-9;

    // One step is 1 s of hour angle and 1 millidegree of declination.
    const X_STEPS: i64 = 86400;
    const Y_STEPS: i64 = 360000;

    fn fixed_clock() -> OffsetDateTime {
        datetime!(2024-03-20 12:00 UTC)
    }

    fn create_config() -> Config {
        Config {
            x_steps: X_STEPS,
            y_steps: Y_STEPS,
            x_rotation_time: 600.0,
            y_rotation_time: 600.0,
            longitude: 37.62,
            latitude: 55.75,
            timezone: 3,
            lookahead_factor: 4.0,
            baud_rate: 115200,
        }
    }

    fn create_mount_system(x: i64, y: i64) -> (MountSystem, MockMount) {
        let mock = MockMount::new();
        mock.set_position(x, y);

        let controller = MountController::connect(Box::new(mock.clone())).unwrap();
        let mount_system =
            MountSystem::new_with_clock(controller, &create_config(), fixed_clock).unwrap();

        (mount_system, mock)
    }

    fn goto_deltas(mock: &MockMount) -> Vec<(i64, i64)> {
        mock.goto_commands()
            .into_iter()
            .filter_map(|command| match command {
                FirmwareCommand::Goto { dx, dy, .. } => Some((dx, dy)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_new() {
        let (mount_system, _) = create_mount_system(3600, 190000);

        let (ha, dec) = mount_system.current_position_ha_dec();

        assert_relative_eq!(ha, 1.0, epsilon = EPSILON);
        assert_relative_eq!(dec, 10.0, epsilon = EPSILON);
        assert_eq!(mount_system.tracking_mode(), TrackingMode::None);
        assert_eq!(mount_system.pier_side(), PierSide::Normal);
    }

    #[test]
    fn test_new_fail() {
        let mock = MockMount::new();
        let controller = MountController::connect(Box::new(mock.clone())).unwrap();
        mock.disconnect();

        assert!(matches!(
            MountSystem::new(controller, &create_config()),
            Err(MountError::Link(_))
        ));
    }

    #[test]
    fn test_convert_xy() {
        let (mut mount_system, _) = create_mount_system(0, Y_STEPS / 2);

        assert_eq!(mount_system.convert_to_xy(6.0, 30.0), (21600, 210000));

        let (ha, dec) = mount_system.convert_from_xy(21600, 210000);
        assert_relative_eq!(ha, 6.0, epsilon = EPSILON);
        assert_relative_eq!(dec, 30.0, epsilon = EPSILON);

        // Pier flipped.
        mount_system.set_dec_axis_direction(true);

        assert_eq!(mount_system.convert_to_xy(6.0, 30.0), (64800, 330000));

        let (ha, dec) = mount_system.convert_from_xy(64800, 330000);
        assert_relative_eq!(ha, 6.0, epsilon = EPSILON);
        assert_relative_eq!(dec, 30.0, epsilon = EPSILON);
    }

    #[test]
    fn test_set_position_ha_dec() {
        let (mut mount_system, mock) = create_mount_system(0, Y_STEPS / 2);

        mount_system.set_position_ha_dec(2.0, 20.0).unwrap();

        assert_eq!(
            mock.last_command(),
            Some(FirmwareCommand::SetPosition {
                x: 7200,
                y: 200000
            })
        );
        assert_eq!(mock.position(), (7200, 200000));
        assert_eq!(mount_system.tracking_mode(), TrackingMode::HoldHaDec);

        let (ha, dec) = mount_system.current_position_ha_dec();
        assert_relative_eq!(ha, 2.0, epsilon = EPSILON);
        assert_relative_eq!(dec, 20.0, epsilon = EPSILON);
    }

    #[test]
    fn test_set_position_ra_dec() {
        let (mut mount_system, _) = create_mount_system(0, Y_STEPS / 2);

        mount_system.set_position_ra_dec(5.0, 20.0).unwrap();

        let (ra, dec) = mount_system.current_position_ra_dec();
        assert_relative_eq!(ra, 5.0, epsilon = 1e-3);
        assert_relative_eq!(dec, 20.0, epsilon = EPSILON);
        assert_eq!(
            mount_system.current_target(),
            TrackingTarget::HoldRaDec { ra: 5.0, dec: 20.0 }
        );
    }

    #[test]
    fn test_set_position_az_alt() {
        let (mut mount_system, _) = create_mount_system(0, Y_STEPS / 2);

        mount_system.set_position_az_alt(200.0, 45.0).unwrap();

        let (az, alt) = mount_system.current_position_az_alt();
        assert_relative_eq!(az, 200.0, epsilon = 1e-2);
        assert_relative_eq!(alt, 45.0, epsilon = 1e-2);
        assert_eq!(mount_system.tracking_mode(), TrackingMode::HoldAzAlt);
    }

    #[test]
    fn test_goto_position_ha_dec() {
        let (mut mount_system, mock) = create_mount_system(3600, 190000);

        mount_system.goto_position_ha_dec(1.5, 10.0).unwrap();

        assert!(mock.commands().contains(&FirmwareCommand::Disable));
        assert_eq!(
            mount_system.current_target(),
            TrackingTarget::HoldHaDec { ha: 1.5, dec: 10.0 }
        );

        // The limit is 2 s / 600 s * 24 h = 0.08 h in one segment.
        assert!(mount_system.tracking_periodic(0.5).unwrap());
        assert!(mount_system.tracking_periodic(0.5).unwrap());

        // The queue is full.
        assert!(!mount_system.tracking_periodic(0.5).unwrap());

        assert_eq!(goto_deltas(&mock), vec![(288, 0), (288, 0)]);
        assert_eq!(
            mock.goto_commands()[0],
            FirmwareCommand::Goto {
                tid: 1,
                dx: 288,
                dy: 0,
                period: 2_000_000 / 288
            }
        );

        // The first segment is done.
        mock.advance(Duration::from_secs(2));

        assert!(mount_system.tracking_periodic(0.5).unwrap());
        assert_eq!(goto_deltas(&mock).len(), 3);
    }

    #[test]
    fn test_goto_position_link_failure() {
        let (mut mount_system, mock) = create_mount_system(3600, 190000);
        mock.disconnect();

        assert!(mount_system.goto_position_ra_dec(5.0, 20.0).is_err());
        assert_eq!(mount_system.tracking_mode(), TrackingMode::None);
        assert!(!mount_system.tracking_periodic(0.5).unwrap());
    }

    #[test]
    fn test_tracking_periodic_dec_invert() {
        let (mut mount_system, mock) = create_mount_system(0, 190000);
        mount_system.set_dec_axis_direction(true);

        let (ha, dec) = mount_system.current_position_ha_dec();
        assert_relative_eq!(ha, 12.0, epsilon = EPSILON);
        assert_relative_eq!(dec, 170.0, epsilon = EPSILON);

        mount_system.goto_position_ha_dec(12.0, 171.0).unwrap();

        assert!(mount_system.tracking_periodic(0.5).unwrap());
        assert_eq!(goto_deltas(&mock), vec![(0, -1000)]);
    }

    #[test]
    fn test_tracking_periodic_hold() {
        let (mut mount_system, mock) = create_mount_system(3600, 190000);
        mount_system.goto_position_ha_dec(1.0, 10.0).unwrap();

        let finish_time = mount_system.tracker().finish_time();

        // Nothing to move and the tracker does not advance.
        assert!(!mount_system.tracking_periodic(0.5).unwrap());
        assert!(goto_deltas(&mock).is_empty());
        assert_eq!(mount_system.tracker().finish_time(), finish_time);
    }

    #[test]
    fn test_tracking_periodic_step_residual() {
        let (mut mount_system, mock) = create_mount_system(0, Y_STEPS / 2);

        // 0.4 step of hour angle in each tick.
        mount_system.set_speed_ha_dec(2880.0, 0.0);

        for _ in 0..5 {
            assert!(mount_system.tracking_periodic(0.5).unwrap());
            mock.advance(Duration::from_secs(10));
        }

        let total: i64 = goto_deltas(&mock).iter().map(|(dx, _)| dx).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_tracking_periodic_ra_dec() {
        let (mut mount_system, mock) = create_mount_system(0, Y_STEPS / 2);
        mount_system.set_position_ra_dec(5.0, 0.0).unwrap();

        assert!(mount_system.tracking_periodic(0.5).unwrap());

        // About 2 s of sidereal motion.
        let deltas = goto_deltas(&mock);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].0, 2);
        assert_eq!(deltas[0].1, 0);
    }

    #[test]
    fn test_normalize_coordinates() {
        let (mut mount_system, _) = create_mount_system(0, Y_STEPS / 2);

        assert!(!mount_system.normalize_coordinates());

        mount_system.set_position_ha_dec(1.0, 100.0).unwrap();
        let xy = mount_system.convert_to_xy(1.0, 100.0);

        assert!(mount_system.normalize_coordinates());

        assert!(mount_system.dec_axis_direction());
        assert_eq!(mount_system.pier_side(), PierSide::Inverted);

        let (ha, dec) = mount_system.current_position_ha_dec();
        assert_relative_eq!(ha, 13.0, epsilon = EPSILON);
        assert_relative_eq!(dec, 80.0, epsilon = EPSILON);

        // The mechanics is the same.
        assert_eq!(mount_system.convert_to_xy(ha, dec), xy);

        // The tracker follows the flip.
        let (point_ha, point_dec) = mount_system.tracker().point();
        assert_relative_eq!(point_ha, 13.0, epsilon = EPSILON);
        assert_relative_eq!(point_dec, 80.0, epsilon = EPSILON);
    }

    #[test]
    fn test_set_dec_axis_direction() {
        let (mut mount_system, _) = create_mount_system(0, Y_STEPS / 2);
        mount_system.set_position_ha_dec(1.0, 10.0).unwrap();

        // No change.
        mount_system.set_dec_axis_direction(false);
        assert_eq!(mount_system.tracking_mode(), TrackingMode::HoldHaDec);

        mount_system.set_dec_axis_direction(true);
        assert!(mount_system.dec_axis_direction());
        assert_eq!(mount_system.tracking_mode(), TrackingMode::None);
    }

    #[test]
    fn test_set_speed_ha_dec() {
        let (mut mount_system, _) = create_mount_system(3600, 190000);

        mount_system.set_speed_ha_dec(3600.0, 0.0);

        assert_eq!(mount_system.tracking_mode(), TrackingMode::HoldHaDec);

        mount_system.tracking_periodic(1.0).unwrap();

        // One second of hour angle.
        match mount_system.current_target() {
            TrackingTarget::HoldHaDec { ha, dec } => {
                assert_relative_eq!(ha, 1.0 + 1.0 / 3600.0, epsilon = EPSILON);
                assert_relative_eq!(dec, 10.0, epsilon = EPSILON);
            }
            target => panic!("Unexpected target: {target:?}"),
        }

        // Zero speed holds the point.
        mount_system.set_speed_ha_dec(0.0, 0.0);
        let point = mount_system.tracker().point();
        assert_eq!(
            mount_system.current_target(),
            TrackingTarget::HoldHaDec {
                ha: point.0,
                dec: point.1
            }
        );
    }

    #[test]
    fn test_disable_steppers() {
        let (mut mount_system, mock) = create_mount_system(3600, 190000);
        mount_system.set_speed_ha_dec(3600.0, 0.0);
        mount_system.tracking_periodic(0.5).unwrap();

        assert!(mock.is_enabled());

        mount_system.disable_steppers().unwrap();

        assert!(!mock.is_enabled());
        assert_eq!(mount_system.tracking_mode(), TrackingMode::None);
    }

    #[test]
    fn test_local_time() {
        let (mount_system, _) = create_mount_system(0, Y_STEPS / 2);

        // Timezone is UTC+3.
        assert_eq!(mount_system.local_time(), "2024-03-20 15:00:00 +03:00");
    }

    #[test]
    fn test_read_position() {
        let (mut mount_system, mock) = create_mount_system(0, Y_STEPS / 2);
        mock.set_position(7200, 200000);

        let (ha, dec) = mount_system.read_position().unwrap();

        assert_relative_eq!(ha, 2.0, epsilon = EPSILON);
        assert_relative_eq!(dec, 20.0, epsilon = EPSILON);

        mock.disconnect();

        assert!(mount_system.read_position().is_err());
    }
}
