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
use time::{Duration, OffsetDateTime};

use crate::config::Config;
use crate::constants::{DEGREES_PER_ROUND, HOURS_PER_DAY};
use crate::coordinate::coordinate_system::{normalize_hours, CoordinateSystem};
use crate::enums::TrackingMode;

/// What the tracker holds. The payload is the target in the frame of the
/// mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackingTarget {
    None,
    // Hour angle in hour and declination in degree.
    HoldHaDec { ha: f64, dec: f64 },
    // Right ascension in hour and declination in degree.
    HoldRaDec { ra: f64, dec: f64 },
    // Azimuth and altitude in degree. The flipped target is reached with the
    // other pier side.
    HoldAzAlt { az: f64, alt: f64, flipped: bool },
}

impl TrackingTarget {
    pub fn mode(&self) -> TrackingMode {
        match self {
            Self::None => TrackingMode::None,
            Self::HoldHaDec { .. } => TrackingMode::HoldHaDec,
            Self::HoldRaDec { .. } => TrackingMode::HoldRaDec,
            Self::HoldAzAlt { .. } => TrackingMode::HoldAzAlt,
        }
    }
}

/// Incremental motion to command in this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackDelta {
    // Hour angle in hour.
    pub ha: f64,
    // Declination in degree.
    pub dec: f64,
    // Duration of the motion in second.
    pub delta_t: f64,
}

impl TrackDelta {
    pub fn zero() -> Self {
        Self {
            ha: 0.0,
            dec: 0.0,
            delta_t: 0.0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.ha == 0.0 && self.dec == 0.0
    }
}

/// Wrap the difference into (-period/2, period/2].
///
/// # Arguments
/// * `delta` - Difference.
/// * `period` - Period.
///
/// # Returns
/// Shortest signed difference.
fn wrap_delta(delta: f64, period: f64) -> f64 {
    let half = period / 2.0;
    half - (half - delta).rem_euclid(period)
}

/// Velocity-limited trajectory generator. The tracker keeps the end point of
/// all the issued segments (point) and the instant they finish, and plans the
/// next segment towards the target within the slew speed of each axis.
#[derive(Debug, Clone)]
pub struct Tracker {
    _coordinate_system: CoordinateSystem,
    // Seconds per full rotation of each axis.
    _x_rotation_time: f64,
    _y_rotation_time: f64,
    // Ticks planned ahead.
    _lookahead_factor: f64,
    _target: TrackingTarget,
    // End point (hour angle, declination) of the issued segments.
    _point: (f64, f64),
    // Instant when the issued segments finish.
    _finish_time: OffsetDateTime,
}

impl Tracker {
    /// Create a new tracker that holds nothing.
    ///
    /// # Arguments
    /// * `coordinate_system` - Coordinate system of the site.
    /// * `config` - Configuration.
    /// * `now` - Current time.
    ///
    /// # Returns
    /// A new tracker.
    pub fn new(coordinate_system: CoordinateSystem, config: &Config, now: OffsetDateTime) -> Self {
        Self {
            _coordinate_system: coordinate_system,
            _x_rotation_time: config.x_rotation_time,
            _y_rotation_time: config.y_rotation_time,
            _lookahead_factor: config.lookahead_factor,
            _target: TrackingTarget::None,
            _point: (0.0, 0.0),
            _finish_time: now,
        }
    }

    /// Start to hold the hour angle and declination from this point.
    ///
    /// # Arguments
    /// * `ha` - Hour angle in hour.
    /// * `dec` - Declination in degree.
    pub fn init_track_ha_dec(&mut self, ha: f64, dec: f64) {
        let ha = normalize_hours(ha);

        self._point = (ha, dec);
        self._target = TrackingTarget::HoldHaDec { ha: ha, dec: dec };
    }

    /// Start to hold the right ascension and declination from this point.
    ///
    /// # Arguments
    /// * `ra` - Right ascension in hour.
    /// * `dec` - Declination in degree.
    /// * `now` - Current time.
    pub fn init_track_ra_dec(&mut self, ra: f64, dec: f64, now: OffsetDateTime) {
        let ra = normalize_hours(ra);

        self._point = (self._coordinate_system.convert_ra_to_ha(ra, now), dec);
        self._target = TrackingTarget::HoldRaDec { ra: ra, dec: dec };
    }

    /// Start to hold the azimuth and altitude from this point.
    ///
    /// # Arguments
    /// * `az` - Azimuth in degree.
    /// * `alt` - Altitude in degree.
    pub fn init_track_az_alt(&mut self, az: f64, alt: f64) {
        self._point = self._coordinate_system.convert_from_az_alt(az, alt);
        self._target = TrackingTarget::HoldAzAlt {
            az: az,
            alt: alt,
            flipped: false,
        };
    }

    /// Hold nothing. The point is kept.
    pub fn stop_tracking(&mut self) {
        self._target = TrackingTarget::None;
    }

    /// Set the target in hour angle and declination.
    ///
    /// # Arguments
    /// * `ha` - Hour angle in hour.
    /// * `dec` - Declination in degree.
    pub fn set_target_ha_dec(&mut self, ha: f64, dec: f64) {
        self._target = TrackingTarget::HoldHaDec {
            ha: normalize_hours(ha),
            dec: dec,
        };
    }

    /// Set the target in right ascension and declination.
    ///
    /// # Arguments
    /// * `ra` - Right ascension in hour.
    /// * `dec` - Declination in degree.
    pub fn set_target_ra_dec(&mut self, ra: f64, dec: f64) {
        self._target = TrackingTarget::HoldRaDec {
            ra: normalize_hours(ra),
            dec: dec,
        };
    }

    /// Set the target in azimuth and altitude.
    ///
    /// # Arguments
    /// * `az` - Azimuth in degree.
    /// * `alt` - Altitude in degree.
    pub fn set_target_az_alt(&mut self, az: f64, alt: f64) {
        self._target = TrackingTarget::HoldAzAlt {
            az: az,
            alt: alt,
            flipped: false,
        };
    }

    /// Shift the hour angle and declination target.
    ///
    /// # Arguments
    /// * `delta_ha` - Shift of the hour angle in hour.
    /// * `delta_dec` - Shift of the declination in degree.
    ///
    /// # Returns
    /// True if the target is shifted. False if the tracker does not hold the
    /// hour angle and declination.
    pub fn offset_target(&mut self, delta_ha: f64, delta_dec: f64) -> bool {
        if let TrackingTarget::HoldHaDec { ha, dec } = self._target {
            self._target = TrackingTarget::HoldHaDec {
                ha: normalize_hours(ha + delta_ha),
                dec: dec + delta_dec,
            };

            return true;
        }

        false
    }

    /// Instant when the next segment finishes.
    ///
    /// # Arguments
    /// * `delta_t` - Duration of the next segment in second.
    /// * `now` - Current time.
    ///
    /// # Returns
    /// Finish time of the next segment.
    pub fn next_finish_time(&self, delta_t: f64, now: OffsetDateTime) -> OffsetDateTime {
        self._finish_time.max(now) + Duration::seconds_f64(delta_t)
    }

    /// Plan the next segment. This is called once per tick.
    ///
    /// # Arguments
    /// * `delta_t` - Tick period in second.
    /// * `now` - Current time.
    ///
    /// # Returns
    /// Motion to command. Zero if nothing is held.
    pub fn process_track(&mut self, delta_t: f64, now: OffsetDateTime) -> TrackDelta {
        let delta_t = delta_t * self._lookahead_factor;

        match self._target {
            TrackingTarget::None => TrackDelta::zero(),

            TrackingTarget::HoldHaDec { ha, dec } => {
                let new_finish_time = self.next_finish_time(delta_t, now);
                self.track(ha, dec, new_finish_time, delta_t)
            }

            TrackingTarget::HoldRaDec { ra, dec } => {
                let new_finish_time = self.next_finish_time(delta_t, now);
                let ha = self
                    ._coordinate_system
                    .convert_ra_to_ha(ra, new_finish_time);

                self.track(ha, dec, new_finish_time, delta_t)
            }

            TrackingTarget::HoldAzAlt { az, alt, flipped } => {
                let new_finish_time = self.next_finish_time(delta_t, now);
                let (mut ha, mut dec) = self._coordinate_system.convert_from_az_alt(az, alt);
                if flipped {
                    (ha, dec) = self._coordinate_system.inverted_ha_dec(ha, dec);
                }

                self.track(ha, dec, new_finish_time, delta_t)
            }
        }
    }

    /// Move the point towards the target within the speed limits.
    ///
    /// When the hour angle is over its limit, both components are scaled to
    /// the limit. When the original declination delta is over its limit, both
    /// components are then scaled by the declination limit over the already
    /// scaled declination component.
    ///
    /// # Arguments
    /// * `target_ha` - Target hour angle in hour.
    /// * `target_dec` - Target declination in degree.
    /// * `new_finish_time` - Finish time of the segment.
    /// * `delta_t` - Duration of the segment in second.
    ///
    /// # Returns
    /// Motion of the segment.
    pub(crate) fn track(
        &mut self,
        target_ha: f64,
        target_dec: f64,
        new_finish_time: OffsetDateTime,
        delta_t: f64,
    ) -> TrackDelta {
        let delta_ha = wrap_delta(target_ha - self._point.0, HOURS_PER_DAY);
        let delta_dec = wrap_delta(target_dec - self._point.1, DEGREES_PER_ROUND);

        let max_delta_ha = delta_t / self._x_rotation_time * HOURS_PER_DAY;
        let max_delta_dec = delta_t / self._y_rotation_time * DEGREES_PER_ROUND;

        let mut p_delta_ha = delta_ha;
        let mut p_delta_dec = delta_dec;

        if delta_ha.abs() > max_delta_ha {
            let scale = max_delta_ha / delta_ha.abs();
            p_delta_ha *= scale;
            p_delta_dec *= scale;
        }

        if (delta_dec.abs() > max_delta_dec) && (p_delta_dec != 0.0) {
            let scale = max_delta_dec / p_delta_dec.abs();
            p_delta_ha *= scale;
            p_delta_dec *= scale;
        }

        self._point = (
            normalize_hours(self._point.0 + p_delta_ha),
            self._point.1 + p_delta_dec,
        );
        self._finish_time = new_finish_time;

        debug!(
            "Track by ({p_delta_ha}, {p_delta_dec}) in {delta_t} s to ({}, {}).",
            self._point.0, self._point.1
        );

        TrackDelta {
            ha: p_delta_ha,
            dec: p_delta_dec,
            delta_t: delta_t,
        }
    }

    /// Re-express the point and target with the opposite pier side, so the
    /// motion stays continuous across the flip.
    pub fn invert_coordinates(&mut self) {
        let cs = self._coordinate_system;

        self._point = cs.inverted_ha_dec(self._point.0, self._point.1);

        self._target = match self._target {
            TrackingTarget::None => TrackingTarget::None,

            TrackingTarget::HoldHaDec { ha, dec } => {
                let (ha, dec) = cs.inverted_ha_dec(ha, dec);
                TrackingTarget::HoldHaDec { ha: ha, dec: dec }
            }

            TrackingTarget::HoldRaDec { ra, dec } => {
                let ha = cs.convert_ra_to_ha(ra, self._finish_time);
                let (ha, dec) = cs.inverted_ha_dec(ha, dec);
                TrackingTarget::HoldRaDec {
                    ra: cs.convert_ha_to_ra(ha, self._finish_time),
                    dec: dec,
                }
            }

            TrackingTarget::HoldAzAlt { az, alt, flipped } => TrackingTarget::HoldAzAlt {
                az: az,
                alt: alt,
                flipped: !flipped,
            },
        };
    }

    pub fn tracking_target(&self) -> TrackingTarget {
        self._target
    }

    pub fn mode(&self) -> TrackingMode {
        self._target.mode()
    }

    /// End point (hour angle, declination) of the issued segments.
    pub fn point(&self) -> (f64, f64) {
        self._point
    }

    pub fn finish_time(&self) -> OffsetDateTime {
        self._finish_time
    }
}
