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

use time::{
    macros::{datetime, format_description},
    OffsetDateTime, UtcOffset,
};

use crate::constants::{DEGREES_PER_ROUND, HOURS_PER_DAY, SECONDS_PER_DAY};

// Reference epoch of the sidereal time polynomial.
const J2000: OffsetDateTime = datetime!(2000-01-01 0:00 UTC);

// Coefficients of the sidereal angle polynomial in degree.
const L0: f64 = 99.967794687;
const L1: f64 = 360.98564736628603;
const L2: f64 = 2.907879e-13;
const L3: f64 = -5.302e-22;

const DEGREES_PER_HOUR: f64 = DEGREES_PER_ROUND / HOURS_PER_DAY;

/// Sidereal time at an instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiderealTime {
    // Number of full rounds since the reference.
    pub rounds: i64,
    // Sidereal time in hour, normalized into [0, 24).
    pub hours: f64,
    // Unnormalized sidereal time in hour.
    pub total_hours: f64,
}

/// Normalize the hours into [0, 24).
///
/// # Arguments
/// * `hours` - Hours.
///
/// # Returns
/// Normalized hours.
pub fn normalize_hours(hours: f64) -> f64 {
    let normalized = hours.rem_euclid(HOURS_PER_DAY);
    if normalized >= HOURS_PER_DAY {
        0.0
    } else {
        normalized
    }
}

/// Normalize the degrees into [0, 360).
///
/// # Arguments
/// * `degrees` - Degrees.
///
/// # Returns
/// Normalized degrees.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(DEGREES_PER_ROUND);
    if normalized >= DEGREES_PER_ROUND {
        0.0
    } else {
        normalized
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateSystem {
    // Timezone of the observer. Only used to present the local time.
    _timezone: UtcOffset,
    // Longitude of the observer in degree (East is positive).
    _longitude: f64,
    // Latitude of the observer in degree.
    _latitude: f64,
}

impl CoordinateSystem {
    /// Create a new coordinate system.
    ///
    /// # Arguments
    /// * `timezone` - Timezone of the observer.
    /// * `longitude` - Longitude in degree. East is positive.
    /// * `latitude` - Latitude in degree.
    ///
    /// # Returns
    /// A new coordinate system.
    pub fn new(timezone: UtcOffset, longitude: f64, latitude: f64) -> Self {
        Self {
            _timezone: timezone,
            _longitude: longitude,
            _latitude: latitude,
        }
    }

    pub fn latitude(&self) -> f64 {
        self._latitude
    }

    pub fn longitude(&self) -> f64 {
        self._longitude
    }

    /// Present the instant in the local timezone of the observer.
    ///
    /// # Arguments
    /// * `time` - Instant.
    ///
    /// # Returns
    /// Local time.
    pub fn to_local_time(&self, time: OffsetDateTime) -> OffsetDateTime {
        time.to_offset(self._timezone)
    }

    /// Format the instant in the local timezone for the logs.
    ///
    /// # Arguments
    /// * `time` - Instant.
    ///
    /// # Returns
    /// Local time as "YYYY-MM-DD hh:mm:ss +hh:mm".
    pub fn format_local_time(&self, time: OffsetDateTime) -> String {
        let local = self.to_local_time(time);

        local
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second] [offset_hour sign:mandatory]:[offset_minute]"
            ))
            .unwrap_or_else(|_| local.to_string())
    }

    /// Global (Greenwich) sidereal time.
    ///
    /// # Arguments
    /// * `time` - Instant.
    ///
    /// # Returns
    /// Sidereal time.
    pub fn global_sidereal_time(&self, time: OffsetDateTime) -> SiderealTime {
        let delta = (time - J2000).as_seconds_f64() / SECONDS_PER_DAY;

        let angle = L0 + L1 * delta + L2 * delta.powi(2) + L3 * delta.powi(3);
        let rounds = (angle / DEGREES_PER_ROUND).floor();

        SiderealTime {
            rounds: rounds as i64,
            hours: (angle - DEGREES_PER_ROUND * rounds) / DEGREES_PER_HOUR,
            total_hours: angle / DEGREES_PER_HOUR,
        }
    }

    /// Local sidereal time at the longitude of the observer.
    ///
    /// # Arguments
    /// * `time` - Instant.
    ///
    /// # Returns
    /// Sidereal time. The hours are in [0, 24).
    pub fn local_sidereal_time(&self, time: OffsetDateTime) -> SiderealTime {
        let total_hours =
            self.global_sidereal_time(time).total_hours + self._longitude / DEGREES_PER_HOUR;
        let rounds = (total_hours / HOURS_PER_DAY).floor();

        SiderealTime {
            rounds: rounds as i64,
            hours: normalize_hours(total_hours - rounds * HOURS_PER_DAY),
            total_hours: total_hours,
        }
    }

    /// Hour angle from the right ascension.
    ///
    /// # Arguments
    /// * `ra` - Right ascension in hour.
    /// * `lst` - Local sidereal time in hour.
    ///
    /// # Returns
    /// Hour angle in hour.
    pub fn ra_to_ha(ra: f64, lst: f64) -> f64 {
        Self::wrap_once(lst - ra)
    }

    /// Right ascension from the hour angle.
    ///
    /// # Arguments
    /// * `ha` - Hour angle in hour.
    /// * `lst` - Local sidereal time in hour.
    ///
    /// # Returns
    /// Right ascension in hour.
    pub fn ha_to_ra(ha: f64, lst: f64) -> f64 {
        Self::wrap_once(lst - ha)
    }

    fn wrap_once(hours: f64) -> f64 {
        if hours < 0.0 {
            hours + HOURS_PER_DAY
        } else if hours >= HOURS_PER_DAY {
            hours - HOURS_PER_DAY
        } else {
            hours
        }
    }

    /// Convert the hour angle to the right ascension at the instant.
    ///
    /// # Arguments
    /// * `ha` - Hour angle in hour.
    /// * `time` - Instant.
    ///
    /// # Returns
    /// Right ascension in hour.
    pub fn convert_ha_to_ra(&self, ha: f64, time: OffsetDateTime) -> f64 {
        Self::ha_to_ra(ha, self.local_sidereal_time(time).hours)
    }

    /// Convert the right ascension to the hour angle at the instant.
    ///
    /// # Arguments
    /// * `ra` - Right ascension in hour.
    /// * `time` - Instant.
    ///
    /// # Returns
    /// Hour angle in hour.
    pub fn convert_ra_to_ha(&self, ra: f64, time: OffsetDateTime) -> f64 {
        Self::ra_to_ha(ra, self.local_sidereal_time(time).hours)
    }

    /// Convert the hour angle and declination to the azimuth and altitude.
    /// The azimuth is counted from the north through the east.
    ///
    /// # Arguments
    /// * `ha` - Hour angle in hour.
    /// * `dec` - Declination in degree. The pier flip is applied first if it
    /// is out of [-90, 90].
    ///
    /// # Returns
    /// Azimuth in [0, 360) and altitude in degree.
    pub fn convert_to_az_alt(&self, ha: f64, dec: f64) -> (f64, f64) {
        let (_, ha, dec) = self.normalized_ha_dec(ha, dec);

        let latitude = self._latitude.to_radians();
        let ha = (ha * DEGREES_PER_HOUR).to_radians();
        let dec = dec.to_radians();

        let sin_alt = (dec.sin() * latitude.sin() + dec.cos() * latitude.cos() * ha.cos())
            .clamp(-1.0, 1.0);
        let alt = sin_alt.asin();

        let denominator = alt.cos() * latitude.cos();
        let cos_a = if denominator.abs() < f64::EPSILON {
            1.0
        } else {
            ((dec.sin() - sin_alt * latitude.sin()) / denominator).clamp(-1.0, 1.0)
        };
        let a = cos_a.acos().to_degrees();

        let az = if ha.sin() < 0.0 {
            a
        } else {
            DEGREES_PER_ROUND - a
        };

        (normalize_degrees(az), alt.to_degrees())
    }

    /// Convert the azimuth and altitude to the hour angle and declination.
    ///
    /// # Arguments
    /// * `az` - Azimuth in degree.
    /// * `alt` - Altitude in degree.
    ///
    /// # Returns
    /// Hour angle in [0, 24) and declination in degree.
    pub fn convert_from_az_alt(&self, az: f64, alt: f64) -> (f64, f64) {
        let latitude = self._latitude.to_radians();
        let az = az.to_radians();
        let alt = alt.to_radians();

        let sin_dec = (alt.sin() * latitude.sin() + alt.cos() * latitude.cos() * az.cos())
            .clamp(-1.0, 1.0);
        let dec = sin_dec.asin();

        let denominator = latitude.cos() * dec.cos();
        let cos_ha = if denominator.abs() < f64::EPSILON {
            1.0
        } else {
            ((alt.sin() - latitude.sin() * sin_dec) / denominator).clamp(-1.0, 1.0)
        };

        let mut ha = cos_ha.acos().to_degrees() / DEGREES_PER_HOUR;
        // acos() loses the side of the meridian.
        if az.sin() > 0.0 {
            ha = HOURS_PER_DAY - ha;
        }

        (normalize_hours(ha), dec.to_degrees())
    }

    /// The same sky point expressed with the opposite pier side.
    ///
    /// # Arguments
    /// * `ha` - Hour angle in hour.
    /// * `dec` - Declination in degree.
    ///
    /// # Returns
    /// Inverted hour angle and declination.
    pub fn inverted_ha_dec(&self, ha: f64, dec: f64) -> (f64, f64) {
        let dec_inverted = if dec > 0.0 { 180.0 - dec } else { -180.0 - dec };

        let mut ha_inverted = ha + HOURS_PER_DAY / 2.0;
        if ha_inverted >= HOURS_PER_DAY {
            ha_inverted -= HOURS_PER_DAY;
        }

        (ha_inverted, dec_inverted)
    }

    /// Bring the declination back into [-90, 90].
    ///
    /// # Arguments
    /// * `ha` - Hour angle in hour.
    /// * `dec` - Declination in degree.
    ///
    /// # Returns
    /// The pier flip is applied (true) or not, and the normalized hour angle
    /// and declination.
    pub fn normalized_ha_dec(&self, ha: f64, dec: f64) -> (bool, f64, f64) {
        if dec.abs() > 90.0 {
            let (ha_inverted, dec_inverted) = self.inverted_ha_dec(ha, dec);
            return (true, normalize_hours(ha_inverted), dec_inverted);
        }

        (false, normalize_hours(ha), dec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use time::Duration;

    const EPSILON: f64 = 1e-7;

    fn create_coordinate_system(latitude: f64) -> CoordinateSystem {
        CoordinateSystem::new(UtcOffset::UTC, 37.5, latitude)
    }

    #[test]
    fn test_normalize_hours() {
        assert_relative_eq!(normalize_hours(25.5), 1.5, epsilon = EPSILON);
        assert_relative_eq!(normalize_hours(-1.0), 23.0, epsilon = EPSILON);
        assert_eq!(normalize_hours(24.0), 0.0);
        assert!(normalize_hours(-1e-17) < 24.0);
    }

    #[test]
    fn test_normalize_degrees() {
        assert_relative_eq!(normalize_degrees(370.0), 10.0, epsilon = EPSILON);
        assert_relative_eq!(normalize_degrees(-90.0), 270.0, epsilon = EPSILON);
        assert_eq!(normalize_degrees(360.0), 0.0);
    }

    #[test]
    fn test_global_sidereal_time_at_epoch() {
        let cs = create_coordinate_system(45.0);

        let gst = cs.global_sidereal_time(J2000);

        assert_eq!(gst.rounds, 0);
        assert_relative_eq!(gst.hours, L0 / 15.0, epsilon = EPSILON);
        assert_relative_eq!(gst.total_hours, L0 / 15.0, epsilon = EPSILON);
    }

    #[test]
    fn test_global_sidereal_time_one_day() {
        let cs = create_coordinate_system(45.0);

        let gst = cs.global_sidereal_time(J2000 + Duration::days(1));

        assert_eq!(gst.rounds, 1);
        assert_relative_eq!(
            gst.hours,
            (L0 + L1 + L2 + L3 - 360.0) / 15.0,
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_local_sidereal_time_range() {
        let cs = create_coordinate_system(45.0);

        let mut time = datetime!(2024-03-01 0:00 UTC);
        for _ in 0..500 {
            let lst = cs.local_sidereal_time(time);

            assert!(lst.hours >= 0.0 && lst.hours < 24.0);

            time += Duration::minutes(37);
        }
    }

    #[test]
    fn test_local_sidereal_time_longitude() {
        let cs_east = CoordinateSystem::new(UtcOffset::UTC, 15.0, 0.0);
        let cs_zero = CoordinateSystem::new(UtcOffset::UTC, 0.0, 0.0);

        let time = datetime!(2024-03-01 12:00 UTC);

        assert_relative_eq!(
            normalize_hours(
                cs_east.local_sidereal_time(time).hours - cs_zero.local_sidereal_time(time).hours
            ),
            1.0,
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_ra_ha_round_trip() {
        for lst in [0.0, 3.3, 12.0, 23.9] {
            for ra in [0.0, 0.5, 6.25, 11.99, 18.0, 23.99] {
                let ha = CoordinateSystem::ra_to_ha(ra, lst);
                assert!(ha >= 0.0 && ha < 24.0);

                let ra_back = CoordinateSystem::ha_to_ra(ha, lst);
                assert_relative_eq!(ra_back, ra, epsilon = EPSILON);
            }
        }
    }

    #[test]
    fn test_convert_ra_to_ha() {
        let cs = create_coordinate_system(45.0);
        let time = datetime!(2024-03-01 22:15 UTC);

        let ha = cs.convert_ra_to_ha(10.0, time);
        let ra = cs.convert_ha_to_ra(ha, time);

        assert_relative_eq!(ra, 10.0, epsilon = EPSILON);
        assert_relative_eq!(
            normalize_hours(ha + 10.0),
            cs.local_sidereal_time(time).hours,
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_to_local_time() {
        let cs = CoordinateSystem::new(UtcOffset::from_hms(3, 0, 0).unwrap(), 0.0, 0.0);

        let local = cs.to_local_time(datetime!(2024-03-01 22:00 UTC));

        assert_eq!(local.hour(), 1);
        assert_eq!(local, datetime!(2024-03-01 22:00 UTC));
    }

    #[test]
    fn test_format_local_time() {
        let cs = CoordinateSystem::new(UtcOffset::from_hms(3, 0, 0).unwrap(), 0.0, 0.0);

        assert_eq!(
            cs.format_local_time(datetime!(2024-03-01 22:00:05 UTC)),
            "2024-03-02 01:00:05 +03:00"
        );

        let cs = CoordinateSystem::new(UtcOffset::from_hms(-5, 0, 0).unwrap(), 0.0, 0.0);

        assert_eq!(
            cs.format_local_time(datetime!(2024-03-01 02:30 UTC)),
            "2024-02-29 21:30:00 -05:00"
        );
    }

    #[test]
    fn test_convert_to_az_alt_meridian() {
        let cs = create_coordinate_system(45.0);

        // Celestial equator on the meridian is in the south.
        let (az, alt) = cs.convert_to_az_alt(0.0, 0.0);
        assert_relative_eq!(az, 180.0, epsilon = EPSILON);
        assert_relative_eq!(alt, 45.0, epsilon = EPSILON);

        // Zenith
        let (_, alt) = cs.convert_to_az_alt(0.0, 45.0);
        assert_relative_eq!(alt, 90.0, epsilon = 1e-6);
    }

    #[test]
    fn test_convert_to_az_alt_east() {
        let cs = create_coordinate_system(45.0);

        let (az, alt) = cs.convert_to_az_alt(18.0, 0.0);

        assert_relative_eq!(az, 90.0, epsilon = EPSILON);
        assert_relative_eq!(alt, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_convert_to_az_alt_normalizes() {
        let cs = create_coordinate_system(45.0);

        let (ha, dec) = cs.inverted_ha_dec(2.0, 30.0);

        let (az_1, alt_1) = cs.convert_to_az_alt(2.0, 30.0);
        let (az_2, alt_2) = cs.convert_to_az_alt(ha, dec);

        assert_relative_eq!(az_1, az_2, epsilon = EPSILON);
        assert_relative_eq!(alt_1, alt_2, epsilon = EPSILON);
    }

    #[test]
    fn test_convert_from_az_alt_east() {
        let cs = create_coordinate_system(45.0);

        let (ha, dec) = cs.convert_from_az_alt(90.0, 0.0);

        assert_relative_eq!(ha, 18.0, epsilon = EPSILON);
        assert_relative_eq!(dec, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_az_alt_round_trip() {
        for latitude in [-60.0, -20.0, 10.0, 45.0, 70.0] {
            let cs = create_coordinate_system(latitude);

            for ha in [0.5, 2.0, 5.5, 9.0, 13.0, 17.5, 22.0] {
                for dec in [-40.0, -10.0, 0.0, 25.0, 60.0] {
                    let (az, alt) = cs.convert_to_az_alt(ha, dec);
                    assert!(az >= 0.0 && az < 360.0);

                    let (ha_back, dec_back) = cs.convert_from_az_alt(az, alt);

                    assert_relative_eq!(ha_back, ha, epsilon = 1e-6);
                    assert_relative_eq!(dec_back, dec, epsilon = 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_inverted_ha_dec() {
        let cs = create_coordinate_system(45.0);

        assert_eq!(cs.inverted_ha_dec(2.0, 30.0), (14.0, 150.0));
        assert_eq!(cs.inverted_ha_dec(13.0, -30.0), (1.0, -150.0));
        assert_eq!(cs.inverted_ha_dec(0.0, 0.0), (12.0, -180.0));
    }

    #[test]
    fn test_inverted_ha_dec_twice() {
        let cs = create_coordinate_system(45.0);

        for ha in [0.0, 3.5, 11.99, 12.0, 20.0, 23.5] {
            for dec in [-89.0, -45.0, 0.0, 10.0, 90.0, 120.0, -170.0] {
                let (ha_1, dec_1) = cs.inverted_ha_dec(ha, dec);
                let (ha_2, dec_2) = cs.inverted_ha_dec(ha_1, dec_1);

                assert_relative_eq!(normalize_hours(ha_2), ha, epsilon = EPSILON);
                assert_relative_eq!(dec_2, dec, epsilon = EPSILON);
            }
        }
    }

    #[test]
    fn test_normalized_ha_dec() {
        let cs = create_coordinate_system(45.0);

        for dec in [90.5, 100.0, 135.0, 179.0, -91.0, -120.0, -179.5] {
            let (is_inverted, ha, dec_normalized) = cs.normalized_ha_dec(5.0, dec);

            assert!(is_inverted);
            assert!(dec_normalized.abs() <= 90.0);
            assert_relative_eq!(ha, 17.0, epsilon = EPSILON);
        }

        let (is_inverted, ha, dec) = cs.normalized_ha_dec(25.0, 90.0);

        assert!(!is_inverted);
        assert_relative_eq!(ha, 1.0, epsilon = EPSILON);
        assert_eq!(dec, 90.0);
    }
}
