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

//! Sexagesimal presentation of the angles used by the LX200 protocol and the
//! logs.

// Tolerance to absorb the floating error before the truncation to second.
const TRUNCATION_TOLERANCE: f64 = 1e-6;

/// Split the value into the whole units, minutes and seconds. The seconds are
/// truncated.
///
/// # Arguments
/// * `value` - Non-negative value.
///
/// # Returns
/// Units, minutes and seconds.
fn split_sexagesimal(value: f64) -> (i64, i64, i64) {
    let total_seconds = (value * 3600.0 + TRUNCATION_TOLERANCE).floor() as i64;

    (
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
    )
}

/// Format the hours as "HH:MM:SS".
///
/// # Arguments
/// * `hours` - Hours in [0, 24).
///
/// # Returns
/// Formatted string.
pub fn format_hms(hours: f64) -> String {
    let (h, m, s) = split_sexagesimal(hours.max(0.0));

    format!("{:02}:{:02}:{:02}", h % 24, m, s)
}

/// Format the degrees as "sDD*MM:SS".
///
/// # Arguments
/// * `degrees` - Degrees.
///
/// # Returns
/// Formatted string with the explicit sign.
pub fn format_dms(degrees: f64) -> String {
    let (d, m, s) = split_sexagesimal(degrees.abs());
    let sign = if degrees < 0.0 && (d + m + s) > 0 {
        '-'
    } else {
        '+'
    };

    format!("{sign}{d:02}*{m:02}:{s:02}")
}

/// Combine the sexagesimal fields. The minutes can carry the decimal part
/// ("MM.T") when there is no seconds field.
///
/// # Arguments
/// * `fields` - Units, minutes, and optional seconds.
///
/// # Returns
/// Value if all the fields are numbers, otherwise None.
fn combine_fields(fields: &[&str]) -> Option<f64> {
    if fields.is_empty() || fields.len() > 3 {
        return None;
    }

    let mut value = 0.0;
    let mut scale = 1.0;
    for field in fields {
        let number = field.trim().parse::<f64>().ok()?;
        if !number.is_finite() || number < 0.0 {
            return None;
        }

        value += number / scale;
        scale *= 60.0;
    }

    Some(value)
}

/// Parse the "HH:MM:SS" or "HH:MM.T" into hours.
///
/// # Arguments
/// * `text` - Text to parse.
///
/// # Returns
/// Hours if the text is valid, otherwise None.
pub fn parse_hms(text: &str) -> Option<f64> {
    let fields: Vec<&str> = text.split(':').collect();

    combine_fields(&fields)
}

/// Parse the "sDD*MM:SS", "sDD*MM'SS" or "sDD*MM" into degrees. The sign is
/// optional.
///
/// # Arguments
/// * `text` - Text to parse.
///
/// # Returns
/// Degrees if the text is valid, otherwise None.
pub fn parse_dms(text: &str) -> Option<f64> {
    let text = text.trim();
    let (sign, unsigned) = match text.chars().next() {
        Some('-') => (-1.0, &text[1..]),
        Some('+') => (1.0, &text[1..]),
        _ => (1.0, text),
    };

    let fields: Vec<&str> = unsigned
        .split(|c: char| c == '*' || c == ':' || c == '\'' || c == '\u{df}')
        .collect();

    combine_fields(&fields).map(|value| sign * value)
}
