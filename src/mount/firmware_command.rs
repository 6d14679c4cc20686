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

use std::fmt;
use std::str::FromStr;

use crate::constants::IDLE_STEP_PERIOD_US;
use crate::error::{MountError, Result};

/// Format the integer in octal with the "-" prefix for the negative value.
///
/// # Arguments
/// * `value` - Value.
///
/// # Returns
/// Octal string.
pub fn format_octal(value: i64) -> String {
    if value < 0 {
        format!("-{:o}", value.unsigned_abs())
    } else {
        format!("{:o}", value)
    }
}

/// Parse the octal string with the optional "-" prefix.
///
/// # Arguments
/// * `text` - Octal string.
///
/// # Returns
/// Value.
///
/// # Errors
/// ProtocolParse if the text is not an octal number.
pub fn parse_octal(text: &str) -> Result<i64> {
    let (sign, digits) = match text.strip_prefix('-') {
        Some(digits) => (-1, digits),
        None => (1, text),
    };

    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(MountError::protocol_parse(text, "Not an octal number"));
    }

    i64::from_str_radix(digits, 8)
        .map(|value| sign * value)
        .map_err(|_| MountError::protocol_parse(text, "Not an octal number"))
}

/// Step period in microsecond of a segment.
///
/// # Arguments
/// * `dx` - Steps of the x axis.
/// * `dy` - Steps of the y axis.
/// * `time_us` - Duration of the segment in microsecond.
///
/// # Returns
/// Microseconds per step of the faster axis.
pub fn step_period(dx: i64, dy: i64, time_us: i64) -> i64 {
    let steps = dx.abs().max(dy.abs());
    if steps == 0 {
        return IDLE_STEP_PERIOD_US;
    }

    time_us / steps
}

/// Commands of the stepper-motor firmware. The numeric fields are octal on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareCommand {
    // Reply is "<tid> <x> <y>".
    ReadPosition,
    Disable,
    // Queue a linear segment.
    Goto {
        tid: i32,
        dx: i64,
        dy: i64,
        period: i64,
    },
    // Set the position registers without motion.
    SetPosition {
        x: i64,
        y: i64,
    },
}

impl fmt::Display for FirmwareCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadPosition => write!(f, "P"),
            Self::Disable => write!(f, "D"),
            Self::Goto {
                tid,
                dx,
                dy,
                period,
            } => write!(
                f,
                "G {} {} {} {}",
                format_octal(*tid as i64),
                format_octal(*dx),
                format_octal(*dy),
                format_octal(*period)
            ),
            Self::SetPosition { x, y } => {
                write!(f, "S {} {}", format_octal(*x), format_octal(*y))
            }
        }
    }
}

impl FromStr for FirmwareCommand {
    type Err = MountError;

    fn from_str(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();

        match fields.as_slice() {
            ["P"] => Ok(Self::ReadPosition),
            ["D"] => Ok(Self::Disable),
            ["G", tid, dx, dy, period] => Ok(Self::Goto {
                tid: parse_octal(tid)? as i32,
                dx: parse_octal(dx)?,
                dy: parse_octal(dy)?,
                period: parse_octal(period)?,
            }),
            ["S", x, y] => Ok(Self::SetPosition {
                x: parse_octal(x)?,
                y: parse_octal(y)?,
            }),
            _ => Err(MountError::protocol_parse(line, "Unknown command")),
        }
    }
}

/// Parse the reply of the position read.
///
/// # Arguments
/// * `reply` - Reply "<tid> <x> <y>".
///
/// # Returns
/// Sequence ID, x and y.
///
/// # Errors
/// ProtocolParse if the field count is wrong or a field is not octal.
pub fn parse_position_reply(reply: &str) -> Result<(i32, i64, i64)> {
    let fields: Vec<&str> = reply.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(MountError::protocol_parse(reply, "Wrong field count"));
    }

    Ok((
        parse_octal(fields[0])? as i32,
        parse_octal(fields[1])?,
        parse_octal(fields[2])?,
    ))
}

/// Format the reply of the position read.
///
/// # Arguments
/// * `tid` - Sequence ID.
/// * `x` - Position of the x axis.
/// * `y` - Position of the y axis.
///
/// # Returns
/// Reply.
pub fn format_position_reply(tid: i32, x: i64, y: i64) -> String {
    format!(
        "{} {} {}",
        format_octal(tid as i64),
        format_octal(x),
        format_octal(y)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_octal() {
        assert_eq!(format_octal(0), "0");
        assert_eq!(format_octal(8), "10");
        assert_eq!(format_octal(-9), "-11");
        assert_eq!(format_octal(511), "777");
    }

    #[test]
    fn test_parse_octal() {
        assert_eq!(parse_octal("10").unwrap(), 8);
        assert_eq!(parse_octal("-11").unwrap(), -9);
        assert_eq!(parse_octal("0").unwrap(), 0);

        assert!(parse_octal("8").is_err());
        assert!(parse_octal("").is_err());
        assert!(parse_octal("-").is_err());
        assert!(parse_octal("--1").is_err());
        assert!(parse_octal("+1").is_err());
        assert!(parse_octal("x1").is_err());
    }

    #[test]
    fn test_step_period() {
        assert_eq!(step_period(0, 0, 2_000_000), IDLE_STEP_PERIOD_US);
        assert_eq!(step_period(100, -400, 2_000_000), 5000);
        assert_eq!(step_period(-3, 1, 10), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(FirmwareCommand::ReadPosition.to_string(), "P");
        assert_eq!(FirmwareCommand::Disable.to_string(), "D");
        assert_eq!(
            FirmwareCommand::Goto {
                tid: 9,
                dx: -8,
                dy: 64,
                period: 100
            }
            .to_string(),
            "G 11 -10 100 144"
        );
        assert_eq!(
            FirmwareCommand::SetPosition { x: 7, y: -7 }.to_string(),
            "S 7 -7"
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "G 11 -10 100 144".parse::<FirmwareCommand>().unwrap(),
            FirmwareCommand::Goto {
                tid: 9,
                dx: -8,
                dy: 64,
                period: 100
            }
        );
        assert_eq!(
            "S 7 -7".parse::<FirmwareCommand>().unwrap(),
            FirmwareCommand::SetPosition { x: 7, y: -7 }
        );
        assert_eq!(
            "P".parse::<FirmwareCommand>().unwrap(),
            FirmwareCommand::ReadPosition
        );

        assert!("G 1 2".parse::<FirmwareCommand>().is_err());
        assert!("X".parse::<FirmwareCommand>().is_err());
    }

    #[test]
    fn test_parse_position_reply() {
        assert_eq!(parse_position_reply("177 -10 20").unwrap(), (127, -8, 16));

        assert!(matches!(
            parse_position_reply("1 2"),
            Err(MountError::ProtocolParse(_))
        ));
        assert!(matches!(
            parse_position_reply("1 2 z"),
            Err(MountError::ProtocolParse(_))
        ));
    }

    #[test]
    fn test_format_position_reply() {
        assert_eq!(format_position_reply(127, -8, 16), "177 -10 20");
    }
}
