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

use strum_macros::{AsRefStr, EnumIter, IntoStaticStr, VariantNames};

#[derive(
    Debug, PartialEq, Clone, Copy, Hash, Eq, AsRefStr, EnumIter, IntoStaticStr, VariantNames,
)]
pub enum TrackingMode {
    None,
    HoldHaDec,
    HoldRaDec,
    HoldAzAlt,
}

#[derive(Debug, PartialEq, Clone, Copy, AsRefStr)]
pub enum PierSide {
    // Dec axis in the normal orientation.
    Normal,
    // Dec axis flipped over the meridian.
    Inverted,
}

impl PierSide {
    /// Pier side from the Dec-axis orientation flag.
    ///
    /// # Arguments
    /// * `dec_invert` - The Dec axis is inverted or not.
    ///
    /// # Returns
    /// Pier side.
    pub fn from_dec_invert(dec_invert: bool) -> Self {
        if dec_invert {
            Self::Inverted
        } else {
            Self::Normal
        }
    }
}
