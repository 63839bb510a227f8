// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use crate::color::Rgb;

/// Converts a color to a 0-127 control value from its brightness, the mean of
/// its three channels.
pub fn rgb_to_midi(color: Rgb) -> u8 {
    let sum = u32::from(color.r) + u32::from(color.g) + u32::from(color.b);
    // floor((sum / 3) / 255 * 127) without the float rounding.
    (sum * 127 / (3 * 255)) as u8
}
