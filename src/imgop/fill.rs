// SPDX-License-Identifier: LGPL-2.1

use crate::pixarray::Rgb14Image;

/// Propagate channel samples to the neighbors of each 2x2 photosite
/// tile, turning the sparse per-channel raster into full RGB cells.
///
/// This is a fixed nearest-sample copy, not an interpolating demosaic:
/// within a tile holding (R, G1 / G2, B) the red sample spreads to all
/// four cells, the greens spread along their own row and the blue
/// spreads from the bottom-right cell. Every source is a value written
/// by the channel pass, so the result does not depend on fill order.
///
/// Must run after the channel-write pass has completed for all rows.
/// Cells outside the last complete tile (odd trailing row or column)
/// are left untouched instead of reading out of range.
pub fn neighbor_fill(img: &mut Rgb14Image) {
  for ty in 0..img.height / 2 {
    let y = ty * 2;
    for tx in 0..img.width / 2 {
      let x = tx * 2;
      let red = img.at(y, x).r;
      let g_top = img.at(y, x + 1).g;
      let g_bottom = img.at(y + 1, x).g;
      let blue = img.at(y + 1, x + 1).b;

      let top_left = img.at_mut(y, x);
      top_left.g = g_top;
      top_left.b = blue;

      let top_right = img.at_mut(y, x + 1);
      top_right.r = red;
      top_right.b = blue;

      let bottom_left = img.at_mut(y + 1, x);
      bottom_left.r = red;
      bottom_left.b = blue;

      let bottom_right = img.at_mut(y + 1, x + 1);
      bottom_right.r = red;
      bottom_right.g = g_bottom;
    }
  }
}
