use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Color filter array layout of the sensor: the channel index of each
/// photosite in the repeating tile, plus the tile dimensions.
///
/// The pattern arrives packed in a single 32-bit tag value, one channel
/// index per byte, least significant byte first. For the supported
/// cameras this is `[0, 1, 1, 2]` (RGGB).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CfaPattern {
  pattern: [u8; 4],
  pub width: u16,
  pub height: u16,
}

impl CfaPattern {
  pub fn new(pattern: [u8; 4], width: u16, height: u16) -> Self {
    Self { pattern, width, height }
  }

  /// Unpack the 4 channel indices from the packed 32-bit field,
  /// least significant byte first.
  pub fn unpack_pattern(packed: u32) -> [u8; 4] {
    [
      (packed & 0x0000_00ff) as u8,
      ((packed & 0x0000_ff00) >> 8) as u8,
      ((packed & 0x00ff_0000) >> 16) as u8,
      ((packed & 0xff00_0000) >> 24) as u8,
    ]
  }

  /// Unpack the repeat-tile dimensions from a packed 32-bit field, two
  /// 16-bit values, low half first.
  pub fn unpack_repeat_dim(packed: u32) -> (u16, u16) {
    ((packed & 0xffff) as u16, (packed >> 16) as u16)
  }

  /// Channel index of the photosite at (row, col), repeating the 2x2 tile.
  pub fn color_at(&self, row: usize, col: usize) -> u8 {
    self.pattern[(row % 2) * 2 + (col % 2)]
  }

  pub fn pattern(&self) -> &[u8; 4] {
    &self.pattern
  }
}

impl fmt::Display for CfaPattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = self
      .pattern
      .iter()
      .map(|c| match c {
        0 => "R",
        1 => "G",
        2 => "B",
        _ => "?",
      })
      .join("");
    write!(f, "{} ({}x{})", name, self.width, self.height)
  }
}
