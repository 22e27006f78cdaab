// SPDX-License-Identifier: LGPL-2.1

use std::cmp;

use crate::pumps::{BitPump, BitPumpLSB};
use crate::{RawError, Result};

/// Compressed block size in bytes; one block covers 32 photosites.
pub const BLOCK_SIZE: usize = 32;

/// Photosites per decompressed group; a block holds two groups.
pub const GROUP_SIZE: usize = 16;

/// Decompress one 32-byte block into its two 16-sample groups.
///
/// Each group is a 128-bit record: an 11-bit maximum, an 11-bit
/// minimum, two 4-bit positions naming which of the 16 samples carry
/// those extremes, then 7-bit deltas for the remaining samples. The
/// delta shift grows with the max/min spread, and reconstructed values
/// saturate at the 11-bit ceiling.
pub fn decompress_block(block: &[u8]) -> Result<([u16; GROUP_SIZE], [u16; GROUP_SIZE])> {
  if block.len() != BLOCK_SIZE {
    return Err(RawError::Format(format!(
      "compressed block must be {} bytes, got {}",
      BLOCK_SIZE,
      block.len()
    )));
  }
  // The pump loads 32 bits at a time, and a degenerate block naming the
  // same sample as max and min consumes extra delta bits; pad the load
  // window so neither can read past the block.
  let mut padded = [0u8; BLOCK_SIZE + 8];
  padded[..BLOCK_SIZE].copy_from_slice(block);
  let mut pump = BitPumpLSB::new(&padded);

  let mut groups = [[0u16; GROUP_SIZE]; 2];
  for group in groups.iter_mut() {
    let max = pump.get_bits(11);
    let min = pump.get_bits(11);
    let delta = max.saturating_sub(min);
    // A delta needing 11 bits shifts the 7-bit values by 4, 10 bits by 3, ...
    let delta_shift: u32 = cmp::max(0, (32 - (delta.leading_zeros() as i32)) - 7) as u32;
    let imax = pump.get_bits(4) as usize;
    let imin = pump.get_bits(4) as usize;

    for (i, out) in group.iter_mut().enumerate() {
      let val = if i == imax {
        max
      } else if i == imin {
        min
      } else {
        cmp::min(0x7ff, (pump.get_bits(7) << delta_shift) + min)
      };
      *out = val as u16;
    }
  }
  Ok((groups[0], groups[1]))
}
