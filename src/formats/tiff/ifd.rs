// SPDX-License-Identifier: MIT

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use super::reader::{EndianReader, ReadByteOrder};
use super::{Entry, Result, TIFF_MAGIC, TiffError, apply_corr};
use crate::bits::Endian;
use crate::tags::TiffTag;

/// One image file directory.
///
/// Entries are stored in the order they appear on disk. Tag lookups
/// scan linearly; directories in this format hold a few dozen entries
/// at most.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IFD {
  pub offset: u32,
  pub base: u32,
  pub corr: i32,
  pub next_ifd: u32,
  pub entries: Vec<Entry>,
  pub endian: Endian,
}

impl IFD {
  /// Parse a TIFF header (endian marker, magic, first directory offset)
  /// at `base` and return the root directory.
  pub fn new_root<R: Read + Seek>(reader: &mut R, base: u32) -> Result<IFD> {
    reader.seek(SeekFrom::Start(base as u64))?;
    let endian = match reader.read_u16::<LittleEndian>()? {
      0x4949 => Endian::Little,
      0x4d4d => Endian::Big,
      x => {
        return Err(TiffError::General(format!("TIFF: don't know marker 0x{:x}", x)));
      }
    };
    let mut reader = EndianReader::new(reader, endian);
    let magic = reader.read_u16()?;
    if magic != TIFF_MAGIC {
      return Err(TiffError::General(format!("Invalid magic marker for TIFF: {}", magic)));
    }
    let first_ifd = reader.read_u32()?;
    if first_ifd == 0 {
      return Err(TiffError::General("Invalid TIFF header, contains no root IFD".to_string()));
    }

    let root = IFD::new(reader.into_inner(), first_ifd, base, 0, endian)?;
    if root.entries.is_empty() {
      return Err(TiffError::General("TIFF is invalid, IFD must contain at least one entry".to_string()));
    }
    Ok(root)
  }

  /// Parse a bare directory at `base + offset`, without a TIFF header.
  /// `corr` is applied to every dereferenced value offset; the decrypted
  /// SR2 directory needs this because its offsets are absolute file
  /// positions while the plaintext buffer starts at the block origin.
  pub fn new<R: Read + Seek>(reader: &mut R, offset: u32, base: u32, corr: i32, endian: Endian) -> Result<IFD> {
    reader.seek(SeekFrom::Start((base + offset) as u64))?;
    let mut reader = EndianReader::new(reader, endian);
    let entry_count = reader.read_u16()?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    let mut next_pos = reader.position()?;
    for _ in 0..entry_count {
      reader.goto(next_pos)?;
      next_pos += 12;
      let tag = reader.read_u16()?;
      match Entry::parse(&mut reader, base, corr, tag) {
        Ok(entry) => entries.push(entry),
        Err(err) => {
          log::info!("Failed to parse TIFF tag 0x{:X}, skipping: {:?}", tag, err);
        }
      }
    }

    // Some writers omit the next-IFD pointer; fall back to 0.
    reader.goto(next_pos)?;
    let next_ifd = reader.read_u32().unwrap_or(0);

    Ok(IFD {
      offset,
      base,
      corr,
      next_ifd: if next_ifd == 0 { 0 } else { apply_corr(next_ifd, corr) },
      entries,
      endian,
    })
  }

  pub fn entry_count(&self) -> u16 {
    self.entries.len() as u16
  }

  /// Entries in on-disk order.
  pub fn entries(&self) -> impl Iterator<Item = &Entry> {
    self.entries.iter()
  }

  pub fn get_entry<T: TiffTag>(&self, tag: T) -> Option<&Entry> {
    let tag: u16 = tag.into();
    self.entries.iter().find(|entry| entry.tag == tag)
  }

  pub fn has_entry<T: TiffTag>(&self, tag: T) -> bool {
    self.get_entry(tag).is_some()
  }
}
