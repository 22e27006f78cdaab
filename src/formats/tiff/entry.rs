// SPDX-License-Identifier: MIT

use std::io::{Read, Seek};

use serde::{Deserialize, Serialize};

use super::reader::{EndianReader, ReadByteOrder};
use super::value::{Rational, SRational, Value};
use super::{Result, apply_corr};

const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;
const TYPE_SBYTE: u16 = 6;
const TYPE_UNDEFINED: u16 = 7;
const TYPE_SSHORT: u16 = 8;
const TYPE_SLONG: u16 = 9;
const TYPE_SRATIONAL: u16 = 10;
const TYPE_FLOAT: u16 = 11;
const TYPE_DOUBLE: u16 = 12;

// Byte-size shift per on-disk type, indexed 0..13
const DATASHIFTS: [u8; 14] = [0, 0, 0, 1, 2, 3, 0, 0, 1, 2, 3, 2, 3, 2];

/// A single directory entry: tag plus its typed value. `embedded`
/// records where the value data lives (inline position or dereferenced
/// offset), already corrected but relative to the directory base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
  pub tag: u16,
  pub value: Value,
  pub embedded: Option<u32>,
}

impl std::ops::Deref for Entry {
  type Target = Value;

  fn deref(&self) -> &Self::Target {
    &self.value
  }
}

impl Entry {
  pub fn count(&self) -> usize {
    self.value.count()
  }

  pub fn offset(&self) -> Option<usize> {
    self.embedded.map(|v| v as usize)
  }

  /// Parse one 12-byte entry. The reader must be positioned just after
  /// the tag id; it is left at the start of the next entry.
  pub fn parse<R: Read + Seek>(reader: &mut EndianReader<R>, base: u32, corr: i32, tag: u16) -> Result<Entry> {
    let pos = reader.position()? - 2; // tag id is already consumed

    let typ = reader.read_u16()?;
    let count = reader.read_u32()?;

    // Unknown types are treated as byte data
    let compat_typ = if typ == 0 || typ > 12 { TYPE_UNDEFINED } else { typ };

    let bytesize: usize = (count as usize) << DATASHIFTS[compat_typ as usize];
    let offset: u32 = if bytesize <= 4 {
      reader.position()? - base
    } else {
      apply_corr(reader.read_u32()?, corr)
    };

    reader.goto(base + offset)?;
    let value = match typ {
      TYPE_BYTE => {
        let mut v = vec![0; count as usize];
        reader.read_u8_into(&mut v)?;
        Value::Byte(v)
      }
      TYPE_ASCII => {
        let mut v = vec![0; count as usize];
        reader.read_u8_into(&mut v)?;
        let end = v.iter().position(|&c| c == 0).unwrap_or(v.len());
        Value::Ascii(String::from_utf8_lossy(&v[..end]).into_owned())
      }
      TYPE_SHORT => {
        let mut v = vec![0; count as usize];
        reader.read_u16_into(&mut v)?;
        Value::Short(v)
      }
      TYPE_LONG => {
        let mut v = vec![0; count as usize];
        reader.read_u32_into(&mut v)?;
        Value::Long(v)
      }
      TYPE_RATIONAL => {
        let mut tmp = vec![0; count as usize * 2];
        reader.read_u32_into(&mut tmp)?;
        Value::Rational(tmp.chunks_exact(2).map(|c| Rational::new(c[0], c[1])).collect())
      }
      TYPE_SBYTE => {
        let mut v = vec![0; count as usize];
        reader.read_i8_into(&mut v)?;
        Value::SByte(v)
      }
      TYPE_UNDEFINED => {
        let mut v = vec![0; count as usize];
        reader.read_u8_into(&mut v)?;
        Value::Undefined(v)
      }
      TYPE_SSHORT => {
        let mut v = vec![0; count as usize];
        reader.read_i16_into(&mut v)?;
        Value::SShort(v)
      }
      TYPE_SLONG => {
        let mut v = vec![0; count as usize];
        reader.read_i32_into(&mut v)?;
        Value::SLong(v)
      }
      TYPE_SRATIONAL => {
        let mut tmp = vec![0; count as usize * 2];
        reader.read_i32_into(&mut tmp)?;
        Value::SRational(tmp.chunks_exact(2).map(|c| SRational::new(c[0], c[1])).collect())
      }
      TYPE_FLOAT => {
        let mut v = vec![0.0; count as usize];
        reader.read_f32_into(&mut v)?;
        Value::Float(v)
      }
      TYPE_DOUBLE => {
        let mut v = vec![0.0; count as usize];
        reader.read_f64_into(&mut v)?;
        Value::Double(v)
      }
      x => {
        let mut v = vec![0; count as usize];
        reader.read_u8_into(&mut v)?;
        Value::Unknown(x, v)
      }
    };
    reader.goto(pos + 12)?; // size of one IFD entry
    Ok(Entry {
      tag,
      value,
      embedded: Some(offset),
    })
  }
}
