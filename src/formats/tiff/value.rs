// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// Value of TIFF type `RATIONAL`
#[derive(Clone, Debug, Default, PartialEq, Copy, Serialize, Deserialize)]
pub struct Rational {
  pub n: u32,
  pub d: u32,
}

impl Rational {
  pub fn new(n: u32, d: u32) -> Self {
    Self { n, d }
  }
}

/// Value of TIFF type `SRATIONAL`
#[derive(Clone, Debug, Default, PartialEq, Copy, Serialize, Deserialize)]
pub struct SRational {
  pub n: i32,
  pub d: i32,
}

impl SRational {
  pub fn new(n: i32, d: i32) -> Self {
    Self { n, d }
  }
}

/// Typed payload of a single directory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
  /// 8-bit unsigned integer
  Byte(Vec<u8>),
  /// 7-bit ASCII code, NUL terminated on disk
  Ascii(String),
  /// 16-bit unsigned integer
  Short(Vec<u16>),
  /// 32-bit unsigned integer
  Long(Vec<u32>),
  /// Fraction stored as two 32-bit unsigned integers
  Rational(Vec<Rational>),
  /// 8-bit signed integer
  SByte(Vec<i8>),
  /// 8-bit byte that may contain anything, depending on the field
  Undefined(Vec<u8>),
  /// 16-bit signed integer
  SShort(Vec<i16>),
  /// 32-bit signed integer
  SLong(Vec<i32>),
  /// Fraction stored as two 32-bit signed integers
  SRational(Vec<SRational>),
  /// 32-bit IEEE floating point
  Float(Vec<f32>),
  /// 64-bit IEEE floating point
  Double(Vec<f64>),
  /// Unknown type, wrapped in u8
  Unknown(u16, Vec<u8>),
}

impl Value {
  pub fn count(&self) -> usize {
    match self {
      Self::Byte(v) => v.len(),
      Self::Ascii(v) => v.len() + 1,
      Self::Short(v) => v.len(),
      Self::Long(v) => v.len(),
      Self::Rational(v) => v.len(),
      Self::SByte(v) => v.len(),
      Self::Undefined(v) => v.len(),
      Self::SShort(v) => v.len(),
      Self::SLong(v) => v.len(),
      Self::SRational(v) => v.len(),
      Self::Float(v) => v.len(),
      Self::Double(v) => v.len(),
      Self::Unknown(_, v) => v.len(),
    }
  }

  /// Integer-coerced read, ignoring the on-disk type. Out-of-range
  /// indices read as 0, matching the lenient behaviour expected from
  /// optional multi-count tags.
  pub fn force_u32(&self, idx: usize) -> u32 {
    match self {
      Self::Byte(v) => v.get(idx).copied().unwrap_or(0) as u32,
      Self::Short(v) => v.get(idx).copied().unwrap_or(0) as u32,
      Self::Long(v) => v.get(idx).copied().unwrap_or(0),
      Self::SByte(v) => v.get(idx).copied().unwrap_or(0) as u32,
      Self::SShort(v) => v.get(idx).copied().unwrap_or(0) as u32,
      Self::SLong(v) => v.get(idx).copied().unwrap_or(0) as u32,
      _ => 0,
    }
  }

  pub fn force_u16(&self, idx: usize) -> u16 {
    self.force_u32(idx) as u16
  }

  pub fn force_usize(&self, idx: usize) -> usize {
    self.force_u32(idx) as usize
  }

  pub fn force_i16(&self, idx: usize) -> i16 {
    match self {
      Self::SByte(v) => v.get(idx).copied().unwrap_or(0) as i16,
      Self::SShort(v) => v.get(idx).copied().unwrap_or(0),
      Self::SLong(v) => v.get(idx).copied().unwrap_or(0) as i16,
      other => other.force_u32(idx) as i16,
    }
  }

  pub fn as_bytes(&self) -> Option<&[u8]> {
    match self {
      Self::Byte(v) | Self::Undefined(v) | Self::Unknown(_, v) => Some(v),
      _ => None,
    }
  }

  pub fn value_type(&self) -> u16 {
    match self {
      Self::Byte(_) => 1,
      Self::Ascii(_) => 2,
      Self::Short(_) => 3,
      Self::Long(_) => 4,
      Self::Rational(_) => 5,
      Self::SByte(_) => 6,
      Self::Undefined(_) => 7,
      Self::SShort(_) => 8,
      Self::SLong(_) => 9,
      Self::SRational(_) => 10,
      Self::Float(_) => 11,
      Self::Double(_) => 12,
      Self::Unknown(t, _) => *t,
    }
  }
}
