// SPDX-License-Identifier: MIT

//! Reader for TIFF-style tag trees (IFDs).
//!
//! ARW files are TIFF containers: a header selecting endianness, then a
//! chain of image file directories. Each directory entry is a
//! `(tag, type, count, value-or-offset)` record. Entries are kept in
//! on-disk order because downstream parameter extraction depends on the
//! order fields appear in the file, not on their tag values.

use thiserror::Error;

pub mod entry;
pub mod ifd;
pub mod reader;
pub mod value;

pub use entry::Entry;
pub use ifd::IFD;
pub use reader::EndianReader;
pub use value::{Rational, SRational, Value};

pub(crate) const TIFF_MAGIC: u16 = 42;

/// Error variants for the tag-tree reader
#[derive(Debug, Error)]
pub enum TiffError {
  #[error("General error: {}", _0)]
  General(String),

  /// Error on the underlying byte source
  #[error("I/O error: {:?}", _0)]
  Io(#[from] std::io::Error),
}

/// Result type for tag-tree reader results
pub type Result<T> = std::result::Result<T, TiffError>;

pub(crate) fn apply_corr(offset: u32, corr: i32) -> u32 {
  ((offset as i64) + (corr as i64)) as u32
}
