//! Library to decode Sony ARW camera raw images into a full-resolution,
//! color-corrected 14-bit RGB raster. Given a supported file you get the
//! complete pixel data after black-level, white-balance and tone-curve
//! correction.
//!
//! # Example
//! ```rust,no_run
//! use std::env;
//! use std::fs::File;
//! use std::io::prelude::*;
//! use std::io::BufWriter;
//!
//! fn main() {
//!   let args: Vec<_> = env::args().collect();
//!   if args.len() != 2 {
//!     println!("Usage: {} <file>", args[0]);
//!     std::process::exit(2);
//!   }
//!   let file = &args[1];
//!   let image = arwdec::decode_file(file).unwrap();
//!
//!   // Write out the image as a 16-bit RGB PPM
//!   let mut f = BufWriter::new(File::create(format!("{}.ppm", file)).unwrap());
//!   let preamble = format!("P6 {} {} {}\n", image.width, image.height, 65535).into_bytes();
//!   f.write_all(&preamble).unwrap();
//!   for row in image.pixel_rows() {
//!     for pix in &row[..image.width] {
//!       for channel in [pix.r << 2, pix.g << 2, pix.b << 2] {
//!         f.write_all(&channel.to_be_bytes()).unwrap();
//!       }
//!     }
//!   }
//! }
//! ```

#![deny(unstable_features)]

use std::path::Path;

use thiserror::Error;

pub mod bits;
pub mod cfa;
pub mod decoders;
pub mod decompressors;
pub mod formats;
pub mod imgop;
pub mod pixarray;
pub mod pumps;
pub mod rawsource;
pub mod tags;

pub use cfa::CfaPattern;
pub use decoders::{ArwDecoder, RawParams, SonyRawKind};
pub use imgop::curve::ToneCurve;
pub use pixarray::{Rgb14, Rgb14Image};
pub use rawsource::RawSource;

use formats::tiff::TiffError;

#[derive(Error, Debug)]
pub enum RawError {
  /// Source read or seek failure
  #[error("I/O error: {}", _0)]
  Io(#[from] std::io::Error),

  /// Missing required tag, malformed tag tree or truncated payload
  #[error("Format error: {}", _0)]
  Format(String),

  /// Failure of the SR2 decryption primitive
  #[error("Decryption error: {}", _0)]
  Crypto(String),

  /// Singular gamma-fit system
  #[error("Numeric error: {}", _0)]
  Numeric(String),
}

pub type Result<T> = std::result::Result<T, RawError>;

impl From<TiffError> for RawError {
  fn from(err: TiffError) -> Self {
    match err {
      TiffError::Io(err) => Self::Io(err),
      other => Self::Format(other.to_string()),
    }
  }
}

/// Take a path to an ARW file and return a decoded image or an error
///
/// # Example
/// ```rust,ignore
/// let image = match arwdec::decode_file("path/to/your/file.ARW") {
///   Ok(val) => val,
///   Err(e) => ... some appropriate action when the file is unreadable ...
/// };
/// ```
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<Rgb14Image> {
  let source = RawSource::new(path.as_ref())?;
  decode(&source)
}

/// Decode an in-memory source and return the raster or an error. Batch
/// callers can match on the error variant and skip a failed file
/// without losing images decoded before it.
pub fn decode(source: &RawSource) -> Result<Rgb14Image> {
  ArwDecoder::new(source)?.raw_image()
}
