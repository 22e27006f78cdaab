//! Raw format decoders.

pub mod arw;

pub use arw::{ArwDecoder, RawParams, SonyRawKind};
