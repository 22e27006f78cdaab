use std::io::Cursor;

use log::debug;
use rayon::prelude::*;

use crate::bits::{Endian, LEu16, LEu32};
use crate::cfa::CfaPattern;
use crate::decompressors::craw::{self, BLOCK_SIZE, GROUP_SIZE};
use crate::formats::tiff::{Entry, IFD};
use crate::imgop::correct::Corrector;
use crate::imgop::curve::{CURVE_MAX, ToneCurve};
use crate::imgop::fill::neighbor_fill;
use crate::imgop::{Dim2, Point, Rect};
use crate::pixarray::Rgb14Image;
use crate::rawsource::RawSource;
use crate::tags::{ArwTag, TiffCommonTag};
use crate::{RawError, Result};

/// Multiplier deriving the SR2 decryption key from the key seed tag.
const SR2_KEY_FACTOR: u32 = 0x0EDD;

/// Encoding of the pixel payload, from the SonyRawFileType tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, enumn::N)]
#[repr(u32)]
pub enum SonyRawKind {
  Uncompressed14 = 0,
  Uncompressed12 = 1,
  Compressed = 2,
  LosslessCompressed = 3,
}

/// Everything the reconstruction passes need, pulled out of the tag
/// tree. Immutable once extraction returns.
#[derive(Debug, Clone, Default)]
pub struct RawParams {
  pub width: usize,
  pub height: usize,
  pub bit_depth: u16,
  pub kind: Option<SonyRawKind>,
  pub offset: u64,
  pub stride: usize,
  pub length: usize,
  pub black_level: Option<[u16; 4]>,
  pub white_balance: Option<[i16; 4]>,
  pub gamma_curve: [u16; 5],
  pub crop: Rect,
  pub cfa: CfaPattern,
}

pub struct ArwDecoder<'a> {
  source: &'a RawSource,
  params: RawParams,
}

impl<'a> ArwDecoder<'a> {
  pub fn new(source: &'a RawSource) -> Result<ArwDecoder<'a>> {
    let root = IFD::new_root(&mut source.reader(), 0)?;
    let params = Self::extract_params(source, &root)?;
    debug!("ARW params: {:?}", params);
    Ok(ArwDecoder { source, params })
  }

  pub fn params(&self) -> &RawParams {
    &self.params
  }

  /// Decode the pixel payload into a fully populated raster.
  pub fn raw_image(&self) -> Result<Rgb14Image> {
    let params = &self.params;
    if params.width == 0 || params.height == 0 {
      return Err(RawError::Format("image dimensions missing from raw IFD".to_string()));
    }
    let kind = params
      .kind
      .ok_or_else(|| RawError::Format("raw encoding kind missing from raw IFD".to_string()))?;
    let black = params
      .black_level
      .ok_or_else(|| RawError::Format("black levels not populated".to_string()))?;
    let white_balance = params
      .white_balance
      .ok_or_else(|| RawError::Format("white balance not populated".to_string()))?;

    let curve = ToneCurve::fit([params.gamma_curve[0], params.gamma_curve[1], params.gamma_curve[2], params.gamma_curve[3]])?;
    let corrector = Corrector::new(black, white_balance, curve)?;

    let payload = self.source.subview(params.offset, params.length as u64)?;
    let strategy: &dyn Reconstruct = match kind {
      SonyRawKind::Compressed => &CompressedStrategy,
      SonyRawKind::Uncompressed14 => &LinearStrategy,
      other => {
        return Err(RawError::Format(format!("unsupported raw encoding kind: {:?}", other)));
      }
    };
    debug!("reconstructing {}x{} as {:?}", params.width, params.height, kind);

    let mut image = strategy.reconstruct(payload, params, &corrector)?;
    neighbor_fill(&mut image);
    Ok(image)
  }

  /// Walk the top-level tag list in on-disk order. The raw sub-IFD and
  /// the private area are extracted at their position in that order, so
  /// when the decrypted SR2 directory also carries black level or white
  /// balance, its values overwrite the sensor sub-tree's.
  fn extract_params(source: &RawSource, root: &IFD) -> Result<RawParams> {
    let mut params = RawParams::default();
    let mut found_raw_ifd = false;

    for entry in root.entries() {
      if entry.tag == u16::from(TiffCommonTag::SubIFDs) {
        let sub = IFD::new(&mut source.reader(), entry.force_u32(0), 0, 0, root.endian)?;
        Self::extract_sensor_ifd(&sub, &mut params);
        found_raw_ifd = true;
      } else if entry.tag == u16::from(TiffCommonTag::DNGPrivateArea) {
        Self::extract_private_area(source, read_u32_field(entry), root.endian, &mut params)?;
      }
    }

    if !found_raw_ifd {
      return Err(RawError::Format("no raw sub-IFD pointer in top-level tag list".to_string()));
    }
    Ok(params)
  }

  fn extract_sensor_ifd(ifd: &IFD, params: &mut RawParams) {
    let mut cfa_pattern = [0u8; 4];
    let mut cfa_dim = (0u16, 0u16);

    for entry in ifd.entries() {
      if let Some(tag) = TiffCommonTag::n(entry.tag) {
        match tag {
          TiffCommonTag::ImageWidth => params.width = entry.force_usize(0),
          TiffCommonTag::ImageLength => params.height = entry.force_usize(0),
          TiffCommonTag::BitsPerSample => params.bit_depth = entry.force_u16(0),
          TiffCommonTag::StripOffsets => params.offset = entry.force_u32(0) as u64,
          TiffCommonTag::RowsPerStrip => params.stride = entry.force_usize(0),
          TiffCommonTag::StripByteCounts => params.length = entry.force_usize(0),
          TiffCommonTag::DefaultCropSize => {
            params.crop = Rect::new(Point::default(), Dim2::new(entry.force_usize(0), entry.force_usize(1)));
          }
          TiffCommonTag::CFAPattern => {
            cfa_pattern = CfaPattern::unpack_pattern(read_u32_field(entry));
          }
          TiffCommonTag::CFARepeatPatternDim => {
            cfa_dim = if entry.count() >= 2 {
              (entry.force_u16(0), entry.force_u16(1))
            } else {
              CfaPattern::unpack_repeat_dim(entry.force_u32(0))
            };
          }
          _ => {}
        }
      } else if let Some(tag) = ArwTag::n(entry.tag) {
        match tag {
          ArwTag::SonyRawFileType => {
            params.kind = SonyRawKind::n(entry.force_u32(0));
            if params.kind.is_none() {
              log::warn!("unknown raw file type: {}", entry.force_u32(0));
            }
          }
          ArwTag::SonyCurve => {
            for i in 0..4 {
              params.gamma_curve[i] = entry.force_u16(i);
            }
            params.gamma_curve[4] = CURVE_MAX;
          }
          ArwTag::BlackLevel => {
            params.black_level = Some([entry.force_u16(0), entry.force_u16(1), entry.force_u16(2), entry.force_u16(3)]);
          }
          ArwTag::WB_RGGBLevels => {
            params.white_balance = Some([entry.force_i16(0), entry.force_i16(1), entry.force_i16(2), entry.force_i16(3)]);
          }
          _ => {}
        }
      }
    }

    params.cfa = CfaPattern::new(cfa_pattern, cfa_dim.0, cfa_dim.1);
  }

  /// The private area is a directory naming the encrypted SR2 block and
  /// its key seed. The decrypted block is itself a tag list, parsed
  /// with the same reader and holding the authoritative black level and
  /// white balance. Failures here surface as format errors on the
  /// decode, they never abort the caller.
  fn extract_private_area(source: &RawSource, offset: u32, endian: Endian, params: &mut RawParams) -> Result<()> {
    let private = IFD::new(&mut source.reader(), offset, 0, 0, endian)?;

    let mut sr2_offset: u32 = 0;
    let mut sr2_length: u32 = 0;
    let mut sr2_key: u32 = 0;
    for entry in private.entries() {
      if let Some(tag) = ArwTag::n(entry.tag) {
        match tag {
          ArwTag::SR2SubIFDOffset => sr2_offset = read_u32_field(entry),
          ArwTag::SR2SubIFDLength => sr2_length = read_u32_field(entry),
          ArwTag::SR2SubIFDKey => {
            sr2_key = read_u32_field(entry).wrapping_mul(SR2_KEY_FACTOR).wrapping_add(1);
          }
          _ => {}
        }
      }
    }

    let plain = Self::sony_decrypt(source.buf(), sr2_offset as usize, sr2_length as usize, sr2_key)?;

    // Value offsets inside the block are absolute file positions.
    let sr2 = IFD::new(&mut Cursor::new(&plain), 0, 0, -(sr2_offset as i32), Endian::Little)
      .map_err(|err| RawError::Format(format!("failed to parse decrypted SR2 block: {}", err)))?;
    if sr2.entry_count() == 0 {
      return Err(RawError::Format("decrypted SR2 block contains no tag entries".to_string()));
    }

    for entry in sr2.entries() {
      if let Some(tag) = ArwTag::n(entry.tag) {
        match tag {
          ArwTag::BlackLevel => {
            params.black_level = Some([entry.force_u16(0), entry.force_u16(1), entry.force_u16(2), entry.force_u16(3)]);
          }
          ArwTag::WB_RGGBLevels => {
            params.white_balance = Some([entry.force_i16(0), entry.force_i16(1), entry.force_i16(2), entry.force_i16(3)]);
          }
          _ => {}
        }
      }
    }
    Ok(())
  }

  /// SR2 block cipher: a 128-word pad is seeded from the key, rolled
  /// with xor/shift feedback and xored over the little-endian words of
  /// the ciphertext. Applying it twice restores the input.
  pub(crate) fn sony_decrypt(buf: &[u8], offset: usize, length: usize, key: u32) -> Result<Vec<u8>> {
    if buf.len() < offset + 4 * (length / 4) {
      return Err(RawError::Crypto("SR2 block reaches beyond end of source".to_string()));
    }
    let mut pad = [0u32; 128];
    let mut mkey = key;
    for p in 0..4 {
      mkey = mkey.wrapping_mul(48828125).wrapping_add(1);
      pad[p] = mkey;
    }
    pad[3] = (pad[3] << 1) | ((pad[0] ^ pad[2]) >> 31);
    for p in 4..127 {
      pad[p] = ((pad[p - 4] ^ pad[p - 2]) << 1) | ((pad[p - 3] ^ pad[p - 1]) >> 31);
    }
    for p in pad.iter_mut().take(127) {
      *p = u32::from_be(*p);
    }

    let mut out = Vec::with_capacity(length + 4);
    for i in 0..(length / 4) {
      let p = i + 127;
      pad[p & 127] = pad[(p + 1) & 127] ^ pad[(p + 1 + 64) & 127];
      let word = LEu32(buf, offset + i * 4) ^ pad[p & 127];
      out.extend_from_slice(&word.to_le_bytes());
    }
    Ok(out)
  }
}

/// A reconstruction strategy fills each photosite's dominant-channel
/// slot from the pixel payload; the shared neighbor fill completes the
/// remaining channels afterwards.
trait Reconstruct: Sync {
  fn reconstruct(&self, payload: &[u8], params: &RawParams, corrector: &Corrector) -> Result<Rgb14Image>;
}

/// Block-compressed payload: one byte per photosite, scanned per row in
/// 32-photosite spans. Each span is one compressed block yielding two
/// 16-sample groups that interleave into adjacent cells. Even rows
/// carry red/green groups, odd rows green/blue. Both groups are
/// corrected with channel slots 0 and 1 on either row parity.
struct CompressedStrategy;

impl Reconstruct for CompressedStrategy {
  fn reconstruct(&self, payload: &[u8], params: &RawParams, corrector: &Corrector) -> Result<Rgb14Image> {
    let (width, height) = (params.width, params.height);
    let aligned_w = width - width % (2 * GROUP_SIZE);
    let needed = (height - 1) * width + aligned_w;
    if payload.len() < needed {
      return Err(RawError::Format(format!(
        "compressed payload too short: {} bytes for {}x{}",
        payload.len(),
        width,
        height
      )));
    }

    let mut image = Rgb14Image::new(width, height);
    image.data.par_chunks_mut(width).enumerate().try_for_each(|(y, row)| -> Result<()> {
      for x in (0..aligned_w).step_by(2 * GROUP_SIZE) {
        let base = y * width + x;
        let (first, second) = craw::decompress_block(&payload[base..base + BLOCK_SIZE])?;
        if y % 2 == 0 {
          for i in 0..GROUP_SIZE {
            row[x + i * 2].r = corrector.correct(first[i] as u32, 0);
            row[x + i * 2 + 1].g = corrector.correct(second[i] as u32, 1);
          }
        } else {
          for i in 0..GROUP_SIZE {
            row[x + i * 2].g = corrector.correct(first[i] as u32, 0);
            row[x + i * 2 + 1].b = corrector.correct(second[i] as u32, 1);
          }
        }
      }
      Ok(())
    })?;
    Ok(image)
  }
}

/// Linear payload: 16-bit little-endian samples, one per photosite,
/// decoded with explicit bounds-checked reads. Even rows alternate
/// R/G (channels 0 and 1), odd rows G/B (channels 2 and 3).
struct LinearStrategy;

impl Reconstruct for LinearStrategy {
  fn reconstruct(&self, payload: &[u8], params: &RawParams, corrector: &Corrector) -> Result<Rgb14Image> {
    let (width, height) = (params.width, params.height);
    if payload.len() < width * height * 2 {
      return Err(RawError::Format(format!(
        "linear payload too short: {} bytes for {}x{}",
        payload.len(),
        width,
        height
      )));
    }

    let even_w = width - width % 2;
    let mut image = Rgb14Image::new(width, height);
    image.data.par_chunks_mut(width * 2).enumerate().for_each(|(pair, rows)| {
      let y = pair * 2;
      for x in (0..even_w).step_by(2) {
        let sample = LEu16(payload, (y * width + x) * 2) as u32;
        rows[x].r = corrector.correct(sample, 0);
        let sample = LEu16(payload, (y * width + x + 1) * 2) as u32;
        rows[x + 1].g = corrector.correct(sample, 1);
      }
      if rows.len() == width * 2 {
        let y = y + 1;
        for x in (0..even_w).step_by(2) {
          let sample = LEu16(payload, (y * width + x) * 2) as u32;
          rows[width + x].g = corrector.correct(sample, 2);
          let sample = LEu16(payload, (y * width + x + 1) * 2) as u32;
          rows[width + x + 1].b = corrector.correct(sample, 3);
        }
      }
    });
    Ok(image)
  }
}

/// Some 32-bit fields arrive as LONG values, others as BYTE/UNDEFINED
/// data that holds a little-endian u32.
fn read_u32_field(entry: &Entry) -> u32 {
  match entry.value.as_bytes() {
    Some(bytes) if bytes.len() >= 4 => LEu32(bytes, 0),
    _ => entry.force_u32(0),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const TYPE_BYTE: u16 = 1;
  const TYPE_SHORT: u16 = 3;
  const TYPE_LONG: u16 = 4;
  const TYPE_SSHORT: u16 = 8;

  struct TagEntry {
    tag: u16,
    typ: u16,
    count: u32,
    data: Vec<u8>,
  }

  fn short(tag: impl Into<u16>, vals: &[u16]) -> TagEntry {
    TagEntry {
      tag: tag.into(),
      typ: TYPE_SHORT,
      count: vals.len() as u32,
      data: vals.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
  }

  fn sshort(tag: impl Into<u16>, vals: &[i16]) -> TagEntry {
    TagEntry {
      tag: tag.into(),
      typ: TYPE_SSHORT,
      count: vals.len() as u32,
      data: vals.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
  }

  fn long(tag: impl Into<u16>, vals: &[u32]) -> TagEntry {
    TagEntry {
      tag: tag.into(),
      typ: TYPE_LONG,
      count: vals.len() as u32,
      data: vals.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
  }

  fn byte(tag: impl Into<u16>, vals: &[u8]) -> TagEntry {
    TagEntry {
      tag: tag.into(),
      typ: TYPE_BYTE,
      count: vals.len() as u32,
      data: vals.to_vec(),
    }
  }

  /// Append a directory to `buf`; dereferenced value data lands right
  /// behind it. `base` is added to the written value offsets, for
  /// directories that live inside a relocated block.
  fn write_ifd(buf: &mut Vec<u8>, base: u32, entries: &[TagEntry]) -> u32 {
    let dir_off = buf.len() as u32;
    buf.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    let overflow_start = buf.len() + entries.len() * 12 + 4;
    let mut overflow: Vec<u8> = Vec::new();
    for entry in entries {
      buf.extend_from_slice(&entry.tag.to_le_bytes());
      buf.extend_from_slice(&entry.typ.to_le_bytes());
      buf.extend_from_slice(&entry.count.to_le_bytes());
      if entry.data.len() <= 4 {
        let mut inline = entry.data.clone();
        inline.resize(4, 0);
        buf.extend_from_slice(&inline);
      } else {
        let off = base + (overflow_start + overflow.len()) as u32;
        buf.extend_from_slice(&off.to_le_bytes());
        overflow.extend_from_slice(&entry.data);
      }
    }
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&overflow);
    dir_off
  }

  fn patch_root_offset(buf: &mut [u8], root: u32) {
    buf[4..8].copy_from_slice(&root.to_le_bytes());
  }

  fn tiff_header() -> Vec<u8> {
    vec![0x49, 0x49, 42, 0, 0, 0, 0, 0]
  }

  const NEAR_IDENTITY: [u16; 4] = [0x0ccc, 0x1998, 0x2664, 0x3330];

  fn sensor_entries(width: u32, height: u32, kind: u32, offset: u32, length: u32, black: [u16; 4], wb: [i16; 4]) -> Vec<TagEntry> {
    vec![
      long(TiffCommonTag::ImageWidth, &[width]),
      long(TiffCommonTag::ImageLength, &[height]),
      short(TiffCommonTag::BitsPerSample, &[14]),
      short(ArwTag::SonyRawFileType, &[kind as u16]),
      long(TiffCommonTag::StripOffsets, &[offset]),
      long(TiffCommonTag::RowsPerStrip, &[width]),
      long(TiffCommonTag::StripByteCounts, &[length]),
      short(ArwTag::SonyCurve, &NEAR_IDENTITY),
      short(ArwTag::BlackLevel, &black),
      sshort(ArwTag::WB_RGGBLevels, &wb),
      byte(TiffCommonTag::CFAPattern, &[0, 1, 1, 2]),
      short(TiffCommonTag::CFARepeatPatternDim, &[2, 2]),
      long(TiffCommonTag::DefaultCropSize, &[width - 2, height]),
    ]
  }

  fn corrector(black: [u16; 4], wb: [i16; 4]) -> Corrector {
    Corrector::new(black, wb, ToneCurve::fit(NEAR_IDENTITY).unwrap()).unwrap()
  }

  fn linear_sample(x: usize, y: usize, width: usize) -> u16 {
    (((y * width + x) * 97 + 0x0123) & 0x3fff) as u16
  }

  fn build_linear_arw(width: usize, height: usize, black: [u16; 4], wb: [i16; 4]) -> Vec<u8> {
    let mut buf = tiff_header();
    let payload_off = buf.len() as u32;
    for y in 0..height {
      for x in 0..width {
        buf.extend_from_slice(&linear_sample(x, y, width).to_le_bytes());
      }
    }
    let payload_len = (width * height * 2) as u32;
    let sensor = sensor_entries(width as u32, height as u32, 0, payload_off, payload_len, black, wb);
    let sensor_off = write_ifd(&mut buf, 0, &sensor);
    let root_off = write_ifd(&mut buf, 0, &[long(TiffCommonTag::SubIFDs, &[sensor_off])]);
    patch_root_offset(&mut buf, root_off);
    buf
  }

  #[test]
  fn linear_decode_round_trips_through_corrector_and_fill() {
    let (width, height) = (32, 2);
    let black = [0u16; 4];
    let wb = [100i16; 4];
    let file = build_linear_arw(width, height, black, wb);
    let source = RawSource::new_from_slice(&file);

    let decoder = ArwDecoder::new(&source).unwrap();
    let params = decoder.params();
    assert_eq!((params.width, params.height), (width, height));
    assert_eq!(params.kind, Some(SonyRawKind::Uncompressed14));
    assert_eq!(params.bit_depth, 14);
    assert_eq!(params.black_level, Some(black));
    assert_eq!(params.white_balance, Some(wb));
    assert_eq!(params.gamma_curve, [0x0ccc, 0x1998, 0x2664, 0x3330, CURVE_MAX]);
    assert_eq!(params.cfa.pattern(), &[0, 1, 1, 2]);
    assert_eq!((params.cfa.width, params.cfa.height), (2, 2));
    assert_eq!(params.crop, Rect::new(Point::default(), Dim2::new(width - 2, height)));

    let image = decoder.raw_image().unwrap();
    assert_eq!((image.width, image.height), (width, height));

    // Reconstruct the expectation from the tested building blocks:
    // channel writes from the payload samples, then the tile fill.
    let corr = corrector(black, wb);
    let mut want = Rgb14Image::new(width, height);
    for x in (0..width).step_by(2) {
      want.at_mut(0, x).r = corr.correct(linear_sample(x, 0, width) as u32, 0);
      want.at_mut(0, x + 1).g = corr.correct(linear_sample(x + 1, 0, width) as u32, 1);
      want.at_mut(1, x).g = corr.correct(linear_sample(x, 1, width) as u32, 2);
      want.at_mut(1, x + 1).b = corr.correct(linear_sample(x + 1, 1, width) as u32, 3);
    }
    neighbor_fill(&mut want);
    for y in 0..height {
      for x in 0..width {
        assert_eq!(image.at(y, x), want.at(y, x), "pixel ({}, {})", x, y);
      }
    }
  }

  #[test]
  fn decode_is_reproducible() {
    let file = build_linear_arw(32, 2, [0; 4], [100; 4]);
    let source = RawSource::new_from_slice(&file);
    let a = ArwDecoder::new(&source).unwrap().raw_image().unwrap();
    let b = ArwDecoder::new(&source).unwrap().raw_image().unwrap();
    assert_eq!(a.data, b.data);
  }

  #[test]
  fn missing_sub_ifd_is_a_format_error() {
    let mut buf = tiff_header();
    let root_off = write_ifd(&mut buf, 0, &[long(TiffCommonTag::ImageWidth, &[32])]);
    patch_root_offset(&mut buf, root_off);
    let source = RawSource::new_from_slice(&buf);
    assert!(matches!(ArwDecoder::new(&source), Err(RawError::Format(_))));
  }

  #[test]
  fn short_linear_payload_is_a_format_error() {
    let (width, height) = (32usize, 2usize);
    let mut buf = tiff_header();
    let payload_off = buf.len() as u32;
    // Half the bytes the advertised dimensions require.
    for i in 0..(width * height / 2) {
      buf.extend_from_slice(&((i * 3) as u16).to_le_bytes());
    }
    let payload_len = (width * height) as u32;
    let sensor = sensor_entries(width as u32, height as u32, 0, payload_off, payload_len, [0; 4], [100; 4]);
    let sensor_off = write_ifd(&mut buf, 0, &sensor);
    let root_off = write_ifd(&mut buf, 0, &[long(TiffCommonTag::SubIFDs, &[sensor_off])]);
    patch_root_offset(&mut buf, root_off);

    let source = RawSource::new_from_slice(&buf);
    let decoder = ArwDecoder::new(&source).unwrap();
    assert!(matches!(decoder.raw_image(), Err(RawError::Format(_))));
  }

  #[test]
  fn sr2_values_overwrite_sensor_values() {
    let seed: u32 = 0x0001_e0be;
    let key = seed.wrapping_mul(SR2_KEY_FACTOR).wrapping_add(1);

    let mut buf = tiff_header();
    let payload_off = buf.len() as u32;
    buf.extend_from_slice(&[0u8; 32 * 2 * 2]);
    let sensor = sensor_entries(32, 2, 0, payload_off, 32 * 2 * 2, [512; 4], [100, 100, 100, 100]);
    let sensor_off = write_ifd(&mut buf, 0, &sensor);

    // The private directory holds three inline entries, so its size is
    // fixed and the ciphertext position is known up front.
    let private_off = buf.len() as u32;
    let sr2_off = private_off + 2 + 3 * 12 + 4;

    let mut plain = Vec::new();
    write_ifd(
      &mut plain,
      sr2_off,
      &[short(ArwTag::BlackLevel, &[128; 4]), sshort(ArwTag::WB_RGGBLevels, &[1024, 1024, 1024, 768])],
    );
    while plain.len() % 4 != 0 {
      plain.push(0);
    }
    // The pad cipher is an involution, so encrypting is one more pass.
    let cipher = ArwDecoder::sony_decrypt(&plain, 0, plain.len(), key).unwrap();

    let written_private = write_ifd(
      &mut buf,
      0,
      &[
        long(ArwTag::SR2SubIFDOffset, &[sr2_off]),
        long(ArwTag::SR2SubIFDLength, &[cipher.len() as u32]),
        long(ArwTag::SR2SubIFDKey, &[seed]),
      ],
    );
    assert_eq!(written_private, private_off);
    assert_eq!(buf.len() as u32, sr2_off);
    buf.extend_from_slice(&cipher);

    let root_off = write_ifd(
      &mut buf,
      0,
      &[
        long(TiffCommonTag::SubIFDs, &[sensor_off]),
        long(TiffCommonTag::DNGPrivateArea, &[private_off]),
      ],
    );
    patch_root_offset(&mut buf, root_off);

    let source = RawSource::new_from_slice(&buf);
    let decoder = ArwDecoder::new(&source).unwrap();
    assert_eq!(decoder.params().black_level, Some([128; 4]));
    assert_eq!(decoder.params().white_balance, Some([1024, 1024, 1024, 768]));
  }

  #[test]
  fn unparseable_sr2_block_propagates_as_format_error() {
    let mut buf = tiff_header();
    let sensor = sensor_entries(32, 2, 0, 8, 128, [512; 4], [100; 4]);
    let sensor_off = write_ifd(&mut buf, 0, &sensor);
    let private_off = write_ifd(
      &mut buf,
      0,
      &[
        long(ArwTag::SR2SubIFDOffset, &[8]),
        long(ArwTag::SR2SubIFDLength, &[0]),
        long(ArwTag::SR2SubIFDKey, &[1]),
      ],
    );
    let root_off = write_ifd(
      &mut buf,
      0,
      &[
        long(TiffCommonTag::SubIFDs, &[sensor_off]),
        long(TiffCommonTag::DNGPrivateArea, &[private_off]),
      ],
    );
    patch_root_offset(&mut buf, root_off);

    let source = RawSource::new_from_slice(&buf);
    assert!(matches!(ArwDecoder::new(&source), Err(RawError::Format(_))));
  }

  #[test]
  fn sony_decrypt_is_an_involution() {
    let plain: Vec<u8> = (0u16..64).flat_map(|v| v.to_le_bytes()).collect();
    let key = 0xdeadbeef_u32;
    let cipher = ArwDecoder::sony_decrypt(&plain, 0, plain.len(), key).unwrap();
    assert_ne!(cipher, plain);
    let round = ArwDecoder::sony_decrypt(&cipher, 0, cipher.len(), key).unwrap();
    assert_eq!(round, plain);
  }

  // LSB-first writer mirroring the compressed bitstream layout.
  fn push_bits(bytes: &mut Vec<u8>, filled: &mut usize, val: u32, num: usize) {
    for i in 0..num {
      if *filled % 8 == 0 {
        bytes.push(0);
      }
      *bytes.last_mut().unwrap() |= (((val >> i) & 1) as u8) << (*filled % 8);
      *filled += 1;
    }
  }

  fn craw_block(first: (u32, u32), second: (u32, u32)) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut filled = 0;
    for (max, min) in [first, second] {
      push_bits(&mut bytes, &mut filled, max, 11);
      push_bits(&mut bytes, &mut filled, min, 11);
      push_bits(&mut bytes, &mut filled, 0, 4); // max at sample 0
      push_bits(&mut bytes, &mut filled, 1, 4); // min at sample 1
      for _ in 0..14 {
        push_bits(&mut bytes, &mut filled, 0, 7);
      }
    }
    assert_eq!(bytes.len(), BLOCK_SIZE);
    bytes
  }

  #[test]
  fn compressed_decode_writes_and_corrects_per_row_parity() {
    let (width, height) = (32usize, 2usize);
    let black = [0u16, 0, 300, 300];
    let wb = [100i16; 4];

    let mut buf = tiff_header();
    let payload_off = buf.len() as u32;
    buf.extend_from_slice(&craw_block((500, 200), (450, 200)));
    buf.extend_from_slice(&craw_block((400, 200), (350, 200)));
    let sensor = sensor_entries(width as u32, height as u32, 2, payload_off, (width * height) as u32, black, wb);
    let sensor_off = write_ifd(&mut buf, 0, &sensor);
    let root_off = write_ifd(&mut buf, 0, &[long(TiffCommonTag::SubIFDs, &[sensor_off])]);
    patch_root_offset(&mut buf, root_off);

    let source = RawSource::new_from_slice(&buf);
    let decoder = ArwDecoder::new(&source).unwrap();
    assert_eq!(decoder.params().kind, Some(SonyRawKind::Compressed));
    let image = decoder.raw_image().unwrap();

    let corr = corrector(black, wb);
    // Row 0: red group (500, 200, 200...), green group (450, 200...).
    assert_eq!(image.at(0, 0).r, corr.correct(500, 0));
    assert_eq!(image.at(0, 1).g, corr.correct(450, 1));
    assert_eq!(image.at(0, 2).r, corr.correct(200, 0));
    // Row 1 green/blue groups also use channel slots 0 and 1, so the
    // green sample 400 is corrected against black level 0, not 300.
    assert_eq!(image.at(1, 0).g, corr.correct(400, 0));
    assert_eq!(image.at(1, 1).b, corr.correct(350, 1));
    // Fill: top-left cell takes green from the right, blue from below.
    assert_eq!(image.at(0, 0).g, image.at(0, 1).g);
    assert_eq!(image.at(0, 0).b, image.at(1, 1).b);
  }
}
