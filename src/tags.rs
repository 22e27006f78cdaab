// SPDX-License-Identifier: LGPL-2.1

/// Marker trait for TIFF tag enums, so IFD lookups can take any of the
/// tag namespaces below.
pub trait TiffTag: Into<u16> + Copy + std::fmt::Debug {}

macro_rules! tiff_tag_enum {
  ($name:ty) => {
    impl $crate::tags::TiffTag for $name {}

    impl From<$name> for u16 {
      fn from(tag: $name) -> Self {
        tag as u16
      }
    }
  };
}

tiff_tag_enum!(TiffCommonTag);
tiff_tag_enum!(ArwTag);

/// Standard TIFF/DNG/EXIF tags used by the ARW tag tree.
#[derive(Debug, Copy, Clone, PartialEq, enumn::N)]
#[repr(u16)]
pub enum TiffCommonTag {
  ImageWidth = 0x0100,
  ImageLength = 0x0101,
  BitsPerSample = 0x0102,
  StripOffsets = 0x0111,
  RowsPerStrip = 0x0116,
  StripByteCounts = 0x0117,
  SubIFDs = 0x014A,
  CFARepeatPatternDim = 0x828D,
  CFAPattern = 0x828E,
  DefaultCropSize = 0xC620,
  DNGPrivateArea = 0xC634,
}

/// Sony specific tags, found in the raw sub-IFD, the DNG private area
/// and the decrypted SR2 directory.
#[derive(Debug, Copy, Clone, PartialEq, enumn::N)]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum ArwTag {
  SonyRawFileType = 0x7000,
  SonyCurve = 0x7010,
  SR2SubIFDOffset = 0x7200,
  SR2SubIFDLength = 0x7201,
  SR2SubIFDKey = 0x7221,
  BlackLevel = 0x7310,
  WB_RGGBLevels = 0x7313,
}
