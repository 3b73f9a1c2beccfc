//! Codec identification tables
//!
//! WAVE identifies codecs by a numeric format tag, except when the tag is the
//! `WAVE_FORMAT_EXTENSIBLE` sentinel, in which case the effective codec is a
//! 16-byte GUID. AIFC identifies codecs by a four-character compression type.
//! All three vocabularies are mapped here.

use crate::chunk::FourCc;

use std::fmt::{Debug, Display, Formatter};

/// A WAVE format tag, decoded
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum WaveCodec {
	/// Integer PCM
	Pcm,
	/// Microsoft ADPCM
	MicrosoftAdpcm,
	/// IEEE 754 float PCM
	IeeeFloat,
	/// ITU G.711 A-law
	ALaw,
	/// ITU G.711 µ-law
	MuLaw,
	/// IMA ADPCM
	ImaAdpcm,
	/// ITU G.723 ADPCM (Yamaha)
	YamahaAdpcm,
	/// GSM 6.10
	Gsm610,
	/// ITU G.721 ADPCM
	G721Adpcm,
	/// MPEG via ITU G.721
	MpegAdpcm,
	/// The real codec is carried by a GUID sub-format
	Extensible,
	/// Anything else; the raw tag is retained for passthrough
	Unknown(u16),
}

impl Default for WaveCodec {
	fn default() -> Self {
		Self::Unknown(0)
	}
}

impl WaveCodec {
	/// The `WAVE_FORMAT_EXTENSIBLE` sentinel tag
	pub const EXTENSIBLE_TAG: u16 = 0xFFFE;

	/// Decode a numeric `wFormatTag`
	#[must_use]
	pub fn from_tag(tag: u16) -> Self {
		match tag {
			0x01 => Self::Pcm,
			0x02 => Self::MicrosoftAdpcm,
			0x03 => Self::IeeeFloat,
			0x06 => Self::ALaw,
			0x07 => Self::MuLaw,
			0x11 => Self::ImaAdpcm,
			0x16 => Self::YamahaAdpcm,
			0x31 => Self::Gsm610,
			0x40 => Self::G721Adpcm,
			0x50 => Self::MpegAdpcm,
			Self::EXTENSIBLE_TAG => Self::Extensible,
			other => Self::Unknown(other),
		}
	}

	/// The numeric tag for this codec
	#[must_use]
	pub fn tag(self) -> u16 {
		match self {
			Self::Pcm => 0x01,
			Self::MicrosoftAdpcm => 0x02,
			Self::IeeeFloat => 0x03,
			Self::ALaw => 0x06,
			Self::MuLaw => 0x07,
			Self::ImaAdpcm => 0x11,
			Self::YamahaAdpcm => 0x16,
			Self::Gsm610 => 0x31,
			Self::G721Adpcm => 0x40,
			Self::MpegAdpcm => 0x50,
			Self::Extensible => Self::EXTENSIBLE_TAG,
			Self::Unknown(tag) => tag,
		}
	}

	/// Map an AIFC compression type to its WAVE codec equivalent
	///
	/// Plain AIFF (no compression type at all) is PCM; callers handle that case
	/// before reaching here.
	#[must_use]
	pub fn from_aiff_compression(compression: FourCc) -> Self {
		match &compression.bytes() {
			b"NONE" | b"sowt" => Self::Pcm,
			b"fl32" | b"FL32" | b"fl64" => Self::IeeeFloat,
			b"alaw" | b"ALAW" => Self::ALaw,
			b"ulaw" | b"ULAW" => Self::MuLaw,
			_ => Self::Unknown(0),
		}
	}
}

/// A 16-byte GUID in canonical (display) byte order
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Guid(pub [u8; 16]);

impl Guid {
	/// The registered WAVE sub-format GUIDs carrying integer PCM
	pub const PCM_GUIDS: [Guid; 5] = [
		guids::KSDATAFORMAT_SUBTYPE_PCM,
		guids::PCM_BE_INT24,
		guids::PCM_BE_INT32,
		guids::PCM_BE_FL32,
		guids::PCM_BE_FL64,
	];

	/// Whether this GUID identifies an integer PCM sub-format
	#[must_use]
	pub fn is_pcm(self) -> bool {
		Self::PCM_GUIDS.contains(&self)
	}

	/// Whether this GUID identifies the little-endian IEEE 754 float sub-format
	#[must_use]
	pub fn is_ieee_float(self) -> bool {
		self == guids::IEEE754_LE_FLOAT
	}
}

impl Display for Guid {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		let b = &self.0;
		write!(
			f,
			"{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
			b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12],
			b[13], b[14], b[15]
		)
	}
}

impl Debug for Guid {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "Guid({self})")
	}
}

/// Registered WAVE sub-format GUIDs
#[allow(missing_docs)]
pub mod guids {
	use super::Guid;

	const fn guid(
		data1: u32,
		data2: u16,
		data3: u16,
		data4: [u8; 8],
	) -> Guid {
		let d1 = data1.to_be_bytes();
		let d2 = data2.to_be_bytes();
		let d3 = data3.to_be_bytes();
		Guid([
			d1[0], d1[1], d1[2], d1[3], d2[0], d2[1], d3[0], d3[1], data4[0], data4[1],
			data4[2], data4[3], data4[4], data4[5], data4[6], data4[7],
		])
	}

	const MEDIA_TAIL: [u8; 8] = [0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71];

	pub const KSDATAFORMAT_SUBTYPE_PCM: Guid = guid(0x0000_0001, 0x0000, 0x0010, MEDIA_TAIL);
	pub const IEEE754_LE_FLOAT: Guid = guid(0x0000_0003, 0x0000, 0x0010, MEDIA_TAIL);
	pub const PCM_BE_INT24: Guid = guid(0x3432_6E69, 0x0000, 0x0010, MEDIA_TAIL);
	pub const PCM_BE_INT32: Guid = guid(0x3233_6E69, 0x0000, 0x0010, MEDIA_TAIL);
	pub const PCM_BE_FL32: Guid = guid(0x3233_6C66, 0x0000, 0x0010, MEDIA_TAIL);
	pub const PCM_BE_FL64: Guid = guid(0x3436_6C66, 0x0000, 0x0010, MEDIA_TAIL);
	pub const PCM_LE_INT24: Guid = guid(0x696E_3234, 0x0000, 0x0010, MEDIA_TAIL);
	pub const PCM_LE_INT32: Guid = guid(0x696E_3332, 0x0000, 0x0010, MEDIA_TAIL);
	pub const PCM_LE_FL32: Guid = guid(0x666C_3332, 0x0000, 0x0010, MEDIA_TAIL);
	pub const PCM_LE_FL64: Guid = guid(0x666C_3634, 0x0000, 0x0010, MEDIA_TAIL);
}
