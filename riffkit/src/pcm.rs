//! Raw PCM decoding and encoding
//!
//! Converts between interleaved integer PCM frames and per-channel sample
//! buffers normalized to [-1, 1]. Conversion routines are plain function
//! pointers selected by a (bit depth, signedness, endianness) lookup, so the
//! per-sample path stays branch-free.

use crate::error::Result;
use crate::macros::{decode_err, err};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};

/// PCM sample bit depths riffkit can convert
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BitDepth {
	/// 8 bits per sample
	Eight,
	/// 16 bits per sample
	Sixteen,
	/// 24 bits per sample (packed, 3 bytes)
	TwentyFour,
	/// 32 bits per sample
	ThirtyTwo,
}

impl BitDepth {
	/// Map a `fmt ` bits-per-sample field to a depth
	#[must_use]
	pub fn from_bits(bits: u16) -> Option<Self> {
		match bits {
			8 => Some(Self::Eight),
			16 => Some(Self::Sixteen),
			24 => Some(Self::TwentyFour),
			32 => Some(Self::ThirtyTwo),
			_ => None,
		}
	}

	/// Bits per sample
	#[must_use]
	pub fn bits(self) -> u16 {
		match self {
			Self::Eight => 8,
			Self::Sixteen => 16,
			Self::TwentyFour => 24,
			Self::ThirtyTwo => 32,
		}
	}

	/// Bytes per sample
	#[must_use]
	pub fn bytes(self) -> usize {
		usize::from(self.bits() / 8)
	}
}

type SampleDecoder = fn(&mut &[u8]) -> std::io::Result<f32>;
type SampleEncoder = fn(f32, &mut Vec<u8>) -> std::io::Result<()>;

fn signed_8(buf: &mut &[u8]) -> std::io::Result<f32> {
	Ok(f32::from(buf.read_i8()?) / 128.0)
}

fn unsigned_8(buf: &mut &[u8]) -> std::io::Result<f32> {
	Ok(f32::from(i16::from(buf.read_u8()?) - 0x80) / 128.0)
}

fn signed_16<B: ByteOrder>(buf: &mut &[u8]) -> std::io::Result<f32> {
	Ok(f32::from(buf.read_i16::<B>()?) / 32768.0)
}

fn unsigned_16<B: ByteOrder>(buf: &mut &[u8]) -> std::io::Result<f32> {
	Ok((i32::from(buf.read_u16::<B>()?) - 0x8000) as f32 / 32768.0)
}

fn signed_24<B: ByteOrder>(buf: &mut &[u8]) -> std::io::Result<f32> {
	// read_i24 already sign-extends the top byte
	Ok(buf.read_i24::<B>()? as f32 / 8_388_608.0)
}

fn unsigned_24<B: ByteOrder>(buf: &mut &[u8]) -> std::io::Result<f32> {
	Ok((buf.read_u24::<B>()? as i32 - 0x0080_0000) as f32 / 8_388_608.0)
}

fn signed_32<B: ByteOrder>(buf: &mut &[u8]) -> std::io::Result<f32> {
	Ok(buf.read_i32::<B>()? as f32 / 2_147_483_648.0)
}

fn unsigned_32<B: ByteOrder>(buf: &mut &[u8]) -> std::io::Result<f32> {
	Ok((i64::from(buf.read_u32::<B>()?) - 0x8000_0000) as f32 / 2_147_483_648.0)
}

fn encode_signed_8(sample: f32, out: &mut Vec<u8>) -> std::io::Result<()> {
	out.write_i8((sample * 128.0) as i8)
}

fn encode_unsigned_8(sample: f32, out: &mut Vec<u8>) -> std::io::Result<()> {
	out.write_u8((i16::from((sample * 128.0) as i8) + 0x80) as u8)
}

fn encode_signed_16<B: ByteOrder>(sample: f32, out: &mut Vec<u8>) -> std::io::Result<()> {
	out.write_i16::<B>((sample * 32768.0) as i16)
}

fn encode_unsigned_16<B: ByteOrder>(sample: f32, out: &mut Vec<u8>) -> std::io::Result<()> {
	out.write_u16::<B>((i32::from((sample * 32768.0) as i16) + 0x8000) as u16)
}

fn encode_signed_24<B: ByteOrder>(sample: f32, out: &mut Vec<u8>) -> std::io::Result<()> {
	let value = ((sample * 8_388_608.0) as i32).clamp(-0x0080_0000, 0x007F_FFFF);
	out.write_i24::<B>(value)
}

fn encode_unsigned_24<B: ByteOrder>(sample: f32, out: &mut Vec<u8>) -> std::io::Result<()> {
	let value = ((sample * 8_388_608.0) as i32).clamp(-0x0080_0000, 0x007F_FFFF);
	out.write_u24::<B>((value + 0x0080_0000) as u32)
}

fn encode_signed_32<B: ByteOrder>(sample: f32, out: &mut Vec<u8>) -> std::io::Result<()> {
	out.write_i32::<B>((f64::from(sample) * 2_147_483_648.0) as i32)
}

fn encode_unsigned_32<B: ByteOrder>(sample: f32, out: &mut Vec<u8>) -> std::io::Result<()> {
	let value = (f64::from(sample) * 2_147_483_648.0) as i64 + 0x8000_0000;
	out.write_u32::<B>(value.clamp(0, i64::from(u32::MAX)) as u32)
}

fn decoder_for(depth: BitDepth, signed: bool, big_endian: bool) -> SampleDecoder {
	match (depth, signed, big_endian) {
		// Endianness is meaningless for single bytes
		(BitDepth::Eight, true, _) => signed_8,
		(BitDepth::Eight, false, _) => unsigned_8,
		(BitDepth::Sixteen, true, false) => signed_16::<LittleEndian>,
		(BitDepth::Sixteen, true, true) => signed_16::<BigEndian>,
		(BitDepth::Sixteen, false, false) => unsigned_16::<LittleEndian>,
		(BitDepth::Sixteen, false, true) => unsigned_16::<BigEndian>,
		(BitDepth::TwentyFour, true, false) => signed_24::<LittleEndian>,
		(BitDepth::TwentyFour, true, true) => signed_24::<BigEndian>,
		(BitDepth::TwentyFour, false, false) => unsigned_24::<LittleEndian>,
		(BitDepth::TwentyFour, false, true) => unsigned_24::<BigEndian>,
		(BitDepth::ThirtyTwo, true, false) => signed_32::<LittleEndian>,
		(BitDepth::ThirtyTwo, true, true) => signed_32::<BigEndian>,
		(BitDepth::ThirtyTwo, false, false) => unsigned_32::<LittleEndian>,
		(BitDepth::ThirtyTwo, false, true) => unsigned_32::<BigEndian>,
	}
}

fn encoder_for(depth: BitDepth, signed: bool, big_endian: bool) -> SampleEncoder {
	match (depth, signed, big_endian) {
		(BitDepth::Eight, true, _) => encode_signed_8,
		(BitDepth::Eight, false, _) => encode_unsigned_8,
		(BitDepth::Sixteen, true, false) => encode_signed_16::<LittleEndian>,
		(BitDepth::Sixteen, true, true) => encode_signed_16::<BigEndian>,
		(BitDepth::Sixteen, false, false) => encode_unsigned_16::<LittleEndian>,
		(BitDepth::Sixteen, false, true) => encode_unsigned_16::<BigEndian>,
		(BitDepth::TwentyFour, true, false) => encode_signed_24::<LittleEndian>,
		(BitDepth::TwentyFour, true, true) => encode_signed_24::<BigEndian>,
		(BitDepth::TwentyFour, false, false) => encode_unsigned_24::<LittleEndian>,
		(BitDepth::TwentyFour, false, true) => encode_unsigned_24::<BigEndian>,
		(BitDepth::ThirtyTwo, true, false) => encode_signed_32::<LittleEndian>,
		(BitDepth::ThirtyTwo, true, true) => encode_signed_32::<BigEndian>,
		(BitDepth::ThirtyTwo, false, false) => encode_unsigned_32::<LittleEndian>,
		(BitDepth::ThirtyTwo, false, true) => encode_unsigned_32::<BigEndian>,
	}
}

/// Decode interleaved integer PCM into per-channel buffers normalized to [-1, 1]
///
/// # Errors
///
/// * `channels` is zero
/// * `bytes` is not a whole number of frames
pub fn decode(
	bytes: &[u8],
	depth: BitDepth,
	signed: bool,
	big_endian: bool,
	channels: usize,
) -> Result<Vec<Vec<f32>>> {
	if channels == 0 {
		decode_err!(@BAIL "Cannot decode PCM without channels");
	}

	let frame_size = depth.bytes() * channels;
	if bytes.len() % frame_size != 0 {
		err!(TruncatedData);
	}

	let frames = bytes.len() / frame_size;
	let read_sample = decoder_for(depth, signed, big_endian);

	let mut output = vec![Vec::with_capacity(frames); channels];
	let mut cursor = bytes;
	for _ in 0..frames {
		for channel_buf in &mut output {
			channel_buf.push(read_sample(&mut cursor)?);
		}
	}

	Ok(output)
}

/// Encode per-channel normalized samples into interleaved integer PCM
///
/// The inverse of [`decode`]; all channel buffers must be the same length.
///
/// # Errors
///
/// * `samples` is empty or the channel buffers differ in length
pub fn encode(
	samples: &[Vec<f32>],
	depth: BitDepth,
	signed: bool,
	big_endian: bool,
) -> Result<Vec<u8>> {
	let Some(first) = samples.first() else {
		decode_err!(@BAIL "Cannot encode PCM without channels");
	};

	let frames = first.len();
	if samples.iter().any(|channel| channel.len() != frames) {
		decode_err!(@BAIL "PCM channel buffers differ in length");
	}

	let write_sample = encoder_for(depth, signed, big_endian);

	let mut output = Vec::with_capacity(frames * depth.bytes() * samples.len());
	for frame in 0..frames {
		for channel_buf in samples {
			write_sample(channel_buf[frame], &mut output)?;
		}
	}

	Ok(output)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test_log::test]
	fn signed_16_bit_edges() {
		let bytes = [0x00, 0x80, 0xFF, 0x7F, 0x00, 0x00]; // -32768, 32767, 0 (LE)
		let channels = decode(&bytes, BitDepth::Sixteen, true, false, 1).unwrap();
		assert_eq!(channels.len(), 1);
		assert_eq!(channels[0][0], -1.0);
		assert!((channels[0][1] - 32767.0 / 32768.0).abs() < 1e-6);
		assert_eq!(channels[0][2], 0.0);
	}

	#[test_log::test]
	fn unsigned_8_bit_bias() {
		// 0x80 is the midpoint, 0x00 the negative extreme
		let channels = decode(&[0x80, 0x00, 0xFF], BitDepth::Eight, false, false, 1).unwrap();
		assert_eq!(channels[0][0], 0.0);
		assert_eq!(channels[0][1], -1.0);
		assert!((channels[0][2] - 127.0 / 128.0).abs() < 1e-6);
	}

	#[test_log::test]
	fn signed_24_bit_sign_extension() {
		// 0x800000 (LE bytes 00 00 80) is the most negative 24-bit value
		let bytes = [0x00, 0x00, 0x80, 0xFF, 0xFF, 0x7F];
		let channels = decode(&bytes, BitDepth::TwentyFour, true, false, 1).unwrap();
		assert_eq!(channels[0][0], -1.0);
		assert!((channels[0][1] - 8_388_607.0 / 8_388_608.0).abs() < 1e-6);

		// Big-endian flips the byte order, not the value
		let bytes_be = [0x80, 0x00, 0x00, 0x7F, 0xFF, 0xFF];
		let channels_be = decode(&bytes_be, BitDepth::TwentyFour, true, true, 1).unwrap();
		assert_eq!(channels_be[0], channels[0]);
	}

	#[test_log::test]
	fn interleaving() {
		// Stereo: L = max, R = min
		let bytes = [0xFF, 0x7F, 0x00, 0x80, 0xFF, 0x7F, 0x00, 0x80];
		let channels = decode(&bytes, BitDepth::Sixteen, true, false, 2).unwrap();
		assert_eq!(channels.len(), 2);
		assert!(channels[0].iter().all(|&s| s > 0.99));
		assert!(channels[1].iter().all(|&s| s == -1.0));
	}

	#[test_log::test]
	fn encode_decode_round_trip() {
		let samples = vec![vec![0.0_f32, 0.5, -0.5, -1.0], vec![1.0, -1.0, 0.25, 0.0]];

		for (depth, signed, big_endian) in [
			(BitDepth::Sixteen, true, false),
			(BitDepth::TwentyFour, true, true),
			(BitDepth::Eight, false, false),
		] {
			let bytes = encode(&samples, depth, signed, big_endian).unwrap();
			assert_eq!(bytes.len(), 4 * 2 * depth.bytes());

			let decoded = decode(&bytes, depth, signed, big_endian, 2).unwrap();
			// Quantization error is bounded by one step at the given depth
			let tolerance = 2.0 / f32::from(1u16 << (depth.bits().min(15) - 1));
			for (orig, back) in samples.iter().zip(&decoded) {
				for (&a, &b) in orig.iter().zip(back) {
					assert!((a - b).abs() <= tolerance, "{a} vs {b} at {depth:?}");
				}
			}
		}
	}

	#[test_log::test]
	fn truncated_input_rejected() {
		let bytes = [0u8; 5];
		assert!(decode(&bytes, BitDepth::Sixteen, true, false, 2).is_err());
		assert!(decode(&bytes, BitDepth::Sixteen, true, false, 0).is_err());
	}
}
