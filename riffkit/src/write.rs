//! Streaming RIFF/WAVE writer
//!
//! Chunk sizes are backpatched: [`RiffWriter::begin_chunk`] leaves a
//! placeholder size and pushes the patch position onto a stack,
//! [`RiffWriter::end_chunk`] seeks back and fills it in. Every chunk id is
//! written at an even offset, with a zero pad byte inserted when needed.

use crate::channels::ChannelMask;
use crate::chunk::{FourCc, id};
use crate::codec::{Guid, WaveCodec};
use crate::error::Result;
use crate::macros::encode_err;

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

const WAVEFORMATEX_SIZE: u16 = 18;
const WAVEFORMATEXTENSIBLE_SIZE: u16 = 40;

/// Everything needed to produce a `fmt ` chunk
#[derive(Copy, Clone, Debug)]
pub struct FmtDescriptor {
	/// The codec tag to declare; ignored when `sub_codec` is set
	pub codec: WaveCodec,
	/// Channel count
	pub channel_count: u16,
	/// Sample rate (Hz)
	pub sample_rate: u32,
	/// Bits per single-channel sample
	pub bits_per_sample: u16,
	/// Speaker assignment, written only in the extensible layout
	pub channel_mask: ChannelMask,
	/// When set, the chunk uses the `WAVE_FORMAT_EXTENSIBLE` layout with this
	/// sub-format GUID
	pub sub_codec: Option<Guid>,
}

impl FmtDescriptor {
	/// A classic `WAVEFORMATEX` integer PCM format
	#[must_use]
	pub fn pcm(channel_count: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
		Self {
			codec: WaveCodec::Pcm,
			channel_count,
			sample_rate,
			bits_per_sample,
			channel_mask: ChannelMask::default_for(channel_count),
			sub_codec: None,
		}
	}

	/// A `WAVE_FORMAT_EXTENSIBLE` format carrying `sub_codec`
	#[must_use]
	pub fn extensible(
		channel_count: u16,
		sample_rate: u32,
		bits_per_sample: u16,
		sub_codec: Guid,
	) -> Self {
		Self {
			codec: WaveCodec::Extensible,
			channel_count,
			sample_rate,
			bits_per_sample,
			channel_mask: ChannelMask::default_for(channel_count),
			sub_codec: Some(sub_codec),
		}
	}

	/// Bytes per multichannel sample frame (`nBlockAlign`)
	#[must_use]
	pub fn block_align(&self) -> u16 {
		(self.channel_count * self.bits_per_sample) / 8
	}

	/// Bytes per second (`nAvgBytesPerSec`)
	#[must_use]
	pub fn avg_bytes_per_sec(&self) -> u32 {
		self.sample_rate * u32::from(self.block_align())
	}
}

/// A named marker at a sample position, for [`RiffWriter::write_markers`]
#[derive(Clone, Debug)]
pub struct Marker {
	/// Marker label, stored in a `labl` chunk
	pub label: String,
	/// Position in sample frames from the start of the data chunk
	pub sample_position: u32,
}

/// A WAVE container writer
///
/// The `RIFF` header and `WAVE` type tag are written on construction; the root
/// size is backpatched by [`RiffWriter::finalize`].
pub struct RiffWriter<W: Write + Seek> {
	out: W,
	// Positions of the size fields of every open chunk, root first
	size_stack: Vec<u64>,
}

impl RiffWriter<BufWriter<File>> {
	/// Create a WAVE file at `path`
	///
	/// # Errors
	///
	/// * Failure to create the file
	pub fn create(path: impl AsRef<Path>) -> Result<Self> {
		Self::new(BufWriter::new(File::create(path)?))
	}
}

impl<W: Write + Seek> RiffWriter<W> {
	/// Start a WAVE container on an arbitrary writer
	///
	/// # Errors
	///
	/// * I/O errors from the underlying writer
	pub fn new(out: W) -> Result<Self> {
		let mut writer = Self {
			out,
			size_stack: Vec::new(),
		};
		writer.begin_chunk(id::RIFF)?;
		writer.write_fourcc(id::WAVE)?;
		Ok(writer)
	}

	/// Current byte position
	///
	/// # Errors
	///
	/// * I/O errors from the underlying writer
	pub fn position(&mut self) -> Result<u64> {
		Ok(self.out.stream_position()?)
	}

	/// Open a chunk: pad to an even offset, write the id, leave a size
	/// placeholder
	///
	/// # Errors
	///
	/// * I/O errors from the underlying writer
	pub fn begin_chunk(&mut self, chunk_id: FourCc) -> Result<()> {
		self.align()?;
		self.write_fourcc(chunk_id)?;
		self.size_stack.push(self.out.stream_position()?);
		self.out.write_u32::<LittleEndian>(0)?;
		Ok(())
	}

	/// Close the innermost open chunk, backpatching its size
	///
	/// # Errors
	///
	/// * No chunk is open
	/// * I/O errors from the underlying writer
	pub fn end_chunk(&mut self) -> Result<()> {
		let Some(size_pos) = self.size_stack.pop() else {
			encode_err!(@BAIL "end_chunk without a matching begin_chunk");
		};

		let end = self.out.stream_position()?;
		let size = end - size_pos - 4;
		self.out.seek(SeekFrom::Start(size_pos))?;
		self.out.write_u32::<LittleEndian>(size as u32)?;
		self.out.seek(SeekFrom::Start(end))?;
		Ok(())
	}

	/// Write a complete chunk with an opaque payload
	///
	/// # Errors
	///
	/// * I/O errors from the underlying writer
	pub fn write_chunk(&mut self, chunk_id: FourCc, payload: &[u8]) -> Result<()> {
		self.begin_chunk(chunk_id)?;
		self.out.write_all(payload)?;
		self.end_chunk()
	}

	/// Write the `fmt ` chunk
	///
	/// Produces the 18-byte `WAVEFORMATEX` layout, or the 40-byte
	/// `WAVEFORMATEXTENSIBLE` layout when the descriptor carries a sub-format
	/// GUID.
	///
	/// # Errors
	///
	/// * I/O errors from the underlying writer
	pub fn write_fmt(&mut self, fmt: &FmtDescriptor) -> Result<()> {
		self.begin_chunk(id::FMT)?;

		let tag = match fmt.sub_codec {
			Some(_) => WaveCodec::EXTENSIBLE_TAG,
			None => fmt.codec.tag(),
		};

		self.out.write_u16::<LittleEndian>(tag)?;
		self.out.write_u16::<LittleEndian>(fmt.channel_count)?;
		self.out.write_u32::<LittleEndian>(fmt.sample_rate)?;
		self.out.write_u32::<LittleEndian>(fmt.avg_bytes_per_sec())?;
		self.out.write_u16::<LittleEndian>(fmt.block_align())?;
		self.out.write_u16::<LittleEndian>(fmt.bits_per_sample)?;

		if let Some(sub_codec) = fmt.sub_codec {
			self.out
				.write_u16::<LittleEndian>(WAVEFORMATEXTENSIBLE_SIZE - WAVEFORMATEX_SIZE)?;
			self.out.write_u16::<LittleEndian>(fmt.bits_per_sample)?;
			self.out.write_u32::<LittleEndian>(fmt.channel_mask.bits())?;
			self.out.write_all(&guid_wire_bytes(sub_codec))?;
		}

		self.end_chunk()
	}

	/// Write the `data` chunk
	///
	/// # Errors
	///
	/// * I/O errors from the underlying writer
	pub fn write_data(&mut self, pcm: &[u8]) -> Result<()> {
		self.write_chunk(id::DATA, pcm)
	}

	/// Write markers as a `cue ` chunk plus a `LIST`/`adtl` with one `labl`
	/// per marker
	///
	/// Markers are sorted by sample position; cue point ids are assigned from 1
	/// in that order and shared between the two chunks.
	///
	/// # Errors
	///
	/// * I/O errors from the underlying writer
	pub fn write_markers(&mut self, markers: &[Marker]) -> Result<()> {
		let mut ordered: Vec<&Marker> = markers.iter().collect();
		ordered.sort_by_key(|marker| marker.sample_position);

		self.begin_chunk(id::CUE)?;
		self.out.write_u32::<LittleEndian>(ordered.len() as u32)?;
		for (index, marker) in ordered.iter().enumerate() {
			self.out.write_u32::<LittleEndian>(index as u32 + 1)?;
			self.out.write_u32::<LittleEndian>(0)?; // play order position
			self.write_fourcc(id::DATA)?;
			self.out.write_u32::<LittleEndian>(0)?; // chunk start
			self.out.write_u32::<LittleEndian>(0)?; // block start
			self.out.write_u32::<LittleEndian>(marker.sample_position)?;
		}
		self.end_chunk()?;

		self.begin_chunk(id::LIST)?;
		self.write_fourcc(id::ADTL)?;
		for (index, marker) in ordered.iter().enumerate() {
			self.begin_chunk(id::LABL)?;
			self.out.write_u32::<LittleEndian>(index as u32 + 1)?;
			self.out.write_all(marker.label.as_bytes())?;
			self.out.write_u8(0)?;
			self.end_chunk()?;
		}
		self.end_chunk()
	}

	/// Write a `LIST`/`INFO` chunk from (field id, value) pairs
	///
	/// # Errors
	///
	/// * I/O errors from the underlying writer
	pub fn write_info_list(&mut self, fields: &[(FourCc, &str)]) -> Result<()> {
		self.begin_chunk(id::LIST)?;
		self.write_fourcc(id::INFO)?;
		for (field, value) in fields {
			self.begin_chunk(*field)?;
			self.out.write_all(value.as_bytes())?;
			self.out.write_u8(0)?;
			self.end_chunk()?;
		}
		self.end_chunk()
	}

	/// Write an `iXML` chunk
	///
	/// # Errors
	///
	/// * I/O errors from the underlying writer
	pub fn write_ixml(&mut self, xml: &str) -> Result<()> {
		self.write_chunk(id::IXML, xml.as_bytes())
	}

	/// Write raw bytes into the currently open chunk
	///
	/// # Errors
	///
	/// * I/O errors from the underlying writer
	pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
		self.out.write_all(bytes)?;
		Ok(())
	}

	/// Close every open chunk, backpatch the root size, flush, and return the
	/// underlying writer
	///
	/// # Errors
	///
	/// * I/O errors from the underlying writer
	pub fn finalize(mut self) -> Result<W> {
		while !self.size_stack.is_empty() {
			self.end_chunk()?;
		}
		self.out.flush()?;
		Ok(self.out)
	}

	fn write_fourcc(&mut self, chunk_id: FourCc) -> Result<()> {
		self.out.write_all(&chunk_id.bytes())?;
		Ok(())
	}

	fn align(&mut self) -> Result<()> {
		if self.out.stream_position()? % 2 != 0 {
			self.out.write_u8(0)?;
		}
		Ok(())
	}
}

/// Serialize a GUID for a `fmt ` chunk: the first three fields flip to
/// little-endian, the trailing eight bytes stay put
fn guid_wire_bytes(guid: Guid) -> [u8; 16] {
	let b = guid.0;
	[
		b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9], b[10], b[11], b[12], b[13],
		b[14], b[15],
	]
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::codec::guids;

	use std::io::Cursor;

	fn written(writer: RiffWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
		writer.finalize().unwrap().into_inner()
	}

	#[test_log::test]
	fn header_and_root_size() {
		let writer = RiffWriter::new(Cursor::new(Vec::new())).unwrap();
		let bytes = written(writer);

		assert_eq!(&bytes[..4], b"RIFF");
		assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 4);
		assert_eq!(&bytes[8..12], b"WAVE");
	}

	#[test_log::test]
	fn nested_sizes_backpatched() {
		let mut writer = RiffWriter::new(Cursor::new(Vec::new())).unwrap();
		writer.write_chunk(FourCc::new(b"test"), &[1, 2, 3]).unwrap();
		let bytes = written(writer);

		// Odd-sized chunk content is padded before the next offset, but the
		// declared size stays odd
		assert_eq!(&bytes[12..16], b"test");
		assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 3);
		assert_eq!(
			u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize,
			bytes.len() - 8
		);
	}

	#[test_log::test]
	fn chunk_ids_stay_aligned() {
		let mut writer = RiffWriter::new(Cursor::new(Vec::new())).unwrap();
		writer.write_chunk(FourCc::new(b"odd "), &[0xAA]).unwrap();
		writer.write_chunk(FourCc::new(b"next"), &[0xBB, 0xCC]).unwrap();
		let bytes = written(writer);

		let next_pos = bytes.windows(4).position(|w| w == b"next").unwrap();
		assert_eq!(next_pos % 2, 0);
		// The pad byte between the chunks is zero
		assert_eq!(bytes[next_pos - 1], 0);
	}

	#[test_log::test]
	fn fmt_layouts() {
		let mut writer = RiffWriter::new(Cursor::new(Vec::new())).unwrap();
		writer.write_fmt(&FmtDescriptor::pcm(2, 44100, 16)).unwrap();
		let bytes = written(writer);

		assert_eq!(&bytes[12..16], b"fmt ");
		assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 16);
		assert_eq!(u16::from_le_bytes(bytes[20..22].try_into().unwrap()), 0x01);
		assert_eq!(
			u32::from_le_bytes(bytes[28..32].try_into().unwrap()),
			44100 * 4
		);

		let mut writer = RiffWriter::new(Cursor::new(Vec::new())).unwrap();
		writer
			.write_fmt(&FmtDescriptor::extensible(
				2,
				48000,
				24,
				guids::KSDATAFORMAT_SUBTYPE_PCM,
			))
			.unwrap();
		let bytes = written(writer);

		assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 40);
		assert_eq!(u16::from_le_bytes(bytes[20..22].try_into().unwrap()), 0xFFFE);
		// GUID data1 is little-endian on the wire
		assert_eq!(&bytes[44..48], &[0x01, 0x00, 0x00, 0x00]);
		assert_eq!(&bytes[52..60], &[0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71]);
	}

	#[test_log::test]
	fn markers_sorted_and_labeled() {
		let mut writer = RiffWriter::new(Cursor::new(Vec::new())).unwrap();
		writer
			.write_markers(&[
				Marker {
					label: String::from("late"),
					sample_position: 9000,
				},
				Marker {
					label: String::from("early"),
					sample_position: 100,
				},
			])
			.unwrap();
		let bytes = written(writer);

		assert_eq!(&bytes[12..16], b"cue ");
		assert_eq!(u32::from_le_bytes(bytes[20..24].try_into().unwrap()), 2);
		// First cue point is the earliest marker
		assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 1);
		assert_eq!(u32::from_le_bytes(bytes[44..48].try_into().unwrap()), 100);

		let adtl = bytes.windows(4).position(|w| w == b"adtl").unwrap();
		assert_eq!(&bytes[adtl + 4..adtl + 8], b"labl");
		let early = bytes.windows(5).position(|w| w == b"early").unwrap();
		let late = bytes.windows(4).position(|w| w == b"late").unwrap();
		assert!(early < late);
	}
}
