//! The positional byte cursor the reader works on
//!
//! A RIFF parse is all small typed reads and frequent seeks, so the whole file
//! is loaded into memory up front rather than memory-mapped. The cursor is
//! bounds-checked: any read past the end fails with
//! [`ErrorKind::TruncatedData`](crate::error::ErrorKind::TruncatedData), which
//! the reader catches per-chunk.

use crate::error::Result;
use crate::macros::err;

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// A seekable, bounds-checked cursor over an in-memory copy of a file
///
/// The only write it supports is [`patch_u32_le`](PositionalStream::patch_u32_le),
/// used for chunk-size repair; it is not a general random-access writer.
pub struct PositionalStream {
	buf: Vec<u8>,
	pos: u64,
	// Present only when opened with `open_rw`; patches are written through
	file: Option<File>,
}

impl PositionalStream {
	/// Load `path` into memory, read-only
	///
	/// # Errors
	///
	/// I/O errors from opening or reading the file.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let mut file = File::open(path)?;
		let mut buf = Vec::new();
		file.read_to_end(&mut buf)?;

		Ok(Self {
			buf,
			pos: 0,
			file: None,
		})
	}

	/// Load `path` into memory, keeping a writable handle for patch writes
	///
	/// # Errors
	///
	/// I/O errors from opening or reading the file.
	pub fn open_rw(path: impl AsRef<Path>) -> Result<Self> {
		let mut file = OpenOptions::new().read(true).write(true).open(path)?;
		let mut buf = Vec::new();
		file.read_to_end(&mut buf)?;

		Ok(Self {
			buf,
			pos: 0,
			file: Some(file),
		})
	}

	/// Wrap an in-memory buffer, patchable in memory only
	#[must_use]
	pub fn from_vec(buf: Vec<u8>) -> Self {
		Self {
			buf,
			pos: 0,
			file: None,
		}
	}

	/// Total length of the underlying data
	pub fn capacity(&self) -> u64 {
		self.buf.len() as u64
	}

	/// Current read position
	pub fn position(&self) -> u64 {
		self.pos
	}

	/// Bytes left between the position and the end of the data
	pub fn remaining(&self) -> u64 {
		self.capacity().saturating_sub(self.pos)
	}

	/// Whether the position reached the end of the data
	pub fn is_eof(&self) -> bool {
		self.pos >= self.capacity()
	}

	/// Move the read position
	///
	/// Seeking past the end is allowed; the next read will fail instead.
	pub fn seek(&mut self, pos: u64) {
		self.pos = pos;
	}

	fn take(&mut self, n: usize) -> Result<&[u8]> {
		let start = self.pos as usize;
		let Some(end) = start.checked_add(n) else {
			err!(TruncatedData);
		};
		if end > self.buf.len() {
			err!(TruncatedData);
		}

		self.pos = end as u64;
		Ok(&self.buf[start..end])
	}

	/// Read exactly `n` bytes
	///
	/// # Errors
	///
	/// `TruncatedData` if fewer than `n` bytes remain.
	pub fn read_exact_n(&mut self, n: usize) -> Result<Vec<u8>> {
		Ok(self.take(n)?.to_vec())
	}

	/// Read a single byte
	pub fn read_u8(&mut self) -> Result<u8> {
		Ok(self.take(1)?[0])
	}

	/// Read a little-endian `u16`
	pub fn read_u16_le(&mut self) -> Result<u16> {
		Ok(LittleEndian::read_u16(self.take(2)?))
	}

	/// Read a big-endian `u16`
	pub fn read_u16_be(&mut self) -> Result<u16> {
		Ok(BigEndian::read_u16(self.take(2)?))
	}

	/// Read a little-endian `i16`
	pub fn read_i16_le(&mut self) -> Result<i16> {
		Ok(LittleEndian::read_i16(self.take(2)?))
	}

	/// Read a big-endian `i16`
	pub fn read_i16_be(&mut self) -> Result<i16> {
		Ok(BigEndian::read_i16(self.take(2)?))
	}

	/// Read a little-endian 3-byte unsigned integer
	pub fn read_u24_le(&mut self) -> Result<u32> {
		Ok(LittleEndian::read_u24(self.take(3)?))
	}

	/// Read a little-endian `u32`
	pub fn read_u32_le(&mut self) -> Result<u32> {
		Ok(LittleEndian::read_u32(self.take(4)?))
	}

	/// Read a big-endian `u32`
	pub fn read_u32_be(&mut self) -> Result<u32> {
		Ok(BigEndian::read_u32(self.take(4)?))
	}

	/// Read a little-endian `u64`
	pub fn read_u64_le(&mut self) -> Result<u64> {
		Ok(LittleEndian::read_u64(self.take(8)?))
	}

	/// Read a big-endian `u64`
	pub fn read_u64_be(&mut self) -> Result<u64> {
		Ok(BigEndian::read_u64(self.take(8)?))
	}

	/// Read a little-endian `f32`
	pub fn read_f32_le(&mut self) -> Result<f32> {
		Ok(LittleEndian::read_f32(self.take(4)?))
	}

	/// Read a big-endian 80-bit extended-precision float, as found in AIFF
	/// `COMM` sample rates
	pub fn read_f80_be(&mut self) -> Result<f64> {
		let bytes: [u8; 10] = self.take(10)?.try_into().unwrap();
		Ok(f80_to_f64(bytes))
	}

	/// Read a 16-byte Microsoft GUID
	///
	/// The first three fields are little-endian on the wire regardless of the
	/// container's endianness; the result is normalized to canonical
	/// (display) byte order.
	pub fn read_guid(&mut self) -> Result<[u8; 16]> {
		let data1 = self.read_u32_le()?;
		let data2 = self.read_u16_le()?;
		let data3 = self.read_u16_le()?;
		let tail = self.take(8)?;

		let mut guid = [0; 16];
		BigEndian::write_u32(&mut guid[..4], data1);
		BigEndian::write_u16(&mut guid[4..6], data2);
		BigEndian::write_u16(&mut guid[6..8], data3);
		guid[8..].copy_from_slice(tail);
		Ok(guid)
	}

	/// Read a Pascal string (length byte + bytes), consuming the pad byte that
	/// keeps the total length even
	pub fn read_pascal_string(&mut self) -> Result<String> {
		let len = self.read_u8()? as usize;
		let content = self.read_exact_n(len)?;

		// The count byte plus text must total an even length, so a pad byte
		// exists exactly when the count is even
		if len % 2 == 0 {
			let _ = self.read_u8();
		}

		Ok(String::from_utf8_lossy(&content).into_owned())
	}

	/// Read a fixed-size ASCII field, truncated at the first NUL, trimmed
	pub fn read_fixed_string(&mut self, size: usize) -> Result<String> {
		let data = self.take(size)?;
		let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
		Ok(String::from_utf8_lossy(&data[..end]).trim().to_owned())
	}

	/// Read a fixed-size ASCII field, replacing every non-printable byte with a
	/// space instead of truncating
	///
	/// BWF and iXML fields regularly contain garbage despite what their specs
	/// promise.
	pub fn read_fixed_string_lossy(&mut self, size: usize) -> Result<String> {
		let data = self.take(size)?;
		let cleaned: String = data
			.iter()
			.map(|&b| {
				if (b' '..=b'~').contains(&b) {
					char::from(b)
				} else {
					' '
				}
			})
			.collect();
		Ok(cleaned.trim().to_owned())
	}

	/// Overwrite 4 bytes at `offset` with a little-endian `u32`
	///
	/// This is the chunk-size repair write. When the stream was opened with
	/// [`open_rw`](PositionalStream::open_rw) the patch is written through to
	/// the file; otherwise only the in-memory copy changes.
	///
	/// # Errors
	///
	/// `TruncatedData` if the patch range is out of bounds, or I/O errors from
	/// the write-through.
	pub fn patch_u32_le(&mut self, offset: u64, value: u32) -> Result<()> {
		let start = offset as usize;
		if start + 4 > self.buf.len() {
			err!(TruncatedData);
		}

		LittleEndian::write_u32(&mut self.buf[start..start + 4], value);

		if let Some(file) = self.file.as_mut() {
			file.seek(SeekFrom::Start(offset))?;
			file.write_all(&self.buf[start..start + 4])?;
			file.flush()?;
		}

		Ok(())
	}
}

/// Decode an 80-bit extended-precision float from its big-endian bytes
///
/// 1-bit sign, 15-bit exponent (bias 16383), 64-bit fraction with an explicit
/// integer bit.
fn f80_to_f64(bytes: [u8; 10]) -> f64 {
	let sign = u64::from(bytes[0] >> 7);
	let exponent = (u16::from(bytes[0] & 0x7F) << 8) | u16::from(bytes[1]);

	let mut fraction_bytes = [0; 8];
	fraction_bytes.copy_from_slice(&bytes[2..]);
	let fraction = u64::from_be_bytes(fraction_bytes);

	if exponent == 32767 {
		if fraction == 0 {
			return f64::from_bits((sign << 63) | f64::INFINITY.to_bits());
		}

		return f64::from_bits((sign << 63) | f64::NAN.to_bits());
	}

	if fraction == 0 {
		return f64::from_bits(sign << 63);
	}

	// Drop the explicit integer bit, rebias into f64's 11-bit exponent
	let fraction = fraction & 0x7FFF_FFFF_FFFF_FFFF;
	let exponent = i32::from(exponent) - 16383 + 1023;
	let bits = (sign << 63) | ((exponent as u64) << 52) | (fraction >> 11);

	f64::from_bits(bits)
}
