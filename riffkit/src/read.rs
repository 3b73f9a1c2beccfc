//! The RIFF/FORM parsing state machine
//!
//! [`RiffReader`] walks the byte stream chunk by chunk, builds the
//! [`ChunkArena`](crate::chunk::ChunkArena), dispatches per-id decoders from a
//! registry table, and assembles a [`RiffFileInfo`].
//!
//! Parsing a RIFF is easy, but word alignment is not: every chunk id must sit
//! at an even offset with a pad byte after odd-sized content, and a lot of
//! editors generate unpadded files that are out of spec. The reader detects
//! both layouts and counts how often it had to deviate.
//!
//! Decoder failures are contained: a chunk that cannot be decoded is logged
//! and skipped by seeking to its declared end. Only header/type-tag problems
//! and stream-level I/O errors abort a parse.

use crate::chunk::{ChunkPayload, ChunkRef, CuePoint, FourCc, Range, id};
use crate::codec::WaveCodec;
use crate::config::ParseOptions;
use crate::error::{ErrorKind, Result, RiffError};
use crate::info::{AudioStreamInfo, DlsVersion, RiffFileInfo};
use crate::io::PositionalStream;
use crate::macros::{decode_err, err};
use crate::metadata::MetadataKey;
use crate::write::RiffWriter;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::{Compression, Crc};

const KNOWN_TYPES: [FourCc; 4] = [id::WAVE, id::AIFF, id::AIFC, id::DLS];

// Bounds for the filename-based tempo guess
const LOWEST_TEMPO: f64 = 40.0;
const HIGHEST_TEMPO: f64 = 300.0;

// LIST types whose children are themselves chunks
const NESTED_LIST_TYPES: [FourCc; 10] = [
	id::WVPL,
	id::WAVE_LIST,
	id::LINS,
	id::LRGN,
	id::LART,
	id::INS,
	id::RGN,
	id::RGN2,
	id::LAR2,
	id::LAR3,
];
const NESTED_LIST_TYPES_GIG: [FourCc; 6] = [
	id::G3_GRI,
	id::G3_GNL,
	id::G3_DNL,
	id::G3_PRG,
	id::G3_EWL,
	id::G3_DNM,
];

type ChunkDecoder = fn(&mut RiffReader, ChunkRef) -> Result<()>;

// Dispatch registry, consulted once per chunk. Ids with no entry are recorded
// in the tree and skipped.
const CHUNK_DECODERS: &[(FourCc, ChunkDecoder)] = &[
	(id::LIST, RiffReader::read_list),
	(id::WLNK, RiffReader::read_wave_link),
	(id::RGNH, RiffReader::read_region_header),
	(id::PTBL, RiffReader::read_pool_table),
	(id::G3_DIMENSIONS, RiffReader::read_gig_dimensions),
	(id::VERS, RiffReader::read_vers),
	(id::FMT, RiffReader::read_fmt),
	(id::DATA, RiffReader::read_data),
	(id::CUE, RiffReader::read_cue),
	(id::ACID, RiffReader::read_acid),
	(id::BEXT, RiffReader::read_bext),
	(id::IXML, RiffReader::read_ixml),
	(id::XMP, RiffReader::read_xmp),
	(id::ID3_UPPER, RiffReader::read_id3),
	(id::ID3_LOWER, RiffReader::read_id3),
	(id::COMM, RiffReader::read_comm),
	(id::SSND, RiffReader::read_ssnd),
	(id::NAME, RiffReader::read_name),
	(id::AUTH, RiffReader::read_auth),
	(id::COPYRIGHT, RiffReader::read_copyright),
	(id::ANNO, RiffReader::read_anno),
];

fn decoder_for(chunk_id: FourCc) -> Option<ChunkDecoder> {
	CHUNK_DECODERS
		.iter()
		.find(|(id, _)| *id == chunk_id)
		.map(|(_, decoder)| *decoder)
}

/// A reader for RIFF-family audio containers (WAV, AIFF/AIFC, DLS2, GigaStudio)
///
/// ```rust,no_run
/// use riffkit::config::ParseOptions;
/// use riffkit::read::RiffReader;
///
/// # fn main() -> riffkit::error::Result<()> {
/// let reader = RiffReader::open("drums.wav", ParseOptions::new())?;
/// let info = reader.parse()?;
/// println!("{} Hz", info.audio().sample_rate());
/// # Ok(()) }
/// ```
pub struct RiffReader {
	stream: PositionalStream,
	options: ParseOptions,
	path: Option<PathBuf>,
	info: RiffFileInfo,
	// Wave-pool streams of a DLS2/GigaStudio container, in file order
	streams: Vec<AudioStreamInfo>,
	// Index into `streams` of the `wave` list being parsed
	current_target: Option<usize>,
	misaligned_chunks: u32,
	is_aiff: bool,
	is_aifc: bool,
	is_dls: bool,
}

impl RiffReader {
	/// Open `path` for parsing
	///
	/// With [`ParseOptions::allow_repair`] enabled the file is opened
	/// read-write so the chunk-size fix can be written back.
	///
	/// # Errors
	///
	/// I/O errors from opening or reading the file.
	pub fn open(path: impl AsRef<Path>, options: ParseOptions) -> Result<Self> {
		let path = path.as_ref();
		let stream = if options.allow_repair {
			PositionalStream::open_rw(path)?
		} else {
			PositionalStream::open(path)?
		};

		Ok(Self::with_stream(stream, Some(path.to_path_buf()), options))
	}

	/// Parse an in-memory container
	///
	/// Repairs only affect the buffer; the post-parse file APIs
	/// ([`RiffFileInfo::extract`] and friends) are unavailable.
	#[must_use]
	pub fn from_vec(buf: Vec<u8>, options: ParseOptions) -> Self {
		Self::with_stream(PositionalStream::from_vec(buf), None, options)
	}

	fn with_stream(stream: PositionalStream, path: Option<PathBuf>, options: ParseOptions) -> Self {
		Self {
			stream,
			options,
			path,
			info: RiffFileInfo::default(),
			streams: Vec::new(),
			current_target: None,
			misaligned_chunks: 0,
			is_aiff: false,
			is_aifc: false,
			is_dls: false,
		}
	}

	/// How many chunk ids were found at odd offsets so far
	pub fn misaligned_chunks(&self) -> u32 {
		self.misaligned_chunks
	}

	/// Parse the whole container, consuming the reader
	///
	/// # Errors
	///
	/// * The stream is not a RIFF/FORM container with a known form type
	/// * [`ErrorKind::PartialSampleCount`] when the `data` chunk holds a
	///   partial trailing sample and repair is not permitted
	/// * I/O errors
	pub fn parse(mut self) -> Result<RiffFileInfo> {
		log::trace!("-------------");
		self.info.arena = crate::chunk::ChunkArena::new(self.stream.capacity());

		let Some(header) = self.next_header_id()? else {
			err!(NotAnAudioContainer);
		};
		if header != id::RIFF && header != id::FORM {
			err!(NotAnAudioContainer);
		}

		// FORM (AIFF) stores every size big-endian
		let root_size = if header == id::FORM {
			self.stream.read_u32_be()?
		} else {
			self.stream.read_u32_le()?
		};
		let expected_total = u64::from(root_size) + 8;
		if self.stream.capacity() != expected_total {
			let delta = self.stream.capacity() as i64 - expected_total as i64;
			log::warn!(
				"File size 0x{:X} does not match declared size 0x{:X}, delta: {} bytes",
				self.stream.capacity(),
				expected_total,
				delta
			);
		}

		let Some(form_type) = self.next_header_id()? else {
			err!(NotAnAudioContainer);
		};
		if !KNOWN_TYPES.contains(&form_type) {
			err!(NotAnAudioContainer);
		}
		self.is_aifc = form_type == id::AIFC;
		self.is_aiff = form_type == id::AIFF || self.is_aifc;
		self.is_dls = form_type == id::DLS;

		loop {
			match self.read_chunk(None) {
				Ok(Some(_)) => {},
				Ok(None) => break,
				Err(err) if err.is_fatal() => return Err(err),
				Err(err) => {
					// Null ids and oversized chunks end the scan, they do not
					// invalidate what was already read
					log::warn!("Giving up the chunk scan: {err}");
					break;
				},
			}
		}

		if self.misaligned_chunks > 0 {
			log::trace!("Out-of-spec RIFF: {} misaligned chunks", self.misaligned_chunks);
		}
		self.info.misaligned_chunks = self.misaligned_chunks;

		if self.is_dls {
			for stream_info in &mut self.streams {
				stream_info.compute_duration();
			}
			self.info.files = std::mem::take(&mut self.streams);
			self.info.collect_instruments();
		} else {
			self.info.audio.compute_duration();
			self.check_sample_count()?;
			self.store_metadata_tempo();
			if let Some(key) = self.info.audio.key.clone() {
				self.put_metadata(MetadataKey::Key, key);
			}
			self.store_non_audio_data()?;
		}

		self.info.source = self.path.take();
		Ok(self.info)
	}

	// ---- chunk scanning ------------------------------------------------------

	/// Read the next chunk at the current level, decode it, and seek past it
	///
	/// Returns `Ok(None)` when this scan level is exhausted.
	fn read_chunk(&mut self, parent: Option<ChunkRef>) -> Result<Option<ChunkRef>> {
		let Some(chunk_id) = self.chunk_id_or_level_end()? else {
			return Ok(None);
		};

		let content_size = if self.is_aiff {
			self.stream.read_u32_be()?
		} else {
			self.stream.read_u32_le()?
		};
		let content_start = self.stream.position();
		log::trace!(
			"CHUNK {} : {}/0x{:X} bytes at 0x{:X}",
			chunk_id,
			content_size,
			content_size,
			content_start - 8
		);

		let node = match self
			.info
			.arena
			.insert(parent, chunk_id, content_start, content_size)
		{
			Ok(node) => node,
			Err(err) => {
				// Leave the stream at the chunk header so the parent's reader
				// can decide what to salvage
				self.stream.seek(content_start - 8);
				return Err(err);
			},
		};

		if let Some(decoder) = decoder_for(chunk_id) {
			if let Err(err) = decoder(self, node) {
				// A null id hit inside a LIST marks the end of the valid data
				// for the entire scan, not just that list
				if err.is_fatal() || matches!(err.kind(), ErrorKind::UnexpectedNullChunk(_)) {
					return Err(err);
				}
				log::warn!("Failed to decode chunk {chunk_id}: {err}");
			}
		}

		self.move_after_chunk(node);
		Ok(Some(node))
	}

	/// Read a chunk id, handling alignment, end of stream and damaged ids
	///
	/// # Errors
	///
	/// * `UnexpectedNullChunk` for four NUL bytes (zero-filled trailing space)
	/// * `InvalidChunkId` for bytes outside the legal id set (typically
	///   non-RIFF data appended to the file)
	fn next_chunk_id(&mut self) -> Result<Option<FourCc>> {
		let start = self.stream.position();
		if self.stream.is_eof() {
			return Ok(None);
		}
		self.word_align();
		if self.stream.is_eof() {
			return Ok(None);
		}

		let Ok(bytes) = self.stream.read_exact_n(4) else {
			log::warn!("Unexpected EOF at 0x{start:X}");
			return Ok(None);
		};

		let chunk_id = FourCc([bytes[0], bytes[1], bytes[2], bytes[3]]);
		if chunk_id.is_null() {
			err!(UnexpectedNullChunk(self.stream.position() - 4));
		}
		if !chunk_id.is_valid() {
			return Err(RiffError::new(ErrorKind::InvalidChunkId(chunk_id.bytes())));
		}

		Ok(Some(chunk_id))
	}

	/// Like [`next_chunk_id`](Self::next_chunk_id), but an invalid id ends the
	/// level instead of propagating
	fn chunk_id_or_level_end(&mut self) -> Result<Option<FourCc>> {
		match self.next_chunk_id() {
			Err(err) if matches!(err.kind(), ErrorKind::InvalidChunkId(_)) => {
				log::warn!(
					"{err} at 0x{:X}, giving up this scan level",
					self.stream.position() - 4
				);
				Ok(None)
			},
			other => other,
		}
	}

	/// Header ids are mandatory, so a null id is not special here
	fn next_header_id(&mut self) -> Result<Option<FourCc>> {
		match self.next_chunk_id() {
			Err(err)
				if matches!(
					err.kind(),
					ErrorKind::InvalidChunkId(_) | ErrorKind::UnexpectedNullChunk(_)
				) =>
			{
				Ok(None)
			},
			other => other,
		}
	}

	/// Consume the pad byte at an odd offset, unless it looks like the start
	/// of a chunk id
	///
	/// A printable pad byte means the writer skipped padding entirely; the
	/// byte is put back and the file is counted as misaligned.
	fn word_align(&mut self) {
		if self.stream.position() % 2 == 0 {
			return;
		}

		let Ok(pad) = self.stream.read_u8() else {
			return;
		};
		log::trace!("Misaligned, now at 0x{:X}", self.stream.position());
		if (0x20..0x7F).contains(&pad) {
			self.stream.seek(self.stream.position() - 1);
			self.misaligned_chunks += 1;
		}
	}

	fn move_after_chunk(&mut self, node: ChunkRef) {
		let end = self.info.arena.node(node).chunk_end();
		self.stream.seek(end.min(self.stream.capacity()));
	}

	fn at_end_of_chunk(&self, node: ChunkRef) -> bool {
		self.stream.position() >= self.info.arena.node(node).chunk_end()
	}

	/// The stream descriptor `fmt `/`data` content belongs to: the latest
	/// wave-pool entry when inside a `wave` list, the primary stream otherwise
	fn stream_target(&mut self, node: ChunkRef) -> &mut AudioStreamInfo {
		let nested = self.info.arena.node(node).parent.is_some();
		match self.current_target {
			Some(index) if nested => &mut self.streams[index],
			_ => &mut self.info.audio,
		}
	}

	fn put_metadata(&mut self, key: MetadataKey, value: impl Into<String>) {
		if self.options.read_metadata {
			self.info.metadata.put(key, value);
		}
	}

	fn put_metadata_bwf(&mut self, key: MetadataKey, value: impl Into<String>) {
		if self.options.read_metadata {
			self.info.metadata.put_bwf(key, value);
		}
	}

	// ---- LIST chunks ---------------------------------------------------------

	fn read_list(&mut self, node: ChunkRef) -> Result<()> {
		let Some(list_type) = self.chunk_id_or_level_end()? else {
			log::warn!("LIST chunk without a type tag");
			return Ok(());
		};
		self.info
			.arena
			.set_payload(node, ChunkPayload::List { list_type });
		log::trace!("Read LIST {list_type}");

		if list_type == id::WAVE_LIST {
			// Each wave list is one pooled sample
			self.streams.push(AudioStreamInfo::default());
			self.current_target = Some(self.streams.len() - 1);
		}

		if list_type == id::INFO {
			self.read_info_sub_chunks(node)?;
		} else if list_type == id::ADTL {
			self.read_adtl_sub_chunks(node)?;
		} else if NESTED_LIST_TYPES.contains(&list_type)
			|| NESTED_LIST_TYPES_GIG.contains(&list_type)
		{
			self.read_list_children(node)?;
		} else {
			log::warn!("Unknown LIST type: {list_type}");
		}

		Ok(())
	}

	fn read_list_children(&mut self, list: ChunkRef) -> Result<()> {
		loop {
			self.word_align();
			if self.at_end_of_chunk(list) {
				return Ok(());
			}

			match self.read_chunk(Some(list)) {
				Ok(Some(_)) => {},
				Ok(None) => return Ok(()),
				Err(err) if matches!(err.kind(), ErrorKind::IncorrectParentSize { .. }) => {
					// The list declared too small a size; abandon its remaining
					// children and let the caller continue after the list
					log::warn!("Recovering from bad LIST size: {err}");
					return Ok(());
				},
				Err(err) => return Err(err),
			}
		}
	}

	fn read_info_sub_chunks(&mut self, list: ChunkRef) -> Result<()> {
		let parent_is_wave = self.info.arena.node(list).parent.is_some_and(|parent| {
			matches!(
				self.info.arena.node(parent).payload,
				ChunkPayload::List { list_type } if list_type == id::WAVE_LIST
			)
		});

		loop {
			if self.at_end_of_chunk(list) {
				return Ok(());
			}
			self.word_align();
			if self.at_end_of_chunk(list) {
				return Ok(());
			}

			let Some(field) = self.chunk_id_or_level_end()? else {
				return Ok(());
			};
			let content_size = self.stream.read_u32_le()?;
			let content_start = self.stream.position();
			let value = self.stream.read_fixed_string(content_size as usize)?;

			let node = self
				.info
				.arena
				.insert(Some(list), field, content_start, content_size)?;
			self.info.arena.set_payload(
				node,
				ChunkPayload::Info {
					value: value.clone(),
				},
			);
			log::trace!("LIST INFO {field}: {value}");

			match &field.bytes() {
				b"ISFT" => self.put_metadata(MetadataKey::Software, value),
				b"ICMT" => self.put_metadata(MetadataKey::Description, value),
				b"IART" | b"IAUT" => self.put_metadata(MetadataKey::Vendor, value),
				b"IGNR" => self.put_metadata(MetadataKey::Genre, value),
				b"ICOP" => self.put_metadata(MetadataKey::Copyright, value),
				b"ICRD" => self.put_metadata(MetadataKey::Created, value),
				b"INAM" => {
					if parent_is_wave {
						if let Some(index) = self.current_target {
							self.streams[index].filename = Some(value);
						}
					} else if !self.is_dls {
						self.info.filename = Some(value);
					}
				},
				_ => {},
			}
		}
	}

	fn read_adtl_sub_chunks(&mut self, list: ChunkRef) -> Result<()> {
		loop {
			self.word_align();
			if self.at_end_of_chunk(list) {
				return Ok(());
			}

			let Some(field) = self.chunk_id_or_level_end()? else {
				return Ok(());
			};

			match &field.bytes() {
				b"labl" | b"note" => {
					let content_size = self.stream.read_u32_le()?;
					let content_start = self.stream.position();
					let cue_point_id = self.stream.read_u32_le()?;
					let text = self
						.stream
						.read_fixed_string(content_size.saturating_sub(4) as usize)?;
					log::trace!("adtl label for cue point {cue_point_id} {field}: {text}");

					let node = self
						.info
						.arena
						.insert(Some(list), field, content_start, content_size)?;
					self.info
						.arena
						.set_payload(node, ChunkPayload::Label { cue_point_id, text });
				},
				b"ltxt" => {
					let content_size = self.stream.read_u32_le()?;
					let content_start = self.stream.position();
					let cue_point_id = self.stream.read_u32_le()?;
					let sample_length = self.stream.read_u32_le()?;
					let Some(purpose) = self.next_chunk_id()? else {
						return Ok(());
					};
					let _country = self.stream.read_u16_le()?;
					let _language = self.stream.read_u16_le()?;
					let _dialect = self.stream.read_u16_le()?;
					let _code_page = self.stream.read_u16_le()?;
					let consumed = self.stream.position() - content_start;
					let text = self
						.stream
						.read_fixed_string((u64::from(content_size)).saturating_sub(consumed) as usize)?;
					log::trace!("adtl {field}: {text}");

					let node = self
						.info
						.arena
						.insert(Some(list), field, content_start, content_size)?;
					self.info.arena.set_payload(
						node,
						ChunkPayload::LabeledText {
							cue_point_id,
							sample_length,
							purpose,
							text,
						},
					);
				},
				_ => {
					log::warn!("Unknown adtl LIST type: {field}");
					return Ok(());
				},
			}
		}
	}

	// ---- format and audio chunks ---------------------------------------------

	fn read_fmt(&mut self, node: ChunkRef) -> Result<()> {
		let format_tag = self.stream.read_u16_le()?;
		let codec = WaveCodec::from_tag(format_tag);
		let channel_count = self.stream.read_u16_le()?;
		let sample_rate = self.stream.read_u32_le()?;
		let _avg_bytes_per_sec = self.stream.read_u32_le()?;
		let block_align = self.stream.read_u16_le()?;
		let bits_per_sample = self.stream.read_u16_le()?;

		let mut channel_mask = None;
		let mut sub_codec = None;
		if codec == WaveCodec::Extensible {
			let _cb_size = self.stream.read_u16_le()?;
			let _valid_bits_per_sample = self.stream.read_u16_le()?;
			channel_mask = Some(crate::channels::ChannelMask::from_bits(
				self.stream.read_u32_le()?,
			));
			sub_codec = Some(crate::codec::Guid(self.stream.read_guid()?));
		}

		log::trace!(
			"{codec:?} {channel_count} channels {sample_rate} Hz {bits_per_sample} bits"
		);

		let target = self.stream_target(node);
		target.codec = codec;
		target.sub_codec = sub_codec;
		target.channel_mask = channel_mask;
		target.bits_per_sample = bits_per_sample;
		target.sample_rate = sample_rate;
		target.channel_count = channel_count;
		target.frame_size = block_align;
		target.fmt_chunk = Some(node);
		Ok(())
	}

	fn read_data(&mut self, node: ChunkRef) -> Result<()> {
		let content_size = self.info.arena.node(node).content_size;
		let target = self.stream_target(node);
		target.data_chunk = Some(node);
		target.audio_byte_count = content_size;
		Ok(())
	}

	fn read_comm(&mut self, node: ChunkRef) -> Result<()> {
		let channel_count = self.stream.read_u16_be()?;
		let _sample_frames = self.stream.read_u32_be()?;
		let sample_size = self.stream.read_u16_be()?;
		let sample_rate = self.stream.read_f80_be()?;

		let codec = if self.is_aifc {
			match self.next_chunk_id()? {
				Some(compression) => {
					let _compression_name = self.stream.read_pascal_string()?;
					WaveCodec::from_aiff_compression(compression)
				},
				None => {
					log::warn!("AIFC COMM chunk without a compression type");
					WaveCodec::Unknown(0)
				},
			}
		} else {
			// Plain AIFF is always uncompressed PCM
			WaveCodec::Pcm
		};

		let target = self.stream_target(node);
		target.codec = codec;
		target.bits_per_sample = sample_size;
		target.sample_rate = sample_rate as u32;
		target.channel_count = channel_count;
		target.frame_size = (sample_size / 8) * channel_count;
		target.fmt_chunk = Some(node);
		Ok(())
	}

	fn read_ssnd(&mut self, node: ChunkRef) -> Result<()> {
		let offset = self.stream.read_u32_be()?;
		let _block_size = self.stream.read_u32_be()?;
		let content_size = self.info.arena.node(node).content_size;

		let target = self.stream_target(node);
		target.data_chunk = Some(node);
		target.audio_byte_count = content_size.saturating_sub(offset);
		Ok(())
	}

	fn read_cue(&mut self, node: ChunkRef) -> Result<()> {
		let count = self.stream.read_u32_le()?;
		log::trace!("CUE points: {count} entries");

		let mut points = Vec::new();
		for _ in 0..count {
			let point_id = self.stream.read_u32_le()?;
			let position = self.stream.read_u32_le()?;
			let Some(chunk_id) = self.next_chunk_id()? else {
				break;
			};
			let chunk_start = self.stream.read_u32_le()?;
			let block_start = self.stream.read_u32_le()?;
			let sample_offset = self.stream.read_u32_le()?;
			log::trace!(
				"CUE point {point_id} in chunk {chunk_id} sample offset {sample_offset}"
			);
			points.push(CuePoint {
				id: point_id,
				position,
				chunk_id,
				chunk_start,
				block_start,
				sample_offset,
			});
		}

		self.info
			.arena
			.set_payload(node, ChunkPayload::CuePoints(points));
		Ok(())
	}

	// ---- metadata chunks -----------------------------------------------------

	fn read_vers(&mut self, _node: ChunkRef) -> Result<()> {
		let release = self.stream.read_u8()?;
		let build = self.stream.read_u8()?;
		let major = self.stream.read_u8()?;
		let minor = self.stream.read_u8()?;
		self.info.version = DlsVersion {
			major,
			minor,
			release,
			build,
		};
		Ok(())
	}

	fn read_acid(&mut self, _node: ChunkRef) -> Result<()> {
		// File-type bit field: 0x01 one-shot, 0x02 root note set, 0x04 stretch,
		// 0x08 disk-based
		let _file_type = self.stream.read_u32_le()?;
		let root_note = self.stream.read_u16_le()?;
		let _unknown1 = self.stream.read_u16_le()?;
		let _unknown2 = self.stream.read_f32_le()?;
		let beat_count = self.stream.read_u32_le()?;
		let meter_denominator = self.stream.read_u16_le()?;
		let meter_numerator = self.stream.read_u16_le()?;
		// The embedded tempo is wrong in the wild; the real one is derived from
		// the beat count and the duration after the scan
		let _tempo = self.stream.read_f32_le()?;

		let audio = &mut self.info.audio;
		audio.beat_count = beat_count;
		audio.root_note = root_note;
		audio.meter_denominator = meter_denominator;
		audio.meter_numerator = meter_numerator;

		self.put_metadata(
			MetadataKey::TimeSignature,
			format!("{meter_numerator}/{meter_denominator}"),
		);
		self.put_metadata(MetadataKey::Beats, beat_count.to_string());
		if meter_numerator != 0 {
			let bars = beat_count / u32::from(meter_numerator);
			self.put_metadata(MetadataKey::Bars, bars.to_string());
		}
		self.put_metadata(MetadataKey::RootNote, root_note.to_string());
		Ok(())
	}

	fn read_bext(&mut self, node: ChunkRef) -> Result<()> {
		let chunk_end = self.info.arena.node(node).chunk_end();

		let description = self.stream.read_fixed_string(256)?;
		let originator = self.stream.read_fixed_string(32)?;
		let originator_reference = self.stream.read_fixed_string(32)?;
		let origination_date = self.stream.read_fixed_string(10)?;
		let _origination_time = self.stream.read_fixed_string(8)?;
		let _time_reference_low = self.stream.read_u32_le()?;
		let _time_reference_high = self.stream.read_u32_le()?;

		log::trace!("Broadcast WAV originator: {originator}");
		self.put_metadata(MetadataKey::Created, origination_date);
		self.put_metadata_bwf(MetadataKey::Vendor, originator);
		self.put_metadata_bwf(MetadataKey::Description, description);
		self.put_metadata_bwf(MetadataKey::Copyright, originator_reference);

		if self.stream.position() >= chunk_end {
			return Ok(()); // version 0
		}
		let _version = self.stream.read_u16_le()?;
		let _smpte_umid = self.stream.read_exact_n(64)?;
		if self.stream.position() >= chunk_end {
			return Ok(()); // version 1
		}

		// Version 2 loudness block plus coding history
		let _loudness_value = self.stream.read_i16_le()?;
		let _loudness_range = self.stream.read_i16_le()?;
		let _max_true_peak = self.stream.read_i16_le()?;
		let _max_momentary_loudness = self.stream.read_i16_le()?;
		let _max_short_term_loudness = self.stream.read_i16_le()?;
		let _reserved = self.stream.read_exact_n(180)?;
		let history_size = chunk_end.saturating_sub(self.stream.position());
		let _coding_history = self.stream.read_fixed_string(history_size as usize)?;
		Ok(())
	}

	fn read_ixml(&mut self, node: ChunkRef) -> Result<()> {
		let content_size = self.info.arena.node(node).content_size;
		let xml = self.stream.read_fixed_string_lossy(content_size as usize)?;
		// Bare ampersands show up in VALUE text and break naive scanning
		let xml = xml.replace(" & ", " &amp; ");
		self.extract_ixml_attributes(&xml);
		Ok(())
	}

	/// Pull the Steinberg `<ATTR>` records out of an iXML blob
	///
	/// The scanner is deliberately tolerant: real-world iXML is too messy for
	/// strict parsing, and only four attributes matter here.
	fn extract_ixml_attributes(&mut self, xml: &str) {
		let mut rest = xml;
		while let Some(start) = rest.find("<ATTR>") {
			let body = &rest[start + "<ATTR>".len()..];
			let Some(end) = body.find("</ATTR>") else {
				break;
			};
			let attr = &body[..end];
			rest = &body[end + "</ATTR>".len()..];

			let Some(name) = element_text(attr, "NAME") else {
				continue;
			};
			match name {
				"MusicalBeats" => {
					if let Some(value) = element_text(attr, "VALUE")
						&& let Ok(beats) = value.parse::<u32>()
					{
						self.info.audio.beat_count = beats;
					}
				},
				"MusicalSignature" => {
					if let Some(numerator) = element_text(attr, "NUMERATOR")
						&& let Ok(numerator) = numerator.parse::<u16>()
					{
						self.info.audio.meter_numerator = numerator;
					}
					if let Some(denominator) = element_text(attr, "DENOMINATOR")
						&& let Ok(denominator) = denominator.parse::<u16>()
					{
						self.info.audio.meter_denominator = denominator;
					}
				},
				"MusicalTempo" => {
					if let Some(value) = element_text(attr, "VALUE")
						&& let Ok(tempo) = value.parse::<f64>()
					{
						self.info.audio.tempo = tempo;
					}
				},
				"MusicalKey" => {
					if let Some(value) = element_text(attr, "VALUE") {
						self.info.audio.key = Some(value.to_owned());
					}
				},
				_ => {},
			}
		}
	}

	fn read_xmp(&mut self, _node: ChunkRef) -> Result<()> {
		log::trace!("XMP metadata ignored");
		Ok(())
	}

	fn read_id3(&mut self, _node: ChunkRef) -> Result<()> {
		// Recorded in the tree for passthrough; tag decoding belongs to a
		// dedicated ID3 library
		log::trace!("ID3 chunk recorded, not decoded");
		Ok(())
	}

	fn read_name(&mut self, node: ChunkRef) -> Result<()> {
		self.read_text(node, MetadataKey::Name)
	}

	fn read_auth(&mut self, node: ChunkRef) -> Result<()> {
		self.read_text(node, MetadataKey::Author)
	}

	fn read_copyright(&mut self, node: ChunkRef) -> Result<()> {
		self.read_text(node, MetadataKey::Copyright)
	}

	fn read_anno(&mut self, node: ChunkRef) -> Result<()> {
		self.read_text(node, MetadataKey::Description)
	}

	/// AIFF text chunks, including the AFsp key/value sub-format
	fn read_text(&mut self, node: ChunkRef, key: MetadataKey) -> Result<()> {
		let content_size = self.info.arena.node(node).content_size;
		let data = self.stream.read_exact_n(content_size as usize)?;

		if data.len() > 4 && &data[..4] == b"AFsp" {
			// NUL-separated "key: value" records
			for record in data[4..].split(|&b| b == 0) {
				let record = String::from_utf8_lossy(record);
				let Some((field, value)) = record.split_once(':') else {
					continue;
				};
				let value = value.trim().to_owned();
				match field.trim() {
					"user" => self.put_metadata(MetadataKey::Author, value),
					"program" => self.put_metadata(MetadataKey::Software, value),
					"date" => self.put_metadata(MetadataKey::Created, value),
					_ => {},
				}
			}
			return Ok(());
		}

		self.put_metadata(key, String::from_utf8_lossy(&data).into_owned());
		Ok(())
	}

	// ---- DLS2 / GigaStudio chunks --------------------------------------------

	fn read_wave_link(&mut self, node: ChunkRef) -> Result<()> {
		let options = self.stream.read_u16_le()?;
		let phase_group = self.stream.read_u16_le()?;
		let channel = self.stream.read_u32_le()?;
		let table_index = self.stream.read_u32_le()?;
		self.info.arena.set_payload(
			node,
			ChunkPayload::WaveLink {
				options,
				phase_group,
				channel,
				table_index,
			},
		);
		Ok(())
	}

	fn read_region_header(&mut self, node: ChunkRef) -> Result<()> {
		let content_start = self.info.arena.node(node).content_start;
		let content_size = self.info.arena.node(node).content_size;

		let key_range = Range {
			low: self.stream.read_u16_le()?,
			high: self.stream.read_u16_le()?,
		};
		let velocity_range = Range {
			low: self.stream.read_u16_le()?,
			high: self.stream.read_u16_le()?,
		};
		let options = self.stream.read_u16_le()?;
		let key_group = self.stream.read_u16_le()?;
		// DLS1 region headers stop before the layer field
		let layer = if self.stream.position() - content_start == u64::from(content_size) {
			0
		} else {
			self.stream.read_u16_le()?
		};

		self.info.arena.set_payload(
			node,
			ChunkPayload::RegionHeader {
				key_range,
				velocity_range,
				options,
				key_group,
				layer,
			},
		);
		Ok(())
	}

	fn read_pool_table(&mut self, node: ChunkRef) -> Result<()> {
		let content_size = self.info.arena.node(node).content_size;
		let cb_size = self.stream.read_u32_le()?;
		let count = self.stream.read_u32_le()?;
		if cb_size != 8 {
			log::warn!("Unexpected struct size for ptbl: {cb_size}");
		}
		// GigaStudio 3 widens the pool offsets to 64 bits. A declared struct
		// size larger than the chunk itself is garbage, not a 64-bit table.
		let table_size = u64::from(content_size).checked_sub(u64::from(cb_size));
		let offsets_64bit = table_size == Some(u64::from(count) * 8);
		log::info!("Wave pool table contains {count} entries");

		// The entry count is untrusted; let the bounds-checked reads fail
		// rather than sizing a buffer from it
		let mut offsets = Vec::new();
		for _ in 0..count {
			if offsets_64bit {
				let high = u64::from(self.stream.read_u32_le()?);
				let low = u64::from(self.stream.read_u32_le()?);
				offsets.push((high << 32) + low);
			} else {
				offsets.push(u64::from(self.stream.read_u32_le()?));
			}
		}

		self.info
			.arena
			.set_payload(node, ChunkPayload::PoolTable { offsets });
		Ok(())
	}

	fn read_gig_dimensions(&mut self, node: ChunkRef) -> Result<()> {
		let content_start = self.info.arena.node(node).content_start;
		let dimension_count = self.stream.read_u32_le()?;

		// The sample-index table moved when GigaStudio 3 grew the header
		if self.info.version.major > 2 {
			self.stream.seek(content_start + 68);
		} else {
			self.stream.seek(content_start + 44);
		}

		let mut sample_indices = Vec::new();
		for _ in 0..dimension_count {
			let index = self.stream.read_u32_le()?;
			if index != u32::MAX {
				sample_indices.push(index);
			}
		}

		self.info
			.arena
			.set_payload(node, ChunkPayload::GigDimensions { sample_indices });
		Ok(())
	}

	// ---- finalization --------------------------------------------------------

	/// Verify the `data` chunk holds whole sample frames, repairing the size
	/// field in place when permitted
	///
	/// A partial trailing sample makes downstream PCM encoders reject the file.
	fn check_sample_count(&mut self) -> Result<()> {
		if !self.info.audio.is_pcm() && !self.info.audio.is_ieee_float() {
			return Ok(()); // compressed payload sizes cannot be checked
		}
		let frame_size = u32::from(self.info.audio.frame_size);
		if frame_size == 0 {
			return Ok(());
		}

		let actual = self.info.audio.audio_byte_count;
		let partial_sample = actual % frame_size;
		if partial_sample == 0 {
			return Ok(());
		}

		let expected = actual - partial_sample + frame_size;
		let error = RiffError::new(ErrorKind::PartialSampleCount { expected, actual });
		if !self.options.allow_repair {
			return Err(error);
		}

		log::warn!("{error}");
		self.fix_data_chunk_size(expected)
	}

	/// Patch the declared `data` chunk size, in the buffer and (for file-backed
	/// streams) on disk
	fn fix_data_chunk_size(&mut self, expected_size: u32) -> Result<()> {
		if !self.options.allow_repair {
			err!(RepairDisabled);
		}
		let Some(data) = self.info.data_chunk() else {
			decode_err!(@BAIL "No data chunk to repair");
		};

		log::warn!("Fixing chunk size...");
		let content_start = self.info.arena.node(data).content_start;
		self.stream.patch_u32_le(content_start - 4, expected_size)?;
		self.info.arena.set_content_size(data, expected_size);
		self.info.audio.audio_byte_count = expected_size;
		Ok(())
	}

	/// Fill in the tempo when no chunk declared one
	///
	/// Beats plus duration give the exact value; failing that, the largest
	/// plausible number in the filename is used. Heuristic, but right far more
	/// often than the tempo fields actually present in files.
	fn store_metadata_tempo(&mut self) {
		let audio = &mut self.info.audio;
		if audio.beat_count != 0 && audio.tempo == 0.0 {
			if audio.duration > 0.0 {
				let beat_duration = audio.duration / f64::from(audio.beat_count);
				let tempo = 60.0 / beat_duration;
				audio.tempo = tempo;
				self.put_metadata(MetadataKey::Bpm, format_tempo(tempo));
			}
		} else if audio.tempo == 0.0 {
			let name = self
				.path
				.as_ref()
				.and_then(|path| path.file_name())
				.map(|name| name.to_string_lossy().into_owned())
				.or_else(|| self.info.filename.clone());

			if let Some(name) = name
				&& let Some(tempo) = tempo_from_name(&name)
			{
				self.info.audio.tempo = tempo;
				self.put_metadata(MetadataKey::Bpm, format_tempo(tempo));
			}
		}
		// An explicit tempo from a chunk is already in the descriptor; only
		// inferred values are surfaced as metadata
	}

	/// Capture everything around the audio payload so the container can be
	/// reconstructed byte for byte
	fn store_non_audio_data(&mut self) -> Result<()> {
		let Some(data) = self.info.data_chunk() else {
			log::warn!("No data chunk, nothing to preserve");
			return Ok(());
		};

		let node = self.info.arena.node(data);
		let prolog_size = node.content_start;
		let chunk_end = node.chunk_end();
		let capacity = self.stream.capacity();
		let epilog_size = if chunk_end > capacity {
			log::warn!("no epilog...");
			0
		} else {
			capacity - chunk_end
		};

		self.stream.seek(0);
		let prolog = self.stream.read_exact_n(prolog_size as usize)?;
		let epilog = if epilog_size > 0 {
			self.stream.seek(chunk_end);
			self.stream.read_exact_n(epilog_size as usize)?
		} else {
			Vec::new()
		};

		if let Some(name) = self
			.path
			.as_ref()
			.and_then(|path| path.file_name())
			.map(|name| name.to_string_lossy().into_owned())
		{
			self.info.filename = Some(name);
		}
		self.info.prolog = Some(gzip(&prolog)?);
		self.info.epilog = Some(gzip(&epilog)?);
		Ok(())
	}
}

/// Post-parse file operations
///
/// These re-open the source file, so they are only available when the
/// descriptor came from [`RiffReader::open`].
impl RiffFileInfo {
	fn source_file(&self) -> Result<File> {
		let Some(source) = &self.source else {
			decode_err!(@BAIL "Descriptor was parsed from memory, no source file");
		};
		Ok(File::open(source)?)
	}

	/// CRC32 of a stream's raw audio payload, formatted as 8 uppercase hex
	/// digits
	///
	/// # Errors
	///
	/// * The stream has no data chunk, or there is no source file
	/// * I/O errors
	pub fn audio_checksum(&self, entry: &AudioStreamInfo) -> Result<String> {
		let Some(data) = entry.data_chunk() else {
			decode_err!(@BAIL "Stream has no data chunk");
		};
		let node = self.arena.node(data);

		let mut file = self.source_file()?;
		file.seek(SeekFrom::Start(node.content_start))?;
		let mut pcm = vec![0; node.content_size as usize];
		file.read_exact(&mut pcm)?;

		let mut crc = Crc::new();
		crc.update(&pcm);
		Ok(format!("{:08X}", crc.sum()))
	}

	/// Write a stream out as a minimal standalone WAV (format + data chunks
	/// only)
	///
	/// This is how individual samples are pulled out of a DLS2/GigaStudio pool.
	///
	/// # Errors
	///
	/// * The stream is missing its format or data chunk, or there is no source
	///   file
	/// * I/O errors
	pub fn extract(&self, entry: &AudioStreamInfo, target: impl AsRef<Path>) -> Result<()> {
		let Some(fmt) = entry.fmt_chunk() else {
			decode_err!(@BAIL "Stream has no format chunk");
		};
		let Some(data) = entry.data_chunk() else {
			decode_err!(@BAIL "Stream has no data chunk");
		};

		let mut file = self.source_file()?;
		let mut writer = RiffWriter::create(target)?;
		for chunk in [fmt, data] {
			let node = self.arena.node(chunk);
			file.seek(SeekFrom::Start(node.content_start))?;
			let mut payload = vec![0; node.content_size as usize];
			file.read_exact(&mut payload)?;
			writer.write_chunk(node.id, &payload)?;
		}
		writer.finalize()?;
		Ok(())
	}

	/// Deliver a chunk's payload to `sink` in blocks of at most `block_size`
	/// bytes
	///
	/// The final block is the remainder; a zero-byte read ends the stream
	/// early.
	///
	/// # Errors
	///
	/// * There is no source file
	/// * I/O errors, or any error returned by `sink`
	pub fn stream_chunk(
		&self,
		chunk: ChunkRef,
		block_size: usize,
		sink: &mut dyn FnMut(&[u8]) -> Result<()>,
	) -> Result<()> {
		let node = self.arena.node(chunk);
		let mut file = self.source_file()?;
		file.seek(SeekFrom::Start(node.content_start))?;

		let mut buffer = vec![0; block_size];
		let mut remaining = u64::from(node.content_size);
		while remaining > 0 {
			let want = remaining.min(block_size as u64) as usize;
			let read = file.read(&mut buffer[..want])?;
			if read == 0 {
				break;
			}
			sink(&buffer[..read])?;
			remaining -= read as u64;
		}
		Ok(())
	}
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
	let mut encoder = GzEncoder::new(Vec::with_capacity(data.len()), Compression::default());
	encoder.write_all(data)?;
	Ok(encoder.finish()?)
}

/// Format a tempo with at most one decimal, dropping a trailing `.0`
fn format_tempo(tempo: f64) -> String {
	let rounded = (tempo * 10.0).round() / 10.0;
	if rounded.fract() == 0.0 {
		format!("{}", rounded as i64)
	} else {
		format!("{rounded:.1}")
	}
}

/// The largest number in `name` that looks like a BPM value
fn tempo_from_name(name: &str) -> Option<f64> {
	let mut best: Option<f64> = None;
	let mut digits = String::new();

	for ch in name.chars().chain(std::iter::once('\0')) {
		if ch.is_ascii_digit() {
			digits.push(ch);
			continue;
		}
		if digits.is_empty() {
			continue;
		}
		if let Ok(value) = digits.parse::<f64>()
			&& (LOWEST_TEMPO..=HIGHEST_TEMPO).contains(&value)
			&& best.is_none_or(|current| value > current)
		{
			best = Some(value);
		}
		digits.clear();
	}

	best
}

/// Text of the first `<tag>...</tag>` element in `xml`
fn element_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
	let open = format!("<{tag}>");
	let close = format!("</{tag}>");
	let start = xml.find(&open)? + open.len();
	let end = xml[start..].find(&close)? + start;
	Some(xml[start..end].trim())
}
