//! The container descriptor produced by a parse

use crate::channels::ChannelMask;
use crate::chunk::{ChunkArena, ChunkPayload, ChunkRef, id};
use crate::codec::{Guid, WaveCodec};
use crate::error::Result;
use crate::metadata::Metadata;

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

use flate2::read::GzDecoder;

/// A DLS/GigaStudio `vers` chunk
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DlsVersion {
	/// Major version (GigaStudio 3 changes the dimension-table layout)
	pub major: u8,
	/// Minor version
	pub minor: u8,
	/// Release number
	pub release: u8,
	/// Build number
	pub build: u8,
}

/// Everything known about one logical audio stream
///
/// WAV and AIFF containers carry exactly one; DLS2/GigaStudio pools carry one
/// per embedded `wave` list.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct AudioStreamInfo {
	pub(crate) filename: Option<String>,
	pub(crate) codec: WaveCodec,
	pub(crate) sub_codec: Option<Guid>,
	pub(crate) bits_per_sample: u16,
	pub(crate) frame_size: u16,
	pub(crate) sample_rate: u32,
	pub(crate) channel_count: u16,
	pub(crate) channel_mask: Option<ChannelMask>,
	pub(crate) audio_byte_count: u32,
	pub(crate) sample_count: u64,
	pub(crate) duration: f64,
	pub(crate) tempo: f64,
	pub(crate) beat_count: u32,
	pub(crate) root_note: u16,
	pub(crate) meter_numerator: u16,
	pub(crate) meter_denominator: u16,
	pub(crate) key: Option<String>,
	pub(crate) fmt_chunk: Option<ChunkRef>,
	pub(crate) data_chunk: Option<ChunkRef>,
	pub(crate) used: bool,
}

impl AudioStreamInfo {
	/// The resolved codec
	pub fn codec(&self) -> WaveCodec {
		self.codec
	}

	/// The sub-format GUID, present only when the codec is
	/// [`WaveCodec::Extensible`]
	pub fn sub_codec(&self) -> Option<Guid> {
		self.sub_codec
	}

	/// Bits per single-channel sample
	pub fn bits_per_sample(&self) -> u16 {
		self.bits_per_sample
	}

	/// Bytes required for one sample across all channels
	pub fn frame_size(&self) -> u16 {
		self.frame_size
	}

	/// Sample rate (Hz)
	pub fn sample_rate(&self) -> u32 {
		self.sample_rate
	}

	/// Channel count
	pub fn channel_count(&self) -> u16 {
		self.channel_count
	}

	/// The declared speaker mask, if the format carried one
	pub fn channel_mask(&self) -> Option<ChannelMask> {
		self.channel_mask
	}

	/// Size of the audio payload in bytes
	pub fn audio_byte_count(&self) -> u32 {
		self.audio_byte_count
	}

	/// Number of multichannel sample frames
	pub fn sample_count(&self) -> u64 {
		self.sample_count
	}

	/// Duration in seconds
	pub fn duration(&self) -> f64 {
		self.duration
	}

	/// Duration formatted as `HH:MM:SS.mmm`
	pub fn duration_string(&self) -> String {
		let seconds = self.duration as u64;
		let millis = ((self.duration - self.duration.floor()) * 1000.0) as u64;
		format!(
			"{:02}:{:02}:{:02}.{}",
			seconds / 3600,
			(seconds % 3600) / 60,
			seconds % 60,
			millis
		)
	}

	/// Tempo in BPM, zero when unknown
	///
	/// May be inferred from the beat count or the filename; see
	/// [`RiffReader::parse`](crate::read::RiffReader::parse).
	pub fn tempo(&self) -> f64 {
		self.tempo
	}

	/// Beat count from ACID/iXML, zero when unknown
	pub fn beat_count(&self) -> u32 {
		self.beat_count
	}

	/// MIDI root note from ACID, zero when unknown
	pub fn root_note(&self) -> u16 {
		self.root_note
	}

	/// Time signature as (numerator, denominator), zeroes when unknown
	pub fn time_signature(&self) -> (u16, u16) {
		(self.meter_numerator, self.meter_denominator)
	}

	/// Musical key (lowercase = minor), if any
	pub fn key(&self) -> Option<&str> {
		self.key.as_deref()
	}

	/// Embedded filename (`INAM` of the surrounding `wave` list, or the
	/// container name)
	pub fn filename(&self) -> Option<&str> {
		self.filename.as_deref()
	}

	/// The stream's `fmt `/`COMM` chunk
	pub fn fmt_chunk(&self) -> Option<ChunkRef> {
		self.fmt_chunk
	}

	/// The stream's `data`/`SSND` chunk
	pub fn data_chunk(&self) -> Option<ChunkRef> {
		self.data_chunk
	}

	/// Whether any instrument region references this wave-pool entry
	pub fn used(&self) -> bool {
		self.used
	}

	/// Whether the effective codec is integer PCM
	///
	/// For [`WaveCodec::Extensible`] this consults the GUID table, not the tag.
	pub fn is_pcm(&self) -> bool {
		match self.codec {
			WaveCodec::Pcm => true,
			WaveCodec::Extensible => self.sub_codec.is_some_and(Guid::is_pcm),
			_ => false,
		}
	}

	/// Whether the effective codec is IEEE 754 float PCM
	pub fn is_ieee_float(&self) -> bool {
		match self.codec {
			WaveCodec::IeeeFloat => true,
			WaveCodec::Extensible => self.sub_codec.is_some_and(Guid::is_ieee_float),
			_ => false,
		}
	}

	/// True when the file has more than two channels but never says which
	/// speakers they map to
	pub fn missing_channel_assignment(&self) -> bool {
		self.channel_count > 2
			&& (self.codec != WaveCodec::Extensible
				|| self.channel_mask.is_none_or(ChannelMask::is_empty))
	}

	pub(crate) fn compute_duration(&mut self) {
		if self.frame_size == 0 || self.sample_rate == 0 {
			return;
		}

		self.sample_count = u64::from(self.audio_byte_count) / u64::from(self.frame_size);
		self.duration = self.sample_count as f64 / f64::from(self.sample_rate);
	}
}

/// An instrument definition collected from a DLS2/GigaStudio container
#[derive(Clone, Debug)]
pub struct Instrument {
	/// Instrument name (`lins`/`ins `/INFO/INAM)
	pub name: String,
	/// Group path; empty when the instrument is not nested
	pub path: String,
	/// Indices into [`RiffFileInfo::files`] of the samples its regions use
	pub sample_indices: Vec<usize>,
}

/// A fully parsed container
///
/// Built once by [`RiffReader::parse`](crate::read::RiffReader::parse) and
/// immutable afterwards.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct RiffFileInfo {
	pub(crate) arena: ChunkArena,
	pub(crate) audio: AudioStreamInfo,
	pub(crate) files: Vec<AudioStreamInfo>,
	pub(crate) instruments: Vec<Instrument>,
	pub(crate) metadata: Metadata,
	pub(crate) filename: Option<String>,
	// The file this descriptor was parsed from; None for in-memory parses
	pub(crate) source: Option<PathBuf>,
	pub(crate) version: DlsVersion,
	pub(crate) prolog: Option<Vec<u8>>,
	pub(crate) epilog: Option<Vec<u8>>,
	pub(crate) misaligned_chunks: u32,
}

impl RiffFileInfo {
	/// The chunk tree
	pub fn chunks(&self) -> &ChunkArena {
		&self.arena
	}

	/// The primary audio stream (the only one for WAV/AIFF)
	pub fn audio(&self) -> &AudioStreamInfo {
		&self.audio
	}

	/// The wave-pool streams of a DLS2/GigaStudio container
	pub fn files(&self) -> &[AudioStreamInfo] {
		&self.files
	}

	/// The instrument table of a DLS2/GigaStudio container
	pub fn instruments(&self) -> &[Instrument] {
		&self.instruments
	}

	/// Extracted metadata
	pub fn metadata(&self) -> &Metadata {
		&self.metadata
	}

	/// Embedded or on-disk filename
	pub fn filename(&self) -> Option<&str> {
		self.filename.as_deref()
	}

	/// The DLS `vers` chunk content, zeroes when absent
	pub fn version(&self) -> DlsVersion {
		self.version
	}

	/// How many chunk ids were found at odd offsets and recovered
	///
	/// Nonzero means the file is out of spec (unpadded), not that data was lost.
	pub fn misaligned_chunks(&self) -> u32 {
		self.misaligned_chunks
	}

	/// The gzip-compressed bytes preceding the data chunk's content
	pub fn prolog(&self) -> Option<&[u8]> {
		self.prolog.as_deref()
	}

	/// The gzip-compressed bytes following the data chunk's content
	pub fn epilog(&self) -> Option<&[u8]> {
		self.epilog.as_deref()
	}

	/// Decompress the prolog
	///
	/// # Errors
	///
	/// I/O errors from gzip decoding.
	pub fn prolog_bytes(&self) -> Result<Vec<u8>> {
		Self::gunzip(self.prolog.as_deref())
	}

	/// Decompress the epilog
	///
	/// # Errors
	///
	/// I/O errors from gzip decoding.
	pub fn epilog_bytes(&self) -> Result<Vec<u8>> {
		Self::gunzip(self.epilog.as_deref())
	}

	fn gunzip(blob: Option<&[u8]>) -> Result<Vec<u8>> {
		let Some(blob) = blob else {
			return Ok(Vec::new());
		};

		let mut out = Vec::new();
		GzDecoder::new(blob).read_to_end(&mut out)?;
		Ok(out)
	}

	/// The chunk carrying audio samples: `data` for WAV, `SSND` for AIFF
	pub fn data_chunk(&self) -> Option<ChunkRef> {
		self.arena
			.find_root(id::DATA)
			.or_else(|| self.arena.find_root(id::SSND))
	}

	/// First top-level chunk matching `chunk_id` (LIST chunks also match their
	/// list type)
	pub fn chunk(&self, chunk_id: crate::chunk::FourCc) -> Option<ChunkRef> {
		self.arena.find_root(chunk_id)
	}

	/// Whether the primary stream's effective codec is integer PCM
	pub fn is_pcm(&self) -> bool {
		self.audio.is_pcm()
	}

	/// Whether the primary stream's effective codec is IEEE 754 float
	pub fn is_ieee_float(&self) -> bool {
		self.audio.is_ieee_float()
	}

	/// Build the instrument table of a DLS2/GigaStudio container
	///
	/// Regions are resolved region → wave link (or dimension table) → pool
	/// table offset → wave entry; every referenced entry is marked used.
	pub(crate) fn collect_instruments(&mut self) {
		// Pool-table offsets are relative to the `wvpl` chunk, pointing at the
		// 12-byte header of each `wave` list
		let mut sample_pool: HashMap<u64, usize> = HashMap::new();
		for (index, file) in self.files.iter().enumerate() {
			let Some(fmt_ref) = file.fmt_chunk else {
				continue;
			};
			let Some(wave_list) = self.arena.node(fmt_ref).parent else {
				continue;
			};
			let Some(wvpl) = self.arena.node(wave_list).parent else {
				continue;
			};

			let wave_header_start = self.arena.node(wave_list).content_start - 12;
			let offset = wave_header_start - self.arena.node(wvpl).content_start;
			sample_pool.insert(offset, index);
		}

		let pool_offsets = self.pool_table_offsets();

		let mut collected = Vec::new();
		let mut group: Option<String> = None;

		let ins_chunks = self
			.arena
			.find_root(id::LINS)
			.map(|lins| self.arena.find_children(lins, id::INS))
			.unwrap_or_default();

		for ins in ins_chunks {
			let Some(name) = self.instrument_name(ins) else {
				log::warn!("Instrument list entry without an INAM, skipped");
				continue;
			};

			let mut offsets = self.region_pool_offsets(ins, &pool_offsets);
			offsets.sort_unstable();
			offsets.dedup();
			log::info!("{name} uses {} samples", offsets.len());

			let mut sample_indices = Vec::new();
			for offset in offsets {
				match sample_pool.get(&offset) {
					Some(&index) => {
						self.files[index].used = true;
						sample_indices.push(index);
					},
					None => {
						log::error!(
							"Illegal offset in ins chunk {name}, sample not found 0x{offset:X}"
						);
					},
				}
			}

			if sample_indices.is_empty() {
				// A sample-less instrument acts as a group header for the
				// entries that follow (GigaStudio folder naming)
				group = Some(name);
			} else {
				collected.push(Instrument {
					name,
					path: group.clone().unwrap_or_default(),
					sample_indices,
				});
			}
		}

		self.instruments = collected;
	}

	fn instrument_name(&self, ins: ChunkRef) -> Option<String> {
		let info = self.arena.find_child(ins, id::INFO)?;
		let inam = self.arena.find_child(info, id::INAM)?;
		match &self.arena.node(inam).payload {
			ChunkPayload::Info { value } => Some(value.clone()),
			_ => None,
		}
	}

	fn pool_table_offsets(&self) -> Vec<u64> {
		let Some(ptbl) = self.arena.find_root(id::PTBL) else {
			return Vec::new();
		};

		match &self.arena.node(ptbl).payload {
			ChunkPayload::PoolTable { offsets } => offsets.clone(),
			_ => Vec::new(),
		}
	}

	/// Pool offsets referenced by every region of `ins`
	fn region_pool_offsets(&self, ins: ChunkRef, pool_offsets: &[u64]) -> Vec<u64> {
		let Some(lrgn) = self.arena.find_child(ins, id::LRGN) else {
			return Vec::new();
		};

		let mut regions = self.arena.find_children(lrgn, id::RGN);
		regions.extend(self.arena.find_children(lrgn, id::RGN2));

		let mut offsets = Vec::new();
		for rgn in regions {
			let Some(wlnk) = self.arena.find_child(rgn, id::WLNK) else {
				log::warn!("Region without a wlnk chunk, skipped");
				continue;
			};

			if let ChunkPayload::WaveLink { table_index, .. } = self.arena.node(wlnk).payload {
				if let Some(&offset) = pool_offsets.get(table_index as usize) {
					offsets.push(offset);
				}
			}

			// GigaStudio regions fan out to more samples via the dimension table
			if let Some(dims) = self.arena.find_child(rgn, id::G3_DIMENSIONS)
				&& let ChunkPayload::GigDimensions { sample_indices } =
					&self.arena.node(dims).payload
			{
				for &index in sample_indices {
					if let Some(&offset) = pool_offsets.get(index as usize) {
						offsets.push(offset);
					}
				}
			}
		}

		offsets
	}
}
