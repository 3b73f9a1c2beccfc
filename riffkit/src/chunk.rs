//! The chunk tree built during a parse
//!
//! Nodes live in an arena and refer to each other by index, which keeps upward
//! navigation (`parent`) cheap without ownership cycles.

use crate::error::{ErrorKind, Result, RiffError};
use crate::macros::err;

use std::fmt::{Debug, Display, Formatter};

/// A four-character chunk identifier
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
	/// Create a `FourCc` from a 4-byte string literal
	#[must_use]
	pub const fn new(id: &[u8; 4]) -> Self {
		Self(*id)
	}

	/// The raw bytes of the identifier
	#[must_use]
	pub const fn bytes(self) -> [u8; 4] {
		self.0
	}

	/// Whether all four bytes are NUL
	///
	/// Some writers zero-fill trailing space; a null id marks the end of the
	/// valid data rather than a damaged file.
	#[must_use]
	pub fn is_null(self) -> bool {
		self.0 == [0; 4]
	}

	/// Whether every byte is in the legal chunk-id set
	/// (space, underscore, dash, ASCII alphanumerics)
	#[must_use]
	pub fn is_valid(self) -> bool {
		self.0
			.iter()
			.all(|&b| b == b' ' || b == b'_' || b == b'-' || b.is_ascii_alphanumeric())
	}
}

impl Display for FourCc {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", String::from_utf8_lossy(&self.0))
	}
}

impl Debug for FourCc {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "FourCc({self})")
	}
}

/// Known chunk and list-type identifiers
#[allow(missing_docs)]
pub mod id {
	use super::FourCc;

	pub const RIFF: FourCc = FourCc::new(b"RIFF");
	pub const FORM: FourCc = FourCc::new(b"FORM");

	// Form types
	pub const WAVE: FourCc = FourCc::new(b"WAVE");
	pub const AIFF: FourCc = FourCc::new(b"AIFF");
	pub const AIFC: FourCc = FourCc::new(b"AIFC");
	pub const DLS: FourCc = FourCc::new(b"DLS ");

	pub const LIST: FourCc = FourCc::new(b"LIST");
	pub const INFO: FourCc = FourCc::new(b"INFO");
	pub const ADTL: FourCc = FourCc::new(b"adtl");

	pub const FMT: FourCc = FourCc::new(b"fmt ");
	pub const DATA: FourCc = FourCc::new(b"data");
	pub const FACT: FourCc = FourCc::new(b"fact");
	pub const CUE: FourCc = FourCc::new(b"cue ");
	pub const BEXT: FourCc = FourCc::new(b"bext");
	pub const IXML: FourCc = FourCc::new(b"iXML");
	pub const ACID: FourCc = FourCc::new(b"acid");
	pub const XMP: FourCc = FourCc::new(b"_PMX");
	pub const UMID: FourCc = FourCc::new(b"umid");
	pub const VERS: FourCc = FourCc::new(b"vers");
	pub const ID3_UPPER: FourCc = FourCc::new(b"ID3 ");
	pub const ID3_LOWER: FourCc = FourCc::new(b"id3 ");

	// AIFF
	pub const COMM: FourCc = FourCc::new(b"COMM");
	pub const SSND: FourCc = FourCc::new(b"SSND");
	pub const NAME: FourCc = FourCc::new(b"NAME");
	pub const AUTH: FourCc = FourCc::new(b"AUTH");
	pub const COPYRIGHT: FourCc = FourCc::new(b"(c) ");
	pub const ANNO: FourCc = FourCc::new(b"ANNO");

	// adtl sub-chunks
	pub const LABL: FourCc = FourCc::new(b"labl");
	pub const NOTE: FourCc = FourCc::new(b"note");
	pub const LTXT: FourCc = FourCc::new(b"ltxt");

	// DLS2
	pub const WVPL: FourCc = FourCc::new(b"wvpl");
	pub const WAVE_LIST: FourCc = FourCc::new(b"wave");
	pub const LINS: FourCc = FourCc::new(b"lins");
	pub const INS: FourCc = FourCc::new(b"ins ");
	pub const LRGN: FourCc = FourCc::new(b"lrgn");
	pub const LART: FourCc = FourCc::new(b"lart");
	pub const RGN: FourCc = FourCc::new(b"rgn ");
	pub const RGN2: FourCc = FourCc::new(b"rgn2");
	pub const LAR2: FourCc = FourCc::new(b"lar2");
	pub const LAR3: FourCc = FourCc::new(b"lar3");
	pub const RGNH: FourCc = FourCc::new(b"rgnh");
	pub const WLNK: FourCc = FourCc::new(b"wlnk");
	pub const PTBL: FourCc = FourCc::new(b"ptbl");
	pub const INAM: FourCc = FourCc::new(b"INAM");

	// GigaStudio
	pub const G3_DIMENSIONS: FourCc = FourCc::new(b"3lnk");
	pub const G3_GRI: FourCc = FourCc::new(b"3gri");
	pub const G3_GNL: FourCc = FourCc::new(b"3gnl");
	pub const G3_DNL: FourCc = FourCc::new(b"3dnl");
	pub const G3_PRG: FourCc = FourCc::new(b"3prg");
	pub const G3_EWL: FourCc = FourCc::new(b"3ewl");
	pub const G3_DNM: FourCc = FourCc::new(b"3dnm");
}

/// Index of a chunk node inside a [`ChunkArena`]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ChunkRef(pub(crate) usize);

/// A cue point from a `cue ` chunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CuePoint {
	/// Unique id, shared with the matching `labl`/`note` sub-chunk
	pub id: u32,
	/// Play-order position
	pub position: u32,
	/// The chunk the cue point refers to (`data` in practice)
	pub chunk_id: FourCc,
	/// Byte offset of the target chunk
	pub chunk_start: u32,
	/// Byte offset of the block containing the sample
	pub block_start: u32,
	/// Sample offset of the cue point within the block
	pub sample_offset: u32,
}

/// A low/high range, as used in DLS2 region headers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Range {
	/// Low bound, inclusive
	pub low: u16,
	/// High bound, inclusive
	pub high: u16,
}

/// Chunk-specific decoded content attached to a node
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub enum ChunkPayload {
	/// Nothing decoded (raw payload stays in the file)
	#[default]
	None,
	/// A LIST chunk introduced by `list_type`
	List {
		/// The list-type sub-tag
		list_type: FourCc,
	},
	/// A LIST/INFO sub-chunk value
	Info {
		/// The decoded text
		value: String,
	},
	/// An adtl `labl`/`note` sub-chunk
	Label {
		/// The cue point this label belongs to
		cue_point_id: u32,
		/// Label text
		text: String,
	},
	/// An adtl `ltxt` sub-chunk
	LabeledText {
		/// The cue point this text range belongs to
		cue_point_id: u32,
		/// Length of the described region, in samples
		sample_length: u32,
		/// Purpose id (e.g. `rgn `)
		purpose: FourCc,
		/// Text content
		text: String,
	},
	/// Decoded `cue ` chunk entries
	CuePoints(Vec<CuePoint>),
	/// A DLS2 `wlnk` chunk linking a region to a pool entry
	WaveLink {
		/// fusOptions bit field
		options: u16,
		/// Phase group
		phase_group: u16,
		/// Channel placement
		channel: u32,
		/// Index into the pool table
		table_index: u32,
	},
	/// A DLS2 `rgnh` region header
	RegionHeader {
		/// MIDI key range
		key_range: Range,
		/// Velocity range
		velocity_range: Range,
		/// fusOptions bit field
		options: u16,
		/// Exclusive key group
		key_group: u16,
		/// Layer (absent in some v1 files)
		layer: u16,
	},
	/// A DLS2 `ptbl` pool table
	PoolTable {
		/// Byte offsets of each `wave` list, relative to the `wvpl` chunk
		offsets: Vec<u64>,
	},
	/// A GigaStudio `3lnk` dimension table
	GigDimensions {
		/// Pool-table indices of the dimension samples (-1 entries removed)
		sample_indices: Vec<u32>,
	},
}

/// A node in the chunk tree
#[derive(Clone, Debug)]
pub struct ChunkNode {
	/// Chunk identifier
	pub id: FourCc,
	/// Byte offset of the first content byte
	pub content_start: u64,
	/// Declared content size, excluding the trailing pad byte
	pub content_size: u32,
	/// Parent node, if any
	pub parent: Option<ChunkRef>,
	/// Child nodes, in file order
	pub children: Vec<ChunkRef>,
	/// Decoded chunk-specific content
	pub payload: ChunkPayload,
}

impl ChunkNode {
	/// Offset of the last content byte
	#[must_use]
	pub fn content_end(&self) -> u64 {
		self.content_start + u64::from(self.content_size) - 1
	}

	/// Offset of the first byte after the content
	#[must_use]
	pub fn chunk_end(&self) -> u64 {
		self.content_start + u64::from(self.content_size)
	}
}

/// Arena owning every chunk node of a parsed container
#[derive(Clone, Debug, Default)]
pub struct ChunkArena {
	nodes: Vec<ChunkNode>,
	roots: Vec<ChunkRef>,
	file_len: u64,
}

impl ChunkArena {
	pub(crate) fn new(file_len: u64) -> Self {
		Self {
			nodes: Vec::new(),
			roots: Vec::new(),
			file_len,
		}
	}

	/// Insert a node, validating its bounds
	///
	/// # Errors
	///
	/// * `SizeMismatch` if the chunk end exceeds the file length
	/// * `IncorrectParentSize` if the chunk ends past its parent's end
	pub(crate) fn insert(
		&mut self,
		parent: Option<ChunkRef>,
		id: FourCc,
		content_start: u64,
		content_size: u32,
	) -> Result<ChunkRef> {
		let end = content_start + u64::from(content_size);
		if end > self.file_len {
			err!(SizeMismatch);
		}

		if let Some(parent_ref) = parent {
			let parent_node = &self.nodes[parent_ref.0];
			if end > parent_node.chunk_end() {
				return Err(RiffError::new(ErrorKind::IncorrectParentSize {
					child: id.bytes(),
					parent: parent_node.id.bytes(),
				}));
			}
		}

		let node_ref = ChunkRef(self.nodes.len());
		self.nodes.push(ChunkNode {
			id,
			content_start,
			content_size,
			parent,
			children: Vec::new(),
			payload: ChunkPayload::None,
		});

		match parent {
			Some(parent_ref) => self.nodes[parent_ref.0].children.push(node_ref),
			None => self.roots.push(node_ref),
		}

		Ok(node_ref)
	}

	pub(crate) fn set_payload(&mut self, node: ChunkRef, payload: ChunkPayload) {
		self.nodes[node.0].payload = payload;
	}

	pub(crate) fn set_content_size(&mut self, node: ChunkRef, content_size: u32) {
		self.nodes[node.0].content_size = content_size;
	}

	/// Access a node
	#[must_use]
	pub fn node(&self, node: ChunkRef) -> &ChunkNode {
		&self.nodes[node.0]
	}

	/// Top-level chunks, in file order
	#[must_use]
	pub fn roots(&self) -> &[ChunkRef] {
		&self.roots
	}

	/// Number of nodes in the arena
	#[must_use]
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	/// Whether `node` matches `wanted`, either by chunk id or, for LIST chunks,
	/// by list type
	fn matches(&self, node: ChunkRef, wanted: FourCc) -> bool {
		let n = self.node(node);
		if n.id == wanted {
			return true;
		}

		matches!(n.payload, ChunkPayload::List { list_type } if list_type == wanted)
	}

	/// First top-level chunk matching `id`
	#[must_use]
	pub fn find_root(&self, id: FourCc) -> Option<ChunkRef> {
		self.roots
			.iter()
			.copied()
			.find(|&node| self.matches(node, id))
	}

	/// All top-level chunks matching `id`
	#[must_use]
	pub fn find_roots(&self, id: FourCc) -> Vec<ChunkRef> {
		self.roots
			.iter()
			.copied()
			.filter(|&node| self.matches(node, id))
			.collect()
	}

	/// First child of `parent` matching `id`
	#[must_use]
	pub fn find_child(&self, parent: ChunkRef, id: FourCc) -> Option<ChunkRef> {
		self.node(parent)
			.children
			.iter()
			.copied()
			.find(|&node| self.matches(node, id))
	}

	/// All children of `parent` matching `id`
	#[must_use]
	pub fn find_children(&self, parent: ChunkRef, id: FourCc) -> Vec<ChunkRef> {
		self.node(parent)
			.children
			.iter()
			.copied()
			.filter(|&node| self.matches(node, id))
			.collect()
	}
}
