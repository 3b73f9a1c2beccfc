//! Contains the errors that can arise within riffkit
//!
//! The primary error is [`RiffError`]. The type of error is determined by [`ErrorKind`],
//! which can be extended at any time.

use std::fmt::{Debug, Display, Formatter};

/// Alias for `Result<T, RiffError>`
pub type Result<T> = std::result::Result<T, RiffError>;

/// The types of errors that can occur
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
	// Container-level errors, fatal for the whole parse
	/// The header or type tag does not describe a RIFF-family audio container
	NotAnAudioContainer,
	/// A read went past the end of the available data
	///
	/// This is fatal when it occurs while reading the container header, and
	/// recoverable (the damaged chunk is skipped) anywhere else.
	TruncatedData,

	// Chunk-level errors, recoverable by the reader
	/// The declared `data` chunk size is not a multiple of the frame size
	///
	/// Downstream PCM consumers reject such files ("partial sample"). The sizes
	/// are reported so callers can decide whether to re-run with repair enabled.
	PartialSampleCount {
		/// The rounded-up size the chunk should declare
		expected: u32,
		/// The size the chunk actually declares
		actual: u32,
	},
	/// A child chunk claims to end past the end of its parent
	IncorrectParentSize {
		/// The id of the offending child
		child: [u8; 4],
		/// The id of the parent chunk
		parent: [u8; 4],
	},
	/// A chunk id contains bytes outside the space/underscore/dash/alnum set
	///
	/// This ends the current scan level, not the whole parse.
	InvalidChunkId([u8; 4]),
	/// Four NUL bytes where a chunk id was expected
	///
	/// Treated as a benign end-of-data marker.
	UnexpectedNullChunk(u64),
	/// A repair write was attempted on a stream opened read-only
	RepairDisabled,
	/// Expected the data to be a different size than provided
	SizeMismatch,
	/// Errors that occur while decoding a container
	FileDecoding(&'static str),
	/// Errors that occur while encoding a container
	FileEncoding(&'static str),

	// Conversions for external errors
	/// Unable to convert bytes to a String
	StringFromUtf8(std::string::FromUtf8Error),
	/// Represents all cases of [`std::io::Error`].
	Io(std::io::Error),
}

/// Errors that could occur within riffkit
pub struct RiffError {
	pub(crate) kind: ErrorKind,
}

impl RiffError {
	/// Create a `RiffError` from an [`ErrorKind`]
	#[must_use]
	pub const fn new(kind: ErrorKind) -> Self {
		Self { kind }
	}

	/// Returns the [`ErrorKind`]
	pub fn kind(&self) -> &ErrorKind {
		&self.kind
	}

	/// Whether this error aborts an entire parse, as opposed to a single chunk
	pub fn is_fatal(&self) -> bool {
		matches!(
			self.kind,
			ErrorKind::NotAnAudioContainer | ErrorKind::Io(_)
		)
	}
}

impl std::error::Error for RiffError {}

impl Debug for RiffError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}", self.kind)
	}
}

impl From<std::io::Error> for RiffError {
	fn from(input: std::io::Error) -> Self {
		Self {
			kind: ErrorKind::Io(input),
		}
	}
}

impl From<std::string::FromUtf8Error> for RiffError {
	fn from(input: std::string::FromUtf8Error) -> Self {
		Self {
			kind: ErrorKind::StringFromUtf8(input),
		}
	}
}

impl Display for RiffError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self.kind {
			// Conversions
			ErrorKind::StringFromUtf8(ref err) => write!(f, "{err}"),
			ErrorKind::Io(ref err) => write!(f, "{err}"),

			ErrorKind::NotAnAudioContainer => {
				write!(f, "Not a RIFF/FORM audio container")
			},
			ErrorKind::TruncatedData => {
				write!(f, "Attempted to read past the end of the available data")
			},
			ErrorKind::PartialSampleCount { expected, actual } => write!(
				f,
				"DATA chunk size mismatch (partial sample). Expected {expected}/0x{expected:X}, \
				 have {actual}/0x{actual:X} bytes"
			),
			ErrorKind::IncorrectParentSize { child, parent } => write!(
				f,
				"Child chunk {} ends outside its parent {}",
				String::from_utf8_lossy(&child),
				String::from_utf8_lossy(&parent)
			),
			ErrorKind::InvalidChunkId(id) => {
				write!(f, "Invalid chunk id {:02X?}", id)
			},
			ErrorKind::UnexpectedNullChunk(offset) => {
				write!(f, "Null chunk id at offset 0x{offset:X}")
			},
			ErrorKind::RepairDisabled => {
				write!(f, "A repair write was attempted, but repair is not permitted")
			},
			ErrorKind::SizeMismatch => write!(
				f,
				"Encountered an invalid item size, either too big or too small to be valid"
			),
			ErrorKind::FileDecoding(description) => write!(f, "{description}"),
			ErrorKind::FileEncoding(description) => write!(f, "{description}"),
		}
	}
}
