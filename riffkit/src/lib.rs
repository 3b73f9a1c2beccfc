//! Parse, repair, and write RIFF-family audio containers.
//!
//! # Supported Formats
//!
//! | Container   | Form type        | Notes                                         |
//! |-------------|------------------|-----------------------------------------------|
//! | WAV         | `RIFF`/`WAVE`    | PCM, IEEE float, Extensible, BWF, ACID, iXML  |
//! | AIFF / AIFC | `FORM`/`AIF[FC]` | Big-endian sizes, 80-bit float sample rates   |
//! | DLS2        | `RIFF`/`DLS `    | Wave pool, instruments, regions               |
//! | GigaStudio  | `RIFF`/`DLS `    | 64-bit pool offsets, dimension tables         |
//!
//! # Examples
//!
//! ## Reading a file
//!
//! ```rust,no_run
//! # fn main() -> riffkit::error::Result<()> {
//! use riffkit::config::ParseOptions;
//! use riffkit::read::RiffReader;
//!
//! let info = RiffReader::open("drums.wav", ParseOptions::new())?.parse()?;
//!
//! println!(
//! 	"{:?}, {} Hz, {} channels, {}",
//! 	info.audio().codec(),
//! 	info.audio().sample_rate(),
//! 	info.audio().channel_count(),
//! 	info.audio().duration_string()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Repairing a truncated file
//!
//! Some editors write `data` chunks whose declared size cuts a sample frame in
//! half. With [`ParseOptions::allow_repair`](config::ParseOptions::allow_repair)
//! enabled the size field is rounded up in place; otherwise the parse fails
//! with [`ErrorKind::PartialSampleCount`](error::ErrorKind::PartialSampleCount).
//!
//! ```rust,no_run
//! # fn main() -> riffkit::error::Result<()> {
//! use riffkit::config::ParseOptions;
//! use riffkit::read::RiffReader;
//!
//! let options = ParseOptions::new().allow_repair(true);
//! let info = RiffReader::open("damaged.wav", options)?.parse()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Writing a WAV
//!
//! ```rust,no_run
//! # fn main() -> riffkit::error::Result<()> {
//! use riffkit::write::{FmtDescriptor, RiffWriter};
//!
//! let mut writer = RiffWriter::create("out.wav")?;
//! writer.write_fmt(&FmtDescriptor::pcm(2, 44100, 16))?;
//! writer.write_data(&[0u8; 44100 * 4])?;
//! writer.finalize()?;
//! # Ok(())
//! # }
//! ```

pub mod channels;
pub mod chunk;
pub mod codec;
pub mod config;
pub mod error;
pub mod info;
pub mod io;
pub(crate) mod macros;
pub mod metadata;
pub mod pcm;
pub mod read;
pub mod write;

pub use crate::info::{AudioStreamInfo, RiffFileInfo};
pub use crate::read::RiffReader;
pub use crate::write::RiffWriter;

pub mod prelude {
	//! A prelude for commonly used items in the library.
	//!
	//! This module is intended to be wildcard imported.
	//!
	//! ```rust
	//! use riffkit::prelude::*;
	//! ```

	pub use crate::config::ParseOptions;
	pub use crate::info::{AudioStreamInfo, Instrument, RiffFileInfo};
	pub use crate::metadata::MetadataKey;
	pub use crate::read::RiffReader;
	pub use crate::write::{FmtDescriptor, Marker, RiffWriter};
}
