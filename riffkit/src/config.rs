//! Options to control how riffkit parses a container

/// Options to control how riffkit parses a container
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct ParseOptions {
	pub(crate) allow_repair: bool,
	pub(crate) read_metadata: bool,
}

impl Default for ParseOptions {
	/// The default implementation for `ParseOptions`
	///
	/// The defaults are as follows:
	///
	/// ```rust,ignore
	/// ParseOptions {
	/// 	allow_repair: false,
	/// 	read_metadata: true,
	/// }
	/// ```
	fn default() -> Self {
		Self::new()
	}
}

impl ParseOptions {
	/// Creates a new `ParseOptions`, alias for `Default` implementation
	///
	/// See also: [`ParseOptions::default`]
	///
	/// # Examples
	///
	/// ```rust
	/// use riffkit::config::ParseOptions;
	///
	/// let parsing_options = ParseOptions::new();
	/// ```
	#[must_use]
	pub const fn new() -> Self {
		Self {
			allow_repair: false,
			read_metadata: true,
		}
	}

	/// Whether the reader may patch the source file in place
	///
	/// The only write the reader ever performs is the `data` chunk size fix when
	/// a partial trailing sample is detected. With repair disabled, that
	/// condition surfaces as [`ErrorKind::PartialSampleCount`](crate::error::ErrorKind::PartialSampleCount)
	/// instead.
	///
	/// # Examples
	///
	/// ```rust
	/// use riffkit::config::ParseOptions;
	///
	/// // By default, `allow_repair` is disabled. Here, we want damaged files fixed.
	/// let parsing_options = ParseOptions::new().allow_repair(true);
	/// ```
	pub fn allow_repair(&mut self, allow_repair: bool) -> Self {
		self.allow_repair = allow_repair;
		*self
	}

	/// Whether or not to extract textual metadata (INFO lists, bext, iXML, ACID…)
	///
	/// Structural information (chunk tree, codec, stream layout) is always read.
	///
	/// # Examples
	///
	/// ```rust
	/// use riffkit::config::ParseOptions;
	///
	/// // By default, `read_metadata` is enabled. Here, we only care about structure.
	/// let parsing_options = ParseOptions::new().read_metadata(false);
	/// ```
	pub fn read_metadata(&mut self, read_metadata: bool) -> Self {
		self.read_metadata = read_metadata;
		*self
	}
}
