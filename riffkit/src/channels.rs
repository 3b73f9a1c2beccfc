//! Speaker-position channel masks, as carried by `WAVE_FORMAT_EXTENSIBLE`

use std::fmt::{Display, Formatter};

macro_rules! define_channels {
	([
		$(
			$name:ident => $shift:literal, $label:literal
		),+
	]) => {
		impl ChannelMask {
			$(
				#[allow(missing_docs)]
				pub const $name: Self = Self(1 << $shift);
			)+
		}

		/// The names of all defined speaker positions, lowest bit first
		const SPEAKER_NAMES: &[(ChannelMask, &str)] = &[
			$(
				(ChannelMask::$name, $label),
			)+
		];
	};
}

/// Channel mask
///
/// A mask of 18 bits, one for each standard WAV speaker position.
///
/// * WAV default channel ordering: <https://learn.microsoft.com/en-us/previous-versions/windows/hardware/design/dn653308(v=vs.85)>
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
#[repr(transparent)]
pub struct ChannelMask(pub(crate) u32);

define_channels! {
	[
		FRONT_LEFT            => 0,  "Front Left",
		FRONT_RIGHT           => 1,  "Front Right",
		FRONT_CENTER          => 2,  "Center",
		LOW_FREQUENCY         => 3,  "Sub Woofer",
		BACK_LEFT             => 4,  "Rear Left",
		BACK_RIGHT            => 5,  "Rear Right",
		FRONT_LEFT_OF_CENTER  => 6,  "Front Left of Center",
		FRONT_RIGHT_OF_CENTER => 7,  "Front Right of Center",
		BACK_CENTER           => 8,  "Rear Center",
		SIDE_LEFT             => 9,  "Side Left",
		SIDE_RIGHT            => 10, "Side Right",
		TOP_CENTER            => 11, "Top Center",
		TOP_FRONT_LEFT        => 12, "Top Front Left",
		TOP_FRONT_CENTER      => 13, "Top Front Center",
		TOP_FRONT_RIGHT       => 14, "Top Front Right",
		TOP_BACK_LEFT         => 15, "Top Rear Left",
		TOP_BACK_CENTER       => 16, "Top Rear Center",
		TOP_BACK_RIGHT        => 17, "Top Rear Right"
	]
}

impl ChannelMask {
	/// Create a mask from raw bits
	#[must_use]
	pub const fn from_bits(bits: u32) -> Self {
		Self(bits)
	}

	/// A single front center channel
	#[must_use]
	pub const fn mono() -> Self {
		Self::FRONT_CENTER
	}

	/// Front left+right channels
	#[must_use]
	pub const fn stereo() -> Self {
		Self(Self::FRONT_LEFT.0 | Self::FRONT_RIGHT.0)
	}

	/// The bit mask
	#[must_use]
	pub const fn bits(self) -> u32 {
		self.0
	}

	/// Whether no speaker bit is set
	#[must_use]
	pub const fn is_empty(self) -> bool {
		self.0 == 0
	}

	/// The conventional mask for a given channel count
	///
	/// Matches the layouts most writers assume when they leave the mask out.
	/// Returns an empty mask for counts with no conventional layout.
	#[must_use]
	pub const fn default_for(channel_count: u16) -> Self {
		match channel_count {
			1 => Self::mono(),
			2 => Self::stereo(),
			3 => Self(Self::FRONT_CENTER.0 | Self::FRONT_LEFT.0 | Self::BACK_RIGHT.0),
			4 => Self(
				Self::FRONT_LEFT.0 | Self::FRONT_RIGHT.0 | Self::BACK_LEFT.0 | Self::BACK_RIGHT.0,
			),
			5 => Self(
				Self::FRONT_CENTER.0
					| Self::FRONT_LEFT.0
					| Self::FRONT_RIGHT.0
					| Self::BACK_LEFT.0
					| Self::BACK_RIGHT.0,
			),
			6 => Self(
				Self::FRONT_CENTER.0
					| Self::BACK_CENTER.0
					| Self::FRONT_LEFT.0
					| Self::FRONT_RIGHT.0
					| Self::BACK_LEFT.0
					| Self::BACK_RIGHT.0,
			),
			_ => Self(0),
		}
	}

	/// The named speaker positions present in this mask, lowest bit first
	pub fn speakers(self) -> impl Iterator<Item = &'static str> {
		SPEAKER_NAMES
			.iter()
			.filter(move |(mask, _)| self.0 & mask.0 != 0)
			.map(|(_, name)| *name)
	}
}

impl Display for ChannelMask {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		let mut first = true;
		for name in self.speakers() {
			if !first {
				write!(f, ",")?;
			}
			write!(f, "{name}")?;
			first = false;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test_log::test]
	fn default_masks() {
		assert_eq!(ChannelMask::default_for(1), ChannelMask::mono());
		assert_eq!(ChannelMask::default_for(2), ChannelMask::stereo());
		assert_eq!(ChannelMask::default_for(6).bits().count_ones(), 6);
		assert!(ChannelMask::default_for(7).is_empty());
	}

	#[test_log::test]
	fn speaker_names() {
		let mask = ChannelMask::from_bits(0b11);
		assert_eq!(mask.to_string(), "Front Left,Front Right");

		let empty = ChannelMask::default();
		assert_eq!(empty.to_string(), "");
	}
}
