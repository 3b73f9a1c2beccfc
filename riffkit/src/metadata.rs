//! Musical and descriptive metadata extracted from a container
//!
//! The map is enum-keyed, string-valued and last-write-wins: later chunks
//! (e.g. an INFO list after a bext) silently replace earlier values, matching
//! how most editors layer their own metadata on top of what they found.

use std::collections::BTreeMap;

/// The metadata fields riffkit extracts
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[non_exhaustive]
pub enum MetadataKey {
	/// Title or embedded filename (`INAM`, AIFF `NAME`)
	Name,
	/// Author (`IAUT`, AIFF `AUTH`, AFsp `user`)
	Author,
	/// Originating vendor or artist (`IART`, bext originator)
	Vendor,
	/// Copyright (`ICOP`, AIFF `(c) `)
	Copyright,
	/// Free-form description (`ICMT`, bext description, AIFF `ANNO`)
	Description,
	/// Creating software (`ISFT`, AFsp `program`)
	Software,
	/// Creation date (`ICRD`, bext origination date)
	Created,
	/// Genre (`IGNR`)
	Genre,
	/// Tempo in BPM, possibly inferred
	Bpm,
	/// Beat count (ACID/iXML)
	Beats,
	/// Bar count derived from beats and meter
	Bars,
	/// MIDI root note (ACID)
	RootNote,
	/// Time signature, formatted `num/den`
	TimeSignature,
	/// Musical key (iXML `MusicalKey`; lowercase = minor)
	Key,
}

/// An ordered, last-write-wins metadata map
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
	fields: BTreeMap<MetadataKey, String>,
}

impl Metadata {
	/// Create an empty map
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert a value, trimming surrounding whitespace; empty values are dropped
	pub fn put(&mut self, key: MetadataKey, value: impl Into<String>) {
		let value = value.into();
		let value = value.trim();
		if value.is_empty() {
			return;
		}

		self.fields.insert(key, value.to_owned());
	}

	/// Insert a BWF-style value, where `_` stands in for spaces
	pub fn put_bwf(&mut self, key: MetadataKey, value: impl Into<String>) {
		let value = value.into().replace('_', " ");
		self.put(key, value);
	}

	/// Look up a field
	#[must_use]
	pub fn get(&self, key: MetadataKey) -> Option<&str> {
		self.fields.get(&key).map(String::as_str)
	}

	/// Number of populated fields
	#[must_use]
	pub fn len(&self) -> usize {
		self.fields.len()
	}

	/// Whether no field is populated
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	/// Absorb every field of `other`, overwriting on conflict
	pub fn merge(&mut self, other: Metadata) {
		self.fields.extend(other.fields);
	}

	/// Iterate over the populated fields in key order
	pub fn iter(&self) -> impl Iterator<Item = (MetadataKey, &str)> {
		self.fields.iter().map(|(k, v)| (*k, v.as_str()))
	}
}
