#![allow(missing_docs)]

use riffkit::codec::WaveCodec;
use riffkit::config::ParseOptions;
use riffkit::metadata::MetadataKey;
use riffkit::read::RiffReader;

use byteorder::{BigEndian, WriteBytesExt};

// 44100.0 as an 80-bit extended-precision float
const RATE_44100: [u8; 10] = [0x40, 0x0E, 0xAC, 0x44, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

fn chunk(id: &[u8; 4], content: &[u8]) -> Vec<u8> {
	let mut bytes = Vec::new();
	bytes.extend_from_slice(id);
	bytes.write_u32::<BigEndian>(content.len() as u32).unwrap();
	bytes.extend_from_slice(content);
	if content.len() % 2 == 1 {
		bytes.push(0);
	}
	bytes
}

fn form(form_type: &[u8; 4], chunks: &[u8]) -> Vec<u8> {
	let mut bytes = Vec::new();
	bytes.extend_from_slice(b"FORM");
	bytes
		.write_u32::<BigEndian>(chunks.len() as u32 + 4)
		.unwrap();
	bytes.extend_from_slice(form_type);
	bytes.extend_from_slice(chunks);
	bytes
}

fn comm_plain(channels: u16, sample_size: u16, frames: u32) -> Vec<u8> {
	let mut content = Vec::new();
	content.write_u16::<BigEndian>(channels).unwrap();
	content.write_u32::<BigEndian>(frames).unwrap();
	content.write_u16::<BigEndian>(sample_size).unwrap();
	content.extend_from_slice(&RATE_44100);
	chunk(b"COMM", &content)
}

fn ssnd(payload: &[u8]) -> Vec<u8> {
	let mut content = Vec::new();
	content.write_u32::<BigEndian>(0).unwrap(); // offset
	content.write_u32::<BigEndian>(0).unwrap(); // block size
	content.extend_from_slice(payload);
	chunk(b"SSND", &content)
}

#[test_log::test]
fn plain_aiff_is_pcm() {
	let mut chunks = comm_plain(2, 16, 100);
	chunks.extend_from_slice(&ssnd(&[0; 400]));
	let bytes = form(b"AIFF", &chunks);

	let info = RiffReader::from_vec(bytes, ParseOptions::new())
		.parse()
		.unwrap();
	let audio = info.audio();
	assert_eq!(audio.codec(), WaveCodec::Pcm);
	assert_eq!(audio.channel_count(), 2);
	assert_eq!(audio.bits_per_sample(), 16);
	assert_eq!(audio.sample_rate(), 44100);
	assert_eq!(audio.frame_size(), 4);
	assert!(info.data_chunk().is_some());
}

#[test_log::test]
fn aifc_compression_types() {
	// sowt = little-endian PCM
	let mut content = Vec::new();
	content.write_u16::<BigEndian>(1).unwrap();
	content.write_u32::<BigEndian>(100).unwrap();
	content.write_u16::<BigEndian>(16).unwrap();
	content.extend_from_slice(&RATE_44100);
	content.extend_from_slice(b"sowt");
	content.push(0); // empty pascal compression name
	content.push(0); // pad to even
	let mut chunks = chunk(b"COMM", &content);
	chunks.extend_from_slice(&ssnd(&[0; 200]));
	let bytes = form(b"AIFC", &chunks);

	let info = RiffReader::from_vec(bytes, ParseOptions::new())
		.parse()
		.unwrap();
	assert_eq!(info.audio().codec(), WaveCodec::Pcm);

	// fl32 = IEEE float
	let mut content = Vec::new();
	content.write_u16::<BigEndian>(1).unwrap();
	content.write_u32::<BigEndian>(100).unwrap();
	content.write_u16::<BigEndian>(32).unwrap();
	content.extend_from_slice(&RATE_44100);
	content.extend_from_slice(b"fl32");
	content.push(0);
	content.push(0);
	let mut chunks = chunk(b"COMM", &content);
	chunks.extend_from_slice(&ssnd(&[0; 400]));
	let bytes = form(b"AIFC", &chunks);

	let info = RiffReader::from_vec(bytes, ParseOptions::new())
		.parse()
		.unwrap();
	assert_eq!(info.audio().codec(), WaveCodec::IeeeFloat);
	assert!(info.is_ieee_float());
}

#[test_log::test]
fn text_chunks() {
	let mut chunks = comm_plain(1, 16, 4);
	chunks.extend_from_slice(&ssnd(&[0; 8]));
	chunks.extend_from_slice(&chunk(b"NAME", b"My Sound"));
	chunks.extend_from_slice(&chunk(b"AUTH", b"J. Doe"));
	let bytes = form(b"AIFF", &chunks);

	let info = RiffReader::from_vec(bytes, ParseOptions::new())
		.parse()
		.unwrap();
	assert_eq!(info.metadata().get(MetadataKey::Name), Some("My Sound"));
	assert_eq!(info.metadata().get(MetadataKey::Author), Some("J. Doe"));
}

#[test_log::test]
fn afsp_annotations() {
	// AFsp tools pack key/value records into ANNO, NUL-separated
	let mut chunks = comm_plain(1, 16, 4);
	chunks.extend_from_slice(&ssnd(&[0; 8]));
	chunks.extend_from_slice(&chunk(b"ANNO", b"AFspuser: jdoe\0program: CopyAudio"));
	let bytes = form(b"AIFF", &chunks);

	let info = RiffReader::from_vec(bytes, ParseOptions::new())
		.parse()
		.unwrap();
	assert_eq!(info.metadata().get(MetadataKey::Author), Some("jdoe"));
	assert_eq!(
		info.metadata().get(MetadataKey::Software),
		Some("CopyAudio")
	);
	// No Description entry: the ANNO text was consumed as AFsp records
	assert!(info.metadata().get(MetadataKey::Description).is_none());
}
