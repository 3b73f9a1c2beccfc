#![allow(missing_docs)]

use riffkit::chunk::{ChunkPayload, FourCc, id};
use riffkit::codec::{WaveCodec, guids};
use riffkit::config::ParseOptions;
use riffkit::metadata::MetadataKey;
use riffkit::read::RiffReader;
use riffkit::write::{FmtDescriptor, Marker, RiffWriter};

use std::fs;
use std::io::Cursor;

use byteorder::{LittleEndian, WriteBytesExt};

fn written(writer: RiffWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
	writer.finalize().unwrap().into_inner()
}

#[test_log::test]
fn writer_output_parses_back() {
	let mut writer = RiffWriter::new(Cursor::new(Vec::new())).unwrap();
	writer.write_fmt(&FmtDescriptor::pcm(2, 44100, 16)).unwrap();
	writer.write_data(&vec![0; 44100 * 4]).unwrap();
	writer
		.write_markers(&[
			Marker {
				label: String::from("verse"),
				sample_position: 22050,
			},
			Marker {
				label: String::from("intro"),
				sample_position: 0,
			},
		])
		.unwrap();
	writer
		.write_info_list(&[(id::INAM, "My Loop"), (FourCc::new(b"ISFT"), "riffkit")])
		.unwrap();
	let bytes = written(writer);

	let info = RiffReader::from_vec(bytes, ParseOptions::new())
		.parse()
		.unwrap();
	let audio = info.audio();
	assert_eq!(audio.codec(), WaveCodec::Pcm);
	assert_eq!(audio.channel_count(), 2);
	assert_eq!(audio.sample_rate(), 44100);
	assert_eq!(audio.sample_count(), 44100);
	assert_eq!(info.filename(), Some("My Loop"));
	assert_eq!(info.metadata().get(MetadataKey::Software), Some("riffkit"));

	// Cue points come back sorted, ids assigned from 1
	let cue = info.chunk(id::CUE).expect("cue chunk");
	let ChunkPayload::CuePoints(points) = &info.chunks().node(cue).payload else {
		panic!("cue chunk not decoded");
	};
	assert_eq!(points.len(), 2);
	assert_eq!(points[0].id, 1);
	assert_eq!(points[0].sample_offset, 0);
	assert_eq!(points[1].sample_offset, 22050);

	// Labels share the cue point ids
	let adtl = info.chunk(id::ADTL).expect("adtl list");
	let labels = info.chunks().find_children(adtl, id::LABL);
	assert_eq!(labels.len(), 2);
	let ChunkPayload::Label { cue_point_id, text } = &info.chunks().node(labels[0]).payload
	else {
		panic!("labl not decoded");
	};
	assert_eq!(*cue_point_id, 1);
	assert_eq!(text, "intro");
}

#[test_log::test]
fn extensible_guid_round_trip() {
	let mut writer = RiffWriter::new(Cursor::new(Vec::new())).unwrap();
	writer
		.write_fmt(&FmtDescriptor::extensible(
			6,
			48000,
			24,
			guids::KSDATAFORMAT_SUBTYPE_PCM,
		))
		.unwrap();
	writer.write_data(&vec![0; 6 * 3 * 480]).unwrap();
	let bytes = written(writer);

	let info = RiffReader::from_vec(bytes, ParseOptions::new())
		.parse()
		.unwrap();
	let audio = info.audio();
	assert_eq!(audio.codec(), WaveCodec::Extensible);
	assert_eq!(audio.sub_codec(), Some(guids::KSDATAFORMAT_SUBTYPE_PCM));
	assert!(audio.is_pcm());
	assert!(!audio.is_ieee_float());
	// 6 channels with a mask means the speaker assignment is known
	assert!(!audio.missing_channel_assignment());
	assert!(audio.channel_mask().is_some());
}

#[test_log::test]
fn ixml_tempo_round_trip() {
	let xml = "<BWFXML><STEINBERG>\
		<ATTR><NAME>MusicalTempo</NAME><TYPE>float</TYPE><VALUE>98.5</VALUE></ATTR>\
		</STEINBERG></BWFXML>";

	let mut writer = RiffWriter::new(Cursor::new(Vec::new())).unwrap();
	writer.write_fmt(&FmtDescriptor::pcm(1, 48000, 16)).unwrap();
	writer.write_data(&[0; 9600]).unwrap();
	writer.write_ixml(xml).unwrap();
	let bytes = written(writer);

	let info = RiffReader::from_vec(bytes, ParseOptions::new())
		.parse()
		.unwrap();
	assert!((info.audio().tempo() - 98.5).abs() < 1e-9);
	// An explicit tempo lands on the descriptor only; BPM metadata is
	// reserved for values the reader had to infer
	assert!(info.metadata().get(MetadataKey::Bpm).is_none());
}

#[test_log::test]
fn prolog_and_epilog_reconstruct_the_container() {
	let mut writer = RiffWriter::new(Cursor::new(Vec::new())).unwrap();
	writer.write_fmt(&FmtDescriptor::pcm(1, 8000, 16)).unwrap();
	writer.write_data(&[0x11; 64]).unwrap();
	writer.write_ixml("<BWFXML></BWFXML>").unwrap();
	let bytes = written(writer);

	let info = RiffReader::from_vec(bytes.clone(), ParseOptions::new())
		.parse()
		.unwrap();
	let data = info.data_chunk().expect("data chunk");
	let content_start = info.chunks().node(data).content_start as usize;
	let chunk_end = info.chunks().node(data).chunk_end() as usize;

	// The compressed blobs expand to exactly the bytes around the payload
	assert_eq!(info.prolog_bytes().unwrap(), &bytes[..content_start]);
	assert_eq!(info.epilog_bytes().unwrap(), &bytes[chunk_end..]);

	// Stitching prolog + payload + epilog back together yields the input
	let mut rebuilt = info.prolog_bytes().unwrap();
	rebuilt.extend_from_slice(&bytes[content_start..chunk_end]);
	rebuilt.extend_from_slice(&info.epilog_bytes().unwrap());
	assert_eq!(rebuilt, bytes);
}

#[test_log::test]
fn repair_patches_the_file_on_disk() {
	// A 16-bit stereo WAV whose data chunk declares 7 bytes: a partial frame
	let mut bytes = Vec::new();
	bytes.extend_from_slice(b"RIFF");
	bytes.write_u32::<LittleEndian>(44).unwrap();
	bytes.extend_from_slice(b"WAVE");
	bytes.extend_from_slice(b"fmt ");
	bytes.write_u32::<LittleEndian>(16).unwrap();
	bytes.write_u16::<LittleEndian>(0x01).unwrap();
	bytes.write_u16::<LittleEndian>(2).unwrap();
	bytes.write_u32::<LittleEndian>(44100).unwrap();
	bytes.write_u32::<LittleEndian>(44100 * 4).unwrap();
	bytes.write_u16::<LittleEndian>(4).unwrap();
	bytes.write_u16::<LittleEndian>(16).unwrap();
	bytes.extend_from_slice(b"data");
	bytes.write_u32::<LittleEndian>(7).unwrap();
	bytes.extend_from_slice(&[0; 7]);
	bytes.push(0); // pad

	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("partial.wav");
	fs::write(&path, &bytes).unwrap();

	// Without repair the parse must refuse the file
	let result = RiffReader::open(&path, ParseOptions::new()).unwrap().parse();
	assert!(result.is_err());

	let info = RiffReader::open(&path, ParseOptions::new().allow_repair(true))
		.unwrap()
		.parse()
		.unwrap();
	assert_eq!(info.audio().audio_byte_count(), 8);

	// The size field (offset 40) was rounded up to the next whole frame
	let patched = fs::read(&path).unwrap();
	assert_eq!(&patched[40..44], &8u32.to_le_bytes());

	// The repaired file parses cleanly without repair permission
	let info = RiffReader::open(&path, ParseOptions::new()).unwrap().parse().unwrap();
	assert_eq!(info.audio().sample_count(), 2);
}

#[test_log::test]
fn post_parse_file_operations() {
	let payload: Vec<u8> = (0u16..96).map(|i| (i % 251) as u8).collect();

	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("source.wav");
	let mut writer = RiffWriter::create(&path).unwrap();
	writer.write_fmt(&FmtDescriptor::pcm(2, 22050, 16)).unwrap();
	writer.write_data(&payload).unwrap();
	writer.finalize().unwrap();

	let info = RiffReader::open(&path, ParseOptions::new())
		.unwrap()
		.parse()
		.unwrap();

	// The checksum matches an independent CRC32 of the payload
	let mut crc = flate2::Crc::new();
	crc.update(&payload);
	let expected = format!("{:08X}", crc.sum());
	assert_eq!(info.audio_checksum(info.audio()).unwrap(), expected);

	// stream_chunk delivers the payload in bounded blocks
	let data = info.data_chunk().unwrap();
	let mut streamed = Vec::new();
	let mut largest_block = 0;
	info.stream_chunk(data, 40, &mut |block| {
		largest_block = largest_block.max(block.len());
		streamed.extend_from_slice(block);
		Ok(())
	})
	.unwrap();
	assert_eq!(streamed, payload);
	assert!(largest_block <= 40);

	// extract produces a standalone WAV with the same format and samples
	let extracted_path = dir.path().join("extracted.wav");
	info.extract(info.audio(), &extracted_path).unwrap();
	let extracted = RiffReader::open(&extracted_path, ParseOptions::new())
		.unwrap()
		.parse()
		.unwrap();
	assert_eq!(extracted.audio().sample_rate(), 22050);
	assert_eq!(extracted.audio().channel_count(), 2);
	assert_eq!(extracted.audio().audio_byte_count(), payload.len() as u32);
	assert_eq!(extracted.audio_checksum(extracted.audio()).unwrap(), expected);
}

#[test_log::test]
fn in_memory_descriptors_have_no_file_operations() {
	let mut writer = RiffWriter::new(Cursor::new(Vec::new())).unwrap();
	writer.write_fmt(&FmtDescriptor::pcm(1, 8000, 16)).unwrap();
	writer.write_data(&[0; 32]).unwrap();
	let bytes = written(writer);

	let info = RiffReader::from_vec(bytes, ParseOptions::new())
		.parse()
		.unwrap();
	assert!(info.audio_checksum(info.audio()).is_err());
}

#[test_log::test]
fn hound_reads_our_files() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("for_hound.wav");

	let mut writer = RiffWriter::create(&path).unwrap();
	writer.write_fmt(&FmtDescriptor::pcm(2, 44100, 16)).unwrap();
	writer.write_data(&vec![0; 44100 * 4]).unwrap();
	writer.finalize().unwrap();

	let hound_reader = hound::WavReader::open(&path).unwrap();
	let spec = hound_reader.spec();
	assert_eq!(spec.channels, 2);
	assert_eq!(spec.sample_rate, 44100);
	assert_eq!(spec.bits_per_sample, 16);
	assert_eq!(spec.sample_format, hound::SampleFormat::Int);
	assert_eq!(hound_reader.duration(), 44100);
}

#[test_log::test]
fn we_read_hound_files() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("from_hound.wav");

	let spec = hound::WavSpec {
		channels: 1,
		sample_rate: 8000,
		bits_per_sample: 16,
		sample_format: hound::SampleFormat::Int,
	};
	let mut hound_writer = hound::WavWriter::create(&path, spec).unwrap();
	for i in 0..800i16 {
		hound_writer.write_sample(i).unwrap();
	}
	hound_writer.finalize().unwrap();

	let info = RiffReader::open(&path, ParseOptions::new())
		.unwrap()
		.parse()
		.unwrap();
	let audio = info.audio();
	assert_eq!(audio.codec(), WaveCodec::Pcm);
	assert_eq!(audio.channel_count(), 1);
	assert_eq!(audio.sample_rate(), 8000);
	assert_eq!(audio.bits_per_sample(), 16);
	assert_eq!(audio.sample_count(), 800);
	assert_eq!(info.filename(), Some("from_hound.wav"));
}
