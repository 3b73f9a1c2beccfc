#![allow(missing_docs)]

use riffkit::chunk::{ChunkPayload, id};
use riffkit::config::ParseOptions;
use riffkit::read::RiffReader;

use byteorder::{LittleEndian, WriteBytesExt};

fn chunk(chunk_id: &[u8; 4], content: &[u8]) -> Vec<u8> {
	let mut bytes = Vec::new();
	bytes.extend_from_slice(chunk_id);
	bytes
		.write_u32::<LittleEndian>(content.len() as u32)
		.unwrap();
	bytes.extend_from_slice(content);
	if content.len() % 2 == 1 {
		bytes.push(0);
	}
	bytes
}

fn list(list_type: &[u8; 4], children: &[u8]) -> Vec<u8> {
	let mut content = Vec::new();
	content.extend_from_slice(list_type);
	content.extend_from_slice(children);
	chunk(b"LIST", &content)
}

fn fmt_pcm(channels: u16, sample_rate: u32, bits: u16) -> Vec<u8> {
	let block_align = channels * bits / 8;
	let mut content = Vec::new();
	content.write_u16::<LittleEndian>(0x01).unwrap();
	content.write_u16::<LittleEndian>(channels).unwrap();
	content.write_u32::<LittleEndian>(sample_rate).unwrap();
	content
		.write_u32::<LittleEndian>(sample_rate * u32::from(block_align))
		.unwrap();
	content.write_u16::<LittleEndian>(block_align).unwrap();
	content.write_u16::<LittleEndian>(bits).unwrap();
	chunk(b"fmt ", &content)
}

fn info_list(name: &[u8]) -> Vec<u8> {
	list(b"INFO", &chunk(b"INAM", name))
}

fn region(table_index: u32) -> Vec<u8> {
	let mut rgnh = Vec::new();
	for value in [0u16, 127, 0, 127, 0, 0, 0] {
		rgnh.write_u16::<LittleEndian>(value).unwrap();
	}

	let mut wlnk = Vec::new();
	wlnk.write_u16::<LittleEndian>(0).unwrap(); // options
	wlnk.write_u16::<LittleEndian>(0).unwrap(); // phase group
	wlnk.write_u32::<LittleEndian>(0).unwrap(); // channel
	wlnk.write_u32::<LittleEndian>(table_index).unwrap();

	let mut children = chunk(b"rgnh", &rgnh);
	children.extend_from_slice(&chunk(b"wlnk", &wlnk));
	list(b"rgn ", &children)
}

// One instrument collection: a sample-less "Kit" group followed by two
// instruments whose regions link into the pool table
fn dls_container() -> Vec<u8> {
	// vers is read as release, build, major, minor
	let vers = chunk(b"vers", &[1, 0, 2, 0, 0, 0, 0, 0]);

	let kit = list(b"ins ", &info_list(b"Kit\0"));

	let kick = {
		let mut children = info_list(b"Kick");
		children.extend_from_slice(&list(b"lrgn", &region(0)));
		list(b"ins ", &children)
	};
	let snare = {
		let mut children = info_list(b"Snare");
		children.extend_from_slice(&list(b"lrgn", &region(1)));
		list(b"ins ", &children)
	};

	let mut instruments = kit;
	instruments.extend_from_slice(&kick);
	instruments.extend_from_slice(&snare);
	let lins = list(b"lins", &instruments);

	let wave1 = {
		let mut children = fmt_pcm(1, 22050, 16);
		children.extend_from_slice(&chunk(b"data", &[0; 8]));
		list(b"wave", &children)
	};
	let wave2 = {
		let mut children = fmt_pcm(2, 44100, 16);
		children.extend_from_slice(&chunk(b"data", &[0; 16]));
		list(b"wave", &children)
	};
	// Pool offsets point at the LIST header of each wave list, relative to the
	// first byte after the wvpl type tag
	let wave2_offset = wave1.len() as u32;
	let mut pool = wave1;
	pool.extend_from_slice(&wave2);
	let wvpl = list(b"wvpl", &pool);

	let mut ptbl_content = Vec::new();
	ptbl_content.write_u32::<LittleEndian>(8).unwrap(); // cbSize
	ptbl_content.write_u32::<LittleEndian>(2).unwrap(); // entry count
	ptbl_content.write_u32::<LittleEndian>(0).unwrap();
	ptbl_content.write_u32::<LittleEndian>(wave2_offset).unwrap();
	let ptbl = chunk(b"ptbl", &ptbl_content);

	let mut chunks = vers;
	chunks.extend_from_slice(&lins);
	chunks.extend_from_slice(&ptbl);
	chunks.extend_from_slice(&wvpl);

	let mut bytes = Vec::new();
	bytes.extend_from_slice(b"RIFF");
	bytes
		.write_u32::<LittleEndian>(chunks.len() as u32 + 4)
		.unwrap();
	bytes.extend_from_slice(b"DLS ");
	bytes.extend_from_slice(&chunks);
	bytes
}

#[test_log::test]
fn wave_pool_streams() {
	let info = RiffReader::from_vec(dls_container(), ParseOptions::new())
		.parse()
		.unwrap();

	assert_eq!(info.files().len(), 2);
	assert_eq!(info.files()[0].sample_rate(), 22050);
	assert_eq!(info.files()[0].channel_count(), 1);
	assert_eq!(info.files()[0].audio_byte_count(), 8);
	assert_eq!(info.files()[0].sample_count(), 4);
	assert_eq!(info.files()[1].sample_rate(), 44100);
	assert_eq!(info.files()[1].channel_count(), 2);

	let version = info.version();
	assert_eq!(version.major, 2);
	assert_eq!(version.release, 1);
}

#[test_log::test]
fn pool_table_offsets() {
	let info = RiffReader::from_vec(dls_container(), ParseOptions::new())
		.parse()
		.unwrap();

	let ptbl = info.chunk(id::PTBL).expect("ptbl chunk");
	let ChunkPayload::PoolTable { offsets } = &info.chunks().node(ptbl).payload else {
		panic!("ptbl not decoded");
	};
	assert_eq!(offsets.len(), 2);
	assert_eq!(offsets[0], 0);
}

#[test_log::test]
fn instruments_link_regions_to_samples() {
	let info = RiffReader::from_vec(dls_container(), ParseOptions::new())
		.parse()
		.unwrap();

	// The sample-less "Kit" entry became the group of the two that follow
	let instruments = info.instruments();
	assert_eq!(instruments.len(), 2);
	assert_eq!(instruments[0].name, "Kick");
	assert_eq!(instruments[0].path, "Kit");
	assert_eq!(instruments[0].sample_indices, vec![0]);
	assert_eq!(instruments[1].name, "Snare");
	assert_eq!(instruments[1].path, "Kit");
	assert_eq!(instruments[1].sample_indices, vec![1]);

	// Every pool entry is referenced by some region
	assert!(info.files().iter().all(riffkit::AudioStreamInfo::used));
}

#[test_log::test]
fn wave_list_inam_names_only_that_stream() {
	let wave1 = {
		let mut children = info_list(b"kick.wav");
		children.extend_from_slice(&fmt_pcm(1, 22050, 16));
		children.extend_from_slice(&chunk(b"data", &[0; 8]));
		list(b"wave", &children)
	};
	let wave2 = {
		let mut children = fmt_pcm(2, 44100, 16);
		children.extend_from_slice(&chunk(b"data", &[0; 16]));
		list(b"wave", &children)
	};
	let mut pool = wave1;
	pool.extend_from_slice(&wave2);
	let wvpl = list(b"wvpl", &pool);

	let mut bytes = Vec::new();
	bytes.extend_from_slice(b"RIFF");
	bytes
		.write_u32::<LittleEndian>(wvpl.len() as u32 + 4)
		.unwrap();
	bytes.extend_from_slice(b"DLS ");
	bytes.extend_from_slice(&wvpl);

	let info = RiffReader::from_vec(bytes, ParseOptions::new())
		.parse()
		.unwrap();

	// The INAM inside a wave list names that pool entry, nothing else
	assert_eq!(info.files().len(), 2);
	assert_eq!(info.files()[0].filename(), Some("kick.wav"));
	assert!(info.files()[1].filename().is_none());
	assert!(info.filename().is_none());
}

#[test_log::test]
fn region_headers_are_decoded() {
	let info = RiffReader::from_vec(dls_container(), ParseOptions::new())
		.parse()
		.unwrap();

	let lins = info.chunk(id::LINS).expect("lins list");
	let ins_chunks = info.chunks().find_children(lins, id::INS);
	assert_eq!(ins_chunks.len(), 3);

	let lrgn = info.chunks().find_child(ins_chunks[1], id::LRGN).unwrap();
	let rgn = info.chunks().find_child(lrgn, id::RGN).unwrap();
	let rgnh = info.chunks().find_child(rgn, id::RGNH).unwrap();
	let ChunkPayload::RegionHeader {
		key_range,
		velocity_range,
		..
	} = &info.chunks().node(rgnh).payload
	else {
		panic!("rgnh not decoded");
	};
	assert_eq!((key_range.low, key_range.high), (0, 127));
	assert_eq!((velocity_range.low, velocity_range.high), (0, 127));
}
