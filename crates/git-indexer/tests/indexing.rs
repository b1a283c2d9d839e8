//! End-to-end tests: stream real packfile bytes through `Indexer` and read
//! the result back with `git_pack::pack::PackFile`.

use std::io::Write;

use git_hash::{hasher::Hasher, HashAlgorithm};
use git_indexer::{Indexer, IndexerError, Options};
use git_object::ObjectType;
use git_pack::pack::PackFile;
use git_pack::write::{create_pack, PackWriter};

fn feed_in_chunks(indexer: &mut Indexer, bytes: &[u8], chunk: usize) {
    for window in bytes.chunks(chunk.max(1)) {
        indexer.append(window).unwrap();
    }
}

#[test]
fn plain_pack_roundtrip() {
    let src_dir = tempfile::tempdir().unwrap();
    let objects = vec![
        (ObjectType::Blob, b"alpha".to_vec()),
        (ObjectType::Blob, b"beta".to_vec()),
        (ObjectType::Tree, b"tree contents".to_vec()),
    ];
    let (pack_path, _, _) = create_pack(src_dir.path(), "src", &objects).unwrap();
    let pack_bytes = std::fs::read(&pack_path).unwrap();

    let out_dir = tempfile::tempdir().unwrap();
    let mut indexer = Indexer::create(out_dir.path(), Options::default(), None).unwrap();
    feed_in_chunks(&mut indexer, &pack_bytes, 4096);
    let name = indexer.commit(None).unwrap();

    let pack = PackFile::open(out_dir.path().join(format!("pack-{name}.pack"))).unwrap();
    assert_eq!(pack.num_objects(), 3);

    for (obj_type, data) in &objects {
        let oid = Hasher::hash_object(HashAlgorithm::Sha1, &obj_type.to_string(), data).unwrap();
        let obj = pack.read_object(&oid).unwrap().unwrap();
        assert_eq!(obj.obj_type, *obj_type);
        assert_eq!(obj.data, *data);
    }
}

#[test]
fn byte_at_a_time_feed_produces_same_name_as_bulk_feed() {
    let src_dir = tempfile::tempdir().unwrap();
    let objects = vec![(ObjectType::Blob, b"streamed one byte at a time".to_vec())];
    let (pack_path, _, _) = create_pack(src_dir.path(), "src", &objects).unwrap();
    let pack_bytes = std::fs::read(&pack_path).unwrap();

    let bulk_dir = tempfile::tempdir().unwrap();
    let mut bulk = Indexer::create(bulk_dir.path(), Options::default(), None).unwrap();
    bulk.append(&pack_bytes).unwrap();
    let bulk_name = bulk.commit(None).unwrap();

    let trickle_dir = tempfile::tempdir().unwrap();
    let mut trickle = Indexer::create(trickle_dir.path(), Options::default(), None).unwrap();
    feed_in_chunks(&mut trickle, &pack_bytes, 1);
    let trickle_name = trickle.commit(None).unwrap();

    assert_eq!(bulk_name, trickle_name);
}

#[test]
fn commit_before_all_entries_arrive_is_incomplete() {
    let src_dir = tempfile::tempdir().unwrap();
    let objects = vec![
        (ObjectType::Blob, b"alpha".to_vec()),
        (ObjectType::Blob, b"beta".to_vec()),
    ];
    let (pack_path, _, _) = create_pack(src_dir.path(), "src", &objects).unwrap();
    let pack_bytes = std::fs::read(&pack_path).unwrap();

    let out_dir = tempfile::tempdir().unwrap();
    let mut indexer = Indexer::create(out_dir.path(), Options::default(), None).unwrap();
    // Feed everything except the trailing checksum and part of the last object.
    indexer.append(&pack_bytes[..pack_bytes.len() - 25]).unwrap();

    let err = indexer.commit(None).unwrap_err();
    assert!(matches!(err, IndexerError::Incomplete { .. }));
}

#[test]
fn ref_delta_is_unsupported_at_commit() {
    let dir = tempfile::tempdir().unwrap();
    let pack_path = dir.path().join("refdelta.pack");

    let base_content = b"hello world";
    let target_content = b"hello world!";
    let base_oid = Hasher::hash_object(HashAlgorithm::Sha1, "blob", base_content).unwrap();
    let target_oid = Hasher::hash_object(HashAlgorithm::Sha1, "blob", target_content).unwrap();

    let mut writer = PackWriter::new(&pack_path).unwrap();
    writer.add_object(ObjectType::Blob, base_content).unwrap();
    let delta_instrs = {
        let mut d = Vec::new();
        d.push(base_content.len() as u8);
        d.push(target_content.len() as u8);
        d.push(0x80 | 0x01 | 0x10);
        d.push(0);
        d.push(base_content.len() as u8);
        d.push(1);
        d.push(b'!');
        d
    };
    writer.add_delta(base_oid, target_oid, &delta_instrs).unwrap();
    let (pack_path, _checksum) = writer.finish().unwrap();
    let pack_bytes = std::fs::read(&pack_path).unwrap();

    let out_dir = tempfile::tempdir().unwrap();
    let mut indexer = Indexer::create(out_dir.path(), Options::default(), None).unwrap();
    indexer.append(&pack_bytes).unwrap();

    let err = indexer.commit(None).unwrap_err();
    assert!(matches!(err, IndexerError::Unsupported(_)));
}

#[test]
fn cancelling_progress_callback_stops_indexing_before_commit() {
    let src_dir = tempfile::tempdir().unwrap();
    let objects = vec![(ObjectType::Blob, b"watch me get cancelled".to_vec())];
    let (pack_path, _, _) = create_pack(src_dir.path(), "src", &objects).unwrap();
    let pack_bytes = std::fs::read(&pack_path).unwrap();

    let out_dir = tempfile::tempdir().unwrap();
    let cb: Box<dyn FnMut(&git_indexer::Progress) -> bool> = Box::new(|_p| false);
    let mut indexer = Indexer::create(out_dir.path(), Options::default(), Some(cb)).unwrap();

    let err = indexer.append(&pack_bytes).unwrap_err();
    assert!(matches!(err, IndexerError::Cancelled));
    assert!(!out_dir.path().join("pack-0000000000000000000000000000000000000000.idx").exists());
}

#[test]
fn cancelling_progress_callback_stops_delta_resolution_during_commit() {
    // One plain base object plus one OFS_DELTA against it: two `append`-time
    // progress calls (object_complete, delta_complete), then one more for
    // the resolved delta during `commit`. Cancel on that third call so the
    // cancellation surfaces from `commit`, not `append`.
    let dir = tempfile::tempdir().unwrap();
    let pack_path = dir.path().join("cancel_during_commit.pack");

    let base_content = b"hello world";
    let mut writer = PackWriter::new(&pack_path).unwrap();
    writer.add_object(ObjectType::Blob, base_content).unwrap();
    let (pack_path, _checksum) = writer.finish().unwrap();
    let mut pack_bytes = std::fs::read(&pack_path).unwrap();

    pack_bytes.truncate(pack_bytes.len() - 20);

    let delta_offset_from_start = 12u64;
    let delta_position = pack_bytes.len() as u64;
    let rel_offset = delta_position - delta_offset_from_start;

    let delta_instrs = {
        let mut d = Vec::new();
        d.push(base_content.len() as u8);
        d.push((base_content.len() + 1) as u8);
        d.push(0x80 | 0x01 | 0x10);
        d.push(0);
        d.push(base_content.len() as u8);
        d.push(1);
        d.push(b'!');
        d
    };
    let delta_header = git_pack::entry::encode_entry_header(6, delta_instrs.len() as u64);
    let ofs_bytes = git_pack::entry::encode_ofs_delta_offset(rel_offset);
    let mut compressed = Vec::new();
    {
        let mut enc = flate2::write::ZlibEncoder::new(&mut compressed, flate2::Compression::default());
        enc.write_all(&delta_instrs).unwrap();
        enc.finish().unwrap();
    }

    pack_bytes.extend_from_slice(&delta_header);
    pack_bytes.extend_from_slice(&ofs_bytes);
    pack_bytes.extend_from_slice(&compressed);

    let total_objects = 2u32;
    pack_bytes[8..12].copy_from_slice(&total_objects.to_be_bytes());

    let mut hasher = Hasher::new(HashAlgorithm::Sha1);
    hasher.update(&pack_bytes);
    let trailer = hasher.finalize().unwrap();
    pack_bytes.extend_from_slice(trailer.as_bytes());

    let out_dir = tempfile::tempdir().unwrap();
    let mut calls = 0u32;
    let cb: Box<dyn FnMut(&git_indexer::Progress) -> bool> = Box::new(move |_p| {
        calls += 1;
        calls < 3
    });
    let mut indexer = Indexer::create(out_dir.path(), Options::default(), Some(cb)).unwrap();
    indexer.append(&pack_bytes).unwrap();

    let mut stats = git_indexer::Progress::default();
    let err = indexer.commit(Some(&mut stats)).unwrap_err();
    assert!(matches!(err, IndexerError::Cancelled));
    assert_eq!(stats.indexed_deltas, 1);
    assert_eq!(stats.total_deltas, 1);
    assert!(!out_dir
        .path()
        .join(format!("pack-{}.idx", "0".repeat(40)))
        .exists());
}

#[test]
fn multi_byte_ofs_delta_resolves_through_real_stream() {
    // Build a pack with one base blob, a run of filler blobs pushing the
    // delta's offset above the single-byte-offset varint range, then an
    // OFS_DELTA entry against the base.
    let dir = tempfile::tempdir().unwrap();
    let pack_path = dir.path().join("big.pack");

    let base_content = b"hello world";
    let mut writer = PackWriter::new(&pack_path).unwrap();
    writer.add_object(ObjectType::Blob, base_content).unwrap();
    for i in 0..50u32 {
        writer
            .add_object(ObjectType::Blob, format!("filler blob number {i}").as_bytes())
            .unwrap();
    }
    let (pack_path, _checksum) = writer.finish().unwrap();
    let mut pack_bytes = std::fs::read(&pack_path).unwrap();

    // Strip the trailer so we can append a hand-built OFS_DELTA entry, then
    // recompute the trailer hash over the whole buffer.
    pack_bytes.truncate(pack_bytes.len() - 20);

    let delta_offset_from_start = 12u64; // base sits right after the 12-byte header
    let delta_position = pack_bytes.len() as u64;
    let rel_offset = delta_position - delta_offset_from_start;

    let delta_instrs = {
        let mut d = Vec::new();
        d.push(base_content.len() as u8);
        d.push((base_content.len() + 1) as u8);
        d.push(0x80 | 0x01 | 0x10);
        d.push(0);
        d.push(base_content.len() as u8);
        d.push(1);
        d.push(b'!');
        d
    };
    let delta_header = git_pack::entry::encode_entry_header(6, delta_instrs.len() as u64);
    let ofs_bytes = git_pack::entry::encode_ofs_delta_offset(rel_offset);
    let mut compressed = Vec::new();
    {
        let mut enc = flate2::write::ZlibEncoder::new(&mut compressed, flate2::Compression::default());
        enc.write_all(&delta_instrs).unwrap();
        enc.finish().unwrap();
    }

    pack_bytes.extend_from_slice(&delta_header);
    pack_bytes.extend_from_slice(&ofs_bytes);
    pack_bytes.extend_from_slice(&compressed);

    // Fix up the object count in the header (base + 50 filler + 1 delta).
    let total_objects = 52u32;
    pack_bytes[8..12].copy_from_slice(&total_objects.to_be_bytes());

    let mut hasher = Hasher::new(HashAlgorithm::Sha1);
    hasher.update(&pack_bytes);
    let trailer = hasher.finalize().unwrap();
    pack_bytes.extend_from_slice(trailer.as_bytes());

    let out_dir = tempfile::tempdir().unwrap();
    let mut indexer = Indexer::create(out_dir.path(), Options::default(), None).unwrap();
    indexer.append(&pack_bytes).unwrap();
    let name = indexer.commit(None).unwrap();

    let pack = PackFile::open(out_dir.path().join(format!("pack-{name}.pack"))).unwrap();
    assert_eq!(pack.num_objects(), 52);

    let target_oid = Hasher::hash_object(HashAlgorithm::Sha1, "blob", b"hello world!").unwrap();
    let obj = pack.read_object(&target_oid).unwrap().unwrap();
    assert_eq!(obj.data, b"hello world!");
}
