//! Emits the pack index v2 sidecar file.
//!
//! Grounded directly on `git_pack::write::build_pack_index`, which already
//! uses the canonical `0x8000_0000 | idx` overflow sentinel (the source this
//! spec was distilled from has a well-known bug here — a 40-bit literal —
//! that the teacher's own writer never reproduced). Generalised to an
//! arbitrary hash algorithm rather than a hardcoded SHA-1, and to take the
//! packfile trailer captured during streaming rather than re-reading it off
//! disk.

use std::path::{Path, PathBuf};

use git_hash::hasher::Hasher;
use git_hash::{HashAlgorithm, ObjectId};

use git_pack::{IDX_SIGNATURE, IDX_VERSION};

use crate::IndexerError;

/// One row of the table this writer emits: `(id, packfile offset, CRC32)`.
pub struct IndexEntry {
    pub id: ObjectId,
    pub offset: u64,
    pub crc32: u32,
}

/// Write `<packfile_path>.idx`. `entries` need not be pre-sorted; they are
/// sorted by id here. `pack_checksum` is the trailer captured while streaming
/// the packfile (not re-derived from disk).
pub fn write_index(
    idx_path: &Path,
    entries: &mut [IndexEntry],
    pack_checksum: &ObjectId,
    algo: HashAlgorithm,
) -> Result<PathBuf, IndexerError> {
    entries.sort_by(|a, b| a.id.cmp(&b.id));

    let mut buf = Vec::new();

    buf.extend_from_slice(&IDX_SIGNATURE);
    buf.extend_from_slice(&IDX_VERSION.to_be_bytes());

    let mut fanout = [0u32; 256];
    for entry in entries.iter() {
        fanout[entry.id.first_byte() as usize] += 1;
    }
    for i in 1..256 {
        fanout[i] += fanout[i - 1];
    }
    for count in fanout {
        buf.extend_from_slice(&count.to_be_bytes());
    }

    for entry in entries.iter() {
        buf.extend_from_slice(entry.id.as_bytes());
    }

    for entry in entries.iter() {
        buf.extend_from_slice(&entry.crc32.to_be_bytes());
    }

    let mut large_offsets: Vec<u64> = Vec::new();
    for entry in entries.iter() {
        if entry.offset >= 0x8000_0000 {
            let idx = large_offsets.len() as u32;
            buf.extend_from_slice(&(0x8000_0000u32 | idx).to_be_bytes());
            large_offsets.push(entry.offset);
        } else {
            buf.extend_from_slice(&(entry.offset as u32).to_be_bytes());
        }
    }

    for offset in &large_offsets {
        buf.extend_from_slice(&offset.to_be_bytes());
    }

    buf.extend_from_slice(pack_checksum.as_bytes());

    let mut hasher = Hasher::new(algo);
    hasher.update(&buf);
    let idx_checksum = hasher.finalize()?;
    buf.extend_from_slice(idx_checksum.as_bytes());

    std::fs::write(idx_path, &buf)?;
    Ok(idx_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_hash::hasher::Hasher as HashHasher;

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes(&[byte; 20], HashAlgorithm::Sha1).unwrap()
    }

    #[test]
    fn fanout_counts_are_cumulative() {
        let dir = tempfile::tempdir().unwrap();
        let idx_path = dir.path().join("test.idx");
        let mut entries = vec![
            IndexEntry { id: oid(0x05), offset: 12, crc32: 1 },
            IndexEntry { id: oid(0x05), offset: 50, crc32: 2 },
            IndexEntry { id: oid(0xf0), offset: 80, crc32: 3 },
        ];
        let checksum = HashHasher::digest(HashAlgorithm::Sha1, b"pack bytes").unwrap();
        write_index(&idx_path, &mut entries, &checksum, HashAlgorithm::Sha1).unwrap();

        let data = std::fs::read(&idx_path).unwrap();
        assert_eq!(&data[0..4], &IDX_SIGNATURE);
        assert_eq!(u32::from_be_bytes([data[4], data[5], data[6], data[7]]), 2);

        let fanout_at = |b: usize| {
            let start = 8 + b * 4;
            u32::from_be_bytes([data[start], data[start + 1], data[start + 2], data[start + 3]])
        };
        assert_eq!(fanout_at(0x04), 0);
        assert_eq!(fanout_at(0x05), 2);
        assert_eq!(fanout_at(0xf0), 3);
        assert_eq!(fanout_at(0xff), 3);
    }

    #[test]
    fn large_offset_uses_high_bit_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let idx_path = dir.path().join("test.idx");
        let big_offset = 0x1_0000_0005u64;
        let mut entries = vec![
            IndexEntry { id: oid(0x01), offset: 12, crc32: 1 },
            IndexEntry { id: oid(0x02), offset: big_offset, crc32: 2 },
        ];
        let checksum = HashHasher::digest(HashAlgorithm::Sha1, b"pack bytes").unwrap();
        write_index(&idx_path, &mut entries, &checksum, HashAlgorithm::Sha1).unwrap();

        let data = std::fs::read(&idx_path).unwrap();
        let num_objects = 2usize;
        let oid_len = 20usize;
        let offset_table_start = 8 + 256 * 4 + num_objects * oid_len + num_objects * 4;
        let second_offset_bytes = &data[offset_table_start + 4..offset_table_start + 8];
        let raw = u32::from_be_bytes(second_offset_bytes.try_into().unwrap());
        assert_eq!(raw, 0x8000_0000);

        let long_table_start = offset_table_start + num_objects * 4;
        let long_bytes = &data[long_table_start..long_table_start + 8];
        assert_eq!(u64::from_be_bytes(long_bytes.try_into().unwrap()), big_offset);
    }
}
