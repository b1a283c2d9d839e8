//! Delta resolution: after the packfile is complete, walk every delta in base
//! order, materialise its base, apply the delta, and hash the result.
//!
//! The base-chain walk is grounded on `git_pack::pack::PackFile`'s
//! `read_at_offset_with_resolver`: bases are accumulated bottom-up on a `Vec`
//! up to a fixed maximum depth, then deltas are applied in reverse once a
//! plain (or cached) base is reached — no native recursion, so a maliciously
//! deep chain fails with a bounded error instead of overflowing the stack.

use std::io::Read;
use std::sync::Arc;

use git_hash::hasher::Hasher;
use git_hash::HashAlgorithm;
use git_object::ObjectType;

use crate::cache::BaseCache;
use crate::entry::{DeltaBase, Entry, EntryStore};
use crate::progress::Progress;
use crate::IndexerError;

type ProgressCb = Option<Box<dyn FnMut(&Progress) -> bool>>;

fn fire_progress(progress: &Progress, progress_cb: &mut ProgressCb) -> Result<(), IndexerError> {
    if let Some(cb) = progress_cb.as_mut() {
        if !cb(progress) {
            return Err(IndexerError::Cancelled);
        }
    }
    Ok(())
}

#[derive(PartialEq, Eq)]
enum SortKey {
    Ofs(u64),
    Ref(git_hash::ObjectId),
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering::*;
        match (self, other) {
            (SortKey::Ofs(a), SortKey::Ofs(b)) => a.cmp(b),
            (SortKey::Ref(a), SortKey::Ref(b)) => a.cmp(b),
            (SortKey::Ofs(_), SortKey::Ref(_)) => Less,
            (SortKey::Ref(_), SortKey::Ofs(_)) => Greater,
        }
    }
}

fn sort_key(store: &EntryStore, index: usize) -> SortKey {
    match store.get(index) {
        Entry::Delta(d) => match d.base {
            DeltaBase::Offset(off) => SortKey::Ofs(off),
            DeltaBase::Ref(id) => SortKey::Ref(id),
        },
        Entry::Plain(_) => unreachable!("delta index list only references deltas"),
    }
}

fn decompress_exact(compressed: &[u8], expected_size: u64) -> Result<Vec<u8>, IndexerError> {
    let mut decoder = flate2::bufread::ZlibDecoder::new(compressed);
    let mut out = Vec::with_capacity(expected_size as usize);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| IndexerError::Protocol(format!("zlib decode failed: {e}")))?;
    if out.len() as u64 != expected_size {
        return Err(IndexerError::Protocol(format!(
            "decompressed {} bytes, header declared {}",
            out.len(),
            expected_size
        )));
    }
    Ok(out)
}

/// Reconstruct the delta-resolved byte sequence of the entry at `start_position`.
fn materialize(
    store: &EntryStore,
    mmap: &[u8],
    cache: &mut BaseCache,
    start_position: u64,
) -> Result<(ObjectType, Arc<[u8]>), IndexerError> {
    let mut chain: Vec<(u64, u32, u64)> = Vec::new();
    let mut current_position = start_position;

    for _ in 0..git_pack::MAX_DELTA_CHAIN_DEPTH {
        if let Some((kind, bytes)) = cache.get(current_position) {
            return apply_chain(kind, bytes, &chain, mmap);
        }

        let index = store
            .index_at_position(current_position)
            .ok_or_else(|| IndexerError::Protocol(format!("no entry at offset {current_position}")))?;

        match store.get(index) {
            Entry::Plain(obj) => {
                let compressed_start = (obj.position + obj.header_size as u64) as usize;
                let data = decompress_exact(&mmap[compressed_start..], obj.size)?;
                let data: Arc<[u8]> = Arc::from(data.into_boxed_slice());
                cache.insert(obj.position, obj.kind, data.clone());
                return apply_chain(obj.kind, data, &chain, mmap);
            }
            Entry::Delta(delta) => match delta.base {
                DeltaBase::Offset(base_position) => {
                    chain.push((delta.position, delta.header_size, delta.size));
                    current_position = base_position;
                }
                DeltaBase::Ref(id) => {
                    return Err(IndexerError::Unsupported(format!(
                        "REF_DELTA base {id} cannot be resolved without object-database access"
                    )));
                }
            },
        }
    }

    Err(IndexerError::Protocol(format!(
        "delta chain deeper than {} at offset {start_position}",
        git_pack::MAX_DELTA_CHAIN_DEPTH
    )))
}

fn apply_chain(
    base_kind: ObjectType,
    base_bytes: Arc<[u8]>,
    chain: &[(u64, u32, u64)],
    mmap: &[u8],
) -> Result<(ObjectType, Arc<[u8]>), IndexerError> {
    let mut data: Vec<u8> = base_bytes.to_vec();
    for &(position, header_size, declared_size) in chain.iter().rev() {
        let compressed_start = (position + header_size as u64) as usize;
        let delta_bytes = decompress_exact(&mmap[compressed_start..], declared_size)?;
        data = git_pack::delta::apply::apply_delta(&data, &delta_bytes)?;
    }
    Ok((base_kind, Arc::from(data.into_boxed_slice())))
}

fn resolve_one(
    store: &mut EntryStore,
    mmap: &[u8],
    algo: HashAlgorithm,
    cache: &mut BaseCache,
    delta_index: usize,
    progress: &mut Progress,
    progress_cb: &mut ProgressCb,
) -> Result<(), IndexerError> {
    let (position, header_size, declared_size, base) = match store.get(delta_index) {
        Entry::Delta(d) => (d.position, d.header_size, d.size, d.base),
        Entry::Plain(_) => unreachable!("delta index list only references deltas"),
    };

    let base_position = match base {
        DeltaBase::Offset(p) => p,
        DeltaBase::Ref(id) => {
            return Err(IndexerError::Unsupported(format!(
                "REF_DELTA base {id} cannot be resolved without object-database access"
            )))
        }
    };

    let (base_kind, base_bytes) = materialize(store, mmap, cache, base_position)?;
    let compressed_start = (position + header_size as u64) as usize;
    let delta_bytes = decompress_exact(&mmap[compressed_start..], declared_size)?;
    let resolved = git_pack::delta::apply::apply_delta(&base_bytes, &delta_bytes)?;

    let id = Hasher::hash_object(algo, &base_kind.to_string(), &resolved)?;
    cache.insert(position, base_kind, Arc::from(resolved.into_boxed_slice()));

    if let Entry::Delta(d) = store.get_mut(delta_index) {
        d.final_type = Some(base_kind);
        d.id = Some(id);
    }

    progress.indexed_deltas += 1;
    progress.indexed_objects += 1;
    fire_progress(progress, progress_cb)
}

/// Walk every entry in offset order, resolving each OFS_DELTA as soon as its
/// base's position is reached. Fails with `Unsupported` the first time a
/// REF_DELTA surfaces (sorted after every OFS_DELTA, so this only happens
/// once all resolvable work is done).
pub fn resolve_deltas(
    store: &mut EntryStore,
    mmap: &[u8],
    algo: HashAlgorithm,
    cache: &mut BaseCache,
    progress: &mut Progress,
    progress_cb: &mut ProgressCb,
) -> Result<(), IndexerError> {
    progress.total_deltas = progress.total_objects - progress.indexed_objects;

    let mut order: Vec<usize> = store.delta_indices().to_vec();
    order.sort_by_key(|&index| sort_key(store, index));

    let mut cursor = 0usize;
    let len = store.len();
    for i in 0..len {
        let entry_position = store.get(i).position();
        loop {
            if cursor >= order.len() {
                break;
            }
            let delta_index = order[cursor];
            let matches_base = match store.get(delta_index) {
                Entry::Delta(d) => matches!(d.base, DeltaBase::Offset(p) if p == entry_position),
                Entry::Plain(_) => false,
            };
            if !matches_base {
                break;
            }
            resolve_one(store, mmap, algo, cache, delta_index, progress, progress_cb)?;
            cursor += 1;
        }
    }

    if cursor < order.len() {
        return Err(IndexerError::Unsupported(
            "REF_DELTA base resolution is not implemented".into(),
        ));
    }

    Ok(())
}
