//! Translates token-parser events into entry-store mutations.

use git_hash::{HashAlgorithm, ObjectId};
use git_object::ObjectType;

use crate::entry::{DeltaBase, DeltaEntry, Entry, EntryStore, ObjectEntry};
use crate::parser::{DeltaKind, PackfileEvents};
use crate::progress::Progress;
use crate::IndexerError;

enum PartialEntry {
    Object {
        position: u64,
        header_size: u32,
        kind: ObjectType,
        size: u64,
    },
    Delta {
        position: u64,
        header_size: u32,
        size: u64,
        base: DeltaBase,
    },
}

/// Binds the five (or seven) token-parser events to entry-store mutations,
/// per the event/action table in SPEC_FULL.md §4.2.
pub struct EntryAdapter {
    store: EntryStore,
    progress: Progress,
    algo: HashAlgorithm,
    started: bool,
    complete: bool,
    packfile_trailer: Vec<u8>,
    current: Option<PartialEntry>,
    progress_cb: Option<Box<dyn FnMut(&Progress) -> bool>>,
}

impl EntryAdapter {
    pub fn new(algo: HashAlgorithm, progress_cb: Option<Box<dyn FnMut(&Progress) -> bool>>) -> Self {
        Self {
            store: EntryStore::default(),
            progress: Progress::default(),
            algo,
            started: false,
            complete: false,
            packfile_trailer: Vec::new(),
            current: None,
            progress_cb,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn packfile_trailer(&self) -> &[u8] {
        &self.packfile_trailer
    }

    /// Consume the adapter, handing ownership of its entry store, accumulated
    /// progress, and progress callback to the resolver so delta resolution
    /// can keep driving the same counters and cancellation hook `append` used.
    pub fn into_parts(
        self,
    ) -> (
        EntryStore,
        Progress,
        Option<Box<dyn FnMut(&Progress) -> bool>>,
    ) {
        (self.store, self.progress, self.progress_cb)
    }

    fn fire_progress(&mut self) -> Result<(), IndexerError> {
        if let Some(cb) = self.progress_cb.as_mut() {
            if !cb(&self.progress) {
                return Err(IndexerError::Cancelled);
            }
        }
        Ok(())
    }
}

impl PackfileEvents for EntryAdapter {
    fn packfile_header(&mut self, _version: u32, entries: u32) -> Result<(), IndexerError> {
        if self.started {
            return Err(IndexerError::Protocol("packfile_header received twice".into()));
        }
        self.store = EntryStore::with_capacity(entries);
        self.progress.total_objects = entries;
        self.started = true;
        Ok(())
    }

    fn object_start(
        &mut self,
        position: u64,
        header_size: u32,
        kind: ObjectType,
        size: u64,
    ) -> Result<(), IndexerError> {
        self.current = Some(PartialEntry::Object {
            position,
            header_size,
            kind,
            size,
        });
        Ok(())
    }

    fn object_complete(
        &mut self,
        _compressed_size: u64,
        compressed_crc: u32,
        id: ObjectId,
    ) -> Result<(), IndexerError> {
        let current = self
            .current
            .take()
            .ok_or_else(|| IndexerError::Protocol("object_complete without object_start".into()))?;
        let PartialEntry::Object {
            position,
            header_size,
            kind,
            size,
        } = current
        else {
            return Err(IndexerError::Protocol(
                "object_complete following a delta_start".into(),
            ));
        };

        self.store.insert(Entry::Plain(ObjectEntry {
            kind,
            position,
            header_size,
            size,
            crc32: compressed_crc,
            id,
        }));
        self.progress.received_objects += 1;
        self.progress.indexed_objects += 1;
        self.fire_progress()
    }

    fn delta_start(
        &mut self,
        position: u64,
        delta_kind: DeltaKind,
        header_size: u32,
        size: u64,
        delta_ref: Option<ObjectId>,
        delta_offset: u64,
    ) -> Result<(), IndexerError> {
        let base = match delta_kind {
            DeltaKind::Ref => DeltaBase::Ref(
                delta_ref.ok_or_else(|| IndexerError::Protocol("ref delta missing base id".into()))?,
            ),
            DeltaKind::Ofs => {
                if delta_offset > position {
                    return Err(IndexerError::Protocol(format!(
                        "OFS_DELTA at {position} has delta_offset {delta_offset} exceeding its own position"
                    )));
                }
                DeltaBase::Offset(position - delta_offset)
            }
        };

        self.current = Some(PartialEntry::Delta {
            position,
            header_size,
            size,
            base,
        });
        Ok(())
    }

    fn delta_complete(&mut self, _compressed_size: u64, compressed_crc: u32) -> Result<(), IndexerError> {
        let current = self
            .current
            .take()
            .ok_or_else(|| IndexerError::Protocol("delta_complete without delta_start".into()))?;
        let PartialEntry::Delta {
            position,
            header_size,
            size,
            base,
        } = current
        else {
            return Err(IndexerError::Protocol(
                "delta_complete following an object_start".into(),
            ));
        };

        self.store.insert(Entry::Delta(DeltaEntry {
            position,
            header_size,
            size,
            crc32: compressed_crc,
            base,
            final_type: None,
            id: None,
        }));
        self.progress.received_objects += 1;
        self.fire_progress()
    }

    fn packfile_complete(&mut self, trailer: &[u8]) -> Result<(), IndexerError> {
        let expected = self.algo.digest_len();
        if trailer.len() != expected {
            return Err(IndexerError::Protocol(format!(
                "trailer length {} does not match hash size {expected}",
                trailer.len()
            )));
        }
        self.packfile_trailer = trailer.to_vec();
        self.complete = true;
        Ok(())
    }
}
