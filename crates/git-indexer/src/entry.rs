//! In-memory records for every object discovered while streaming a packfile.
//!
//! The source this crate is modelled on recovers a `DeltaEntry` from the objects
//! array by casting a `git_indexer_object_entry*` to a `git_indexer_delta_entry*`,
//! relying on `DeltaEntry` embedding `ObjectEntry` as its first field. We use a
//! tagged enum instead and dispatch on the variant.

use std::collections::HashMap;

use git_hash::ObjectId;
use git_object::ObjectType;

/// A non-delta object located in the packfile.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub kind: ObjectType,
    pub position: u64,
    pub header_size: u32,
    pub size: u64,
    pub crc32: u32,
    pub id: ObjectId,
}

/// Where a delta's base object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaBase {
    /// Absolute offset of the base entry in the same packfile.
    Offset(u64),
    /// Id of a base object that may live outside this packfile.
    Ref(ObjectId),
}

/// A delta-encoded object.
#[derive(Debug, Clone)]
pub struct DeltaEntry {
    pub position: u64,
    pub header_size: u32,
    /// Inflated length of the delta instruction stream (not the resolved object).
    pub size: u64,
    pub crc32: u32,
    pub base: DeltaBase,
    /// Set once the base chain has been walked to a plain object.
    pub final_type: Option<ObjectType>,
    /// Set once the delta has been resolved and hashed.
    pub id: Option<ObjectId>,
}

/// A plain object or a delta, stored uniformly (design note: tagged variant).
#[derive(Debug, Clone)]
pub enum Entry {
    Plain(ObjectEntry),
    Delta(DeltaEntry),
}

impl Entry {
    pub fn position(&self) -> u64 {
        match self {
            Entry::Plain(o) => o.position,
            Entry::Delta(d) => d.position,
        }
    }

    pub fn id(&self) -> Option<ObjectId> {
        match self {
            Entry::Plain(o) => Some(o.id),
            Entry::Delta(d) => d.id,
        }
    }

    pub fn crc32(&self) -> u32 {
        match self {
            Entry::Plain(o) => o.crc32,
            Entry::Delta(d) => d.crc32,
        }
    }
}

/// Backing arena for every entry discovered so far, plus the lookup structures
/// the resolver needs.
///
/// Ownership lives here; `PositionMap` and the delta index list hold plain
/// indices into `objects` rather than their own copies (design note: back-pointers
/// from cached bases are non-owning handles).
#[derive(Default)]
pub struct EntryStore {
    objects: Vec<Entry>,
    positions: HashMap<u64, usize>,
    delta_indices: Vec<usize>,
}

impl EntryStore {
    pub fn with_capacity(entries: u32) -> Self {
        Self {
            objects: Vec::with_capacity(entries as usize),
            positions: HashMap::with_capacity(entries as usize),
            delta_indices: Vec::with_capacity((entries as usize) / 2),
        }
    }

    /// Insert a finished entry, recording its position and (if a delta) adding
    /// it to the delta index list. Returns the index it was stored at.
    pub fn insert(&mut self, entry: Entry) -> usize {
        let index = self.objects.len();
        self.positions.insert(entry.position(), index);
        if matches!(entry, Entry::Delta(_)) {
            self.delta_indices.push(index);
        }
        self.objects.push(entry);
        index
    }

    pub fn get(&self, index: usize) -> &Entry {
        &self.objects[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Entry {
        &mut self.objects[index]
    }

    pub fn index_at_position(&self, position: u64) -> Option<usize> {
        self.positions.get(&position).copied()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn delta_indices(&self) -> &[usize] {
        &self.delta_indices
    }

    /// Iterate entries in insertion (offset-ascending) order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.objects.iter()
    }

    pub fn into_objects(self) -> Vec<Entry> {
        self.objects
    }
}
