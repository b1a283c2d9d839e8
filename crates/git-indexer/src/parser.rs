//! The low-level packfile token parser.
//!
//! Decodes the packfile wire format incrementally: header, one variable-length
//! entry header per object/delta, and the zlib-compressed body that follows it,
//! tolerating input delivered in arbitrarily small chunks. Emits the event
//! sequence described by [`PackfileEvents`].
//!
//! The per-entry header decode mirrors `git_pack::entry::parse_entry_header`'s
//! bit layout, rewritten to return "need more bytes" rather than erroring when
//! the buffered prefix is incomplete.

use flate2::{Decompress, FlushDecompress, Status};
use git_hash::hasher::Hasher;
use git_hash::{HashAlgorithm, ObjectId};
use git_object::ObjectType;

use crate::IndexerError;

const SCRATCH_SIZE: usize = 8192;

/// Whether a delta references its base by offset or by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    Ofs,
    Ref,
}

/// Sink for packfile token-parser events, bound by the adapter.
///
/// Events arrive in strict order per packfile: exactly one `packfile_header`,
/// then a sequence of `(object_start, object_complete)` or
/// `(delta_start, delta_complete)` totalling `entries` records, then exactly
/// one `packfile_complete`.
pub trait PackfileEvents {
    fn packfile_header(&mut self, version: u32, entries: u32) -> Result<(), IndexerError>;

    fn object_start(
        &mut self,
        position: u64,
        header_size: u32,
        kind: ObjectType,
        size: u64,
    ) -> Result<(), IndexerError>;

    fn object_complete(
        &mut self,
        compressed_size: u64,
        compressed_crc: u32,
        id: ObjectId,
    ) -> Result<(), IndexerError>;

    fn delta_start(
        &mut self,
        position: u64,
        delta_kind: DeltaKind,
        header_size: u32,
        size: u64,
        delta_ref: Option<ObjectId>,
        delta_offset: u64,
    ) -> Result<(), IndexerError>;

    /// No-op in this design: delta bytes are re-read from the mmap during
    /// resolution, so the token parser never calls this in practice.
    fn delta_data(&mut self, _bytes: &[u8]) -> Result<(), IndexerError> {
        Ok(())
    }

    fn delta_complete(&mut self, compressed_size: u64, compressed_crc: u32) -> Result<(), IndexerError>;

    fn packfile_complete(&mut self, trailer: &[u8]) -> Result<(), IndexerError>;
}

enum ParsedKind {
    Plain(ObjectType),
    Ofs { delta_offset: u64 },
    Ref { base_oid: ObjectId },
}

struct ParsedEntryHeader {
    kind: ParsedKind,
    size: u64,
    header_size: u32,
}

/// Try to decode one entry header from the front of `data`.
///
/// Returns `Ok(None)` when `data` is a valid-so-far but incomplete prefix (the
/// caller should wait for more bytes), not an error — distinguishing that from
/// genuine corruption is exactly what `git_pack::entry::parse_entry_header`
/// cannot do, since it assumes the whole header is already available.
fn try_parse_entry_header(
    data: &[u8],
    algo: HashAlgorithm,
) -> Result<Option<ParsedEntryHeader>, IndexerError> {
    if data.is_empty() {
        return Ok(None);
    }

    let mut pos = 0usize;
    let c = data[pos];
    pos += 1;

    let type_num = (c >> 4) & 0x07;
    let mut size: u64 = (c & 0x0f) as u64;
    let mut shift = 4u32;
    let mut byte = c;
    while byte & 0x80 != 0 {
        if pos >= data.len() {
            return Ok(None);
        }
        byte = data[pos];
        pos += 1;
        size |= ((byte & 0x7f) as u64) << shift;
        shift += 7;
    }

    let kind = match type_num {
        1 => ParsedKind::Plain(ObjectType::Commit),
        2 => ParsedKind::Plain(ObjectType::Tree),
        3 => ParsedKind::Plain(ObjectType::Blob),
        4 => ParsedKind::Plain(ObjectType::Tag),
        6 => {
            if pos >= data.len() {
                return Ok(None);
            }
            let mut c = data[pos];
            pos += 1;
            let mut base_offset = (c & 0x7f) as u64;
            while c & 0x80 != 0 {
                if pos >= data.len() {
                    return Ok(None);
                }
                base_offset += 1;
                c = data[pos];
                pos += 1;
                base_offset = (base_offset << 7) + (c & 0x7f) as u64;
            }
            ParsedKind::Ofs { delta_offset: base_offset }
        }
        7 => {
            let hash_len = algo.digest_len();
            if pos + hash_len > data.len() {
                return Ok(None);
            }
            let base_oid = ObjectId::from_bytes(&data[pos..pos + hash_len], algo)
                .map_err(|e| IndexerError::Protocol(format!("invalid ref-delta base id: {e}")))?;
            pos += hash_len;
            ParsedKind::Ref { base_oid }
        }
        other => {
            return Err(IndexerError::Protocol(format!(
                "unknown pack entry type number {other}"
            )))
        }
    };

    Ok(Some(ParsedEntryHeader {
        kind,
        size,
        header_size: pos as u32,
    }))
}

/// Thin wrapper around the raw zlib inflate primitive, matching the abstract
/// decompressor collaborator's `reset`/`set_input`/`get_output`/`eos` shape.
struct Inflater {
    inner: Decompress,
}

impl Inflater {
    fn new() -> Self {
        Self {
            inner: Decompress::new(true),
        }
    }

    /// Feed as much of `input` as will fit, writing decompressed bytes into
    /// `output`. Returns `(bytes consumed, bytes produced, stream ended)`.
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize, bool), IndexerError> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .decompress(input, output, FlushDecompress::None)
            .map_err(|e| IndexerError::Protocol(format!("zlib stream error: {e}")))?;
        let consumed = (self.inner.total_in() - before_in) as usize;
        let produced = (self.inner.total_out() - before_out) as usize;
        Ok((consumed, produced, matches!(status, Status::StreamEnd)))
    }

    fn total_in(&self) -> u64 {
        self.inner.total_in()
    }
}

enum EntryKind {
    Plain(ObjectType),
    Delta,
}

struct BodyState {
    position: u64,
    header_size: u32,
    kind: EntryKind,
    declared_size: u64,
    inflater: Inflater,
    crc: crc32fast::Hasher,
    produced: u64,
    hasher: Option<Hasher>,
    scratch: Box<[u8]>,
}

enum Stage {
    Header,
    EntryHeader,
    Body,
    Trailer,
    Done,
}

/// Incremental packfile decoder. Feed it byte slices in arbitrary chunk sizes
/// via [`TokenParser::feed`]; it emits events to the supplied [`PackfileEvents`]
/// sink as soon as enough bytes have accumulated to make progress.
pub struct TokenParser {
    stage: Stage,
    buf: Vec<u8>,
    window_start: u64,
    algo: HashAlgorithm,
    total_entries: u32,
    entries_done: u32,
    body: Option<BodyState>,
}

impl TokenParser {
    pub fn new(algo: HashAlgorithm) -> Self {
        Self {
            stage: Stage::Header,
            buf: Vec::new(),
            window_start: 0,
            algo,
            total_entries: 0,
            entries_done: 0,
            body: None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.stage, Stage::Done)
    }

    fn drain(&mut self, n: usize) -> Vec<u8> {
        let bytes: Vec<u8> = self.buf.drain(0..n).collect();
        self.window_start += n as u64;
        bytes
    }

    pub fn feed(&mut self, data: &[u8], events: &mut impl PackfileEvents) -> Result<(), IndexerError> {
        self.buf.extend_from_slice(data);

        loop {
            match self.stage {
                Stage::Done => break,

                Stage::Header => {
                    if self.buf.len() < 12 {
                        break;
                    }
                    let header = self.drain(12);
                    if &header[0..4] != b"PACK" {
                        return Err(IndexerError::Protocol("missing PACK signature".into()));
                    }
                    let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
                    let entries = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
                    events.packfile_header(version, entries)?;
                    self.total_entries = entries;
                    self.stage = if entries == 0 { Stage::Trailer } else { Stage::EntryHeader };
                }

                Stage::EntryHeader => {
                    let entry_position = self.window_start;
                    match try_parse_entry_header(&self.buf, self.algo)? {
                        None => break,
                        Some(parsed) => {
                            let header_bytes = self.drain(parsed.header_size as usize);
                            let mut crc = crc32fast::Hasher::new();
                            crc.update(&header_bytes);
                            let scratch = vec![0u8; SCRATCH_SIZE].into_boxed_slice();

                            let (kind, hasher) = match parsed.kind {
                                ParsedKind::Plain(obj_type) => {
                                    events.object_start(
                                        entry_position,
                                        parsed.header_size,
                                        obj_type,
                                        parsed.size,
                                    )?;
                                    let mut h = Hasher::new(self.algo);
                                    h.update(format!("{obj_type} {}\0", parsed.size).as_bytes());
                                    (EntryKind::Plain(obj_type), Some(h))
                                }
                                ParsedKind::Ofs { delta_offset } => {
                                    events.delta_start(
                                        entry_position,
                                        DeltaKind::Ofs,
                                        parsed.header_size,
                                        parsed.size,
                                        None,
                                        delta_offset,
                                    )?;
                                    (EntryKind::Delta, None)
                                }
                                ParsedKind::Ref { base_oid } => {
                                    events.delta_start(
                                        entry_position,
                                        DeltaKind::Ref,
                                        parsed.header_size,
                                        parsed.size,
                                        Some(base_oid),
                                        0,
                                    )?;
                                    (EntryKind::Delta, None)
                                }
                            };

                            self.body = Some(BodyState {
                                position: entry_position,
                                header_size: parsed.header_size,
                                kind,
                                declared_size: parsed.size,
                                inflater: Inflater::new(),
                                crc,
                                produced: 0,
                                hasher,
                                scratch,
                            });
                            self.stage = Stage::Body;
                        }
                    }
                }

                Stage::Body => {
                    if self.buf.is_empty() {
                        break;
                    }
                    let body = self.body.as_mut().expect("body state present in Stage::Body");
                    let (consumed, produced, eos) = body.inflater.decompress(&self.buf, &mut body.scratch)?;
                    if consumed == 0 && !eos {
                        break;
                    }
                    let consumed_bytes = self.drain(consumed);
                    let body = self.body.as_mut().expect("body state present in Stage::Body");
                    body.crc.update(&consumed_bytes);
                    if produced > 0 {
                        if let Some(h) = body.hasher.as_mut() {
                            h.update(&body.scratch[..produced]);
                        }
                        body.produced += produced as u64;
                    }

                    if eos {
                        if let EntryKind::Plain(_) = body.kind {
                            if body.produced != body.declared_size {
                                return Err(IndexerError::Protocol(format!(
                                    "object at {} inflated to {} bytes, header declared {}",
                                    body.position, body.produced, body.declared_size
                                )));
                            }
                        }
                        let body = self.body.take().unwrap();
                        let compressed_size = body.header_size as u64 + body.inflater.total_in();
                        let crc_val = body.crc.finalize();
                        match body.kind {
                            EntryKind::Plain(_) => {
                                let id = body.hasher.unwrap().finalize()?;
                                events.object_complete(compressed_size, crc_val, id)?;
                            }
                            EntryKind::Delta => {
                                events.delta_complete(compressed_size, crc_val)?;
                            }
                        }
                        self.entries_done += 1;
                        self.stage = if self.entries_done == self.total_entries {
                            Stage::Trailer
                        } else {
                            Stage::EntryHeader
                        };
                    }
                }

                Stage::Trailer => {
                    let hash_len = self.algo.digest_len();
                    if self.buf.len() < hash_len {
                        break;
                    }
                    let trailer = self.drain(hash_len);
                    events.packfile_complete(&trailer)?;
                    self.stage = Stage::Done;
                }
            }
        }

        Ok(())
    }
}
