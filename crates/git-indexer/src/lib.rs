//! Streaming packfile indexer.
//!
//! Consumes a packfile byte stream incrementally, resolves every delta once
//! the stream is complete, and writes the matching pack index v2 sidecar —
//! the same job `git index-pack` does, exposed as a library so callers (the
//! transport layer receiving a pack over the wire, or the CLI) can feed bytes
//! as they arrive instead of buffering the whole pack first.

mod adapter;
mod cache;
mod entry;
mod index_writer;
mod indexer;
mod parser;
mod progress;
mod resolve;

pub use adapter::EntryAdapter;
pub use cache::BaseCache;
pub use entry::{DeltaBase, DeltaEntry, Entry, EntryStore, ObjectEntry};
pub use indexer::{Indexer, Options};
pub use parser::{DeltaKind, PackfileEvents, TokenParser};
pub use progress::Progress;
pub use resolve::resolve_deltas;

/// Errors that can occur while indexing a packfile.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// The packfile's bytes violate the wire format.
    #[error("packfile protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// `commit` was called before the declared number of entries arrived.
    #[error("packfile ended before all {received}/{expected} entries arrived")]
    Incomplete { received: u32, expected: u32 },

    /// The pack requires something this indexer deliberately does not do,
    /// such as resolving a REF_DELTA against an external object database.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Reserved for parity with the allocation-failure case in the system
    /// this design is modelled on; Rust's allocator aborts the process
    /// instead of returning an error, so this variant is never constructed.
    #[error("allocation failed")]
    Allocation,

    /// The caller's progress callback returned `false`.
    #[error("indexing cancelled by caller")]
    Cancelled,

    #[error(transparent)]
    Pack(#[from] git_pack::PackError),

    #[error(transparent)]
    Hash(#[from] git_hash::HashError),
}
