//! Plain data snapshot of indexing progress.
//!
//! Deliberately not a rendering widget — `git_utils::progress::Progress` already
//! owns terminal throttling/drawing for the CLI, and is out of scope here
//! (progress-reporting UI is an external collaborator). Callers that want a
//! spinner wrap this struct with their own renderer.

/// A snapshot of how far an [`crate::Indexer`] has progressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub total_objects: u32,
    pub received_objects: u32,
    pub indexed_objects: u32,
    pub total_deltas: u32,
    pub indexed_deltas: u32,
    pub received_bytes: u64,
    /// Reserved for thin-pack completion (Non-goals, SPEC_FULL.md §1); always 0.
    pub local_objects: u32,
}
