//! Public entry point: feed packfile bytes in, get a packfile + index pair out.

use std::path::{Path, PathBuf};

use git_hash::HashAlgorithm;
use git_odb::OdbBackend;
use memmap2::Mmap;

use crate::adapter::EntryAdapter;
use crate::index_writer::{self, IndexEntry};
use crate::progress::Progress;
use crate::resolve::resolve_deltas;
use crate::IndexerError;

/// Tunables for an [`Indexer`] run, mirroring the options a caller of
/// `git index-pack` can set.
pub struct Options {
    /// Hash algorithm the resulting object ids and checksums use.
    pub oid_type: HashAlgorithm,
    /// Filesystem permission bits for the finished pack and index files.
    pub mode: u32,
    /// Object database consulted for thin-pack base objects.
    ///
    /// Reserved: this indexer always rejects REF_DELTA (see
    /// [`IndexerError::Unsupported`]), so no lookups are ever issued through
    /// it yet. Kept so callers that already own an `OdbBackend` can pass it
    /// without churn once thin-pack support lands.
    pub odb: Option<Box<dyn OdbBackend>>,
    /// `fsync` the pack and index files before renaming them into place.
    pub fsync: bool,
    /// Verify the finished pack against its trailer checksum.
    ///
    /// Reserved: no verification pass is implemented yet, so this is only
    /// carried through so callers that already set it (e.g. from a CLI flag)
    /// don't need to special-case this indexer.
    pub verify: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            oid_type: HashAlgorithm::default(),
            mode: 0o444,
            odb: None,
            fsync: false,
            verify: false,
        }
    }
}

/// Streaming driver: accepts packfile bytes via [`Indexer::append`] and, once
/// [`Indexer::commit`] is called, resolves every delta and writes the pack
/// index v2 sidecar next to the packfile.
pub struct Indexer {
    dir: PathBuf,
    algo: HashAlgorithm,
    mode: u32,
    fsync: bool,
    temp: git_utils::tempfile::TempFile,
    adapter: EntryAdapter,
    parser: crate::parser::TokenParser,
    odb: Option<Box<dyn OdbBackend>>,
    verify: bool,
}

impl Indexer {
    /// Begin indexing a new packfile under `parent_dir`.
    pub fn create(
        parent_dir: impl AsRef<Path>,
        mut options: Options,
        progress_cb: Option<Box<dyn FnMut(&Progress) -> bool>>,
    ) -> Result<Self, IndexerError> {
        let dir = parent_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let temp = git_utils::tempfile::TempFile::new_in(&dir)
            .map_err(|e| IndexerError::Protocol(format!("could not create temp pack file: {e}")))?;

        Ok(Self {
            algo: options.oid_type,
            mode: options.mode,
            fsync: options.fsync,
            odb: options.odb.take(),
            verify: options.verify,
            dir,
            temp,
            adapter: EntryAdapter::new(options.oid_type, progress_cb),
            parser: crate::parser::TokenParser::new(options.oid_type),
        })
    }

    /// Override whether the pack and index are fsynced before being renamed
    /// into place.
    pub fn set_fsync(&mut self, fsync: bool) {
        self.fsync = fsync;
    }

    /// Feed the next chunk of packfile bytes.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), IndexerError> {
        use std::io::Write;
        self.temp.write_all(bytes)?;
        self.parser.feed(bytes, &mut self.adapter)
    }

    /// Finish indexing: resolve every delta and write `<name>.pack` /
    /// `<name>.idx` into the directory passed to [`Indexer::create`].
    ///
    /// If `stats` is supplied, it is populated with the final progress
    /// snapshot (including the frozen `total_deltas` and the fully updated
    /// `indexed_deltas`/`indexed_objects`) before this returns.
    ///
    /// Returns the hex object id that names both files.
    pub fn commit(mut self, stats: Option<&mut Progress>) -> Result<String, IndexerError> {
        if !self.adapter.is_complete() {
            let progress = self.adapter.progress();
            return Err(IndexerError::Incomplete {
                received: progress.received_objects,
                expected: progress.total_objects,
            });
        }

        {
            use std::io::Write;
            self.temp
                .file_mut()
                .expect("temp file open during commit")
                .flush()?;
            if self.fsync {
                self.temp
                    .file_mut()
                    .expect("temp file open during commit")
                    .sync_all()?;
            }
        }

        let pack_checksum =
            git_hash::ObjectId::from_bytes(self.adapter.packfile_trailer(), self.algo)?;
        let name = pack_checksum.to_hex();

        let pack_path = self.dir.join(format!("pack-{name}.pack"));
        let idx_path = self.dir.join(format!("pack-{name}.idx"));

        let temp_path = self.temp.path().to_path_buf();
        let file = std::fs::File::open(&temp_path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let (mut store, mut progress, mut progress_cb) = self.adapter.into_parts();
        let mut cache = crate::cache::BaseCache::new();
        let resolved = resolve_deltas(
            &mut store,
            &mmap,
            self.algo,
            &mut cache,
            &mut progress,
            &mut progress_cb,
        );
        if let Some(stats) = stats {
            *stats = progress;
        }
        resolved?;

        let mut entries: Vec<IndexEntry> = Vec::with_capacity(store.len());
        for entry in store.iter() {
            let id = entry
                .id()
                .ok_or_else(|| IndexerError::Protocol("delta left unresolved after resolve_deltas".into()))?;
            entries.push(IndexEntry {
                id,
                offset: entry.position(),
                crc32: entry.crc32(),
            });
        }
        drop(mmap);
        drop(file);

        self.temp
            .persist(&pack_path)
            .map_err(|e| IndexerError::Protocol(format!("could not persist pack file: {e}")))?;
        set_mode(&pack_path, self.mode)?;

        index_writer::write_index(&idx_path, &mut entries, &pack_checksum, self.algo)?;
        set_mode(&idx_path, self.mode)?;

        Ok(name)
    }

    /// Path of the in-progress temp file backing this pack, before its final
    /// name is known. Callers can log it while streaming.
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), IndexerError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), IndexerError> {
    Ok(())
}
