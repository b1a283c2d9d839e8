use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use git_indexer::{Indexer, Options};

use crate::Cli;

#[derive(Args)]
pub struct IndexPackArgs {
    /// Be verbose
    #[arg(short, long)]
    verbose: bool,

    /// Write the index to the specified file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep the pack file after indexing (write a .keep file)
    #[arg(long)]
    keep: bool,

    /// Keep message
    #[arg(long = "keep", value_name = "MSG")]
    keep_msg: Option<String>,

    /// Verify the pack after indexing
    #[arg(long)]
    verify: bool,

    /// Strict mode: check objects more carefully
    #[arg(long)]
    strict: bool,

    /// Perform fsck checks on objects
    #[arg(long)]
    fsck_objects: bool,

    /// Read pack from stdin
    #[arg(long)]
    stdin: bool,

    /// Fix a thin pack (add missing base objects)
    #[arg(long)]
    fix_thin: bool,

    /// Generate a reverse index
    #[arg(long = "rev-index")]
    rev_index: bool,

    /// Pack file path
    pack_file: Option<PathBuf>,
}

const CHUNK_SIZE: usize = 64 * 1024;

pub fn run(args: &IndexPackArgs, _cli: &Cli) -> Result<i32> {
    let stderr = io::stderr();
    let mut err = stderr.lock();

    if args.fix_thin {
        bail!("fix-thin packs require object-database access, which this indexer does not perform");
    }

    let mut source: Box<dyn Read> = if args.stdin {
        Box::new(io::stdin())
    } else if let Some(ref path) = args.pack_file {
        Box::new(std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?)
    } else {
        bail!("need a pack file or --stdin");
    };

    let dest_dir = match (&args.pack_file, args.stdin) {
        (Some(path), false) => path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
        _ => std::env::current_dir()?,
    };

    let options = Options {
        verify: args.verify,
        ..Options::default()
    };
    let mut indexer = Indexer::create(&dest_dir, options, None).context("starting packfile indexer")?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total_read = 0u64;
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        indexer.append(&buf[..n])?;
        total_read += n as u64;
    }

    if args.verbose {
        writeln!(err, "read {total_read} bytes")?;
    }

    let mut stats = git_indexer::Progress::default();
    let name = indexer
        .commit(Some(&mut stats))
        .context("resolving deltas and writing index")?;
    let pack_checksum = git_hash::ObjectId::from_hex(&name)?;

    if args.verbose {
        writeln!(
            err,
            "indexed pack {name} ({} objects, {} deltas)",
            stats.indexed_objects, stats.indexed_deltas
        )?;
    }

    if let Some(ref output) = args.output {
        std::fs::copy(dest_dir.join(format!("pack-{name}.idx")), output)?;
    }

    if args.verify {
        // No pack verification pass is implemented yet; --verify is accepted
        // and threaded through to the indexer but performs no checks.
        if args.verbose {
            writeln!(err, "skipping pack verification (not yet implemented)")?;
        }
    }

    if args.keep || args.keep_msg.is_some() {
        let keep_path = dest_dir.join(format!("pack-{name}.keep"));
        let msg = args.keep_msg.as_deref().unwrap_or("");
        std::fs::write(&keep_path, msg)?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "pack\t{}", pack_checksum.to_hex())?;

    Ok(0)
}
