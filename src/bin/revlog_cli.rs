//! Thin demo binary packaging [`revlog_core`] for manual inspection of a
//! revlog on disk. Everything non-trivial lives in the library; this binary
//! is just argument parsing, a `tracing` subscriber, and a couple of small
//! [`Inspector`] implementations that print to stdout.

use std::io::{self, Write};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use revlog_core::traversal::{self, Inspector, VisitedRevision};
use revlog_core::{RevlogHandle, TIP};

#[derive(Parser)]
#[command(name = "revlog-cli", about = "Inspect Mercurial revlog (.i/.d) files")]
struct Cli {
    /// Raise the log level: once for info, twice for debug.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the number of revisions in the revlog.
    Count {
        index: String,
    },
    /// Print one revision's index-only fields (no payload read).
    Show {
        index: String,
        #[arg(allow_hyphen_values = true)]
        rev: i32,
    },
    /// Reconstruct and print one revision's payload to stdout.
    Cat {
        index: String,
        #[arg(allow_hyphen_values = true)]
        rev: i32,
    },
    /// Walk a range of revisions, printing one summary line per revision.
    Walk {
        index: String,
        #[arg(long, allow_hyphen_values = true)]
        start: Option<i32>,
        #[arg(long, allow_hyphen_values = true)]
        end: Option<i32>,
        /// Reconstruct payloads too (otherwise only the index is walked).
        #[arg(long)]
        data: bool,
    },
    /// Resolve a hex node id to a revision index.
    Find {
        index: String,
        nodeid: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Command::Count { index } => {
            let mut handle = RevlogHandle::open(index);
            println!("{}", handle.count()?);
        }
        Command::Show { index, rev } => {
            let mut handle = RevlogHandle::open(index);
            let ri = handle.resolve_rev(rev)?;
            let (p1, p2) = handle.parents(ri)?;
            println!("revision {ri}");
            println!("  length (uncompressed): {}", handle.data_length(ri)?);
            println!("  base revision:         {}", handle.base_revision(ri)?);
            println!("  link revision:         {}", handle.link_revision(ri)?);
            println!("  parents:               {p1}, {p2}");
            println!("  node id:               {}", hex::encode(handle.node_id(ri)?));
        }
        Command::Cat { index, rev } => {
            let mut handle = RevlogHandle::open(index);
            let ri = handle.resolve_rev(rev)?;
            let mut inspector = CatInspector;
            traversal::iterate_range(&mut handle, ri, ri, true, &mut inspector)?;
        }
        Command::Walk { index, start, end, data } => {
            let mut handle = RevlogHandle::open(index);
            let mut inspector = SummaryInspector;
            traversal::iterate_range(
                &mut handle,
                start.unwrap_or(0),
                end.unwrap_or(TIP),
                data,
                &mut inspector,
            )?;
        }
        Command::Find { index, nodeid } => {
            let mut handle = RevlogHandle::open(index);
            let bytes = hex::decode(&nodeid).map_err(|e| format!("invalid hex node id: {e}"))?;
            let node: [u8; 20] =
                bytes.try_into().map_err(|_| "node id must be exactly 20 bytes (40 hex chars)")?;
            let found = handle.find_revision_index(&node)?;
            println!("{found}");
        }
    }

    Ok(())
}

/// Prints one summary line per visited revision: index, lengths, base/link
/// revisions, and the node id in hex.
struct SummaryInspector;

impl Inspector for SummaryInspector {
    type Error = io::Error;

    fn next(&mut self, rev: VisitedRevision<'_>) -> Result<(), Self::Error> {
        println!(
            "{:>6}  len={:<8} base={:<6} link={:<6} p1={:<6} p2={:<6} node={}",
            rev.ri,
            rev.actual_len,
            rev.base_rev,
            rev.link_rev,
            rev.p1,
            rev.p2,
            hex::encode(rev.node_id),
        );
        Ok(())
    }
}

/// Writes one revision's reconstructed payload straight to stdout.
struct CatInspector;

impl Inspector for CatInspector {
    type Error = io::Error;

    fn next(&mut self, rev: VisitedRevision<'_>) -> Result<(), Self::Error> {
        let bytes = rev
            .payload
            .to_vec()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        io::stdout().write_all(&bytes)
    }
}
