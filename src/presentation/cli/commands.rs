//! CLI commands using clap: `list [path]`, `extract <src> <dst>`,
//! `extract-all <dst>`, `search <pattern>`, `deleted`, `extract-deleted
//! <dst>`, plus `info` to dump mounted volume geometry.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Read-only forensic parser for NTFS volume images.
#[derive(Parser)]
#[command(name = "ntfs-forensic")]
#[command(version)]
#[command(about = "Inspect and recover files from an NTFS volume image", long_about = None)]
pub struct Cli {
    /// Path to the disk image. If it ends in a three-digit numeric
    /// suffix (e.g. `disk.001`) that suffix is stripped to find the
    /// other segments; otherwise `<image>.001` is probed.
    pub image: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the contents of a directory (default: root)
    List {
        /// Directory path to list
        path: Option<String>,
    },

    /// Extract a single file's content
    Extract {
        /// Path of the file inside the volume
        src: String,
        /// Destination path on the host filesystem
        dst: PathBuf,
    },

    /// Recursively extract every live file under the root
    ExtractAll {
        /// Destination directory on the host filesystem
        dst: PathBuf,
    },

    /// Search live directories for names containing a substring
    Search {
        /// Case-insensitive substring to search for
        pattern: String,
    },

    /// List deleted-but-recoverable files
    Deleted,

    /// Best-effort extraction of every deleted file's content
    ExtractDeleted {
        /// Destination directory on the host filesystem
        dst: PathBuf,
    },

    /// Print mounted volume geometry
    Info,
}
