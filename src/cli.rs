//! Command line interface definition

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Purser - declarative, idempotent host provisioning
#[derive(Parser, Debug)]
#[command(name = "purser")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a provisioning document to its resource
    Provision {
        /// Path to the document
        file: PathBuf,

        /// Credential store consulted by :inject_passwords
        #[arg(long)]
        credentials: Option<PathBuf>,
    },

    /// Rewrite documents in canonical formatting
    Fmt {
        /// Documents to format
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Only report files whose formatting would change
        #[arg(long)]
        check: bool,
    },

    /// Parse a document and print the canonical tree (debugging)
    Parse {
        /// Path to the document
        file: PathBuf,
    },
}
