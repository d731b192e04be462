//! Command-line argument definitions for the paperdex CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "paperdex")]
#[command(about = "Offline indexing core for a research-paper search engine")]
#[command(
    long_about = "Paperdex builds the binary artifacts behind constant-time postings \
retrieval for a CORD-19-style corpus of research papers.

WORKFLOW:
  1. Build all artifacts:   paperdex build -i dataset/ -o storage/
  2. Inspect an artifact:   paperdex inspect offsets -s storage/
  3. Cross-check a build:   paperdex validate -s storage/

INPUT LAYOUT:
  The dataset root holds pmc_json/ and pdf_json/ directories of per-paper
  JSON files. When both variants exist for a paper, the PMC one wins.

ARTIFACTS (all little-endian, immutable once published):
  lexicon.bin, forward_index.bin, doc_ids.tsv, barrels/barrel_NN.bin,
  barrels/barrel_freq.bin, barrel_mapping.bin, postings_index.bin,
  postings_offsets.bin, heavy/token_<id>.bin, heavy/manifest.json"
)]
#[command(after_help = "EXAMPLES:
  # Full build with defaults (16 barrels, 5% frequent threshold)
  paperdex build -i /data/cord19 -o /data/storage

  # Small test build with a config file and a document cap
  paperdex build -i /data/cord19 -o /tmp/storage -c paperdex.toml --limit 500

  # Show the heaviest postings blocks
  paperdex inspect offsets -s /data/storage --top 20

  # Verify postings against the forward index
  paperdex validate -s /data/storage")]
pub struct Cli {
    /// Enable verbose progress output with timestamps
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every index artifact from a document corpus
    Build {
        /// Dataset root containing pmc_json/ and pdf_json/
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for the published artifacts
        #[arg(short, long)]
        output: PathBuf,

        /// Optional TOML configuration file with an [index] table.
        /// Flags below override values from the file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Regular barrel count (the frequent barrel is one more)
        #[arg(long)]
        num_barrels: Option<u32>,

        /// Corpus fraction above which a token is routed to the
        /// frequent barrel, in (0, 1]
        #[arg(long)]
        freq_threshold: Option<f64>,

        /// Exponent of the rank-to-barrel map
        #[arg(long)]
        barrel_exponent: Option<f64>,

        /// Per-token in-memory postings before spilling to disk
        #[arg(long)]
        spill_threshold: Option<usize>,

        /// Minimum token length in characters
        #[arg(long)]
        min_token_len: Option<usize>,

        /// Extra stop-word file, one word per line
        #[arg(long)]
        stopwords: Option<PathBuf>,

        /// Stop after indexing this many documents (testing aid)
        #[arg(long)]
        limit: Option<usize>,

        /// Progress log interval in documents
        #[arg(long)]
        log_every: Option<usize>,
    },

    /// Print statistics about published artifacts
    #[command(subcommand)]
    Inspect(InspectCommands),

    /// Cross-check published artifacts against each other
    Validate {
        /// Directory holding the published artifacts
        #[arg(short, long)]
        storage: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum InspectCommands {
    /// Vocabulary size and sample tokens
    Lexicon {
        #[arg(short, long)]
        storage: PathBuf,

        /// How many tokens to print
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Tokens per barrel from the assignment mapping
    Mapping {
        #[arg(short, long)]
        storage: PathBuf,
    },

    /// Offsets directory summary and largest postings blocks
    Offsets {
        #[arg(short, long)]
        storage: PathBuf,

        /// How many of the largest blocks to print
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Record counts and byte sizes of each barrel file
    Barrels {
        #[arg(short, long)]
        storage: PathBuf,
    },
}
