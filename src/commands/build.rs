//! Build command handler: merge configuration and run the pipeline.

use anyhow::Result;
use std::path::{Path, PathBuf};

use paperdex::config::{parse_config, IndexConfig};
use paperdex::pipeline;

/// Flag overrides collected from the command line; `None` keeps the config
/// file (or default) value.
pub struct BuildOverrides {
    pub num_barrels: Option<u32>,
    pub freq_threshold: Option<f64>,
    pub barrel_exponent: Option<f64>,
    pub spill_threshold: Option<usize>,
    pub min_token_len: Option<usize>,
    pub stopwords: Option<PathBuf>,
    pub limit: Option<usize>,
    pub log_every: Option<usize>,
}

pub fn run_build(
    input: &Path,
    output: &Path,
    config_file: Option<&Path>,
    overrides: BuildOverrides,
) -> Result<()> {
    let mut config = match config_file {
        Some(path) => parse_config(path)?,
        None => IndexConfig::default(),
    };
    apply_overrides(&mut config, overrides);
    config.validate()?;

    let stats = pipeline::run(input, output, &config)?;

    println!("Build complete: {}", output.display());
    println!(
        "  documents indexed: {} ({} skipped)",
        stats.forward.documents_indexed, stats.forward.documents_skipped
    );
    println!("  vocabulary size:   {}", stats.lexicon.vocab_size);
    println!("  total tokens:      {}", stats.forward.total_tokens);
    println!(
        "  barrel records:    {} ({} frequent tokens)",
        stats.barrels.records_written, stats.barrels.special_tokens
    );
    println!(
        "  postings blocks:   {} ({} postings, {} bytes, {} spills)",
        stats.postings.tokens_emitted,
        stats.postings.postings_written,
        stats.postings.index_bytes,
        stats.postings.spill_operations
    );
    println!(
        "  heavy extracts:    {} ({} bytes)",
        stats.heavy.tokens_extracted, stats.heavy.bytes_written
    );
    Ok(())
}

fn apply_overrides(config: &mut IndexConfig, overrides: BuildOverrides) {
    if let Some(v) = overrides.num_barrels {
        config.num_barrels = v;
    }
    if let Some(v) = overrides.freq_threshold {
        config.freq_barrel_threshold = v;
    }
    if let Some(v) = overrides.barrel_exponent {
        config.barrel_exponent = v;
    }
    if let Some(v) = overrides.spill_threshold {
        config.spill_threshold = v;
    }
    if let Some(v) = overrides.min_token_len {
        config.min_token_len = v;
    }
    if let Some(v) = overrides.stopwords {
        config.stopwords = Some(v);
    }
    if let Some(v) = overrides.limit {
        config.limit = Some(v);
    }
    if let Some(v) = overrides.log_every {
        config.log_every = v;
    }
}
