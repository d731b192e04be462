//! Pipeline driver: orchestrates the full artifact build.
//!
//! Stage order is fixed: lexicon (S2), forward index (S3), barrels (S4),
//! postings aggregation (S5), heavy extraction (S6). Each stage reads only
//! published artifacts of earlier stages; in particular the lexicon is
//! reloaded from disk before the forward pass, so a corrupted write is
//! caught immediately instead of silently diverging. Stale `.tmp` files and
//! the spill directory from a cancelled run are swept before anything else.

use anyhow::Context;
use std::fs;
use std::path::Path;

use crate::artifact;
use crate::barrels::{self, BarrelBuildStats};
use crate::config::IndexConfig;
use crate::constants::{
    BARRELS_SUBDIR, FORWARD_INDEX_FILE, HEAVY_SUBDIR, LEXICON_FILE, SPILL_SUBDIR,
};
use crate::corpus::CorpusReader;
use crate::error::IndexError;
use crate::forward::{self, ForwardBuildStats};
use crate::heavy::{self, HeavyStats};
use crate::lexicon::{self, Lexicon, LexiconBuildStats};
use crate::postings::{self, PostingsBuildStats};
use crate::tokenize::{load_stopwords, Tokenizer};

/// Aggregated statistics from one pipeline execution.
#[derive(Debug)]
pub struct PipelineStats {
    pub lexicon: LexiconBuildStats,
    pub forward: ForwardBuildStats,
    pub barrels: BarrelBuildStats,
    pub postings: PostingsBuildStats,
    pub heavy: HeavyStats,
}

/// Run S2–S6 end to end, publishing every artifact under `output_dir`.
pub fn run(input_dir: &Path, output_dir: &Path, config: &IndexConfig) -> anyhow::Result<PipelineStats> {
    config.validate()?;

    // Fail on a missing corpus before any write happens.
    let probe = CorpusReader::open(input_dir)?;
    log::info!(
        "corpus: {} files selected under {}",
        probe.file_count(),
        input_dir.display()
    );
    drop(probe);

    fs::create_dir_all(output_dir)
        .map_err(|e| IndexError::io(output_dir, "mkdir", e))?;
    sweep(output_dir)?;

    let stopwords = load_stopwords(config.stopwords.as_deref())?;
    let tokenizer = Tokenizer::new(stopwords, config.min_token_len);

    let lexicon_path = output_dir.join(LEXICON_FILE);
    let lexicon_stats = lexicon::build_lexicon(
        input_dir,
        &tokenizer,
        &lexicon_path,
        config.log_every,
        config.limit,
    )
    .context("lexicon stage failed")?;
    log::info!(
        "lexicon: {} docs indexed, {} skipped, vocab={}",
        lexicon_stats.documents_indexed,
        lexicon_stats.documents_skipped,
        lexicon_stats.vocab_size
    );

    // Fail-closed: trust only what made it to disk.
    let lexicon = Lexicon::load(&lexicon_path).context("lexicon stage failed")?;
    let vocab_size = lexicon.len() as u32;

    let forward_stats = forward::build_forward_index(
        input_dir,
        &tokenizer,
        &lexicon,
        output_dir,
        config.log_every,
        config.limit,
    )
    .context("forward-index stage failed")?;
    log::info!(
        "forward: {} docs, {} tokens",
        forward_stats.documents_indexed,
        forward_stats.total_tokens
    );
    drop(lexicon);

    let forward_path = output_dir.join(FORWARD_INDEX_FILE);
    let barrel_stats = barrels::build_barrels(&forward_path, output_dir, vocab_size, config)
        .context("barrel stage failed")?;
    log::info!(
        "barrels: {} records across {} barrels ({} frequent tokens)",
        barrel_stats.records_written,
        config.num_barrels + 1,
        barrel_stats.special_tokens
    );

    let postings_stats =
        postings::build_postings(output_dir, vocab_size, config).context("postings stage failed")?;
    log::info!(
        "postings: {} tokens, {} postings, {} bytes ({} spills)",
        postings_stats.tokens_emitted,
        postings_stats.postings_written,
        postings_stats.index_bytes,
        postings_stats.spill_operations
    );

    let heavy_stats =
        heavy::extract_heavy_tokens(output_dir).context("heavy-extraction stage failed")?;
    log::info!(
        "heavy: {} tokens extracted, {} bytes",
        heavy_stats.tokens_extracted,
        heavy_stats.bytes_written
    );

    Ok(PipelineStats {
        lexicon: lexicon_stats,
        forward: forward_stats,
        barrels: barrel_stats,
        postings: postings_stats,
        heavy: heavy_stats,
    })
}

/// Reclaim leftovers of a cancelled run: `.tmp` files under the output
/// root, the barrels and heavy subdirectories, and the spill directory.
fn sweep(output_dir: &Path) -> crate::error::Result<()> {
    let mut removed = artifact::sweep_temp_files(output_dir)?;
    removed += artifact::sweep_temp_files(&output_dir.join(BARRELS_SUBDIR))?;
    removed += artifact::sweep_temp_files(&output_dir.join(HEAVY_SUBDIR))?;
    artifact::remove_dir_if_exists(&output_dir.join(SPILL_SUBDIR))?;
    if removed > 0 {
        log::warn!("swept {} stale temp files from a previous run", removed);
    }
    Ok(())
}
