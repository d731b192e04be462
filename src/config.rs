//! Pipeline configuration: TOML file parsing, defaults, and validation.
//!
//! Configuration can come from an optional TOML file (an `[index]` table)
//! with CLI flags layered on top by the command handlers. Validation runs
//! once at startup; every violation is a `Config` error (exit code 2).

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_BARREL_EXPONENT, DEFAULT_BUCKET_COUNT, DEFAULT_FREQ_BARREL_THRESHOLD,
    DEFAULT_LOG_EVERY, DEFAULT_MIN_TOKEN_LEN, DEFAULT_NUM_BARRELS, DEFAULT_SPILL_THRESHOLD,
    MAX_NUM_BARRELS,
};
use crate::error::{IndexError, Result};

#[derive(Debug, Deserialize)]
struct ConfigFile {
    index: IndexConfig,
}

/// Tunables of the indexing pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// Regular barrel count; the special frequent barrel is appended after.
    pub num_barrels: u32,
    /// Fraction of total documents above which a token is "frequent".
    pub freq_barrel_threshold: f64,
    /// Exponent in the rank-to-barrel map.
    pub barrel_exponent: f64,
    /// Per-token in-memory posting budget before spill-to-disk.
    pub spill_threshold: usize,
    /// Minimum token length in characters.
    pub min_token_len: usize,
    /// Shard count of the older external-sort build; ignored by barrels.
    pub bucket_count: u32,
    /// Optional extra stop-word file, one word per line.
    pub stopwords: Option<PathBuf>,
    /// Progress log interval in documents.
    pub log_every: usize,
    /// Optional cap on documents indexed (testing aid).
    pub limit: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            num_barrels: DEFAULT_NUM_BARRELS,
            freq_barrel_threshold: DEFAULT_FREQ_BARREL_THRESHOLD,
            barrel_exponent: DEFAULT_BARREL_EXPONENT,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
            bucket_count: DEFAULT_BUCKET_COUNT,
            stopwords: None,
            log_every: DEFAULT_LOG_EVERY,
            limit: None,
        }
    }
}

impl IndexConfig {
    /// Check every knob against its documented range.
    pub fn validate(&self) -> Result<()> {
        if self.num_barrels < 1 {
            return Err(IndexError::config(format!(
                "num_barrels must be at least 1 (got {})",
                self.num_barrels
            )));
        }
        if self.num_barrels > MAX_NUM_BARRELS {
            return Err(IndexError::config(format!(
                "num_barrels must be at most {} (got {})",
                MAX_NUM_BARRELS, self.num_barrels
            )));
        }
        if !(self.freq_barrel_threshold > 0.0 && self.freq_barrel_threshold <= 1.0) {
            return Err(IndexError::config(format!(
                "freq_barrel_threshold must be in (0, 1] (got {})",
                self.freq_barrel_threshold
            )));
        }
        if !(self.barrel_exponent > 0.0 && self.barrel_exponent.is_finite()) {
            return Err(IndexError::config(format!(
                "barrel_exponent must be a positive finite number (got {})",
                self.barrel_exponent
            )));
        }
        if self.spill_threshold < 1 {
            return Err(IndexError::config(
                "spill_threshold must be at least 1".to_string(),
            ));
        }
        if self.min_token_len < 1 {
            return Err(IndexError::config(
                "min_token_len must be at least 1".to_string(),
            ));
        }
        if self.log_every < 1 {
            return Err(IndexError::config(
                "log_every must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse an `[index]` table from a TOML file. Values not present fall back
/// to defaults; unknown keys are rejected.
pub fn parse_config(path: &Path) -> Result<IndexConfig> {
    if !path.exists() {
        return Err(IndexError::input_not_found(path));
    }
    let contents =
        fs::read_to_string(path).map_err(|e| IndexError::io(path, "read config", e))?;

    let parsed: ConfigFile = toml::from_str(&contents)
        .map_err(|e| IndexError::config(format!("{}: {}", path.display(), e)))?;

    Ok(parsed.index)
}
