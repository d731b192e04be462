//! Defaults, safety caps, and artifact names shared across the pipeline.

// --- Tunable defaults ---

/// Regular barrel count (the special frequent barrel is one more).
pub const DEFAULT_NUM_BARRELS: u32 = 16;

/// Fraction of the corpus above which a token is routed to the frequent barrel.
pub const DEFAULT_FREQ_BARREL_THRESHOLD: f64 = 0.05;

/// Exponent of the rank-to-barrel map. Values below 1 spread rare tokens
/// across the early barrels and cluster frequent tokens in later ones.
pub const DEFAULT_BARREL_EXPONENT: f64 = 0.6;

/// Per-token in-memory posting budget before spilling to disk.
pub const DEFAULT_SPILL_THRESHOLD: usize = 1024;

/// Minimum token length (in characters) after normalization.
pub const DEFAULT_MIN_TOKEN_LEN: usize = 2;

/// Shard count of the older external-sort inverted build. Accepted in
/// configuration for compatibility; the barrel pipeline ignores it.
pub const DEFAULT_BUCKET_COUNT: u32 = 128;

/// Progress log interval, in documents.
pub const DEFAULT_LOG_EVERY: usize = 50;

/// Documents decoded per batch during the document-frequency pass.
pub const DF_SCAN_BATCH: usize = 1024;

// --- Safety caps for artifact decoding ---
// Decoding trusts artifact headers for allocation sizes; these caps turn
// absurd values into corruption errors instead of huge allocations.

pub const MAX_VOCAB_SIZE: u32 = 500_000_000;
pub const MAX_TOKEN_BYTES: usize = 10_000;
pub const MAX_DOC_TOKENS: u32 = 50_000_000;
pub const MAX_POSITIONS_PER_POSTING: u32 = 50_000_000;
pub const MAX_BLOCK_POSTINGS: u32 = 1_000_000_000;
pub const MAX_NUM_BARRELS: u32 = 4096;

// --- Artifact names ---

pub const LEXICON_FILE: &str = "lexicon.bin";
pub const FORWARD_INDEX_FILE: &str = "forward_index.bin";
pub const DOC_IDS_FILE: &str = "doc_ids.tsv";
pub const BARRELS_SUBDIR: &str = "barrels";
pub const BARREL_FREQ_FILE: &str = "barrel_freq.bin";
pub const BARREL_MAPPING_FILE: &str = "barrel_mapping.bin";
pub const POSTINGS_INDEX_FILE: &str = "postings_index.bin";
pub const POSTINGS_OFFSETS_FILE: &str = "postings_offsets.bin";
pub const HEAVY_SUBDIR: &str = "heavy";
pub const HEAVY_MANIFEST_FILE: &str = "manifest.json";

/// Working directory for per-token spill files during postings aggregation.
pub const SPILL_SUBDIR: &str = ".postings_tmp";

/// Suffix for not-yet-published artifacts; swept on startup.
pub const TMP_SUFFIX: &str = ".tmp";

/// Name of a regular barrel file: `barrel_00.bin`, `barrel_01.bin`, ...
pub fn barrel_file_name(barrel_id: u32) -> String {
    format!("barrel_{:02}.bin", barrel_id)
}

/// Name of a heavy-token extract: `token_<id>.bin`.
pub fn heavy_file_name(token_id: u32) -> String {
    format!("token_{}.bin", token_id)
}
