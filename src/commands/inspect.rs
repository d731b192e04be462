//! Inspect command handlers: artifact statistics for debugging and tuning.

use anyhow::Result;
use std::fs;
use std::path::Path;

use paperdex::barrels::{barrel_paths, BarrelAssignment, BarrelReader};
use paperdex::constants::{
    BARREL_MAPPING_FILE, LEXICON_FILE, POSTINGS_OFFSETS_FILE,
};
use paperdex::lexicon::Lexicon;
use paperdex::postings::{OffsetEntry, PostingsOffsets};

pub fn inspect_lexicon(storage: &Path, top: usize) -> Result<()> {
    let lexicon = Lexicon::load(&storage.join(LEXICON_FILE))?;
    println!("lexicon: {} tokens", lexicon.len());
    for token_id in 0..top.min(lexicon.len()) {
        if let Some(token) = lexicon.token(token_id as u32) {
            println!("  {:>8}  {}", token_id, token);
        }
    }
    Ok(())
}

pub fn inspect_mapping(storage: &Path) -> Result<()> {
    let assignment = BarrelAssignment::load(&storage.join(BARREL_MAPPING_FILE))?;
    println!(
        "mapping: {} tokens, {} regular barrels + frequent",
        assignment.vocab_size(),
        assignment.num_barrels()
    );
    let histogram = assignment.histogram();
    for (barrel_id, count) in histogram.iter().enumerate() {
        let name = if barrel_id as u32 == assignment.special_id() {
            "barrel_freq".to_string()
        } else {
            format!("barrel_{:02}", barrel_id)
        };
        println!("  {}  {} tokens", name, count);
    }
    Ok(())
}

pub fn inspect_offsets(storage: &Path, top: usize) -> Result<()> {
    let offsets = PostingsOffsets::load(&storage.join(POSTINGS_OFFSETS_FILE))?;
    println!(
        "offsets: {} tokens, {} bytes covered",
        offsets.len(),
        offsets.covered_bytes()
    );

    let mut entries: Vec<OffsetEntry> = offsets.iter().copied().collect();
    entries.sort_by(|a, b| b.length.cmp(&a.length));
    println!("largest blocks:");
    for entry in entries.iter().take(top) {
        println!(
            "  token {:>8}  offset {:>12}  {} bytes",
            entry.token_id, entry.offset, entry.length
        );
    }
    Ok(())
}

pub fn inspect_barrels(storage: &Path) -> Result<()> {
    let assignment = BarrelAssignment::load(&storage.join(BARREL_MAPPING_FILE))?;
    for path in barrel_paths(storage, assignment.num_barrels()) {
        let bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let mut records = 0u64;
        for record in BarrelReader::open(&path)? {
            record?;
            records += 1;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        println!("  {}  {} records, {} bytes", name, records, bytes);
    }
    Ok(())
}
