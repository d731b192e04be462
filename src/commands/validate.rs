//! Validate command handler: cross-check published artifacts.
//!
//! Re-derives per-token document frequency from the forward index and
//! verifies that the postings file, offsets directory, barrel mapping, and
//! heavy extracts all agree with it. Any mismatch is reported as artifact
//! corruption (exit code 4).

use anyhow::Result;
use std::fs::File;
use std::path::Path;

use paperdex::barrels::BarrelAssignment;
use paperdex::constants::{
    BARREL_MAPPING_FILE, FORWARD_INDEX_FILE, HEAVY_MANIFEST_FILE, HEAVY_SUBDIR, LEXICON_FILE,
    POSTINGS_INDEX_FILE, POSTINGS_OFFSETS_FILE,
};
use paperdex::error::IndexError;
use paperdex::forward::ForwardIndexReader;
use paperdex::heavy::{load_manifest, read_heavy_file};
use paperdex::lexicon::Lexicon;
use paperdex::postings::{read_block, PostingsOffsets};
use paperdex::types::DocId;

pub fn run_validate(storage: &Path) -> Result<()> {
    let lexicon = Lexicon::load(&storage.join(LEXICON_FILE))?;
    let vocab_size = lexicon.len() as u32;
    drop(lexicon);

    let mapping = BarrelAssignment::load(&storage.join(BARREL_MAPPING_FILE))?;
    let mapping_path = storage.join(BARREL_MAPPING_FILE);
    if mapping.vocab_size() != vocab_size {
        return Err(IndexError::corrupt(
            &mapping_path,
            format!(
                "mapping covers {} tokens but lexicon has {}",
                mapping.vocab_size(),
                vocab_size
            ),
        )
        .into());
    }

    // Recompute document frequency from the forward index.
    let forward_path = storage.join(FORWARD_INDEX_FILE);
    let reader = ForwardIndexReader::open(&forward_path)?;
    let doc_count = reader.doc_count();
    let mut df: Vec<u32> = vec![0; vocab_size as usize];
    for record in reader {
        let (_, mut token_ids) = record?;
        token_ids.sort_unstable();
        token_ids.dedup();
        for token_id in token_ids {
            match df.get_mut(token_id as usize) {
                Some(count) => *count += 1,
                None => {
                    return Err(IndexError::corrupt(
                        &forward_path,
                        format!("token_id {} outside vocabulary", token_id),
                    )
                    .into());
                }
            }
        }
    }

    // Offsets load already enforces ascending token ids and gap-free ranges.
    let offsets_path = storage.join(POSTINGS_OFFSETS_FILE);
    let offsets = PostingsOffsets::load(&offsets_path)?;
    let index_path = storage.join(POSTINGS_INDEX_FILE);
    let index_len = std::fs::metadata(&index_path)
        .map_err(|e| IndexError::io(&index_path, "stat", e))?
        .len();
    if offsets.covered_bytes() != index_len {
        return Err(IndexError::corrupt(
            &offsets_path,
            format!(
                "offsets cover {} bytes but index file has {}",
                offsets.covered_bytes(),
                index_len
            ),
        )
        .into());
    }

    // Every block must agree with the recomputed document frequency.
    let mut index_file =
        File::open(&index_path).map_err(|e| IndexError::io(&index_path, "open", e))?;
    for entry in offsets.iter() {
        let block = read_block(&index_path, &mut index_file, *entry)?;
        let expected = df.get(entry.token_id as usize).copied().unwrap_or(0);
        if block.len() as u32 != expected {
            return Err(IndexError::corrupt(
                &index_path,
                format!(
                    "token {} block has {} postings, forward index says {}",
                    entry.token_id,
                    block.len(),
                    expected
                ),
            )
            .into());
        }
        let mut previous: Option<DocId> = None;
        for posting in &block {
            if previous.is_some_and(|prev| posting.doc_id <= prev) {
                return Err(IndexError::corrupt(
                    &index_path,
                    format!(
                        "token {} doc_ids not strictly increasing at {}",
                        entry.token_id, posting.doc_id
                    ),
                )
                .into());
            }
            if posting.positions.windows(2).any(|w| w[0] >= w[1]) {
                return Err(IndexError::corrupt(
                    &index_path,
                    format!(
                        "token {} doc {} has unsorted positions",
                        entry.token_id, posting.doc_id
                    ),
                )
                .into());
            }
            previous = Some(posting.doc_id);
        }
    }

    // Tokens occur in the offsets directory exactly when df > 0.
    for (token_id, &count) in df.iter().enumerate() {
        let present = offsets.get(token_id as u32).is_some();
        if present != (count > 0) {
            return Err(IndexError::corrupt(
                &offsets_path,
                format!(
                    "token {} has df {} but {} offsets entry",
                    token_id,
                    count,
                    if present { "an" } else { "no" }
                ),
            )
            .into());
        }
    }

    // Heavy extracts must project their postings blocks exactly.
    let manifest_path = storage.join(HEAVY_SUBDIR).join(HEAVY_MANIFEST_FILE);
    let mut heavy_checked = 0usize;
    if manifest_path.is_file() {
        let manifest = load_manifest(&manifest_path)?;
        for entry in &manifest.entries {
            if !mapping.is_special(entry.token_id) {
                return Err(IndexError::corrupt(
                    &manifest_path,
                    format!("token {} extracted but not in the frequent barrel", entry.token_id),
                )
                .into());
            }
            let heavy_path = storage.join(&entry.path);
            let pairs = read_heavy_file(&heavy_path)?;
            let offset_entry = offsets.get(entry.token_id).ok_or_else(|| {
                IndexError::corrupt(
                    &manifest_path,
                    format!("token {} extracted but has no postings block", entry.token_id),
                )
            })?;
            let block = read_block(&index_path, &mut index_file, offset_entry)?;
            let projected: Vec<(DocId, u32)> =
                block.iter().map(|p| (p.doc_id, p.freq)).collect();
            if pairs != projected {
                return Err(IndexError::corrupt(
                    &heavy_path,
                    format!("token {} extract disagrees with postings block", entry.token_id),
                )
                .into());
            }
            heavy_checked += 1;
        }
    }

    println!(
        "validation OK: {} docs, {} tokens, {} postings blocks, {} heavy extracts",
        doc_count,
        vocab_size,
        offsets.len(),
        heavy_checked
    );
    Ok(())
}
