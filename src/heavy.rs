//! Heavy-token extraction: positionless fast-path files.
//!
//! Every token routed to the special frequent barrel gets a companion file
//! `heavy/token_<id>.bin` holding just `(doc_id, freq)` pairs, so query
//! code that does not need positions can scan a much smaller file. A JSON
//! manifest lists every extract.
//!
//! Extract format (little-endian): doc_count (u32), then per document
//! doc_id (u32), freq (u32).

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::Path;

use crate::artifact;
use crate::barrels::BarrelAssignment;
use crate::constants::{
    heavy_file_name, BARREL_MAPPING_FILE, HEAVY_MANIFEST_FILE, HEAVY_SUBDIR, MAX_BLOCK_POSTINGS,
    POSTINGS_INDEX_FILE, POSTINGS_OFFSETS_FILE,
};
use crate::error::{IndexError, Result};
use crate::postings::{read_block, PostingsOffsets};
use crate::types::{DocId, TokenId};

/// Manifest entry for one extracted token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeavyEntry {
    pub token_id: TokenId,
    pub path: String,
    pub doc_count: u32,
    pub size_bytes: u64,
}

/// `heavy/manifest.json` contents.
#[derive(Debug, Serialize, Deserialize)]
pub struct HeavyManifest {
    pub token_count: usize,
    pub entries: Vec<HeavyEntry>,
}

/// Statistics from heavy extraction.
#[derive(Debug, Default)]
pub struct HeavyStats {
    pub tokens_extracted: usize,
    pub bytes_written: u64,
}

/// Extract every frequent-barrel token's postings block into a doc-only
/// file and write the manifest. Tokens are independent, so extraction is
/// parallel; each worker reads its block through its own file handle.
pub fn extract_heavy_tokens(storage_dir: &Path) -> Result<HeavyStats> {
    let mapping = BarrelAssignment::load(&storage_dir.join(BARREL_MAPPING_FILE))?;
    let offsets = PostingsOffsets::load(&storage_dir.join(POSTINGS_OFFSETS_FILE))?;
    let index_path = storage_dir.join(POSTINGS_INDEX_FILE);
    if !index_path.is_file() {
        return Err(IndexError::input_not_found(&index_path));
    }

    let heavy_dir = storage_dir.join(HEAVY_SUBDIR);
    fs::create_dir_all(&heavy_dir).map_err(|e| IndexError::io(&heavy_dir, "mkdir", e))?;

    // Special-barrel tokens with a postings block, ascending by token id.
    let targets: Vec<(TokenId, crate::postings::OffsetEntry)> = mapping
        .special_tokens()
        .into_iter()
        .filter_map(|token_id| offsets.get(token_id).map(|entry| (token_id, entry)))
        .collect();

    let entries: Vec<HeavyEntry> = targets
        .par_iter()
        .map(|&(token_id, entry)| -> Result<HeavyEntry> {
            let mut index_file =
                File::open(&index_path).map_err(|e| IndexError::io(&index_path, "open", e))?;
            let postings = read_block(&index_path, &mut index_file, entry)?;

            let file_name = heavy_file_name(token_id);
            let dest = heavy_dir.join(&file_name);
            let (mut writer, tmp) = artifact::create_tmp(&dest)?;
            let write_err = |e| IndexError::io(&tmp, "write", e);

            writer
                .write_all(&(postings.len() as u32).to_le_bytes())
                .map_err(write_err)?;
            for posting in &postings {
                writer
                    .write_all(&posting.doc_id.to_le_bytes())
                    .map_err(write_err)?;
                writer
                    .write_all(&posting.freq.to_le_bytes())
                    .map_err(write_err)?;
            }
            artifact::publish(writer, &tmp, &dest)?;

            Ok(HeavyEntry {
                token_id,
                path: format!("{}/{}", HEAVY_SUBDIR, file_name),
                doc_count: postings.len() as u32,
                size_bytes: 4 + 8 * postings.len() as u64,
            })
        })
        .collect::<Result<Vec<HeavyEntry>>>()?;

    let stats = HeavyStats {
        tokens_extracted: entries.len(),
        bytes_written: entries.iter().map(|e| e.size_bytes).sum(),
    };

    let manifest = HeavyManifest {
        token_count: entries.len(),
        entries,
    };
    write_manifest(&heavy_dir.join(HEAVY_MANIFEST_FILE), &manifest)?;
    Ok(stats)
}

fn write_manifest(path: &Path, manifest: &HeavyManifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| IndexError::corrupt(path, format!("manifest serialization: {}", e)))?;
    let (mut writer, tmp) = artifact::create_tmp(path)?;
    writer
        .write_all(json.as_bytes())
        .map_err(|e| IndexError::io(&tmp, "write", e))?;
    artifact::publish(writer, &tmp, path)
}

/// Load `heavy/manifest.json`.
pub fn load_manifest(path: &Path) -> Result<HeavyManifest> {
    if !path.is_file() {
        return Err(IndexError::input_not_found(path));
    }
    let contents = fs::read_to_string(path).map_err(|e| IndexError::io(path, "read", e))?;
    serde_json::from_str(&contents)
        .map_err(|e| IndexError::corrupt(path, format!("manifest parse: {}", e)))
}

/// Decode one heavy extract into `(doc_id, freq)` pairs.
pub fn read_heavy_file(path: &Path) -> Result<Vec<(DocId, u32)>> {
    let file = File::open(path).map_err(|e| IndexError::io(path, "open", e))?;
    let mut reader = BufReader::new(file);
    let mut buf4 = [0u8; 4];

    reader
        .read_exact(&mut buf4)
        .map_err(|_| IndexError::corrupt(path, "missing doc_count header"))?;
    let doc_count = u32::from_le_bytes(buf4);
    if doc_count > MAX_BLOCK_POSTINGS {
        return Err(IndexError::corrupt(
            path,
            format!("doc_count {} exceeds cap {}", doc_count, MAX_BLOCK_POSTINGS),
        ));
    }

    let mut pairs = Vec::with_capacity(doc_count as usize);
    for _ in 0..doc_count {
        reader
            .read_exact(&mut buf4)
            .map_err(|_| IndexError::corrupt(path, "truncated entry"))?;
        let doc_id = u32::from_le_bytes(buf4);
        reader
            .read_exact(&mut buf4)
            .map_err(|_| IndexError::corrupt(path, "truncated entry"))?;
        let freq = u32::from_le_bytes(buf4);
        pairs.push((doc_id, freq));
    }
    Ok(pairs)
}
