//! Postings aggregation: barrels → one seekable postings file + offsets.
//!
//! Phase A streams every barrel record into per-token in-memory lists,
//! spilling a token's list to a temp file whenever it reaches the
//! configured threshold - RAM stays bounded no matter how skewed the
//! distribution is. Phase B walks token ids in ascending order, gathers
//! spilled and resident postings, sorts by doc id, validates, and emits one
//! contiguous block per token while recording `(token_id, offset, length)`.
//!
//! `postings_index.bin` is a headerless concatenation of blocks:
//! doc_count (u32), then per posting doc_id (u32), freq (u32),
//! pos_count (u32), positions. `postings_offsets.bin` is
//! token_count (u32) then (token_id u32, offset u64, length u64) entries.
//! Both publish by rename only after they are complete and synced.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::artifact;
use crate::barrels::{barrel_paths, BarrelReader};
use crate::config::IndexConfig;
use crate::constants::{
    MAX_BLOCK_POSTINGS, MAX_POSITIONS_PER_POSTING, MAX_VOCAB_SIZE, POSTINGS_INDEX_FILE,
    POSTINGS_OFFSETS_FILE, SPILL_SUBDIR,
};
use crate::error::{IndexError, Result};
use crate::types::{Posting, TokenId};

fn spill_file_name(token_id: TokenId) -> String {
    format!("token_{}.bin", token_id)
}

/// Statistics from the postings aggregation.
#[derive(Debug, Default)]
pub struct PostingsBuildStats {
    pub tokens_emitted: u32,
    pub postings_written: u64,
    pub spill_operations: u64,
    pub index_bytes: u64,
}

/// Aggregate all barrel records into `postings_index.bin` and
/// `postings_offsets.bin` under `storage_dir`.
pub fn build_postings(
    storage_dir: &Path,
    vocab_size: u32,
    config: &IndexConfig,
) -> Result<PostingsBuildStats> {
    let spill_dir = storage_dir.join(SPILL_SUBDIR);
    artifact::remove_dir_if_exists(&spill_dir)?;
    fs::create_dir_all(&spill_dir).map_err(|e| IndexError::io(&spill_dir, "mkdir", e))?;

    let mut stats = PostingsBuildStats::default();

    // PHASE A: accumulate with spill. Order across barrels is free; order
    // within one barrel is preserved by the streaming reader.
    let mut resident: HashMap<TokenId, Vec<Posting>> = HashMap::new();
    let mut spilled_counts: HashMap<TokenId, u64> = HashMap::new();

    for barrel_path in barrel_paths(storage_dir, config.num_barrels) {
        let mut records_in_barrel = 0u64;
        for record in BarrelReader::open(&barrel_path)? {
            let record = record?;
            let token_id = record.token_id;
            let list = resident.entry(token_id).or_default();
            list.push(record.into_posting());
            records_in_barrel += 1;

            if list.len() >= config.spill_threshold {
                let drained = std::mem::take(list);
                append_spill(&spill_dir, token_id, &drained)?;
                *spilled_counts.entry(token_id).or_default() += drained.len() as u64;
                stats.spill_operations += 1;
            }
        }
        log::info!(
            "postings: scanned {} records from {}",
            records_in_barrel,
            barrel_path.display()
        );
    }

    // PHASE B: emit blocks in ascending token id; offsets are controlled by
    // this single sequential writer. Tokens without postings are omitted.
    let index_path = storage_dir.join(POSTINGS_INDEX_FILE);
    let offsets_path = storage_dir.join(POSTINGS_OFFSETS_FILE);
    let (mut index_writer, index_tmp) = artifact::create_tmp(&index_path)?;

    let mut offsets: Vec<(TokenId, u64, u64)> = Vec::new();
    let mut offset = 0u64;

    for token_id in 0..vocab_size {
        let mut postings: Vec<Posting> = Vec::new();
        if spilled_counts.contains_key(&token_id) {
            read_spill(&spill_dir.join(spill_file_name(token_id)), &mut postings)?;
        }
        if let Some(tail) = resident.remove(&token_id) {
            postings.extend(tail);
        }
        if postings.is_empty() {
            continue;
        }

        postings.sort_by_key(|p| p.doc_id);
        validate_block(&index_path, token_id, &postings)?;

        let block_len = write_block(&mut index_writer, &index_tmp, &postings)?;
        offsets.push((token_id, offset, block_len));
        offset += block_len;
        stats.postings_written += postings.len() as u64;
        stats.tokens_emitted += 1;
    }
    stats.index_bytes = offset;

    let (mut offsets_writer, offsets_tmp) = artifact::create_tmp(&offsets_path)?;
    let write_err = |e| IndexError::io(&offsets_tmp, "write", e);
    offsets_writer
        .write_all(&(offsets.len() as u32).to_le_bytes())
        .map_err(write_err)?;
    for &(token_id, block_offset, block_len) in &offsets {
        offsets_writer
            .write_all(&token_id.to_le_bytes())
            .map_err(write_err)?;
        offsets_writer
            .write_all(&block_offset.to_le_bytes())
            .map_err(write_err)?;
        offsets_writer
            .write_all(&block_len.to_le_bytes())
            .map_err(write_err)?;
    }

    // Both temps reach durable storage before either rename, so readers see
    // the old generation or the new one, never a mix under final names.
    artifact::finish_tmp(index_writer, &index_tmp)?;
    artifact::finish_tmp(offsets_writer, &offsets_tmp)?;
    artifact::rename_into_place(&index_tmp, &index_path)?;
    artifact::rename_into_place(&offsets_tmp, &offsets_path)?;

    artifact::remove_dir_if_exists(&spill_dir)?;
    Ok(stats)
}

fn append_spill(spill_dir: &Path, token_id: TokenId, postings: &[Posting]) -> Result<()> {
    let path = spill_dir.join(spill_file_name(token_id));
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&path)
        .map_err(|e| IndexError::io(&path, "open", e))?;
    let mut writer = BufWriter::new(file);
    let write_err = |e| IndexError::io(&path, "write", e);

    for posting in postings {
        writer
            .write_all(&posting.doc_id.to_le_bytes())
            .map_err(write_err)?;
        writer
            .write_all(&posting.freq.to_le_bytes())
            .map_err(write_err)?;
        writer
            .write_all(&(posting.positions.len() as u32).to_le_bytes())
            .map_err(write_err)?;
        for &pos in &posting.positions {
            writer.write_all(&pos.to_le_bytes()).map_err(write_err)?;
        }
    }
    writer.flush().map_err(write_err)?;
    Ok(())
}

fn read_spill(path: &Path, postings: &mut Vec<Posting>) -> Result<()> {
    let file = File::open(path).map_err(|e| IndexError::io(path, "open", e))?;
    let mut reader = BufReader::new(file);

    loop {
        // Clean EOF is only legal between records.
        let mut head = [0u8; 4];
        let mut filled = 0;
        while filled < 4 {
            let n = reader
                .read(&mut head[filled..])
                .map_err(|e| IndexError::io(path, "read", e))?;
            if n == 0 {
                if filled == 0 {
                    return Ok(());
                }
                return Err(IndexError::corrupt(path, "truncated spill record"));
            }
            filled += n;
        }
        let doc_id = u32::from_le_bytes(head);

        let mut buf4 = [0u8; 4];
        reader
            .read_exact(&mut buf4)
            .map_err(|_| IndexError::corrupt(path, "truncated spill record"))?;
        let freq = u32::from_le_bytes(buf4);
        reader
            .read_exact(&mut buf4)
            .map_err(|_| IndexError::corrupt(path, "truncated spill record"))?;
        let pos_count = u32::from_le_bytes(buf4);
        if pos_count > MAX_POSITIONS_PER_POSTING {
            return Err(IndexError::corrupt(
                path,
                format!("pos_count {} exceeds cap {}", pos_count, MAX_POSITIONS_PER_POSTING),
            ));
        }

        let mut blob = vec![0u8; pos_count as usize * 4];
        reader
            .read_exact(&mut blob)
            .map_err(|_| IndexError::corrupt(path, "truncated spill positions"))?;
        let positions = blob
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        postings.push(Posting {
            doc_id,
            freq,
            positions,
        });
    }
}

/// Reject duplicate doc ids, freq/position mismatches, and unsorted
/// positions before a block reaches the index file.
fn validate_block(index_path: &Path, token_id: TokenId, postings: &[Posting]) -> Result<()> {
    for pair in postings.windows(2) {
        if pair[0].doc_id == pair[1].doc_id {
            return Err(IndexError::corrupt(
                index_path,
                format!(
                    "duplicate doc_id {} in postings for token {}",
                    pair[0].doc_id, token_id
                ),
            ));
        }
    }
    for posting in postings {
        if posting.freq as usize != posting.positions.len() {
            return Err(IndexError::corrupt(
                index_path,
                format!(
                    "freq {} != {} positions for token {} doc {}",
                    posting.freq,
                    posting.positions.len(),
                    token_id,
                    posting.doc_id
                ),
            ));
        }
        if posting.positions.windows(2).any(|w| w[0] >= w[1]) {
            return Err(IndexError::corrupt(
                index_path,
                format!(
                    "unsorted positions for token {} doc {}",
                    token_id, posting.doc_id
                ),
            ));
        }
    }
    Ok(())
}

fn write_block(
    writer: &mut BufWriter<File>,
    tmp: &Path,
    postings: &[Posting],
) -> Result<u64> {
    let write_err = |e| IndexError::io(tmp, "write", e);

    writer
        .write_all(&(postings.len() as u32).to_le_bytes())
        .map_err(write_err)?;
    let mut written = 4u64;
    for posting in postings {
        writer
            .write_all(&posting.doc_id.to_le_bytes())
            .map_err(write_err)?;
        writer
            .write_all(&posting.freq.to_le_bytes())
            .map_err(write_err)?;
        writer
            .write_all(&(posting.positions.len() as u32).to_le_bytes())
            .map_err(write_err)?;
        for &pos in &posting.positions {
            writer.write_all(&pos.to_le_bytes()).map_err(write_err)?;
        }
        written += 12 + 4 * posting.positions.len() as u64;
    }
    Ok(written)
}

/// One entry of the offsets directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetEntry {
    pub token_id: TokenId,
    pub offset: u64,
    pub length: u64,
}

/// In-memory view of `postings_offsets.bin` with O(log n) token lookup.
#[derive(Debug)]
pub struct PostingsOffsets {
    entries: Vec<OffsetEntry>,
}

impl PostingsOffsets {
    /// Load and validate the offsets directory: token ids strictly
    /// ascending, ranges contiguous from offset 0 with no gaps.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(IndexError::input_not_found(path));
        }
        let file = File::open(path).map_err(|e| IndexError::io(path, "open", e))?;
        let mut reader = BufReader::new(file);
        let mut buf4 = [0u8; 4];
        let mut buf8 = [0u8; 8];

        reader
            .read_exact(&mut buf4)
            .map_err(|_| IndexError::corrupt(path, "missing token_count header"))?;
        let token_count = u32::from_le_bytes(buf4);
        if token_count > MAX_VOCAB_SIZE {
            return Err(IndexError::corrupt(
                path,
                format!("token_count {} exceeds cap {}", token_count, MAX_VOCAB_SIZE),
            ));
        }

        let mut entries = Vec::with_capacity(token_count as usize);
        let mut expected_offset = 0u64;
        let mut previous_token: Option<TokenId> = None;

        for _ in 0..token_count {
            reader
                .read_exact(&mut buf4)
                .map_err(|_| IndexError::corrupt(path, "truncated offsets entry"))?;
            let token_id = u32::from_le_bytes(buf4);
            reader
                .read_exact(&mut buf8)
                .map_err(|_| IndexError::corrupt(path, "truncated offsets entry"))?;
            let block_offset = u64::from_le_bytes(buf8);
            reader
                .read_exact(&mut buf8)
                .map_err(|_| IndexError::corrupt(path, "truncated offsets entry"))?;
            let length = u64::from_le_bytes(buf8);

            if previous_token.is_some_and(|prev| token_id <= prev) {
                return Err(IndexError::corrupt(
                    path,
                    format!("token_id {} not strictly ascending", token_id),
                ));
            }
            if block_offset != expected_offset {
                return Err(IndexError::corrupt(
                    path,
                    format!(
                        "offset gap at token {}: expected {}, found {}",
                        token_id, expected_offset, block_offset
                    ),
                ));
            }

            previous_token = Some(token_id);
            expected_offset = block_offset + length;
            entries.push(OffsetEntry {
                token_id,
                offset: block_offset,
                length,
            });
        }

        Ok(PostingsOffsets { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes covered by the offset ranges (the index file size).
    pub fn covered_bytes(&self) -> u64 {
        self.entries.last().map(|e| e.offset + e.length).unwrap_or(0)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OffsetEntry> {
        self.entries.iter()
    }

    /// Offset entry for a token, if it has a postings block.
    pub fn get(&self, token_id: TokenId) -> Option<OffsetEntry> {
        self.entries
            .binary_search_by_key(&token_id, |e| e.token_id)
            .ok()
            .map(|i| self.entries[i])
    }
}

/// Read and decode one postings block at `(offset, length)`.
pub fn read_block(
    index_path: &Path,
    file: &mut File,
    entry: OffsetEntry,
) -> Result<Vec<Posting>> {
    file.seek(SeekFrom::Start(entry.offset))
        .map_err(|e| IndexError::io(index_path, "seek", e))?;
    let mut block = vec![0u8; entry.length as usize];
    file.read_exact(&mut block)
        .map_err(|_| IndexError::corrupt(index_path, "block extends past end of file"))?;
    decode_block(index_path, entry.token_id, &block)
}

fn decode_block(index_path: &Path, token_id: TokenId, block: &[u8]) -> Result<Vec<Posting>> {
    let corrupt = |detail: String| IndexError::corrupt(index_path, detail);
    let take_u32 = |cursor: &mut usize| -> Result<u32> {
        let bytes = block
            .get(*cursor..*cursor + 4)
            .ok_or_else(|| corrupt(format!("truncated block for token {}", token_id)))?;
        *cursor += 4;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    };

    let mut cursor = 0usize;
    let doc_count = take_u32(&mut cursor)?;
    if doc_count > MAX_BLOCK_POSTINGS {
        return Err(corrupt(format!(
            "doc_count {} exceeds cap {}",
            doc_count, MAX_BLOCK_POSTINGS
        )));
    }

    let mut postings = Vec::with_capacity(doc_count as usize);
    for _ in 0..doc_count {
        let doc_id = take_u32(&mut cursor)?;
        let freq = take_u32(&mut cursor)?;
        let pos_count = take_u32(&mut cursor)?;
        if pos_count != freq {
            return Err(corrupt(format!(
                "freq {} != pos_count {} for token {} doc {}",
                freq, pos_count, token_id, doc_id
            )));
        }
        let mut positions = Vec::with_capacity(pos_count as usize);
        for _ in 0..pos_count {
            positions.push(take_u32(&mut cursor)?);
        }
        postings.push(Posting {
            doc_id,
            freq,
            positions,
        });
    }

    if cursor != block.len() {
        return Err(corrupt(format!(
            "block for token {} has {} trailing bytes",
            token_id,
            block.len() - cursor
        )));
    }
    Ok(postings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrels::BarrelWriter;
    use tempfile::tempdir;

    fn config_with(num_barrels: u32, spill_threshold: usize) -> IndexConfig {
        let mut config = IndexConfig::default();
        config.num_barrels = num_barrels;
        config.spill_threshold = spill_threshold;
        config
    }

    /// Write barrels directly so aggregation can be tested in isolation.
    fn write_barrels(
        storage: &Path,
        num_barrels: u32,
        records: &[(u32, TokenId, u32, &[u32])],
    ) {
        let mut writer = BarrelWriter::create(storage, num_barrels).unwrap();
        for &(barrel_id, token_id, doc_id, positions) in records {
            writer
                .write_posting(barrel_id, token_id, doc_id, positions)
                .unwrap();
        }
        writer.end_document().unwrap();
        writer.finish().unwrap();
    }

    fn load_index(storage: &Path) -> (PostingsOffsets, File) {
        let offsets = PostingsOffsets::load(&storage.join(POSTINGS_OFFSETS_FILE)).unwrap();
        let file = File::open(storage.join(POSTINGS_INDEX_FILE)).unwrap();
        (offsets, file)
    }

    #[test]
    fn test_aggregation_merges_and_sorts_across_barrels() -> Result<()> {
        let dir = tempdir().unwrap();
        // token 0 scattered across two barrels with doc ids out of global order
        write_barrels(
            dir.path(),
            2,
            &[
                (0, 0, 4, &[0]),
                (0, 0, 9, &[2, 5]),
                (1, 0, 1, &[7]),
                (1, 3, 1, &[0]),
            ],
        );

        let stats = build_postings(dir.path(), 5, &config_with(2, 1024))?;
        assert_eq!(stats.tokens_emitted, 2);
        assert_eq!(stats.postings_written, 4);

        let (offsets, mut file) = load_index(dir.path());
        assert_eq!(offsets.len(), 2);

        let index_path = dir.path().join(POSTINGS_INDEX_FILE);
        let block = read_block(&index_path, &mut file, offsets.get(0).unwrap())?;
        let doc_ids: Vec<u32> = block.iter().map(|p| p.doc_id).collect();
        assert_eq!(doc_ids, vec![1, 4, 9]);
        assert_eq!(block[2].positions, vec![2, 5]);
        assert_eq!(block[2].freq, 2);

        let block3 = read_block(&index_path, &mut file, offsets.get(3).unwrap())?;
        assert_eq!(block3.len(), 1);
        // tokens without postings are omitted from the directory
        assert!(offsets.get(1).is_none());
        assert!(offsets.get(2).is_none());
        assert!(offsets.get(4).is_none());
        Ok(())
    }

    #[test]
    fn test_spill_path_produces_single_sorted_block() -> Result<()> {
        let dir = tempdir().unwrap();
        // 9 postings for token 7 spread over 3 barrels, spill threshold 4.
        let mut records: Vec<(u32, TokenId, u32, &[u32])> = Vec::new();
        let positions: &[u32] = &[0];
        for doc_id in 0..9u32 {
            records.push((doc_id % 3, 7, doc_id, positions));
        }
        // barrels keep ascending doc order internally
        records.sort_by_key(|&(barrel, _, doc, _)| (barrel, doc));
        write_barrels(dir.path(), 3, &records);

        let stats = build_postings(dir.path(), 8, &config_with(3, 4))?;
        assert!(stats.spill_operations >= 2);
        assert_eq!(stats.postings_written, 9);

        let (offsets, mut file) = load_index(dir.path());
        let entry = offsets.get(7).unwrap();
        let block = read_block(&dir.path().join(POSTINGS_INDEX_FILE), &mut file, entry)?;
        let doc_ids: Vec<u32> = block.iter().map(|p| p.doc_id).collect();
        assert_eq!(doc_ids, (0..9).collect::<Vec<u32>>());

        // spill directory is cleaned up after publication
        assert!(!dir.path().join(SPILL_SUBDIR).exists());
        Ok(())
    }

    #[test]
    fn test_duplicate_doc_id_is_fatal() {
        let dir = tempdir().unwrap();
        let positions: &[u32] = &[0];
        write_barrels(
            dir.path(),
            2,
            &[(0, 1, 5, positions), (1, 1, 5, positions)],
        );

        let err = build_postings(dir.path(), 2, &config_with(2, 1024)).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("duplicate doc_id 5"));
    }

    #[test]
    fn test_unsorted_positions_are_fatal() {
        let dir = tempdir().unwrap();
        let positions: &[u32] = &[3, 1];
        write_barrels(dir.path(), 1, &[(0, 0, 0, positions)]);

        let err = build_postings(dir.path(), 1, &config_with(1, 1024)).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("unsorted positions"));
    }

    #[test]
    fn test_empty_vocabulary_produces_wellformed_artifacts() -> Result<()> {
        let dir = tempdir().unwrap();
        write_barrels(dir.path(), 2, &[]);

        let stats = build_postings(dir.path(), 0, &config_with(2, 1024))?;
        assert_eq!(stats.tokens_emitted, 0);
        assert_eq!(stats.index_bytes, 0);

        let (offsets, _) = load_index(dir.path());
        assert!(offsets.is_empty());
        assert_eq!(
            fs::metadata(dir.path().join(POSTINGS_INDEX_FILE)).unwrap().len(),
            0
        );
        Ok(())
    }

    #[test]
    fn test_offsets_entries_are_contiguous() -> Result<()> {
        let dir = tempdir().unwrap();
        let p0: &[u32] = &[0];
        let p1: &[u32] = &[0, 1, 2];
        write_barrels(
            dir.path(),
            1,
            &[(0, 0, 0, p0), (0, 2, 0, p1), (0, 5, 1, p0)],
        );

        build_postings(dir.path(), 6, &config_with(1, 1024))?;
        let (offsets, _) = load_index(dir.path());

        let entries: Vec<OffsetEntry> = offsets.iter().copied().collect();
        assert_eq!(entries[0].offset, 0);
        for pair in entries.windows(2) {
            assert_eq!(pair[1].offset, pair[0].offset + pair[0].length);
        }
        assert_eq!(
            offsets.covered_bytes(),
            fs::metadata(dir.path().join(POSTINGS_INDEX_FILE)).unwrap().len()
        );
        Ok(())
    }

    #[test]
    fn test_offsets_load_rejects_gap() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(POSTINGS_OFFSETS_FILE);

        let mut data = Vec::new();
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());
        data.extend_from_slice(&16u64.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&20u64.to_le_bytes()); // gap: should start at 16
        data.extend_from_slice(&8u64.to_le_bytes());
        fs::write(&path, data).unwrap();

        let err = PostingsOffsets::load(&path).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("offset gap"));
    }

    #[test]
    fn test_no_temp_files_remain_after_build() -> Result<()> {
        let dir = tempdir().unwrap();
        let positions: &[u32] = &[0];
        write_barrels(dir.path(), 1, &[(0, 0, 0, positions)]);

        build_postings(dir.path(), 1, &config_with(1, 1024))?;
        for entry in fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.ends_with(".tmp"), "stale temp file: {}", name);
        }
        Ok(())
    }
}
