//! Frequency-bucketed inverted build ("barrels").
//!
//! A two-pass algorithm over the forward index. Pass 1 computes per-token
//! document frequency; tokens are then assigned to barrels - rare tokens in
//! early barrels, progressively more frequent tokens in later barrels, and
//! tokens above the corpus-fraction threshold in a special frequent barrel.
//! Pass 2 streams the forward index again and fans positional posting
//! records out to the per-barrel files.
//!
//! Barrel files are flat record sequences with no header:
//! token_id (u32), doc_id (u32), freq (u32), pos_count (u32), positions.
//! `barrel_mapping.bin` holds the total assignment function:
//! num_barrels (u32), special_freq_barrel_id (u32), mapping_count (u32),
//! then (token_id, barrel_id) pairs for every token id in order.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::artifact;
use crate::constants::{
    barrel_file_name, BARRELS_SUBDIR, BARREL_FREQ_FILE, BARREL_MAPPING_FILE, DF_SCAN_BATCH,
    MAX_NUM_BARRELS, MAX_POSITIONS_PER_POSTING, MAX_VOCAB_SIZE,
};
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::forward::ForwardIndexReader;
use crate::types::{BarrelId, BarrelRecord, DocId, Position, TokenId};

/// Total assignment of token ids to barrels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrelAssignment {
    num_barrels: u32,
    special_id: BarrelId,
    mapping: Vec<BarrelId>,
}

impl BarrelAssignment {
    /// Assign every token a barrel from its document frequency.
    ///
    /// Tokens with `df > threshold · total_docs` (strictly greater) go to
    /// the special barrel. The rest are ranked by ascending df, ties broken
    /// by token id, and mapped through `floor(rank^exponent · B)` so that
    /// rare tokens spread across the early barrels.
    pub fn analyze(df: &[u32], total_docs: u32, config: &IndexConfig) -> Self {
        let num_barrels = config.num_barrels;
        let special_id = num_barrels;
        let tau = config.freq_barrel_threshold * total_docs as f64;

        let mut mapping = vec![0 as BarrelId; df.len()];
        let mut remaining: Vec<(u32, TokenId)> = Vec::new();
        for (token_id, &count) in df.iter().enumerate() {
            if count as f64 > tau {
                mapping[token_id] = special_id;
            } else {
                remaining.push((count, token_id as TokenId));
            }
        }

        // (df, token_id) ascending: deterministic tiebreak by token id.
        remaining.sort_unstable();
        let total = remaining.len();
        for (idx, &(_, token_id)) in remaining.iter().enumerate() {
            let rank = idx as f64 / total as f64;
            let barrel = (rank.powf(config.barrel_exponent) * num_barrels as f64).floor() as u32;
            mapping[token_id as usize] = barrel.min(num_barrels - 1);
        }

        BarrelAssignment {
            num_barrels,
            special_id,
            mapping,
        }
    }

    /// Barrel for a token, or None when the token id is out of range.
    pub fn barrel(&self, token_id: TokenId) -> Option<BarrelId> {
        self.mapping.get(token_id as usize).copied()
    }

    pub fn is_special(&self, token_id: TokenId) -> bool {
        self.barrel(token_id) == Some(self.special_id)
    }

    pub fn num_barrels(&self) -> u32 {
        self.num_barrels
    }

    pub fn special_id(&self) -> BarrelId {
        self.special_id
    }

    pub fn vocab_size(&self) -> u32 {
        self.mapping.len() as u32
    }

    /// Token ids assigned to the special frequent barrel, ascending.
    pub fn special_tokens(&self) -> Vec<TokenId> {
        self.mapping
            .iter()
            .enumerate()
            .filter(|(_, &b)| b == self.special_id)
            .map(|(t, _)| t as TokenId)
            .collect()
    }

    /// Tokens per barrel, indexed by barrel id (special barrel last).
    pub fn histogram(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_barrels as usize + 1];
        for &barrel in &self.mapping {
            counts[barrel as usize] += 1;
        }
        counts
    }

    /// Write `barrel_mapping.bin` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let (mut writer, tmp) = artifact::create_tmp(path)?;
        let write_err = |e| IndexError::io(&tmp, "write", e);

        writer
            .write_all(&self.num_barrels.to_le_bytes())
            .map_err(write_err)?;
        writer
            .write_all(&self.special_id.to_le_bytes())
            .map_err(write_err)?;
        writer
            .write_all(&(self.mapping.len() as u32).to_le_bytes())
            .map_err(write_err)?;
        for (token_id, &barrel_id) in self.mapping.iter().enumerate() {
            writer
                .write_all(&(token_id as u32).to_le_bytes())
                .map_err(write_err)?;
            writer
                .write_all(&barrel_id.to_le_bytes())
                .map_err(write_err)?;
        }

        artifact::publish(writer, &tmp, path)
    }

    /// Read `barrel_mapping.bin` back, validating density and barrel range.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(IndexError::input_not_found(path));
        }
        let file = File::open(path).map_err(|e| IndexError::io(path, "open", e))?;
        let mut reader = BufReader::new(file);
        let mut buf4 = [0u8; 4];
        let mut read_u32 = |reader: &mut BufReader<File>, what: &str| -> Result<u32> {
            reader
                .read_exact(&mut buf4)
                .map_err(|_| IndexError::corrupt(path, format!("truncated {}", what)))?;
            Ok(u32::from_le_bytes(buf4))
        };

        let num_barrels = read_u32(&mut reader, "header")?;
        if num_barrels < 1 || num_barrels > MAX_NUM_BARRELS {
            return Err(IndexError::corrupt(
                path,
                format!("num_barrels {} out of range", num_barrels),
            ));
        }
        let special_id = read_u32(&mut reader, "header")?;
        if special_id != num_barrels {
            return Err(IndexError::corrupt(
                path,
                format!(
                    "special_freq_barrel_id {} does not follow the {} regular barrels",
                    special_id, num_barrels
                ),
            ));
        }
        let mapping_count = read_u32(&mut reader, "header")?;
        if mapping_count > MAX_VOCAB_SIZE {
            return Err(IndexError::corrupt(
                path,
                format!("mapping_count {} exceeds cap {}", mapping_count, MAX_VOCAB_SIZE),
            ));
        }

        let mut mapping = Vec::with_capacity(mapping_count as usize);
        for expected in 0..mapping_count {
            let token_id = read_u32(&mut reader, "mapping entry")?;
            if token_id != expected {
                return Err(IndexError::corrupt(
                    path,
                    format!("token_id {} at entry {}", token_id, expected),
                ));
            }
            let barrel_id = read_u32(&mut reader, "mapping entry")?;
            if barrel_id > special_id {
                return Err(IndexError::corrupt(
                    path,
                    format!("barrel_id {} for token {} out of range", barrel_id, token_id),
                ));
            }
            mapping.push(barrel_id);
        }

        Ok(BarrelAssignment {
            num_barrels,
            special_id,
            mapping,
        })
    }
}

/// Paths of every barrel file under a storage directory, regular barrels
/// first (ascending), special frequent barrel last.
pub fn barrel_paths(storage_dir: &Path, num_barrels: u32) -> Vec<PathBuf> {
    let barrels_dir = storage_dir.join(BARRELS_SUBDIR);
    let mut paths: Vec<PathBuf> = (0..num_barrels)
        .map(|i| barrels_dir.join(barrel_file_name(i)))
        .collect();
    paths.push(barrels_dir.join(BARREL_FREQ_FILE));
    paths
}

/// Buffered fan-out writer over the `num_barrels + 1` barrel files.
///
/// Buffers are flushed at document boundaries so no partial record is ever
/// visible; files publish under their final names only in `finish`.
pub struct BarrelWriter {
    writers: Vec<BufWriter<File>>,
    tmp_paths: Vec<PathBuf>,
    final_paths: Vec<PathBuf>,
    touched: Vec<bool>,
    records_written: u64,
}

impl BarrelWriter {
    pub fn create(storage_dir: &Path, num_barrels: u32) -> Result<Self> {
        let barrels_dir = storage_dir.join(BARRELS_SUBDIR);
        fs::create_dir_all(&barrels_dir).map_err(|e| IndexError::io(&barrels_dir, "mkdir", e))?;

        let final_paths = barrel_paths(storage_dir, num_barrels);
        let mut writers = Vec::with_capacity(final_paths.len());
        let mut tmp_paths = Vec::with_capacity(final_paths.len());
        for path in &final_paths {
            let (writer, tmp) = artifact::create_tmp(path)?;
            writers.push(writer);
            tmp_paths.push(tmp);
        }

        let touched = vec![false; final_paths.len()];
        Ok(BarrelWriter {
            writers,
            tmp_paths,
            final_paths,
            touched,
            records_written: 0,
        })
    }

    /// Append one posting record to its barrel.
    pub fn write_posting(
        &mut self,
        barrel_id: BarrelId,
        token_id: TokenId,
        doc_id: DocId,
        positions: &[Position],
    ) -> Result<()> {
        let slot = barrel_id as usize;
        if slot >= self.writers.len() {
            return Err(IndexError::corrupt(
                &self.final_paths[0],
                format!("barrel_id {} for token {} out of range", barrel_id, token_id),
            ));
        }

        let tmp = &self.tmp_paths[slot];
        let writer = &mut self.writers[slot];
        let write_err = |e| IndexError::io(tmp, "write", e);

        writer.write_all(&token_id.to_le_bytes()).map_err(write_err)?;
        writer.write_all(&doc_id.to_le_bytes()).map_err(write_err)?;
        writer
            .write_all(&(positions.len() as u32).to_le_bytes())
            .map_err(write_err)?;
        writer
            .write_all(&(positions.len() as u32).to_le_bytes())
            .map_err(write_err)?;
        for &pos in positions {
            writer.write_all(&pos.to_le_bytes()).map_err(write_err)?;
        }

        self.touched[slot] = true;
        self.records_written += 1;
        Ok(())
    }

    /// Flush barrels touched since the previous boundary.
    pub fn end_document(&mut self) -> Result<()> {
        for (slot, touched) in self.touched.iter_mut().enumerate() {
            if *touched {
                self.writers[slot]
                    .flush()
                    .map_err(|e| IndexError::io(&self.tmp_paths[slot], "flush", e))?;
                *touched = false;
            }
        }
        Ok(())
    }

    /// Sync every barrel to durable storage, then rename the whole set.
    pub fn finish(self) -> Result<u64> {
        for (writer, tmp) in self.writers.into_iter().zip(&self.tmp_paths) {
            artifact::finish_tmp(writer, tmp)?;
        }
        for (tmp, dest) in self.tmp_paths.iter().zip(&self.final_paths) {
            artifact::rename_into_place(tmp, dest)?;
        }
        Ok(self.records_written)
    }
}

/// Streaming reader over one barrel file's records. Record boundaries are
/// implied by `pos_count`; a file ending mid-record is corruption.
pub struct BarrelReader {
    reader: BufReader<File>,
    path: PathBuf,
}

impl BarrelReader {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(IndexError::input_not_found(path));
        }
        let file = File::open(path).map_err(|e| IndexError::io(path, "open", e))?;
        Ok(BarrelReader {
            reader: BufReader::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Read the next record's leading u32, distinguishing clean EOF (None)
    /// from a mid-field cut.
    fn read_leading_u32(&mut self) -> Result<Option<u32>> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < 4 {
            let n = self
                .reader
                .read(&mut buf[filled..])
                .map_err(|e| IndexError::io(&self.path, "read", e))?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(IndexError::corrupt(&self.path, "truncated record"));
            }
            filled += n;
        }
        Ok(Some(u32::from_le_bytes(buf)))
    }

    fn read_record(&mut self, token_id: TokenId) -> Result<BarrelRecord> {
        let mut buf4 = [0u8; 4];
        let mut read_u32 = |reader: &mut BufReader<File>| -> Result<u32> {
            reader
                .read_exact(&mut buf4)
                .map_err(|_| IndexError::corrupt(&self.path, "truncated record"))?;
            Ok(u32::from_le_bytes(buf4))
        };

        let doc_id = read_u32(&mut self.reader)?;
        let freq = read_u32(&mut self.reader)?;
        let pos_count = read_u32(&mut self.reader)?;
        if pos_count != freq {
            return Err(IndexError::corrupt(
                &self.path,
                format!(
                    "freq {} != pos_count {} for token {} doc {}",
                    freq, pos_count, token_id, doc_id
                ),
            ));
        }
        if pos_count > MAX_POSITIONS_PER_POSTING {
            return Err(IndexError::corrupt(
                &self.path,
                format!("pos_count {} exceeds cap {}", pos_count, MAX_POSITIONS_PER_POSTING),
            ));
        }

        let mut blob = vec![0u8; pos_count as usize * 4];
        self.reader
            .read_exact(&mut blob)
            .map_err(|_| IndexError::corrupt(&self.path, "truncated positions"))?;
        let positions = blob
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(BarrelRecord {
            token_id,
            doc_id,
            freq,
            positions,
        })
    }
}

impl Iterator for BarrelReader {
    type Item = Result<BarrelRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_leading_u32() {
            Ok(Some(token_id)) => Some(self.read_record(token_id)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Statistics from the barrel build.
#[derive(Debug, Default)]
pub struct BarrelBuildStats {
    pub documents_scanned: u32,
    pub vocab_size: u32,
    pub special_tokens: usize,
    pub records_written: u64,
}

/// Two-pass barrel build over `forward_index.bin`.
///
/// Pass 1 accumulates document frequency; the assignment is computed and
/// `barrel_mapping.bin` published before Pass 2 starts writing postings.
pub fn build_barrels(
    forward_path: &Path,
    storage_dir: &Path,
    vocab_size: u32,
    config: &IndexConfig,
) -> Result<BarrelBuildStats> {
    // PASS 1: document frequency. A token occurring N times in one document
    // contributes 1. Documents are decoded in batches; unique-token
    // extraction is parallel, df accumulation sequential.
    let mut reader = ForwardIndexReader::open(forward_path)?;
    let mut df: Vec<u32> = vec![0; vocab_size as usize];
    let mut total_docs: u32 = 0;

    loop {
        let mut batch: Vec<Vec<TokenId>> = Vec::with_capacity(DF_SCAN_BATCH);
        for record in reader.by_ref().take(DF_SCAN_BATCH) {
            let (_, token_ids) = record?;
            batch.push(token_ids);
        }
        if batch.is_empty() {
            break;
        }

        let uniques: Vec<Vec<TokenId>> = batch
            .into_par_iter()
            .map(|mut token_ids| {
                token_ids.sort_unstable();
                token_ids.dedup();
                token_ids
            })
            .collect();

        for unique in uniques {
            total_docs += 1;
            for token_id in unique {
                match df.get_mut(token_id as usize) {
                    Some(count) => *count += 1,
                    None => {
                        return Err(IndexError::corrupt(
                            forward_path,
                            format!(
                                "token_id {} outside vocabulary of size {}",
                                token_id, vocab_size
                            ),
                        ));
                    }
                }
            }
        }
        log::info!("barrels: pass 1 scanned {} documents", total_docs);
    }

    let assignment = BarrelAssignment::analyze(&df, total_docs, config);
    let special_tokens = assignment.special_tokens().len();
    assignment.save(&storage_dir.join(BARREL_MAPPING_FILE))?;
    log::info!(
        "barrels: assigned {} tokens across {} barrels ({} frequent)",
        vocab_size,
        config.num_barrels + 1,
        special_tokens
    );

    // PASS 2: positional postings, fanned out by the published mapping.
    // Per-document grouping is token-id-ordered, so each barrel ends up
    // implicitly sorted by (doc_id, token_id).
    let reader = ForwardIndexReader::open(forward_path)?;
    let mut writer = BarrelWriter::create(storage_dir, config.num_barrels)?;
    let mut docs_written: u32 = 0;

    for record in reader {
        let (doc_id, token_ids) = record?;

        let mut groups: BTreeMap<TokenId, Vec<Position>> = BTreeMap::new();
        for (position, &token_id) in token_ids.iter().enumerate() {
            groups.entry(token_id).or_default().push(position as Position);
        }

        for (token_id, positions) in &groups {
            let barrel_id = assignment.barrel(*token_id).ok_or_else(|| {
                IndexError::corrupt(
                    forward_path,
                    format!("token_id {} has no barrel assignment", token_id),
                )
            })?;
            writer.write_posting(barrel_id, *token_id, doc_id, positions)?;
        }
        writer.end_document()?;

        docs_written += 1;
        if docs_written as usize % (config.log_every * 100) == 0 {
            log::info!("barrels: pass 2 wrote postings for {} documents", docs_written);
        }
    }

    let records_written = writer.finish()?;
    Ok(BarrelBuildStats {
        documents_scanned: total_docs,
        vocab_size,
        special_tokens,
        records_written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_with(num_barrels: u32, threshold: f64) -> IndexConfig {
        let mut config = IndexConfig::default();
        config.num_barrels = num_barrels;
        config.freq_barrel_threshold = threshold;
        config
    }

    #[test]
    fn test_frequent_routing_is_strictly_greater() {
        // D = 100, threshold 5%: df 6 is special, df 5 is not.
        let mut df = vec![1u32; 10];
        df[3] = 6;
        df[7] = 5;
        let assignment = BarrelAssignment::analyze(&df, 100, &config_with(16, 0.05));

        assert!(assignment.is_special(3));
        assert!(!assignment.is_special(7));
        assert_eq!(assignment.special_tokens(), vec![3]);
    }

    #[test]
    fn test_rank_mapping_matches_formula() {
        let df: Vec<u32> = (1..=8).collect();
        let config = config_with(4, 1.0); // threshold 1.0: nothing special
        let assignment = BarrelAssignment::analyze(&df, 8, &config);

        for (idx, token_id) in (0u32..8).enumerate() {
            let rank = idx as f64 / 8.0;
            let expected = ((rank.powf(config.barrel_exponent) * 4.0).floor() as u32).min(3);
            assert_eq!(assignment.barrel(token_id), Some(expected));
        }
    }

    #[test]
    fn test_equal_df_ties_break_by_token_id() {
        // All tokens share df = 1; ranks follow token id, so the mapping is
        // non-decreasing in token id and identical across runs.
        let df = vec![1u32; 100];
        let config = config_with(8, 1.0);
        let a = BarrelAssignment::analyze(&df, 100, &config);
        let b = BarrelAssignment::analyze(&df, 100, &config);
        assert_eq!(a, b);

        let barrels: Vec<BarrelId> = (0..100).map(|t| a.barrel(t).unwrap()).collect();
        assert!(barrels.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(barrels[0], 0);
        assert_eq!(*barrels.last().unwrap(), 7);
    }

    #[test]
    fn test_every_token_gets_exactly_one_barrel() {
        let df = vec![0u32, 1, 50, 2, 50, 3];
        let assignment = BarrelAssignment::analyze(&df, 100, &config_with(16, 0.05));
        assert_eq!(assignment.vocab_size(), 6);
        for token_id in 0..6 {
            let barrel = assignment.barrel(token_id).unwrap();
            assert!(barrel <= assignment.special_id());
        }
        assert_eq!(assignment.histogram().iter().sum::<usize>(), 6);
    }

    #[test]
    fn test_single_barrel_takes_everything_regular() {
        let df = vec![1u32, 2, 3];
        let assignment = BarrelAssignment::analyze(&df, 100, &config_with(1, 1.0));
        for token_id in 0..3 {
            assert_eq!(assignment.barrel(token_id), Some(0));
        }
    }

    #[test]
    fn test_mapping_save_load_roundtrip() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join(BARREL_MAPPING_FILE);

        let df = vec![1u32, 9, 2, 9, 3];
        let assignment = BarrelAssignment::analyze(&df, 10, &config_with(4, 0.5));
        assignment.save(&path)?;

        let loaded = BarrelAssignment::load(&path)?;
        assert_eq!(loaded, assignment);
        Ok(())
    }

    #[test]
    fn test_mapping_load_rejects_bad_special_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(BARREL_MAPPING_FILE);

        let mut data = Vec::new();
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&9u32.to_le_bytes()); // should be 4
        data.extend_from_slice(&0u32.to_le_bytes());
        std::fs::write(&path, data).unwrap();

        let err = BarrelAssignment::load(&path).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_writer_reader_roundtrip() -> Result<()> {
        let dir = tempdir().unwrap();
        let mut writer = BarrelWriter::create(dir.path(), 2)?;

        writer.write_posting(0, 5, 0, &[0, 3])?;
        writer.write_posting(2, 1, 0, &[1])?; // special barrel is id 2
        writer.end_document()?;
        writer.write_posting(0, 5, 1, &[7])?;
        writer.end_document()?;
        assert_eq!(writer.finish()?, 3);

        let paths = barrel_paths(dir.path(), 2);
        let records: Vec<BarrelRecord> =
            BarrelReader::open(&paths[0])?.collect::<Result<_>>()?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].token_id, 5);
        assert_eq!(records[0].doc_id, 0);
        assert_eq!(records[0].freq, 2);
        assert_eq!(records[0].positions, vec![0, 3]);
        assert_eq!(records[1].doc_id, 1);

        let freq_records: Vec<BarrelRecord> =
            BarrelReader::open(&paths[2])?.collect::<Result<_>>()?;
        assert_eq!(freq_records.len(), 1);
        assert_eq!(freq_records[0].token_id, 1);

        // untouched barrel is a valid empty file
        assert_eq!(BarrelReader::open(&paths[1])?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_reader_detects_partial_record() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("barrel_00.bin");

        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes()); // token_id
        data.extend_from_slice(&2u32.to_le_bytes()); // doc_id
        data.extend_from_slice(&3u32.to_le_bytes()); // freq, positions missing
        std::fs::write(&path, data).unwrap();

        let mut reader = BarrelReader::open(&path)?;
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.exit_code(), 4);
        Ok(())
    }

    fn write_forward(dir: &Path, docs: &[Vec<TokenId>]) -> PathBuf {
        let path = dir.join("forward_index.bin");
        let mut data = Vec::new();
        data.extend_from_slice(&(docs.len() as u32).to_le_bytes());
        for (doc_id, token_ids) in docs.iter().enumerate() {
            data.extend_from_slice(&(doc_id as u32).to_le_bytes());
            data.extend_from_slice(&(token_ids.len() as u32).to_le_bytes());
            for &id in token_ids {
                data.extend_from_slice(&id.to_le_bytes());
            }
        }
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_build_barrels_df_counts_distinct_documents() -> Result<()> {
        let dir = tempdir().unwrap();
        // token 0 appears 3 times in doc 0 but only in 1 document total.
        let forward = write_forward(dir.path(), &[vec![0, 0, 0, 1], vec![1, 2]]);

        let config = config_with(2, 1.0);
        let stats = build_barrels(&forward, dir.path(), 3, &config)?;
        assert_eq!(stats.documents_scanned, 2);
        assert_eq!(stats.records_written, 4);

        let assignment = BarrelAssignment::load(&dir.path().join(BARREL_MAPPING_FILE))?;
        // df: token0=1, token1=2, token2=1 → rank order (t0, t2, t1) with
        // ranks 0, 1/3, 2/3 → barrels 0, 1, 1 under rank^0.6 · 2
        assert_eq!(assignment.barrel(0), Some(0));
        assert_eq!(assignment.barrel(2), Some(1));
        assert_eq!(assignment.barrel(1), Some(1));
        Ok(())
    }

    #[test]
    fn test_build_barrels_records_sorted_by_doc_then_token() -> Result<()> {
        let dir = tempdir().unwrap();
        let forward = write_forward(dir.path(), &[vec![2, 0, 2], vec![0, 1]]);

        let config = config_with(1, 1.0);
        build_barrels(&forward, dir.path(), 3, &config)?;

        let paths = barrel_paths(dir.path(), 1);
        let records: Vec<BarrelRecord> =
            BarrelReader::open(&paths[0])?.collect::<Result<_>>()?;
        let keys: Vec<(DocId, TokenId)> =
            records.iter().map(|r| (r.doc_id, r.token_id)).collect();
        assert_eq!(keys, vec![(0, 0), (0, 2), (1, 0), (1, 1)]);

        // positions are per-document filtered indices
        assert_eq!(records[1].positions, vec![0, 2]);
        assert_eq!(records[1].freq, 2);
        Ok(())
    }

    #[test]
    fn test_build_barrels_rejects_out_of_vocab_token() {
        let dir = tempdir().unwrap();
        let forward = write_forward(dir.path(), &[vec![0, 99]]);

        let err = build_barrels(&forward, dir.path(), 3, &config_with(2, 1.0)).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
