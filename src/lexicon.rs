//! Lexicon: bijection between normalized tokens and dense token ids.
//!
//! Ids are assigned sequentially in first-observation order while streaming
//! the corpus, so a fixed corpus ordering makes the lexicon deterministic.
//! The mapping is two parallel structures: a hash map for token → id and a
//! vector for id → token.
//!
//! On-disk format (`lexicon.bin`, little-endian):
//! - vocab_size (u32)
//! - per token: token_len (u32), token bytes (UTF-8), token_id (u32)

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use crate::artifact;
use crate::constants::{MAX_TOKEN_BYTES, MAX_VOCAB_SIZE};
use crate::corpus::CorpusReader;
use crate::error::{IndexError, Result};
use crate::tokenize::Tokenizer;
use crate::types::TokenId;

/// Token ↔ id mapping.
#[derive(Debug, Default)]
pub struct Lexicon {
    word2id: HashMap<String, TokenId>,
    id2word: Vec<String>,
}

impl Lexicon {
    pub fn new() -> Self {
        Lexicon::default()
    }

    /// Id for `token`, assigning the next free id on first observation.
    pub fn get_or_insert(&mut self, token: &str) -> TokenId {
        if let Some(&id) = self.word2id.get(token) {
            return id;
        }
        let id = self.id2word.len() as TokenId;
        self.word2id.insert(token.to_string(), id);
        self.id2word.push(token.to_string());
        id
    }

    /// Id for `token` if it is known.
    pub fn get(&self, token: &str) -> Option<TokenId> {
        self.word2id.get(token).copied()
    }

    /// Token for `id` if it is in range.
    pub fn token(&self, id: TokenId) -> Option<&str> {
        self.id2word.get(id as usize).map(|s| s.as_str())
    }

    /// Vocabulary size.
    pub fn len(&self) -> usize {
        self.id2word.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2word.is_empty()
    }

    /// Write `lexicon.bin` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        if self.id2word.len() > MAX_VOCAB_SIZE as usize {
            return Err(IndexError::corrupt(
                path,
                format!(
                    "vocabulary size {} exceeds cap {}",
                    self.id2word.len(),
                    MAX_VOCAB_SIZE
                ),
            ));
        }

        let (mut writer, tmp) = artifact::create_tmp(path)?;
        let write_err = |e| IndexError::io(&tmp, "write", e);

        writer
            .write_all(&(self.id2word.len() as u32).to_le_bytes())
            .map_err(write_err)?;
        for (token_id, token) in self.id2word.iter().enumerate() {
            let bytes = token.as_bytes();
            writer
                .write_all(&(bytes.len() as u32).to_le_bytes())
                .map_err(write_err)?;
            writer.write_all(bytes).map_err(write_err)?;
            writer
                .write_all(&(token_id as u32).to_le_bytes())
                .map_err(write_err)?;
        }

        artifact::publish(writer, &tmp, path)
    }

    /// Read `lexicon.bin` back, validating structure. Ids must be dense and
    /// equal to entry position; tokens must be unique valid UTF-8.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(IndexError::input_not_found(path));
        }
        let file = File::open(path).map_err(|e| IndexError::io(path, "open", e))?;
        let mut reader = BufReader::new(file);
        let mut buf4 = [0u8; 4];

        reader
            .read_exact(&mut buf4)
            .map_err(|e| IndexError::io(path, "read", e))?;
        let vocab_size = u32::from_le_bytes(buf4);
        if vocab_size > MAX_VOCAB_SIZE {
            return Err(IndexError::corrupt(
                path,
                format!("vocab_size {} exceeds cap {}", vocab_size, MAX_VOCAB_SIZE),
            ));
        }

        let mut word2id = HashMap::with_capacity(vocab_size as usize);
        let mut id2word = Vec::with_capacity(vocab_size as usize);

        for expected_id in 0..vocab_size {
            reader
                .read_exact(&mut buf4)
                .map_err(|_| IndexError::corrupt(path, "truncated token entry"))?;
            let token_len = u32::from_le_bytes(buf4) as usize;
            if token_len > MAX_TOKEN_BYTES {
                return Err(IndexError::corrupt(
                    path,
                    format!("token length {} exceeds cap {}", token_len, MAX_TOKEN_BYTES),
                ));
            }

            let mut token_buf = vec![0u8; token_len];
            reader
                .read_exact(&mut token_buf)
                .map_err(|_| IndexError::corrupt(path, "truncated token bytes"))?;
            let token = String::from_utf8(token_buf).map_err(|_| {
                IndexError::corrupt(path, format!("token {} is not valid UTF-8", expected_id))
            })?;

            reader
                .read_exact(&mut buf4)
                .map_err(|_| IndexError::corrupt(path, "truncated token id"))?;
            let token_id = u32::from_le_bytes(buf4);
            if token_id != expected_id {
                return Err(IndexError::corrupt(
                    path,
                    format!("token_id {} at entry {}", token_id, expected_id),
                ));
            }

            if word2id.insert(token.clone(), token_id).is_some() {
                return Err(IndexError::corrupt(
                    path,
                    format!("duplicate token '{}'", token),
                ));
            }
            id2word.push(token);
        }

        // Fail closed on trailing garbage.
        let mut probe = [0u8; 1];
        match reader.read(&mut probe) {
            Ok(0) => {}
            Ok(_) => {
                return Err(IndexError::corrupt(path, "trailing bytes after last entry"));
            }
            Err(e) => return Err(IndexError::io(path, "read", e)),
        }

        Ok(Lexicon { word2id, id2word })
    }
}

/// Statistics from the lexicon build.
#[derive(Debug, Default)]
pub struct LexiconBuildStats {
    pub documents_indexed: usize,
    pub documents_skipped: usize,
    pub vocab_size: usize,
    pub total_tokens: u64,
}

/// Stream the corpus once, assign token ids in observation order, and write
/// `lexicon.bin`. Documents whose filtered token stream is empty are skipped
/// (the forward-index pass makes the same decision, keeping ids aligned).
pub fn build_lexicon(
    input_dir: &Path,
    tokenizer: &Tokenizer,
    output_path: &Path,
    log_every: usize,
    limit: Option<usize>,
) -> Result<LexiconBuildStats> {
    let mut reader = CorpusReader::open(input_dir)?;
    let mut lexicon = Lexicon::new();
    let mut stats = LexiconBuildStats::default();

    while let Some(doc) = reader.next_document() {
        let tokens = tokenizer.tokenize(&doc.combined_text());
        if tokens.is_empty() {
            stats.documents_skipped += 1;
            continue;
        }

        for token in &tokens {
            lexicon.get_or_insert(token);
        }
        stats.documents_indexed += 1;
        stats.total_tokens += tokens.len() as u64;

        if stats.documents_indexed % log_every == 0 {
            log::info!(
                "lexicon: {} docs, vocab={}",
                stats.documents_indexed,
                lexicon.len()
            );
        }
        if limit.is_some_and(|max| stats.documents_indexed >= max) {
            break;
        }
    }

    stats.documents_skipped += reader.skipped();
    stats.vocab_size = lexicon.len();
    lexicon.save(output_path)?;
    Ok(stats)
}
