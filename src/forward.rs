//! Forward index: per-document token-id streams.
//!
//! The builder re-runs the tokenizer over the corpus with the lexicon held
//! in memory, assigns doc ids sequentially in visitation order, and streams
//! records straight to disk - the corpus is never resident. A sidecar
//! `doc_ids.tsv` maps doc_id to paper_id.
//!
//! On-disk format (`forward_index.bin`, little-endian):
//! - doc_count (u32)
//! - per document: doc_id (u32), token_count (u32), token_ids (u32 each)
//!
//! The doc count is only known at the end, so the builder writes a
//! placeholder header and patches it before publication.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::artifact;
use crate::constants::{DOC_IDS_FILE, FORWARD_INDEX_FILE, LEXICON_FILE, MAX_DOC_TOKENS};
use crate::corpus::CorpusReader;
use crate::error::{IndexError, Result};
use crate::lexicon::Lexicon;
use crate::tokenize::Tokenizer;
use crate::types::{DocId, TokenId};

/// Statistics from the forward-index build.
#[derive(Debug, Default)]
pub struct ForwardBuildStats {
    pub documents_indexed: usize,
    pub documents_skipped: usize,
    pub total_tokens: u64,
}

/// Build `forward_index.bin` and `doc_ids.tsv` under `output_dir`.
///
/// Every token must already be in the lexicon; a miss means the two corpus
/// passes diverged and is fatal corruption.
pub fn build_forward_index(
    input_dir: &Path,
    tokenizer: &Tokenizer,
    lexicon: &Lexicon,
    output_dir: &Path,
    log_every: usize,
    limit: Option<usize>,
) -> Result<ForwardBuildStats> {
    let forward_path = output_dir.join(FORWARD_INDEX_FILE);
    let doc_ids_path = output_dir.join(DOC_IDS_FILE);
    let lexicon_path = output_dir.join(LEXICON_FILE);

    let mut reader = CorpusReader::open(input_dir)?;
    let (mut forward, forward_tmp) = artifact::create_tmp(&forward_path)?;
    let (mut doc_ids, doc_ids_tmp) = artifact::create_tmp(&doc_ids_path)?;

    // Placeholder doc count, patched once the stream is exhausted.
    forward
        .write_all(&0u32.to_le_bytes())
        .map_err(|e| IndexError::io(&forward_tmp, "write", e))?;

    let mut stats = ForwardBuildStats::default();
    let mut next_doc_id: DocId = 0;

    while let Some(doc) = reader.next_document() {
        let tokens = tokenizer.tokenize(&doc.combined_text());
        if tokens.is_empty() {
            stats.documents_skipped += 1;
            continue;
        }

        let doc_id = next_doc_id;
        next_doc_id += 1;

        let mut token_ids: Vec<TokenId> = Vec::with_capacity(tokens.len());
        for token in &tokens {
            match lexicon.get(token) {
                Some(id) => token_ids.push(id),
                None => {
                    return Err(IndexError::corrupt(
                        &lexicon_path,
                        format!(
                            "token '{}' from document '{}' missing from lexicon",
                            token, doc.paper_id
                        ),
                    ));
                }
            }
        }

        write_record(&mut forward, &forward_tmp, doc_id, &token_ids)?;
        writeln!(doc_ids, "{}\t{}", doc_id, doc.paper_id)
            .map_err(|e| IndexError::io(&doc_ids_tmp, "write", e))?;

        stats.documents_indexed += 1;
        stats.total_tokens += token_ids.len() as u64;

        if stats.documents_indexed % log_every == 0 {
            log::info!(
                "forward: {} docs, {} tokens",
                stats.documents_indexed,
                stats.total_tokens
            );
        }
        if limit.is_some_and(|max| stats.documents_indexed >= max) {
            break;
        }
    }
    stats.documents_skipped += reader.skipped();

    // Patch the header with the real count.
    forward
        .seek(SeekFrom::Start(0))
        .map_err(|e| IndexError::io(&forward_tmp, "seek", e))?;
    forward
        .write_all(&next_doc_id.to_le_bytes())
        .map_err(|e| IndexError::io(&forward_tmp, "write", e))?;

    artifact::finish_tmp(forward, &forward_tmp)?;
    artifact::finish_tmp(doc_ids, &doc_ids_tmp)?;
    artifact::rename_into_place(&forward_tmp, &forward_path)?;
    artifact::rename_into_place(&doc_ids_tmp, &doc_ids_path)?;
    Ok(stats)
}

fn write_record(
    writer: &mut impl Write,
    tmp: &Path,
    doc_id: DocId,
    token_ids: &[TokenId],
) -> Result<()> {
    let write_err = |e| IndexError::io(tmp, "write", e);
    writer.write_all(&doc_id.to_le_bytes()).map_err(write_err)?;
    writer
        .write_all(&(token_ids.len() as u32).to_le_bytes())
        .map_err(write_err)?;
    for &id in token_ids {
        writer.write_all(&id.to_le_bytes()).map_err(write_err)?;
    }
    Ok(())
}

/// Streaming reader over forward-index records.
pub struct ForwardIndexReader {
    reader: BufReader<File>,
    path: PathBuf,
    doc_count: u32,
    docs_read: u32,
}

impl ForwardIndexReader {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(IndexError::input_not_found(path));
        }
        let file = File::open(path).map_err(|e| IndexError::io(path, "open", e))?;
        let mut reader = BufReader::new(file);

        let mut buf4 = [0u8; 4];
        reader
            .read_exact(&mut buf4)
            .map_err(|_| IndexError::corrupt(path, "missing doc_count header"))?;
        let doc_count = u32::from_le_bytes(buf4);

        Ok(ForwardIndexReader {
            reader,
            path: path.to_path_buf(),
            doc_count,
            docs_read: 0,
        })
    }

    /// Total documents recorded in the header.
    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    fn read_record(&mut self) -> Result<(DocId, Vec<TokenId>)> {
        let mut buf4 = [0u8; 4];

        self.reader
            .read_exact(&mut buf4)
            .map_err(|_| IndexError::corrupt(&self.path, "truncated record header"))?;
        let doc_id = u32::from_le_bytes(buf4);
        if doc_id != self.docs_read {
            return Err(IndexError::corrupt(
                &self.path,
                format!("doc_id {} at record {}", doc_id, self.docs_read),
            ));
        }

        self.reader
            .read_exact(&mut buf4)
            .map_err(|_| IndexError::corrupt(&self.path, "truncated record header"))?;
        let token_count = u32::from_le_bytes(buf4);
        if token_count > MAX_DOC_TOKENS {
            return Err(IndexError::corrupt(
                &self.path,
                format!(
                    "token_count {} for doc {} exceeds cap {}",
                    token_count, doc_id, MAX_DOC_TOKENS
                ),
            ));
        }

        let mut blob = vec![0u8; token_count as usize * 4];
        self.reader.read_exact(&mut blob).map_err(|_| {
            IndexError::corrupt(&self.path, format!("truncated token ids for doc {}", doc_id))
        })?;
        let token_ids = blob
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok((doc_id, token_ids))
    }
}

impl Iterator for ForwardIndexReader {
    type Item = Result<(DocId, Vec<TokenId>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.docs_read >= self.doc_count {
            return None;
        }
        let record = self.read_record();
        if record.is_ok() {
            self.docs_read += 1;
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize::{load_stopwords, Tokenizer};
    use std::fs;
    use tempfile::tempdir;

    fn make_corpus(docs: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let pmc = dir.path().join("pmc_json");
        fs::create_dir(&pmc).unwrap();
        for (paper_id, body) in docs {
            let json = format!(
                r#"{{"paper_id": "{}", "metadata": {{"title": ""}}, "abstract": [], "body_text": [{{"text": "{}"}}]}}"#,
                paper_id, body
            );
            fs::write(pmc.join(format!("{}.json", paper_id)), json).unwrap();
        }
        dir
    }

    fn build_both(
        input: &Path,
        output: &Path,
        tokenizer: &Tokenizer,
    ) -> Result<(Lexicon, ForwardBuildStats)> {
        let lexicon_path = output.join(LEXICON_FILE);
        crate::lexicon::build_lexicon(input, tokenizer, &lexicon_path, 50, None)?;
        let lexicon = Lexicon::load(&lexicon_path)?;
        let stats = build_forward_index(input, tokenizer, &lexicon, output, 50, None)?;
        Ok((lexicon, stats))
    }

    #[test]
    fn test_forward_roundtrip_two_docs() -> Result<()> {
        let corpus = make_corpus(&[("docA", "alpha beta alpha"), ("docB", "beta gamma")]);
        let out = tempdir().unwrap();
        let tokenizer = Tokenizer::new(Default::default(), 2);

        let (lexicon, stats) = build_both(corpus.path(), out.path(), &tokenizer)?;
        assert_eq!(stats.documents_indexed, 2);
        assert_eq!(lexicon.len(), 3);
        assert_eq!(lexicon.get("alpha"), Some(0));
        assert_eq!(lexicon.get("beta"), Some(1));
        assert_eq!(lexicon.get("gamma"), Some(2));

        let reader = ForwardIndexReader::open(&out.path().join(FORWARD_INDEX_FILE))?;
        assert_eq!(reader.doc_count(), 2);
        let records: Vec<_> = reader.collect::<Result<_>>()?;
        assert_eq!(records[0], (0, vec![0, 1, 0]));
        assert_eq!(records[1], (1, vec![1, 2]));

        let tsv = fs::read_to_string(out.path().join(DOC_IDS_FILE)).unwrap();
        assert_eq!(tsv, "0\tdocA\n1\tdocB\n");
        Ok(())
    }

    #[test]
    fn test_empty_token_docs_leave_no_gap() -> Result<()> {
        // docB tokenizes to nothing and must not consume a doc id.
        let corpus = make_corpus(&[("docA", "alpha"), ("docB", "... !!!"), ("docC", "beta")]);
        let out = tempdir().unwrap();
        let tokenizer = Tokenizer::new(Default::default(), 2);

        let (_, stats) = build_both(corpus.path(), out.path(), &tokenizer)?;
        assert_eq!(stats.documents_indexed, 2);
        assert_eq!(stats.documents_skipped, 1);

        let reader = ForwardIndexReader::open(&out.path().join(FORWARD_INDEX_FILE))?;
        let records: Vec<_> = reader.collect::<Result<_>>()?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, 0);
        assert_eq!(records[1].0, 1);

        let tsv = fs::read_to_string(out.path().join(DOC_IDS_FILE)).unwrap();
        assert_eq!(tsv, "0\tdocA\n1\tdocC\n");
        Ok(())
    }

    #[test]
    fn test_vocabulary_miss_is_fatal() -> Result<()> {
        let corpus = make_corpus(&[("docA", "alpha beta")]);
        let out = tempdir().unwrap();
        let tokenizer = Tokenizer::new(Default::default(), 2);

        // A lexicon that does not know "beta".
        let lexicon_path = out.path().join(LEXICON_FILE);
        let mut partial = Lexicon::new();
        partial.get_or_insert("alpha");
        partial.save(&lexicon_path)?;
        let lexicon = Lexicon::load(&lexicon_path)?;

        let err =
            build_forward_index(corpus.path(), &tokenizer, &lexicon, out.path(), 50, None)
                .unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("beta"));
        Ok(())
    }

    #[test]
    fn test_empty_corpus_writes_wellformed_header() -> Result<()> {
        let corpus = tempdir().unwrap();
        fs::create_dir(corpus.path().join("pmc_json")).unwrap();
        let out = tempdir().unwrap();
        let tokenizer = Tokenizer::new(load_stopwords(None)?, 2);

        let (lexicon, stats) = build_both(corpus.path(), out.path(), &tokenizer)?;
        assert_eq!(stats.documents_indexed, 0);
        assert!(lexicon.is_empty());

        let reader = ForwardIndexReader::open(&out.path().join(FORWARD_INDEX_FILE))?;
        assert_eq!(reader.doc_count(), 0);
        assert_eq!(reader.count(), 0);
        Ok(())
    }

    #[test]
    fn test_reader_detects_truncated_file() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join(FORWARD_INDEX_FILE);

        // Header claims one doc, record cut short.
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&5u32.to_le_bytes()); // 5 token ids promised
        data.extend_from_slice(&9u32.to_le_bytes()); // only 1 present
        fs::write(&path, data).unwrap();

        let mut reader = ForwardIndexReader::open(&path)?;
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.exit_code(), 4);
        Ok(())
    }
}
