//! Document source reader for a CORD-19-style corpus layout.
//!
//! The dataset root holds `pmc_json/` and `pdf_json/` directories of
//! per-paper JSON files. Files are visited in lexicographic path order, PMC
//! first; when both variants exist for one paper the PMC one wins and the
//! PDF one is skipped. Malformed files are skipped with a warning and
//! counted - they never abort a build.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};

const PMC_SUBDIR: &str = "pmc_json";
const PDF_SUBDIR: &str = "pdf_json";

/// One text block of an abstract or body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct PaperJson {
    paper_id: Option<String>,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default, rename = "abstract")]
    abstract_sections: Vec<Section>,
    #[serde(default)]
    body_text: Vec<Section>,
}

/// An owning document record surfaced to the tokenizer.
#[derive(Debug)]
pub struct RawDocument {
    pub paper_id: String,
    pub title: String,
    pub abstract_sections: Vec<Section>,
    pub body_sections: Vec<Section>,
}

impl RawDocument {
    /// Title, abstract texts, and body texts joined with single spaces.
    pub fn combined_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !self.title.is_empty() {
            parts.push(&self.title);
        }
        for section in self.abstract_sections.iter().chain(&self.body_sections) {
            if !section.text.is_empty() {
                parts.push(&section.text);
            }
        }
        parts.join(" ")
    }
}

/// Pull-based reader over the deduplicated corpus file list.
#[derive(Debug)]
pub struct CorpusReader {
    files: Vec<PathBuf>,
    next: usize,
    skipped: usize,
}

impl CorpusReader {
    /// Enumerate the corpus under `input_dir`.
    ///
    /// The root must exist and contain at least one of `pmc_json/` or
    /// `pdf_json/`; an existing-but-empty corpus is valid and yields no
    /// documents.
    pub fn open(input_dir: &Path) -> Result<Self> {
        if !input_dir.is_dir() {
            return Err(IndexError::input_not_found(input_dir));
        }
        let pmc_dir = input_dir.join(PMC_SUBDIR);
        let pdf_dir = input_dir.join(PDF_SUBDIR);
        if !pmc_dir.is_dir() && !pdf_dir.is_dir() {
            return Err(IndexError::input_not_found(input_dir));
        }

        let mut files = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        // PMC first (richer parse), then PDF for papers without a PMC variant.
        for dir in [&pmc_dir, &pdf_dir] {
            for path in sorted_json_files(dir)? {
                if seen.insert(paper_id_from_path(&path)) {
                    files.push(path);
                }
            }
        }

        Ok(CorpusReader {
            files,
            next: 0,
            skipped: 0,
        })
    }

    /// Number of selected files (before any skips during reading).
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Documents skipped so far because they failed to decode.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Next decodable document, skipping malformed files with a warning.
    pub fn next_document(&mut self) -> Option<RawDocument> {
        while self.next < self.files.len() {
            let path = &self.files[self.next];
            self.next += 1;
            match read_document(path) {
                Ok(doc) => return Some(doc),
                Err(err) => {
                    log::warn!("skipping malformed document {}: {}", path.display(), err);
                    self.skipped += 1;
                }
            }
        }
        None
    }
}

impl Iterator for CorpusReader {
    type Item = RawDocument;

    fn next(&mut self) -> Option<RawDocument> {
        self.next_document()
    }
}

fn sorted_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|e| IndexError::io(dir, "read dir", e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IndexError::io(dir, "read dir", e))?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Paper id of a corpus file: the file name up to the first `.`.
fn paper_id_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name.split('.').next().unwrap_or_default().to_string()
}

fn read_document(path: &Path) -> std::result::Result<RawDocument, String> {
    let contents = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let parsed: PaperJson = serde_json::from_str(&contents).map_err(|e| e.to_string())?;

    let paper_id = match parsed.paper_id {
        Some(id) if !id.is_empty() => id,
        _ => paper_id_from_path(path),
    };

    Ok(RawDocument {
        paper_id,
        title: parsed.metadata.title,
        abstract_sections: parsed.abstract_sections,
        body_sections: parsed.body_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_paper(dir: &Path, name: &str, paper_id: &str, title: &str, body: &str) {
        let json = format!(
            r#"{{"paper_id": "{}", "metadata": {{"title": "{}"}}, "abstract": [], "body_text": [{{"text": "{}"}}]}}"#,
            paper_id, title, body
        );
        fs::write(dir.join(name), json).unwrap();
    }

    #[test]
    fn test_missing_root_is_input_not_found() {
        let err = CorpusReader::open(Path::new("/no/such/corpus")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_root_without_source_dirs_is_input_not_found() {
        let dir = tempdir().unwrap();
        let err = CorpusReader::open(dir.path()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_empty_corpus_yields_no_documents() -> Result<()> {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(PMC_SUBDIR)).unwrap();
        let mut reader = CorpusReader::open(dir.path())?;
        assert_eq!(reader.file_count(), 0);
        assert!(reader.next_document().is_none());
        Ok(())
    }

    #[test]
    fn test_pmc_variant_wins_over_pdf() -> Result<()> {
        let dir = tempdir().unwrap();
        let pmc = dir.path().join(PMC_SUBDIR);
        let pdf = dir.path().join(PDF_SUBDIR);
        fs::create_dir(&pmc).unwrap();
        fs::create_dir(&pdf).unwrap();

        write_paper(&pmc, "paper1.xml.json", "paper1", "pmc title", "pmc body");
        write_paper(&pdf, "paper1.json", "paper1", "pdf title", "pdf body");
        write_paper(&pdf, "paper2.json", "paper2", "only pdf", "pdf body");

        let reader = CorpusReader::open(dir.path())?;
        assert_eq!(reader.file_count(), 2);

        let docs: Vec<RawDocument> = reader.collect();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].paper_id, "paper1");
        assert_eq!(docs[0].title, "pmc title");
        assert_eq!(docs[1].paper_id, "paper2");
        Ok(())
    }

    #[test]
    fn test_malformed_document_is_skipped() -> Result<()> {
        let dir = tempdir().unwrap();
        let pmc = dir.path().join(PMC_SUBDIR);
        fs::create_dir(&pmc).unwrap();

        fs::write(pmc.join("broken.json"), b"{ not json").unwrap();
        write_paper(&pmc, "ok.json", "ok", "title", "body");

        let mut reader = CorpusReader::open(dir.path())?;
        let first = reader.next_document().unwrap();
        assert_eq!(first.paper_id, "ok");
        assert!(reader.next_document().is_none());
        assert_eq!(reader.skipped(), 1);
        Ok(())
    }

    #[test]
    fn test_combined_text_joins_with_spaces() {
        let doc = RawDocument {
            paper_id: "p".into(),
            title: "Viral Dynamics".into(),
            abstract_sections: vec![Section {
                text: "We study spread.".into(),
            }],
            body_sections: vec![
                Section {
                    text: "Intro.".into(),
                },
                Section { text: String::new() },
            ],
        };
        assert_eq!(doc.combined_text(), "Viral Dynamics We study spread. Intro.");
    }

    #[test]
    fn test_paper_id_falls_back_to_file_stem() -> Result<()> {
        let dir = tempdir().unwrap();
        let pmc = dir.path().join(PMC_SUBDIR);
        fs::create_dir(&pmc).unwrap();
        fs::write(
            pmc.join("PMC77.xml.json"),
            r#"{"metadata": {"title": "t"}, "abstract": [], "body_text": []}"#,
        )
        .unwrap();

        let mut reader = CorpusReader::open(dir.path())?;
        let doc = reader.next_document().unwrap();
        assert_eq!(doc.paper_id, "PMC77");
        Ok(())
    }
}
