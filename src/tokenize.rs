//! Text normalization and tokenization.
//!
//! A token is a run of alphanumeric code points after NFKC normalization
//! and lowercasing. Stop-words and tokens shorter than the configured
//! minimum are dropped; positions downstream are indices into the filtered
//! stream.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

use crate::error::{IndexError, Result};

/// Built-in base stop-word list, extended by an optional user file.
const BASE_STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "while", "to", "of", "in", "for", "on", "with",
    "as", "by", "is", "it", "this", "that", "be", "are", "from",
];

/// NFKC-normalize and lowercase a single word, as applied to both corpus
/// text and stop-word entries.
fn normalize_word(word: &str) -> String {
    word.nfkc().collect::<String>().to_lowercase()
}

/// Load the stop-word set: the built-in base list plus an optional file with
/// one word per line (blank lines ignored). Every entry goes through the
/// same normalization as corpus text.
pub fn load_stopwords(extra_file: Option<&Path>) -> Result<HashSet<String>> {
    let mut words: HashSet<String> = BASE_STOPWORDS.iter().map(|w| normalize_word(w)).collect();

    if let Some(path) = extra_file {
        if !path.is_file() {
            return Err(IndexError::input_not_found(path));
        }
        let contents =
            fs::read_to_string(path).map_err(|e| IndexError::io(path, "read stopwords", e))?;
        for line in contents.lines() {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                words.insert(normalize_word(trimmed));
            }
        }
    }

    Ok(words)
}

/// Tokenizer configured with a stop-word set and a minimum token length.
pub struct Tokenizer {
    stopwords: HashSet<String>,
    min_token_len: usize,
}

impl Tokenizer {
    pub fn new(stopwords: HashSet<String>, min_token_len: usize) -> Self {
        Tokenizer {
            stopwords,
            min_token_len,
        }
    }

    /// Split `text` into filtered tokens. Position of a token is its index
    /// in the returned vector.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();

        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut current_chars = 0usize;

        for ch in normalized.chars() {
            if ch.is_alphanumeric() {
                current.push(ch);
                current_chars += 1;
            } else {
                self.flush(&mut tokens, &mut current, &mut current_chars);
            }
        }
        self.flush(&mut tokens, &mut current, &mut current_chars);

        tokens
    }

    fn flush(&self, tokens: &mut Vec<String>, current: &mut String, current_chars: &mut usize) {
        if *current_chars >= self.min_token_len && !self.stopwords.contains(current.as_str()) {
            tokens.push(std::mem::take(current));
        } else {
            current.clear();
        }
        *current_chars = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer_with(stopwords: &[&str], min_len: usize) -> Tokenizer {
        Tokenizer::new(stopwords.iter().map(|w| normalize_word(w)).collect(), min_len)
    }

    #[test]
    fn test_basic_split_and_lowercase() {
        let t = tokenizer_with(&[], 2);
        assert_eq!(
            t.tokenize("Alpha beta-GAMMA, delta."),
            vec!["alpha", "beta", "gamma", "delta"]
        );
    }

    #[test]
    fn test_stopword_positions_are_post_filter() {
        // "the quick the fox" with stop-word {the} yields [quick, fox];
        // their positions (vector indices) are 0 and 1.
        let t = tokenizer_with(&["the"], 2);
        assert_eq!(t.tokenize("the quick the fox"), vec!["quick", "fox"]);
    }

    #[test]
    fn test_min_length_filter() {
        let t = tokenizer_with(&[], 2);
        assert_eq!(t.tokenize("a bc d ef"), vec!["bc", "ef"]);

        let t1 = tokenizer_with(&[], 1);
        assert_eq!(t1.tokenize("a bc d ef"), vec!["a", "bc", "d", "ef"]);
    }

    #[test]
    fn test_digits_are_tokens() {
        let t = tokenizer_with(&[], 2);
        assert_eq!(t.tokenize("covid-19 h1n1"), vec!["covid", "19", "h1n1"]);
    }

    #[test]
    fn test_nfkc_folds_compatibility_forms() {
        // The ligature ﬁ (U+FB01) normalizes to "fi" under NFKC.
        let t = tokenizer_with(&[], 2);
        assert_eq!(t.tokenize("ﬁnding"), vec!["finding"]);
        // Fullwidth letters fold to ASCII.
        assert_eq!(t.tokenize("ＶＩＲＵＳ"), vec!["virus"]);
    }

    #[test]
    fn test_stopword_match_is_case_insensitive() {
        let t = tokenizer_with(&["the"], 2);
        assert_eq!(t.tokenize("THE The the cat"), vec!["cat"]);
    }

    #[test]
    fn test_empty_and_symbol_only_text() {
        let t = tokenizer_with(&[], 2);
        assert!(t.tokenize("").is_empty());
        assert!(t.tokenize("--- !!! ...").is_empty());
    }

    #[test]
    fn test_load_stopwords_includes_base_list() {
        let words = load_stopwords(None).unwrap();
        assert!(words.contains("the"));
        assert!(words.contains("from"));
    }

    #[test]
    fn test_load_stopwords_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stop.txt");
        std::fs::write(&path, "Virus\n\n  CELL  \n").unwrap();

        let words = load_stopwords(Some(&path)).unwrap();
        assert!(words.contains("virus"));
        assert!(words.contains("cell"));
        assert!(words.contains("the"));
    }

    #[test]
    fn test_missing_stopword_file_is_error() {
        let err = load_stopwords(Some(Path::new("/no/such/stop.txt"))).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
