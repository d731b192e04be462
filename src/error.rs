//! Unified error type for the paperdex library.
//!
//! Library code returns `IndexError` so the pipeline driver can map every
//! failure onto the documented process exit codes. CLI command handlers use
//! `anyhow::Result` for convenience and downcast back to `IndexError` when
//! the process exits.
//!
//! # Error Categories
//!
//! - **Config**: invalid configuration value (exit 2)
//! - **InputNotFound**: dataset or required artifact missing (exit 3)
//! - **Corrupt**: artifact fails structural validation - vocabulary miss,
//!   duplicate doc_id, unsorted positions, bad header (exit 4)
//! - **Io**: file system failure with path context (exit 5)

use std::fmt;
use std::path::PathBuf;

/// Unified error type for the paperdex library.
#[derive(Debug)]
pub enum IndexError {
    /// Invalid configuration value, detected at startup.
    Config(String),

    /// Input dataset or a required artifact does not exist.
    InputNotFound { path: PathBuf },

    /// An artifact failed structural validation.
    Corrupt { path: PathBuf, detail: String },

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
    },
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::Config(msg) => write!(f, "Config error: {}", msg),
            IndexError::InputNotFound { path } => {
                write!(f, "Input not found: {}", path.display())
            }
            IndexError::Corrupt { path, detail } => {
                write!(f, "Corrupt artifact '{}': {}", path.display(), detail)
            }
            IndexError::Io {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "I/O error during {} on '{}': {}",
                    operation,
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IndexError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        IndexError::Io {
            path: PathBuf::new(),
            operation: "unknown",
            source: err,
        }
    }
}

/// Convenience type alias for Results using IndexError.
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        IndexError::Config(msg.into())
    }

    /// Create an input-not-found error.
    pub fn input_not_found(path: impl Into<PathBuf>) -> Self {
        IndexError::InputNotFound { path: path.into() }
    }

    /// Create a corruption error with artifact context.
    pub fn corrupt(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        IndexError::Corrupt {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, operation: &'static str, source: std::io::Error) -> Self {
        IndexError::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Process exit code for this error kind.
    ///
    /// 2 = invalid configuration, 3 = input not found, 4 = artifact
    /// corruption, 5 = I/O failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            IndexError::Config(_) => 2,
            IndexError::InputNotFound { .. } => 3,
            IndexError::Corrupt { .. } => 4,
            IndexError::Io { .. } => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(IndexError::config("bad").exit_code(), 2);
        assert_eq!(IndexError::input_not_found("/nope").exit_code(), 3);
        assert_eq!(IndexError::corrupt("/f.bin", "short read").exit_code(), 4);
        let io = IndexError::io(
            "/f.bin",
            "write",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        assert_eq!(io.exit_code(), 5);
    }

    #[test]
    fn test_display_includes_path() {
        let err = IndexError::corrupt("/storage/lexicon.bin", "token_id mismatch at 3");
        let msg = err.to_string();
        assert!(msg.contains("lexicon.bin"));
        assert!(msg.contains("token_id mismatch"));
    }
}
