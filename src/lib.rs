//! Offline indexing core for a research-paper search engine.
//!
//! Given a CORD-19-style corpus of per-paper JSON, the pipeline produces a
//! closed set of immutable binary artifacts that together enable
//! constant-time postings retrieval for any vocabulary term:
//!
//! 1. [`lexicon`] - dense token ids in first-observation order
//! 2. [`forward`] - per-document token-id streams plus a doc-id sidecar
//! 3. [`barrels`] - two-pass positional inverted build, partitioned by
//!    document-frequency stratum with a special frequent barrel
//! 4. [`postings`] - spill-bounded aggregation into one seekable postings
//!    file with an offset directory
//! 5. [`heavy`] - positionless fast-path extracts of frequent tokens
//!
//! All multi-byte integers on disk are little-endian; artifacts publish by
//! atomic rename and are never rewritten in place.

pub mod artifact;
pub mod barrels;
pub mod config;
pub mod constants;
pub mod corpus;
pub mod error;
pub mod forward;
pub mod heavy;
pub mod lexicon;
pub mod logging;
pub mod pipeline;
pub mod postings;
pub mod tokenize;
pub mod types;

pub use barrels::{BarrelAssignment, BarrelReader, BarrelWriter};
pub use config::IndexConfig;
pub use error::{IndexError, Result};
pub use forward::ForwardIndexReader;
pub use lexicon::Lexicon;
pub use postings::PostingsOffsets;
pub use tokenize::Tokenizer;
pub use types::{BarrelId, BarrelRecord, DocId, Position, Posting, TokenId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
