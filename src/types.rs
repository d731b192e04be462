//! Core identifier and record types used throughout the paperdex library.

/// Dense token identifier in `[0, vocab_size)`, assigned in first-observation
/// order during the lexicon build and immutable afterwards.
pub type TokenId = u32;

/// Dense document identifier in `[0, doc_count)`, assigned in visitation
/// order during the forward-index build.
pub type DocId = u32;

/// 0-based index of a token within its document's filtered token stream.
pub type Position = u32;

/// Barrel identifier in `[0, num_barrels]`; `num_barrels` itself is the
/// special frequent barrel.
pub type BarrelId = u32;

/// One `(doc_id, freq, positions)` entry under a single token.
///
/// # Invariants
/// - `freq == positions.len()`
/// - `positions` is strictly increasing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub freq: u32,
    pub positions: Vec<Position>,
}

/// A posting as stored in a barrel file, with its owning token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrelRecord {
    pub token_id: TokenId,
    pub doc_id: DocId,
    pub freq: u32,
    pub positions: Vec<Position>,
}

impl BarrelRecord {
    /// Strip the token id, keeping the per-document payload.
    pub fn into_posting(self) -> Posting {
        Posting {
            doc_id: self.doc_id,
            freq: self.freq,
            positions: self.positions,
        }
    }
}
