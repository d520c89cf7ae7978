//! Chunk delta: the structured summary a chunk reconstruction contributes
//! to the coherence context used by later chunks.

use serde::{Deserialize, Serialize};

use crate::io::unicode::truncate_graphemes;

/// Caps applied when accumulating deltas into a coherence context, bounding
/// prompt growth as more chunks are processed.
pub const MAX_ACCUMULATED_CLAIMS: usize = 15;
/// Cap on accumulated terms carried forward into later prompts.
pub const MAX_ACCUMULATED_TERMS: usize = 20;
/// Cap on accumulated conflicts surfaced in the coherence context.
pub const MAX_ACCUMULATED_CONFLICTS: usize = 5;

/// Structured claims/terms/conflicts extracted from one chunk's
/// reconstruction, used to keep later chunks consistent with earlier ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// New claims this chunk introduced.
    pub claims_introduced: Vec<String>,
    /// New domain terms this chunk introduced.
    pub terms_introduced: Vec<String>,
    /// Conflicts this chunk noticed with earlier material.
    pub conflicts: Vec<String>,
    /// One-line summary of what this chunk covered.
    pub summary: String,
}

impl ChunkDelta {
    /// Builds a delta via lightweight heuristic extraction when the model
    /// did not emit a structured delta: the first sentence becomes the
    /// summary, and no claims/terms/conflicts are asserted.
    #[must_use]
    pub fn synthesize_from_text(text: &str) -> Self {
        let first_sentence = text
            .split(['.', '\n'])
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or_default();
        let summary = truncate_graphemes(first_sentence, 200).to_string();
        Self {
            summary,
            ..Self::default()
        }
    }
}

/// Accumulated coherence context built by folding chunk deltas together,
/// capped so prompts fed to later chunks stay bounded in size.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoherenceContext {
    /// Most recent claims, capped at [`MAX_ACCUMULATED_CLAIMS`].
    pub claims: Vec<String>,
    /// Most recent terms, capped at [`MAX_ACCUMULATED_TERMS`].
    pub terms: Vec<String>,
    /// Most recent conflicts, capped at [`MAX_ACCUMULATED_CONFLICTS`].
    pub conflicts: Vec<String>,
}

impl CoherenceContext {
    /// Folds a newly produced delta into the accumulated context, evicting
    /// the oldest entries once a cap is exceeded.
    ///
    /// Claims and terms are deduplicated by recency: a repeated claim or
    /// term moves to the end (most recent) rather than consuming a second
    /// cap slot, so the accumulated context never wastes capacity on
    /// repetition across chunks.
    pub fn accumulate(&mut self, delta: &ChunkDelta) {
        extend_dedup(&mut self.claims, &delta.claims_introduced);
        extend_dedup(&mut self.terms, &delta.terms_introduced);
        self.conflicts.extend(delta.conflicts.iter().cloned());
        truncate_front(&mut self.claims, MAX_ACCUMULATED_CLAIMS);
        truncate_front(&mut self.terms, MAX_ACCUMULATED_TERMS);
        truncate_front(&mut self.conflicts, MAX_ACCUMULATED_CONFLICTS);
    }

    /// Formats the accumulated context as the prompt block consumed by the
    /// chunk reconstructor, given the number of chunks folded in so far.
    #[must_use]
    pub fn format_summary(&self, chunk_count: usize) -> String {
        if chunk_count == 0 {
            return String::new();
        }
        let mut out = format!("=== PRIOR CHUNKS COHERENCE CONTEXT ({chunk_count} chunks) ===\n");
        out.push_str("ACCUMULATED CLAIMS (must not contradict):\n");
        for claim in &self.claims {
            out.push_str("  - ");
            out.push_str(claim);
            out.push('\n');
        }
        out.push_str("TERMS ALREADY USED (use consistently): ");
        out.push_str(&self.terms.join(", "));
        out.push('\n');
        if !self.conflicts.is_empty() {
            out.push_str("PREVIOUS CONFLICTS DETECTED (avoid repeating):\n");
            for conflict in &self.conflicts {
                out.push_str("  - ");
                out.push_str(conflict);
                out.push('\n');
            }
        }
        out
    }
}

/// Appends `new_items` to `items`, moving any value already present to
/// its new (most recent) position instead of duplicating it, so repeated
/// claims/terms don't consume extra cap slots.
fn extend_dedup(items: &mut Vec<String>, new_items: &[String]) {
    for item in new_items {
        if let Some(pos) = items.iter().position(|existing| existing == item) {
            items.remove(pos);
        }
        items.push(item.clone());
    }
}

/// Drops entries from the front of `items` until its length is `<= cap`.
fn truncate_front(items: &mut Vec<String>, cap: usize) {
    if items.len() > cap {
        let excess = items.len() - cap;
        items.drain(0..excess);
    }
}
