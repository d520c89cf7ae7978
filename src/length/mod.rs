//! Length utilities: word counting, target-length parsing, and length-band
//! configuration shared by the directive parser, chunker, and length
//! enforcer.

use serde::{Deserialize, Serialize};

/// Minimum accepted source word count.
pub const MIN_INPUT_WORDS: usize = 501;
/// Maximum accepted source word count.
pub const MAX_INPUT_WORDS: usize = 50_000;

/// Floor on a chunk's target word count.
pub const CHUNK_TARGET_FLOOR: usize = 200;
/// Ratio applied to compute a chunk's lower length-band bound.
pub const BAND_LOWER_RATIO: f64 = 0.85;
/// Ratio applied to compute a chunk's upper length-band bound.
pub const BAND_UPPER_RATIO: f64 = 1.15;

/// Default target word count used when an instruction names no explicit
/// length and no keyword default applies.
pub const DEFAULT_TARGET_WORDS: usize = 5_000;

/// Reconstruction mode implied by the relationship between the source
/// length and the requested target length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthMode {
    /// Target is notably shorter than the source.
    Compress,
    /// Target is close to the source length.
    Preserve,
    /// Target is notably longer than the source.
    Expand,
    /// An explicit target word count was given in the instruction.
    Custom,
}

/// Resolved length configuration for a job: target word count, the
/// source/target ratio, and the derived per-chunk target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LengthConfig {
    /// Overall target word count for the reconstructed document.
    pub target: usize,
    /// `target / source_words`, informational.
    pub ratio: f64,
    /// Reconstruction mode implied by the ratio.
    pub mode: LengthMode,
    /// Target word count per chunk.
    pub chunk_target: usize,
    /// Planned number of chunks.
    pub num_chunks: usize,
}

impl LengthConfig {
    /// Builds a length config for an explicit target with no known source
    /// length (used by tests and the CLI's one-shot mode).
    #[must_use]
    pub fn new(target: usize) -> Self {
        Self {
            target,
            ratio: 1.0,
            mode: LengthMode::Custom,
            chunk_target: target.max(CHUNK_TARGET_FLOOR),
            num_chunks: 1,
        }
    }
}

/// Counts words by splitting on Unicode whitespace.
///
/// This is the single word-counting primitive used throughout the
/// pipeline: parsing the input-length invariant, computing length bands,
/// and deciding whether a chunk's output falls within its band.
#[must_use]
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Parses a free-text target-length phrase into a word count.
///
/// Recognizes shorthand (`"20k"`, `"2.5K words"`), comma-grouped and plain
/// integers (`"3,500 words"`, `"1500 words"`), `"N-M words"` ranges (taken
/// as the midpoint), and keyword defaults (`"dissertation"`/`"PhD"` ->
/// 40000, `"thesis"`/`"master's"` -> 20000, `"essay"` -> 2000, `"summary"`
/// -> 500). A bare number under 500 combined with "thesis" is treated as
/// thousands (`"a 50 page thesis"` -> 50000). Returns `None` if no length
/// cue is found.
#[must_use]
pub fn parse_target_length(text: &str) -> Option<usize> {
    let lower = text.to_lowercase();

    parse_shorthand(&lower)
        .or_else(|| parse_range(&lower))
        .or_else(|| parse_plain_number(&lower))
        .or_else(|| parse_bare_thesis_heuristic(&lower))
        .or_else(|| parse_keyword_default(&lower))
}

fn parse_shorthand(lower: &str) -> Option<usize> {
    let re = regex::Regex::new(r"(\d+(?:\.\d+)?)\s*k\b").ok()?;
    re.captures(lower)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|n| (n * 1000.0).round() as usize)
}

/// Matches a `"N-M words"` / `"N–M words"` range and returns the midpoint.
/// Tried before [`parse_plain_number`] so the trailing number of a range
/// ("3000-5000 words") isn't mistaken for a single plain number.
fn parse_range(lower: &str) -> Option<usize> {
    let re = regex::Regex::new(r"(\d{1,3}(?:,\d{3})*)\s*[-\u{2013}]\s*(\d{1,3}(?:,\d{3})*)\s*(?:words?|word count)")
        .ok()?;
    let caps = re.captures(lower)?;
    let low: usize = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
    let high: usize = caps.get(2)?.as_str().replace(',', "").parse().ok()?;
    Some((low + high) / 2)
}

/// Matches a comma-grouped (`"3,500 words"`) or plain (`"1500 words"`)
/// integer immediately followed by a word-count unit.
fn parse_plain_number(lower: &str) -> Option<usize> {
    let re = regex::Regex::new(r"(\d{1,3}(?:,\d{3})+|\d{3,6})\s*(?:words?|word count)").ok()?;
    re.captures(lower)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse::<usize>().ok())
}

/// A bare number under 500 alongside "thesis" is read as thousands of
/// words, e.g. "write a 50 page thesis" -> 50000.
fn parse_bare_thesis_heuristic(lower: &str) -> Option<usize> {
    if !lower.contains("thesis") {
        return None;
    }
    let re = regex::Regex::new(r"\b(\d{1,3})\b").ok()?;
    re.captures(lower)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .filter(|&n| n > 0 && n < 500)
        .map(|n| n * 1000)
}

fn parse_keyword_default(lower: &str) -> Option<usize> {
    const KEYWORDS: &[(&str, usize)] = &[
        ("dissertation", 40_000),
        ("phd", 40_000),
        ("master's", 20_000),
        ("masters", 20_000),
        ("thesis", 20_000),
        ("essay", 2_000),
        ("summary", 500),
        ("abstract", 250),
    ];
    KEYWORDS
        .iter()
        .find(|(kw, _)| lower.contains(kw))
        .map(|(_, words)| *words)
}

/// Computes a job's [`LengthConfig`] from an instruction and the source
/// document's word count.
///
/// `target` resolves from [`parse_target_length`], falling back to
/// [`DEFAULT_TARGET_WORDS`]. The per-chunk target is `target /
/// num_chunks`, floored at [`CHUNK_TARGET_FLOOR`] and never exceeding
/// twice the target word count.
#[must_use]
pub fn calculate_length_config(instruction: &str, source_words: usize, num_chunks: usize) -> LengthConfig {
    let target = parse_target_length(instruction).unwrap_or(DEFAULT_TARGET_WORDS);
    let ratio = if source_words == 0 {
        1.0
    } else {
        target as f64 / source_words as f64
    };
    let mode = if parse_target_length(instruction).is_some() {
        LengthMode::Custom
    } else if ratio < 0.7 {
        LengthMode::Compress
    } else if ratio > 1.3 {
        LengthMode::Expand
    } else {
        LengthMode::Preserve
    };
    let chunks = num_chunks.max(1);
    let chunk_target = (target / chunks).max(CHUNK_TARGET_FLOOR).min(target.max(1) * 2);

    LengthConfig {
        target,
        ratio,
        mode,
        chunk_target,
        num_chunks: chunks,
    }
}

/// Computes the accepted `[min, max]` band for a target word count, using
/// [`BAND_LOWER_RATIO`] / [`BAND_UPPER_RATIO`].
#[must_use]
pub fn length_band(target: usize) -> (usize, usize) {
    let min = (target as f64 * BAND_LOWER_RATIO).round() as usize;
    let max = (target as f64 * BAND_UPPER_RATIO).round() as usize;
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_words_basic() {
        assert_eq!(count_words("one two three"), 3);
        assert_eq!(count_words("  leading   and   trailing  "), 2);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn test_parse_shorthand() {
        assert_eq!(parse_target_length("expand to 20k words"), Some(20_000));
        assert_eq!(parse_target_length("about 2.5K words"), Some(2_500));
    }

    #[test]
    fn test_parse_plain_number() {
        assert_eq!(parse_target_length("target 1500 words"), Some(1_500));
    }

    #[test]
    fn test_parse_comma_grouped_number() {
        assert_eq!(parse_target_length("rewrite this to 3,500 words"), Some(3_500));
        assert_eq!(parse_target_length("expand to 12,000 words total"), Some(12_000));
    }

    #[test]
    fn test_parse_range_takes_midpoint() {
        assert_eq!(parse_target_length("expand to 3000-5000 words"), Some(4_000));
        assert_eq!(parse_target_length("aim for 3,000\u{2013}5,000 words"), Some(4_000));
    }

    #[test]
    fn test_parse_bare_number_with_thesis_is_multiplied_by_1000() {
        assert_eq!(parse_target_length("write a 50 page thesis"), Some(50_000));
    }

    #[test]
    fn test_bare_number_without_thesis_is_not_multiplied() {
        assert_eq!(parse_target_length("write a 50 page essay"), Some(2_000));
    }

    #[test]
    fn test_parse_keyword_default() {
        assert_eq!(parse_target_length("turn this into a thesis"), Some(20_000));
        assert_eq!(parse_target_length("write a dissertation chapter"), Some(40_000));
        assert_eq!(parse_target_length("prepare my PhD submission"), Some(40_000));
        assert_eq!(parse_target_length("this is for my master's"), Some(20_000));
    }

    #[test]
    fn test_parse_target_length_none() {
        assert_eq!(parse_target_length("just rewrite this please"), None);
    }

    #[test]
    fn test_calculate_length_config_uses_default_without_cue() {
        let cfg = calculate_length_config("rewrite this clearly", 3_000, 3);
        assert_eq!(cfg.target, DEFAULT_TARGET_WORDS);
        assert_eq!(cfg.mode, LengthMode::Preserve);
    }

    #[test]
    fn test_calculate_length_config_explicit_target_is_custom() {
        let cfg = calculate_length_config("expand to 20000 words", 3_000, 4);
        assert_eq!(cfg.target, 20_000);
        assert_eq!(cfg.mode, LengthMode::Custom);
        assert_eq!(cfg.chunk_target, 5_000);
    }

    #[test]
    fn test_calculate_length_config_chunk_target_floor() {
        let cfg = calculate_length_config("500 words", 400, 10);
        assert_eq!(cfg.chunk_target, CHUNK_TARGET_FLOOR);
    }

    #[test]
    fn test_length_band() {
        let (min, max) = length_band(1_000);
        assert_eq!(min, 850);
        assert_eq!(max, 1_150);
    }
}
