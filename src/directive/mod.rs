//! Directive parser: turns a free-text instruction into a structured
//! reconstruction plan.
//!
//! Parsing is pure, deterministic, and idempotent — the same instruction
//! always yields the same plan, and parsing a plan's own rendering back
//! through the parser is a no-op. Malformed or empty instructions never
//! panic; they simply produce an empty plan.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::length::parse_target_length;

/// Length of the prefix used to detect duplicate section names: two
/// requested sections whose canonical names share this many leading
/// characters (case-insensitively) are merged, keeping the first
/// occurrence.
const DUPLICATE_SECTION_PREFIX_LEN: usize = 15;

/// Default structure synthesized for a dissertation/thesis/PhD-class
/// target that named no explicit `sections:`/`chapters:`/`parts:` list.
const DISSERTATION_DEFAULT_SECTIONS: &[&str] = &[
    "Introduction",
    "Literature Review",
    "Methodology",
    "Results",
    "Discussion",
    "Conclusion",
    "References",
    "Appendices",
];

/// Known section-name abbreviations, expanded during canonicalization.
/// Matched against the whole remaining name (after numeral stripping),
/// case-insensitively.
const SECTION_ABBREVIATIONS: &[(&str, &str)] = &[
    ("intro", "Introduction"),
    ("lit review", "Literature Review"),
    ("lit. review", "Literature Review"),
    ("concl", "Conclusion"),
    ("meth", "Methodology"),
];

/// One requested structural section of the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureSection {
    /// Canonical section name (numerals stripped, abbreviations expanded).
    pub name: String,
    /// Explicit word count for this section, or `0` if the instruction
    /// named the section without a length — the Job Controller distributes
    /// the unassigned budget uniformly across such sections.
    pub word_count: usize,
}

/// A requested citation style, parsed from phrases like "with 10 APA
/// citations from the last 5 years".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRequirement {
    /// Citation style, if named (e.g. `"APA"`, `"MLA"`); `"unspecified"`
    /// when citations were requested without naming a style.
    pub citation_type: String,
    /// Requested citation count, or `0` if unspecified.
    pub count: usize,
    /// Requested recency window (e.g. `"last 5 years"`), if named.
    pub timeframe: Option<String>,
}

/// Style/formatting flags recognized in an instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleFlags {
    /// Instruction asked for a formal/academic register.
    pub academic_register: bool,
    /// Instruction asked for prose without bullet-point lists.
    pub no_bullet_points: bool,
    /// Instruction asked for subsections within each section.
    pub internal_subsections: bool,
    /// Instruction asked for a literature review.
    pub literature_review: bool,
}

/// Structured plan derived from a free-text reconstruction instruction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectivePlan {
    /// Parsed target word count, if the instruction named one.
    pub target_word_count: Option<usize>,
    /// Ordered, de-duplicated list of requested sections.
    pub structure: Vec<StructureSection>,
    /// Requested citation style, or `None` if citations weren't mentioned.
    pub citations: Option<CitationRequirement>,
    /// Style flags recognized in the instruction.
    pub flags: StyleFlags,
    /// Named philosophers/thinkers the instruction asked to be referenced.
    pub philosophers_to_reference: Vec<String>,
}

fn structure_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(?i)(?:sections?|chapters?|parts?)\s*:\s*([^.\n]+)").unwrap()
    })
}

fn philosopher_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(?i)reference(?:ing)?\s+([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)?)").unwrap()
    })
}

/// Matches a leading numeral marker on a section name: `"1."`, `"2)"`,
/// `"Chapter III:"`, case-insensitive. The separator after the numeral is
/// mandatory, so a plain name that merely starts with a letter from the
/// Roman-numeral alphabet (e.g. "Introduction", "Conclusion") is never
/// mistaken for a numeral prefix.
fn numeral_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(?i)^(?:chapter|part|section)?\s*(?:\d+|[ivxlcdm]+)[.:)]\s*").unwrap()
    })
}

fn citation_count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(\d+)\s*citations?").unwrap()
    })
}

fn citation_timeframe_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"last\s+\d+\s+years?").unwrap()
    })
}

/// Parses a free-text instruction into a [`DirectivePlan`].
///
/// Never panics. An empty or entirely unparseable instruction yields a
/// default (empty) plan rather than an error — the absence of directives
/// is a valid outcome, not a failure.
#[must_use]
pub fn parse(instruction: &str) -> DirectivePlan {
    let lower = instruction.to_lowercase();
    let target_word_count = parse_target_length(instruction);
    let structure = parse_structure(instruction, &lower);
    let flags = parse_flags(&lower);
    let citations = parse_citations(&lower);
    let philosophers_to_reference = parse_philosophers(instruction);

    DirectivePlan {
        target_word_count,
        structure,
        citations,
        flags,
        philosophers_to_reference,
    }
}

fn parse_structure(instruction: &str, lower: &str) -> Vec<StructureSection> {
    let Some(caps) = structure_regex().captures(instruction) else {
        return default_structure_for(lower);
    };
    let Some(list) = caps.get(1) else {
        return default_structure_for(lower);
    };

    let mut seen_prefixes: Vec<String> = Vec::new();
    let mut sections = Vec::new();
    for raw in list.as_str().split(',') {
        let name = raw.trim();
        if name.is_empty() {
            continue;
        }
        let word_count = parse_target_length(name).unwrap_or(0);
        let canonical = canonicalize_section_name(&strip_length_hint(name));
        let prefix: String = canonical.to_lowercase().chars().take(DUPLICATE_SECTION_PREFIX_LEN).collect();
        if seen_prefixes.contains(&prefix) {
            continue;
        }
        seen_prefixes.push(prefix);
        sections.push(StructureSection { name: canonical, word_count });
    }
    sections
}

/// Synthesizes the default dissertation-class outline when no explicit
/// `sections:`/`chapters:`/`parts:` list was given but the instruction
/// targets a dissertation/thesis/PhD-scale document.
fn default_structure_for(lower: &str) -> Vec<StructureSection> {
    if lower.contains("dissertation") || lower.contains("thesis") || lower.contains("phd") {
        DISSERTATION_DEFAULT_SECTIONS
            .iter()
            .map(|name| StructureSection { name: (*name).to_string(), word_count: 0 })
            .collect()
    } else {
        Vec::new()
    }
}

/// Removes a trailing length hint (e.g. `"(2000 words)"`) from a section
/// name once its word count has been extracted, so the stored name is
/// just the human-readable title.
fn strip_length_hint(name: &str) -> String {
    name.split('(').next().unwrap_or(name).trim().to_string()
}

/// Strips a leading chapter/part numeral (Arabic or Roman) and expands a
/// known abbreviation, producing the canonical name used for storage and
/// duplicate-prefix matching.
fn canonicalize_section_name(name: &str) -> String {
    let stripped = numeral_prefix_regex().replace(name, "").trim().to_string();
    let candidate = if stripped.is_empty() { name.trim().to_string() } else { stripped };
    let lower_candidate = candidate.to_lowercase();

    SECTION_ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| lower_candidate == *abbr)
        .map(|(_, expanded)| (*expanded).to_string())
        .unwrap_or(candidate)
}

fn parse_flags(lower: &str) -> StyleFlags {
    StyleFlags {
        academic_register: lower.contains("formal") || lower.contains("academic"),
        no_bullet_points: lower.contains("no bullet")
            || lower.contains("without bullet")
            || lower.contains("no bullets")
            || lower.contains("avoid bullet"),
        internal_subsections: lower.contains("subsection"),
        literature_review: lower.contains("literature review"),
    }
}

fn parse_citations(lower: &str) -> Option<CitationRequirement> {
    if !(lower.contains("citation") || lower.contains("cite ")) {
        return None;
    }

    const STYLES: &[&str] = &["apa", "mla", "chicago", "ieee", "harvard"];
    let citation_type = STYLES
        .iter()
        .find(|style| lower.contains(**style))
        .map(|style| style.to_uppercase())
        .unwrap_or_else(|| "unspecified".to_string());

    let count = citation_count_regex()
        .captures(lower)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);

    let timeframe = citation_timeframe_regex().find(lower).map(|m| m.as_str().to_string());

    Some(CitationRequirement { citation_type, count, timeframe })
}

fn parse_philosophers(instruction: &str) -> Vec<String> {
    philosopher_regex()
        .captures_iter(instruction)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}
