//! Stitch result: the best-effort global coherence pass run once after the
//! last chunk completes.

use serde::{Deserialize, Serialize};

use super::current_timestamp;

/// Overall coherence verdict from the stitching pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StitchVerdict {
    /// No significant issues found.
    Coherent,
    /// Minor issues found; the repair plan addresses them inline.
    MinorIssues,
    /// Significant issues found that the repair plan could not fully
    /// resolve; the output is still returned as-is.
    SignificantIssues,
}

/// Result of the stitcher's global validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StitchResult {
    /// Unique identifier (assigned by storage).
    pub id: Option<i64>,
    /// ID of the owning job.
    pub job_id: String,
    /// Direct contradictions found between chunks.
    pub conflicts: Vec<String>,
    /// Terms used inconsistently across chunks.
    pub term_drift: Vec<String>,
    /// Claims referenced without having been established earlier.
    pub missing_premises: Vec<String>,
    /// Redundant passages repeated across chunk boundaries.
    pub redundancies: Vec<String>,
    /// Concrete fixes applied or suggested.
    pub repair_plan: Vec<String>,
    /// Coherence score in `[0.0, 1.0]`.
    pub coherence_score: f32,
    /// Overall verdict derived from the score and issue counts.
    pub verdict: StitchVerdict,
    /// Final concatenated output, after any inline repairs.
    pub final_output: String,
    /// Unix timestamp when the stitch ran.
    pub created_at: i64,
}

impl StitchResult {
    /// Builds a result classifying severity from the issue counts and score.
    #[must_use]
    pub fn new(
        job_id: String,
        conflicts: Vec<String>,
        term_drift: Vec<String>,
        missing_premises: Vec<String>,
        redundancies: Vec<String>,
        repair_plan: Vec<String>,
        coherence_score: f32,
        final_output: String,
    ) -> Self {
        let issue_count =
            conflicts.len() + term_drift.len() + missing_premises.len() + redundancies.len();
        let verdict = if issue_count == 0 && coherence_score >= 0.9 {
            StitchVerdict::Coherent
        } else if coherence_score >= 0.7 {
            StitchVerdict::MinorIssues
        } else {
            StitchVerdict::SignificantIssues
        };
        Self {
            id: None,
            job_id,
            conflicts,
            term_drift,
            missing_premises,
            redundancies,
            repair_plan,
            coherence_score,
            verdict,
            final_output,
            created_at: current_timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coherent_when_clean_and_high_score() {
        let result = StitchResult::new(
            "j1".into(),
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
            0.95,
            "out".into(),
        );
        assert_eq!(result.verdict, StitchVerdict::Coherent);
    }

    #[test]
    fn test_minor_issues_with_moderate_score() {
        let result = StitchResult::new(
            "j1".into(),
            vec!["conflict".into()],
            vec![],
            vec![],
            vec![],
            vec!["fix".into()],
            0.8,
            "out".into(),
        );
        assert_eq!(result.verdict, StitchVerdict::MinorIssues);
    }

    #[test]
    fn test_significant_issues_with_low_score() {
        let result = StitchResult::new(
            "j1".into(),
            vec!["a".into(), "b".into()],
            vec!["c".into()],
            vec![],
            vec![],
            vec![],
            0.4,
            "out".into(),
        );
        assert_eq!(result.verdict, StitchVerdict::SignificantIssues);
    }
}
