//! Global skeleton: the one-shot, job-wide outline produced before any
//! chunk is reconstructed.

use serde::{Deserialize, Serialize};

/// A single planned section of the reconstructed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonSection {
    /// Stable integer identifier, referenced by `related_section_ids`
    /// elsewhere in the skeleton.
    pub id: usize,
    /// Section title.
    pub title: String,
    /// Key claims this section is expected to establish.
    pub claims: Vec<String>,
    /// Target word count allocated to this section.
    pub target_words: usize,
    /// Domain terms introduced or relied upon by this section.
    pub terms: Vec<String>,
    /// IDs of sections this one depends on or elaborates.
    pub related_section_ids: Vec<usize>,
}

/// The job-wide outline extracted once, before chunk processing begins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalSkeleton {
    /// Ordered sections making up the document plan.
    pub sections: Vec<SkeletonSection>,
}

impl GlobalSkeleton {
    /// Returns `true` if the skeleton has no usable sections — a malformed
    /// result that the skeleton extractor treats as retryable.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.sections.is_empty()
            || self
                .sections
                .iter()
                .any(|s| s.title.trim().is_empty() || s.target_words == 0)
    }

    /// Looks up a section by its stable ID.
    #[must_use]
    pub fn section(&self, id: usize) -> Option<&SkeletonSection> {
        self.sections.iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_skeleton_is_malformed() {
        assert!(GlobalSkeleton::default().is_malformed());
    }

    #[test]
    fn test_well_formed_skeleton() {
        let skeleton = GlobalSkeleton {
            sections: vec![SkeletonSection {
                id: 0,
                title: "Introduction".into(),
                claims: vec!["claim".into()],
                target_words: 500,
                terms: vec!["term".into()],
                related_section_ids: vec![],
            }],
        };
        assert!(!skeleton.is_malformed());
        assert!(skeleton.section(0).is_some());
        assert!(skeleton.section(1).is_none());
    }

    #[test]
    fn test_zero_target_words_is_malformed() {
        let skeleton = GlobalSkeleton {
            sections: vec![SkeletonSection {
                id: 0,
                title: "Intro".into(),
                claims: vec![],
                target_words: 0,
                terms: vec![],
                related_section_ids: vec![],
            }],
        };
        assert!(skeleton.is_malformed());
    }
}
