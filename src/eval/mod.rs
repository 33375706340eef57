//! Three-way evaluation of generated code.
//!
//! Every case is run once per [`Approach`], in a fixed order:
//!
//! ```text
//! Baseline           → prompt only
//! WithDocumentation  → prompt + fetched reference documentation
//! WithSkill          → prompt + curated skill files
//! ```
//!
//! Each run generates code, executes it when the case needs external
//! effects, scores it, and resets the external state before the next run.

pub mod docs;
pub mod orchestrator;
pub mod prompts;
pub mod report;
pub mod task;

use serde::{Deserialize, Serialize};

pub use docs::{truncate_documentation, DocFetcher, FetchedDoc, HttpDocFetcher, TruncationInfo};
pub use orchestrator::{Orchestrator, OrchestratorSettings, RunPhase};
pub use report::{ApproachSummary, EvalRecord, RunReport};
pub use task::{strip_code_fence, GeneratedCode, TaskRunner};

/// How much context the model gets alongside the task prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    Baseline,
    WithDocumentation,
    WithSkill,
}

impl Approach {
    /// All approaches in run order.
    pub const ALL: [Approach; 3] = [
        Approach::Baseline,
        Approach::WithDocumentation,
        Approach::WithSkill,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Approach::Baseline => "baseline",
            Approach::WithDocumentation => "with_documentation",
            Approach::WithSkill => "with_skill",
        }
    }
}

impl std::fmt::Display for Approach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Approach {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "baseline" | "base" => Ok(Approach::Baseline),
            "with_documentation" | "documentation" | "docs" => Ok(Approach::WithDocumentation),
            "with_skill" | "skill" | "skills" => Ok(Approach::WithSkill),
            other => Err(format!("Unknown approach: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approach_order() {
        assert_eq!(
            Approach::ALL,
            [Approach::Baseline, Approach::WithDocumentation, Approach::WithSkill]
        );
    }

    #[test]
    fn test_approach_from_str() {
        assert_eq!("baseline".parse::<Approach>().unwrap(), Approach::Baseline);
        assert_eq!(
            "with-documentation".parse::<Approach>().unwrap(),
            Approach::WithDocumentation
        );
        assert_eq!("Skill".parse::<Approach>().unwrap(), Approach::WithSkill);
        assert!("agentic".parse::<Approach>().is_err());
    }

    #[test]
    fn test_approach_serde_matches_display() {
        for approach in Approach::ALL {
            let json = serde_json::to_value(approach).unwrap();
            assert_eq!(json, approach.to_string());
        }
    }
}
