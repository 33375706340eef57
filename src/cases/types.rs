//! Typed representation of declarative evaluation cases.
//!
//! Field names follow the camelCase keys used in case files. Every struct
//! denies unknown fields; the schema validator reports those with full paths
//! before deserialization is attempted.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A value that may be written either as a single item or as a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Borrow the items as a slice regardless of representation.
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items.as_slice(),
        }
    }
}

/// One evaluation scenario: a prompt, expected assertions, and cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvalCase {
    /// Unique case identifier.
    pub name: String,
    /// Tags used for filtering.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Prompt inputs.
    pub input: CaseInput,
    /// Expected assertions, grouped by category.
    #[serde(default)]
    pub expected: Expectations,
    /// External-state reset to run around each evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupSpec>,
    /// Directory of the file the case was loaded from.
    #[serde(skip)]
    pub source_dir: PathBuf,
}

impl EvalCase {
    /// Whether the generated code has to be executed for this case.
    pub fn needs_execution(&self) -> bool {
        self.expected.execution_requested() || self.expected.search_index().is_some()
    }

    /// Whether any of the given tags is attached to this case.
    /// An empty filter matches every case.
    pub fn matches_tags(&self, filter: &[String]) -> bool {
        filter.is_empty() || filter.iter().any(|t| self.tags.contains(t))
    }

    /// Skill file paths resolved against the case file's directory.
    pub fn resolved_skill_files(&self) -> Vec<PathBuf> {
        self.input
            .skill_files()
            .iter()
            .map(|p| resolve_path(&self.source_dir, p))
            .collect()
    }

    /// Search index the cleanup coordinator should drop, if any.
    pub fn cleanup_target(&self) -> Option<&SearchIndexRef> {
        self.cleanup.as_ref().and_then(|c| c.drop_search_index.as_ref())
    }
}

fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

/// Prompt inputs for a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CaseInput {
    /// Task prompt given to the model.
    pub prompt: String,
    /// Reference documentation URL for the with-documentation approach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_link: Option<String>,
    /// Skill file(s) for the with-skill approach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_files: Option<OneOrMany<String>>,
}

impl CaseInput {
    pub fn skill_files(&self) -> &[String] {
        self.skill_files
            .as_ref()
            .map(OneOrMany::as_slice)
            .unwrap_or(&[])
    }
}

/// Expected assertions. Each group is optional and opt-in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expectations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax: Option<SyntaxExpectation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticExpectation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionExpectation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultExpectation>,
}

impl Expectations {
    pub fn wants_valid_js(&self) -> bool {
        self.syntax
            .as_ref()
            .and_then(|s| s.is_valid_js)
            .unwrap_or(false)
    }

    pub fn wants_async_await(&self) -> bool {
        self.syntax
            .as_ref()
            .and_then(|s| s.has_async_await)
            .unwrap_or(false)
    }

    pub fn must_contain(&self) -> &[PatternCheck] {
        self.semantic
            .as_ref()
            .and_then(|s| s.must_contain.as_deref())
            .unwrap_or(&[])
    }

    pub fn must_not_contain(&self) -> &[PatternCheck] {
        self.semantic
            .as_ref()
            .and_then(|s| s.must_not_contain.as_deref())
            .unwrap_or(&[])
    }

    pub fn execution_requested(&self) -> bool {
        self.execution
            .as_ref()
            .and_then(|e| e.should_succeed)
            .unwrap_or(false)
    }

    pub fn search_index(&self) -> Option<&SearchIndexExpectation> {
        self.result
            .as_ref()
            .and_then(|r| r.search_index_exists.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SyntaxExpectation {
    #[serde(rename = "isValidJS", default, skip_serializing_if = "Option::is_none")]
    pub is_valid_js: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_async_await: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SemanticExpectation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_contain: Option<Vec<PatternCheck>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_not_contain: Option<Vec<PatternCheck>>,
}

/// A literal substring check with the name its score is reported under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternCheck {
    pub pattern: String,
    pub name: String,
}

impl PatternCheck {
    pub fn new(pattern: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExecutionExpectation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_succeed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResultExpectation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_index_exists: Option<SearchIndexExpectation>,
}

/// Expected search index, with optional dot-path addressed config checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchIndexExpectation {
    pub database: String,
    pub collection: String,
    pub index_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, serde_json::Value>,
}

impl SearchIndexExpectation {
    pub fn target(&self) -> SearchIndexRef {
        SearchIndexRef {
            database: self.database.clone(),
            collection: self.collection.clone(),
            index_name: self.index_name.clone(),
        }
    }
}

/// Post-run external-state reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CleanupSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_search_index: Option<SearchIndexRef>,
}

/// Fully qualified search index name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchIndexRef {
    pub database: String,
    pub collection: String,
    pub index_name: String,
}

impl SearchIndexRef {
    pub fn new(
        database: impl Into<String>,
        collection: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            index_name: index_name.into(),
        }
    }

    /// `database.collection` namespace string.
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

impl std::fmt::Display for SearchIndexRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}/{}", self.database, self.collection, self.index_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CASE_YAML: &str = r#"
name: create-vector-index
tags: [atlas-search, indexes]
input:
  prompt: Create a search index named movies_idx.
  docLink: https://www.mongodb.com/docs/atlas/atlas-search/
  skillFiles: skills/search.md
expected:
  syntax:
    isValidJS: true
    hasAsyncAwait: true
  semantic:
    mustContain:
      - pattern: ".createSearchIndex("
        name: UsesCreate
  execution:
    shouldSucceed: true
  result:
    searchIndexExists:
      database: sample_mflix
      collection: movies
      indexName: movies_idx
      config:
        mappings.dynamic: true
cleanup:
  dropSearchIndex:
    database: sample_mflix
    collection: movies
    indexName: movies_idx
"#;

    #[test]
    fn test_deserialize_full_case() {
        let case: EvalCase = serde_yaml::from_str(CASE_YAML).expect("case should parse");

        assert_eq!(case.name, "create-vector-index");
        assert!(case.tags.contains("indexes"));
        assert_eq!(
            case.input.skill_files().to_vec(),
            vec!["skills/search.md".to_string()]
        );
        assert!(case.expected.wants_valid_js());
        assert!(case.expected.wants_async_await());
        assert_eq!(case.expected.must_contain().len(), 1);
        assert!(case.expected.must_not_contain().is_empty());
        assert!(case.needs_execution());

        let index = case.expected.search_index().expect("result expectation");
        assert_eq!(
            index.config.get("mappings.dynamic"),
            Some(&serde_json::Value::Bool(true))
        );
        assert_eq!(
            case.cleanup_target().map(|t| t.namespace()),
            Some("sample_mflix.movies".to_string())
        );
    }

    #[test]
    fn test_skill_files_list_form() {
        let input: CaseInput =
            serde_yaml::from_str("prompt: p\nskillFiles: [a.md, b.md]").expect("should parse");
        assert_eq!(input.skill_files().len(), 2);
    }

    #[test]
    fn test_minimal_case_needs_no_execution() {
        let case: EvalCase =
            serde_yaml::from_str("name: bare\ninput:\n  prompt: hi").expect("should parse");
        assert!(!case.needs_execution());
        assert!(case.cleanup_target().is_none());
        assert!(case.input.skill_files().is_empty());
    }

    #[test]
    fn test_matches_tags() {
        let mut case: EvalCase =
            serde_yaml::from_str("name: t\ninput:\n  prompt: hi").expect("should parse");
        assert!(case.matches_tags(&[]));
        assert!(!case.matches_tags(&["search".to_string()]));

        case.tags.insert("search".to_string());
        assert!(case.matches_tags(&["other".to_string(), "search".to_string()]));
    }

    #[test]
    fn test_resolved_skill_files() {
        let mut case: EvalCase = serde_yaml::from_str(
            "name: t\ninput:\n  prompt: hi\n  skillFiles: [rel.md, /abs/skill.md]",
        )
        .expect("should parse");
        case.source_dir = PathBuf::from("/cases");

        let resolved = case.resolved_skill_files();
        assert_eq!(resolved[0], PathBuf::from("/cases/rel.md"));
        assert_eq!(resolved[1], PathBuf::from("/abs/skill.md"));
    }
}
