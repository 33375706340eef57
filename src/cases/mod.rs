//! Declarative evaluation cases.
//!
//! Cases are YAML or JSON documents describing a prompt, the assertions to
//! score the generated code against, and the external state to reset after
//! each run:
//!
//! ```yaml
//! name: create-search-index
//! tags: [atlas-search]
//! input:
//!   prompt: Create an Atlas Search index named movies_idx on sample_mflix.movies.
//!   docLink: https://www.mongodb.com/docs/atlas/atlas-search/create-index/
//!   skillFiles: skills/atlas-search.md
//! expected:
//!   semantic:
//!     mustContain:
//!       - { pattern: ".createSearchIndex(", name: UsesCreate }
//!   execution: { shouldSucceed: true }
//!   result:
//!     searchIndexExists:
//!       { database: sample_mflix, collection: movies, indexName: movies_idx }
//! cleanup:
//!   dropSearchIndex: { database: sample_mflix, collection: movies, indexName: movies_idx }
//! ```

pub mod loader;
pub mod schema;
pub mod types;

pub use loader::{discover_case_files, load_cases};
pub use schema::CaseSchemaValidator;
pub use types::{
    CaseInput, CleanupSpec, EvalCase, ExecutionExpectation, Expectations, OneOrMany,
    PatternCheck, ResultExpectation, SearchIndexExpectation, SearchIndexRef,
    SemanticExpectation, SyntaxExpectation,
};
