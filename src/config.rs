//! Configuration for evaluation runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::eval::docs::DEFAULT_DOC_MAX_CHARS;
use crate::eval::{Approach, DocFetcher, Orchestrator, OrchestratorSettings, TaskRunner};
use crate::llm::{LlmProvider, DEFAULT_API_BASE};
use crate::runner::{
    CleanupCoordinator, CodeExecutor, SandboxConfig, SearchIndexVerifier, SyntaxChecker,
};
use crate::scoring::ScorerRegistry;
use crate::store::SearchIndexCatalog;

/// Default generation model.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";

/// Settings for one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Generation model identifier.
    pub model: String,
    /// Sampling temperature for generation.
    pub temperature: f64,
    /// Completion token cap; the provider default applies when unset.
    pub max_tokens: Option<u32>,
    /// OpenAI-compatible endpoint.
    pub api_base: String,
    /// API credentials. Never serialized.
    #[serde(skip)]
    pub api_key: Option<String>,
    /// MongoDB connection string used by the sandbox, verifier and cleanup.
    pub mongodb_uri: String,
    /// Documentation length cap in characters.
    pub doc_max_chars: usize,
    /// Node.js executable for the sandbox and the syntax check.
    pub node_binary: String,
    /// Directory holding the `mongodb` npm package. Falls back to
    /// `./node_modules` when that directory exists.
    pub node_modules: Option<PathBuf>,
    /// Wall-clock limit for each sandboxed execution.
    pub execution_timeout: Duration,
    /// How long cleanup waits for a dropped index to disappear.
    pub cleanup_max_wait: Duration,
    /// How long the verifier waits for an expected index to be listed.
    pub verify_max_wait: Duration,
    /// Interval between index listings while waiting.
    pub poll_interval: Duration,
    /// Approaches to run; always executed in their fixed order.
    pub approaches: Vec<Approach>,
    /// Only run cases carrying one of these tags (all cases when empty).
    pub tags: Vec<String>,
    /// Directory the JSON report is written to.
    pub output_dir: PathBuf,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: None,
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            mongodb_uri: String::new(),
            doc_max_chars: DEFAULT_DOC_MAX_CHARS,
            node_binary: "node".to_string(),
            node_modules: None,
            execution_timeout: Duration::from_secs(30),
            cleanup_max_wait: Duration::from_secs(60),
            verify_max_wait: Duration::from_secs(10),
            poll_interval: Duration::from_secs(2),
            approaches: Approach::ALL.to_vec(),
            tags: Vec::new(),
            output_dir: PathBuf::from("./eval-results"),
        }
    }
}

impl EvalConfig {
    /// Creates a configuration with defaults for the given connection string.
    pub fn new(mongodb_uri: impl Into<String>) -> Self {
        Self {
            mongodb_uri: mongodb_uri.into(),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_api(mut self, api_base: impl Into<String>, api_key: Option<String>) -> Self {
        self.api_base = api_base.into();
        self.api_key = api_key;
        self
    }

    pub fn with_doc_max_chars(mut self, max_chars: usize) -> Self {
        self.doc_max_chars = max_chars;
        self
    }

    pub fn with_node(mut self, node_binary: impl Into<String>, node_modules: Option<PathBuf>) -> Self {
        self.node_binary = node_binary.into();
        self.node_modules = node_modules;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn with_waits(mut self, cleanup_max_wait: Duration, verify_max_wait: Duration) -> Self {
        self.cleanup_max_wait = cleanup_max_wait;
        self.verify_max_wait = verify_max_wait;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Restrict the run to `approaches`. Order is normalized to run order.
    pub fn with_approaches(mut self, approaches: &[Approach]) -> Self {
        self.approaches = Approach::ALL
            .iter()
            .copied()
            .filter(|a| approaches.contains(a))
            .collect();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mongodb_uri.trim().is_empty() {
            return Err(ConfigError::MissingMongoUri);
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingModel);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        if self.execution_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                name: "execution timeout",
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                name: "poll interval",
            });
        }
        if self.approaches.is_empty() {
            return Err(ConfigError::NoApproaches);
        }
        Ok(())
    }

    pub fn sandbox_config(&self) -> SandboxConfig {
        let mut config = SandboxConfig::new(&self.mongodb_uri).with_node_binary(&self.node_binary);
        let local = || {
            std::env::current_dir()
                .ok()
                .and_then(|cwd| local_node_modules(&cwd))
        };
        if let Some(modules) = self.node_modules.clone().or_else(local) {
            config = config.with_node_modules(modules);
        }
        config
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            approaches: self.approaches.clone(),
            execution_timeout: self.execution_timeout,
            cleanup_max_wait: self.cleanup_max_wait,
        }
    }

    /// Wire an orchestrator from its external dependencies.
    pub fn build_orchestrator(&self, deps: OrchestratorDeps) -> Orchestrator {
        let verifier = SearchIndexVerifier::new(deps.catalog.clone())
            .with_poll_interval(self.poll_interval)
            .with_max_wait(self.verify_max_wait);
        let cleanup =
            CleanupCoordinator::new(deps.catalog).with_poll_interval(self.poll_interval);
        let scorers = ScorerRegistry::with_defaults(deps.syntax_checker, Arc::new(verifier));
        let mut tasks = TaskRunner::new(deps.llm, deps.docs, &self.model)
            .with_temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            tasks = tasks.with_max_tokens(max_tokens);
        }

        Orchestrator::new(tasks, deps.executor, scorers, cleanup)
            .with_settings(self.orchestrator_settings())
    }
}

/// `node_modules` directly under `dir`, if present.
fn local_node_modules(dir: &Path) -> Option<PathBuf> {
    let candidate = dir.join("node_modules");
    candidate.is_dir().then_some(candidate)
}

/// External collaborators of an [`Orchestrator`].
pub struct OrchestratorDeps {
    pub llm: Arc<dyn LlmProvider>,
    pub docs: Arc<dyn DocFetcher>,
    pub executor: Arc<dyn CodeExecutor>,
    pub syntax_checker: Arc<dyn SyntaxChecker>,
    pub catalog: Arc<dyn SearchIndexCatalog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EvalConfig::default();
        assert_eq!(config.doc_max_chars, 50_000);
        assert_eq!(config.approaches, Approach::ALL.to_vec());
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert!(matches!(config.validate(), Err(ConfigError::MissingMongoUri)));
    }

    #[test]
    fn test_approach_order_is_normalized() {
        let config = EvalConfig::new("mongodb://localhost")
            .with_approaches(&[Approach::WithSkill, Approach::Baseline]);
        assert_eq!(config.approaches, vec![Approach::Baseline, Approach::WithSkill]);
    }

    #[test]
    fn test_validate() {
        let config = EvalConfig::new("mongodb://localhost");
        assert!(config.validate().is_ok());

        let hot = EvalConfig::new("mongodb://localhost").with_temperature(3.5);
        assert!(matches!(hot.validate(), Err(ConfigError::InvalidTemperature(_))));

        let none = EvalConfig::new("mongodb://localhost").with_approaches(&[]);
        assert!(matches!(none.validate(), Err(ConfigError::NoApproaches)));

        let zero = EvalConfig::new("mongodb://localhost").with_execution_timeout(Duration::ZERO);
        assert!(matches!(zero.validate(), Err(ConfigError::ZeroDuration { .. })));
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let config = EvalConfig::new("mongodb://localhost")
            .with_api("https://example.com/v1", Some("sk-secret".to_string()));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }

    #[test]
    fn test_sandbox_config() {
        let config = EvalConfig::new("mongodb://localhost")
            .with_node("/usr/bin/node", Some(PathBuf::from("/opt/node_modules")));
        let sandbox = config.sandbox_config();
        assert_eq!(sandbox.node_binary, "/usr/bin/node");
        assert_eq!(sandbox.mongodb_uri, "mongodb://localhost");
        assert_eq!(sandbox.node_modules, Some(PathBuf::from("/opt/node_modules")));
    }

    #[test]
    fn test_local_node_modules_fallback() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(local_node_modules(dir.path()), None);

        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        assert_eq!(
            local_node_modules(dir.path()),
            Some(dir.path().join("node_modules"))
        );
    }

    #[test]
    fn test_relative_node_modules_resolve_against_cwd() {
        let config = EvalConfig::new("mongodb://localhost")
            .with_node("node", Some(PathBuf::from("./harness/node_modules")));
        let sandbox = config.sandbox_config();
        let modules = sandbox.node_modules.unwrap();
        assert!(modules.is_absolute());
        assert!(modules.ends_with("harness/node_modules"));
    }
}
