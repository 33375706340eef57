//! Code generation for one (case, approach) pair.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::docs::DocFetcher;
use super::prompts;
use super::Approach;
use crate::cases::EvalCase;
use crate::error::{LlmError, TaskError};
use crate::llm::{GenerationRequest, LlmProvider};

/// Model output for one run, with the context that produced it.
#[derive(Debug, Clone)]
pub struct GeneratedCode {
    /// Code with any Markdown fence removed.
    pub code: String,
    /// Unmodified model response.
    pub raw_response: String,
    pub generation_time_ms: u64,
    /// Prompt context details (documentation, skill files, token usage).
    pub metadata: Map<String, Value>,
}

/// Builds prompts and calls the model.
pub struct TaskRunner {
    llm: Arc<dyn LlmProvider>,
    docs: Arc<dyn DocFetcher>,
    model: String,
    temperature: f64,
    max_tokens: Option<u32>,
}

impl TaskRunner {
    pub fn new(llm: Arc<dyn LlmProvider>, docs: Arc<dyn DocFetcher>, model: impl Into<String>) -> Self {
        Self {
            llm,
            docs,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// User prompt for `approach`, plus metadata describing the added context.
    pub async fn build_prompt(
        &self,
        case: &EvalCase,
        approach: Approach,
    ) -> Result<(String, Map<String, Value>), TaskError> {
        let mut metadata = Map::new();
        let prompt = &case.input.prompt;

        let user_prompt = match approach {
            Approach::Baseline => prompts::baseline_prompt(prompt),
            Approach::WithDocumentation => match case.input.doc_link.as_deref() {
                None => {
                    metadata.insert("documentation".into(), json!("none"));
                    prompts::baseline_prompt(prompt)
                }
                Some(url) => {
                    let doc = self.docs.fetch(url).await;
                    metadata.insert("documentation".into(), json!(url));
                    metadata.insert(
                        "doc_truncation".into(),
                        serde_json::to_value(&doc.truncation).unwrap_or(Value::Null),
                    );
                    if let Some(ref error) = doc.fetch_error {
                        metadata.insert("fetch_error".into(), json!(error));
                    }
                    prompts::documentation_prompt(prompt, &doc.text)
                }
            },
            Approach::WithSkill => {
                let sections = self.read_skills(case).await?;
                metadata.insert("skill_files".into(), json!(case.input.skill_files()));
                prompts::skill_prompt(prompt, &sections)
            }
        };

        Ok((user_prompt, metadata))
    }

    async fn read_skills(&self, case: &EvalCase) -> Result<Vec<String>, TaskError> {
        let configured = case.input.skill_files();
        if configured.is_empty() {
            return Err(TaskError::MissingSkill {
                case: case.name.clone(),
                reason: "no skill files configured".to_string(),
            });
        }

        let mut sections = Vec::with_capacity(configured.len());
        for (label, path) in configured.iter().zip(case.resolved_skill_files()) {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| TaskError::MissingSkill {
                    case: case.name.clone(),
                    reason: format!("failed to read '{}': {}", path.display(), e),
                })?;
            debug!(case = %case.name, path = %path.display(), chars = content.len(), "Loaded skill file");
            sections.push(prompts::skill_section(label, &content));
        }
        Ok(sections)
    }

    /// Generate code for `case` under `approach`.
    pub async fn generate(
        &self,
        case: &EvalCase,
        approach: Approach,
    ) -> Result<GeneratedCode, TaskError> {
        let (user_prompt, mut metadata) = self.build_prompt(case, approach).await?;

        let mut request =
            GenerationRequest::new(&self.model, prompts::build_messages(user_prompt))
                .with_temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let start = Instant::now();
        let response = self.llm.generate(request).await?;
        let generation_time_ms = start.elapsed().as_millis() as u64;

        let raw = response
            .text()
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?
            .to_string();
        let code = strip_code_fence(&raw);

        metadata.insert("model".into(), json!(response.model));
        metadata.insert("generation_time_ms".into(), json!(generation_time_ms));
        metadata.insert("total_tokens".into(), json!(response.usage.total_tokens));

        info!(
            case = %case.name,
            approach = %approach,
            generation_time_ms,
            chars = code.len(),
            "Generated code"
        );

        Ok(GeneratedCode {
            code,
            raw_response: raw,
            generation_time_ms,
            metadata,
        })
    }
}

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)(?:```|\z)").expect("valid fence regex")
    })
}

/// Extract the code from a Markdown-fenced response. The first fenced block
/// wins, and a block cut off before its closing fence runs to the end of the
/// response. Unfenced responses are returned trimmed.
pub fn strip_code_fence(response: &str) -> String {
    match fence_pattern().captures(response) {
        Some(captures) => captures
            .get(1)
            .map_or("", |m| m.as_str())
            .trim_end()
            .to_string(),
        None => response.trim().to_string(),
    }
}
