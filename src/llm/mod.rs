//! LLM integration for skill-eval.
//!
//! The generation call is a single chat completion against an
//! OpenAI-compatible endpoint. Everything above this module talks to the
//! [`LlmProvider`] trait so the orchestrator can be driven by a mock in tests.
//!
//! ```ignore
//! use skill_eval::llm::{GenerationRequest, LiteLlmClient, LlmProvider, Message};
//!
//! let client = LiteLlmClient::new(api_base, Some(api_key));
//! let request = GenerationRequest::new(model, vec![Message::user("Create an index")])
//!     .with_temperature(0.0);
//! let response = client.generate(request).await?;
//! ```

pub mod litellm;

pub use litellm::{
    GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
    DEFAULT_API_BASE,
};
