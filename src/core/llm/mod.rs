pub mod parser;
pub mod providers;
pub mod retry;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::core::config::AppConfig;
use crate::core::error::AiError;
use parser::ResponseParser;
use retry::{ProviderError, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Gemini,
    #[serde(alias = "openai-compatible")]
    OpenAI,
}

/// One outbound generation request: the prompt plus an optional output-shape hint.
#[derive(Debug, Clone, Copy)]
pub struct GenerationCall<'a> {
    pub prompt: &'a str,
    pub response_schema: Option<&'a Value>,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    // Perform exactly one remote call; retry policy lives in LlmManager.
    async fn generate(
        &self,
        model_id: &str,
        call: &GenerationCall<'_>,
    ) -> Result<String, ProviderError>;
}

pub struct LlmManager {
    provider: Box<dyn LlmProvider>,
    model_id: String,
    retry: RetryPolicy,
    parser: ResponseParser,
}

impl LlmManager {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        model_id: String,
        retry: RetryPolicy,
        parser: ResponseParser,
    ) -> Self {
        info!(
            "Registered LLM Provider: {:?} ({})",
            provider.provider_type(),
            model_id
        );
        Self {
            provider,
            model_id,
            retry,
            parser,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config.llm.api_key.clone().ok_or_else(|| {
            anyhow!(
                "No LLM API key configured. Set llm.api_key or BIOSYNTH_LLM_API_KEY / GEMINI_API_KEY."
            )
        })?;

        let provider: Box<dyn LlmProvider> = match config.llm.provider {
            ProviderType::Gemini => Box::new(providers::GeminiProvider::new(
                api_key,
                config.llm.base_url.clone(),
            )),
            ProviderType::OpenAI => Box::new(providers::OpenAiProvider::new(
                api_key,
                config.llm.base_url.clone(),
            )),
        };

        Ok(Self::new(
            provider,
            config.llm.model.clone(),
            RetryPolicy::from_config(&config.retry),
            ResponseParser::new(&config.parser),
        ))
    }

    pub fn active_info(&self) -> (ProviderType, &str) {
        (self.provider.provider_type(), &self.model_id)
    }

    /// Call the model with retries, then extract and normalize the JSON payload.
    pub async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<Value, AiError> {
        let call = GenerationCall {
            prompt,
            response_schema: Some(schema),
        };
        let provider = self.provider.as_ref();
        let model_id = self.model_id.as_str();
        let call = &call;

        let text = self
            .retry
            .run(move || provider.generate(model_id, call))
            .await?;
        self.parser.parse(&text)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Replays canned provider outcomes in order and records every prompt it receives.
    pub(crate) struct ScriptedProvider {
        outcomes: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: Arc<AtomicUsize>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[derive(Clone)]
    pub(crate) struct ScriptHandle {
        calls: Arc<AtomicUsize>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptHandle {
        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl ScriptedProvider {
        pub(crate) fn new(outcomes: Vec<Result<String, ProviderError>>) -> (Self, ScriptHandle) {
            let calls = Arc::new(AtomicUsize::new(0));
            let prompts = Arc::new(Mutex::new(Vec::new()));
            let handle = ScriptHandle {
                calls: calls.clone(),
                prompts: prompts.clone(),
            };
            (
                Self {
                    outcomes: Mutex::new(outcomes.into()),
                    calls,
                    prompts,
                },
                handle,
            )
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn provider_type(&self) -> ProviderType {
            ProviderType::Gemini
        }

        async fn generate(
            &self,
            _model_id: &str,
            call: &GenerationCall<'_>,
        ) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(call.prompt.to_string());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::http(500, "script exhausted", None)))
        }
    }

    /// Manager over a scripted provider with default retry and parser settings.
    pub(crate) fn scripted_manager(
        outcomes: Vec<Result<String, ProviderError>>,
    ) -> (LlmManager, ScriptHandle) {
        let (provider, handle) = ScriptedProvider::new(outcomes);
        let manager = LlmManager::new(
            Box::new(provider),
            "test-model".to_string(),
            RetryPolicy::default(),
            ResponseParser::default(),
        );
        (manager, handle)
    }
}
