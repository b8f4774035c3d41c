use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::llm::retry::{ProviderError, parse_retry_after_header};
use crate::core::llm::{GenerationCall, LlmProvider, ProviderType};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResContent>,
}

#[derive(Deserialize)]
struct GeminiResContent {
    #[serde(default)]
    parts: Vec<GeminiResPart>,
}

#[derive(Deserialize)]
struct GeminiResPart {
    text: Option<String>,
}

pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            client: Client::new(),
        }
    }
}

fn build_request<'a>(call: &GenerationCall<'a>) -> GeminiRequest<'a> {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user",
            parts: vec![GeminiPart { text: call.prompt }],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: call.response_schema,
        },
    }
}

fn collect_text(parsed: GeminiResponse) -> String {
    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Gemini
    }

    async fn generate(
        &self,
        model_id: &str,
        call: &GenerationCall<'_>,
    ) -> Result<String, ProviderError> {
        // The key goes in a header so it never shows up in a URL-bearing error.
        let url = format!("{}/models/{}:generateContent", self.base_url, model_id);
        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(call))
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.without_url()))?;

        let status = res.status();
        if !status.is_success() {
            let retry_after = res
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after_header);
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::http(status.as_u16(), body, retry_after));
        }

        let parsed: GeminiResponse = res
            .json()
            .await
            .map_err(|e| ProviderError::transport(e.without_url()))?;
        Ok(collect_text(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_carries_schema_and_json_mime_type() {
        let schema = json!({"type": "OBJECT"});
        let call = GenerationCall {
            prompt: "design an algorithm",
            response_schema: Some(&schema),
        };
        let body = serde_json::to_value(build_request(&call)).expect("serializes");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "design an algorithm");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["responseSchema"], schema);
    }

    #[test]
    fn response_parts_are_concatenated() {
        let parsed: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\":"}, {"text": "1}"}]}}]
        }))
        .expect("deserializes");
        assert_eq!(collect_text(parsed), "{\"a\":1}");
    }

    #[tokio::test]
    async fn transport_failures_do_not_expose_the_api_key() {
        use crate::core::config::{ParserConfig, RetryConfig};
        use crate::core::error::AutomationError;
        use crate::core::llm::LlmManager;
        use crate::core::llm::parser::ResponseParser;
        use crate::core::llm::retry::RetryPolicy;

        let provider = GeminiProvider::new(
            "SECRET-KEY-123".into(),
            Some("http://127.0.0.1:1".into()),
        );
        let call = GenerationCall {
            prompt: "design an algorithm",
            response_schema: None,
        };
        let err = provider.generate("m", &call).await.unwrap_err();
        assert!(!err.to_string().contains("SECRET-KEY-123"));

        let manager = LlmManager::new(
            Box::new(provider),
            "m".into(),
            RetryPolicy::from_config(&RetryConfig::default()),
            ResponseParser::new(&ParserConfig::default()),
        );
        let err = manager.generate_json("p", &json!({})).await.unwrap_err();
        assert!(!err.to_string().contains("SECRET-KEY-123"));
        let details = AutomationError::from(err).log_details();
        assert!(!details.to_string().contains("SECRET-KEY-123"));
    }

    #[test]
    fn blocked_candidates_yield_empty_text() {
        let parsed: GeminiResponse =
            serde_json::from_value(json!({"candidates": [{"finishReason": "SAFETY"}]}))
                .expect("deserializes");
        assert_eq!(collect_text(parsed), "");
    }
}
