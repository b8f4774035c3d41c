use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::llm::retry::{ProviderError, parse_retry_after_header};
use crate::core::llm::{GenerationCall, LlmProvider, ProviderType};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageOwned,
}

#[derive(Deserialize)]
struct OpenAiMessageOwned {
    content: Option<String>,
}

/// Any endpoint speaking the `chat/completions` dialect.
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl OpenAiProvider {
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

fn build_request<'a>(model_id: &'a str, call: &GenerationCall<'_>) -> OpenAiRequest<'a> {
    let mut messages = Vec::new();
    // No native schema field here, so the shape travels in the system message.
    if let Some(schema) = call.response_schema {
        messages.push(OpenAiMessage {
            role: "system",
            content: format!(
                "Respond with a single JSON value matching this schema and nothing else:\n{}",
                schema
            ),
        });
    }
    messages.push(OpenAiMessage {
        role: "user",
        content: call.prompt.to_string(),
    });

    OpenAiRequest {
        model: model_id,
        messages,
        response_format: ResponseFormat {
            kind: "json_object",
        },
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAI
    }

    async fn generate(
        &self,
        model_id: &str,
        call: &GenerationCall<'_>,
    ) -> Result<String, ProviderError> {
        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&build_request(model_id, call))
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

        let parsed: OpenAiResponse = res
            .json()
            .await
            .map_err(|e| ProviderError::transport(e.without_url()))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_is_sent_as_system_message() {
        let schema = json!({"type": "OBJECT", "required": ["name"]});
        let call = GenerationCall {
            prompt: "hello",
            response_schema: Some(&schema),
        };
        let body = serde_json::to_value(build_request("gpt-4o-mini", &call)).expect("serializes");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(
            body["messages"][0]["content"]
                .as_str()
                .unwrap()
                .contains("\"required\"")
        );
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn without_schema_only_user_message_is_sent() {
        let call = GenerationCall {
            prompt: "hello",
            response_schema: None,
        };
        let body = serde_json::to_value(build_request("m", &call)).expect("serializes");
        assert_eq!(body["messages"].as_array().map(|m| m.len()), Some(1));
    }
}
