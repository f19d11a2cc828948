use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::router::{ChatBackend, ChatRequest, RouterError, LLM_TIMEOUT};

/// Chat-completions client for OpenAI-compatible endpoints in JSON mode.
#[derive(Clone)]
pub struct OpenAiBackend {
    client: Client,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new() -> Self {
        // The router enforces the deadline; this only bounds a stuck socket.
        let client = Client::builder()
            .timeout(LLM_TIMEOUT + Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for OpenAiBackend {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn request_body(request: &ChatRequest) -> Value {
    json!({
        "model": request.model,
        "temperature": request.temperature,
        "top_p": request.top_p,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": request.system },
            { "role": "user", "content": request.user },
        ],
    })
}

/// Pulls `error.message` out of an error body, or returns the raw text.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

impl ChatBackend for OpenAiBackend {
    async fn complete(&self, request: ChatRequest) -> Result<String, RouterError> {
        let response = self
            .client
            .post(&request.endpoint)
            .bearer_auth(&request.api_key)
            .json(&request_body(&request))
            .send()
            .await
            .map_err(|err| RouterError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RouterError::Transport {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|err| RouterError::Parse(err.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RouterError::Parse("completion has no message content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_forces_json_mode_with_two_messages() {
        let request = ChatRequest {
            endpoint: "http://localhost".to_string(),
            api_key: "sk".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            top_p: 1.0,
            system: "system".to_string(),
            user: "make it snow".to_string(),
        };
        let body = request_body(&request);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][1]["content"], "make it snow");
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn error_message_prefers_structured_text() {
        assert_eq!(
            error_message(r#"{"error":{"message":"Incorrect API key provided"}}"#),
            "Incorrect API key provided"
        );
        assert_eq!(error_message(" upstream down \n"), "upstream down");
    }
}
