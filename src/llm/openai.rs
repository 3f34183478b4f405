//! OpenAI-compatible chat completions client.
//!
//! Works against OpenAI itself or any gateway speaking the same wire format
//! (LiteLLM, vLLM, an nginx router that picks the model per request).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{ChatModel, ChatRequest};
use crate::error::{LabelbotError, Result};

/// Value of the `X-User` header sent with every call.
pub const DEFAULT_USER: &str = "agent-user";

/// Endpoint settings.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL including the version segment, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub user: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            user: DEFAULT_USER.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// # OpenAI Chat Model
pub struct OpenAiChatModel {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiChatModel {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LabelbotError::Capability(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// JSON body for one request.
    pub fn request_body(&self, request: &ChatRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        let user_content = match &request.image {
            Some(image) => json!([
                { "type": "text", "text": request.prompt },
                { "type": "image_url", "image_url": { "url": image.data_url() } },
            ]),
            None => json!(request.prompt),
        };
        messages.push(json!({ "role": "user", "content": user_content }));

        let mut body = json!({ "model": self.config.model, "messages": messages });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

/// Pull the first choice's text out of a completion response.
pub fn parse_completion(body: &str) -> Result<String> {
    let completion: Completion = serde_json::from_str(body)
        .map_err(|e| LabelbotError::Capability(format!("Malformed completion: {}", e)))?;
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| LabelbotError::Capability("Completion has no content".to_string()))
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let body = self.request_body(&request);
        debug!(model = %self.config.model, image = request.image.is_some(), "chat completion");

        let mut http = self
            .client
            .post(self.endpoint())
            .header("X-User", &self.config.user)
            .json(&body);
        if let Some(key) = &self.config.api_key {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .map_err(|e| LabelbotError::Capability(format!("Chat request failed: {}", e)))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LabelbotError::Capability(format!("Failed to read chat response: {}", e)))?;
        if !status.is_success() {
            return Err(LabelbotError::Capability(format!(
                "Chat endpoint returned {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }
        parse_completion(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ImageAttachment;

    fn model() -> OpenAiChatModel {
        OpenAiChatModel::new(OpenAiConfig {
            base_url: "http://gateway/v1/".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        assert_eq!(model().endpoint(), "http://gateway/v1/chat/completions");
    }

    #[test]
    fn test_body_with_system_and_limits() {
        let req = ChatRequest::new("hello")
            .with_system("Answer S, M or C")
            .with_max_tokens(5)
            .with_temperature(0.5);
        let body = model().request_body(&req);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["max_tokens"], 5);
        assert_eq!(body["temperature"], 0.5);
    }

    #[test]
    fn test_body_with_image_is_multipart() {
        let req = ChatRequest::new("what is this").with_image(ImageAttachment {
            mime: "image/png".to_string(),
            data: vec![1, 2, 3],
        });
        let body = model().request_body(&req);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AQID");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_completion() {
        let ok = r#"{"choices":[{"message":{"role":"assistant","content":"  C \n"}}]}"#;
        assert_eq!(parse_completion(ok).unwrap(), "C");
        assert!(parse_completion(r#"{"choices":[]}"#).is_err());
        assert!(parse_completion("<html>").is_err());
    }
}
