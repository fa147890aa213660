//! JSON-producing chat backend over an OpenAI-compatible API.

use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::AiError;

/// Hard per-request bound; nothing else cancels an in-flight analysis.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// An analysis backend that answers a prompt with one JSON object.
pub trait ChatBackend: Send + Sync {
    /// Run one prompt and parse the reply as JSON.
    fn complete_json(
        &self,
        system: &str,
        user: &str,
    ) -> impl Future<Output = Result<Value, AiError>> + Send;
}

/// Chat client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    /// `base_url` is the API root, like `https://api.openai.com/v1`
    /// (no trailing slash).
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }
}

impl ChatBackend for OpenAiChat {
    async fn complete_json(&self, system: &str, user: &str) -> Result<Value, AiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0.2,
            "response_format": {"type": "json_object"},
        });

        debug!(url = %url, model = %self.model, "chat completion request");
        let resp = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let reply: Value = resp.json().await?;
        let content = reply["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(AiError::Empty)?;
        let parsed = parse_json_reply(content)?;
        info!(model = %self.model, "chat completion parsed");
        Ok(parsed)
    }
}

/// Parse a model reply as JSON, tolerating a markdown code fence around it.
pub fn parse_json_reply(content: &str) -> Result<Value, AiError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AiError::Empty);
    }

    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    Ok(serde_json::from_str(inner)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let v = parse_json_reply(r#"{"importance": "high"}"#).unwrap();
        assert_eq!(v["importance"], "high");
    }

    #[test]
    fn strips_code_fence() {
        let v = parse_json_reply("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(v["a"], 1);
        let v = parse_json_reply("```\n{\"a\": 2}\n```").unwrap();
        assert_eq!(v["a"], 2);
    }

    #[test]
    fn empty_reply_is_an_error() {
        assert!(matches!(parse_json_reply(""), Err(AiError::Empty)));
        assert!(matches!(parse_json_reply("   \n"), Err(AiError::Empty)));
    }

    #[test]
    fn malformed_reply_is_a_json_error() {
        assert!(matches!(
            parse_json_reply("not json at all"),
            Err(AiError::Json(_))
        ));
    }

    #[test]
    fn transport_vs_payload_classification() {
        assert!(
            AiError::Server {
                status: 500,
                body: String::new()
            }
            .is_transport()
        );
        assert!(!AiError::Empty.is_transport());
        let json_err = parse_json_reply("x").unwrap_err();
        assert!(!json_err.is_transport());
    }
}
