// ABOUTME: Minimal OpenAI chat-completions client for SQL generation
// ABOUTME: Sends the schema-aware prompt and returns the fenced-code-stripped SQL reply

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::prompt::{build_prompt, extract_sql, SYSTEM_PROMPT};
use crate::schema::Schema;

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 1000;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Pull the first choice's text out of a chat-completions response body
pub fn parse_completion(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).context("Unexpected chat completion response")?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .context("Chat completion returned no content")
}

fn describe_api_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => format!("OpenAI API error ({}): {}", status, parsed.error.message),
        Err(_) => format!("OpenAI API error ({})", status),
    }
}

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"***")
            .finish()
    }
}

impl OpenAiClient {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("OpenAI API key is empty");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: OPENAI_CHAT_URL.to_string(),
        })
    }

    /// Send requests to a compatible endpoint instead of api.openai.com
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }

    /// Run one chat completion and return the raw reply text
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::debug!("Requesting completion from {} ({})", self.endpoint, self.model);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(prompt))
            .send()
            .await
            .context("Failed to call OpenAI API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read OpenAI API response")?;

        if !status.is_success() {
            bail!(describe_api_error(status, &body));
        }

        parse_completion(&body)
    }

    /// Turn a natural-language question into SQL for `schema`
    pub async fn generate_sql(&self, schema: &Schema, question: &str) -> Result<String> {
        let prompt = build_prompt(schema, question);
        let reply = self.complete(&prompt).await?;

        let sql = extract_sql(&reply);
        if sql.is_empty() {
            bail!("The model returned an empty query");
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let client = OpenAiClient::new("sk-test", DEFAULT_MODEL).unwrap();
        let body = serde_json::to_value(client.request("How many regions?")).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 1000);
        assert!((body["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "How many regions?");
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "```sql\nSELECT 1;\n```"}}
            ]
        }"#;
        assert_eq!(parse_completion(body).unwrap(), "```sql\nSELECT 1;\n```");
    }

    #[test]
    fn test_parse_completion_without_choices() {
        assert!(parse_completion(r#"{"choices": []}"#).is_err());
        assert!(parse_completion("not json").is_err());
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {
            "message": "Incorrect API key provided",
            "type": "invalid_request_error"
        }}"#;
        let msg = describe_api_error(reqwest::StatusCode::UNAUTHORIZED, body);
        assert!(msg.contains("401"));
        assert!(msg.contains("Incorrect API key provided"));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        assert!(OpenAiClient::new("  ", DEFAULT_MODEL).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let client = OpenAiClient::new("sk-secret", DEFAULT_MODEL).unwrap();
        assert!(!format!("{:?}", client).contains("sk-secret"));
    }
}
