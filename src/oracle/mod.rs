//! Normalization oracle.
//!
//! The oracle turns extracted page content into structured project fields.
//! The trait keeps the runner testable without a model server; the shipped
//! implementation talks to a local Ollama instance.

mod config;
mod prompts;

pub use config::OracleConfig;
pub use prompts::DEFAULT_NORMALIZE_PROMPT;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::OracleAssessment;

#[derive(Debug)]
pub enum OracleError {
    Connection(String),
    Api(String),
    Parse(String),
    Empty,
    Disabled,
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "oracle connection error: {}", msg),
            Self::Api(msg) => write!(f, "oracle API error: {}", msg),
            Self::Parse(msg) => write!(f, "oracle response parse error: {}", msg),
            Self::Empty => write!(f, "oracle returned an empty reply"),
            Self::Disabled => write!(f, "oracle is disabled"),
        }
    }
}

impl std::error::Error for OracleError {}

/// Everything the oracle gets to see about one page.
#[derive(Debug, Clone)]
pub struct NormalizeRequest {
    pub url: String,
    pub text: String,
    pub links: Vec<String>,
    pub images: Vec<String>,
}

/// Structured fields parsed from the oracle's reply. Unknown fields are
/// kept rather than dropped, since prompt tweaks routinely add fields
/// before the code catches up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// What came back from one oracle call.
#[derive(Debug, Clone, Default)]
pub struct OracleReply {
    /// Verbatim reply text.
    pub raw: String,
    /// Structured fields, if the reply contained parseable JSON.
    pub fields: Option<NormalizedProject>,
    /// The oracle's own verdict on the page content.
    pub assessment: Option<OracleAssessment>,
}

#[async_trait]
pub trait Oracle: Send + Sync {
    async fn normalize(&self, request: &NormalizeRequest) -> Result<OracleReply, OracleError>;
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    #[allow(dead_code)]
    done: bool,
}

/// Oracle backed by Ollama's generate API.
pub struct OllamaOracle {
    config: OracleConfig,
    client: Client,
}

impl OllamaOracle {
    pub fn new(config: OracleConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    /// Whether the endpoint answers at all.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.endpoint);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn build_prompt(&self, request: &NormalizeRequest) -> String {
        let content = truncate_content(&request.text, self.config.max_content_chars);
        self.config
            .get_normalize_prompt()
            .replace("{url}", &request.url)
            .replace("{content}", &content)
            .replace("{links}", &join_or_none(&request.links))
            .replace("{images}", &join_or_none(&request.images))
    }

    async fn call_ollama(&self, prompt: String) -> Result<String, OracleError> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Api(format!("{}: {}", status, body)));
        }

        let reply: OllamaResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))?;
        Ok(reply.response)
    }
}

#[async_trait]
impl Oracle for OllamaOracle {
    async fn normalize(&self, request: &NormalizeRequest) -> Result<OracleReply, OracleError> {
        if !self.config.enabled {
            return Err(OracleError::Disabled);
        }

        let prompt = self.build_prompt(request);
        debug!(
            "Sending {} prompt chars to model {}",
            prompt.chars().count(),
            self.config.model
        );

        let raw = self.call_ollama(prompt).await?;
        if raw.trim().is_empty() {
            return Err(OracleError::Empty);
        }

        let (fields, assessment) = parse_reply(&raw);
        Ok(OracleReply {
            raw,
            fields,
            assessment,
        })
    }
}

/// The widest `{...}` span in the reply. Models wrap JSON in prose and
/// code fences; first-brace-to-last-brace strips both.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Best-effort parse of a reply into structured fields and the oracle's
/// self-assessment. Either half can fail independently.
pub fn parse_reply(raw: &str) -> (Option<NormalizedProject>, Option<OracleAssessment>) {
    let Some(json) = extract_json_object(raw) else {
        return (None, None);
    };
    let Ok(mut value) = serde_json::from_str::<serde_json::Value>(json) else {
        return (None, None);
    };

    // Pull the assessment out before parsing fields, so it does not end up
    // in the extras map.
    let assessment = value
        .as_object_mut()
        .and_then(|map| map.remove("payload_assessment"))
        .and_then(|v| serde_json::from_value::<OracleAssessment>(v).ok());
    let fields = serde_json::from_value::<NormalizedProject>(value).ok();

    (fields, assessment)
}

fn join_or_none(urls: &[String]) -> String {
    if urls.is_empty() {
        "(none)".to_string()
    } else {
        urls.join("\n")
    }
}

/// Truncate to a character budget without splitting a multibyte char.
fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let truncated: String = content.chars().take(max_chars).collect();
    format!("{}\n\n[content truncated]", truncated)
}
