//! Text-generation provider client.

use async_trait::async_trait;
use quill_kernel::settings::GeneratorSettings;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

/// Instruction sent with every request; fixes the page style and the
/// `TITLE:` / `EXCERPT:` / `CODE:` reply format.
pub const SYSTEM_INSTRUCTION: &str = include_str!("system_instruction.txt");

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generator API key is not configured (set QUILL__GENERATOR__API_KEY or GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("generation request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("generation provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Produces raw marker-formatted text for a topic.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Raw provider text, `""` when the provider returned none.
    async fn generate(&self, requirement: &str) -> Result<String, GenerationError>;
}

/// Gemini `generateContent` over HTTPS.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http_client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    api_key: Option<Secret<String>>,
}

impl GeminiClient {
    pub fn new(settings: GeneratorSettings) -> Self {
        Self {
            http_client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model,
            temperature: settings.temperature,
            api_key: settings
                .api_key
                .filter(|key| !key.expose_secret().trim().is_empty()),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    #[tracing::instrument(name = "Generating content", skip(self, requirement), fields(model = %self.model))]
    async fn generate(&self, requirement: &str) -> Result<String, GenerationError> {
        let api_key = self.api_key.as_ref().ok_or(GenerationError::MissingApiKey)?;

        let request_body = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: [Part { text: SYSTEM_INSTRUCTION }],
            },
            contents: [Content {
                role: Some("user"),
                parts: [Part { text: requirement }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&request_body)
            .send()
            .await
            .map_err(GenerationError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: provider_message(&body),
            });
        }

        let reply: GenerateContentResponse = response.json().await.map_err(GenerationError::Decode)?;
        let text = reply.text();
        tracing::debug!(chars = text.len(), "generation reply received");
        Ok(text)
    }
}

/// The provider's `error.message` when the body carries one, else the body.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<ErrorReply>(body)
        .map(|reply| reply.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: [Content<'a>; 1],
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text parts of the first candidate, joined.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct ErrorReply {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
