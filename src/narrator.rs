//! Gemini chat session that rewrites headlines as short newscaster lines.
//!
//! The session keeps its own turn history and re-sends it with every
//! `generateContent` call, so the model sees earlier headlines as context.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::GeminiConfig;
use crate::error::NarrationError;

pub const NEWSCASTER_PROMPT: &str =
    "Read this headline in the voice of a newscaster, but keep it short.";

/// Narration used when the model answers without a text part.
pub const FALLBACK_NARRATION: &str = "Sorry, there was an error!";

/// One turn-taking chat context that produces narrations.
#[async_trait]
pub trait Narrator: Send {
    async fn narrate(&mut self, title: &str) -> Result<Narration, NarrationError>;
}

pub fn build_prompt(title: &str) -> String {
    format!("{NEWSCASTER_PROMPT} {title}")
}

// --- Gemini wire types ---

/// A content part: plain text, or anything else the model may return
/// (inline data, function calls, ...), kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn user(text: String) -> Self {
        Self {
            role: "user".into(),
            parts: vec![Part::Text { text }],
        }
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// Outcome of one narration turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Narration {
    Text(String),
    Fallback,
}

impl Narration {
    /// The words to speak; the fallback sentence for `Fallback`.
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Fallback => FALLBACK_NARRATION,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback)
    }
}

/// Visit candidates in order and pick the first content whose first part is
/// text. Candidates without content, with no parts, or leading with a
/// non-text part are passed over.
fn narrated_content(response: &GenerateContentResponse) -> Option<&Content> {
    response
        .candidates
        .iter()
        .filter_map(|c| c.content.as_ref())
        .find(|content| matches!(content.parts.first(), Some(Part::Text { .. })))
}

pub fn extract_narration(response: &GenerateContentResponse) -> Narration {
    match narrated_content(response).and_then(|c| c.parts.first()) {
        Some(Part::Text { text }) => Narration::Text(text.clone()),
        Some(Part::Other(_)) | None => Narration::Fallback,
    }
}

/// Long-lived chat context with one Gemini model.
pub struct GeminiSession {
    client: Client,
    host: String,
    model: String,
    api_key: String,
    history: Vec<Content>,
    max_history_turns: usize,
}

impl GeminiSession {
    /// Open a session against `config.model`, checking that the key is
    /// accepted and the model exists.
    pub async fn connect(config: &GeminiConfig, api_key: String) -> Result<Self, NarrationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let session = Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            history: Vec::new(),
            max_history_turns: config.max_history_turns,
        };

        let url = format!("{}/v1beta/models/{}", session.host, session.model);
        let resp = session
            .client
            .get(&url)
            .header("x-goog-api-key", &session.api_key)
            .send()
            .await?;
        session.check_status(resp).await?;

        info!("Chat session ready (model: {})", session.model);
        Ok(session)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    async fn check_status(&self, resp: reqwest::Response) -> Result<reqwest::Response, NarrationError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => parsed.error.message,
            Err(_) => body.chars().take(200).collect(),
        };
        Err(NarrationError::Status {
            model: self.model.clone(),
            status,
            message,
        })
    }

    async fn generate(&self) -> Result<GenerateContentResponse, NarrationError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.host, self.model);
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateContentRequest {
                contents: &self.history,
            })
            .send()
            .await?;
        let resp = self.check_status(resp).await?;
        Ok(resp.json::<GenerateContentResponse>().await?)
    }

    /// Keep only the last `max_history_turns` user/model exchanges.
    fn trim_history(&mut self) {
        if self.max_history_turns == 0 {
            return;
        }
        let excess = self.history.len().saturating_sub(self.max_history_turns * 2);
        if excess > 0 {
            self.history.drain(..excess);
            debug!("Dropped {excess} oldest turns from chat history");
        }
    }
}

#[async_trait]
impl Narrator for GeminiSession {
    async fn narrate(&mut self, title: &str) -> Result<Narration, NarrationError> {
        let t_start = Instant::now();
        self.history.push(Content::user(build_prompt(title)));

        let response = match self.generate().await {
            Ok(r) => r,
            Err(e) => {
                self.history.pop();
                return Err(e);
            }
        };
        let latency_ms = t_start.elapsed().as_secs_f64() * 1000.0;

        // History keeps only the reply that was narrated. Prompts without one
        // are dropped, so turns alternate and no empty turn is ever re-sent.
        match narrated_content(&response) {
            Some(content) => {
                let mut turn = content.clone();
                turn.role = "model".into();
                self.history.push(turn);
            }
            None => {
                self.history.pop();
            }
        }
        self.trim_history();

        let narration = extract_narration(&response);
        if narration.is_fallback() {
            let reasons: Vec<&str> = response
                .candidates
                .iter()
                .filter_map(|c| c.finish_reason.as_deref())
                .collect();
            warn!(
                "Model returned no text for \"{title}\" (finish reasons: {reasons:?}); using fallback"
            );
        }
        debug!(
            "Narration in {latency_ms:.0}ms, history now {} turns",
            self.history_len()
        );

        Ok(narration)
    }
}
