//! Style-advice chat backed by a remote text-generation model.
//!
//! Callers never see an error: a failed or empty answer becomes one of the
//! fixed fallback lines.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Persona given to the model on every request.
pub const SYSTEM_PROMPT: &str = "Você é o assistente virtual da barbearia Victor Mota Barber. \
Use gírias modernas como 'na régua', 'vibe', 'top', 'brabo', mas mantenha a educação.";

/// First line of every new conversation.
pub const GREETING: &str =
    "E aí! Sou o assistente do Victor Mota. Qual a boa hoje? Precisa de uma dica pro visual?";

/// Reply when the model answers with nothing.
pub const EMPTY_ANSWER_FALLBACK: &str =
    "Mano, o estilo é você quem faz, mas se precisar de ajuda real, cola no salão!";

/// Reply when the remote call fails for any reason.
pub const ERROR_FALLBACK: &str =
    "Mano, deu um erro aqui na conexão, mas cola aí que a gente resolve seu estilo ao vivo!";

#[derive(Debug, thiserror::Error)]
pub enum AdviceError {
    #[error("advice backend not configured")]
    NotConfigured,
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
}

#[async_trait]
pub trait AdviceClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, AdviceError>;
}

/// Wrap the customer's question with the shop context.
fn user_prompt(query: &str) -> String {
    format!(
        "O usuário está perguntando sobre estilo de cabelo/barba na barbearia Victor Mota Barber.\n\
         Responda de forma curta, jovem, descontraída e profissional em Português do Brasil.\n\
         Pergunta: {}",
        query
    )
}

#[derive(Clone)]
pub struct AdviceAssistant {
    client: Arc<dyn AdviceClient>,
}

impl AdviceAssistant {
    pub fn new(client: Arc<dyn AdviceClient>) -> Self {
        Self { client }
    }

    /// Ask for advice. Always returns something to show.
    pub async fn advise(&self, query: &str) -> String {
        match self.client.complete(SYSTEM_PROMPT, &user_prompt(query)).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => EMPTY_ANSWER_FALLBACK.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Advice request failed, using fallback");
                ERROR_FALLBACK.to_string()
            }
        }
    }
}

// ── Gemini backend ──

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-3-flash-preview".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 30,
        }
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    fn build_url(&self) -> Result<url::Url, AdviceError> {
        let base = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        );
        url::Url::parse_with_params(&base, &[("key", self.config.api_key.as_str())])
            .map_err(|e| AdviceError::Http(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "systemInstruction")]
    system_instruction: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate; empty when there is none.
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AdviceClient for GeminiClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, AdviceError> {
        if self.config.api_key.is_empty() {
            return Err(AdviceError::NotConfigured);
        }

        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: system }],
            },
        };

        let resp = self
            .http
            .post(self.build_url()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdviceError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AdviceError::Response(format!("HTTP {}: {}", status, text)));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| AdviceError::Response(e.to_string()))?;
        Ok(parsed.text())
    }
}

// ── Transcript ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEntry {
    pub role: Role,
    pub text: String,
    /// An assistant reply still waiting for the remote answer.
    pub pending: bool,
}

/// Handle to the reply slot reserved by [`ChatTranscript::ask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTicket(usize);

/// A conversation. Replies occupy the slot reserved when the question was
/// asked, so they read in question order whatever order answers arrive in.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTranscript {
    entries: Vec<ChatEntry>,
}

impl Default for ChatTranscript {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self {
            entries: vec![ChatEntry {
                role: Role::Assistant,
                text: GREETING.to_string(),
                pending: false,
            }],
        }
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn is_waiting(&self) -> bool {
        self.entries.iter().any(|e| e.pending)
    }

    /// Append a question and reserve its reply. Blank input is ignored.
    pub fn ask(&mut self, text: &str) -> Option<ReplyTicket> {
        if text.trim().is_empty() {
            return None;
        }
        self.entries.push(ChatEntry {
            role: Role::User,
            text: text.to_string(),
            pending: false,
        });
        self.entries.push(ChatEntry {
            role: Role::Assistant,
            text: String::new(),
            pending: true,
        });
        Some(ReplyTicket(self.entries.len() - 1))
    }

    pub fn resolve(&mut self, ticket: ReplyTicket, reply: String) {
        if let Some(entry) = self.entries.get_mut(ticket.0) {
            entry.text = reply;
            entry.pending = false;
        }
    }
}
