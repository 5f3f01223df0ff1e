//! Topical classification of papers into the six listing categories.
//!
//! The only real backend is an OpenAI-compatible chat completion endpoint.
//! Every failure path ends in [`Category::default`], never an error for the
//! caller.

use std::time::Duration;

use async_trait::async_trait;
use paperwatch_core::{Category, ClassifierConfig};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, ScienceError};
use crate::http::RateLimitedClient;

const MAX_ABSTRACT_CHARS: usize = 1500;
const SYSTEM_PROMPT: &str = "You are a paper classifier. Respond with only the category name.";

#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, title: &str, abstract_text: &str) -> Result<Category>;
}

/// Runs `classifier` and substitutes the default category on any error.
pub async fn classify_or_default(
    classifier: &dyn Classifier,
    title: &str,
    abstract_text: &str,
) -> Category {
    match classifier.classify(title, abstract_text).await {
        Ok(category) => category,
        Err(e) => {
            warn!(
                classifier = classifier.name(),
                kind = %e.kind(),
                "classification failed for {title:?}, using {}: {e}",
                Category::default()
            );
            Category::default()
        }
    }
}

/// Maps a free-text model reply onto a category.
///
/// Exact label first, then the first label contained in the reply
/// (case-insensitive), then the default.
pub fn resolve_category(reply: &str) -> Category {
    let reply = reply.trim().trim_matches(|c| c == '"' || c == '\'' || c == '.');
    if let Some(category) = Category::from_label(reply) {
        return category;
    }
    let lowered = reply.to_lowercase();
    Category::ALL
        .into_iter()
        .find(|c| lowered.contains(&c.label().to_lowercase()))
        .unwrap_or_default()
}

pub fn build_prompt(title: &str, abstract_text: &str) -> String {
    let categories = Category::ALL
        .iter()
        .map(|c| format!("- {}: {}", c.label(), c.description()))
        .collect::<Vec<_>>()
        .join("\n");
    let abstract_text: String = abstract_text.chars().take(MAX_ABSTRACT_CHARS).collect();

    format!(
        "Classify this machine learning paper into exactly one category.\n\n\
         Categories:\n{categories}\n\n\
         Paper Title: {title}\n\n\
         Abstract: {abstract_text}\n\n\
         Respond with ONLY the category name (e.g., \"Foundational\" or \"Theory\"), nothing else."
    )
}

// ─── OpenAI ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

pub struct OpenAiClassifier {
    client: RateLimitedClient,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiClassifier {
    pub fn new(config: &ClassifierConfig, api_key: String, user_agent: &str) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(
                "openai",
                Duration::ZERO,
                config.request_timeout(),
                user_agent,
            )?,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &ClassifierConfig, user_agent: &str) -> Result<Option<Self>> {
        match config.api_key() {
            Some(key) => Self::new(config, key, user_agent).map(Some),
            None => Ok(None),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| ScienceError::Classification(format!("invalid API key: {e}")))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    async fn classify(&self, title: &str, abstract_text: &str) -> Result<Category> {
        let prompt = build_prompt(title, abstract_text);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.0,
            max_tokens: 20,
        };

        let response: Value = self
            .client
            .post_json_with_headers(&self.endpoint, &request, self.headers()?)
            .await?;
        let reply = response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| ScienceError::Classification("reply has no message content".into()))?;

        let category = resolve_category(reply);
        debug!(title, reply = reply.trim(), %category, "classified");
        Ok(category)
    }
}

/// Files everything under the default category.
#[derive(Debug, Default)]
pub struct DefaultClassifier;

#[async_trait]
impl Classifier for DefaultClassifier {
    fn name(&self) -> &str {
        "default"
    }

    async fn classify(&self, _title: &str, _abstract_text: &str) -> Result<Category> {
        Ok(Category::default())
    }
}
