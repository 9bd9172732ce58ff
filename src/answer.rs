//! Answer synthesis from ranked chunks.
//!
//! The retriever hands over its ranked chunks; an [`Answerer`] turns them
//! plus the question into `{answer, sources}`. Two providers exist:
//!
//! - **[`ExtractiveAnswerer`]** quotes the best chunk. No network.
//! - **[`OpenAiAnswerer`]** asks an OpenAI-compatible chat completions API,
//!   with the chunks as context.
//!
//! # Retry Strategy
//!
//! The OpenAI provider retries transient failures with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (other) → fail immediately
//! - Network errors → retry

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use textbook_rag_core::retrieve::RankedChunk;

use crate::config::AnswerConfig;

/// Characters of the top chunk quoted by the extractive answerer.
const EXCERPT_CHARS: usize = 300;

/// Source list used when there is nothing to attribute.
pub const DEFAULT_SOURCE: &str = "Textbook";

/// Reply to a user question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
}

/// Turns a question and its retrieved context into an [`Answer`].
#[async_trait]
pub trait Answerer: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    async fn answer(&self, question: &str, context: &[RankedChunk<'_>]) -> Result<Answer>;
}

/// Distinct source labels in rank order, or `["Textbook"]` if there are none.
pub fn sources(context: &[RankedChunk<'_>]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(context.len());
    for r in context {
        if !out.iter().any(|s| s == r.source_label()) {
            out.push(r.source_label().to_string());
        }
    }
    if out.is_empty() {
        out.push(DEFAULT_SOURCE.to_string());
    }
    out
}

/// Answers by quoting the opening of the best-ranked chunk.
pub struct ExtractiveAnswerer;

#[async_trait]
impl Answerer for ExtractiveAnswerer {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn answer(&self, _question: &str, context: &[RankedChunk<'_>]) -> Result<Answer> {
        let answer = match context.first() {
            Some(top) => {
                let excerpt: String = top.chunk.text.chars().take(EXCERPT_CHARS).collect();
                format!("Based on the textbook: {}...", excerpt)
            }
            None => "I could not find any passage in the textbook to answer from. \
                     Try asking about a topic the book covers."
                .to_string(),
        };
        Ok(Answer {
            answer,
            sources: sources(context),
        })
    }
}

/// Answers through an OpenAI-compatible `POST {base_url}/chat/completions`.
pub struct OpenAiAnswerer {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAiAnswerer {
    /// # Errors
    ///
    /// Returns an error if the API key variable is unset or the HTTP client
    /// cannot be built.
    pub fn new(config: &AnswerConfig) -> Result<Self> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(k) if !k.trim().is_empty() => k,
            _ => bail!(
                "{} environment variable not set (required by answer.provider = \"openai\")",
                config.api_key_env
            ),
        };
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &AnswerConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    fn request_body(&self, question: &str, context: &[RankedChunk<'_>]) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": 0.2,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a teaching assistant for a textbook. Answer the question \
                                using only the provided excerpts. If they do not contain the \
                                answer, say so briefly.",
                },
                { "role": "user", "content": build_prompt(question, context) },
            ],
        })
    }
}

#[async_trait]
impl Answerer for OpenAiAnswerer {
    fn name(&self) -> &str {
        "openai"
    }

    async fn answer(&self, question: &str, context: &[RankedChunk<'_>]) -> Result<Answer> {
        let body = self.request_body(question, context);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(attempt, ?delay, "retrying chat completion");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return Ok(Answer {
                            answer: parse_chat_response(&json)?,
                            sources: sources(context),
                        });
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "chat completion error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("chat completion error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("chat completion failed after retries")))
    }
}

/// User message: numbered excerpts with their sources, then the question.
pub fn build_prompt(question: &str, context: &[RankedChunk<'_>]) -> String {
    let mut prompt = String::from("Textbook excerpts:\n\n");
    for (i, r) in context.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] ({})\n{}\n\n",
            i + 1,
            r.source_label(),
            r.chunk.text.trim()
        ));
    }
    prompt.push_str(&format!("Question: {}", question.trim()));
    prompt
}

/// Extract `choices[0].message.content` from a chat completions response.
pub fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("chat completion response missing choices[0].message.content"))?;
    Ok(content.trim().to_string())
}

/// Build the answerer named by `answer.provider`.
pub fn create_answerer(config: &AnswerConfig) -> Result<Arc<dyn Answerer>> {
    match config.provider.as_str() {
        "extractive" => Ok(Arc::new(ExtractiveAnswerer)),
        "openai" => Ok(Arc::new(OpenAiAnswerer::new(config)?)),
        other => bail!("Unknown answer provider: {}", other),
    }
}
