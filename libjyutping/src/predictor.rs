//! Text-prediction client used by related-word recommendation.
//!
//! The predictor is an optional external service: disabled by default, called
//! synchronously with a client-enforced timeout and never retried. Every
//! failure is reported as a `PredictorError` so the recommender can switch to
//! its heuristic fallback in one place.
//!
//! Uses the `reqwest` blocking client; no async runtime is needed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::{PredictorConfig, PredictorKind};

/// Items longer than this (in characters) are treated as prose, not words.
pub const MAX_ITEM_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("predictor is disabled")]
    Disabled,
    #[error("nothing to predict from")]
    EmptyContext,
    #[error("predictor timed out")]
    Timeout,
    #[error("predictor transport failed: {0}")]
    Transport(String),
    #[error("predictor returned HTTP {0}")]
    Status(u16),
    #[error("malformed predictor response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for PredictorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PredictorError::Timeout
        } else if e.is_decode() {
            PredictorError::Malformed(e.to_string())
        } else {
            PredictorError::Transport(e.to_string())
        }
    }
}

/// Synchronous next-word prediction.
pub trait Predictor: Send + Sync {
    fn predict(
        &self,
        context: &str,
        language: &str,
        max_results: usize,
    ) -> Result<Vec<String>, PredictorError>;
}

/// Predictor used when no service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPredictor;

impl Predictor for DisabledPredictor {
    fn predict(&self, _: &str, _: &str, _: usize) -> Result<Vec<String>, PredictorError> {
        Err(PredictorError::Disabled)
    }
}

/// HTTP predictor for a chat-completion or custom word-list endpoint.
pub struct HttpPredictor {
    client: reqwest::blocking::Client,
    kind: PredictorKind,
    endpoint: String,
    model: String,
}

impl HttpPredictor {
    pub fn new(config: &PredictorConfig) -> Result<Self, PredictorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            kind: config.kind,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        })
    }

    /// Build the predictor the config asks for.
    pub fn from_config(config: &PredictorConfig) -> Box<dyn Predictor> {
        if !config.enabled {
            return Box::new(DisabledPredictor);
        }
        match Self::new(config) {
            Ok(p) => Box::new(p),
            Err(e) => {
                tracing::warn!(error = %e, "predictor client unavailable, using fallback only");
                Box::new(DisabledPredictor)
            }
        }
    }

    fn query_chat(
        &self,
        context: &str,
        language: &str,
        max_results: usize,
    ) -> Result<Vec<String>, PredictorError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": build_prompt(context, language, max_results) }],
            "stream": false,
            "temperature": 0.2,
            "max_tokens": 64,
        });
        let response = self.client.post(&self.endpoint).json(&body).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(PredictorError::Status(status.as_u16()));
        }
        let value: Value = response.json()?;
        let content = extract_content(&value)?;
        Ok(parse_completion(&content, context, max_results))
    }

    fn query_custom(
        &self,
        context: &str,
        language: &str,
        max_results: usize,
    ) -> Result<Vec<String>, PredictorError> {
        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        let url = format!(
            "{}{}context={}&language={}&max={}",
            self.endpoint,
            sep,
            urlencoding::encode(context),
            urlencoding::encode(language),
            max_results
        );
        let response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(PredictorError::Status(status.as_u16()));
        }
        let items: Vec<String> = response.json()?;
        Ok(clean_items(items.iter().map(String::as_str), context, max_results))
    }
}

impl Predictor for HttpPredictor {
    fn predict(
        &self,
        context: &str,
        language: &str,
        max_results: usize,
    ) -> Result<Vec<String>, PredictorError> {
        let context = context.trim();
        if context.is_empty() {
            return Err(PredictorError::EmptyContext);
        }
        match self.kind {
            PredictorKind::ChatCompletion => self.query_chat(context, language, max_results),
            PredictorKind::Custom => self.query_custom(context, language, max_results),
        }
    }
}

fn build_prompt(context: &str, language: &str, max_results: usize) -> String {
    let lang = match language {
        "zh" | "yue" => "Traditional Chinese (Cantonese)",
        _ => "English",
    };
    format!(
        "You are the word-prediction assistant of an AAC (augmentative and alternative \
         communication) keyboard.\n\
         Sentence so far: \"{context}\"\n\
         Predict the {max_results} most likely next words or short phrases in {lang} that \
         continue this sentence. Do not repeat words already in the sentence. Prefer common \
         everyday words.\n\
         Reply with a comma-separated list only, no numbering or explanation."
    )
}

/// Pull the completion text out of a chat-completion response.
fn extract_content(value: &Value) -> Result<String, PredictorError> {
    if let Some(err) = value.get("error") {
        let msg = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(PredictorError::Malformed(msg));
    }
    let choice = value.pointer("/choices/0");
    choice
        .and_then(|c| c.pointer("/message/content").or_else(|| c.get("text")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PredictorError::Malformed("no completion content".to_string()))
}

static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(predictions?|suggestions?|results?):\s*").expect("label pattern compiles")
});
static NUMBERING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d\-.)\s]+").expect("numbering pattern compiles"));
static EXPLANATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*[-–—]\s*.+$").expect("explanation pattern compiles"));

const META_MARKERS: [&str; 4] = [
    "based on the input",
    "based on your input",
    "given the input",
    "input \"",
];

/// Split completion text into candidate words.
pub fn parse_completion(content: &str, context: &str, max_results: usize) -> Vec<String> {
    let content = LABEL_RE.replace(content.trim(), "");
    let items = content
        .split(|c: char| matches!(c, ',' | '，' | ';' | '；' | '\n'))
        .map(|item| {
            let item = item.trim();
            NUMBERING_RE.find(item).map_or(item, |m| &item[m.end()..])
        });
    clean_items(items, context, max_results)
}

fn clean_items<'a, I>(items: I, context: &str, max_results: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let context = context.trim().to_lowercase();
    let mut out: Vec<String> = Vec::new();
    for raw in items {
        let item = raw.trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, '"' | '\'' | '「' | '」' | '『' | '』')
        });
        if item.is_empty() || item.chars().count() > MAX_ITEM_CHARS {
            continue;
        }
        let lower = item.to_lowercase();
        if lower == context || META_MARKERS.iter().any(|m| lower.contains(m)) {
            continue;
        }
        let item = match EXPLANATION_RE.captures(item) {
            Some(c) => c.get(1).map_or(item, |m| m.as_str().trim()),
            None => item,
        };
        if !item.is_empty() && !out.iter().any(|o| o == item) {
            out.push(item.to_string());
        }
        if out.len() >= max_results {
            break;
        }
    }
    out
}
