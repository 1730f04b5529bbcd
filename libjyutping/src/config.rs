use serde::{Deserialize, Serialize};

use crate::recommend::{
    AI_FREQUENCY_FLOOR, FALLBACK_FREQUENCY_FLOOR, MAX_PLACEHOLDER_CHARS, MAX_PREDICTION_CHARS,
    MAX_RELATED_WORDS, SIMILAR_LIMIT,
};

/// Jyutping engine configuration that extends the base `Config` from core.
///
/// This configuration includes:
/// - All result limits from `jyutping_core::Config` (flattened via serde)
/// - The text-prediction service used by related-word recommendation
/// - Recommendation filtering policy (frequency floors, length caps)
///
/// # Example
///
/// ```rust
/// use libjyutping::JyutpingConfig;
///
/// let config = JyutpingConfig::from_toml_str("partial_limit = 20\n[predictor]\nenabled = true\n").unwrap();
/// assert_eq!(config.base.partial_limit, 20);
/// assert_eq!(config.recommend.fallback_frequency_floor, 200);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct JyutpingConfig {
    /// Base configuration fields (search and suggestion limits)
    #[serde(flatten)]
    pub base: jyutping_core::Config,

    pub predictor: PredictorConfig,

    pub recommend: RecommendPolicy,
}

/// How the predictor endpoint is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorKind {
    /// POST an OpenAI-style chat-completion request.
    #[default]
    ChatCompletion,
    /// GET `?context=&language=&max=` returning a JSON string array.
    Custom,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Disabled by default; recommendation then runs the heuristic fallback.
    pub enabled: bool,
    pub kind: PredictorKind,
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_results: usize,
    /// Language tag sent with each request ("zh" for Cantonese/Chinese).
    pub language: String,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: PredictorKind::ChatCompletion,
            endpoint: "http://127.0.0.1:11434/v1/chat/completions".to_string(),
            model: "llama3:latest".to_string(),
            timeout_ms: 3000,
            max_results: MAX_RELATED_WORDS,
            language: "zh".to_string(),
        }
    }
}

/// Filtering policy for related-word recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RecommendPolicy {
    pub ai_frequency_floor: u64,
    pub fallback_frequency_floor: u64,
    pub max_prediction_chars: usize,
    pub max_placeholder_chars: usize,
    pub max_related: usize,
    pub similar_limit: usize,
}

impl Default for RecommendPolicy {
    fn default() -> Self {
        Self {
            ai_frequency_floor: AI_FREQUENCY_FLOOR,
            fallback_frequency_floor: FALLBACK_FREQUENCY_FLOOR,
            max_prediction_chars: MAX_PREDICTION_CHARS,
            max_placeholder_chars: MAX_PLACEHOLDER_CHARS,
            max_related: MAX_RELATED_WORDS,
            similar_limit: SIMILAR_LIMIT,
        }
    }
}

impl JyutpingConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Get a reference to the base config
    pub fn base(&self) -> &jyutping_core::Config {
        &self.base
    }
}
