//! jyutping-core
//!
//! Data model, collaborator seams and configuration shared by the
//! Jyutping engine crate (libjyutping).
//!
//! The dictionary is indexed with an FST for code lookups and snapshots with
//! bincode; matching rules persist in redb.
//!
//! Public API:
//! - `DictionaryEntry` - One (hanzi, code, word, frequency) dictionary row
//! - `DictionaryStore` / `Dictionary` - Read-only code and text lookups
//! - `MatchingRule` / `RuleStore` - Per-user phonological configuration
//! - `RecommendationCandidate` - Related-word suggestion with provenance
//! - `Envelope` - `{success, data|error}` response wrapper
//! - `Config` - Engine-wide limits
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod entry;
pub use entry::{DictionaryEntry, MatchType, Provenance, RecommendationCandidate};

pub mod dictionary;
pub use dictionary::{by_popularity, Dictionary, DictionaryStore, LookupQuery};

pub mod rules;
pub use rules::{
    EffectiveExceptionRule, ExceptionOverride, ExceptionRule, InMemoryRuleStore, MatchingRule,
    RedbRuleStore, RuleScope, RuleSeed, RuleStore, TonePairs,
};

pub mod envelope;
pub use envelope::{Envelope, ErrorBody};

/// Engine-wide result limits.
///
/// Language-specific settings (predictor endpoint, recommendation policy)
/// live in `JyutpingConfig` in libjyutping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Cap for exact-set (tier 1) search results.
    pub exact_limit: usize,
    /// Cap for tone-variant, partial and base-fallback results.
    pub partial_limit: usize,
    /// Default number of prefix suggestions.
    pub suggest_limit: usize,
    /// Frequency reported on a synthetic segmented-phrase entry.
    pub phrase_frequency: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exact_limit: 10,
            partial_limit: 15,
            suggest_limit: 10,
            phrase_frequency: 100,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<std::path::Path>>(
        path: P,
    ) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Utility helpers.
pub mod utils {
    /// Normalize input strings (NFC) and trim whitespace.
    pub fn normalize(s: &str) -> String {
        use unicode_normalization::UnicodeNormalization;
        s.nfc().collect::<String>().trim().to_string()
    }

    /// True for characters in the CJK Unified Ideographs block (U+4E00-U+9FFF).
    pub fn is_han(ch: char) -> bool {
        ('\u{4E00}'..='\u{9FFF}').contains(&ch)
    }

    pub fn contains_han(s: &str) -> bool {
        s.chars().any(is_han)
    }
}
