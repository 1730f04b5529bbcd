//! Dictionary and recommendation value types.
//!
//! This module provides:
//! - `DictionaryEntry`: one immutable (hanzi, code, gloss, frequency) row
//! - `MatchType`: which search tier satisfied a query
//! - `RecommendationCandidate`: a "what comes next" suggestion with provenance

use serde::{Deserialize, Serialize};

/// A single dictionary row.
///
/// `id` is the insertion order assigned by the store and is the final
/// tie-break wherever entries are ranked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    #[serde(default)]
    pub id: u64,
    /// Single character, or absent for multi-character words stored under `word`.
    #[serde(default)]
    pub hanzi: Option<String>,
    pub jyutping_code: String,
    /// Gloss or multi-character word form.
    #[serde(default)]
    pub word: Option<String>,
    /// Popularity weight. Higher means more common.
    #[serde(default)]
    pub frequency: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DictionaryEntry {
    pub fn new<H: Into<String>, C: Into<String>>(hanzi: H, code: C, frequency: u64) -> Self {
        Self {
            id: 0,
            hanzi: Some(hanzi.into()),
            jyutping_code: code.into(),
            word: None,
            frequency,
            tags: Vec::new(),
        }
    }

    pub fn with_word<W: Into<String>>(mut self, word: W) -> Self {
        self.word = Some(word.into());
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// The written form: hanzi when present, otherwise the word.
    pub fn text(&self) -> &str {
        let present = |s: &&str| !s.trim().is_empty();
        self.hanzi
            .as_deref()
            .filter(present)
            .or(self.word.as_deref().filter(present))
            .unwrap_or_default()
    }

    /// Turn blank hanzi and word columns into absent ones.
    pub fn clear_blank_text(&mut self) {
        let blank = |s: &String| s.trim().is_empty();
        if self.hanzi.as_ref().is_some_and(blank) {
            self.hanzi = None;
        }
        if self.word.as_ref().is_some_and(blank) {
            self.word = None;
        }
    }

    pub fn text_starts_with(&self, prefix: &str) -> bool {
        self.hanzi.as_deref().is_some_and(|h| h.starts_with(prefix))
            || self.word.as_deref().is_some_and(|w| w.starts_with(prefix))
    }

    pub fn has_any_tag(&self, wanted: &[&str]) -> bool {
        self.tags.iter().any(|t| wanted.contains(&t.as_str()))
    }
}

/// Which search tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    ToneVariant,
    Partial,
    BaseMatch,
    PhraseSegmented,
    None,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::ToneVariant => "tone_variant",
            MatchType::Partial => "partial",
            MatchType::BaseMatch => "base_match",
            MatchType::PhraseSegmented => "phrase_segmented",
            MatchType::None => "none",
        }
    }
}

/// Where a recommendation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Predictor output with no dictionary backing (synthetic placeholder).
    Ai,
    /// Predictor output confirmed against the dictionary.
    Dictionary,
    /// Deterministic fallback lookup.
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    pub hanzi: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    /// Empty for synthetic placeholders.
    pub jyutping_code: String,
    /// Zero for synthetic placeholders.
    pub frequency: u64,
    pub provenance: Provenance,
}

impl RecommendationCandidate {
    pub fn from_entry(entry: DictionaryEntry, provenance: Provenance) -> Self {
        let hanzi = entry.text().to_string();
        Self {
            hanzi,
            word: entry.word,
            jyutping_code: entry.jyutping_code,
            frequency: entry.frequency,
            provenance,
        }
    }

    pub fn placeholder<T: Into<String>>(text: T) -> Self {
        let text = text.into();
        Self {
            word: Some(text.clone()),
            hanzi: text,
            jyutping_code: String::new(),
            frequency: 0,
            provenance: Provenance::Ai,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.provenance == Provenance::Ai && self.jyutping_code.is_empty()
    }

    /// Deduplication key: the (written form, code) pair.
    pub fn key(&self) -> (&str, &str) {
        (self.hanzi.as_str(), self.jyutping_code.as_str())
    }
}
