//! Related-word ("what comes next") recommendation.
//!
//! Predictor output is cleaned, then confirmed against the dictionary. When the
//! predictor is disabled, fails, times out or returns nothing, a deterministic
//! fallback runs instead at a raised frequency floor. Survivors are
//! deduplicated by (hanzi, code), floored, sorted by frequency and capped.
//! An empty list is a valid answer; the floor is never lowered to fill it.

use std::sync::Arc;

use ahash::AHashSet;
use jyutping_core::utils::normalize;
use jyutping_core::{
    DictionaryEntry, DictionaryStore, LookupQuery, MatchingRule, Provenance,
    RecommendationCandidate, Result,
};
use tracing::{debug, warn};

use crate::config::{JyutpingConfig, RecommendPolicy};
use crate::predictor::{Predictor, PredictorError};
use crate::syllable::{strip_tone, Syllable};

/// Final floor when any candidate came from the predictor.
pub const AI_FREQUENCY_FLOOR: u64 = 50;
/// Lookup and final floor for the heuristic fallback.
pub const FALLBACK_FREQUENCY_FLOOR: u64 = 200;
/// Longer predictions are discarded outright.
pub const MAX_PREDICTION_CHARS: usize = 20;
/// Longest unconfirmed prediction kept as a zero-frequency placeholder.
pub const MAX_PLACEHOLDER_CHARS: usize = 4;
pub const MAX_RELATED_WORDS: usize = 15;
/// Cap on same-initial fallback words.
pub const SIMILAR_LIMIT: usize = 5;

/// Very common continuation words.
pub const FOLLOW_WORDS: [&str; 9] = ["的", "了", "是", "在", "有", "要", "去", "來", "到"];
pub const PLACE_TRIGGERS: [char; 2] = ['去', '到'];
pub const PLACE_WORDS: [&str; 4] = ["學校", "醫院", "屋企", "公園"];
pub const WANT_TRIGGER: char = '想';
pub const ACTION_WORDS: [&str; 5] = ["去", "做", "食", "飲", "睇"];

/// Inputs to one recommendation. All fields are optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendRequest<'a> {
    pub hanzi: Option<&'a str>,
    pub jyutping: Option<&'a str>,
    pub context: Option<&'a str>,
}

pub struct RelatedWordRecommender {
    dict: Arc<dyn DictionaryStore>,
    predictor: Box<dyn Predictor>,
    policy: RecommendPolicy,
    language: String,
    max_predictions: usize,
}

/// Ordered candidate list, unique by (hanzi, code).
#[derive(Default)]
struct CandidateSet {
    seen: AHashSet<(String, String)>,
    items: Vec<RecommendationCandidate>,
}

impl CandidateSet {
    fn push(&mut self, c: RecommendationCandidate) {
        let (text, code) = c.key();
        if self.seen.insert((text.to_string(), code.to_string())) {
            self.items.push(c);
        }
    }

    fn push_entry(&mut self, e: DictionaryEntry, provenance: Provenance) {
        self.push(RecommendationCandidate::from_entry(e, provenance));
    }
}

/// Leading consonant cluster of one syllable, or its first letter when it
/// has no initial or does not parse.
fn onset_of(syllable: &str) -> String {
    match Syllable::parse(syllable) {
        Ok(s) => s.onset_key().to_string(),
        Err(_) => syllable.chars().take(1).collect(),
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(normalize).filter(|s| !s.is_empty())
}

impl RelatedWordRecommender {
    pub fn new(
        dict: Arc<dyn DictionaryStore>,
        predictor: Box<dyn Predictor>,
        config: &JyutpingConfig,
    ) -> Self {
        Self {
            dict,
            predictor,
            policy: config.recommend.clone(),
            language: config.predictor.language.clone(),
            max_predictions: config.predictor.max_results,
        }
    }

    pub fn policy(&self) -> &RecommendPolicy {
        &self.policy
    }

    pub fn recommend(
        &self,
        req: RecommendRequest<'_>,
        rules: &MatchingRule,
    ) -> Result<Vec<RecommendationCandidate>> {
        let hanzi = non_empty(req.hanzi);
        let jyutping = non_empty(req.jyutping).map(|j| j.to_ascii_lowercase());
        let context = non_empty(req.context).unwrap_or_default();
        if hanzi.is_none() && jyutping.is_none() {
            return Ok(Vec::new());
        }

        let full_context = match hanzi.as_deref() {
            Some(h) if context.is_empty() => h.to_string(),
            Some(h) if !context.ends_with(h) => format!("{context} {h}"),
            _ => context.clone(),
        };

        let prediction = if full_context.is_empty() {
            Err(PredictorError::EmptyContext)
        } else {
            self.predictor
                .predict(&full_context, &self.language, self.max_predictions)
        };

        let (candidates, floor) = match prediction {
            Ok(predictions) if !predictions.is_empty() => {
                debug!(count = predictions.len(), "using predictor output");
                let set = self.confirm(&predictions, hanzi.as_deref(), rules)?;
                (set, self.policy.ai_frequency_floor)
            }
            outcome => {
                match outcome {
                    Err(PredictorError::Disabled) | Err(PredictorError::EmptyContext) => {
                        debug!("predictor skipped, using heuristic fallback")
                    }
                    Err(e) => warn!(error = %e, "predictor failed, using heuristic fallback"),
                    Ok(_) => debug!("predictor returned nothing, using heuristic fallback"),
                }
                let set = self.fallback(hanzi.as_deref(), jyutping.as_deref(), &full_context)?;
                (set, self.policy.fallback_frequency_floor)
            }
        };

        Ok(self.finish(candidates, floor))
    }

    /// Drop predictions that just repeat the selected word; keep what follows it.
    pub fn strip_selected(prediction: &str, selected: Option<&str>) -> Option<String> {
        let prediction = prediction.trim();
        let Some(sel) = selected.filter(|s| !s.is_empty()) else {
            return Some(prediction.to_string()).filter(|p| !p.is_empty());
        };
        if prediction == sel {
            return None;
        }
        if let Some(rest) = prediction.strip_prefix(sel) {
            let rest = rest.trim_matches(|c: char| c.is_whitespace() || matches!(c, '，' | ',' | '、'));
            return Some(rest.to_string()).filter(|r| !r.is_empty());
        }
        if prediction.contains(sel) {
            return None;
        }
        Some(prediction.to_string()).filter(|p| !p.is_empty())
    }

    fn confirm(
        &self,
        predictions: &[String],
        selected: Option<&str>,
        rules: &MatchingRule,
    ) -> Result<CandidateSet> {
        let floor = Some(rules.frequency_threshold);
        let mut set = CandidateSet::default();
        for raw in predictions {
            if raw.trim().chars().count() > self.policy.max_prediction_chars {
                continue;
            }
            let Some(word) = Self::strip_selected(raw, selected) else {
                continue;
            };
            if !word.chars().any(char::is_alphabetic) {
                continue;
            }

            let found = match self.dict.find_exact(&word, floor)? {
                Some(e) => Some(e),
                None => self.dict.find_text_prefix(&word, floor)?,
            };
            match found {
                Some(e) => set.push_entry(e, Provenance::Dictionary),
                None if word.chars().count() <= self.policy.max_placeholder_chars => {
                    set.push(RecommendationCandidate::placeholder(word))
                }
                None => debug!(word = %word, "dropping unconfirmed prediction"),
            }
        }
        Ok(set)
    }

    fn fallback(
        &self,
        hanzi: Option<&str>,
        jyutping: Option<&str>,
        full_context: &str,
    ) -> Result<CandidateSet> {
        let floor = Some(self.policy.fallback_frequency_floor);
        let mut set = CandidateSet::default();

        // Same leading consonant cluster as the selected reading, so "n"
        // never pulls in "ng" and "g" never pulls in "gw".
        if let Some(selected) = jyutping {
            let first = selected.split_whitespace().next().unwrap_or_default();
            if strip_tone(first).chars().count() >= 2 {
                let onset = onset_of(first);
                let prefixes = [onset.clone()];
                let q = LookupQuery::new(&prefixes, floor, usize::MAX);
                self.dict
                    .find_by_prefix(&q)?
                    .into_iter()
                    .filter(|e| hanzi.map_or(true, |h| e.text() != h))
                    .filter(|e| e.jyutping_code != selected)
                    .filter(|e| {
                        e.jyutping_code
                            .split_whitespace()
                            .next()
                            .is_some_and(|s| onset_of(s) == onset)
                    })
                    .take(self.policy.similar_limit)
                    .for_each(|e| set.push_entry(e, Provenance::Heuristic));
            }
        }

        if let Some(h) = hanzi {
            for w in FOLLOW_WORDS.iter().filter(|w| **w != h) {
                if let Some(e) = self.dict.find_exact(w, floor)? {
                    set.push_entry(e, Provenance::Heuristic);
                }
            }
        }

        if full_context.contains(&PLACE_TRIGGERS[..]) {
            self.push_words(&mut set, &PLACE_WORDS, floor)?;
        }
        if full_context.contains(WANT_TRIGGER) {
            self.push_words(&mut set, &ACTION_WORDS, floor)?;
        }
        Ok(set)
    }

    fn push_words(&self, set: &mut CandidateSet, words: &[&str], floor: Option<u64>) -> Result<()> {
        for w in words {
            if let Some(e) = self.dict.find_exact(w, floor)? {
                set.push_entry(e, Provenance::Heuristic);
            }
        }
        Ok(())
    }

    fn finish(&self, set: CandidateSet, floor: u64) -> Vec<RecommendationCandidate> {
        let mut out: Vec<RecommendationCandidate> = set
            .items
            .into_iter()
            .filter(|c| c.frequency >= floor || c.is_placeholder())
            .collect();
        out.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        out.truncate(self.policy.max_related);
        debug!(count = out.len(), floor, "related words settled");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_selected_keeps_the_continuation() {
        let s = RelatedWordRecommender::strip_selected;
        assert_eq!(s("我想", Some("我")), Some("想".to_string()));
        assert_eq!(s("我", Some("我")), None);
        assert_eq!(s("你同我", Some("我")), None);
        assert_eq!(s("我，去", Some("我")), Some("去".to_string()));
        assert_eq!(s("食飯", Some("我")), Some("食飯".to_string()));
        assert_eq!(s(" 食飯 ", None), Some("食飯".to_string()));
    }

    #[test]
    fn onset_keeps_whole_clusters() {
        assert_eq!(onset_of("ngo5"), "ng");
        assert_eq!(onset_of("nei5"), "n");
        assert_eq!(onset_of("gwok3"), "gw");
        assert_eq!(onset_of("o3"), "o");
    }

    #[test]
    fn policy_constants() {
        assert!(FALLBACK_FREQUENCY_FLOOR > AI_FREQUENCY_FLOOR);
        assert!(MAX_PLACEHOLDER_CHARS < MAX_PREDICTION_CHARS);
        assert!(!FOLLOW_WORDS.contains(&"想"));
    }
}
