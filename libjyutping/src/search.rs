//! Tiered dictionary search.
//!
//! `search` runs up to four lookups in a fixed order and returns the first
//! non-empty one, tagged with the tier that produced it:
//!
//! 1. exact: code equals any variant (original first), cap `exact_limit`
//! 2. tone_variant: toned input only; code starts with a tone-stripped variant
//! 3. partial: code starts with any variant (original first)
//! 4. base_match: toned input only; code starts with the stripped original,
//!    no frequency floor
//!
//! Tiers 1-3 keep entries with `frequency > rules.frequency_threshold`.
//! Nothing found is `MatchType::None`, not an error.
//!
//! Input containing Han characters is segmented character by character
//! instead (see `segment_phrase`).

use std::sync::Arc;

use jyutping_core::utils::{contains_han, is_han, normalize};
use jyutping_core::{
    by_popularity, Config, DictionaryEntry, DictionaryStore, Error, LookupQuery, MatchType,
    MatchingRule, Result,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::syllable::{split_tone, strip_tone};
use crate::variants::VariantGenerator;

/// Tags that mark an entry as a useful default when nothing is typed yet.
pub static DEFAULT_SUGGESTION_TAGS: phf::Set<&'static str> = phf::phf_set! {
    "daily", "school", "home", "community", "greeting", "verb", "noun",
};

/// Outcome of `search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub matches: Vec<DictionaryEntry>,
    pub match_type: MatchType,
    /// Codes the lookup ran with; empty for phrase input.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<String>,
    /// Per-character entries behind a segmented phrase.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<DictionaryEntry>,
}

impl SearchResult {
    fn tier(matches: Vec<DictionaryEntry>, match_type: MatchType, variants: Vec<String>) -> Self {
        Self {
            matches,
            match_type,
            variants,
            segments: Vec::new(),
        }
    }
}

/// Hanzi-to-Jyutping reading for one character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterReading {
    pub character: String,
    pub jyutping: Option<String>,
    pub meaning: Option<String>,
    pub frequency: u64,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub original_text: String,
    pub jyutping: String,
    pub characters: Vec<CharacterReading>,
    pub unknown_characters: Vec<String>,
    pub coverage: f32,
}

/// Runs prioritized lookups against a dictionary store.
#[derive(Clone)]
pub struct TieredSearchEngine {
    dict: Arc<dyn DictionaryStore>,
    config: Config,
}

impl TieredSearchEngine {
    pub fn new(dict: Arc<dyn DictionaryStore>, config: Config) -> Self {
        Self { dict, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Search by code (or by hanzi phrase).
    pub fn search(&self, input: &str, rules: &MatchingRule) -> Result<SearchResult> {
        let input = normalize(input);
        if input.is_empty() {
            return Err(Error::validation("code", "jyutping code is required"));
        }
        if contains_han(&input) {
            return self.segment_phrase(&input, rules);
        }

        let code = input.to_ascii_lowercase();
        let variants = VariantGenerator::new(rules)
            .expand(&code)
            .map_err(|_| Error::validation("code", format!("not a jyutping syllable: {input:?}")))?;
        debug!(code = %code, variants = ?variants, "expanded search code");

        let floor = Some(rules.frequency_threshold);
        let (_, tone) = split_tone(&code);

        // Tier 1
        let q = LookupQuery::new(&variants, floor, self.config.exact_limit).prefer(&code);
        let hits = self.dict.find_by_code(&q)?;
        if !hits.is_empty() {
            return Ok(self.finish(hits, MatchType::Exact, variants));
        }

        // Tier 2
        if tone.is_some() {
            let mut bases: Vec<String> = Vec::with_capacity(variants.len());
            for v in &variants {
                let b = strip_tone(v);
                if !b.is_empty() && !bases.iter().any(|x| x == b) {
                    bases.push(b.to_string());
                }
            }
            let q = LookupQuery::new(&bases, floor, self.config.partial_limit);
            let hits = self.dict.find_by_prefix(&q)?;
            if !hits.is_empty() {
                return Ok(self.finish(hits, MatchType::ToneVariant, variants));
            }
        }

        // Tier 3
        let q = LookupQuery::new(&variants, floor, self.config.partial_limit).prefer(&code);
        let hits = self.dict.find_by_prefix(&q)?;
        if !hits.is_empty() {
            return Ok(self.finish(hits, MatchType::Partial, variants));
        }

        // Tier 4
        if tone.is_some() {
            let base = vec![strip_tone(&code).to_string()];
            let q = LookupQuery::new(&base, None, self.config.partial_limit);
            let hits = self.dict.find_by_prefix(&q)?;
            if !hits.is_empty() {
                return Ok(self.finish(hits, MatchType::BaseMatch, variants));
            }
        }

        Ok(self.finish(Vec::new(), MatchType::None, variants))
    }

    fn finish(&self, hits: Vec<DictionaryEntry>, tier: MatchType, variants: Vec<String>) -> SearchResult {
        debug!(tier = tier.as_str(), count = hits.len(), "search tier settled");
        SearchResult::tier(hits, tier, variants)
    }

    /// Look up each Han character of `phrase` and join their codes.
    ///
    /// Every character must resolve (frequency above the rule threshold,
    /// most frequent reading wins); otherwise the result is `MatchType::None`.
    pub fn segment_phrase(&self, phrase: &str, rules: &MatchingRule) -> Result<SearchResult> {
        let floor = Some(rules.frequency_threshold);
        let mut segments = Vec::new();
        for ch in phrase.chars().filter(|c| is_han(*c)) {
            let mut buf = [0u8; 4];
            match self.dict.find_exact(ch.encode_utf8(&mut buf), floor)? {
                Some(e) => segments.push(e),
                None => {
                    debug!(phrase, missing = %ch, "phrase segmentation incomplete");
                    return Ok(SearchResult::tier(Vec::new(), MatchType::None, Vec::new()));
                }
            }
        }

        let code = segments
            .iter()
            .map(|e| e.jyutping_code.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let combined = DictionaryEntry::new(phrase, code, self.config.phrase_frequency).with_word(phrase);
        Ok(SearchResult {
            matches: vec![combined],
            match_type: MatchType::PhraseSegmented,
            variants: Vec::new(),
            segments,
        })
    }

    /// Prefix suggestions for partially typed input.
    ///
    /// Ranked by priority class (code equals input, code starts with input,
    /// hanzi starts with input, word starts with input, anything containing
    /// input), then frequency, then insertion order. Empty input returns
    /// tagged everyday entries instead.
    pub fn suggest(&self, input: &str, limit: usize, rules: &MatchingRule) -> Result<Vec<DictionaryEntry>> {
        let input = normalize(input);
        let floor = Some(rules.frequency_threshold);
        if input.is_empty() {
            let tags: Vec<&str> = DEFAULT_SUGGESTION_TAGS.iter().copied().collect();
            return self.dict.find_tagged(&tags, floor, limit);
        }

        // Codes are stored lowercase; hanzi and glosses keep their case.
        let needle = input.to_ascii_lowercase();
        let class = |e: &DictionaryEntry| -> u8 {
            if e.jyutping_code == needle {
                1
            } else if e.jyutping_code.starts_with(&needle) {
                2
            } else if e.hanzi.as_deref().is_some_and(|h| h.starts_with(input.as_str())) {
                3
            } else if e.word.as_deref().is_some_and(|w| w.starts_with(input.as_str())) {
                4
            } else {
                5
            }
        };
        let mut hits = self.dict.find_containing(&needle, floor)?;
        if needle != input {
            for e in self.dict.find_containing(&input, floor)? {
                if !hits.contains(&e) {
                    hits.push(e);
                }
            }
        }
        hits.sort_by(|a, b| class(a).cmp(&class(b)).then_with(|| by_popularity(a, b)));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Hanzi-to-Jyutping reading of `text`, character by character.
    pub fn translate(&self, text: &str) -> Result<Translation> {
        let text = normalize(text);
        if text.is_empty() {
            return Err(Error::validation("text", "chinese text is required"));
        }

        let mut characters = Vec::new();
        let mut unknown = Vec::new();
        for ch in text.chars() {
            let character = ch.to_string();
            if !is_han(ch) {
                characters.push(CharacterReading {
                    jyutping: Some(character.clone()),
                    character,
                    meaning: None,
                    frequency: 0,
                    confidence: 1.0,
                });
                continue;
            }
            match self.dict.find_exact(&character, None)? {
                Some(e) => characters.push(CharacterReading {
                    character,
                    jyutping: Some(e.jyutping_code.clone()),
                    meaning: Some(e.word.clone().unwrap_or_else(|| e.text().to_string())),
                    frequency: e.frequency,
                    confidence: (e.frequency as f32 / 1000.0).min(1.0),
                }),
                None => {
                    unknown.push(character.clone());
                    characters.push(CharacterReading {
                        character,
                        jyutping: None,
                        meaning: None,
                        frequency: 0,
                        confidence: 0.0,
                    });
                }
            }
        }

        let jyutping = characters
            .iter()
            .filter_map(|c| c.jyutping.as_deref())
            .filter(|j| !j.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let total = characters.len();
        let coverage = if total == 0 {
            0.0
        } else {
            (total - unknown.len()) as f32 / total as f32
        };
        Ok(Translation {
            original_text: text,
            jyutping,
            characters,
            unknown_characters: unknown,
            coverage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jyutping_core::Dictionary;

    fn engine(entries: Vec<DictionaryEntry>) -> TieredSearchEngine {
        let dict = Dictionary::from_entries(entries).unwrap();
        TieredSearchEngine::new(Arc::new(dict), Config::default())
    }

    fn texts(r: &[DictionaryEntry]) -> Vec<&str> {
        r.iter().map(|e| e.text()).collect()
    }

    #[test]
    fn exact_tier_prefers_original_code() {
        let e = engine(vec![
            DictionaryEntry::new("李", "lei5", 900),
            DictionaryEntry::new("你", "nei5", 800),
        ]);
        let rules = MatchingRule {
            allow_n_l_confusion: true,
            ..MatchingRule::default()
        };
        let r = e.search("nei5", &rules).unwrap();
        assert_eq!(r.match_type, MatchType::Exact);
        assert_eq!(texts(&r.matches), vec!["你", "李"]);
        assert_eq!(r.variants, vec!["nei5", "lei5"]);
    }

    #[test]
    fn tone_variant_tier_finds_sibling_tones() {
        let e = engine(vec![DictionaryEntry::new("尼", "nei4", 300)]);
        let r = e.search("nei5", &MatchingRule::default()).unwrap();
        assert_eq!(r.match_type, MatchType::ToneVariant);
        assert_eq!(texts(&r.matches), vec!["尼"]);
    }

    #[test]
    fn untoned_input_resolves_by_prefix() {
        let e = engine(vec![
            DictionaryEntry::new("尼", "nei4", 300),
            DictionaryEntry::new("你", "nei5", 900),
        ]);
        let r = e.search("nei", &MatchingRule::default()).unwrap();
        assert_eq!(r.match_type, MatchType::Partial);
        assert_eq!(texts(&r.matches), vec!["你", "尼"]);
    }

    #[test]
    fn base_tier_ignores_threshold() {
        let e = engine(vec![DictionaryEntry::new("呢", "nei1", 10)]);
        let r = e.search("nei5", &MatchingRule::default()).unwrap();
        assert_eq!(r.match_type, MatchType::BaseMatch);

        let untoned = e.search("nei", &MatchingRule::default()).unwrap();
        assert_eq!(untoned.match_type, MatchType::None);
    }

    #[test]
    fn nothing_found_is_not_an_error() {
        let e = engine(vec![DictionaryEntry::new("你", "nei5", 900)]);
        let r = e.search("zzz3", &MatchingRule::default()).unwrap();
        assert_eq!(r.match_type, MatchType::None);
        assert!(r.matches.is_empty());
    }

    #[test]
    fn invalid_and_empty_codes_are_validation_errors() {
        let e = engine(Vec::new());
        assert_eq!(e.search("  ", &MatchingRule::default()).unwrap_err().kind(), "validation");
        assert_eq!(e.search("nei9", &MatchingRule::default()).unwrap_err().kind(), "validation");
    }

    #[test]
    fn input_is_normalized_and_lowercased() {
        let e = engine(vec![DictionaryEntry::new("你", "nei5", 900)]);
        let r = e.search("  NEI5 ", &MatchingRule::default()).unwrap();
        assert_eq!(r.match_type, MatchType::Exact);
    }

    #[test]
    fn phrase_is_segmented_per_character() {
        let e = engine(vec![
            DictionaryEntry::new("學", "hok6", 700),
            DictionaryEntry::new("學", "hok2", 60),
            DictionaryEntry::new("校", "haau6", 500),
        ]);
        let r = e.search("學校", &MatchingRule::default()).unwrap();
        assert_eq!(r.match_type, MatchType::PhraseSegmented);
        assert_eq!(r.matches[0].jyutping_code, "hok6 haau6");
        assert_eq!(r.matches[0].frequency, 100);
        assert_eq!(r.segments.len(), 2);

        let missing = e.search("學生", &MatchingRule::default()).unwrap();
        assert_eq!(missing.match_type, MatchType::None);
    }

    #[test]
    fn suggest_ranks_by_priority_class() {
        let e = engine(vec![
            DictionaryEntry::new("乜", "mat1", 900),
            DictionaryEntry::new("媽", "maa1", 600),
            DictionaryEntry::new("馬", "maa5", 700),
            DictionaryEntry::new("ma", "aa3", 800),
            DictionaryEntry::new("嗎", "maa", 100),
        ]);
        let got = e.suggest("maa", 10, &MatchingRule::default()).unwrap();
        assert_eq!(texts(&got), vec!["嗎", "馬", "媽"]);

        let got = e.suggest("ma", 10, &MatchingRule::default()).unwrap();
        // code prefix before hanzi prefix
        assert_eq!(texts(&got), vec!["乜", "馬", "媽", "嗎", "ma"]);
    }

    #[test]
    fn suggest_matches_glosses_as_typed() {
        let e = engine(vec![
            DictionaryEntry::new("", "nei5 hou2", 300).with_word("Hello"),
            DictionaryEntry::new("喺", "hai2", 500),
            DictionaryEntry::new("", "hei3", 400).with_word("hello there"),
        ]);
        let rules = MatchingRule::default();
        assert_eq!(
            texts(&e.suggest("Hello", 10, &rules).unwrap()),
            vec!["Hello", "hello there"]
        );
        assert_eq!(texts(&e.suggest("hello", 10, &rules).unwrap()), vec!["hello there"]);
        assert_eq!(texts(&e.suggest("HAI", 10, &rules).unwrap()), vec!["喺"]);
    }

    #[test]
    fn empty_suggest_returns_tagged_entries_only() {
        let e = engine(vec![
            DictionaryEntry::new("的", "dik1", 5000),
            DictionaryEntry::new("早晨", "zou2 san4", 800).with_tags(["greeting"]),
            DictionaryEntry::new("食", "sik6", 700).with_tags(["verb", "daily"]),
            DictionaryEntry::new("罕", "hon2", 30).with_tags(["daily"]),
        ]);
        let got = e.suggest("", 10, &MatchingRule::default()).unwrap();
        assert_eq!(texts(&got), vec!["早晨", "食"]);
    }

    #[test]
    fn translate_reports_coverage() {
        let e = engine(vec![
            DictionaryEntry::new("我", "ngo5", 2000),
            DictionaryEntry::new("食", "sik6", 500),
        ]);
        let t = e.translate("我食飯!").unwrap();
        assert_eq!(t.jyutping, "ngo5 sik6 !");
        assert_eq!(t.unknown_characters, vec!["飯"]);
        assert_eq!(t.characters[0].confidence, 1.0);
        assert_eq!(t.characters[1].confidence, 0.5);
        assert_eq!(t.coverage, 0.75);
        assert!(e.translate(" ").is_err());
    }
}
