//! Phonological variant expansion.
//!
//! Each enabled toggle of a `MatchingRule` contributes alternate spellings
//! derived from the original code only; rules never feed each other, so the
//! set stays small (at most a dozen or so codes) and deterministic. The
//! original code is always first, and later duplicates are dropped.
//!
//! | toggle                      | example            |
//! |-----------------------------|--------------------|
//! | `merge_n_ng_finals`         | sin1 → sing1       |
//! | `allow_coda_simplification` | sat1 → sak1        |
//! | `ignore_tones`              | nei5 → nei, nei1-6 |
//! | `allow_fuzzy_tones`         | ho2 → ho5          |
//! | `allow_ng_zero_confusion`   | ngo5 → o5          |
//! | `allow_n_l_confusion`       | nei5 → lei5        |

use jyutping_core::{MatchingRule, Result, TonePairs};

use crate::syllable::Syllable;

/// Expands codes under one resolved rule set.
#[derive(Debug, Clone)]
pub struct VariantGenerator<'r> {
    rules: &'r MatchingRule,
    tone_pairs: TonePairs,
}

impl<'r> VariantGenerator<'r> {
    pub fn new(rules: &'r MatchingRule) -> Self {
        let tone_pairs = rules
            .fuzzy_tone_pairs
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(TonePairs::default_pairs);
        Self { rules, tone_pairs }
    }

    /// Expand `code` into its ordered, duplicate-free variant list.
    ///
    /// Fails with `Error::InvalidCode` unless `code` matches `^[a-z]+[1-6]?$`.
    pub fn expand(&self, code: &str) -> Result<Vec<String>> {
        let syl = Syllable::parse(code)?;
        let base = syl.base();
        let tone = syl.tone_suffix();
        let mut out = vec![code.to_string()];
        let mut add = |v: String| {
            if !out.contains(&v) {
                out.push(v);
            }
        };

        if self.rules.merge_n_ng_finals {
            if let Some(stem) = nonempty_stem(&base, "ng") {
                add(format!("{stem}n{tone}"));
            } else if let Some(stem) = nonempty_stem(&base, "n") {
                add(format!("{stem}ng{tone}"));
            }
        }

        if self.rules.allow_coda_simplification {
            if let Some(stem) = nonempty_stem(&base, "t") {
                add(format!("{stem}k{tone}"));
            } else if let Some(stem) = nonempty_stem(&base, "k") {
                add(format!("{stem}t{tone}"));
            }
        }

        if self.rules.ignore_tones {
            add(base.clone());
            for t in 1..=6 {
                add(format!("{base}{t}"));
            }
        }

        if self.rules.allow_fuzzy_tones {
            if let Some(t) = syl.tone {
                for other in self.tone_pairs.partners(t) {
                    add(format!("{base}{other}"));
                }
            }
        }

        if self.rules.allow_ng_zero_confusion {
            if syl.initial == "ng" {
                add(format!("{}{tone}", syl.final_));
            } else if base != "ng" {
                add(format!("ng{base}{tone}"));
            }
        }

        if self.rules.allow_n_l_confusion {
            match syl.initial {
                "n" => add(format!("l{}{tone}", syl.final_)),
                "l" => add(format!("n{}{tone}", syl.final_)),
                _ => {}
            }
        }

        Ok(out)
    }
}

/// Convenience wrapper for one-off expansion.
pub fn expand(code: &str, rules: &MatchingRule) -> Result<Vec<String>> {
    VariantGenerator::new(rules).expand(code)
}

fn nonempty_stem<'a>(base: &'a str, coda: &str) -> Option<&'a str> {
    base.strip_suffix(coda).filter(|s| !s.is_empty())
}
