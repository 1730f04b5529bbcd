//! Jyutping syllable parsing.
//!
//! A code is lowercase letters with an optional trailing tone digit 1-6
//! (`^[a-z]+[1-6]?$`). Parsing splits it into initial, final and tone using
//! the static initial table below; the longest matching initial wins, so
//! "ngo5" has initial "ng" and "nei5" has initial "n".

use jyutping_core::{Error, Result};
use once_cell::sync::Lazy;
use phf::phf_set;
use regex::Regex;

/// Jyutping initials (onsets).
pub static INITIALS: phf::Set<&'static str> = phf_set! {
    "b", "p", "m", "f", "d", "t", "n", "l", "g", "k",
    "ng", "h", "gw", "kw", "w", "z", "c", "s", "j",
};

static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]+[1-6]?$").expect("code pattern compiles"));

/// True if `code` is a well-formed single-syllable code.
pub fn is_valid_code(code: &str) -> bool {
    CODE_RE.is_match(code)
}

/// Split a trailing tone digit 1-6 off `code`.
pub fn split_tone(code: &str) -> (&str, Option<u8>) {
    match code.as_bytes().last() {
        Some(&b @ b'1'..=b'6') => (&code[..code.len() - 1], Some(b - b'0')),
        _ => (code, None),
    }
}

/// Remove trailing tone digits (any 0-9, matching what stored codes may carry).
pub fn strip_tone(code: &str) -> &str {
    code.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// A parsed syllable. `initial` is empty for vowel-initial syllables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Syllable<'a> {
    pub initial: &'a str,
    pub final_: &'a str,
    pub tone: Option<u8>,
}

impl<'a> Syllable<'a> {
    /// Parse a validated code. Rejects anything outside `^[a-z]+[1-6]?$`.
    pub fn parse(code: &'a str) -> Result<Self> {
        if !is_valid_code(code) {
            return Err(Error::InvalidCode(code.to_string()));
        }
        let (base, tone) = split_tone(code);
        let initial = longest_initial(base);
        Ok(Self {
            initial,
            final_: &base[initial.len()..],
            tone,
        })
    }

    /// Initial plus final, without the tone.
    pub fn base(&self) -> String {
        format!("{}{}", self.initial, self.final_)
    }

    /// Leading consonant cluster, or the first letter for vowel-initial syllables.
    pub fn onset_key(&self) -> &'a str {
        if !self.initial.is_empty() {
            self.initial
        } else {
            let f = self.final_;
            &f[..f.len().min(1)]
        }
    }

    pub fn tone_suffix(&self) -> String {
        self.tone.map(|t| t.to_string()).unwrap_or_default()
    }
}

fn longest_initial(base: &str) -> &str {
    // syllabic nasals
    if base == "m" || base == "ng" {
        return "";
    }
    for len in [2, 1] {
        if base.len() > len && INITIALS.contains(&base[..len]) {
            return &base[..len];
        }
    }
    ""
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_initial_final_tone() {
        let s = Syllable::parse("ngo5").unwrap();
        assert_eq!((s.initial, s.final_, s.tone), ("ng", "o", Some(5)));

        let s = Syllable::parse("nei").unwrap();
        assert_eq!((s.initial, s.final_, s.tone), ("n", "ei", None));

        let s = Syllable::parse("gwong2").unwrap();
        assert_eq!(s.initial, "gw");
    }

    #[test]
    fn vowel_initial_and_syllabic_nasals() {
        let s = Syllable::parse("aa3").unwrap();
        assert_eq!(s.initial, "");
        assert_eq!(s.onset_key(), "a");

        let s = Syllable::parse("ng5").unwrap();
        assert_eq!((s.initial, s.final_), ("", "ng"));
        let s = Syllable::parse("m4").unwrap();
        assert_eq!((s.initial, s.final_), ("", "m"));
    }

    #[test]
    fn rejects_malformed_codes() {
        for bad in ["", "nei7", "Nei5", "nei55", "nei 5", "5"] {
            assert!(Syllable::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn tone_helpers() {
        assert_eq!(split_tone("sin1"), ("sin", Some(1)));
        assert_eq!(split_tone("sin"), ("sin", None));
        assert_eq!(strip_tone("nei5"), "nei");
    }
}
