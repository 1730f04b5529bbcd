//! Matching-rule model and rule stores.
//!
//! Responsibilities implemented here:
//! - `MatchingRule`: per-(user, profile) matching and phonological configuration.
//! - `TonePairs`: confusable tone pairs, parsed once from the stored `"2,5|3,6"` form.
//! - `ExceptionRule` catalog entries and per-scope overrides.
//! - `RuleStore`: the read-only seam the resolver consumes, with an in-memory
//!   backend (tests, seeding) and a persistent `redb` backend.
//!
//! Storage holds at most one rule row per (user, profile) pair; choosing
//! between a profile row and a user row is the resolver's job, not the store's.
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::warn;

use crate::error::{Error, Result};

/// Unordered pairs of tone digits (1-6) that a learner may confuse.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TonePairs(Vec<(u8, u8)>);

impl TonePairs {
    /// 2↔5 and 3↔6: the rising and level tone confusions.
    pub const DEFAULT: &'static [(u8, u8)] = &[(2, 5), (3, 6)];

    pub fn new(pairs: Vec<(u8, u8)>) -> Result<Self> {
        for &(a, b) in &pairs {
            if !(1..=6).contains(&a) || !(1..=6).contains(&b) {
                return Err(Error::InvalidRule(format!("tone pair {a},{b} outside 1-6")));
            }
        }
        Ok(Self(pairs))
    }

    pub fn default_pairs() -> Self {
        Self(Self::DEFAULT.to_vec())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pairs(&self) -> &[(u8, u8)] {
        &self.0
    }

    /// Tones confusable with `tone`, in configured order, without duplicates.
    pub fn partners(&self, tone: u8) -> Vec<u8> {
        let mut out = Vec::new();
        for &(a, b) in &self.0 {
            let other = if a == tone {
                b
            } else if b == tone {
                a
            } else {
                continue;
            };
            if other != tone && !out.contains(&other) {
                out.push(other);
            }
        }
        out
    }
}

impl FromStr for TonePairs {
    type Err = Error;

    /// Parse `"2,5|3,6"`. Whitespace around digits is ignored; an empty
    /// string yields no pairs.
    fn from_str(s: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        for chunk in s.split('|').map(str::trim).filter(|c| !c.is_empty()) {
            let tones: Vec<&str> = chunk.split(',').map(str::trim).collect();
            let [a, b] = tones.as_slice() else {
                return Err(Error::InvalidRule(format!("malformed tone pair {chunk:?}")));
            };
            let parse = |t: &str| {
                t.parse::<u8>()
                    .map_err(|_| Error::InvalidRule(format!("bad tone digit {t:?}")))
            };
            pairs.push((parse(a)?, parse(b)?));
        }
        Self::new(pairs)
    }
}

impl TryFrom<String> for TonePairs {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for TonePairs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(a, b)| format!("{a},{b}")).collect();
        f.write_str(&parts.join("|"))
    }
}

impl From<TonePairs> for String {
    fn from(p: TonePairs) -> Self {
        p.to_string()
    }
}

/// Effective matching configuration for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingRule {
    pub enabled: bool,
    /// Entries must be strictly more frequent than this to match.
    pub frequency_threshold: u64,
    pub allow_exact_match: bool,
    pub allow_substring_match: bool,
    pub allow_single_char_match: bool,
    pub require_ai_correction: bool,
    /// 0.0-1.0
    pub ai_confidence_threshold: f32,

    // Phonological adaptation
    pub merge_n_ng_finals: bool,
    pub allow_coda_simplification: bool,
    pub ignore_tones: bool,
    pub allow_fuzzy_tones: bool,
    /// `None` (or empty) means the default 2↔5, 3↔6 pairs.
    pub fuzzy_tone_pairs: Option<TonePairs>,
    pub allow_ng_zero_confusion: bool,
    pub allow_n_l_confusion: bool,
}

impl MatchingRule {
    /// Configuration used whenever no enabled row applies.
    pub const DEFAULT: MatchingRule = MatchingRule {
        enabled: false,
        frequency_threshold: 50,
        allow_exact_match: true,
        allow_substring_match: true,
        allow_single_char_match: true,
        require_ai_correction: false,
        ai_confidence_threshold: 0.5,
        merge_n_ng_finals: false,
        allow_coda_simplification: false,
        ignore_tones: false,
        allow_fuzzy_tones: false,
        fuzzy_tone_pairs: None,
        allow_ng_zero_confusion: false,
        allow_n_l_confusion: false,
    };

    /// Names of the phonological toggles that are switched on.
    pub fn enabled_adaptations(&self) -> Vec<&'static str> {
        [
            ("merge_n_ng_finals", self.merge_n_ng_finals),
            ("allow_coda_simplification", self.allow_coda_simplification),
            ("ignore_tones", self.ignore_tones),
            ("allow_fuzzy_tones", self.allow_fuzzy_tones),
            ("allow_ng_zero_confusion", self.allow_ng_zero_confusion),
            ("allow_n_l_confusion", self.allow_n_l_confusion),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }
}

impl Default for MatchingRule {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One entry of the global exception-rule catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRule {
    pub id: u32,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub default_enabled: bool,
    #[serde(default)]
    pub is_system_rule: bool,
}

/// A per-scope on/off override for a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionOverride {
    pub rule_id: u32,
    pub enabled: bool,
}

/// A catalog entry with its effective state for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveExceptionRule {
    #[serde(flatten)]
    pub rule: ExceptionRule,
    pub enabled: bool,
}

/// Rule storage key. `profile_id: None` is the user-wide row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleScope {
    pub user_id: u64,
    pub profile_id: Option<u64>,
}

impl RuleScope {
    pub fn new(user_id: u64, profile_id: Option<u64>) -> Self {
        Self { user_id, profile_id }
    }

    fn key(&self) -> String {
        match self.profile_id {
            Some(p) => format!("{}:{}", self.user_id, p),
            None => format!("{}:*", self.user_id),
        }
    }
}

/// Read-only rule collaborator.
pub trait RuleStore: Send + Sync {
    /// The row stored for exactly this scope, if any.
    fn get_rule(&self, scope: RuleScope) -> Result<Option<MatchingRule>>;

    fn exception_catalog(&self) -> Result<Vec<ExceptionRule>>;

    fn exception_overrides(&self, scope: RuleScope) -> Result<Vec<ExceptionOverride>>;
}

/// Bulk rule data, as imported from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSeed {
    pub rules: Vec<ScopedRule>,
    pub exceptions: Vec<ExceptionRule>,
    pub overrides: Vec<ScopedOverride>,
}

/// An imported rule row. Rows are enabled unless they say `"enabled": false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ScopedRuleRow")]
pub struct ScopedRule {
    pub user_id: u64,
    #[serde(default)]
    pub profile_id: Option<u64>,
    #[serde(flatten)]
    pub rule: MatchingRule,
}

#[derive(Deserialize)]
struct ScopedRuleRow {
    user_id: u64,
    #[serde(default)]
    profile_id: Option<u64>,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    #[serde(flatten)]
    rule: MatchingRule,
}

fn enabled_by_default() -> bool {
    true
}

impl From<ScopedRuleRow> for ScopedRule {
    fn from(row: ScopedRuleRow) -> Self {
        Self {
            user_id: row.user_id,
            profile_id: row.profile_id,
            rule: MatchingRule {
                enabled: row.enabled,
                ..row.rule
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopedOverride {
    pub user_id: u64,
    #[serde(default)]
    pub profile_id: Option<u64>,
    #[serde(flatten)]
    pub value: ExceptionOverride,
}

impl RuleSeed {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::load("rule seed", e))
    }
}

#[derive(Debug, Default)]
struct RuleTables {
    rules: AHashMap<RuleScope, MatchingRule>,
    catalog: Vec<ExceptionRule>,
    overrides: AHashMap<RuleScope, Vec<ExceptionOverride>>,
}

/// Thread-safe in-memory rule store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRuleStore {
    inner: Arc<RwLock<RuleTables>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: RuleSeed) -> Self {
        let store = Self::new();
        store.apply(seed);
        store
    }

    pub fn apply(&self, seed: RuleSeed) {
        for r in seed.rules {
            self.put_rule(RuleScope::new(r.user_id, r.profile_id), r.rule);
        }
        for e in seed.exceptions {
            self.put_exception(e);
        }
        for o in seed.overrides {
            self.put_override(RuleScope::new(o.user_id, o.profile_id), o.value);
        }
    }

    pub fn put_rule(&self, scope: RuleScope, rule: MatchingRule) {
        if let Ok(mut t) = self.inner.write() {
            t.rules.insert(scope, rule);
        }
    }

    pub fn put_exception(&self, rule: ExceptionRule) {
        if let Ok(mut t) = self.inner.write() {
            t.catalog.retain(|r| r.id != rule.id);
            t.catalog.push(rule);
        }
    }

    pub fn put_override(&self, scope: RuleScope, value: ExceptionOverride) {
        if let Ok(mut t) = self.inner.write() {
            let list = t.overrides.entry(scope).or_default();
            list.retain(|o| o.rule_id != value.rule_id);
            list.push(value);
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, RuleTables>> {
        self.inner
            .read()
            .map_err(|_| Error::store("rule store", "lock poisoned"))
    }
}

impl RuleStore for InMemoryRuleStore {
    fn get_rule(&self, scope: RuleScope) -> Result<Option<MatchingRule>> {
        Ok(self.read()?.rules.get(&scope).cloned())
    }

    fn exception_catalog(&self) -> Result<Vec<ExceptionRule>> {
        Ok(self.read()?.catalog.clone())
    }

    fn exception_overrides(&self, scope: RuleScope) -> Result<Vec<ExceptionOverride>> {
        Ok(self.read()?.overrides.get(&scope).cloned().unwrap_or_default())
    }
}

/// Redb-backed rule store.
///
/// Rule rows and catalog entries are stored as bincode blobs; overrides as
/// a `u8` flag keyed by `"{user}:{profile|*}:{rule_id}"`.
pub struct RedbRuleStore {
    db: redb::Database,
}

fn unavailable(e: impl fmt::Display) -> Error {
    Error::store("rule store", e)
}

impl RedbRuleStore {
    const RULES: redb::TableDefinition<'static, &'static str, &'static [u8]> =
        redb::TableDefinition::new("matching_rules");
    const CATALOG: redb::TableDefinition<'static, u32, &'static [u8]> =
        redb::TableDefinition::new("exception_rules");
    const OVERRIDES: redb::TableDefinition<'static, &'static str, u8> =
        redb::TableDefinition::new("exception_overrides");

    /// Create or open a rule database at `path`.
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let db = redb::Database::create(path.as_ref()).map_err(unavailable)?;

        // Create the tables up front so read transactions never miss them.
        let txn = db.begin_write().map_err(unavailable)?;
        {
            txn.open_table(Self::RULES).map_err(unavailable)?;
            txn.open_table(Self::CATALOG).map_err(unavailable)?;
            txn.open_table(Self::OVERRIDES).map_err(unavailable)?;
        }
        txn.commit().map_err(unavailable)?;

        Ok(Self { db })
    }

    pub fn put_rule(&self, scope: RuleScope, rule: &MatchingRule) -> Result<()> {
        let blob = bincode::serialize(rule).map_err(unavailable)?;
        let txn = self.db.begin_write().map_err(unavailable)?;
        {
            let mut table = txn.open_table(Self::RULES).map_err(unavailable)?;
            table
                .insert(scope.key().as_str(), blob.as_slice())
                .map_err(unavailable)?;
        }
        txn.commit().map_err(unavailable)
    }

    pub fn put_exception(&self, rule: &ExceptionRule) -> Result<()> {
        let blob = bincode::serialize(rule).map_err(unavailable)?;
        let txn = self.db.begin_write().map_err(unavailable)?;
        {
            let mut table = txn.open_table(Self::CATALOG).map_err(unavailable)?;
            table.insert(rule.id, blob.as_slice()).map_err(unavailable)?;
        }
        txn.commit().map_err(unavailable)
    }

    pub fn put_override(&self, scope: RuleScope, value: ExceptionOverride) -> Result<()> {
        let key = format!("{}:{}", scope.key(), value.rule_id);
        let txn = self.db.begin_write().map_err(unavailable)?;
        {
            let mut table = txn.open_table(Self::OVERRIDES).map_err(unavailable)?;
            table
                .insert(key.as_str(), u8::from(value.enabled))
                .map_err(unavailable)?;
        }
        txn.commit().map_err(unavailable)
    }

    /// Write every row of `seed`. Returns the number of rows written.
    pub fn import(&self, seed: &RuleSeed) -> Result<usize> {
        for r in &seed.rules {
            if !r.rule.enabled {
                warn!(user_id = r.user_id, profile_id = ?r.profile_id, "importing a disabled matching rule");
            }
            self.put_rule(RuleScope::new(r.user_id, r.profile_id), &r.rule)?;
        }
        for e in &seed.exceptions {
            self.put_exception(e)?;
        }
        for o in &seed.overrides {
            self.put_override(RuleScope::new(o.user_id, o.profile_id), o.value)?;
        }
        Ok(seed.rules.len() + seed.exceptions.len() + seed.overrides.len())
    }
}

impl RuleStore for RedbRuleStore {
    fn get_rule(&self, scope: RuleScope) -> Result<Option<MatchingRule>> {
        use redb::ReadableTable;
        let txn = self.db.begin_read().map_err(unavailable)?;
        let table = txn.open_table(Self::RULES).map_err(unavailable)?;
        match table.get(scope.key().as_str()).map_err(unavailable)? {
            Some(blob) => bincode::deserialize(blob.value())
                .map(Some)
                .map_err(|e| Error::InvalidRule(e.to_string())),
            None => Ok(None),
        }
    }

    fn exception_catalog(&self) -> Result<Vec<ExceptionRule>> {
        use redb::ReadableTable;
        let txn = self.db.begin_read().map_err(unavailable)?;
        let table = txn.open_table(Self::CATALOG).map_err(unavailable)?;
        let mut out = Vec::new();
        for item in table.iter().map_err(unavailable)? {
            let (_, blob) = item.map_err(unavailable)?;
            let rule = bincode::deserialize(blob.value())
                .map_err(|e| Error::InvalidRule(e.to_string()))?;
            out.push(rule);
        }
        Ok(out)
    }

    fn exception_overrides(&self, scope: RuleScope) -> Result<Vec<ExceptionOverride>> {
        use redb::ReadableTable;
        let prefix = format!("{}:", scope.key());
        let txn = self.db.begin_read().map_err(unavailable)?;
        let table = txn.open_table(Self::OVERRIDES).map_err(unavailable)?;
        let mut out = Vec::new();
        for item in table.iter().map_err(unavailable)? {
            let (k, v) = item.map_err(unavailable)?;
            let Some(id) = k.value().strip_prefix(&prefix) else {
                continue;
            };
            if let Ok(rule_id) = id.parse::<u32>() {
                out.push(ExceptionOverride {
                    rule_id,
                    enabled: v.value() != 0,
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rule_values() {
        let r = MatchingRule::default();
        assert_eq!(r.frequency_threshold, 50);
        assert!(r.allow_exact_match && r.allow_substring_match && r.allow_single_char_match);
        assert!(r.enabled_adaptations().is_empty());
        assert!(!r.enabled);
    }

    #[test]
    fn tone_pairs_parse_and_render() {
        let p: TonePairs = "2,5 | 3, 6".parse().unwrap();
        assert_eq!(p.pairs(), &[(2, 5), (3, 6)]);
        assert_eq!(p.to_string(), "2,5|3,6");
        assert_eq!(p.partners(5), vec![2]);
        assert_eq!(p.partners(1), Vec::<u8>::new());
        assert!("".parse::<TonePairs>().unwrap().is_empty());
    }

    #[test]
    fn tone_pairs_reject_bad_input() {
        assert!("2,7".parse::<TonePairs>().is_err());
        assert!("2,5,6".parse::<TonePairs>().is_err());
        assert!("x,1".parse::<TonePairs>().is_err());
    }

    #[test]
    fn rule_json_uses_compact_tone_pairs() {
        let json = r#"{"allow_fuzzy_tones": true, "fuzzy_tone_pairs": "1,4"}"#;
        let r: MatchingRule = serde_json::from_str(json).unwrap();
        assert!(r.allow_fuzzy_tones);
        assert_eq!(r.frequency_threshold, 50);
        assert_eq!(r.fuzzy_tone_pairs.unwrap().partners(4), vec![1]);

        let bad = r#"{"fuzzy_tone_pairs": "1,9"}"#;
        assert!(serde_json::from_str::<MatchingRule>(bad).is_err());
    }

    #[test]
    fn seeded_rows_are_enabled_unless_switched_off() {
        let seed = RuleSeed::from_json_str(
            r#"{"rules": [
                {"user_id": 1, "frequency_threshold": 0, "allow_n_l_confusion": true},
                {"user_id": 2, "profile_id": 5, "enabled": false}
            ]}"#,
        )
        .unwrap();
        let on = &seed.rules[0];
        assert!(on.rule.enabled);
        assert_eq!(on.rule.frequency_threshold, 0);
        assert!(on.rule.allow_n_l_confusion);
        let off = &seed.rules[1];
        assert_eq!(off.profile_id, Some(5));
        assert!(!off.rule.enabled);
        assert_eq!(off.rule.frequency_threshold, 50);

        let store = InMemoryRuleStore::from_seed(seed);
        assert!(store.get_rule(RuleScope::new(1, None)).unwrap().unwrap().enabled);
    }

    #[test]
    fn in_memory_store_keys_by_scope() {
        let store = InMemoryRuleStore::new();
        let rule = MatchingRule {
            enabled: true,
            ignore_tones: true,
            ..MatchingRule::default()
        };
        store.put_rule(RuleScope::new(7, None), rule.clone());
        assert_eq!(store.get_rule(RuleScope::new(7, None)).unwrap(), Some(rule));
        assert_eq!(store.get_rule(RuleScope::new(7, Some(1))).unwrap(), None);
    }

    #[test]
    fn redb_store_roundtrip() {
        let tmp = std::env::temp_dir().join(format!("jyutping_rules_{}.redb", std::process::id()));
        let _ = std::fs::remove_file(&tmp);
        let store = RedbRuleStore::new(&tmp).unwrap();

        let rule = MatchingRule {
            enabled: true,
            allow_fuzzy_tones: true,
            fuzzy_tone_pairs: Some("1,4".parse().unwrap()),
            ..MatchingRule::default()
        };
        store.put_rule(RuleScope::new(3, Some(9)), &rule).unwrap();
        store
            .put_exception(&ExceptionRule {
                id: 1,
                key: "gw_to_g".into(),
                name: "Labialised initials".into(),
                description: String::new(),
                category: "initial".into(),
                default_enabled: false,
                is_system_rule: true,
            })
            .unwrap();
        store
            .put_override(RuleScope::new(3, Some(9)), ExceptionOverride { rule_id: 1, enabled: true })
            .unwrap();

        assert_eq!(store.get_rule(RuleScope::new(3, Some(9))).unwrap(), Some(rule));
        assert_eq!(store.get_rule(RuleScope::new(3, None)).unwrap(), None);
        assert_eq!(store.exception_catalog().unwrap().len(), 1);
        let o = store.exception_overrides(RuleScope::new(3, Some(9))).unwrap();
        assert_eq!(o, vec![ExceptionOverride { rule_id: 1, enabled: true }]);
        assert!(store.exception_overrides(RuleScope::new(3, None)).unwrap().is_empty());

        drop(store);
        let _ = std::fs::remove_file(tmp);
    }
}
