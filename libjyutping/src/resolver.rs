//! Resolve the effective matching configuration for a request.
use std::sync::Arc;

use jyutping_core::{EffectiveExceptionRule, MatchingRule, Result, RuleScope, RuleStore};
use tracing::debug;

/// Chooses one `MatchingRule` per (user, profile).
///
/// Lookup order: the enabled profile-scoped row, then the enabled user-wide
/// row, then `MatchingRule::DEFAULT`. An anonymous request always gets the
/// default.
#[derive(Clone)]
pub struct RuleResolver {
    store: Arc<dyn RuleStore>,
}

impl RuleResolver {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    pub fn resolve(&self, user_id: Option<u64>, profile_id: Option<u64>) -> Result<MatchingRule> {
        let Some(user_id) = user_id else {
            return Ok(MatchingRule::DEFAULT);
        };

        let mut scopes = Vec::with_capacity(2);
        if profile_id.is_some() {
            scopes.push(RuleScope::new(user_id, profile_id));
        }
        scopes.push(RuleScope::new(user_id, None));

        for scope in scopes {
            match self.store.get_rule(scope)? {
                Some(rule) if rule.enabled => {
                    debug!(user_id, profile_id = ?scope.profile_id, "using stored matching rule");
                    return Ok(rule);
                }
                Some(_) => debug!(user_id, profile_id = ?scope.profile_id, "matching rule disabled"),
                None => {}
            }
        }
        Ok(MatchingRule::DEFAULT)
    }

    /// The exception-rule catalog with per-scope overrides applied,
    /// sorted by display name.
    pub fn resolve_exceptions(
        &self,
        user_id: Option<u64>,
        profile_id: Option<u64>,
    ) -> Result<Vec<EffectiveExceptionRule>> {
        let overrides = match user_id {
            Some(u) => self.store.exception_overrides(RuleScope::new(u, profile_id))?,
            None => Vec::new(),
        };

        let mut rules: Vec<EffectiveExceptionRule> = self
            .store
            .exception_catalog()?
            .into_iter()
            .map(|rule| {
                let enabled = overrides
                    .iter()
                    .find(|o| o.rule_id == rule.id)
                    .map_or(rule.default_enabled, |o| o.enabled);
                EffectiveExceptionRule { rule, enabled }
            })
            .collect();
        rules.sort_by(|a, b| a.rule.name.cmp(&b.rule.name));
        Ok(rules)
    }
}
