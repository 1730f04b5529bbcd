//! Query surface: search, suggest, recommend, translate and rule inspection.
//!
//! Each call resolves the caller's matching rule, runs one engine component
//! and returns a serializable response. Wrap results with
//! `Envelope::from_result` for the `{success, data|error}` wire shape.

use std::sync::Arc;

use jyutping_core::{
    DictionaryEntry, DictionaryStore, EffectiveExceptionRule, Error, MatchType, MatchingRule,
    RecommendationCandidate, Result, RuleStore,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::JyutpingConfig;
use crate::predictor::{HttpPredictor, Predictor};
use crate::recommend::{RecommendRequest, RelatedWordRecommender};
use crate::resolver::RuleResolver;
use crate::search::{TieredSearchEngine, Translation};

/// Who is asking. Both ids are optional; anonymous callers get default rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requester {
    pub user_id: Option<u64>,
    pub profile_id: Option<u64>,
}

impl Requester {
    pub fn new(user_id: Option<u64>, profile_id: Option<u64>) -> Self {
        Self { user_id, profile_id }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub code: String,
    pub matches: Vec<DictionaryEntry>,
    pub match_type: MatchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants_used: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub character_matches: Vec<DictionaryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub input: String,
    pub suggestions: Vec<DictionaryEntry>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub hanzi: String,
    pub jyutping: String,
    pub related_words: Vec<RecommendationCandidate>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesResponse {
    pub rule: MatchingRule,
    pub exceptions: Vec<EffectiveExceptionRule>,
}

pub struct Engine {
    resolver: RuleResolver,
    search: TieredSearchEngine,
    recommender: RelatedWordRecommender,
}

impl Engine {
    pub fn new(
        dict: Arc<dyn DictionaryStore>,
        rules: Arc<dyn RuleStore>,
        predictor: Box<dyn Predictor>,
        config: &JyutpingConfig,
    ) -> Self {
        Self {
            resolver: RuleResolver::new(rules),
            search: TieredSearchEngine::new(dict.clone(), config.base.clone()),
            recommender: RelatedWordRecommender::new(dict, predictor, config),
        }
    }

    /// Build an engine whose predictor comes from `config.predictor`.
    pub fn from_config(
        dict: Arc<dyn DictionaryStore>,
        rules: Arc<dyn RuleStore>,
        config: &JyutpingConfig,
    ) -> Self {
        let predictor = HttpPredictor::from_config(&config.predictor);
        Self::new(dict, rules, predictor, config)
    }

    fn rule_for(&self, who: Requester) -> Result<MatchingRule> {
        logged("resolve rules", self.resolver.resolve(who.user_id, who.profile_id))
    }

    pub fn search(&self, code: &str, who: Requester) -> Result<SearchResponse> {
        if code.trim().is_empty() {
            return Err(Error::validation("code", "jyutping code is required"));
        }
        let rules = self.rule_for(who)?;
        let result = logged("search", self.search.search(code, &rules))?;
        Ok(SearchResponse {
            code: code.trim().to_string(),
            matches: result.matches,
            match_type: result.match_type,
            variants_used: Some(result.variants).filter(|v| !v.is_empty()),
            character_matches: result.segments,
        })
    }

    pub fn suggest(&self, input: &str, limit: Option<usize>, who: Requester) -> Result<SuggestResponse> {
        let rules = self.rule_for(who)?;
        let limit = limit.unwrap_or(self.search.config().suggest_limit);
        let suggestions = logged("suggest", self.search.suggest(input, limit, &rules))?;
        Ok(SuggestResponse {
            input: input.trim().to_string(),
            count: suggestions.len(),
            suggestions,
        })
    }

    pub fn recommend(&self, req: RecommendRequest<'_>, who: Requester) -> Result<RecommendResponse> {
        let rules = self.rule_for(who)?;
        let related = logged("recommend", self.recommender.recommend(req, &rules))?;
        Ok(RecommendResponse {
            hanzi: req.hanzi.unwrap_or_default().trim().to_string(),
            jyutping: req.jyutping.unwrap_or_default().trim().to_string(),
            count: related.len(),
            related_words: related,
        })
    }

    pub fn translate(&self, text: &str) -> Result<Translation> {
        logged("translate", self.search.translate(text))
    }

    /// The effective rule and exception catalog for `who`.
    pub fn rules(&self, who: Requester) -> Result<RulesResponse> {
        let rule = self.rule_for(who)?;
        let exceptions = logged(
            "resolve exceptions",
            self.resolver.resolve_exceptions(who.user_id, who.profile_id),
        )?;
        Ok(RulesResponse { rule, exceptions })
    }
}

fn logged<T>(op: &'static str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if !matches!(e, Error::Validation { .. } | Error::InvalidCode(_)) {
            error!(op, error = %e, "request failed");
        }
    }
    result
}
