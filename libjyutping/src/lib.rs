//! libjyutping crate root
//!
//! Jyutping-specific matching on top of the shared `jyutping-core` model:
//! syllable parsing, phonological variant expansion, tiered dictionary
//! search and related-word recommendation, composed behind `Engine`.
//!
//! Public API exported here:
//! - `Engine` and its response types from `service`
//! - `RuleResolver` from `resolver`
//! - `VariantGenerator` from `variants`
//! - `TieredSearchEngine` from `search`
//! - `RelatedWordRecommender` from `recommend`
//! - `Predictor`, `HttpPredictor` from `predictor`

pub mod config;
pub mod predictor;
pub mod recommend;
pub mod resolver;
pub mod search;
pub mod service;
pub mod syllable;
pub mod variants;

// Convenience re-exports for common types used by callers.
pub use config::{JyutpingConfig, PredictorConfig, PredictorKind, RecommendPolicy};
pub use predictor::{DisabledPredictor, HttpPredictor, Predictor, PredictorError};
pub use recommend::{RecommendRequest, RelatedWordRecommender};
pub use resolver::RuleResolver;
pub use search::{CharacterReading, SearchResult, TieredSearchEngine, Translation};
pub use service::{
    Engine, RecommendResponse, Requester, RulesResponse, SearchResponse, SuggestResponse,
};
pub use syllable::Syllable;
pub use variants::VariantGenerator;

pub use jyutping_core::{
    Dictionary, DictionaryEntry, DictionaryStore, Envelope, Error, InMemoryRuleStore, MatchType,
    MatchingRule, Provenance, RecommendationCandidate, RedbRuleStore, RuleStore,
};
