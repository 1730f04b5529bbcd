//! Error taxonomy for the Jyutping engine.
//!
//! Empty lookups are never errors: "not found" is expressed through
//! `MatchType::None` or an empty candidate list. Errors are reserved for
//! rejected requests and unreachable collaborators.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A required request field is missing or malformed. Raised before any lookup.
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Input is not a romanized syllable of the form `^[a-z]+[1-6]?$`.
    #[error("invalid jyutping code: {0:?}")]
    InvalidCode(String),

    /// A stored matching rule could not be interpreted (e.g. bad tone pairs).
    #[error("invalid matching rule: {0}")]
    InvalidRule(String),

    /// The dictionary or rule store could not be reached or read.
    #[error("{store} unavailable: {message}")]
    StoreUnavailable { store: &'static str, message: String },

    /// A dictionary, rule or config artifact failed to load.
    #[error("failed to load {what}: {message}")]
    Load { what: String, message: String },
}

impl Error {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn store(store: &'static str, err: impl std::fmt::Display) -> Self {
        Error::StoreUnavailable {
            store,
            message: err.to_string(),
        }
    }

    pub fn load(what: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::Load {
            what: what.into(),
            message: err.to_string(),
        }
    }

    /// Stable machine-readable category used in response envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation { .. } | Error::InvalidCode(_) => "validation",
            Error::StoreUnavailable { .. } => "store_unavailable",
            Error::InvalidRule(_) | Error::Load { .. } => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_group_by_taxonomy() {
        assert_eq!(Error::validation("code", "required").kind(), "validation");
        assert_eq!(Error::InvalidCode("nei9".into()).kind(), "validation");
        assert_eq!(Error::store("rule store", "locked").kind(), "store_unavailable");
        assert_eq!(Error::InvalidRule("tone 7".into()).kind(), "internal");
    }

    #[test]
    fn messages_name_the_field() {
        let e = Error::validation("code", "jyutping code is required");
        assert_eq!(e.to_string(), "invalid code: jyutping code is required");
    }
}
