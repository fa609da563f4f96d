//! Ingest Error Taxonomy
//!
//! Every failure a poll cycle can produce. The feed loop catches all of
//! them at its boundary, logs them with feed/source/cycle context and
//! moves on to the next heartbeat, except for the fatal set which
//! deactivates the feed.

use thiserror::Error;

/// Failure of one stage of a poll cycle.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Transport failure, non-200 status, or an unreadable body.
    #[error("provider {source_id} unavailable: {reason}")]
    ProviderUnavailable { source_id: String, reason: String },

    /// More entries lacked required sub-objects than the slack tolerates.
    #[error("provider {source_id} returned {missing} incomplete entries (tolerated: {tolerated})")]
    InsufficientData {
        source_id: String,
        missing: usize,
        tolerated: usize,
    },

    /// The semantic judge explicitly answered that the payload is not a success.
    #[error("payload from {source_id} rejected by semantic check: {reply}")]
    SemanticRejection { source_id: String, reply: String },

    /// An entry does not match the provider's record shape.
    #[error("payload from {source_id} failed schema validation{}: {reason}", at_index(.index))]
    SchemaValidation {
        source_id: String,
        index: Option<usize>,
        reason: String,
    },

    /// A required field was absent at extraction time.
    #[error("payload from {source_id} is missing `{field}`{}", at_index(.index))]
    MissingField {
        source_id: String,
        index: Option<usize>,
        field: String,
    },

    /// The durable write did not complete.
    #[error("failed to persist records for {source_id}: {reason}")]
    PersistFailure { source_id: String, reason: String },

    /// A credential the adapter cannot work without is not configured.
    #[error("provider {source_id} has no credential (set {env_var})")]
    MissingCredential { source_id: String, env_var: String },
}

impl IngestError {
    /// Short label used for metrics and structured logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::SemanticRejection { .. } => "semantic_rejection",
            Self::SchemaValidation { .. } => "schema_validation",
            Self::MissingField { .. } => "missing_field",
            Self::PersistFailure { .. } => "persist_failure",
            Self::MissingCredential { .. } => "missing_credential",
        }
    }

    /// Errors that cannot heal by waiting for the next heartbeat.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingCredential { .. })
    }

    pub(crate) fn persist(source_id: &str, reason: impl std::fmt::Display) -> Self {
        Self::PersistFailure {
            source_id: source_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unavailable(source_id: &str, reason: impl std::fmt::Display) -> Self {
        Self::ProviderUnavailable {
            source_id: source_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn at_index(index: &Option<usize>) -> String {
    index.map(|i| format!(" at entry {i}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_credential_is_fatal() {
        let fatal = IngestError::MissingCredential {
            source_id: "coinmarketcap".into(),
            env_var: "COINMARKETCAP_API_KEY".into(),
        };
        let transient = IngestError::unavailable("coingecko", "status 503");
        assert!(fatal.is_fatal());
        assert!(!transient.is_fatal());
    }

    #[test]
    fn test_display_includes_entry_index() {
        let err = IngestError::MissingField {
            source_id: "cryptocompare".into(),
            index: Some(3),
            field: "RAW.USD.MKTCAP".into(),
        };
        assert_eq!(
            err.to_string(),
            "payload from cryptocompare is missing `RAW.USD.MKTCAP` at entry 3"
        );
        assert_eq!(err.kind(), "missing_field");
    }
}
