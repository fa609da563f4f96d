//! Payload Validator - Semantic Check with Schema Fallback
//!
//! Stage one asks the semantic judge whether the payload looks like a
//! successful response. Only when it cannot decide (no judge, network
//! error, timeout) does stage two run the adapter's strict schema check.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::domain::verdict::semantic_prompt;
use crate::domain::{IngestError, ProviderPayload, SemanticVerdict, ValidationStage};
use crate::ports::semantic::SemanticJudge;
use crate::ports::source::SourceAdapter;

/// Two-stage payload validator.
pub struct PayloadValidator {
  /// Semantic judge, absent when the stage is disabled.
  judge: Option<Arc<dyn SemanticJudge>>,
  /// Prompt length cap in characters.
  excerpt_chars: usize,
  /// Upper bound on one judge call.
  judge_timeout: Duration,
}

impl PayloadValidator {
  pub fn new(
    judge: Option<Arc<dyn SemanticJudge>>,
    excerpt_chars: usize,
    judge_timeout: Duration,
  ) -> Self {
    Self {
      judge,
      excerpt_chars,
      judge_timeout,
    }
  }

  /// Validator that always falls through to the schema stage.
  pub fn schema_only() -> Self {
    Self::new(None, 500, Duration::from_secs(15))
  }

  /// Run the semantic stage alone.
  pub async fn semantic(&self, payload: &ProviderPayload) -> SemanticVerdict {
    let Some(judge) = &self.judge else {
      return SemanticVerdict::Indeterminate {
        reason: "no judge configured".to_string(),
      };
    };

    let prompt = semantic_prompt(&payload.body.to_string(), self.excerpt_chars);
    match tokio::time::timeout(self.judge_timeout, judge.ask(&prompt)).await {
      Ok(Ok(reply)) => SemanticVerdict::from_reply(&reply),
      Ok(Err(e)) => SemanticVerdict::Indeterminate {
        reason: format!("{e:#}"),
      },
      Err(_) => SemanticVerdict::Indeterminate {
        reason: format!("judge timed out after {:?}", self.judge_timeout),
      },
    }
  }

  /// Validate a payload, returning the stage that let it through.
  ///
  /// # Errors
  /// `SemanticRejection` when the judge says no, `SchemaValidation`
  /// when the fallback check finds a malformed entry.
  #[instrument(skip_all, fields(source = %payload.source_id))]
  pub async fn validate(
    &self,
    adapter: &dyn SourceAdapter,
    payload: &ProviderPayload,
  ) -> Result<ValidationStage, IngestError> {
    match self.semantic(payload).await {
      SemanticVerdict::Accepted => {
        debug!("Semantic check accepted payload");
        Ok(ValidationStage::Semantic)
      }
      SemanticVerdict::Rejected { reply } => Err(IngestError::SemanticRejection {
        source_id: payload.source_id.clone(),
        reply,
      }),
      SemanticVerdict::Indeterminate { reason } => {
        if self.judge.is_some() {
          warn!(reason = %reason, "Semantic check indeterminate, falling back to schema");
        }
        adapter.validate_schema(payload)?;
        Ok(ValidationStage::Schema)
      }
    }
  }
}

/// Stage a validation error came from, for metrics labels.
pub fn failed_stage(error: &IngestError) -> Option<ValidationStage> {
  match error {
    IngestError::SemanticRejection { .. } => Some(ValidationStage::Semantic),
    IngestError::SchemaValidation { .. } => Some(ValidationStage::Schema),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use anyhow::anyhow;
  use async_trait::async_trait;
  use serde_json::json;

  use crate::domain::extract::fixtures::{FlatRecordShape, FLAT_LAYOUT};
  use crate::domain::extract::{check_entries, PayloadLayout};

  struct FixedJudge(Result<&'static str, &'static str>);

  #[async_trait]
  impl SemanticJudge for FixedJudge {
    async fn ask(&self, _prompt: &str) -> anyhow::Result<String> {
      self.0.map(str::to_string).map_err(|e| anyhow!(e))
    }

    fn name(&self) -> &str {
      "fixed"
    }
  }

  struct SlowJudge;

  #[async_trait]
  impl SemanticJudge for SlowJudge {
    async fn ask(&self, _prompt: &str) -> anyhow::Result<String> {
      tokio::time::sleep(Duration::from_secs(60)).await;
      Ok("yes".to_string())
    }

    fn name(&self) -> &str {
      "slow"
    }
  }

  struct FlatSource;

  #[async_trait]
  impl SourceAdapter for FlatSource {
    fn source_id(&self) -> &str {
      "fixture"
    }

    fn layout(&self) -> &PayloadLayout {
      &FLAT_LAYOUT
    }

    async fn fetch(&self, _limit: usize) -> Result<ProviderPayload, IngestError> {
      unreachable!("validator never fetches")
    }

    fn validate_schema(&self, payload: &ProviderPayload) -> Result<(), IngestError> {
      check_entries::<FlatRecordShape>(payload, &FLAT_LAYOUT)
    }
  }

  fn validator(judge: impl SemanticJudge) -> PayloadValidator {
    PayloadValidator::new(Some(Arc::new(judge)), 500, Duration::from_secs(5))
  }

  fn malformed() -> ProviderPayload {
    ProviderPayload::new("fixture", json!([{"name": "A"}]))
  }

  fn wellformed() -> ProviderPayload {
    ProviderPayload::new(
      "fixture",
      json!([{"name": "A", "market_cap": 100, "last_updated": "t1"}]),
    )
  }

  #[tokio::test]
  async fn test_acceptance_skips_schema_stage() {
    let stage = validator(FixedJudge(Ok("Yes")))
      .validate(&FlatSource, &malformed())
      .await
      .unwrap();
    assert_eq!(stage, ValidationStage::Semantic);
  }

  #[tokio::test]
  async fn test_rejection_never_reaches_schema_stage() {
    let err = validator(FixedJudge(Ok("No")))
      .validate(&FlatSource, &wellformed())
      .await
      .unwrap_err();
    assert!(matches!(err, IngestError::SemanticRejection { ref reply, .. } if reply == "No"));
  }

  #[tokio::test]
  async fn test_judge_error_falls_back_to_schema() {
    let v = validator(FixedJudge(Err("connection refused")));
    assert_eq!(
      v.validate(&FlatSource, &wellformed()).await.unwrap(),
      ValidationStage::Schema
    );
    assert!(matches!(
      v.validate(&FlatSource, &malformed()).await,
      Err(IngestError::SchemaValidation { .. })
    ));
  }

  #[tokio::test(start_paused = true)]
  async fn test_judge_timeout_is_indeterminate() {
    let v = PayloadValidator::new(Some(Arc::new(SlowJudge)), 500, Duration::from_secs(2));
    assert!(matches!(
      v.semantic(&wellformed()).await,
      SemanticVerdict::Indeterminate { .. }
    ));
  }

  #[tokio::test]
  async fn test_absent_judge_is_indeterminate() {
    let v = PayloadValidator::schema_only();
    assert!(matches!(
      v.semantic(&wellformed()).await,
      SemanticVerdict::Indeterminate { .. }
    ));
    assert_eq!(
      v.validate(&FlatSource, &wellformed()).await.unwrap(),
      ValidationStage::Schema
    );
  }
}
