//! Semantic Judge Port - External Reasoning Service Interface
//!
//! Answers a single yes/no question about a payload excerpt. Any error
//! here means "could not judge", never "judged as bad".

use async_trait::async_trait;

/// Trait for semantic payload judges (LLM chat services).
#[async_trait]
pub trait SemanticJudge: Send + Sync + 'static {
  /// Ask the question and return the raw reply text.
  async fn ask(&self, prompt: &str) -> anyhow::Result<String>;

  /// Judge name for logs and metrics.
  fn name(&self) -> &str;
}
