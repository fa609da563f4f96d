//! Semantic Judge Adapters
//!
//! `OpenAiJudge` talks to any OpenAI-compatible chat-completions
//! endpoint. With `semantic.enabled = false` no judge is built and every
//! payload is validated by schema alone.

pub mod openai;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::SemanticConfig;
use crate::ports::semantic::SemanticJudge;

pub use openai::OpenAiJudge;

/// Build the configured judge, if any.
pub fn build_judge(config: &SemanticConfig) -> Result<Option<Arc<dyn SemanticJudge>>> {
    if !config.enabled {
        info!("Semantic validation disabled, schema checks only");
        return Ok(None);
    }
    let judge = OpenAiJudge::from_config(config)?;
    info!(endpoint = %config.endpoint, model = %config.model, "Semantic judge configured");
    Ok(Some(Arc::new(judge)))
}
