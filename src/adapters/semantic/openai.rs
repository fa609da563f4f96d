//! OpenAI-compatible Chat Completions Judge
//!
//! Sends the prompt as a single user message and returns the first
//! choice's text. The API key is read from the environment on each call
//! so a key added after startup is picked up without a restart.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SemanticConfig;
use crate::ports::semantic::SemanticJudge;

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

/// Semantic judge backed by a chat-completions endpoint.
pub struct OpenAiJudge {
    http: Client,
    endpoint: String,
    model: String,
    api_key_env: String,
}

impl OpenAiJudge {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key_env: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("market-cap-feeds/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout.min(Duration::from_secs(4)))
            .timeout(timeout)
            .build()
            .context("Failed to build judge HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key_env: api_key_env.into(),
        })
    }

    pub fn from_config(config: &SemanticConfig) -> Result<Self> {
        Self::new(
            &config.endpoint,
            &config.model,
            &config.api_key_env,
            config.timeout(),
        )
    }
}

#[async_trait]
impl SemanticJudge for OpenAiJudge {
    async fn ask(&self, prompt: &str) -> Result<String> {
        let api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .with_context(|| format!("{} is not set", self.api_key_env))?;

        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
            max_tokens: 5,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&req)
            .send()
            .await
            .context("Judge request failed")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("Judge returned status {status}");
        }

        let body: Resp = resp.json().await.context("Judge response is not valid JSON")?;
        let reply = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .context("Judge response has no content")?;

        debug!(judge = %self.model, reply = %reply, "Judge replied");
        Ok(reply)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
