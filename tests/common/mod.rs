//! Shared fixtures for integration tests: a scripted source adapter and
//! an in-memory store.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use market_cap_feeds::adapters::metrics::IngestMetrics;
use market_cap_feeds::adapters::sources::SourceMap;
use market_cap_feeds::domain::extract::{check_entries, PayloadLayout};
use market_cap_feeds::domain::{FeedDescriptor, IngestError, LogEntry, ProviderPayload};
use market_cap_feeds::ports::{MarketCapStore, SourceAdapter};
use market_cap_feeds::usecases::{FeedRegistry, IngestPipeline, PayloadValidator};

/// Minimal record shape: the three fields at the top level of an entry.
#[derive(Debug, serde::Deserialize)]
pub struct FlatRecordShape {
    pub name: String,
    pub market_cap: f64,
    pub last_updated: String,
}

/// Layout for payloads that are a bare array of flat records.
pub static FLAT_LAYOUT: PayloadLayout = PayloadLayout {
    entries: "",
    name: &["name"],
    market_cap: &["market_cap"],
    last_updated: &["last_updated"],
};

/// One scripted fetch outcome.
pub type Step = Box<dyn Fn(&str) -> Result<ProviderPayload, IngestError> + Send + Sync>;

/// Source returning scripted outcomes in order, repeating the last one.
pub struct ScriptedSource {
    source_id: String,
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    pub fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(source_id: &str, steps: Vec<Step>) -> Self {
        Self {
            source_id: source_id.to_string(),
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Always return the same flat payload.
    pub fn always(source_id: &str, body: Value) -> Self {
        Self::new(source_id, vec![ok(body)])
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

pub fn ok(body: Value) -> Step {
    Box::new(move |source_id| Ok(ProviderPayload::new(source_id, body.clone())))
}

pub fn unavailable() -> Step {
    Box::new(|source_id| {
        Err(IngestError::ProviderUnavailable {
            source_id: source_id.to_string(),
            reason: "status 503".to_string(),
        })
    })
}

pub fn missing_credential() -> Step {
    Box::new(|source_id| {
        Err(IngestError::MissingCredential {
            source_id: source_id.to_string(),
            env_var: "FIXTURE_API_KEY".to_string(),
        })
    })
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn layout(&self) -> &PayloadLayout {
        &FLAT_LAYOUT
    }

    async fn fetch(&self, _limit: usize) -> Result<ProviderPayload, IngestError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let next = self.steps.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(step) = next {
            *last = Some(step);
        }
        let step = last.as_ref().expect("script has at least one step");
        step(&self.source_id)
    }

    fn validate_schema(&self, payload: &ProviderPayload) -> Result<(), IngestError> {
        check_entries::<FlatRecordShape>(payload, &FLAT_LAYOUT)
    }
}

/// Wraps a scripted source and holds its first fetch for `delay`.
pub struct SlowFirstFetch {
    pub inner: ScriptedSource,
    delay: Duration,
    delayed: AtomicBool,
}

impl SlowFirstFetch {
    pub fn new(inner: ScriptedSource, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            delayed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SourceAdapter for SlowFirstFetch {
    fn source_id(&self) -> &str {
        self.inner.source_id()
    }

    fn layout(&self) -> &PayloadLayout {
        self.inner.layout()
    }

    async fn fetch(&self, limit: usize) -> Result<ProviderPayload, IngestError> {
        if !self.delayed.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.fetch(limit).await
    }

    fn validate_schema(&self, payload: &ProviderPayload) -> Result<(), IngestError> {
        self.inner.validate_schema(payload)
    }
}

/// Store keeping entries in memory; no blocking I/O so paused-clock
/// tests stay deterministic.
#[derive(Default)]
pub struct MemoryStore {
    entries: tokio::sync::Mutex<Vec<LogEntry>>,
}

impl MemoryStore {
    pub async fn all(&self) -> Vec<LogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl MarketCapStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<(), IngestError> {
        Ok(())
    }

    async fn append(&self, entry: &LogEntry) -> Result<(), IngestError> {
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }

    async fn read_latest(&self, source_id: &str) -> Result<Option<LogEntry>, IngestError> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .rev()
            .find(|e| e.source_id == source_id)
            .cloned())
    }

    async fn read_history(&self, source_id: &str, limit: usize) -> Result<Vec<LogEntry>, IngestError> {
        let entries = self.entries.lock().await;
        let matching: Vec<_> = entries.iter().filter(|e| e.source_id == source_id).cloned().collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).collect())
    }

    async fn read_feed_latest(&self, source_id: &str, feed: &str) -> Result<Option<LogEntry>, IngestError> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .rev()
            .find(|e| e.source_id == source_id && e.feed == feed)
            .cloned())
    }

    async fn read_feed_history(
        &self,
        source_id: &str,
        feed: &str,
        limit: usize,
    ) -> Result<Vec<LogEntry>, IngestError> {
        let entries = self.entries.lock().await;
        let matching: Vec<_> = entries
            .iter()
            .filter(|e| e.source_id == source_id && e.feed == feed)
            .cloned()
            .collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).collect())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

/// The literal collision payload: A and A2 share a market cap.
pub fn collision_payload() -> Value {
    json!([
        {"name": "A", "market_cap": 100, "last_updated": "t1"},
        {"name": "B", "market_cap": 200, "last_updated": "t2"},
        {"name": "A2", "market_cap": 100, "last_updated": "t3"},
    ])
}

pub fn descriptor(name: &str, source_id: &str, heartbeat_secs: u64) -> FeedDescriptor {
    FeedDescriptor {
        name: name.to_string(),
        id: 1,
        source_id: source_id.to_string(),
        heartbeat: Duration::from_secs(heartbeat_secs),
        limit: 10,
    }
}

/// Registry with one feed over `source`, schema-only validation.
pub fn registry_with(
    feed: FeedDescriptor,
    source: Arc<dyn SourceAdapter>,
    store: Arc<dyn MarketCapStore>,
) -> FeedRegistry {
    registry_with_feeds(vec![feed], source, store)
}

/// Registry with several feeds sharing one source.
pub fn registry_with_feeds(
    feeds: Vec<FeedDescriptor>,
    source: Arc<dyn SourceAdapter>,
    store: Arc<dyn MarketCapStore>,
) -> FeedRegistry {
    let metrics = Arc::new(IngestMetrics::new().unwrap());
    let pipeline = Arc::new(IngestPipeline::new(
        PayloadValidator::schema_only(),
        store,
        Arc::clone(&metrics),
    ));
    let mut sources = SourceMap::new();
    sources.insert(source.source_id().to_string(), source);
    FeedRegistry::build(feeds, &sources, pipeline, metrics).unwrap()
}
