//! Feed Scheduler - Heartbeat Loop with Inactive/Active Lifecycle
//!
//! Each active feed owns one tokio task running poll cycles back to
//! back with a fixed `heartbeat` sleep in between. A cycle is never
//! interrupted: stop requests are observed only between cycles.
//!
//! Lifecycle:
//! - `start` flips `active` false -> true (CAS) and spawns the loop,
//!   first joining any loop of a previous run still finishing a cycle
//! - `stop` flips `active` true -> false and signals the loop
//! - a fatal cycle error makes the loop deactivate the feed itself,
//!   unless a later `start` has already taken over the feed

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use super::pipeline::IngestPipeline;
use crate::adapters::metrics::IngestMetrics;
use crate::domain::{FeedDescriptor, FeedStatus};
use crate::ports::source::SourceAdapter;

/// Lifecycle state shared between a feed handle and its loop task.
#[derive(Debug, Default)]
struct FeedState {
  /// Whether the feed is Active.
  active: AtomicBool,
  /// Successful cycles since the feed was built. Never reset.
  cycle_count: AtomicU64,
  /// When the current (or last) run was started.
  start_time: std::sync::Mutex<Option<DateTime<Utc>>>,
  /// Number of the current run. Bumped together with the `active`
  /// CAS in `start`, so a finishing loop can tell it has been replaced.
  generation: std::sync::Mutex<u64>,
}

impl FeedState {
  fn start_time(&self) -> Option<DateTime<Utc>> {
    match self.start_time.lock() {
      Ok(guard) => *guard,
      Err(poisoned) => *poisoned.into_inner(),
    }
  }

  fn set_start_time(&self, at: DateTime<Utc>) {
    match self.start_time.lock() {
      Ok(mut guard) => *guard = Some(at),
      Err(poisoned) => *poisoned.into_inner() = Some(at),
    }
  }

  fn generation(&self) -> std::sync::MutexGuard<'_, u64> {
    match self.generation.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  /// Inactive -> Active and open a new run. `None` if already active.
  fn activate(&self) -> Option<u64> {
    let mut generation = self.generation();
    self
      .active
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()?;
    *generation += 1;
    Some(*generation)
  }

  /// Deactivate on behalf of run `run`. No-op if a newer run owns the
  /// feed. Returns whether the flag was cleared.
  fn deactivate_run(&self, run: u64) -> bool {
    let generation = self.generation();
    if *generation != run {
      return false;
    }
    self.active.store(false, Ordering::Release);
    true
  }
}

/// A spawned loop and the channel that stops it.
struct Run {
  stop_tx: watch::Sender<bool>,
  handle: JoinHandle<()>,
}

/// Everything the loop task needs, cloned out of the feed.
struct LoopContext {
  descriptor: FeedDescriptor,
  adapter: Arc<dyn SourceAdapter>,
  pipeline: Arc<IngestPipeline>,
  metrics: Arc<IngestMetrics>,
  state: Arc<FeedState>,
  /// Run number this loop belongs to.
  generation: u64,
}

/// One scheduled feed.
pub struct Feed {
  descriptor: FeedDescriptor,
  adapter: Arc<dyn SourceAdapter>,
  pipeline: Arc<IngestPipeline>,
  metrics: Arc<IngestMetrics>,
  state: Arc<FeedState>,
  /// Current run; serializes start/stop/shutdown.
  run: Mutex<Option<Run>>,
}

impl Feed {
  pub fn new(
    descriptor: FeedDescriptor,
    adapter: Arc<dyn SourceAdapter>,
    pipeline: Arc<IngestPipeline>,
    metrics: Arc<IngestMetrics>,
  ) -> Self {
    metrics
      .feed_active
      .with_label_values(&[descriptor.name.as_str()])
      .set(0);
    Self {
      descriptor,
      adapter,
      pipeline,
      metrics,
      state: Arc::new(FeedState::default()),
      run: Mutex::new(None),
    }
  }

  pub fn name(&self) -> &str {
    &self.descriptor.name
  }

  pub fn descriptor(&self) -> &FeedDescriptor {
    &self.descriptor
  }

  pub fn is_active(&self) -> bool {
    self.state.active.load(Ordering::Acquire)
  }

  pub fn cycle_count(&self) -> u64 {
    self.state.cycle_count.load(Ordering::Acquire)
  }

  /// Inactive -> Active. Returns false if the feed was already active.
  #[instrument(skip(self), fields(feed = %self.descriptor.name))]
  pub async fn start(&self) -> bool {
    let mut run = self.run.lock().await;
    let Some(generation) = self.state.activate() else {
      return false;
    };

    if let Some(previous) = run.take() {
      // Normally already signalled by stop(); harmless if so.
      let _ = previous.stop_tx.send(true);
      if let Err(e) = previous.handle.await {
        warn!(error = %e, "Previous feed loop ended abnormally");
      }
    }

    self.state.set_start_time(Utc::now());
    let (stop_tx, stop_rx) = watch::channel(false);
    let ctx = LoopContext {
      descriptor: self.descriptor.clone(),
      adapter: Arc::clone(&self.adapter),
      pipeline: Arc::clone(&self.pipeline),
      metrics: Arc::clone(&self.metrics),
      state: Arc::clone(&self.state),
      generation,
    };
    let handle = tokio::spawn(run_loop(ctx, stop_rx));
    *run = Some(Run { stop_tx, handle });

    self
      .metrics
      .feed_active
      .with_label_values(&[self.descriptor.name.as_str()])
      .set(1);
    info!(
      heartbeat_secs = self.descriptor.heartbeat.as_secs(),
      limit = self.descriptor.limit,
      "Feed started"
    );
    true
  }

  /// Active -> Inactive. Returns false if the feed was not active.
  ///
  /// A cycle in progress completes; the loop exits at its next sleep.
  #[instrument(skip(self), fields(feed = %self.descriptor.name))]
  pub async fn stop(&self) -> bool {
    let run = self.run.lock().await;
    if self
      .state
      .active
      .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      return false;
    }
    if let Some(run) = run.as_ref() {
      let _ = run.stop_tx.send(true);
    }
    self
      .metrics
      .feed_active
      .with_label_values(&[self.descriptor.name.as_str()])
      .set(0);
    info!("Feed stopped");
    true
  }

  /// Stop the feed and wait for its loop to exit.
  pub async fn shutdown(&self) {
    let mut run = self.run.lock().await;
    self.state.active.store(false, Ordering::Release);
    self
      .metrics
      .feed_active
      .with_label_values(&[self.descriptor.name.as_str()])
      .set(0);
    if let Some(run) = run.take() {
      let _ = run.stop_tx.send(true);
      if let Err(e) = run.handle.await {
        warn!(feed = %self.descriptor.name, error = %e, "Feed loop ended abnormally");
      }
    }
  }

  pub fn status(&self) -> FeedStatus {
    FeedStatus {
      name: self.descriptor.name.clone(),
      id: self.descriptor.id,
      source_id: self.descriptor.source_id.clone(),
      heartbeat_seconds: self.descriptor.heartbeat.as_secs(),
      active: self.is_active(),
      cycle_count: self.cycle_count(),
      start_time: self.state.start_time(),
    }
  }
}

/// Poll loop of one run. Exits on a stop signal or a fatal error.
async fn run_loop(ctx: LoopContext, mut stop_rx: watch::Receiver<bool>) {
  let feed = ctx.descriptor.name.as_str();
  let source = ctx.descriptor.source_id.as_str();

  loop {
    if *stop_rx.borrow() {
      break;
    }

    let cycle = ctx.state.cycle_count.load(Ordering::Acquire) + 1;
    let started = Instant::now();
    let outcome = ctx
      .pipeline
      .run_cycle(ctx.adapter.as_ref(), &ctx.descriptor, cycle)
      .await;
    ctx
      .metrics
      .cycle_duration_seconds
      .with_label_values(&[feed])
      .observe(started.elapsed().as_secs_f64());

    match outcome {
      Ok(entry) => {
        ctx.state.cycle_count.fetch_add(1, Ordering::AcqRel);
        ctx.metrics.cycles_total.with_label_values(&[feed, source]).inc();
        ctx
          .metrics
          .records_last_cycle
          .with_label_values(&[feed])
          .set(entry.records.len() as i64);
        ctx
          .metrics
          .last_success_timestamp
          .with_label_values(&[feed])
          .set(entry.timestamp.timestamp() as f64);
        info!(feed, source, cycle, records = entry.records.len(), "Cycle persisted");
      }
      Err(e) => {
        ctx
          .metrics
          .cycle_failures_total
          .with_label_values(&[feed, source, e.kind()])
          .inc();
        if e.is_fatal() {
          if ctx.state.deactivate_run(ctx.generation) {
            error!(feed, source, cycle, error = %e, "Fatal cycle error, deactivating feed");
            ctx.metrics.feed_active.with_label_values(&[feed]).set(0);
          } else {
            error!(feed, source, cycle, error = %e, "Fatal cycle error in a replaced run");
          }
          return;
        }
        warn!(feed, source, cycle, kind = e.kind(), error = %e, "Cycle failed");
      }
    }

    tokio::select! {
      _ = tokio::time::sleep(ctx.descriptor.heartbeat) => {}
      _ = stop_rx.changed() => break,
    }
  }

  info!(feed, "Feed loop exited");
}
