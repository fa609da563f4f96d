//! History Log - Append-only JSONL Market-Cap Series
//!
//! One file per source, `history/{source}.jsonl`, one line per poll
//! cycle. Each line is a complete JSON object written with a single
//! append and synced before the call returns. Readers skip lines that
//! do not parse, so a write torn by a crash is never observed as data.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::domain::LogEntry;

/// Append-only JSONL writer/reader for per-source history.
pub struct HistoryLog {
    /// Directory holding one `.jsonl` file per source.
    history_dir: PathBuf,
    /// Serializes appends from concurrent feeds.
    write_lock: Mutex<()>,
}

impl HistoryLog {
    /// Create a history log rooted in `{data_dir}/history`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            history_dir: data_dir.join("history"),
            write_lock: Mutex::new(()),
        }
    }

    /// Create the history directory if it does not exist.
    pub async fn create_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.history_dir)
            .await
            .context("Failed to create history directory")
    }

    fn path_for(&self, source_id: &str) -> PathBuf {
        self.history_dir.join(format!("{source_id}.jsonl"))
    }

    /// Append one cycle's entry to its source file.
    ///
    /// A torn tail left by an earlier failed write is cut off first, and
    /// a write that fails part-way is rolled back, so the file only ever
    /// grows by whole lines.
    #[instrument(skip(self, entry), fields(source = %entry.source_id, cycle = entry.cycle))]
    pub async fn append(&self, entry: &LogEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry).context("Failed to serialize log entry")?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        self.create_dir().await?;

        let path = self.path_for(&entry.source_id);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open history file {}", path.display()))?;

        let (committed, len) = committed_len(&mut file).await?;
        if committed < len {
            file.set_len(committed)
                .await
                .context("Failed to cut torn history line")?;
            warn!(
                file = %path.display(),
                dropped_bytes = len - committed,
                "Truncated torn history line before append"
            );
        }

        if let Err(e) = write_line(&mut file, line.as_bytes()).await {
            if let Err(rollback) = file.set_len(committed).await {
                warn!(file = %path.display(), error = %rollback, "Failed to roll back partial write");
            }
            return Err(e);
        }

        debug!(bytes = line.len(), "Log entry appended");
        Ok(())
    }

    /// Load every well-formed entry of a source, in write order.
    pub async fn load(&self, source_id: &str) -> Result<Vec<LogEntry>> {
        let path = self.path_for(source_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read history file {}", path.display()))?;

        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(
                        file = %path.display(),
                        error = %e,
                        "Skipping malformed log entry"
                    );
                }
            }
        }
        Ok(entries)
    }

    /// Most recent well-formed entry of a source.
    pub async fn last(&self, source_id: &str) -> Result<Option<LogEntry>> {
        Ok(self.load(source_id).await?.pop())
    }

    /// Truncate torn trailing lines left by a crash mid-write.
    ///
    /// Run at startup so readers of files no feed appends to again do
    /// not keep warning about the partial line. Returns the number of
    /// files repaired.
    #[instrument(skip(self))]
    pub async fn repair(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut repaired = 0;

        let mut dir = fs::read_dir(&self.history_dir)
            .await
            .context("Failed to list history directory")?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().map_or(true, |ext| ext != "jsonl") {
                continue;
            }

            let bytes = fs::read(&path).await?;
            if bytes.last().map_or(true, |b| *b == b'\n') {
                continue;
            }

            let keep = bytes
                .iter()
                .rposition(|b| *b == b'\n')
                .map_or(0, |pos| pos + 1);
            let file = OpenOptions::new().write(true).open(&path).await?;
            file.set_len(keep as u64).await?;
            file.sync_all().await?;

            warn!(
                file = %path.display(),
                dropped_bytes = bytes.len() - keep,
                "Truncated torn history line"
            );
            repaired += 1;
        }
        Ok(repaired)
    }

    /// Check if the history directory is writable.
    pub async fn is_healthy(&self) -> bool {
        let test_path = self.history_dir.join(".health_check");
        let result = fs::write(&test_path, b"ok").await;
        let _ = fs::remove_file(&test_path).await;
        result.is_ok()
    }
}

/// Byte length of the file up to and including its last newline, and
/// its total length.
async fn committed_len(file: &mut File) -> Result<(u64, u64)> {
    let len = file
        .metadata()
        .await
        .context("Failed to stat history file")?
        .len();
    if len == 0 {
        return Ok((0, 0));
    }

    file.seek(SeekFrom::Start(len - 1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    if last[0] == b'\n' {
        return Ok((len, len));
    }

    file.seek(SeekFrom::Start(0)).await?;
    let mut bytes = Vec::with_capacity(len as usize);
    file.read_to_end(&mut bytes).await?;
    let keep = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |pos| pos + 1);
    Ok((keep as u64, len))
}

async fn write_line(file: &mut File, line: &[u8]) -> Result<()> {
    file.write_all(line)
        .await
        .context("Failed to write log entry")?;
    file.flush().await.context("Failed to flush history file")?;
    file.sync_data().await.context("Failed to sync history file")?;
    Ok(())
}
