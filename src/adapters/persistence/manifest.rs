//! Store Manifest - Atomic `schema.json` Marker
//!
//! Records the on-disk format of the data directory. Written once with
//! an atomic tmp-then-rename so a crash never leaves a half-written
//! manifest; later calls only read and check it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, instrument};

/// On-disk layout identifier.
pub const STORE_FORMAT: &str = "jsonl-history";

/// Current layout version.
pub const STORE_VERSION: u32 = 1;

/// Contents of `schema.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreManifest {
    pub format: String,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

/// Reads and creates the data directory manifest.
pub struct SchemaManifest {
    /// Path to schema.json.
    manifest_path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
}

impl SchemaManifest {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            manifest_path: data_dir.join("schema.json"),
            tmp_path: data_dir.join("schema.json.tmp"),
        }
    }

    /// Return the existing manifest, or create it when absent.
    ///
    /// Fails if an existing manifest describes another format/version.
    #[instrument(skip(self))]
    pub async fn ensure(&self) -> Result<StoreManifest> {
        if let Some(existing) = self.load().await? {
            anyhow::ensure!(
                existing.format == STORE_FORMAT && existing.version == STORE_VERSION,
                "Data directory holds {} v{}, expected {} v{}",
                existing.format,
                existing.version,
                STORE_FORMAT,
                STORE_VERSION
            );
            return Ok(existing);
        }

        let manifest = StoreManifest {
            format: STORE_FORMAT.to_string(),
            version: STORE_VERSION,
            created_at: Utc::now(),
        };
        let json =
            serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp manifest file")?;
        fs::rename(&self.tmp_path, &self.manifest_path)
            .await
            .context("Failed to rename manifest file")?;

        info!(path = %self.manifest_path.display(), "Store manifest created");
        Ok(manifest)
    }

    /// Load the manifest, `None` on a fresh data directory.
    pub async fn load(&self) -> Result<Option<StoreManifest>> {
        if !self.manifest_path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.manifest_path)
            .await
            .context("Failed to read manifest file")?;
        let manifest = serde_json::from_str(&json).context("Failed to parse manifest JSON")?;
        Ok(Some(manifest))
    }
}
