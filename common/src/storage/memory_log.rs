use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::AppError;

/// Case-sensitive marker for Sarbanes-Oxley references.
const SOX_MARKER: &str = "SOX";
/// Matched case-insensitively.
const CONTROL_MARKER: &str = "control";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryRecord {
    pub snippet: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
}

/// On-disk shape of the memory log.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryDocument {
    #[serde(default)]
    pub controls: BTreeMap<String, MemoryRecord>,
    #[serde(default)]
    pub metadata: MemoryMetadata,
}

/// Append-only log of compliance-relevant query snippets.
///
/// Every qualifying `record` rewrites the whole file while holding the
/// in-process lock, so concurrent requests never interleave their writes.
pub struct AuditMemoryLog {
    path: PathBuf,
    state: Mutex<MemoryDocument>,
}

impl AuditMemoryLog {
    /// Loads the log at `path`, starting empty when the file does not exist yet.
    pub async fn open(path: &Path) -> Result<Self, AppError> {
        let document = match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => MemoryDocument::default(),
            Err(err) => return Err(err.into()),
        };

        info!(
            path = %path.display(),
            entries = document.controls.len(),
            "Audit memory log loaded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_compliance_relevant(text: &str) -> bool {
        text.contains(SOX_MARKER) || text.to_lowercase().contains(CONTROL_MARKER)
    }

    /// Appends `text` when it mentions SOX or controls. Returns the new entry id,
    /// or `None` when the text was filtered out.
    pub async fn record(&self, text: &str) -> Result<Option<String>, AppError> {
        if !Self::is_compliance_relevant(text) {
            debug!("Query not compliance relevant; memory log unchanged");
            return Ok(None);
        }

        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let id = format!("item_{}", next.controls.len().saturating_add(1));
        next.controls.insert(
            id.clone(),
            MemoryRecord {
                snippet: text.to_string(),
            },
        );
        next.metadata.last_update = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));

        self.persist(&next).await?;
        *state = next;

        info!(%id, "Recorded compliance snippet");
        Ok(Some(id))
    }

    pub async fn snapshot(&self) -> MemoryDocument {
        self.state.lock().await.clone()
    }

    async fn persist(&self, document: &MemoryDocument) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, serde_json::to_vec_pretty(document)?).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}
