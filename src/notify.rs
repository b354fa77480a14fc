use crate::util::{ensure_dir, now_rfc3339};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// What the requester gets back: the report, or why there is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub document_id: i64,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<PathBuf>,
}

pub trait Notifier {
    fn deliver(&self, notice: &Notice) -> Result<()>;
}

/// Drops each notice as a JSON file for an external mailer to pick up.
pub struct OutboxNotifier {
    dir: PathBuf,
}

impl OutboxNotifier {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }
}

impl Notifier for OutboxNotifier {
    fn deliver(&self, notice: &Notice) -> Result<()> {
        ensure_dir(&self.dir)?;
        let path = self.dir.join(format!(
            "document-{:06}-{}.json",
            notice.document_id,
            file_safe(&notice.recipient)
        ));
        let payload = serde_json::json!({
            "queued_at": now_rfc3339(),
            "notice": notice,
        });
        std::fs::write(&path, serde_json::to_string_pretty(&payload)?)
            .with_context(|| format!("writing notice: {}", path.display()))?;
        info!("notice for {} queued at {}", notice.recipient, path.display());
        Ok(())
    }
}

fn file_safe(recipient: &str) -> String {
    recipient
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
