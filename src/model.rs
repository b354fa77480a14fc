use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle of one document. Stored as text in the `stage` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Uploaded,
    Normalized,
    Matched,
    Regioned,
    Recognized,
    Reported,
    /// Terminal branch for documents that are not word-processor output.
    Rejected,
    Notified,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Uploaded => "uploaded",
            Stage::Normalized => "normalized",
            Stage::Matched => "matched",
            Stage::Regioned => "regioned",
            Stage::Recognized => "recognized",
            Stage::Reported => "reported",
            Stage::Rejected => "rejected",
            Stage::Notified => "notified",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(match raw {
            "uploaded" => Stage::Uploaded,
            "normalized" => Stage::Normalized,
            "matched" => Stage::Matched,
            "regioned" => Stage::Regioned,
            "recognized" => Stage::Recognized,
            "reported" => Stage::Reported,
            "rejected" => Stage::Rejected,
            "notified" => Stage::Notified,
            other => return Err(anyhow!("unknown stage: {other}")),
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Notified)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document-level fields read from the PDF `/Info` dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub author: Option<String>,
    pub producer: Option<String>,
    pub creator: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub content_hash: String,
    pub pdf_path: PathBuf,
    pub requester: String,
    pub metadata: PdfMetadata,
    pub has_outline: bool,
    pub report_path: Option<PathBuf>,
    pub stage: Stage,
    pub created_at: String,
}

/// Rectangle in full-resolution page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: i64,
    pub document_id: i64,
    /// Zero-indexed.
    pub page_number: u32,
    pub section: Option<String>,
    pub has_region: bool,
    pub text: Option<String>,
    pub region: Option<Region>,
    pub image_path: Option<PathBuf>,
}

/// A pattern hit, before it is persisted as a [`PageRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMatch {
    pub page_number: u32,
    pub section: Option<String>,
}
