use crate::{engine::PdfReader, model::PdfMetadata};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub path: String,
    pub file_bytes: u64,
    pub page_count: u32,
    pub metadata: PdfMetadata,
    pub has_outline: bool,
}

/// Reads what the pipeline needs to know before touching any page.
pub fn probe_pdf(reader: &dyn PdfReader, input: &Path) -> Result<ProbeResult> {
    let meta = std::fs::metadata(input)
        .with_context(|| format!("stat input: {}", input.display()))?;
    let doc = reader.open(input)?;

    let page_count = doc.page_count();
    if page_count == 0 {
        anyhow::bail!("input has zero pages");
    }

    Ok(ProbeResult {
        path: input.display().to_string(),
        file_bytes: meta.len(),
        page_count,
        metadata: doc.metadata(),
        has_outline: doc.has_outline(),
    })
}
