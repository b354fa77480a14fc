use thiserror::Error;

/// Failures the pipeline has to tell apart from plain I/O or tool errors.
///
/// Everything else travels as `anyhow::Error`; callers that need to branch
/// on one of these use `downcast_ref::<PipelineError>()`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed outline: {0}")]
    MalformedOutline(String),

    #[error("failed to render page {page}: {reason}")]
    Render { page: u32, reason: String },

    #[error("no content region found")]
    NoContentRegion,

    #[error("unsupported document: created by {creator}")]
    UnsupportedDocument { creator: String },
}

impl PipelineError {
    /// Per-page failures that degrade to "no region" instead of aborting.
    pub fn is_page_local(&self) -> bool {
        matches!(self, Self::Render { .. } | Self::NoContentRegion)
    }
}
