use crate::{
    config::{Normalize, Notify},
    model::PdfMetadata,
};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_CREATOR: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreatorDecision {
    /// Word-processor output: re-distill and continue.
    Normalize,
    Unsupported { creator: String },
}

pub fn decide(cfg: &Normalize, metadata: &PdfMetadata) -> CreatorDecision {
    let creator = metadata.creator.as_deref().unwrap_or_default();
    let lowered = creator.to_lowercase();
    let supported = !creator.is_empty()
        && cfg
            .word_processor_creators
            .iter()
            .any(|marker| !marker.is_empty() && lowered.contains(&marker.to_lowercase()));

    if supported {
        CreatorDecision::Normalize
    } else {
        CreatorDecision::Unsupported {
            creator: if creator.is_empty() {
                UNKNOWN_CREATOR.to_string()
            } else {
                creator.to_string()
            },
        }
    }
}

/// Plain-language text sent to the requester for a rejected upload.
pub fn unsupported_explanation(cfg: &Notify, creator: &str) -> String {
    cfg.unsupported_body.replace("{creator}", creator)
}
