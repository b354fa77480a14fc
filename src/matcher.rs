use crate::{
    config::Matching,
    engine::PdfDocument,
    error::PipelineError,
    model::PageMatch,
    outline::{self, OutlineEntry},
};
use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub struct PatternMatcher {
    pattern: Regex,
    normalize_unicode: bool,
    collapse_whitespace: bool,
}

impl PatternMatcher {
    pub fn new(cfg: &Matching) -> Result<Self> {
        let pattern = RegexBuilder::new(&cfg.pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("invalid matching.pattern: {}", cfg.pattern))?;
        Ok(Self {
            pattern,
            normalize_unicode: cfg.normalize_unicode,
            collapse_whitespace: cfg.collapse_whitespace,
        })
    }

    pub fn is_match(&self, page_text: &str) -> bool {
        let mut text = if self.normalize_unicode {
            page_text.nfc().collect::<String>()
        } else {
            page_text.to_string()
        };
        if self.collapse_whitespace {
            text = WHITESPACE_RUN.replace_all(&text, " ").into_owned();
        }
        self.pattern.is_match(&text)
    }

    /// Every page whose text matches, in page order. Each match carries its
    /// governing section when `sections` is given.
    pub fn find_matches(
        &self,
        doc: &dyn PdfDocument,
        sections: Option<&[OutlineEntry]>,
    ) -> Vec<PageMatch> {
        let page_count = doc.page_count();
        info!("scanning {page_count} pages");

        let mut matches = Vec::new();
        for page_number in 0..page_count {
            let text = match doc.page_text(page_number) {
                Ok(text) => text,
                Err(err) => {
                    debug!("page {page_number}: no extractable text: {err:#}");
                    continue;
                }
            };
            if text.trim().is_empty() || !self.is_match(&text) {
                continue;
            }

            let section = sections.map(|flat| outline::section_for_page(flat, page_number).title);
            info!(page_number, ?section, "pattern found");
            matches.push(PageMatch {
                page_number,
                section,
            });
        }
        matches
    }
}

/// Flattened outline, or `None` when there is none, it cannot be read, or
/// it has no entry pointing at a page. A malformed outline only costs the
/// section column.
pub fn resolve_sections(doc: &dyn PdfDocument) -> Option<Vec<OutlineEntry>> {
    match doc.outline() {
        Ok(tree) => {
            let flat = outline::flatten(&tree?);
            if flat.is_empty() {
                warn!("outline has no page entries");
                return None;
            }
            Some(flat)
        }
        Err(err) => {
            match err.downcast_ref::<PipelineError>() {
                Some(PipelineError::MalformedOutline(reason)) => {
                    warn!("ignoring outline: {reason}")
                }
                _ => warn!("could not read outline: {err:#}"),
            }
            None
        }
    }
}
