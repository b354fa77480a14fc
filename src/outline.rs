//! Table-of-contents handling: flattening the outline tree and attributing
//! pages to the section that governs them.

use serde::{Deserialize, Serialize};

pub const UNSPECIFIED_SECTION: &str = "Section not specified";

/// One node of a PDF outline.
///
/// An outline item with children is represented as a `Leaf` immediately
/// followed by a `Group` holding the children, so document order is kept
/// by plain depth-first traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutlineNode {
    Leaf { title: String, page_number: u32 },
    Group(Vec<OutlineNode>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    pub title: String,
    /// Zero-indexed start page, `-1` only for the unspecified sentinel.
    pub page_number: i64,
}

impl OutlineEntry {
    pub fn unspecified() -> Self {
        Self {
            title: UNSPECIFIED_SECTION.to_string(),
            page_number: -1,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        self.page_number < 0
    }
}

pub fn flatten(node: &OutlineNode) -> Vec<OutlineEntry> {
    let mut out = Vec::new();
    flatten_into(node, &mut out);
    out
}

fn flatten_into(node: &OutlineNode, out: &mut Vec<OutlineEntry>) {
    match node {
        OutlineNode::Leaf { title, page_number } => out.push(OutlineEntry {
            title: title.clone(),
            page_number: i64::from(*page_number),
        }),
        OutlineNode::Group(children) => {
            for child in children {
                flatten_into(child, out);
            }
        }
    }
}

/// Entry with the greatest start page not after `page_number`.
///
/// Ties on the start page go to the later entry. Falls back to the
/// "Section not specified" sentinel when every entry starts later.
pub fn section_for_page(flat: &[OutlineEntry], page_number: u32) -> OutlineEntry {
    let page = i64::from(page_number);
    let mut best: Option<&OutlineEntry> = None;
    for entry in flat {
        if entry.page_number > page {
            continue;
        }
        if best.is_none_or(|b| entry.page_number >= b.page_number) {
            best = Some(entry);
        }
    }
    best.cloned().unwrap_or_else(OutlineEntry::unspecified)
}
