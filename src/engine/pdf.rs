use super::{PdfDocument, PdfReader};
use crate::{error::PipelineError, model::PdfMetadata, outline::OutlineNode};
use anyhow::{Context, Result};
use lopdf::{Dictionary, Object, ObjectId};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

const MAX_OUTLINE_DEPTH: usize = 64;
const MAX_NAME_TREE_DEPTH: usize = 32;

pub struct LopdfReader;

impl PdfReader for LopdfReader {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>> {
        let doc = lopdf::Document::load(path)
            .with_context(|| format!("loading PDF: {}", path.display()))?;
        Ok(Box::new(LopdfDocument::new(doc)))
    }
}

pub struct LopdfDocument {
    doc: lopdf::Document,
    /// Page object ids in page order.
    pages: Vec<ObjectId>,
}

impl LopdfDocument {
    pub fn new(doc: lopdf::Document) -> Self {
        let pages = doc.get_pages().into_values().collect();
        Self { doc, pages }
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            other => other,
        }
    }

    fn dict_entry<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        dict.get(key).ok().map(|o| self.resolve(o))
    }

    fn info_string(&self, dict: &Dictionary, key: &[u8]) -> Option<String> {
        match self.dict_entry(dict, key)? {
            Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
            Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
            _ => None,
        }
    }

    fn outlines_root(&self) -> Option<&Dictionary> {
        let catalog = self.doc.catalog().ok()?;
        self.dict_entry(catalog, b"Outlines")?.as_dict().ok()
    }

    fn first_outline_item(&self) -> Option<ObjectId> {
        match self.outlines_root()?.get(b"First") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    }

    fn read_siblings(
        &self,
        first: ObjectId,
        depth: usize,
        visited: &mut HashSet<ObjectId>,
    ) -> std::result::Result<Vec<OutlineNode>, PipelineError> {
        if depth >= MAX_OUTLINE_DEPTH {
            return Err(PipelineError::MalformedOutline(format!(
                "outline nested deeper than {MAX_OUTLINE_DEPTH}"
            )));
        }

        let mut nodes = Vec::new();
        let mut current = Some(first);
        while let Some(id) = current {
            if !visited.insert(id) {
                return Err(PipelineError::MalformedOutline(format!(
                    "outline item {} {} visited twice",
                    id.0, id.1
                )));
            }

            let item = self
                .doc
                .get_object(id)
                .and_then(|o| o.as_dict())
                .map_err(|e| {
                    PipelineError::MalformedOutline(format!(
                        "outline item {} {} is not a dictionary: {e}",
                        id.0, id.1
                    ))
                })?;

            let title = self.info_string(item, b"Title").unwrap_or_default();
            match self.item_destination(item) {
                Some(dest) => {
                    let page_number = self.destination_page(dest, 0).ok_or_else(|| {
                        PipelineError::MalformedOutline(format!(
                            "outline item {title:?} has no resolvable destination"
                        ))
                    })?;
                    nodes.push(OutlineNode::Leaf { title, page_number });
                }
                // URI and launch bookmarks carry no page
                None => warn!("skipping outline item {title:?}: not a page destination"),
            }

            if let Ok(Object::Reference(child)) = item.get(b"First") {
                let children = self.read_siblings(*child, depth + 1, visited)?;
                nodes.push(OutlineNode::Group(children));
            }

            current = match item.get(b"Next") {
                Ok(Object::Reference(next)) => Some(*next),
                _ => None,
            };
        }
        Ok(nodes)
    }

    /// `/Dest` first, then a `/GoTo` action's `/D`. `None` for items that
    /// do not point into the document.
    fn item_destination<'a>(&'a self, item: &'a Dictionary) -> Option<&'a Object> {
        if let Some(dest) = self.dict_entry(item, b"Dest") {
            return Some(dest);
        }
        let action = self.dict_entry(item, b"A")?.as_dict().ok()?;
        match action.get(b"S") {
            Ok(Object::Name(kind)) if kind.as_slice() == b"GoTo" => self.dict_entry(action, b"D"),
            _ => None,
        }
    }

    fn destination_page(&self, dest: &Object, depth: usize) -> Option<u32> {
        if depth > 2 {
            return None;
        }
        match self.resolve(dest) {
            Object::Array(parts) => match parts.first()? {
                Object::Reference(page_id) => self
                    .pages
                    .iter()
                    .position(|p| p == page_id)
                    .map(|i| i as u32),
                Object::Integer(i) => u32::try_from(*i).ok(),
                _ => None,
            },
            // Named destinations may resolve to a dictionary wrapping `/D`.
            Object::Dictionary(d) => self.destination_page(self.dict_entry(d, b"D")?, depth + 1),
            Object::String(name, _) | Object::Name(name) => {
                let target = self.named_destination(name)?;
                self.destination_page(target, depth + 1)
            }
            _ => None,
        }
    }

    /// Looks a name up in the PDF 1.1 `/Dests` dictionary, then in the
    /// `/Names` → `/Dests` name tree.
    fn named_destination(&self, name: &[u8]) -> Option<&Object> {
        let catalog = self.doc.catalog().ok()?;
        if let Some(Ok(dests)) = self.dict_entry(catalog, b"Dests").map(|o| o.as_dict()) {
            if let Some(found) = self.dict_entry(dests, name) {
                return Some(found);
            }
        }
        let names = self.dict_entry(catalog, b"Names")?.as_dict().ok()?;
        let tree = self.dict_entry(names, b"Dests")?.as_dict().ok()?;
        self.name_tree_lookup(tree, name, 0)
    }

    fn name_tree_lookup<'a>(
        &'a self,
        node: &'a Dictionary,
        name: &[u8],
        depth: usize,
    ) -> Option<&'a Object> {
        if depth > MAX_NAME_TREE_DEPTH {
            return None;
        }
        if let Some(Object::Array(pairs)) = self.dict_entry(node, b"Names") {
            for pair in pairs.chunks(2) {
                if let [Object::String(key, _), value] = pair {
                    if key.as_slice() == name {
                        return Some(self.resolve(value));
                    }
                }
            }
        }
        if let Some(Object::Array(kids)) = self.dict_entry(node, b"Kids") {
            for kid in kids {
                if let Ok(kid) = self.resolve(kid).as_dict() {
                    if let Some(found) = self.name_tree_lookup(kid, name, depth + 1) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_text(&self, page_number: u32) -> Result<String> {
        anyhow::ensure!(
            (page_number as usize) < self.pages.len(),
            "page {page_number} out of range ({} pages)",
            self.pages.len()
        );
        self.doc
            .extract_text(&[page_number + 1])
            .with_context(|| format!("extracting text of page {page_number}"))
    }

    fn metadata(&self) -> PdfMetadata {
        let info = match self.doc.trailer.get(b"Info").map(|o| self.resolve(o)) {
            Ok(Object::Dictionary(dict)) => dict,
            _ => return PdfMetadata::default(),
        };
        PdfMetadata {
            title: self.info_string(info, b"Title"),
            subject: self.info_string(info, b"Subject"),
            author: self.info_string(info, b"Author"),
            producer: self.info_string(info, b"Producer"),
            creator: self.info_string(info, b"Creator"),
        }
    }

    fn has_outline(&self) -> bool {
        self.first_outline_item().is_some()
    }

    fn outline(&self) -> Result<Option<OutlineNode>> {
        let Some(first) = self.first_outline_item() else {
            return Ok(None);
        };
        let mut visited = HashSet::new();
        let nodes = self.read_siblings(first, 0, &mut visited)?;
        Ok(Some(OutlineNode::Group(nodes)))
    }
}

/// PDF text strings are UTF-16BE with a BOM, or PDFDocEncoding (close
/// enough to Latin-1 for metadata).
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
