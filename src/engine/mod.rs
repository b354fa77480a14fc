//! Narrow interfaces to the external tools the pipeline drives, plus the
//! shipped implementations (lopdf, Ghostscript, tesseract).

pub mod ghostscript;
pub mod pdf;
pub mod process;
pub mod tesseract;

use crate::{model::PdfMetadata, outline::OutlineNode};
use anyhow::Result;
use image::{DynamicImage, RgbImage};
use std::path::Path;

pub use ghostscript::{GhostscriptNormalizer, GhostscriptRasterizer};
pub use pdf::LopdfReader;
pub use tesseract::TesseractEngine;

pub trait PdfReader {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>>;
}

/// An opened PDF, addressed by zero-indexed page number.
pub trait PdfDocument {
    fn page_count(&self) -> u32;
    fn page_text(&self, page_number: u32) -> Result<String>;
    fn metadata(&self) -> PdfMetadata;
    fn has_outline(&self) -> bool;
    /// `Ok(None)` when the PDF has no outline. A broken outline is reported
    /// as [`crate::error::PipelineError::MalformedOutline`].
    fn outline(&self) -> Result<Option<OutlineNode>>;
}

/// Rewrites a PDF into a canonical structure with the same visual content.
pub trait Normalizer {
    fn normalize(&self, input: &Path, output: &Path) -> Result<()>;
}

pub trait Rasterizer {
    /// Renders exactly one zero-indexed page. Failures surface as
    /// [`crate::error::PipelineError::Render`].
    fn rasterize(&self, pdf: &Path, page_number: u32, dpi: u32) -> Result<DynamicImage>;
}

pub trait OcrEngine {
    fn id(&self) -> &str;
    fn is_available(&self) -> bool;
    /// Languages in the order the engine lists them.
    fn languages(&self) -> Result<Vec<String>>;
    fn recognize(&self, image: &RgbImage, language: &str) -> Result<String>;
}
