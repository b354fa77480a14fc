#![allow(dead_code)]

use anyhow::{Result, anyhow};
use image::{DynamicImage, Rgb, RgbImage};
use pdf_findings::{
    config::Config,
    engine::{Normalizer, OcrEngine, PdfDocument, PdfReader, Rasterizer},
    error::PipelineError,
    model::PdfMetadata,
    notify::{Notice, Notifier},
    outline::OutlineNode,
    pipeline::Collaborators,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub const MATCHING_TEXT: &str = "Utredningen föreslår att lagen ändras.";

/// In-memory stand-in for an opened PDF.
#[derive(Clone, Default)]
pub struct FakePdf {
    pub pages: Vec<String>,
    pub metadata: PdfMetadata,
    pub outline: Option<OutlineNode>,
    pub malformed_outline: bool,
}

impl FakePdf {
    pub fn word(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            metadata: PdfMetadata {
                title: Some("Betänkande".into()),
                subject: Some("Lagförslag".into()),
                author: Some("Utredningen".into()),
                producer: Some("Microsoft® Word for Microsoft 365".into()),
                creator: Some("Microsoft® Word for Microsoft 365".into()),
            },
            ..Self::default()
        }
    }

    pub fn with_outline(mut self, outline: OutlineNode) -> Self {
        self.outline = Some(outline);
        self
    }
}

impl PdfDocument for FakePdf {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_text(&self, page_number: u32) -> Result<String> {
        self.pages
            .get(page_number as usize)
            .cloned()
            .ok_or_else(|| anyhow!("no page {page_number}"))
    }

    fn metadata(&self) -> PdfMetadata {
        self.metadata.clone()
    }

    fn has_outline(&self) -> bool {
        self.outline.is_some() || self.malformed_outline
    }

    fn outline(&self) -> Result<Option<OutlineNode>> {
        if self.malformed_outline {
            return Err(PipelineError::MalformedOutline("dangling reference".into()).into());
        }
        Ok(self.outline.clone())
    }
}

pub struct FakeReader(pub FakePdf);

impl PdfReader for FakeReader {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>> {
        if !path.exists() {
            return Err(anyhow!("no such file: {}", path.display()));
        }
        Ok(Box::new(self.0.clone()))
    }
}

/// Copies the file and counts calls.
#[derive(Clone, Default)]
pub struct CopyNormalizer {
    pub calls: Rc<RefCell<u32>>,
}

impl Normalizer for CopyNormalizer {
    fn normalize(&self, input: &Path, output: &Path) -> Result<()> {
        *self.calls.borrow_mut() += 1;
        std::fs::copy(input, output)?;
        Ok(())
    }
}

/// Serves prepared bitmaps per page; any other page renders blank white.
#[derive(Clone, Default)]
pub struct FakeRasterizer {
    pub pages: HashMap<u32, RgbImage>,
    pub failing: Vec<u32>,
    pub calls: Rc<RefCell<Vec<u32>>>,
}

impl Rasterizer for FakeRasterizer {
    fn rasterize(&self, _pdf: &Path, page_number: u32, _dpi: u32) -> Result<DynamicImage> {
        self.calls.borrow_mut().push(page_number);
        if self.failing.contains(&page_number) {
            return Err(PipelineError::Render {
                page: page_number,
                reason: "device error".into(),
            }
            .into());
        }
        let img = self
            .pages
            .get(&page_number)
            .cloned()
            .unwrap_or_else(|| blank_page(1000, 1400));
        Ok(DynamicImage::ImageRgb8(img))
    }
}

/// Returns `text` when set, otherwise the size of what it was asked to read.
#[derive(Clone, Default)]
pub struct FakeOcr {
    pub text: Option<String>,
}

impl OcrEngine for FakeOcr {
    fn id(&self) -> &str {
        "fake"
    }
    fn is_available(&self) -> bool {
        true
    }
    fn languages(&self) -> Result<Vec<String>> {
        Ok(vec!["swe".into(), "eng".into()])
    }
    fn recognize(&self, image: &RgbImage, language: &str) -> Result<String> {
        Ok(match &self.text {
            Some(text) => text.clone(),
            None => format!("{language} {}x{}", image.width(), image.height()),
        })
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Rc<RefCell<Vec<Notice>>>,
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, notice: &Notice) -> Result<()> {
        self.sent.borrow_mut().push(notice.clone());
        Ok(())
    }
}

pub fn blank_page(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
}

/// White page with a solid dark block covering `[x0, x1) x [y0, y1)`.
pub fn page_with_block(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
            Rgb([20, 20, 20])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

pub fn leaf(title: &str, page_number: u32) -> OutlineNode {
    OutlineNode::Leaf {
        title: title.into(),
        page_number,
    }
}

/// Config whose every output directory lives under `root`.
pub fn config_in(root: &Path) -> Config {
    let mut cfg = Config::default();
    let sub = |name: &str| root.join(name).to_string_lossy().into_owned();
    cfg.paths.db_path = sub("db.sqlite3");
    cfg.paths.pdf_dir = sub("pdf");
    cfg.paths.image_dir = sub("images");
    cfg.paths.report_dir = sub("reports");
    cfg.paths.work_dir = sub("work");
    cfg.paths.outbox_dir = sub("outbox");
    cfg
}

/// Writes placeholder bytes standing in for the uploaded PDF.
pub fn upload(root: &Path) -> PathBuf {
    let path = root.join("upload.pdf");
    std::fs::write(&path, b"%PDF-1.7\n%fake\n").expect("write upload");
    path
}

pub struct Harness {
    pub ocr: FakeOcr,
    pub normalizer: CopyNormalizer,
    pub rasterizer: FakeRasterizer,
    pub notifier: RecordingNotifier,
}

impl Harness {
    pub fn new(rasterizer: FakeRasterizer) -> Self {
        Self {
            ocr: FakeOcr::default(),
            normalizer: CopyNormalizer::default(),
            rasterizer,
            notifier: RecordingNotifier::default(),
        }
    }

    pub fn collaborators(&self, pdf: FakePdf) -> Collaborators {
        Collaborators {
            reader: Box::new(FakeReader(pdf)),
            normalizer: Box::new(self.normalizer.clone()),
            rasterizer: Box::new(self.rasterizer.clone()),
            ocr_engines: vec![Box::new(self.ocr.clone())],
            notifier: Box::new(self.notifier.clone()),
        }
    }
}
