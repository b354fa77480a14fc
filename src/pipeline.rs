use crate::{
    config::Config,
    engine::{
        GhostscriptNormalizer, GhostscriptRasterizer, LopdfReader, Normalizer, OcrEngine,
        PdfReader, Rasterizer, TesseractEngine,
    },
    error::PipelineError,
    matcher::{self, PatternMatcher},
    model::{Document, PageRecord, Region, Stage},
    notify::{Notice, Notifier, OutboxNotifier},
    ocr::OcrRunner,
    policy::{self, CreatorDecision, UNKNOWN_CREATOR},
    probe, region, render, report,
    store::Store,
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Everything outside this crate that the pipeline talks to.
pub struct Collaborators {
    pub reader: Box<dyn PdfReader>,
    pub normalizer: Box<dyn Normalizer>,
    pub rasterizer: Box<dyn Rasterizer>,
    /// In preference order; the first available one wins unless configured.
    pub ocr_engines: Vec<Box<dyn OcrEngine>>,
    pub notifier: Box<dyn Notifier>,
}

impl Collaborators {
    /// lopdf + Ghostscript + tesseract + outbox directory.
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            reader: Box::new(LopdfReader),
            normalizer: Box::new(GhostscriptNormalizer::new(cfg)),
            rasterizer: Box::new(GhostscriptRasterizer::new(cfg)),
            ocr_engines: vec![Box::new(TesseractEngine::new(cfg))],
            notifier: Box::new(OutboxNotifier::new(Path::new(&cfg.paths.outbox_dir))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Reported { report_path: PathBuf },
    Unsupported { creator: String, explanation: String },
}

pub struct Pipeline<'s> {
    cfg: Config,
    store: &'s Store,
    tools: Collaborators,
    matcher: PatternMatcher,
}

impl<'s> Pipeline<'s> {
    pub fn new(cfg: &Config, store: &'s Store, tools: Collaborators) -> Result<Self> {
        Ok(Self {
            matcher: PatternMatcher::new(&cfg.matching)?,
            cfg: cfg.clone(),
            store,
            tools,
        })
    }

    /// Drives a document from its persisted stage to `Notified`.
    ///
    /// Safe to call again after a failure: work resumes at the stage that
    /// did not complete.
    pub fn run(&self, document_id: i64) -> Result<RunOutcome> {
        loop {
            let stage = self.store.require_document(document_id)?.stage;
            if stage.is_terminal() {
                break;
            }
            match self.step(document_id) {
                Ok(next) => info!(document_id, from = %stage, to = %next, "stage complete"),
                Err(err) => match err.downcast_ref::<PipelineError>() {
                    Some(PipelineError::UnsupportedDocument { creator }) => {
                        warn!(document_id, "rejected: created by {creator}");
                    }
                    _ => {
                        return Err(err.context(format!(
                            "document {document_id} stopped at stage {stage}"
                        )));
                    }
                },
            }
        }
        let doc = self.store.require_document(document_id)?;
        // requesters who joined after the run finished
        self.deliver_pending(&doc)?;
        self.outcome(&doc)
    }

    /// Performs exactly one stage transition and returns the new stage.
    ///
    /// Rejecting an unsupported document persists `Rejected` and then
    /// returns [`PipelineError::UnsupportedDocument`].
    pub fn step(&self, document_id: i64) -> Result<Stage> {
        let doc = self.store.require_document(document_id)?;
        match doc.stage {
            Stage::Uploaded => self.normalize(&doc),
            Stage::Normalized => self.match_pages(&doc),
            Stage::Matched => self.detect_regions(&doc),
            Stage::Regioned => self.recognize(&doc),
            Stage::Recognized => self.build_report(&doc),
            Stage::Reported | Stage::Rejected => self.notify(&doc),
            Stage::Notified => Err(anyhow!("document {document_id} is already notified")),
        }
    }

    fn advance(&self, doc: &Document, next: Stage) -> Result<Stage> {
        self.store.set_stage(doc.id, next)?;
        Ok(next)
    }

    fn normalize(&self, doc: &Document) -> Result<Stage> {
        let out = Path::new(&self.cfg.paths.pdf_dir).join(format!("{}.pdf", doc.id));
        if doc.pdf_path == out && out.exists() {
            // path was switched before the stage write landed
            return self.advance(doc, Stage::Normalized);
        }

        let probe = probe::probe_pdf(self.tools.reader.as_ref(), &doc.pdf_path)?;
        info!(
            document_id = doc.id,
            pages = probe.page_count,
            creator = ?probe.metadata.creator,
            producer = ?probe.metadata.producer,
            has_outline = probe.has_outline,
            "probed"
        );
        self.store
            .set_metadata(doc.id, &probe.metadata, probe.has_outline)?;

        match policy::decide(&self.cfg.normalize, &probe.metadata) {
            CreatorDecision::Normalize => {
                ensure_dir(Path::new(&self.cfg.paths.pdf_dir))?;
                self.tools
                    .normalizer
                    .normalize(&doc.pdf_path, &out)
                    .with_context(|| format!("normalizing {}", doc.pdf_path.display()))?;
                self.store.set_pdf_path(doc.id, &out)?;
                self.advance(doc, Stage::Normalized)
            }
            CreatorDecision::Unsupported { creator } => {
                self.advance(doc, Stage::Rejected)?;
                Err(PipelineError::UnsupportedDocument { creator }.into())
            }
        }
    }

    fn match_pages(&self, doc: &Document) -> Result<Stage> {
        let pdf = self.tools.reader.open(&doc.pdf_path)?;
        let sections = if doc.has_outline {
            matcher::resolve_sections(pdf.as_ref())
        } else {
            None
        };
        if doc.has_outline && sections.is_none() {
            warn!(document_id = doc.id, "outline unusable; reporting without sections");
            self.store.clear_outline(doc.id)?;
        }
        let matches = self.matcher.find_matches(pdf.as_ref(), sections.as_deref());
        info!(document_id = doc.id, matches = matches.len(), "pattern matching done");
        self.store.commit_matches(doc.id, &matches, Stage::Matched)?;
        Ok(Stage::Matched)
    }

    fn detect_regions(&self, doc: &Document) -> Result<Stage> {
        let image_dir = PathBuf::from(&self.cfg.paths.image_dir);
        ensure_dir(&image_dir)?;

        for page in self.store.pages(doc.id)? {
            let found = match self.page_region(doc, &page, &image_dir) {
                Ok(found) => found,
                Err(err) => match err.downcast_ref::<PipelineError>() {
                    Some(e) if e.is_page_local() => {
                        warn!(document_id = doc.id, page = page.page_number, "no region: {e}");
                        None
                    }
                    _ => return Err(err),
                },
            };
            self.store
                .set_region(page.id, found.as_ref().map(|(r, path)| (r, path.as_path())))?;
        }
        self.advance(doc, Stage::Regioned)
    }

    /// Region and saved crop for one page, or `None` when the crop is not
    /// tall enough to count as content.
    fn page_region(
        &self,
        doc: &Document,
        page: &PageRecord,
        image_dir: &Path,
    ) -> Result<Option<(Region, PathBuf)>> {
        let bitmap = render::render_page(
            self.tools.rasterizer.as_ref(),
            &doc.pdf_path,
            page.page_number,
            self.cfg.render.dpi,
        )?;
        let detected = region::detect_region(&bitmap, &self.cfg.region)?;

        if detected.crop.height() <= self.cfg.region.min_height {
            info!(
                page = page.page_number,
                height = detected.crop.height(),
                min_height = self.cfg.region.min_height,
                "region too short; skipping"
            );
            return Ok(None);
        }

        let path = image_dir.join(format!("{}_{}.png", doc.id, page.page_number));
        detected
            .crop
            .save(&path)
            .with_context(|| format!("saving crop: {}", path.display()))?;
        info!(page = page.page_number, region = ?detected.region, "saved crop {}", path.display());
        Ok(Some((detected.region, path)))
    }

    fn recognize(&self, doc: &Document) -> Result<Stage> {
        let pages = self.store.region_pages(doc.id)?;
        if !pages.is_empty() {
            let runner = OcrRunner::select(&self.cfg.ocr, &self.tools.ocr_engines)?;
            for page in pages {
                let path = page.image_path.as_deref().ok_or_else(|| {
                    anyhow!("page {} has a region but no image", page.page_number)
                })?;
                let img = image::open(path)
                    .with_context(|| format!("reading crop: {}", path.display()))?
                    .into_rgb8();
                info!(page = page.page_number, "running OCR on {}", path.display());
                let text = runner.recognize(&img)?;
                self.store.set_text(page.id, &text)?;
            }
        }
        self.advance(doc, Stage::Recognized)
    }

    fn build_report(&self, doc: &Document) -> Result<Stage> {
        let dest = Path::new(&self.cfg.paths.report_dir).join(format!("{}.xlsx", doc.id));
        let pages = self.store.region_pages(doc.id)?;
        let rows = report::build_report(&self.cfg.report, doc, &pages, &dest)?;
        self.store.set_report_path(doc.id, &dest)?;
        info!(document_id = doc.id, rows, "report written to {}", dest.display());
        self.advance(doc, Stage::Reported)
    }

    fn notify(&self, doc: &Document) -> Result<Stage> {
        if doc.stage == Stage::Reported && doc.report_path.is_none() {
            return Err(anyhow!("document {} is reported but has no report", doc.id));
        }
        self.deliver_pending(doc)?;
        self.advance(doc, Stage::Notified)
    }

    /// Sends the report (or the rejection explanation) to every requester
    /// not yet notified, marking each one as it goes.
    fn deliver_pending(&self, doc: &Document) -> Result<()> {
        for recipient in self.store.pending_requesters(doc.id)? {
            let notice = self.notice_for(doc, &recipient);
            self.tools.notifier.deliver(&notice)?;
            self.store.mark_notified(doc.id, &recipient)?;
        }
        Ok(())
    }

    fn notice_for(&self, doc: &Document, recipient: &str) -> Notice {
        let (body, attachment) = match &doc.report_path {
            Some(report_path) => (self.cfg.notify.report_body.clone(), Some(report_path.clone())),
            None => (
                policy::unsupported_explanation(&self.cfg.notify, creator_of(doc)),
                None,
            ),
        };
        Notice {
            document_id: doc.id,
            recipient: recipient.to_string(),
            subject: self.cfg.notify.subject.clone(),
            body,
            attachment,
        }
    }

    fn outcome(&self, doc: &Document) -> Result<RunOutcome> {
        Ok(match &doc.report_path {
            Some(report_path) => RunOutcome::Reported {
                report_path: report_path.clone(),
            },
            None => {
                let creator = creator_of(doc).to_string();
                RunOutcome::Unsupported {
                    explanation: policy::unsupported_explanation(&self.cfg.notify, &creator),
                    creator,
                }
            }
        })
    }
}

fn creator_of(doc: &Document) -> &str {
    doc.metadata
        .creator
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(UNKNOWN_CREATOR)
}
