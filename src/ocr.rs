use crate::{config::Ocr, engine::OcrEngine};
use anyhow::{Result, anyhow};
use image::RgbImage;
use serde::Serialize;
use tracing::{info, warn};

/// Engine and language actually used for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OcrSelection {
    pub engine_id: String,
    pub language_code: String,
}

pub struct OcrRunner<'a> {
    engine: &'a dyn OcrEngine,
    selection: OcrSelection,
}

impl<'a> OcrRunner<'a> {
    /// Pins the configured engine/language. Unset values fall back to the
    /// first available engine and the first language it lists.
    pub fn select(cfg: &Ocr, engines: &'a [Box<dyn OcrEngine>]) -> Result<Self> {
        let engine: &dyn OcrEngine = if cfg.engine.is_empty() {
            engines
                .iter()
                .map(|e| &**e)
                .find(|e| e.is_available())
                .ok_or_else(|| anyhow!("no OCR engine available"))?
        } else {
            engines
                .iter()
                .map(|e| &**e)
                .find(|e| e.id() == cfg.engine)
                .ok_or_else(|| anyhow!("unknown ocr.engine: {}", cfg.engine))?
        };

        let language_code = if cfg.language.is_empty() {
            let langs = engine.languages()?;
            let first = langs
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("OCR engine {} lists no languages", engine.id()))?;
            warn!(
                "ocr.language not set; using first listed language {first:?} of {}",
                engine.id()
            );
            first
        } else {
            cfg.language.clone()
        };

        let selection = OcrSelection {
            engine_id: engine.id().to_string(),
            language_code,
        };
        info!(?selection, "OCR selection");
        Ok(Self { engine, selection })
    }

    pub fn selection(&self) -> &OcrSelection {
        &self.selection
    }

    pub fn recognize(&self, image: &RgbImage) -> Result<String> {
        self.engine.recognize(image, &self.selection.language_code)
    }
}
