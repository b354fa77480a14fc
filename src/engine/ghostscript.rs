use super::{
    Normalizer, Rasterizer,
    process::{ScratchFile, run_tool},
};
use crate::{config::Config, error::PipelineError};
use anyhow::{Result, anyhow};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Re-distills a PDF through Ghostscript's `pdfwrite` device.
pub struct GhostscriptNormalizer {
    gs_exe: String,
}

impl GhostscriptNormalizer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            gs_exe: cfg.normalize.gs_exe.clone(),
        }
    }
}

impl Normalizer for GhostscriptNormalizer {
    fn normalize(&self, input: &Path, output: &Path) -> Result<()> {
        if !input.exists() {
            return Err(anyhow!("normalize input does not exist: {}", input.display()));
        }
        if input == output {
            return Err(anyhow!(
                "normalize would overwrite its input: {}",
                input.display()
            ));
        }
        crate::util::ensure_parent(output)?;

        run_tool(
            Command::new(&self.gs_exe)
                .args(["-dBATCH", "-dNOPAUSE", "-dSAFER", "-q", "-sDEVICE=pdfwrite"])
                .arg(format!("-sOutputFile={}", output.display()))
                .arg(input),
        )?;

        if !output.exists() {
            return Err(anyhow!("gs produced no output: {}", output.display()));
        }
        Ok(())
    }
}

pub struct GhostscriptRasterizer {
    gs_exe: String,
    device: String,
    work_dir: PathBuf,
}

impl GhostscriptRasterizer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            gs_exe: cfg.render.gs_exe.clone(),
            device: cfg.render.device.clone(),
            work_dir: PathBuf::from(&cfg.paths.work_dir),
        }
    }

    fn render_to(&self, pdf: &Path, page_number: u32, dpi: u32, out: &Path) -> Result<DynamicImage> {
        // gs counts pages from 1
        let page = page_number + 1;
        run_tool(
            Command::new(&self.gs_exe)
                .args(["-dBATCH", "-dNOPAUSE", "-dSAFER", "-q"])
                .arg(format!("-sDEVICE={}", self.device))
                .arg(format!("-r{dpi}"))
                .arg(format!("-dFirstPage={page}"))
                .arg(format!("-dLastPage={page}"))
                .arg(format!("-sOutputFile={}", out.display()))
                .arg(pdf),
        )?;

        if !out.exists() {
            return Err(anyhow!("no image produced (page out of range?)"));
        }
        let img = image::open(out)?;
        debug!(page_number, width = img.width(), height = img.height(), "rasterized");
        Ok(img)
    }
}

impl Rasterizer for GhostscriptRasterizer {
    fn rasterize(&self, pdf: &Path, page_number: u32, dpi: u32) -> Result<DynamicImage> {
        let stem = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page".into());
        let scratch = ScratchFile::new(&self.work_dir, &format!("{stem}-{page_number}.png"))?;

        self.render_to(pdf, page_number, dpi, scratch.path())
            .map_err(|e| {
                PipelineError::Render {
                    page: page_number,
                    reason: format!("{e:#}"),
                }
                .into()
            })
    }
}
