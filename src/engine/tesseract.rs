use super::{
    OcrEngine,
    process::{ScratchFile, run_tool, tool_version},
};
use crate::config::Config;
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::PathBuf;
use std::process::Command;

/// Tesseract driven through its command line.
pub struct TesseractEngine {
    exe: String,
    work_dir: PathBuf,
}

impl TesseractEngine {
    pub const ID: &'static str = "tesseract";

    pub fn new(cfg: &Config) -> Self {
        Self {
            exe: cfg.ocr.tesseract_exe.clone(),
            work_dir: PathBuf::from(&cfg.paths.work_dir),
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn id(&self) -> &str {
        Self::ID
    }

    fn is_available(&self) -> bool {
        tool_version(&self.exe).is_ok()
    }

    fn languages(&self) -> Result<Vec<String>> {
        let out = run_tool(Command::new(&self.exe).arg("--list-langs"))?;
        // older builds print the list on stderr
        let raw = if out.stdout.is_empty() {
            out.stderr
        } else {
            out.stdout
        };
        Ok(parse_language_list(&String::from_utf8_lossy(&raw)))
    }

    fn recognize(&self, image: &RgbImage, language: &str) -> Result<String> {
        let scratch = ScratchFile::new(&self.work_dir, "ocr-input.png")?;
        image
            .save(scratch.path())
            .with_context(|| format!("writing OCR input: {}", scratch.path().display()))?;

        let out = run_tool(
            Command::new(&self.exe)
                .arg(scratch.path())
                .arg("stdout")
                .args(["-l", language]),
        )?;
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

/// `--list-langs` prints a "List of available languages ..." header line
/// followed by one language code per line.
fn parse_language_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}
