use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub hashing: Hashing,
    #[serde(default)]
    pub matching: Matching,
    #[serde(default)]
    pub normalize: Normalize,
    #[serde(default)]
    pub render: Render,
    #[serde(default)]
    pub region: RegionCfg,
    #[serde(default)]
    pub ocr: Ocr,
    #[serde(default)]
    pub report: Report,
    #[serde(default)]
    pub notify: Notify,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub db_path: String,
    pub pdf_dir: String,
    pub image_dir: String,
    pub report_dir: String,
    pub work_dir: String,
    pub outbox_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            db_path: "data/pdf-findings.sqlite3".into(),
            pdf_dir: "data/pdf".into(),
            image_dir: "data/images".into(),
            report_dir: "data/reports".into(),
            work_dir: ".pdf-findings-work".into(),
            outbox_dir: "data/outbox".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hashing {
    pub mode: String,
    pub fast_window_bytes: u64,
}
impl Default for Hashing {
    fn default() -> Self {
        Self {
            mode: "full_sha256".into(),
            fast_window_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matching {
    /// Regular expression, always applied case-insensitively.
    pub pattern: String,
    pub normalize_unicode: bool,
    pub collapse_whitespace: bool,
}
impl Default for Matching {
    fn default() -> Self {
        Self {
            pattern: "Utredningen (föreslår|bedömer)".into(),
            normalize_unicode: true,
            collapse_whitespace: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Normalize {
    /// Case-insensitive substrings of `/Creator` that mark word-processor output.
    pub word_processor_creators: Vec<String>,
    pub gs_exe: String,
}
impl Default for Normalize {
    fn default() -> Self {
        Self {
            word_processor_creators: vec!["Microsoft".into()],
            gs_exe: "gs".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Render {
    pub dpi: u32,
    pub gs_exe: String,
    /// Ghostscript output device. `png16m` renders opaque RGB; alpha devices
    /// such as `pngalpha` are flattened onto white after decoding.
    pub device: String,
}
impl Default for Render {
    fn default() -> Self {
        Self {
            dpi: crate::render::RENDER_DPI,
            gs_exe: "gs".into(),
            device: "png16m".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionCfg {
    pub working_width: u32,
    pub threshold: u8,
    /// Crops must be strictly taller than this (full-resolution pixels).
    pub min_height: u32,
    pub approx_epsilon_ratio: f64,
}
impl Default for RegionCfg {
    fn default() -> Self {
        Self {
            working_width: 500,
            threshold: 170,
            min_height: 200,
            approx_epsilon_ratio: 0.04,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ocr {
    /// Empty means the first available engine.
    pub engine: String,
    /// Empty means the first language the engine reports.
    pub language: String,
    pub tesseract_exe: String,
}
impl Default for Ocr {
    fn default() -> Self {
        Self {
            engine: "".into(),
            language: "".into(),
            tesseract_exe: "tesseract".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub text_label: String,
    pub page_label: String,
    pub section_label: String,
    pub missing_outline_label: String,
}
impl Default for Report {
    fn default() -> Self {
        Self {
            text_label: "Text".into(),
            page_label: "Page".into(),
            section_label: "Section".into(),
            missing_outline_label: "(PDF has no table of contents metadata)".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notify {
    pub subject: String,
    pub report_body: String,
    /// `{creator}` is replaced with the detected creator.
    pub unsupported_body: String,
}
impl Default for Notify {
    fn default() -> Self {
        Self {
            subject: "Hello".into(),
            report_body: "Please find attached the result XLSX file.".into(),
            unsupported_body: "Only native PDF files created by Microsoft Word are supported. \
                               The uploaded PDF was created by: {creator}."
                .into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            dump_effective_config: false,
        }
    }
}
