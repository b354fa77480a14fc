use crate::{
    config::Config,
    engine::{LopdfReader, OcrEngine, PdfReader, TesseractEngine, process::tool_version},
    matcher,
    pipeline::{Collaborators, Pipeline},
    store::Store,
    util::{ensure_dir, hash_file},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pdf-findings")]
#[command(about = "Extract pattern-matched findings from PDFs into an XLSX report")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./pdf-findings.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the external tools and print the OCR capabilities.
    Doctor {},
    /// Register a PDF for processing.
    Submit {
        #[arg(long)]
        input: PathBuf,
        /// Address the result is delivered to.
        #[arg(long)]
        requester: String,
    },
    /// Run (or resume) the pipeline for a submitted document.
    Run {
        #[arg(long)]
        document: i64,
    },
    /// Submit and run in one go.
    Process {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        requester: String,
    },
    /// List every known document and its stage.
    List {},
    /// Print a document and its page records as JSON.
    Status {
        #[arg(long)]
        document: i64,
    },
    /// Print the flattened outline of a PDF as JSON.
    Outline {
        #[arg(long)]
        input: PathBuf,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref());
    let cfg = match &cfg_path {
        Some(p) => Config::load(p)?,
        None => Config::default(),
    };
    let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;
    if cfg_path.is_none() {
        warn!("no config file found; using built-in defaults");
    }

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(&cfg).unwrap_or_default();
        ensure_dir(Path::new(&cfg.paths.work_dir))?;
        std::fs::write(Path::new(&cfg.paths.work_dir).join("effective-config.toml"), raw)?;
    }

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Submit { input, requester } => {
            let store = Store::open(Path::new(&cfg.paths.db_path))?;
            let id = submit(&cfg, &store, input, requester)?;
            print_json(&serde_json::json!({ "document_id": id }))
        }
        Command::Run { document } => {
            let store = Store::open(Path::new(&cfg.paths.db_path))?;
            run(&cfg, &store, *document)
        }
        Command::Process { input, requester } => {
            let store = Store::open(Path::new(&cfg.paths.db_path))?;
            let id = submit(&cfg, &store, input, requester)?;
            run(&cfg, &store, id)
        }
        Command::List {} => {
            let store = Store::open(Path::new(&cfg.paths.db_path))?;
            let docs: Vec<_> = store
                .list_documents()?
                .into_iter()
                .map(|d| serde_json::json!({ "id": d.id, "stage": d.stage, "requester": d.requester }))
                .collect();
            print_json(&serde_json::json!(docs))
        }
        Command::Status { document } => {
            let store = Store::open(Path::new(&cfg.paths.db_path))?;
            let doc = store.require_document(*document)?;
            let pages = store.pages(*document)?;
            print_json(&serde_json::json!({ "document": doc, "pages": pages }))
        }
        Command::Outline { input } => outline(input),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    ["pdf-findings.toml", "pdf-findings.example.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.paths.work_dir).join("pdf-findings.log"))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    let version = |exe: &str| match tool_version(exe) {
        Ok(v) => serde_json::json!({ "exe": exe, "ok": true, "version": v }),
        Err(e) => serde_json::json!({ "exe": exe, "ok": false, "error": format!("{e:#}") }),
    };
    let tesseract = TesseractEngine::new(cfg);
    let languages = tesseract
        .languages()
        .map_err(|e| format!("{e:#}"));

    print_json(&serde_json::json!({
        "normalizer": version(&cfg.normalize.gs_exe),
        "rasterizer": version(&cfg.render.gs_exe),
        "ocr": {
            "engine": tesseract.id(),
            "tool": version(&cfg.ocr.tesseract_exe),
            "languages": languages.as_ref().ok(),
            "languages_error": languages.as_ref().err(),
            "configured_engine": cfg.ocr.engine,
            "configured_language": cfg.ocr.language,
        },
    }))
}

/// Hashes the upload, copies it into `pdf_dir` and registers it. A PDF
/// already seen (same content hash) keeps its existing document and only
/// gains `requester` as another recipient.
pub fn submit(cfg: &Config, store: &Store, input: &Path, requester: &str) -> Result<i64> {
    validate_input(input)?;

    let hash = hash_file(&cfg.hashing, input)
        .with_context(|| format!("hashing input: {}", input.display()))?;
    if let Some(existing) = store.document_by_hash(&hash)? {
        let added = store.add_request(existing.id, requester)?;
        info!(
            added,
            "{} already submitted as document {} (stage {})",
            input.display(),
            existing.id,
            existing.stage
        );
        return Ok(existing.id);
    }

    let pdf_dir = PathBuf::from(&cfg.paths.pdf_dir);
    ensure_dir(&pdf_dir)?;
    let stored = pdf_dir.join(format!("upload-{}.pdf", &hash[..16]));
    std::fs::copy(input, &stored)
        .with_context(|| format!("copying {} to {}", input.display(), stored.display()))?;

    let id = store.create_document(&hash, &stored, requester)?;
    info!("document {id} submitted from {}", input.display());
    Ok(id)
}

fn run(cfg: &Config, store: &Store, document_id: i64) -> Result<()> {
    let pipeline = Pipeline::new(cfg, store, Collaborators::from_config(cfg))?;
    let outcome = pipeline.run(document_id)?;
    print_json(&serde_json::json!({
        "document_id": document_id,
        "outcome": outcome,
    }))
}

fn outline(input: &Path) -> Result<()> {
    validate_input(input)?;
    let doc = LopdfReader.open(input)?;
    let flat = matcher::resolve_sections(doc.as_ref());
    print_json(&serde_json::json!({
        "input": input,
        "has_outline": doc.has_outline(),
        "sections": flat,
    }))
}

fn validate_input(input: &Path) -> Result<()> {
    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    if let Some(ext) = input.extension().and_then(|s| s.to_str()) {
        if !ext.eq_ignore_ascii_case("pdf") {
            return Err(anyhow!("input is not a PDF: {}", input.display()));
        }
    } else {
        warn!("input has no extension; assuming PDF: {}", input.display());
    }

    Ok(())
}
