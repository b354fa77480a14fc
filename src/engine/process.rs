use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Runs an external tool to completion and fails on a non-zero exit,
/// carrying stderr in the error.
pub fn run_tool(cmd: &mut Command) -> Result<Output> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!(?cmd, "run tool");

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("spawning {program} (is it installed?)"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "{program} failed with {}\n{}",
            output.status,
            stderr.trim()
        ));
    }

    if !output.stderr.is_empty() {
        debug!(
            "{program} stderr: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(output)
}

/// First line of `<exe> --version`, used by `doctor`.
pub fn tool_version(exe: &str) -> Result<String> {
    let out = run_tool(Command::new(exe).arg("--version"))?;
    // tesseract historically printed its banner on stderr
    let raw = if out.stdout.is_empty() {
        out.stderr
    } else {
        out.stdout
    };
    Ok(String::from_utf8_lossy(&raw)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string())
}

/// Scratch file under `work_dir` that is removed when dropped.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(work_dir: &Path, name: &str) -> Result<Self> {
        crate::util::ensure_dir(work_dir)?;
        Ok(Self {
            path: work_dir.join(format!("{}-{name}", std::process::id())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
