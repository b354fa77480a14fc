use crate::config::Hashing;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use time::format_description::well_known::Rfc3339;

pub fn ensure_dir(p: &Path) -> Result<()> {
    std::fs::create_dir_all(p).with_context(|| format!("create_dir_all {}", p.display()))
}

pub fn ensure_parent(p: &Path) -> Result<()> {
    match p.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Content hash used to recognise re-uploads of the same PDF.
pub fn hash_file(cfg: &Hashing, path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let size = f.metadata().with_context(|| "metadata")?.len();
    let mut h = Sha256::new();

    match cfg.mode.as_str() {
        "full_sha256" => {
            let mut buf = vec![0u8; 1024 * 1024];
            loop {
                let n = f.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                h.update(&buf[..n]);
            }
        }
        "fast_2x16mb" => {
            let w = cfg.fast_window_bytes.min(size);
            if w > 0 {
                let mut buf = vec![0u8; w as usize];
                f.read_exact(&mut buf)?;
                h.update(&buf);

                if size > w {
                    f.seek(SeekFrom::Start(size - w))?;
                    f.read_exact(&mut buf)?;
                    h.update(&buf);
                }
            }
            h.update(size.to_le_bytes());
        }
        _ => anyhow::bail!("unknown hashing.mode: {}", cfg.mode),
    }

    Ok(format!("{:x}", h.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_and_full_hash_differ_but_are_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"%PDF-1.5 small body").unwrap();

        let full = Hashing::default();
        let fast = Hashing {
            mode: "fast_2x16mb".into(),
            fast_window_bytes: 4,
        };
        assert_eq!(hash_file(&full, &path).unwrap(), hash_file(&full, &path).unwrap());
        assert_ne!(hash_file(&full, &path).unwrap(), hash_file(&fast, &path).unwrap());

        let bad = Hashing {
            mode: "md5".into(),
            fast_window_bytes: 0,
        };
        assert!(hash_file(&bad, &path).is_err());
    }
}
