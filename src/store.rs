//! SQLite persistence for documents and their page records.
//!
//! Schema:
//! - documents: one row per uploaded PDF, carrying the pipeline stage
//! - pages: one row per pattern hit, filled in by region detection and OCR
//! - requests: one row per requester of a document, with delivery state

use crate::{
    model::{Document, PageMatch, PageRecord, PdfMetadata, Region, Stage},
    util::{ensure_parent, now_rfc3339},
};
use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use std::path::{Path, PathBuf};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_hash TEXT NOT NULL UNIQUE,
    pdf_path TEXT NOT NULL,
    requester TEXT NOT NULL,
    title TEXT,
    subject TEXT,
    author TEXT,
    producer TEXT,
    creator TEXT,
    has_outline INTEGER NOT NULL DEFAULT 0,
    report_path TEXT,
    stage TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL,
    page_number INTEGER NOT NULL,
    section TEXT,
    has_region INTEGER NOT NULL DEFAULT 0,
    text TEXT,
    x INTEGER,
    y INTEGER,
    width INTEGER,
    height INTEGER,
    image_path TEXT,
    FOREIGN KEY (document_id) REFERENCES documents(id),
    UNIQUE(document_id, page_number)
);

CREATE INDEX IF NOT EXISTS idx_pages_document ON pages(document_id, has_region);

CREATE TABLE IF NOT EXISTS requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL,
    requester TEXT NOT NULL,
    requested_at TEXT NOT NULL,
    notified_at TEXT,
    FOREIGN KEY (document_id) REFERENCES documents(id),
    UNIQUE(document_id, requester)
);
";

const DOCUMENT_COLUMNS: &str = "id, content_hash, pdf_path, requester, title, subject, author, \
     producer, creator, has_outline, report_path, stage, created_at";

const PAGE_COLUMNS: &str =
    "id, document_id, page_number, section, has_region, text, x, y, width, height, image_path";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        ensure_parent(path)?;
        let conn = Connection::open(path)
            .with_context(|| format!("opening database: {}", path.display()))?;
        // WAL lets independent workers share the file
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// New document in the `Uploaded` stage, with `requester` as its first
    /// pending request.
    pub fn create_document(&self, content_hash: &str, pdf_path: &Path, requester: &str) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO documents (content_hash, pdf_path, requester, stage, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                content_hash,
                pdf_path.to_string_lossy(),
                requester,
                Stage::Uploaded.as_str(),
                now_rfc3339()
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO requests (document_id, requester, requested_at) VALUES (?, ?, ?)",
            params![id, requester, now_rfc3339()],
        )?;
        tx.commit()?;
        Ok(id)
    }

    /// Records another requester for a document. Returns `false` when that
    /// requester already asked for it.
    pub fn add_request(&self, document_id: i64, requester: &str) -> Result<bool> {
        let n = self.conn.execute(
            "INSERT OR IGNORE INTO requests (document_id, requester, requested_at)
             VALUES (?, ?, ?)",
            params![document_id, requester, now_rfc3339()],
        )?;
        Ok(n > 0)
    }

    /// Requesters that have not been sent a notice yet, in request order.
    pub fn pending_requesters(&self, document_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT requester FROM requests WHERE document_id = ? AND notified_at IS NULL
             ORDER BY id",
        )?;
        let requesters = stmt
            .query_map(params![document_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(requesters)
    }

    pub fn mark_notified(&self, document_id: i64, requester: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE requests SET notified_at = ? WHERE document_id = ? AND requester = ?",
            params![now_rfc3339(), document_id, requester],
        )?;
        Ok(())
    }

    pub fn document(&self, id: i64) -> Result<Option<Document>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"),
                params![id],
                document_from_row,
            )
            .optional()?)
    }

    pub fn require_document(&self, id: i64) -> Result<Document> {
        self.document(id)?
            .ok_or_else(|| anyhow!("no such document: {id}"))
    }

    pub fn document_by_hash(&self, content_hash: &str) -> Result<Option<Document>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE content_hash = ?"),
                params![content_hash],
                document_from_row,
            )
            .optional()?)
    }

    pub fn list_documents(&self) -> Result<Vec<Document>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY id"))?;
        let docs = stmt
            .query_map([], document_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(docs)
    }

    pub fn set_metadata(&self, id: i64, meta: &PdfMetadata, has_outline: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE documents SET title = ?, subject = ?, author = ?, producer = ?, creator = ?,
             has_outline = ? WHERE id = ?",
            params![
                meta.title,
                meta.subject,
                meta.author,
                meta.producer,
                meta.creator,
                has_outline,
                id
            ],
        )?;
        Ok(())
    }

    /// Drops section attribution for a document whose outline turned out
    /// to be unusable.
    pub fn clear_outline(&self, id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE documents SET has_outline = 0 WHERE id = ?",
            params![id],
        )?;
        Ok(())
    }

    pub fn set_pdf_path(&self, id: i64, pdf_path: &Path) -> Result<()> {
        self.conn.execute(
            "UPDATE documents SET pdf_path = ? WHERE id = ?",
            params![pdf_path.to_string_lossy(), id],
        )?;
        Ok(())
    }

    pub fn set_report_path(&self, id: i64, report_path: &Path) -> Result<()> {
        self.conn.execute(
            "UPDATE documents SET report_path = ? WHERE id = ?",
            params![report_path.to_string_lossy(), id],
        )?;
        Ok(())
    }

    pub fn set_stage(&self, id: i64, stage: Stage) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE documents SET stage = ? WHERE id = ?",
            params![stage.as_str(), id],
        )?;
        if n == 0 {
            return Err(anyhow!("no such document: {id}"));
        }
        Ok(())
    }

    /// Inserts the page records for a document and moves it to `next` in a
    /// single transaction, so a crash never leaves half the matches behind.
    pub fn commit_matches(&self, document_id: i64, matches: &[PageMatch], next: Stage) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM pages WHERE document_id = ?",
            params![document_id],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(anyhow!(
                "document {document_id} already has {existing} page records"
            ));
        }
        {
            let mut insert = tx.prepare(
                "INSERT INTO pages (document_id, page_number, section) VALUES (?, ?, ?)",
            )?;
            for m in matches {
                insert.execute(params![document_id, m.page_number, m.section])?;
            }
        }
        tx.execute(
            "UPDATE documents SET stage = ? WHERE id = ?",
            params![next.as_str(), document_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// All page records of a document, ascending by page number.
    pub fn pages(&self, document_id: i64) -> Result<Vec<PageRecord>> {
        self.query_pages(
            &format!(
                "SELECT {PAGE_COLUMNS} FROM pages WHERE document_id = ? ORDER BY page_number"
            ),
            document_id,
        )
    }

    /// Page records with a usable content region, ascending by page number.
    pub fn region_pages(&self, document_id: i64) -> Result<Vec<PageRecord>> {
        self.query_pages(
            &format!(
                "SELECT {PAGE_COLUMNS} FROM pages WHERE document_id = ? AND has_region = 1
                 ORDER BY page_number"
            ),
            document_id,
        )
    }

    fn query_pages(&self, sql: &str, document_id: i64) -> Result<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let pages = stmt
            .query_map(params![document_id], page_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pages)
    }

    /// Stores a detected region, or clears every region field when `None`.
    pub fn set_region(&self, page_id: i64, found: Option<(&Region, &Path)>) -> Result<()> {
        match found {
            Some((r, image_path)) => self.conn.execute(
                "UPDATE pages SET has_region = 1, x = ?, y = ?, width = ?, height = ?,
                 image_path = ? WHERE id = ?",
                params![
                    r.x,
                    r.y,
                    r.width,
                    r.height,
                    image_path.to_string_lossy(),
                    page_id
                ],
            )?,
            None => self.conn.execute(
                "UPDATE pages SET has_region = 0, x = NULL, y = NULL, width = NULL,
                 height = NULL, image_path = NULL WHERE id = ?",
                params![page_id],
            )?,
        };
        Ok(())
    }

    pub fn set_text(&self, page_id: i64, text: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE pages SET text = ? WHERE id = ?",
            params![text, page_id],
        )?;
        Ok(())
    }
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let stage: String = row.get(11)?;
    let stage = Stage::parse(&stage)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, e.into()))?;
    Ok(Document {
        id: row.get(0)?,
        content_hash: row.get(1)?,
        pdf_path: PathBuf::from(row.get::<_, String>(2)?),
        requester: row.get(3)?,
        metadata: PdfMetadata {
            title: row.get(4)?,
            subject: row.get(5)?,
            author: row.get(6)?,
            producer: row.get(7)?,
            creator: row.get(8)?,
        },
        has_outline: row.get(9)?,
        report_path: row.get::<_, Option<String>>(10)?.map(PathBuf::from),
        stage,
        created_at: row.get(12)?,
    })
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    let geometry: (Option<u32>, Option<u32>, Option<u32>, Option<u32>) =
        (row.get(6)?, row.get(7)?, row.get(8)?, row.get(9)?);
    let region = match geometry {
        (Some(x), Some(y), Some(width), Some(height)) => Some(Region {
            x,
            y,
            width,
            height,
        }),
        _ => None,
    };
    Ok(PageRecord {
        id: row.get(0)?,
        document_id: row.get(1)?,
        page_number: row.get(2)?,
        section: row.get(3)?,
        has_region: row.get(4)?,
        text: row.get(5)?,
        region,
        image_path: row.get::<_, Option<String>>(10)?.map(PathBuf::from),
    })
}
