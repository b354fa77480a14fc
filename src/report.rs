use crate::{
    config::Report,
    model::{Document, PageRecord},
    util::ensure_parent,
};
use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

const HEADER_ROW: u32 = 2;

/// Excel refuses longer cell strings.
pub const MAX_CELL_CHARS: usize = 32_767;

/// One line of the findings table. `page` is 1-indexed for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub text: String,
    pub page: u32,
    pub section: Option<String>,
}

/// Rows for every page with a content region, ascending by page.
pub fn report_rows(pages: &[PageRecord]) -> Vec<ReportRow> {
    let mut with_region: Vec<&PageRecord> = pages.iter().filter(|p| p.has_region).collect();
    with_region.sort_by_key(|p| p.page_number);
    with_region
        .into_iter()
        .map(|p| ReportRow {
            text: p.text.clone().unwrap_or_default(),
            page: p.page_number + 1,
            section: p.section.clone(),
        })
        .collect()
}

/// Writes the workbook: metadata on the first row, a header on the third,
/// then one row per finding.
pub fn build_report(cfg: &Report, doc: &Document, pages: &[PageRecord], dest: &Path) -> Result<usize> {
    let rows = report_rows(pages);

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    let meta = &doc.metadata;
    for (col, value) in [&meta.title, &meta.subject, &meta.author].into_iter().enumerate() {
        write_opt(sheet, 0, col as u16, value.as_deref())?;
    }

    let third_header = if doc.has_outline {
        &cfg.section_label
    } else {
        &cfg.missing_outline_label
    };
    sheet.write_string(HEADER_ROW, 0, &cfg.text_label)?;
    sheet.write_string(HEADER_ROW, 1, &cfg.page_label)?;
    sheet.write_string(HEADER_ROW, 2, third_header)?;

    for (i, row) in rows.iter().enumerate() {
        let r = HEADER_ROW + 1 + i as u32;
        sheet.write_string(r, 0, fit_cell(&row.text, r))?;
        sheet.write_number(r, 1, f64::from(row.page))?;
        write_opt(sheet, r, 2, row.section.as_deref())?;
    }

    ensure_parent(dest)?;
    workbook
        .save(dest)
        .with_context(|| format!("writing report: {}", dest.display()))?;
    Ok(rows.len())
}

fn write_opt(sheet: &mut Worksheet, row: u32, col: u16, value: Option<&str>) -> Result<()> {
    if let Some(v) = value {
        sheet.write_string(row, col, fit_cell(v, row))?;
    }
    Ok(())
}

/// Cuts `value` to [`MAX_CELL_CHARS`] characters.
fn fit_cell(value: &str, row: u32) -> &str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => {
            warn!(
                row,
                chars = value.chars().count(),
                "cell text longer than {MAX_CELL_CHARS} characters; truncating"
            );
            &value[..cut]
        }
        None => value,
    }
}
