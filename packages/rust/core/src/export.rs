//! Ranked report export.
//!
//! Results are ranked 1..N by prospect score (unknown = 0, ties keep input
//! order) and written with a fixed column set.

use std::io::Write;

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};
use serde::Serialize;

use bizintel_shared::{AnalysisRecord, BatchOutcome, BizIntelError, Result};
use bizintel_storage::StoredAnalysis;

pub const SHEET_NAME: &str = "Analysis Results";

pub const HEADERS: [&str; 10] = [
    "Rank",
    "Company",
    "Prospect Level",
    "Score",
    "Industry",
    "Location",
    "Employees",
    "Revenue",
    "Auditor Status",
    "Directive",
];

const MAX_COLUMN_WIDTH: usize = 50;

/// One row of the ranked report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub rank: usize,
    pub company: String,
    pub prospect_level: String,
    pub score: String,
    pub industry: String,
    pub location: String,
    pub employees: String,
    pub revenue: String,
    pub auditor_status: String,
    pub directive: String,
}

impl ReportRow {
    fn cells(&self) -> [String; 10] {
        [
            self.rank.to_string(),
            self.company.clone(),
            self.prospect_level.clone(),
            self.score.clone(),
            self.industry.clone(),
            self.location.clone(),
            self.employees.clone(),
            self.revenue.clone(),
            self.auditor_status.clone(),
            self.directive.clone(),
        ]
    }
}

fn rank<'a>(items: impl Iterator<Item = (&'a str, &'a str, &'a AnalysisRecord)>) -> Vec<ReportRow> {
    let mut items: Vec<_> = items.collect();
    items.sort_by(|a, b| b.2.ranking_score().cmp(&a.2.ranking_score()));
    items
        .into_iter()
        .enumerate()
        .map(|(i, (company, directive, record))| ReportRow {
            rank: i + 1,
            company: company.to_string(),
            prospect_level: record.prospect_level.to_string(),
            score: record.prospect_score.to_string(),
            industry: record.industry.to_string(),
            location: record.location.to_string(),
            employees: record.employees.to_string(),
            revenue: record.revenue.to_string(),
            auditor_status: record.auditor_status.to_string(),
            directive: directive.to_string(),
        })
        .collect()
}

/// Rank batch results.
pub fn ranked_rows(results: &[BatchOutcome]) -> Vec<ReportRow> {
    rank(
        results
            .iter()
            .map(|r| (r.company.as_str(), r.directive.as_str(), &r.record)),
    )
}

/// Rank previously persisted analyses.
pub fn rows_from_analyses(analyses: &[StoredAnalysis]) -> Vec<ReportRow> {
    rank(
        analyses
            .iter()
            .map(|a| (a.company_name.as_str(), a.directive.as_str(), &a.record)),
    )
}

/// Default report file name, e.g. `bi_analysis_20250301_142530.xlsx`.
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("bi_analysis_{}.xlsx", now.format("%Y%m%d_%H%M%S"))
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Render rows as an xlsx workbook.
pub fn write_xlsx(rows: &[ReportRow]) -> Result<Vec<u8>> {
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| BizIntelError::Export(e.to_string());

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME).map_err(xlsx_err)?;

    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x4472C4))
        .set_font_size(12)
        .set_align(FormatAlign::Center);
    let cell_format = Format::new().set_align(FormatAlign::Left);

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.chars().count()).collect();

    for (col, header) in HEADERS.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *header, &header_format)
            .map_err(xlsx_err)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let row_idx = (i + 1) as u32;
        for (col, value) in row.cells().iter().enumerate() {
            sheet
                .write_string_with_format(row_idx, col as u16, value, &cell_format)
                .map_err(xlsx_err)?;
            widths[col] = widths[col].max(value.chars().count());
        }
    }

    for (col, width) in widths.iter().enumerate() {
        let width = (width + 2).min(MAX_COLUMN_WIDTH);
        sheet
            .set_column_width(col as u16, width as f64)
            .map_err(xlsx_err)?;
    }

    workbook.save_to_buffer().map_err(xlsx_err)
}

/// Render rows as CSV with the same header.
pub fn write_csv<W: Write>(rows: &[ReportRow], writer: W) -> Result<()> {
    let csv_err = |e: csv::Error| BizIntelError::Export(e.to_string());

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADERS).map_err(csv_err)?;
    for row in rows {
        wtr.write_record(row.cells()).map_err(csv_err)?;
    }
    wtr.flush()
        .map_err(|e| BizIntelError::Export(format!("failed to flush CSV: {e}")))
}
