//! Batch input files: `.csv` or a spreadsheet with `company_name` and
//! `directive` columns.

use std::io::Read;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use tracing::debug;

use bizintel_shared::{BatchEntry, BizIntelError, Result};

const COMPANY_COLUMN: &str = "company_name";
const DIRECTIVE_COLUMN: &str = "directive";

/// Read a batch file, choosing the decoder by extension.
pub fn parse_batch_file(path: &Path) -> Result<Vec<BatchEntry>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let entries = match ext.as_str() {
        "csv" => {
            let file = std::fs::File::open(path).map_err(|e| BizIntelError::io(path, e))?;
            parse_csv(file)?
        }
        "xlsx" | "xls" | "xlsm" | "ods" => parse_spreadsheet(path)?,
        other => {
            return Err(BizIntelError::validation(format!(
                "unsupported batch file type '{other}', expected .csv or .xlsx"
            )));
        }
    };

    debug!(path = %path.display(), entries = entries.len(), "batch file parsed");
    Ok(entries)
}

/// Parse CSV batch input from any reader.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<BatchEntry>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| BizIntelError::Input(format!("failed to read CSV header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();
    let columns = Columns::locate(&headers)?;

    let mut entries = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| BizIntelError::Input(format!("malformed CSV row: {e}")))?;
        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        if let Some(entry) = columns.entry(&cells) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

fn parse_spreadsheet(path: &Path) -> Result<Vec<BatchEntry>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| BizIntelError::Input(format!("unable to open {}: {e}", path.display())))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| BizIntelError::Input("workbook has no worksheets".into()))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| BizIntelError::Input(format!("unable to read worksheet '{sheet_name}': {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| BizIntelError::validation(missing_columns_message()))?
        .iter()
        .map(cell_to_string)
        .collect();
    let columns = Columns::locate(&headers)?;

    Ok(rows
        .filter_map(|row| {
            let cells: Vec<String> = row.iter().map(cell_to_string).collect();
            columns.entry(&cells)
        })
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // whole numbers come back as floats
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

fn missing_columns_message() -> String {
    format!("batch file must have '{COMPANY_COLUMN}' and '{DIRECTIVE_COLUMN}' columns")
}

/// Positions of the two mandatory columns.
struct Columns {
    company: usize,
    directive: usize,
}

impl Columns {
    fn locate(headers: &[String]) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        match (find(COMPANY_COLUMN), find(DIRECTIVE_COLUMN)) {
            (Some(company), Some(directive)) => Ok(Self { company, directive }),
            _ => Err(BizIntelError::validation(missing_columns_message())),
        }
    }

    /// Build an entry from one row; fully blank rows yield `None`.
    fn entry(&self, cells: &[String]) -> Option<BatchEntry> {
        if cells.iter().all(|c| c.trim().is_empty()) {
            return None;
        }
        let cell = |i: usize| cells.get(i).map(|c| c.trim()).unwrap_or_default();
        Some(BatchEntry::new(cell(self.company), cell(self.directive)))
    }
}
