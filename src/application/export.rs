//! Export of extracted records to shareable files.
//!
//! Every export goes through a [`RecordTable`]: a title, column names and
//! rows of JSON primitives, built either from a homogeneous record slice or
//! from a browsed page.

use std::fs;
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};
use serde_json::Value;

use crate::domain::{AppError, Page, Record, Result};

/// Column width used for every worksheet column.
const XLSX_COLUMN_WIDTH: f64 = 20.0;

/// Characters Excel does not allow in sheet names.
const SHEET_NAME_FORBIDDEN: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Export file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma separated text with a header row.
    #[default]
    Csv,
    /// Excel workbook.
    Xlsx,
    /// Printable HTML table, the input of a print-to-PDF engine.
    Html,
}

impl ExportFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Html => "html",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" | "excel" => Ok(Self::Xlsx),
            "html" => Ok(Self::Html),
            _ => Err(format!("Unknown export format: {s}. Use: csv, xlsx, html")),
        }
    }
}

/// Tabular data ready to be written in any format.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTable {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RecordTable {
    /// Builds a table from records of one kind; columns follow field
    /// declaration order.
    ///
    /// # Errors
    /// Returns error if a record cannot be serialized.
    pub fn from_records<T: Record>(records: &[T]) -> Result<Self> {
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let value = serde_json::to_value(record).map_err(AppError::json_parse)?;
            rows.push(
                T::COLUMNS
                    .iter()
                    .map(|col| value.get(*col).cloned().unwrap_or(Value::Null))
                    .collect(),
            );
        }

        Ok(Self {
            title: T::KIND.to_string(),
            columns: T::COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            rows,
        })
    }

    /// Builds a table from the rows of one page.
    #[must_use]
    pub fn from_page(page: &Page) -> Self {
        let columns = if page.columns.is_empty() {
            page.rows
                .first()
                .map(|row| row.keys().cloned().collect())
                .unwrap_or_default()
        } else {
            page.columns.clone()
        };

        let rows = page
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|col| row.get(col).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self {
            title: page.table.clone(),
            columns,
            rows,
        }
    }
}

/// Writes one table to `path` in `format`.
///
/// # Errors
/// Returns `Io` or `Export` errors unmodified from the writers.
pub fn write_table(table: &RecordTable, format: ExportFormat, path: &Path) -> Result<()> {
    match format {
        ExportFormat::Csv => write_text(path, &to_csv_string(table)?)?,
        ExportFormat::Html => write_text(path, &to_html_string(table))?,
        ExportFormat::Xlsx => write_workbook(std::slice::from_ref(table), path)?,
    }

    tracing::info!(
        path = %path.display(),
        rows = table.rows.len(),
        "Exported {}",
        table.title
    );
    Ok(())
}

/// Writes several tables into one workbook, one sheet per table.
///
/// # Errors
/// Returns `Export` if the workbook cannot be built or saved.
pub fn write_workbook(tables: &[RecordTable], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    for table in tables {
        let sheet = workbook.add_worksheet();
        sheet
            .set_name(sheet_name(&table.title))
            .map_err(|e| AppError::export("Invalid sheet name", e))?;

        for (col, name) in table.columns.iter().enumerate() {
            let col = xlsx_col(col)?;
            sheet
                .write_string_with_format(0, col, name, &header)
                .map_err(|e| AppError::export("Failed to write header", e))?;
            sheet
                .set_column_width(col, XLSX_COLUMN_WIDTH)
                .map_err(|e| AppError::export("Failed to set column width", e))?;
        }

        for (r, row) in table.rows.iter().enumerate() {
            let r = u32::try_from(r + 1).map_err(|_| AppError::Export {
                message: format!("{} has too many rows for a worksheet", table.title),
                source: None,
            })?;
            for (c, value) in row.iter().enumerate() {
                let c = xlsx_col(c)?;
                let written = match value {
                    Value::Null => continue,
                    Value::Number(n) => match n.as_f64() {
                        Some(f) => sheet.write_number(r, c, f),
                        None => sheet.write_string(r, c, n.to_string()),
                    },
                    other => sheet.write_string(r, c, cell_text(other)),
                };
                written.map_err(|e| AppError::export("Failed to write cell", e))?;
            }
        }
    }

    create_parent(path)?;
    workbook
        .save(path)
        .map_err(|e| AppError::export(format!("Failed to save {}", path.display()), e))?;

    Ok(())
}

/// Renders a table as CSV text.
///
/// # Errors
/// Returns `Export` if the CSV writer fails.
pub fn to_csv_string(table: &RecordTable) -> Result<String> {
    let mut buf = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer
            .write_record(&table.columns)
            .map_err(|e| AppError::export("Failed to write CSV header", e))?;
        for row in &table.rows {
            writer
                .write_record(row.iter().map(cell_text))
                .map_err(|e| AppError::export("Failed to write CSV row", e))?;
        }
        writer
            .flush()
            .map_err(|e| AppError::io("Failed to flush CSV", e))?;
    }

    String::from_utf8(buf).map_err(|e| AppError::export("CSV is not valid UTF-8", e))
}

/// Renders a table as a standalone HTML document.
#[must_use]
pub fn to_html_string(table: &RecordTable) -> String {
    let title = escape_html(&table.title);
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>Zalo Data - {title}</title>\n</head>\n<body>\n"));
    out.push_str(&format!("<h2>Zalo Data - {title}</h2>\n"));
    out.push_str("<table border=\"1\" cellspacing=\"0\" cellpadding=\"3\">\n<tr>");
    for col in &table.columns {
        out.push_str(&format!("<th>{}</th>", escape_html(col)));
    }
    out.push_str("</tr>\n");

    for row in &table.rows {
        out.push_str("<tr>");
        for value in row {
            out.push_str(&format!("<td>{}</td>", escape_html(&cell_text(value))));
        }
        out.push_str("</tr>\n");
    }

    out.push_str("</table>\n</body>\n</html>\n");
    out
}

/// Text of one cell; NULL is empty.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Excel sheet names: at most 31 characters, no `[]:*?/\`.
fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if SHEET_NAME_FORBIDDEN.contains(&c) { '_' } else { c })
        .take(31)
        .collect();

    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

fn xlsx_col(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| AppError::Export {
        message: "too many columns for a worksheet".into(),
        source: None,
    })
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| AppError::io(format!("Failed to create {}", parent.display()), e)),
        _ => Ok(()),
    }
}

fn write_text(path: &Path, content: &str) -> Result<()> {
    create_parent(path)?;
    fs::write(path, content)
        .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))
}
