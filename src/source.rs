//! Source adapters: ordered row-chunk producers feeding the ingestion
//! pipeline.
//!
//! Every adapter yields a lazy, finite sequence of [`RowChunk`]s. The
//! sequence is not restartable mid-iteration; calling
//! [`RowSource::chunks`] again starts over from the beginning. Chunk 1
//! carries the inferred `type_mapping` used to build the table schema;
//! later chunks leave it unset and reuse the mapping from the first.

use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, open_workbook_auto};
use log::debug;

use crate::{
    data::{Cell, SemanticType},
    infer::infer_types,
    io_utils,
};

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xls", "xlsm"];
const DELIMITED_EXTENSIONS: &[&str] = &["csv", "tsv"];

/// A bounded batch of rows processed as one unit through inference and
/// insert. `columns` is shared across all chunks of a run and keeps the
/// source column order.
#[derive(Debug, Clone)]
pub struct RowChunk {
    pub number: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub type_mapping: Option<BTreeMap<String, SemanticType>>,
}

impl RowChunk {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Produces ordered chunks of rows. Implementations are finite and
/// single-pass per `chunks()` call.
pub trait RowSource {
    /// Human-readable description for logs and result reporting.
    fn describe(&self) -> String;

    /// Total row count used for progress percentages.
    fn total_rows(&self) -> Result<usize>;

    /// Starts a fresh pass over the source.
    fn chunks(&self, chunk_size: usize) -> Result<Box<dyn Iterator<Item = Result<RowChunk>>>>;
}

/// Turns an in-memory table into the chunked sequence shared by all
/// adapters: fixed-size windows in original row order, no empty trailing
/// window, inference attached to chunk 1 only.
pub(crate) fn windowed_chunks(
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    chunk_size: usize,
) -> Result<Box<dyn Iterator<Item = Result<RowChunk>>>> {
    if chunk_size == 0 {
        bail!("Chunk size must be positive");
    }
    let mut remaining = rows;
    let mut number = 0usize;
    Ok(Box::new(std::iter::from_fn(move || {
        if remaining.is_empty() {
            return None;
        }
        let take = chunk_size.min(remaining.len());
        let rest = remaining.split_off(take);
        let batch = std::mem::replace(&mut remaining, rest);
        number += 1;
        let type_mapping = (number == 1).then(|| infer_types(&columns, &batch));
        Some(Ok(RowChunk {
            number,
            columns: columns.clone(),
            rows: batch,
            type_mapping,
        }))
    })))
}

/// Reads a spreadsheet file (Excel workbooks through `calamine`,
/// delimited text through the `csv` reader) and streams it in fixed-size
/// row windows.
#[derive(Debug, Clone)]
pub struct SpreadsheetSource {
    path: PathBuf,
    sheet: Option<String>,
    encoding: Option<String>,
}

impl SpreadsheetSource {
    pub fn new(path: impl Into<PathBuf>, sheet: Option<String>) -> Self {
        Self {
            path: path.into(),
            sheet,
            encoding: None,
        }
    }

    pub fn with_encoding(mut self, encoding: Option<String>) -> Self {
        self.encoding = encoding;
        self
    }

    fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// Validates existence and extension before any data is read.
    pub fn validate(&self) -> Result<()> {
        if !self.path.exists() {
            bail!("File not found: {}", self.path.display());
        }
        let ext = self.extension();
        if !WORKBOOK_EXTENSIONS.contains(&ext.as_str())
            && !DELIMITED_EXTENSIONS.contains(&ext.as_str())
        {
            bail!(
                "Unsupported file type '.{ext}'. Supported: .xlsx, .xls, .xlsm, .csv, .tsv"
            );
        }
        Ok(())
    }

    /// Loads the target sheet fully into memory. Excel chunking requires a
    /// full read; the windows are sliced afterwards.
    fn load(&self) -> Result<(Vec<String>, Vec<Vec<Cell>>)> {
        self.validate()?;
        let ext = self.extension();
        let (columns, rows) = if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
            self.load_workbook()?
        } else {
            self.load_delimited()?
        };
        debug!(
            "Loaded {} row(s) x {} column(s) from {}",
            rows.len(),
            columns.len(),
            self.path.display()
        );
        Ok((columns, rows))
    }

    fn load_workbook(&self) -> Result<(Vec<String>, Vec<Vec<Cell>>)> {
        let mut workbook = open_workbook_auto(&self.path)
            .with_context(|| format!("Opening workbook {}", self.path.display()))?;
        let sheet_names = workbook.sheet_names();
        if sheet_names.is_empty() {
            bail!("No sheets found in {}", self.path.display());
        }
        let target = match &self.sheet {
            Some(name) => {
                if !sheet_names.iter().any(|s| s == name) {
                    bail!(
                        "Sheet '{name}' not found in {}; available: {}",
                        self.path.display(),
                        sheet_names.join(", ")
                    );
                }
                name.clone()
            }
            None => sheet_names[0].clone(),
        };

        let range = workbook
            .worksheet_range(&target)
            .with_context(|| format!("Reading sheet '{target}'"))?;
        let mut row_iter = range.rows();
        let headers = match row_iter.next() {
            Some(header_row) => header_row
                .iter()
                .enumerate()
                .map(|(idx, cell)| header_name(cell, idx))
                .collect::<Vec<_>>(),
            None => return Ok((Vec::new(), Vec::new())),
        };

        let mut rows = Vec::new();
        for raw in row_iter {
            let cells: Vec<Cell> = raw.iter().map(workbook_cell).collect();
            if cells.iter().all(Cell::is_null) {
                continue;
            }
            rows.push(cells);
        }
        Ok((headers, rows))
    }

    fn load_delimited(&self) -> Result<(Vec<String>, Vec<Vec<Cell>>)> {
        let delimiter = io_utils::resolve_input_delimiter(&self.path, None);
        let encoding = io_utils::resolve_encoding(self.encoding.as_deref())?;
        let mut reader = io_utils::open_csv_reader_from_path(&self.path, delimiter)?;
        let headers = io_utils::reader_headers(&mut reader, encoding)?;

        let mut rows = Vec::new();
        for (ordinal, result) in reader.into_byte_records().enumerate() {
            let record = result.with_context(|| format!("Reading row {}", ordinal + 2))?;
            let raw = io_utils::decode_record(&record, encoding)?;
            let cells: Vec<Cell> = raw.iter().map(|field| Cell::from_text(field)).collect();
            if cells.iter().all(Cell::is_null) {
                continue;
            }
            rows.push(cells);
        }
        Ok((headers, rows))
    }
}

impl RowSource for SpreadsheetSource {
    fn describe(&self) -> String {
        match &self.sheet {
            Some(sheet) => format!("{} (sheet '{sheet}')", self.path.display()),
            None => self.path.display().to_string(),
        }
    }

    fn total_rows(&self) -> Result<usize> {
        let (_, rows) = self.load()?;
        Ok(rows.len())
    }

    fn chunks(&self, chunk_size: usize) -> Result<Box<dyn Iterator<Item = Result<RowChunk>>>> {
        let (columns, rows) = self.load()?;
        windowed_chunks(columns, rows, chunk_size)
    }
}

fn header_name(cell: &Data, idx: usize) -> String {
    match cell {
        Data::Empty => format!("column_{}", idx + 1),
        other => {
            let text = other.to_string();
            if text.trim().is_empty() {
                format!("column_{}", idx + 1)
            } else {
                text.trim().to_string()
            }
        }
    }
}

fn workbook_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Null,
        Data::String(s) => Cell::from_text(s),
        Data::Int(i) => Cell::Integer(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                Cell::Integer(*f as i64)
            } else {
                Cell::Float(*f)
            }
        }
        Data::Bool(b) => Cell::Boolean(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(parsed) => Cell::Text(parsed.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Cell::Null,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from_text(s),
        Data::Error(_) => Cell::Null,
    }
}
