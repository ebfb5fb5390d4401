//! Recipient list ingestion from tabular sources
//!
//! A recipient source is either an `.xlsx` workbook or a `.csv` file. The
//! first row is always a header; the first column of every following row is
//! treated as a destination address. Blank and short rows are skipped without
//! aborting the parse.

use calamine::{Reader, Xlsx, open_workbook};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
	#[error("Unsupported recipient source format: {0:?}")]
	UnsupportedFormat(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Spreadsheet error: {0}")]
	Spreadsheet(#[from] calamine::XlsxError),

	#[error("Spreadsheet has no worksheets")]
	EmptyWorkbook,

	#[error("CSV error: {0}")]
	Csv(#[from] csv::Error),
}

/// Recipient source format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
	/// Excel workbook
	Spreadsheet,
	/// Comma-separated values
	Delimited,
}

impl SourceFormat {
	/// Get file extensions for this format
	pub fn extensions(&self) -> &[&'static str] {
		match self {
			SourceFormat::Spreadsheet => &["xlsx"],
			SourceFormat::Delimited => &["csv"],
		}
	}

	/// Detect format from filename
	pub fn from_filename(filename: &str) -> Option<Self> {
		let ext = filename.split('.').next_back()?.to_lowercase();
		match ext.as_str() {
			"xlsx" => Some(SourceFormat::Spreadsheet),
			"csv" => Some(SourceFormat::Delimited),
			_ => None,
		}
	}

	/// Detect format from a path
	pub fn from_path(path: &Path) -> Option<Self> {
		Self::from_filename(path.file_name()?.to_str()?)
	}
}

/// Parse a recipient source file into an ordered list of addresses.
///
/// The format is resolved from the file extension before any content is read;
/// anything other than `.xlsx` or `.csv` fails with
/// [`SourceError::UnsupportedFormat`]. The header row is skipped, the first
/// cell of each remaining row is kept when non-empty, and duplicates are
/// preserved in source order.
///
/// # Examples
///
/// ```rust,no_run
/// use massmail::recipients;
/// use std::path::Path;
///
/// let addresses = recipients::parse(Path::new("recipients.csv"))?;
/// # Ok::<(), massmail::SourceError>(())
/// ```
pub fn parse(path: &Path) -> Result<Vec<String>, SourceError> {
	let format = SourceFormat::from_path(path).ok_or_else(|| {
		SourceError::UnsupportedFormat(path.to_string_lossy().into_owned())
	})?;

	match format {
		SourceFormat::Spreadsheet => parse_spreadsheet(path),
		SourceFormat::Delimited => parse_delimited(path),
	}
}

fn parse_spreadsheet(path: &Path) -> Result<Vec<String>, SourceError> {
	let mut workbook: Xlsx<_> = open_workbook(path)?;

	let sheet = workbook
		.sheet_names()
		.first()
		.cloned()
		.ok_or(SourceError::EmptyWorkbook)?;
	let range = workbook.worksheet_range(&sheet)?;

	let mut addresses = Vec::new();
	for row in range.rows().skip(1) {
		let Some(cell) = row.first() else {
			continue;
		};
		// Cells are not necessarily text; render whatever is there.
		let value = cell.to_string();
		let value = value.trim();
		if !value.is_empty() {
			addresses.push(value.to_string());
		}
	}

	Ok(addresses)
}

fn parse_delimited(path: &Path) -> Result<Vec<String>, SourceError> {
	let mut reader = csv::ReaderBuilder::new()
		.has_headers(true)
		.flexible(true)
		.from_path(path)?;

	let mut addresses = Vec::new();
	for record in reader.records() {
		// A row that cannot be decoded is skipped, not fatal.
		let Ok(record) = record else {
			continue;
		};
		let Some(field) = record.get(0) else {
			continue;
		};
		let field = field.trim();
		if !field.is_empty() {
			addresses.push(field.to_string());
		}
	}

	Ok(addresses)
}
