//! Readers for the supported database sources.
//!
//! - XML: a root whose `<equipment>` children are records (nested
//!   `<equipment>` elements are sub-entries), or a single `<equipment>` root
//! - delimited text: `.csv` (comma) or `.txt`/`.tsv` (tab), one implicit sheet
//! - workbooks: `.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`
//!
//! Spreadsheet rows start with a header row naming the attributes.

use super::encoding::{self, SourceEncoding};
use super::DatabaseError;
use crate::record::{ConnectionField, ConnectionRecord, EquipmentField, EquipmentRecord};
use crate::xml::{self, XmlElement};
use calamine::{open_workbook_auto, Data, DataType, Reader};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A database file named by the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    /// File to read
    pub path: PathBuf,
    /// Workbook sheet to read
    pub sheet: Option<String>,
}

impl SourceSpec {
    /// A source read without a sheet name
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Xml,
    Delimited(u8),
    Workbook,
}

fn source_kind(path: &Path) -> Option<SourceKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "xml" => Some(SourceKind::Xml),
        "csv" => Some(SourceKind::Delimited(b',')),
        "txt" | "tsv" => Some(SourceKind::Delimited(b'\t')),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(SourceKind::Workbook),
        _ => None,
    }
}

/// Read every record of one source.
///
/// Names in `user_defined` are accepted into each record's user-defined
/// mapping; any other unknown column or element is an attribute error.
pub fn read_source(
    spec: &SourceSpec,
    user_defined: &[String],
) -> Result<Vec<EquipmentRecord>, DatabaseError> {
    let path = &spec.path;
    let path_text = path.display().to_string();
    if !path.is_file() {
        return Err(DatabaseError::SourceNotFound(path_text));
    }
    let kind = source_kind(path).ok_or_else(|| DatabaseError::UnsupportedSource(path_text.clone()))?;

    let records = match kind {
        SourceKind::Xml => read_xml(path, user_defined),
        SourceKind::Delimited(delimiter) => read_delimited(path, delimiter, user_defined),
        SourceKind::Workbook => read_workbook(path, spec.sheet.as_deref(), user_defined),
    }
    .map_err(|e| e.in_source(path_text.clone()))?;

    debug!("Read {} records from {}", records.len(), path_text);
    Ok(records)
}

fn read_text(path: &Path) -> Result<String, DatabaseError> {
    let bytes = fs::read(path)?;
    let (text, encoding) = encoding::decode(&bytes);
    if encoding == SourceEncoding::Windows1252 {
        debug!("{} is not UTF-8, decoded as Windows-1252", path.display());
    }
    Ok(text.into_owned())
}

fn read_xml(path: &Path, user_defined: &[String]) -> Result<Vec<EquipmentRecord>, DatabaseError> {
    let text = read_text(path)?;
    let root = xml::parse_document(&text)?;
    let mut records = Vec::new();
    if root.name == "equipment" {
        collect_equipment(&root, user_defined, &mut records)?;
    } else {
        for child in &root.children {
            if child.name == "equipment" {
                collect_equipment(child, user_defined, &mut records)?;
            } else {
                debug!("Ignoring <{}> in {}", child.name, path.display());
            }
        }
    }
    Ok(records)
}

fn collect_equipment(
    element: &XmlElement,
    user_defined: &[String],
    records: &mut Vec<EquipmentRecord>,
) -> Result<(), DatabaseError> {
    records.push(EquipmentRecord::from_element(element, user_defined)?);
    for child in element.children_named("equipment") {
        collect_equipment(child, user_defined, records)?;
    }
    Ok(())
}

fn read_delimited(
    path: &Path,
    delimiter: u8,
    user_defined: &[String],
) -> Result<Vec<EquipmentRecord>, DatabaseError> {
    let text = read_text(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let spreadsheet_error = |e: csv::Error| DatabaseError::Spreadsheet {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let header: Vec<String> = reader
        .headers()
        .map_err(spreadsheet_error)?
        .iter()
        .map(normalize_header)
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(spreadsheet_error)?;
        let cells: Vec<String> = row.iter().map(str::to_string).collect();
        if let Some(record) = record_from_row(&header, &cells, user_defined)? {
            records.push(record);
        }
    }
    Ok(records)
}

fn read_workbook(
    path: &Path,
    sheet: Option<&str>,
    user_defined: &[String],
) -> Result<Vec<EquipmentRecord>, DatabaseError> {
    let path_text = path.display().to_string();
    let mut workbook = open_workbook_auto(path).map_err(|e| DatabaseError::Spreadsheet {
        path: path_text.clone(),
        message: e.to_string(),
    })?;

    let names = workbook.sheet_names();
    let name = match sheet {
        Some(sheet) => {
            if !names.iter().any(|n| n == sheet) {
                return Err(DatabaseError::Sheet {
                    path: path_text,
                    message: format!(
                        "there is no Sheet named '{}', the Sheets are {:?}",
                        sheet, names
                    ),
                });
            }
            sheet.to_string()
        }
        None => match names.as_slice() {
            [only] => only.clone(),
            [] => {
                return Err(DatabaseError::Sheet {
                    path: path_text,
                    message: "the workbook contains no Sheets".to_string(),
                })
            }
            _ => {
                return Err(DatabaseError::Sheet {
                    path: path_text,
                    message: format!(
                        "the workbook contains {} Sheets {:?}, specify which one to read \
                         with the sheet attribute of <path>",
                        names.len(),
                        names
                    ),
                })
            }
        },
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| DatabaseError::Spreadsheet {
            path: path_text.clone(),
            message: e.to_string(),
        })?;

    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(|c| normalize_header(&cell_text(c))).collect(),
        None => return Ok(Vec::new()),
    };

    let mut records = Vec::new();
    for cells in rows {
        let cells: Vec<String> = cells.iter().map(cell_text).collect();
        if let Some(record) = record_from_row(&header, &cells, user_defined)? {
            records.push(record);
        }
    }
    Ok(records)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // whole numbers (serials, asset numbers) are stored as floats
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_date() {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => cell.to_string(),
        },
        Data::Error(e) => {
            warn!("Spreadsheet cell error {:?} read as empty", e);
            String::new()
        }
        other => other.to_string(),
    }
}

/// `Date Calibrated` -> `date_calibrated`
fn normalize_header(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Connection columns a spreadsheet row may carry
fn is_connection_column(name: &str) -> bool {
    matches!(
        ConnectionField::from_name(name),
        Some(
            ConnectionField::Address
                | ConnectionField::Backend
                | ConnectionField::Interface
                | ConnectionField::Properties
        )
    )
}

/// Build a record from one spreadsheet row; blank rows give `None`
fn record_from_row(
    header: &[String],
    cells: &[String],
    user_defined: &[String],
) -> Result<Option<EquipmentRecord>, DatabaseError> {
    if cells.iter().all(|c| c.trim().is_empty()) {
        return Ok(None);
    }

    let mut fields: Vec<(&str, &str)> = Vec::new();
    let mut connection_fields: Vec<(&str, &str)> = Vec::new();
    let mut extras: Vec<(&str, &str)> = Vec::new();

    for (name, value) in header.iter().zip(cells.iter()) {
        let (name, value) = (name.as_str(), value.as_str());
        if name.is_empty() {
            if !value.trim().is_empty() {
                return Err(DatabaseError::UnknownAttribute {
                    record: "EquipmentRecord",
                    name: format!("(unnamed column with value '{}')", value.trim()),
                });
            }
            continue;
        }
        if is_connection_column(name) {
            connection_fields.push((name, value));
        } else if matches!(
            EquipmentField::from_name(name),
            Some(EquipmentField::Connection | EquipmentField::UserDefined)
        ) {
            return Err(DatabaseError::invalid_value(name, "cannot be a spreadsheet column"));
        } else if EquipmentField::from_name(name).is_some() {
            fields.push((name, value));
        } else if user_defined.iter().any(|u| u == name) {
            extras.push((name, value));
        } else {
            return Err(DatabaseError::UnknownAttribute {
                record: "EquipmentRecord",
                name: name.to_string(),
            });
        }
    }

    let mut record = EquipmentRecord::from_fields(fields)?;
    let has_connection = connection_fields.iter().any(|(name, value)| {
        (*name == ConnectionField::Address.name() || *name == ConnectionField::Backend.name())
            && !value.trim().is_empty()
    });
    if has_connection {
        record = record.with_connection(ConnectionRecord::from_fields(connection_fields)?);
    }
    for (name, value) in extras {
        if !value.trim().is_empty() {
            record = record.with_user_defined(name, value.trim());
        }
    }
    Ok(Some(record))
}
