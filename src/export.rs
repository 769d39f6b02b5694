/*!
 * Export functionality for analytics views
 *
 * Views are serialized to a JSON value first, then written as a single JSON
 * document, as JSON Lines (one element of an array per line), or as CSV
 * (one row per array element, nested fields flattened with dotted names).
 */

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{ExportFormat, PracticeError, Result};

/// Trait for implementing view exporters
pub trait ViewExporter {
    /// Write a serialized view
    fn write_value(&self, value: &Value, writer: &mut dyn Write) -> Result<()>;

    /// Get the export format
    fn format(&self) -> ExportFormat;

    /// Write a serialized view to a file
    fn export(&self, value: &Value, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| PracticeError::from(e).with_path(path.to_path_buf()))?;
        let mut writer = BufWriter::new(file);
        self.write_value(value, &mut writer)?;
        writer.flush()?;
        log::info!("Wrote {} export to {}", self.format(), path.display());
        Ok(())
    }
}

/// JSON exporter
pub struct JsonExporter {
    /// Whether to pretty-print the JSON
    pub pretty_print: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self { pretty_print: true }
    }
}

impl JsonExporter {
    /// Create a new JSON exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pretty printing
    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }
}

impl ViewExporter for JsonExporter {
    fn write_value(&self, value: &Value, writer: &mut dyn Write) -> Result<()> {
        if self.pretty_print {
            serde_json::to_writer_pretty(&mut *writer, value)?;
        } else {
            serde_json::to_writer(&mut *writer, value)?;
        }
        writeln!(writer)?;
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }
}

/// JSON Lines exporter: one line per array element, or one line for an object
#[derive(Default)]
pub struct JsonLinesExporter;

impl ViewExporter for JsonLinesExporter {
    fn write_value(&self, value: &Value, writer: &mut dyn Write) -> Result<()> {
        for row in rows_of(value) {
            serde_json::to_writer(&mut *writer, row)?;
            writeln!(writer)?;
        }
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::JsonLines
    }
}

/// CSV exporter for series and listings
pub struct CsvExporter {
    /// Whether to include headers
    pub include_headers: bool,
    /// Field delimiter
    pub delimiter: u8,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self {
            include_headers: true,
            delimiter: b',',
        }
    }
}

impl CsvExporter {
    /// Create a new CSV exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to write a header row
    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }
}

impl ViewExporter for CsvExporter {
    fn write_value(&self, value: &Value, writer: &mut dyn Write) -> Result<()> {
        let rows: Vec<Vec<(String, String)>> = rows_of(value)
            .into_iter()
            .map(|row| {
                let mut cells = Vec::new();
                flatten_into("", row, &mut cells);
                cells
            })
            .collect();

        // Header is the union of flattened names in first-seen order
        let mut headers: Vec<String> = Vec::new();
        for row in &rows {
            for (name, _) in row {
                if !headers.contains(name) {
                    headers.push(name.clone());
                }
            }
        }

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(writer);

        if self.include_headers && !headers.is_empty() {
            csv_writer.write_record(&headers)?;
        }

        for row in &rows {
            let record: Vec<&str> = headers.iter()
                .map(|h| {
                    row.iter()
                        .find(|(name, _)| name == h)
                        .map(|(_, cell)| cell.as_str())
                        .unwrap_or("")
                })
                .collect();
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}

/// Array elements, or the value itself when it is not an array
fn rows_of(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Flatten nested objects into dotted column names; arrays stay JSON text
fn flatten_into(prefix: &str, value: &Value, cells: &mut Vec<(String, String)>) {
    let name = |key: &str| if prefix.is_empty() { key.to_string() } else { format!("{}.{}", prefix, key) };

    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                flatten_into(&name(key), inner, cells);
            }
        }
        Value::Null => cells.push((prefix.to_string(), String::new())),
        Value::String(s) => cells.push((prefix.to_string(), s.clone())),
        Value::Array(_) => cells.push((prefix.to_string(), value.to_string())),
        other => cells.push((prefix.to_string(), other.to_string())),
    }
}

/// Exporter for a format
pub fn exporter_for(format: ExportFormat, pretty: bool) -> Box<dyn ViewExporter> {
    match format {
        ExportFormat::Json => Box::new(JsonExporter::new().with_pretty_print(pretty)),
        ExportFormat::JsonLines => Box::new(JsonLinesExporter),
        ExportFormat::Csv => Box::new(CsvExporter::new()),
    }
}

/// Serialize a view into a JSON value
pub fn to_value<T: Serialize>(view: &T) -> Result<Value> {
    Ok(serde_json::to_value(view)?)
}

/// One field of a serialized view, e.g. `procedure_series` or `totals.revenue`
pub fn select_field<'v>(value: &'v Value, path: &str) -> Result<&'v Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| {
            current.get(segment).ok_or_else(|| PracticeError::Export {
                message: format!("View has no field '{}'", path),
                format: ExportFormat::Csv,
                suggestion: Some(format!("Available fields: {}", field_names(current))),
            })
        })
}

fn field_names(value: &Value) -> String {
    value.as_object()
        .map(Map::keys)
        .map(|keys| keys.cloned().collect::<Vec<_>>().join(", "))
        .unwrap_or_default()
}

/// Serialize a view and write it to a file
pub fn export_view<T: Serialize>(view: &T, path: &Path, format: ExportFormat) -> Result<()> {
    exporter_for(format, true).export(&to_value(view)?, path)
}
