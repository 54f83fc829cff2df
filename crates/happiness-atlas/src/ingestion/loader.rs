//! Turns CSV or JSON table files into raw rows

use std::path::Path;

use super::merger::SourceTable;
use crate::error::{Error, Result};
use crate::types::{RawRow, RawValue};

/// Supported table encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Delimited text with a header row
    Csv,
    /// JSON array of objects
    Json,
}

impl TableFormat {
    /// Pick a format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "csv" | "txt" => Ok(TableFormat::Csv),
            "json" => Ok(TableFormat::Json),
            other => Err(Error::UnsupportedFormat(format!(
                "{} (extension '{}')",
                path.display(),
                other
            ))),
        }
    }
}

/// Both input tables, loaded
#[derive(Debug, Clone, Default)]
pub struct LoadedTables {
    pub internet: Vec<RawRow>,
    pub happiness: Vec<RawRow>,
}

/// Parse CSV bytes; the first record is the header row
pub fn parse_csv(table: &str, data: &[u8]) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::table_parse(table, e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| Error::table_parse(table, e.to_string()))?;
        // A blank trailing line parses as a single empty field
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), RawValue::Text(v.to_string())))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// Parse a JSON array of objects
pub fn parse_json(table: &str, data: &[u8]) -> Result<Vec<RawRow>> {
    serde_json::from_slice(data).map_err(|e| Error::table_parse(table, e.to_string()))
}

/// Parse table bytes in the given format
pub fn parse_table(table: &str, format: TableFormat, data: &[u8]) -> Result<Vec<RawRow>> {
    match format {
        TableFormat::Csv => parse_csv(table, data),
        TableFormat::Json => parse_json(table, data),
    }
}

/// Read and parse one table file
pub async fn load_table(table: SourceTable, path: &Path) -> Result<Vec<RawRow>> {
    let format = TableFormat::from_path(path)?;
    let data = tokio::fs::read(path).await?;
    let rows = parse_table(&table.to_string(), format, &data)?;
    tracing::info!("Loaded {} {} rows from {}", rows.len(), table, path.display());
    Ok(rows)
}

/// Read both tables concurrently; returns only once both are loaded
pub async fn load_tables(internet: &Path, happiness: &Path) -> Result<LoadedTables> {
    let (internet, happiness) = tokio::try_join!(
        load_table(SourceTable::Internet, internet),
        load_table(SourceTable::Happiness, happiness),
    )?;
    Ok(LoadedTables { internet, happiness })
}
