//! Table loader (CSV/TSV)

use std::path::Path;
use tracing::{debug, info, warn};

use super::dataset::{Dataset, is_missing_token};
use crate::types::{PilotError, Result};

/// Loader options
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Skip the descriptor row that follows the header
    pub skip_descriptor_row: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            skip_descriptor_row: true,
        }
    }
}

/// Field delimiter inferred from the file extension
fn delimiter_for(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("tsv") => b'\t',
        _ => b',',
    }
}

/// Load a dataset from disk.
///
/// The first row is the header. With `skip_descriptor_row` the next row is
/// discarded (it holds human-readable column descriptions).
pub fn load_dataset(path: &Path, options: LoadOptions) -> Result<Dataset> {
    if !path.exists() {
        return Err(PilotError::input(format!(
            "File '{}' not found",
            path.display()
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PilotError::input(format!("Could not read header row: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(PilotError::dataset(format!(
            "No column headers found in '{}'",
            file_label(path)
        )));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            PilotError::input(format!("Could not read '{}': {}", file_label(path), e))
        })?;

        if index == 0 && options.skip_descriptor_row {
            debug!("Skipping descriptor row");
            continue;
        }

        rows.push(
            record
                .iter()
                .map(|cell| (!is_missing_token(cell)).then(|| cell.trim().to_string()))
                .collect(),
        );
    }

    let dataset = Dataset::from_rows(headers, rows)?;

    if dataset.row_count() == 0 {
        warn!(
            "File '{}' has headers but no data rows",
            file_label(path)
        );
    }

    info!(
        "Loaded '{}': {} rows, {} columns",
        file_label(path),
        dataset.row_count(),
        dataset.columns().len()
    );
    debug!("Columns: {:?}", dataset.column_names());

    Ok(dataset)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
