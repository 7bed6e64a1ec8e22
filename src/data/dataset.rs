//! In-memory dataset: named, ordered columns of optional cells.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::constants::stats::MISSING_TOKENS;
use crate::types::{PilotError, Result};

/// Inferred column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl ColumnKind {
    /// Numeric when every non-missing cell parses as a finite number.
    /// A column with no values at all counts as numeric.
    pub fn classify<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let all_numeric = cells
            .into_iter()
            .flatten()
            .all(|cell| parse_number(cell).is_some());

        if all_numeric {
            Self::Numeric
        } else {
            Self::Categorical
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "numeric"),
            Self::Categorical => write!(f, "categorical"),
        }
    }
}

/// Whether a raw cell represents a missing value
pub fn is_missing_token(raw: &str) -> bool {
    let trimmed = raw.trim();
    MISSING_TOKENS
        .iter()
        .any(|token| trimmed.eq_ignore_ascii_case(token))
}

/// Parse a cell as a finite number
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    cells: Vec<Option<String>>,
    kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Option<String>>) -> Self {
        let kind = ColumnKind::classify(cells.iter().map(|c| c.as_deref()));
        Self {
            name: name.into(),
            cells,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnKind::Numeric
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, row: usize) -> Option<&str> {
        self.cells.get(row).and_then(|c| c.as_deref())
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    /// Non-missing cells in row order
    pub fn present(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().filter_map(|c| c.as_deref())
    }

    /// Parsed values per row; `None` for missing cells or non-numeric columns
    pub fn numeric_cells(&self) -> Vec<Option<f64>> {
        if !self.is_numeric() {
            return vec![None; self.cells.len()];
        }
        self.cells
            .iter()
            .map(|c| c.as_deref().and_then(parse_number))
            .collect()
    }

    /// Non-missing numeric values; empty for categorical columns
    pub fn numeric_values(&self) -> Vec<f64> {
        self.numeric_cells().into_iter().flatten().collect()
    }

    /// Cell as a group label. Numeric cells are canonicalised, so `1` and
    /// `1.0` name the same group.
    pub fn label(&self, row: usize) -> Option<String> {
        let cell = self.cell(row)?;
        if self.is_numeric()
            && let Some(value) = parse_number(cell)
        {
            return Some(value.to_string());
        }
        Some(cell.to_string())
    }

    /// Non-missing labels in row order
    pub fn labels(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.cells.len()).filter_map(|row| self.label(row))
    }

    /// Distinct non-missing labels in order of first appearance
    pub fn distinct(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.labels()
            .filter(|label| seen.insert(label.clone()))
            .collect()
    }
}

/// Loaded table for one workflow run
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Build a dataset from a header row and data rows.
    ///
    /// Header names are trimmed; blank names become `Unnamed: <index>` and
    /// repeated names get a `.N` suffix. Short rows are padded with missing
    /// cells, long rows are truncated.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        if headers.is_empty() {
            return Err(PilotError::dataset("the file has no columns"));
        }

        let names = normalize_headers(headers);
        let row_count = rows.len();
        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(row_count); names.len()];

        for row in rows {
            let mut row = row.into_iter();
            for column in cells.iter_mut() {
                column.push(row.next().flatten());
            }
        }

        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, cells)| Column::new(name, cells))
            .collect();

        Ok(Self { columns, row_count })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

fn normalize_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let trimmed = raw.trim().trim_start_matches('\u{feff}').trim();
            let base = if trimmed.is_empty() {
                format!("Unnamed: {}", index)
            } else {
                trimmed.to_string()
            };

            let mut name = base.clone();
            let mut suffix = 1;
            while !seen.insert(name.clone()) {
                name = format!("{}.{}", base, suffix);
                suffix += 1;
            }
            name
        })
        .collect()
}
