// src/credibility/dataset.rs
//! CSV dataset loading with header aliases.
//!
//! Structural problems (no header, required column missing, no rows) abort
//! the load with a [`DatasetError`]. Row-level problems are skipped with a
//! warning.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use crate::credibility::aggregate::{ArticleRecord, LabelValue};

pub const URL_COLUMN_ALIASES: [&str; 6] = ["News Url", "News_Url", "url", "URL", "link", "Link"];
pub const LABEL_COLUMN_ALIASES: [&str; 6] = ["Class", "class", "label", "Label", "is_real", "is_fake"];
/// Label columns whose truthy value means *fake*.
pub const INVERTED_LABEL_COLUMNS: [&str; 1] = ["is_fake"];

/// Accepted header names, tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAliases {
    pub url: Vec<String>,
    pub label: Vec<String>,
    pub inverted_label: Vec<String>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            url: URL_COLUMN_ALIASES.iter().map(|s| s.to_string()).collect(),
            label: LABEL_COLUMN_ALIASES.iter().map(|s| s.to_string()).collect(),
            inverted_label: INVERTED_LABEL_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A required column that could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingColumn {
    pub role: &'static str,
    pub accepted: Vec<String>,
}

impl std::fmt::Display for MissingColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no {} column found (accepted names: {})",
            self.role,
            self.accepted.join(", ")
        )
    }
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset is empty")]
    Empty,
    #[error("{}", join_missing(.0))]
    MissingColumns(Vec<MissingColumn>),
    #[error("could not parse dataset: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not open dataset: {0}")]
    Io(#[from] std::io::Error),
}

fn join_missing(missing: &[MissingColumn]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse CSV text from any reader.
pub fn parse_csv<R: Read>(
    reader: R,
    aliases: &ColumnAliases,
) -> Result<Vec<ArticleRecord>, DatasetError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(DatasetError::Empty);
    }

    let url_col = find_column(&headers, &aliases.url);
    let label_col = find_column(&headers, &aliases.label);

    let mut missing = Vec::new();
    if url_col.is_none() {
        missing.push(MissingColumn {
            role: "URL",
            accepted: aliases.url.clone(),
        });
    }
    if label_col.is_none() {
        missing.push(MissingColumn {
            role: "label",
            accepted: aliases.label.clone(),
        });
    }
    let (Some((url_idx, url_name)), Some((label_idx, label_name))) = (url_col, label_col) else {
        return Err(DatasetError::MissingColumns(missing));
    };
    let inverted = aliases.inverted_label.iter().any(|n| n == label_name);
    debug!(target: "credibility", url_name, label_name, inverted, "dataset columns resolved");

    let mut out = Vec::new();
    for (i, row) in rdr.records().enumerate() {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "credibility", row = i + 1, error = %e, "skipping unparseable row");
                continue;
            }
        };

        let source_url = row
            .get(url_idx)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let label = row
            .get(label_idx)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| LabelValue::Text(s.to_string()));
        let label = match (label, inverted) {
            (Some(l), true) => l.is_real().map(|real| LabelValue::Int(i64::from(!real))),
            (l, _) => l,
        };

        out.push(ArticleRecord { source_url, label });
    }

    if out.is_empty() {
        return Err(DatasetError::Empty);
    }
    Ok(out)
}

fn find_column<'a>(headers: &csv::StringRecord, names: &'a [String]) -> Option<(usize, &'a str)> {
    names
        .iter()
        .find_map(|n| headers.iter().position(|h| h == n).map(|i| (i, n.as_str())))
}

/// Parse a CSV file from disk.
pub fn load_csv_from(path: &Path, aliases: &ColumnAliases) -> Result<Vec<ArticleRecord>, DatasetError> {
    let file = File::open(path)?;
    parse_csv(file, aliases)
}
