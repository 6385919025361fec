// src/credibility/mod.rs
//! Domain credibility: dataset loading, domain extraction, aggregation and rating.

pub mod aggregate;
pub mod dataset;
pub mod domain;
pub mod rating;

use std::io::Read;
use std::path::Path;

use tracing::info;

pub use crate::credibility::aggregate::{
    aggregate, AggregationPolicy, ArticleRecord, CredibilityReport, DomainCredibility, DomainStat,
    LabelValue, SortKey, SortOrder,
};
pub use crate::credibility::dataset::{ColumnAliases, DatasetError};
pub use crate::credibility::domain::{extract_registrable_domain, INVALID_URL, UNKNOWN_DOMAIN};
pub use crate::credibility::rating::{ConfidenceModel, CredibilityRating};

/// Parse CSV from a reader and aggregate it in one go.
pub fn report_from_reader<R: Read>(
    reader: R,
    aliases: &ColumnAliases,
    policy: &AggregationPolicy,
) -> Result<CredibilityReport, DatasetError> {
    let records = dataset::parse_csv(reader, aliases)?;
    Ok(build_report(&records, policy))
}

/// Load a CSV dataset from disk and aggregate it.
pub fn report_from_path(
    path: &Path,
    aliases: &ColumnAliases,
    policy: &AggregationPolicy,
) -> Result<CredibilityReport, DatasetError> {
    let records = dataset::load_csv_from(path, aliases)?;
    Ok(build_report(&records, policy))
}

fn build_report(records: &[ArticleRecord], policy: &AggregationPolicy) -> CredibilityReport {
    let report = aggregate(records, policy);
    info!(
        target: "credibility",
        rows = records.len(),
        domains = report.domains.len(),
        total = report.total_articles,
        "credibility report built"
    );
    report
}
