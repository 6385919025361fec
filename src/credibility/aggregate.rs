// src/credibility/aggregate.rs
//! # Domain Aggregation
//! Groups labelled articles by registrable domain and derives per-domain
//! credibility. `aggregate` is a pure single pass over the input;
//! `CredibilityReport::add_article` patches an existing report in place
//! without re-scanning the dataset.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::credibility::domain::{extract_registrable_domain, is_sentinel};
use crate::credibility::rating::{ConfidenceModel, CredibilityRating};

/// Loosely typed label cell. `1` means real, `0` means fake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl LabelValue {
    /// `None` when the label is blank and the row cannot be counted.
    pub fn is_real(&self) -> Option<bool> {
        match self {
            LabelValue::Int(n) => Some(*n == 1),
            LabelValue::Float(f) => Some(*f == 1.0),
            LabelValue::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    return None;
                }
                if let Ok(n) = t.parse::<i64>() {
                    return Some(n == 1);
                }
                // float-formatted exports write `1.0` / `0.0`
                if let Ok(f) = t.parse::<f64>() {
                    return Some(f == 1.0);
                }
                Some(matches!(
                    t.to_ascii_lowercase().as_str(),
                    "real" | "true" | "yes" | "1"
                ))
            }
            // Any other shape counts as fake.
            LabelValue::Bool(_) => Some(false),
        }
    }
}

/// One parsed dataset row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub source_url: Option<String>,
    pub label: Option<LabelValue>,
}

/// Running counts for one domain. Invariant: `real_articles <= total_articles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainStat {
    pub domain: String,
    pub total_articles: u64,
    pub real_articles: u64,
}

impl DomainStat {
    fn new(domain: String) -> Self {
        Self {
            domain,
            total_articles: 0,
            real_articles: 0,
        }
    }

    fn record(&mut self, is_real: bool) {
        self.total_articles += 1;
        if is_real {
            self.real_articles += 1;
        }
    }
}

/// Derived, read-only view of a domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainCredibility {
    pub domain: String,
    pub total_articles: u64,
    pub real_articles: u64,
    pub real_percentage: f64,
    pub confidence_score: f64,
    pub credibility_rating: CredibilityRating,
    /// Display form of `credibility_rating`, e.g. `Very High`.
    pub rating_label: &'static str,
}

impl DomainCredibility {
    pub fn from_stat(stat: &DomainStat, model: &ConfidenceModel) -> Self {
        let scored = model.score(stat.total_articles, stat.real_articles);
        Self {
            domain: stat.domain.clone(),
            total_articles: stat.total_articles,
            real_articles: stat.real_articles,
            real_percentage: scored.real_percentage,
            confidence_score: scored.confidence_score,
            credibility_rating: scored.rating,
            rating_label: scored.rating.label(),
        }
    }

    fn record(&mut self, is_real: bool, model: &ConfidenceModel) {
        let mut stat = DomainStat {
            domain: std::mem::take(&mut self.domain),
            total_articles: self.total_articles,
            real_articles: self.real_articles,
        };
        stat.record(is_real);
        *self = Self::from_stat(&stat, model);
    }
}

/// Knobs for a run. `filter_additions` decides whether `add_article` hides
/// domains below `min_articles` the way the batch pass does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregationPolicy {
    #[serde(default = "default_min_articles")]
    pub min_articles: u64,
    #[serde(default)]
    pub filter_additions: bool,
    #[serde(default)]
    pub confidence: ConfidenceModel,
}

fn default_min_articles() -> u64 {
    2
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            min_articles: default_min_articles(),
            filter_additions: false,
            confidence: ConfidenceModel::Step,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Domain,
    TotalArticles,
    RealArticles,
    RealPercentage,
    ConfidenceScore,
    CredibilityRating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Output of an aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredibilityReport {
    pub real_news: u64,
    pub fake_news: u64,
    pub total_articles: u64,
    pub domains: Vec<DomainCredibility>,
    /// Domains seen but below the display threshold; kept so additions never lose counts.
    #[serde(skip)]
    held_back: BTreeMap<String, DomainStat>,
    #[serde(skip)]
    policy: AggregationPolicy,
}

/// Single pass over `records`. Does not touch its input.
pub fn aggregate(records: &[ArticleRecord], policy: &AggregationPolicy) -> CredibilityReport {
    let mut real_news = 0u64;
    let mut fake_news = 0u64;
    let mut stats: BTreeMap<String, DomainStat> = BTreeMap::new();

    for (row, rec) in records.iter().enumerate() {
        let Some(is_real) = rec.label.as_ref().and_then(LabelValue::is_real) else {
            warn!(target: "credibility", row, "skipping row without usable label");
            counter!("credibility_rows_skipped_total", "reason" => "label").increment(1);
            continue;
        };
        if is_real {
            real_news += 1;
        } else {
            fake_news += 1;
        }

        let Some(url) = rec.source_url.as_deref() else {
            counter!("credibility_rows_skipped_total", "reason" => "url").increment(1);
            continue;
        };
        let domain = extract_registrable_domain(Some(url));
        if is_sentinel(&domain) {
            warn!(target: "credibility", row, %domain, "skipping row with unusable url");
            counter!("credibility_rows_skipped_total", "reason" => "url").increment(1);
            continue;
        }

        stats
            .entry(domain.clone())
            .or_insert_with(|| DomainStat::new(domain))
            .record(is_real);
    }

    let mut domains = Vec::new();
    let mut held_back = BTreeMap::new();
    for (name, stat) in stats {
        if stat.total_articles >= policy.min_articles {
            domains.push(DomainCredibility::from_stat(&stat, &policy.confidence));
        } else {
            held_back.insert(name, stat);
        }
    }

    let mut report = CredibilityReport {
        real_news,
        fake_news,
        total_articles: real_news + fake_news,
        domains,
        held_back,
        policy: *policy,
    };
    report.sort_by(SortKey::RealPercentage, SortOrder::Desc);
    report
}

impl CredibilityReport {
    /// Empty report under the given policy.
    pub fn empty(policy: AggregationPolicy) -> Self {
        Self {
            real_news: 0,
            fake_news: 0,
            total_articles: 0,
            domains: Vec::new(),
            held_back: BTreeMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &AggregationPolicy {
        &self.policy
    }

    /// Visible entry for an exact registrable domain.
    pub fn domain(&self, name: &str) -> Option<&DomainCredibility> {
        self.domains.iter().find(|d| d.domain == name)
    }

    /// Count one new article. Updates global counts and the owning domain only.
    ///
    /// Returns the domain's updated entry, whether or not it is visible, or
    /// `None` when the link does not yield a usable domain.
    pub fn add_article(&mut self, url: &str, is_real: bool) -> Option<DomainCredibility> {
        self.total_articles += 1;
        if is_real {
            self.real_news += 1;
        } else {
            self.fake_news += 1;
        }

        let domain = extract_registrable_domain(Some(url));
        if is_sentinel(&domain) {
            warn!(target: "credibility", %domain, "added article has unusable url");
            return None;
        }

        let model = self.policy.confidence;
        if let Some(entry) = self.domains.iter_mut().find(|d| d.domain == domain) {
            entry.record(is_real, &model);
            return Some(entry.clone());
        }

        let stat = self
            .held_back
            .entry(domain.clone())
            .or_insert_with(|| DomainStat::new(domain.clone()));
        stat.record(is_real);
        let entry = DomainCredibility::from_stat(stat, &model);

        if !self.policy.filter_additions || stat.total_articles >= self.policy.min_articles {
            self.held_back.remove(&domain);
            self.domains.push(entry.clone());
        }
        Some(entry)
    }

    /// Stable sort of the visible domains; ties fall back to the domain name.
    pub fn sort_by(&mut self, key: SortKey, order: SortOrder) {
        self.domains.sort_by(|a, b| {
            let primary = match key {
                SortKey::Domain => a.domain.cmp(&b.domain),
                SortKey::TotalArticles => a.total_articles.cmp(&b.total_articles),
                SortKey::RealArticles => a.real_articles.cmp(&b.real_articles),
                SortKey::RealPercentage => a.real_percentage.total_cmp(&b.real_percentage),
                SortKey::ConfidenceScore => a.confidence_score.total_cmp(&b.confidence_score),
                SortKey::CredibilityRating => a.credibility_rating.cmp(&b.credibility_rating),
            };
            let primary = match order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            if primary == Ordering::Equal {
                a.domain.cmp(&b.domain)
            } else {
                primary
            }
        });
    }
}
