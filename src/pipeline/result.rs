use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::archive::ArchiveItem;
use crate::hr_api::{Collaborator, Company};

use super::period::PeriodSelection;

/// One extracted payslip page held in memory.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedPayslip {
    pub collaborator_id: String,
    pub collaborator_name: String,
    pub file_name: String,
    pub month: u32,
    pub size_bytes: usize,
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl ExtractedPayslip {
    pub fn to_archive_item(&self) -> ArchiveItem {
        ArchiveItem {
            file_name: self.file_name.clone(),
            content: self.content.clone(),
        }
    }
}

/// Collaborator with at least one record for the selected period(s).
#[derive(Debug, Clone, Serialize)]
pub struct MatchedCollaborator {
    pub id: String,
    pub name: String,
    /// `month/year` of every matched record.
    pub periods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UnmatchedReason {
    NoPayslips,
    NoPayslipForPeriod,
    ListingFailed(String),
}

impl fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPayslips => f.write_str("no payslips available"),
            Self::NoPayslipForPeriod => f.write_str("no payslip for target period"),
            Self::ListingFailed(detail) => write!(f, "payslip listing failed: {detail}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnmatchedCollaborator {
    pub id: String,
    pub name: String,
    pub reason: UnmatchedReason,
    /// Periods that do exist for this collaborator, e.g. `3/2024`.
    pub available_periods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    Download(String),
    MalformedDocument(String),
    PageUnavailable { page_count: usize },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download(detail) => write!(f, "download failed: {detail}"),
            Self::MalformedDocument(detail) => write!(f, "malformed PDF: {detail}"),
            Self::PageUnavailable { page_count } => {
                write!(f, "page unavailable (document has {page_count} page(s))")
            }
        }
    }
}

/// A matched record that could not be turned into an extracted page.
#[derive(Debug, Clone, Serialize)]
pub struct PayslipFailure {
    pub collaborator_id: String,
    pub collaborator_name: String,
    pub period: String,
    pub reason: FailureReason,
}

/// Extracted pages of one collaborator, keyed by month.
#[derive(Debug, Clone, Serialize)]
pub struct CollaboratorPayslips {
    pub name: String,
    pub months: BTreeMap<u32, ExtractedPayslip>,
}

/// Terminal output of one collection run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub company: Company,
    pub selection: PeriodSelection,
    pub collected_at: DateTime<Utc>,
    pub collaborators: Vec<Collaborator>,
    pub with_match: Vec<MatchedCollaborator>,
    pub without_match: Vec<UnmatchedCollaborator>,
    pub failures: Vec<PayslipFailure>,
    /// Keyed by collaborator id, in processing order.
    pub payslips: IndexMap<String, CollaboratorPayslips>,
    /// `None` when nothing was extracted.
    #[serde(skip)]
    pub archive: Option<Vec<u8>>,
}

/// Aggregate counters, mostly for yearly runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub total_collaborators: usize,
    pub collaborators_with_payslips: usize,
    pub total_payslips: usize,
    pub months_covered: BTreeSet<u32>,
}

impl RunResult {
    pub fn stats(&self) -> RunStats {
        RunStats {
            total_collaborators: self.collaborators.len(),
            collaborators_with_payslips: self
                .payslips
                .values()
                .filter(|p| !p.months.is_empty())
                .count(),
            total_payslips: self.payslips.values().map(|p| p.months.len()).sum(),
            months_covered: self
                .payslips
                .values()
                .flat_map(|p| p.months.keys().copied())
                .collect(),
        }
    }

    /// Flat archive input, one item per extracted page.
    ///
    /// Keys are `{collaborator id}/{month}`; entry paths come from the file names.
    pub fn flat_items(&self) -> IndexMap<String, ArchiveItem> {
        self.payslips
            .iter()
            .flat_map(|(id, p)| {
                p.months
                    .iter()
                    .map(move |(month, payslip)| (format!("{id}/{month}"), payslip.to_archive_item()))
            })
            .collect()
    }

    /// Grouped archive input: collaborator name to month to item.
    ///
    /// Collaborators sharing a display name get their id appended so their
    /// folders stay separate.
    pub fn grouped_items(&self) -> IndexMap<String, BTreeMap<u32, ArchiveItem>> {
        let mut name_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for payslips in self.payslips.values() {
            *name_counts.entry(payslips.name.as_str()).or_default() += 1;
        }

        self.payslips
            .iter()
            .map(|(id, payslips)| {
                let folder = if name_counts[payslips.name.as_str()] > 1 {
                    format!("{} {id}", payslips.name)
                } else {
                    payslips.name.clone()
                };
                let months = payslips
                    .months
                    .iter()
                    .map(|(month, payslip)| (*month, payslip.to_archive_item()))
                    .collect();
                (folder, months)
            })
            .collect()
    }
}
