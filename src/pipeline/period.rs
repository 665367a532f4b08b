use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{PayslipError, Result};
use crate::hr_api::PayslipRecord;

/// A single pay period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(PayslipError::Validation(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        validate_year(year)?;
        Ok(Self { year, month })
    }

    fn of(record: &PayslipRecord) -> Self {
        Self {
            year: record.year,
            month: record.month,
        }
    }
}

/// Rendered as `month/year`, e.g. `3/2024`.
impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.month, self.year)
    }
}

fn validate_year(year: i32) -> Result<()> {
    if (1900..=9999).contains(&year) {
        Ok(())
    } else {
        Err(PayslipError::Validation(format!(
            "year must be a four-digit year, got {year}"
        )))
    }
}

/// Which payslips a run collects for each collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PeriodSelection {
    /// The first record matching the month wins.
    Monthly { year: i32, month: u32 },
    /// Every record of the year, at most one per month.
    Yearly { year: i32 },
}

impl PeriodSelection {
    pub fn monthly(year: i32, month: u32) -> Result<Self> {
        let period = Period::new(year, month)?;
        Ok(Self::Monthly {
            year: period.year,
            month: period.month,
        })
    }

    pub fn yearly(year: i32) -> Result<Self> {
        validate_year(year)?;
        Ok(Self::Yearly { year })
    }

    pub fn year(&self) -> i32 {
        match self {
            Self::Monthly { year, .. } | Self::Yearly { year } => *year,
        }
    }

    /// Picks the records to download, preserving list order.
    ///
    /// Duplicate periods resolve to the first record in the list.
    pub fn select<'a>(&self, records: &'a [PayslipRecord]) -> Vec<&'a PayslipRecord> {
        match *self {
            Self::Monthly { year, month } => records
                .iter()
                .find(|r| r.year == year && r.month == month)
                .into_iter()
                .collect(),
            Self::Yearly { year } => {
                let mut seen = BTreeSet::new();
                records
                    .iter()
                    .filter(|r| r.year == year && seen.insert(r.month))
                    .collect()
            }
        }
    }

    /// Archive and report file stem, e.g. `2024_04` or `2024`.
    pub fn label(&self) -> String {
        match self {
            Self::Monthly { year, month } => format!("{year}_{month:02}"),
            Self::Yearly { year } => year.to_string(),
        }
    }
}

impl fmt::Display for PeriodSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monthly { year, month } => write!(f, "{month}/{year}"),
            Self::Yearly { year } => write!(f, "year {year}"),
        }
    }
}

/// Periods present in a collaborator's record list, in list order.
pub fn available_periods(records: &[PayslipRecord]) -> Vec<String> {
    records.iter().map(|r| Period::of(r).to_string()).collect()
}
