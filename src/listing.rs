//! Monthly listing page URLs for the MMSDM archive

use std::fmt;
use thiserror::Error;

const LISTING_SUFFIX: &str = "MMSDM_Historical_Data_SQLLoader/P5MIN_ALL_DATA/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListingError {
    #[error("Month out of range: {0} (expected 1-12)")]
    InvalidMonth(u32),
}

/// A calendar month; ordering is chronological
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, ListingError> {
        if !(1..=12).contains(&month) {
            return Err(ListingError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Following month, rolling 12 over to January of the next year
    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Months since year 0, used for range arithmetic
    fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Closed range of months `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub start: YearMonth,
    pub end: YearMonth,
}

impl MonthRange {
    pub fn new(start: YearMonth, end: YearMonth) -> Self {
        Self { start, end }
    }

    pub fn single(month: YearMonth) -> Self {
        Self::new(month, month)
    }

    /// Number of months covered; zero when `start > end`
    pub fn len(&self) -> usize {
        usize::try_from(self.end.ordinal() - self.start.ordinal() + 1).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> MonthIter {
        MonthIter {
            next: self.start,
            end: self.end,
        }
    }
}

impl IntoIterator for MonthRange {
    type Item = YearMonth;
    type IntoIter = MonthIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for MonthRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

pub struct MonthIter {
    next: YearMonth,
    end: YearMonth,
}

impl Iterator for MonthIter {
    type Item = YearMonth;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.end {
            return None;
        }
        let current = self.next;
        self.next = current.succ();
        Some(current)
    }
}

/// Listing page for one month under `archive_root`
///
/// `archive_root` is used as given; a missing trailing slash is added.
pub fn listing_url(archive_root: &str, month: YearMonth) -> String {
    let root = archive_root.trim_end_matches('/');
    format!(
        "{root}/{year}/MMSDM_{year}_{month:02}/{LISTING_SUFFIX}",
        year = month.year(),
        month = month.month(),
    )
}

/// One listing URL per month in the range, in chronological order
pub fn generate_urls(archive_root: &str, range: MonthRange) -> Vec<String> {
    range
        .iter()
        .map(|month| listing_url(archive_root, month))
        .collect()
}
