//! Calendar month keys
//!
//! Allocations on categories and budgets are keyed by month. On disk a month
//! key is the compact string `YYYYMM`; on screen it is `YYYY-MM` or
//! `January 2025`.

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A calendar month (field order gives chronological ordering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Create a month key, validating the month number
    pub fn new(year: i32, month: u32) -> Result<Self, MonthParseError> {
        if !(1..=12).contains(&month) {
            return Err(MonthParseError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    /// The month containing a date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month containing today (local time)
    pub fn current() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn next(&self) -> Self {
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

    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// First day of the month
    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Last day of the month (inclusive)
    pub fn end_date(&self) -> NaiveDate {
        self.next()
            .start_date()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::from_date(date) == *self
    }

    /// The storage key, e.g. `202501`
    pub fn key(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }

    /// Long display form, e.g. `January 2025`
    pub fn long_name(&self) -> String {
        format!("{} {}", MONTH_NAMES[(self.month - 1) as usize], self.year)
    }

    /// Parse an absolute month: `YYYYMM` or `YYYY-MM`
    pub fn parse(s: &str) -> Result<Self, MonthParseError> {
        let s = s.trim();
        let invalid = || MonthParseError::InvalidFormat(s.to_string());

        let (year, month) = if let Some((y, m)) = s.split_once('-') {
            (y, m)
        } else if s.len() == 6 && s.is_char_boundary(4) {
            s.split_at(4)
        } else {
            return Err(invalid());
        };

        if year.len() != 4 || !(1..=2).contains(&month.len()) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month)
    }

    /// Resolve user input relative to `today`
    ///
    /// Accepts everything [`MonthKey::parse`] does plus `current`, `this`,
    /// `next`, `last`/`prev` and month names (`jan`, `January`) meaning that
    /// month of the current year.
    pub fn resolve(s: &str, today: NaiveDate) -> Result<Self, MonthParseError> {
        let current = Self::from_date(today);
        let lower = s.trim().to_lowercase();

        match lower.as_str() {
            "current" | "this" | "now" => return Ok(current),
            "next" => return Ok(current.next()),
            "last" | "prev" | "previous" => return Ok(current.prev()),
            _ => {}
        }

        if lower.len() >= 3 {
            if let Some(idx) = MONTH_NAMES
                .iter()
                .position(|name| name.to_lowercase().starts_with(&lower))
            {
                return Self::new(current.year, idx as u32 + 1);
            }
        }

        Self::parse(s)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = MonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Error type for month parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonthParseError {
    #[error("Invalid month format: {0} (expected YYYY-MM or YYYYMM)")]
    InvalidFormat(String),
    #[error("Invalid month: {0}")]
    InvalidMonth(u32),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_bounds() {
        let feb = MonthKey::new(2024, 2).unwrap();
        assert_eq!(feb.start_date(), date(2024, 2, 1));
        assert_eq!(feb.end_date(), date(2024, 2, 29));
        assert!(feb.contains(date(2024, 2, 15)));
        assert!(!feb.contains(date(2024, 3, 1)));
    }

    #[test]
    fn test_navigation_wraps_years() {
        let dec = MonthKey::new(2024, 12).unwrap();
        assert_eq!(dec.next(), MonthKey::new(2025, 1).unwrap());
        assert_eq!(dec.next().prev(), dec);
    }

    #[test]
    fn test_parse_both_forms() {
        assert_eq!(MonthKey::parse("202501").unwrap(), MonthKey::new(2025, 1).unwrap());
        assert_eq!(MonthKey::parse("2025-1").unwrap(), MonthKey::new(2025, 1).unwrap());
        assert_eq!(
            MonthKey::parse("2025-13"),
            Err(MonthParseError::InvalidMonth(13))
        );
        assert!(MonthKey::parse("Jan 2025").is_err());
    }

    #[test]
    fn test_resolve_relative() {
        let today = date(2025, 1, 20);
        assert_eq!(MonthKey::resolve("current", today).unwrap().key(), "202501");
        assert_eq!(MonthKey::resolve("last", today).unwrap().key(), "202412");
        assert_eq!(MonthKey::resolve("next", today).unwrap().key(), "202502");
        assert_eq!(MonthKey::resolve("march", today).unwrap().key(), "202503");
        assert_eq!(MonthKey::resolve("2023-07", today).unwrap().key(), "202307");
    }

    #[test]
    fn test_display_forms() {
        let m = MonthKey::new(2025, 3).unwrap();
        assert_eq!(m.to_string(), "2025-03");
        assert_eq!(m.key(), "202503");
        assert_eq!(m.long_name(), "March 2025");
    }

    #[test]
    fn test_serializes_as_map_key() {
        let mut map = BTreeMap::new();
        map.insert(MonthKey::new(2025, 2).unwrap(), 1);
        map.insert(MonthKey::new(2024, 11).unwrap(), 2);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"202411":2,"202502":1}"#);

        let back: BTreeMap<MonthKey, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
