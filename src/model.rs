use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type TaskId = i64;

/// Tasks of a single day in insertion order. Display order is computed by
/// [`crate::projection::sort_for_display`], never stored.
pub type TaskList = Vec<TaskRecord>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: TaskId,
    #[serde(rename = "isDone")]
    pub is_done: bool,
    #[serde(rename = "taskText")]
    pub text: String,
    #[serde(rename = "isPrio")]
    pub is_priority: bool,
}

impl TaskRecord {
    pub fn new(id: TaskId, text: impl Into<String>) -> Self {
        TaskRecord {
            id,
            is_done: false,
            text: text.into(),
            is_priority: false,
        }
    }
}

/// Storage key of one calendar day.
///
/// Renders as `<year>_<month>_<day>` without zero padding; that shape is the
/// durable key format of existing stores. The constructor does not validate
/// the day against the month length, callers do that against
/// [`crate::calendar::days_in_month`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DateParseError {
    #[error("invalid date (use YYYY-MM-DD): {0}")]
    InvalidFormat(String),
}

impl DateKey {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        DateKey { year, month, day }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        DateKey::new(date.year(), date.month(), date.day())
    }

    pub fn to_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.year, self.month, self.day)
    }
}

impl FromStr for DateKey {
    type Err = DateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(DateKey::from_date)
            .map_err(|_| DateParseError::InvalidFormat(raw.to_string()))
    }
}
