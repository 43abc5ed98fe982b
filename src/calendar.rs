//! Month and year arithmetic for the calendar grid. Months are 1-based.

use chrono::{Datelike, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Back,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

pub fn shift_month(year: i32, month: u32, step: Step) -> (i32, u32) {
    match (step, month) {
        (Step::Back, 1) => (year.saturating_sub(1), 12),
        (Step::Back, m) => (year, m - 1),
        (Step::Forward, 12) => (year.saturating_add(1), 1),
        (Step::Forward, m) => (year, m + 1),
    }
}

pub fn shift_year(year: i32, step: Step) -> i32 {
    match step {
        Step::Back => year.saturating_sub(1),
        Step::Forward => year.saturating_add(1),
    }
}

/// Local date as `(year, month, day)`.
pub fn today() -> (i32, u32, u32) {
    let now = Local::now().date_naive();
    (now.year(), now.month(), now.day())
}

/// Number of blank cells before day 1 in a grid whose first column is
/// `week_start`.
pub fn first_weekday_offset(year: i32, month: u32, week_start: WeekStart) -> u32 {
    let first = match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(date) => date.weekday(),
        None => return 0,
    };
    match week_start {
        WeekStart::Monday => first.num_days_from_monday(),
        WeekStart::Sunday => first.num_days_from_sunday(),
    }
}

pub fn weekday_headings(week_start: WeekStart) -> [&'static str; 7] {
    let mut day = match week_start {
        WeekStart::Monday => Weekday::Mon,
        WeekStart::Sunday => Weekday::Sun,
    };
    let mut headings = [""; 7];
    for heading in headings.iter_mut() {
        *heading = match day {
            Weekday::Mon => "Mo",
            Weekday::Tue => "Tu",
            Weekday::Wed => "We",
            Weekday::Thu => "Th",
            Weekday::Fri => "Fr",
            Weekday::Sat => "Sa",
            Weekday::Sun => "Su",
        };
        day = day.succ();
    }
    headings
}

pub fn month_name(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
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
    month
        .checked_sub(1)
        .and_then(|idx| NAMES.get(idx as usize))
        .copied()
        .unwrap_or("?")
}
