//! Date phrase detection and normalization.
//!
//! Every relative phrase is resolved against an explicit `today`; nothing here
//! reads the clock.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use regex::Regex;
use rota_core::{Result, RotaError};

const MONTH: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";
const WEEKDAY: &str = r"((?:mon|tues|wednes|thurs|fri|satur|sun)day)";
const ORDINAL: &str = r"(?:st|nd|rd|th)?";

/// A date phrase found in free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    /// Byte offset where the phrase starts.
    pub start: usize,
    /// Byte offset one past the end of the phrase.
    pub end: usize,
    pub text: String,
}

/// Finds and resolves date phrases such as "April 1st", "next Monday" or
/// "2024-04-01".
#[derive(Debug, Clone)]
pub struct DateParser {
    phrase: Regex,
    weekday: Regex,
    in_days: Regex,
    month_first: Regex,
    day_first: Regex,
    numeric: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| RotaError::Internal(format!("invalid date pattern: {}", e)))
}

impl DateParser {
    pub fn new() -> Result<Self> {
        let phrase = format!(
            r"(?i)\b(?:\d{{4}}-\d{{2}}-\d{{2}}|day\s+after\s+tomorrow|today|tomorrow|(?:(?:next|this|coming)\s+)?{wd}|in\s+\d{{1,3}}\s+days?|{m}\.?\s+\d{{1,2}}{o}(?:,?\s+\d{{4}})?|\d{{1,2}}{o}\s+(?:of\s+)?{m}(?:,?\s+\d{{4}})?|\d{{1,2}}/\d{{1,2}}(?:/\d{{4}})?)\b",
            wd = WEEKDAY,
            m = MONTH,
            o = ORDINAL,
        );
        Ok(Self {
            phrase: compile(&phrase)?,
            weekday: compile(&format!(r"^(?:(next|this|coming)\s+)?{}$", WEEKDAY))?,
            in_days: compile(r"^in\s+(\d{1,3})\s+days?$")?,
            month_first: compile(&format!(r"^{}\.?\s+(\d{{1,2}}){}(?:,?\s+(\d{{4}}))?$", MONTH, ORDINAL))?,
            day_first: compile(&format!(r"^(\d{{1,2}}){}\s+(?:of\s+)?{}(?:,?\s+(\d{{4}}))?$", ORDINAL, MONTH))?,
            numeric: compile(r"^(\d{1,2})/(\d{1,2})(?:/(\d{4}))?$")?,
        })
    }

    /// Date phrases in `text`, left to right.
    pub fn find(&self, text: &str) -> Vec<DateMatch> {
        self.phrase
            .find_iter(text)
            .map(|m| DateMatch {
                start: m.start(),
                end: m.end(),
                text: m.as_str().to_string(),
            })
            .collect()
    }

    /// Resolve a single phrase relative to `today`.
    pub fn parse(&self, phrase: &str, today: NaiveDate) -> Option<NaiveDate> {
        let lowered = phrase.trim().to_lowercase();
        let normalized = lowered
            .strip_prefix("on ")
            .unwrap_or(&lowered)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let s = normalized.as_str();

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(date);
        }

        match s {
            "today" => return Some(today),
            "tomorrow" => return today.checked_add_days(Days::new(1)),
            "day after tomorrow" => return today.checked_add_days(Days::new(2)),
            _ => {}
        }

        if let Some(caps) = self.weekday.captures(s) {
            let target = weekday_from_name(&caps[2])?;
            let strictly_after = matches!(caps.get(1).map(|m| m.as_str()), Some("next" | "coming"));
            return Some(upcoming_weekday(today, target, strictly_after));
        }

        if let Some(caps) = self.in_days.captures(s) {
            let n: u64 = caps[1].parse().ok()?;
            return today.checked_add_days(Days::new(n));
        }

        if let Some(caps) = self.month_first.captures(s) {
            let month = month_from_name(&caps[1])?;
            let day: u32 = caps[2].parse().ok()?;
            let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
            return month_day(today, month, day, year);
        }

        if let Some(caps) = self.day_first.captures(s) {
            let day: u32 = caps[1].parse().ok()?;
            let month = month_from_name(&caps[2])?;
            let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
            return month_day(today, month, day, year);
        }

        if let Some(caps) = self.numeric.captures(s) {
            let month: u32 = caps[1].parse().ok()?;
            let day: u32 = caps[2].parse().ok()?;
            let year = caps.get(3).and_then(|y| y.as_str().parse().ok());
            return month_day(today, month, day, year);
        }

        None
    }
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name.get(..3)? {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Next `target` on or after `today` (strictly after when `strictly_after`).
fn upcoming_weekday(today: NaiveDate, target: Weekday, strictly_after: bool) -> NaiveDate {
    let current = today.weekday().num_days_from_monday();
    let wanted = target.num_days_from_monday();
    let mut ahead = (wanted + 7 - current) % 7;
    if ahead == 0 && strictly_after {
        ahead = 7;
    }
    today + chrono::Duration::days(i64::from(ahead))
}

/// Explicit year wins; otherwise the first occurrence on or after `today`.
fn month_day(today: NaiveDate, month: u32, day: u32, year: Option<i32>) -> Option<NaiveDate> {
    if let Some(year) = year {
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    (today.year()..=today.year() + 4)
        .filter_map(|y| NaiveDate::from_ymd_opt(y, month, day))
        .find(|d| *d >= today)
}
