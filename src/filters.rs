// src/filters.rs
//! Filter state for the history view and its URL form.

use crate::error::QueryError;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub const PAGE_KEY: &str = "page";
pub const FROM_KEY: &str = "from";
pub const TO_KEY: &str = "to";
pub const PRESET_KEY: &str = "preset";

const DEFAULT_PAGE: &str = "1";

/// Quick date ranges offered next to the date inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DatePreset {
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
}

impl DatePreset {
    pub const ALL: [DatePreset; 3] = [
        DatePreset::Last7Days,
        DatePreset::Last30Days,
        DatePreset::Last90Days,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DatePreset::Last7Days => "7d",
            DatePreset::Last30Days => "30d",
            DatePreset::Last90Days => "90d",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DatePreset::Last7Days => "Last 7 days",
            DatePreset::Last30Days => "Last 30 days",
            DatePreset::Last90Days => "Last 90 days",
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            DatePreset::Last7Days => 7,
            DatePreset::Last30Days => 30,
            DatePreset::Last90Days => 90,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

/// Mapping from filter id to value, plus the reserved `page` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterState {
    values: BTreeMap<String, String>,
}

impl Default for FilterState {
    fn default() -> Self {
        let mut values = BTreeMap::new();
        values.insert(PAGE_KEY.to_string(), DEFAULT_PAGE.to_string());
        Self { values }
    }
}

impl FilterState {
    /// Seed the state from URL query parameters. Unknown keys are kept.
    pub fn from_query<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut state = Self::default();
        for (key, value) in params {
            state.values.insert(key.into(), value.into());
        }
        state
    }

    /// Non-empty value of a filter.
    pub fn get(&self, id: &str) -> Option<&str> {
        self.values
            .get(id)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Current 1-based page; anything unparsable or below 1 reads as 1.
    pub fn page(&self) -> u32 {
        self.get(PAGE_KEY)
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }

    /// Change a filter. Any change other than `page` sends the view back to
    /// page 1, and editing a date by hand drops the active preset.
    pub fn set(&mut self, id: &str, value: impl Into<String>) {
        let value = value.into();
        if id == PAGE_KEY {
            self.values.insert(PAGE_KEY.to_string(), value);
            return;
        }
        self.values.insert(id.to_string(), value);
        self.values.insert(PAGE_KEY.to_string(), DEFAULT_PAGE.to_string());
        if id == FROM_KEY || id == TO_KEY {
            self.values.remove(PRESET_KEY);
        }
    }

    pub fn set_page(&mut self, page: u32) {
        self.set(PAGE_KEY, page.max(1).to_string());
    }

    pub fn apply_preset(&mut self, preset: DatePreset, today: NaiveDate) {
        let from = today - Duration::days(preset.days());
        self.values
            .insert(FROM_KEY.to_string(), from.format("%Y-%m-%d").to_string());
        self.values
            .insert(TO_KEY.to_string(), today.format("%Y-%m-%d").to_string());
        self.values
            .insert(PAGE_KEY.to_string(), DEFAULT_PAGE.to_string());
        self.values
            .insert(PRESET_KEY.to_string(), preset.key().to_string());
    }

    pub fn active_preset(&self) -> Option<DatePreset> {
        self.get(PRESET_KEY).and_then(DatePreset::from_key)
    }

    /// Date bounds for the ranking query. Only `from` and `to` take part in
    /// ranking; the other filters live in the URL and the form only.
    pub fn date_range(&self) -> Result<DateRange, QueryError> {
        let from = self
            .get(FROM_KEY)
            .map(|raw| parse_day(FROM_KEY, raw).map(DateRange::start_of_day))
            .transpose()?;
        let to = self
            .get(TO_KEY)
            .map(|raw| parse_day(TO_KEY, raw).map(DateRange::end_of_day))
            .transpose()?;
        Ok(DateRange { from, to })
    }

    /// URL query string holding only non-default, non-empty values.
    pub fn to_query_string(&self) -> String {
        self.values
            .iter()
            .filter(|(key, value)| {
                !value.is_empty() && !(key.as_str() == PAGE_KEY && value.as_str() == DEFAULT_PAGE)
            })
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn parse_day(field: &str, raw: &str) -> Result<NaiveDate, QueryError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| QueryError::new(format!("Invalid '{}' date: {}", field, raw)))
}

/// Inclusive timestamp bounds, both optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
        day.and_time(NaiveTime::MIN).and_utc()
    }

    /// 23:59:59.999 so that the whole day is included.
    pub fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
        Self::start_of_day(day) + Duration::days(1) - Duration::milliseconds(1)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| ts >= from) && self.to.map_or(true, |to| ts <= to)
    }
}
