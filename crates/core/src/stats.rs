//! Shapes exchanged with the remote statistics service.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date restriction forwarded verbatim to the statistics service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DateFilter {
    #[default]
    AllTime,
    Day {
        date: NaiveDate,
    },
    Range {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
}

impl DateFilter {
    /// Query parameters for the statistics request, dates as `YYYY-MM-DD`.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            DateFilter::AllTime => Vec::new(),
            DateFilter::Day { date } => vec![("date", date.format("%Y-%m-%d").to_string())],
            DateFilter::Range {
                start_date,
                end_date,
            } => vec![
                ("start_date", start_date.format("%Y-%m-%d").to_string()),
                ("end_date", end_date.format("%Y-%m-%d").to_string()),
            ],
        }
    }
}

/// Raw per-step visit counts as returned by the statistics service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFunnelStats {
    #[serde(default)]
    pub step_counts: HashMap<String, u64>,
    #[serde(default)]
    pub daily_stats: Vec<serde_json::Value>,
    #[serde(default)]
    pub total_unique_visitors: u64,
}
