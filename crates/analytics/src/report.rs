//! Aggregates over the stored usage log.

use crate::UsagePattern;
use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    pub value: String,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HourCount {
    /// Hour of day, UTC.
    pub hour: u32,
    pub count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub total_interactions: usize,
    pub unique_sessions: usize,
    /// Top five interaction types; ties keep first-seen order.
    pub most_common_interactions: Vec<TypeCount>,
    /// Mean of each session's latest `sessionTime`, in milliseconds.
    pub average_session_duration: f64,
    /// Top three hours; ties go to the earlier hour.
    pub peak_usage_hours: Vec<HourCount>,
}

pub fn usage_report(patterns: &[UsagePattern]) -> UsageReport {
    let unique_sessions = patterns
        .iter()
        .map(|p| p.session_id.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    UsageReport {
        total_interactions: patterns.len(),
        unique_sessions,
        most_common_interactions: most_common_types(patterns, 5),
        average_session_duration: average_session_duration(patterns),
        peak_usage_hours: peak_hours(patterns, 3),
    }
}

fn most_common_types(patterns: &[UsagePattern], limit: usize) -> Vec<TypeCount> {
    let mut counts: Vec<TypeCount> = Vec::new();
    for p in patterns {
        match counts.iter_mut().find(|c| c.value == p.kind) {
            Some(c) => c.count += 1,
            None => counts.push(TypeCount {
                value: p.kind.clone(),
                count: 1,
            }),
        }
    }
    // stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}

fn average_session_duration(patterns: &[UsagePattern]) -> f64 {
    let mut longest: BTreeMap<&str, i64> = BTreeMap::new();
    for p in patterns {
        let slot = longest.entry(p.session_id.as_str()).or_insert(0);
        *slot = (*slot).max(p.session_time);
    }
    if longest.is_empty() {
        return 0.0;
    }
    longest.values().map(|v| *v as f64).sum::<f64>() / longest.len() as f64
}

fn peak_hours(patterns: &[UsagePattern], limit: usize) -> Vec<HourCount> {
    let mut by_hour: BTreeMap<u32, usize> = BTreeMap::new();
    for p in patterns {
        if let Some(at) = DateTime::<Utc>::from_timestamp_millis(p.timestamp) {
            *by_hour.entry(at.hour()).or_insert(0) += 1;
        }
    }
    let mut hours: Vec<HourCount> = by_hour
        .into_iter()
        .map(|(hour, count)| HourCount { hour, count })
        .collect();
    hours.sort_by(|a, b| b.count.cmp(&a.count));
    hours.truncate(limit);
    hours
}
