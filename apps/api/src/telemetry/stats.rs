//! Stats derived from a user's notification history.
//!
//! Every figure uses the effective zone (`user_zone` if set, else `ai_zone`).
//! "Noise" is anything not routed to `instant`.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::notification::Notification;
use crate::telemetry::heatmap::{compute_heatmap, HeatmapSlot};

/// Reading speed for a full read of a noise message.
const FULL_READ_WPM: f64 = 200.0;
/// Glance cost applied to every message, noise or not.
const GLANCE_WPM: f64 = 1000.0;
const FOCUS_FLOOR: f64 = 40.0;
const TOP_NOISE_SOURCES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatsRange {
    #[serde(rename = "24H")]
    Last24Hours,
    #[default]
    #[serde(rename = "7D")]
    Last7Days,
    #[serde(rename = "ALL")]
    AllTime,
}

impl StatsRange {
    /// Lower bound on `created_at`, if the range has one.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            StatsRange::Last24Hours => Some(now - Duration::hours(24)),
            StatsRange::Last7Days => Some(now - Duration::days(7)),
            StatsRange::AllTime => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartBucket {
    pub label: String,
    pub start: DateTime<Utc>,
    pub focus_count: usize,
    pub noise_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseSource {
    pub source: String,
    pub count: usize,
    /// Share of all noise, not of all notifications.
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub range: StatsRange,
    pub total_notifications: usize,
    pub instant_count: usize,
    pub noise_count: usize,
    pub corrections_count: u64,
    pub accuracy: u32,
    pub time_saved_hours: f64,
    pub focus_score: u32,
    pub chart: Vec<ChartBucket>,
    pub noise_sources: Vec<NoiseSource>,
    pub heatmap: Vec<HeatmapSlot>,
}

/// Share of notifications the classifier got right, as a percentage.
/// 100 when there is nothing to judge.
pub fn accuracy(total_notifications: usize, corrections: u64) -> u32 {
    if total_notifications == 0 {
        return 100;
    }
    let ratio = (1.0 - corrections as f64 / total_notifications as f64).max(0.0);
    (ratio * 100.0).round().clamp(0.0, 100.0) as u32
}

pub fn focus_score(total: usize, noise: usize) -> u32 {
    let noise_percentage = if total == 0 {
        0.0
    } else {
        noise as f64 / total as f64 * 100.0
    };
    (100.0 - noise_percentage * 0.5)
        .clamp(FOCUS_FLOOR, 100.0)
        .round() as u32
}

/// Reading time spared by not fully reading noise, net of glancing at
/// everything. Hours, one decimal, never negative.
pub fn time_saved_hours(total_words: usize, noise_words: usize) -> f64 {
    let minutes = noise_words as f64 / FULL_READ_WPM - total_words as f64 / GLANCE_WPM;
    let hours = (minutes / 60.0).max(0.0);
    (hours * 10.0).round() / 10.0
}

fn count_bucket(
    notifications: &[Notification],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> (usize, usize) {
    notifications
        .iter()
        .filter(|n| n.created_at >= start && n.created_at < end)
        .fold((0, 0), |(focus, noise), n| {
            if n.effective_zone().is_noise() {
                (focus, noise + 1)
            } else {
                (focus + 1, noise)
            }
        })
}

/// Twelve 2-hour buckets over the last day for `24H`; otherwise the last
/// seven UTC days ending today.
pub fn compute_chart(
    notifications: &[Notification],
    range: StatsRange,
    now: DateTime<Utc>,
) -> Vec<ChartBucket> {
    let (first_start, width, count, label_format) = match range {
        StatsRange::Last24Hours => (now - Duration::hours(24), Duration::hours(2), 12, "%H:%M"),
        StatsRange::Last7Days | StatsRange::AllTime => {
            let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
            (today - Duration::days(6), Duration::days(1), 7, "%a")
        }
    };

    (0..count)
        .map(|i| {
            let start = first_start + width * i;
            let end = start + width;
            // The last 2-hour bucket ends exactly at `now`; include it.
            let end = if range == StatsRange::Last24Hours && i == count - 1 {
                end + Duration::microseconds(1)
            } else {
                end
            };
            let (focus_count, noise_count) = count_bucket(notifications, start, end);
            ChartBucket {
                label: start.format(label_format).to_string(),
                start,
                focus_count,
                noise_count,
            }
        })
        .collect()
}

pub fn compute_noise_sources(notifications: &[Notification]) -> Vec<NoiseSource> {
    let mut by_source: HashMap<&str, usize> = HashMap::new();
    let mut noise_total = 0usize;
    for n in notifications.iter().filter(|n| n.effective_zone().is_noise()) {
        *by_source.entry(n.source.as_str()).or_default() += 1;
        noise_total += 1;
    }

    let mut sources: Vec<_> = by_source.into_iter().collect();
    sources.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    sources
        .into_iter()
        .take(TOP_NOISE_SOURCES)
        .map(|(source, count)| NoiseSource {
            source: source.to_string(),
            count,
            percentage: (count as f64 / noise_total as f64 * 100.0).round() as u32,
        })
        .collect()
}

/// Computes every stat for `range`.
///
/// `in_range` must already be limited to the range; `last_day` holds at least
/// the last 24 hours of history and feeds the heatmap.
pub fn compute_stats(
    in_range: &[Notification],
    last_day: &[Notification],
    corrections_count: u64,
    range: StatsRange,
    now: DateTime<Utc>,
) -> Stats {
    let total_notifications = in_range.len();
    let noise: Vec<&Notification> = in_range
        .iter()
        .filter(|n| n.effective_zone().is_noise())
        .collect();
    let noise_count = noise.len();
    let total_words: usize = in_range.iter().map(Notification::word_count).sum();
    let noise_words: usize = noise.iter().map(|n| n.word_count()).sum();

    Stats {
        range,
        total_notifications,
        instant_count: total_notifications - noise_count,
        noise_count,
        corrections_count,
        accuracy: accuracy(total_notifications, corrections_count),
        time_saved_hours: time_saved_hours(total_words, noise_words),
        focus_score: focus_score(total_notifications, noise_count),
        chart: compute_chart(in_range, range, now),
        noise_sources: compute_noise_sources(in_range),
        heatmap: compute_heatmap(last_day, now),
    }
}
