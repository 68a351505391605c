//! Delivery windows: named times of day at which scheduled-zone items
//! surface. They gate display only; classification never reads them.

pub mod handlers;

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::preferences::DeliveryWindow;

const MAX_WINDOWS: usize = 24;

pub fn parse_window_time(time: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(time.trim(), "%H:%M").ok()
}

/// Rejects duplicate ids, blank labels, unparseable times and oversize lists.
pub fn validate_windows(windows: &[DeliveryWindow]) -> Result<(), AppError> {
    if windows.len() > MAX_WINDOWS {
        return Err(AppError::Validation(format!(
            "at most {MAX_WINDOWS} delivery windows are allowed"
        )));
    }
    let mut ids = HashSet::new();
    for window in windows {
        if window.id.trim().is_empty() {
            return Err(AppError::Validation("delivery window id cannot be empty".to_string()));
        }
        if !ids.insert(window.id.as_str()) {
            return Err(AppError::Validation(format!(
                "duplicate delivery window id '{}'",
                window.id
            )));
        }
        if window.label.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "delivery window '{}' needs a label",
                window.id
            )));
        }
        if parse_window_time(&window.time).is_none() {
            return Err(AppError::Validation(format!(
                "delivery window '{}' has invalid time '{}', expected HH:MM",
                window.id, window.time
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingWindow {
    pub window: DeliveryWindow,
    pub at: DateTime<Utc>,
}

/// The first active window strictly after `now`, wrapping to tomorrow.
pub fn next_window(windows: &[DeliveryWindow], now: DateTime<Utc>) -> Option<UpcomingWindow> {
    let today = now.date_naive();
    windows
        .iter()
        .filter(|w| w.active)
        .filter_map(|w| {
            let time = parse_window_time(&w.time)?;
            let mut at = today.and_time(time).and_utc();
            if at <= now {
                at += Duration::days(1);
            }
            Some(UpcomingWindow {
                window: w.clone(),
                at,
            })
        })
        .min_by_key(|u| u.at)
}
