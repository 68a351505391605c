use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::notification::Notification;

pub const HEATMAP_SLOTS: usize = 48;
pub const SLOT_MINUTES: i64 = 30;

/// Density tier of one heatmap slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatLevel {
    None,
    Low,
    Medium,
    High,
}

impl HeatLevel {
    pub fn for_count(count: usize) -> Self {
        match count {
            c if c >= 5 => HeatLevel::High,
            c if c >= 3 => HeatLevel::Medium,
            c if c >= 1 => HeatLevel::Low,
            _ => HeatLevel::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapSlot {
    pub start: DateTime<Utc>,
    pub count: usize,
    pub level: HeatLevel,
}

/// Raw notification volume over the last 24 hours in 30-minute slots, oldest
/// first. Every zone counts.
pub fn compute_heatmap(notifications: &[Notification], now: DateTime<Utc>) -> Vec<HeatmapSlot> {
    let slot = Duration::minutes(SLOT_MINUTES);
    let window_start = now - slot * HEATMAP_SLOTS as i32;
    let mut counts = [0usize; HEATMAP_SLOTS];

    for n in notifications {
        if n.created_at < window_start || n.created_at > now {
            continue;
        }
        let offset = (n.created_at - window_start).num_minutes() / SLOT_MINUTES;
        let index = (offset as usize).min(HEATMAP_SLOTS - 1);
        counts[index] += 1;
    }

    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| HeatmapSlot {
            start: window_start + slot * i as i32,
            count,
            level: HeatLevel::for_count(count),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::{fixtures::notification, Zone};
    use uuid::Uuid;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(HeatLevel::for_count(0), HeatLevel::None);
        assert_eq!(HeatLevel::for_count(1), HeatLevel::Low);
        assert_eq!(HeatLevel::for_count(2), HeatLevel::Low);
        assert_eq!(HeatLevel::for_count(3), HeatLevel::Medium);
        assert_eq!(HeatLevel::for_count(4), HeatLevel::Medium);
        assert_eq!(HeatLevel::for_count(5), HeatLevel::High);
        assert_eq!(HeatLevel::for_count(40), HeatLevel::High);
    }

    #[test]
    fn test_slots_cover_last_day() {
        let now = Utc::now();
        let slots = compute_heatmap(&[], now);
        assert_eq!(slots.len(), 48);
        assert_eq!(slots[0].start, now - Duration::hours(24));
        assert_eq!(slots[47].start, now - Duration::minutes(30));
        assert!(slots.iter().all(|s| s.level == HeatLevel::None));
    }

    #[test]
    fn test_volume_counts_every_zone() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let recent = now - Duration::minutes(10);
        let mut rows: Vec<_> = [Zone::Instant, Zone::Batch, Zone::Scheduled]
            .into_iter()
            .map(|z| notification(user, z, recent))
            .collect();
        rows.push(notification(user, Zone::Batch, now - Duration::hours(30)));

        let slots = compute_heatmap(&rows, now);
        assert_eq!(slots[47].count, 3);
        assert_eq!(slots[47].level, HeatLevel::Medium);
        assert_eq!(slots.iter().map(|s| s.count).sum::<usize>(), 3);
    }
}
