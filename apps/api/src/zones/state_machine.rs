//! Lifecycle transitions for a single notification.
//!
//! Pure functions over `Notification`: the zone service reads a record, applies
//! a transition here, then writes the result back with a compare-and-set on
//! `updated_at`. Overrides go through the store's atomic override path but
//! compute their result with [`apply_override`] so both backends agree.
//!
//! ```text
//! Active ──dismiss──▶ Dismissed ──restore──▶ Active
//! Active ──snooze───▶ Snoozed   ──restore──▶ Active
//! Snoozed ──dismiss─▶ Dismissed
//! any ──override──▶ same state, user_zone = new zone
//! any ──delete────▶ (record removed)
//! ```

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::models::notification::{Lifecycle, Notification, Zone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Dismiss,
    Snooze { until: DateTime<Utc> },
    Restore,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Dismiss => "dismiss",
            Transition::Snooze { .. } => "snooze",
            Transition::Restore => "restore",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} a notification that is {state}")]
    Invalid {
        action: &'static str,
        state: &'static str,
    },

    #[error("snooze time must be in the future")]
    SnoozeNotInFuture,
}

/// Applies `transition` to `current`.
///
/// Returns `Ok(None)` when the notification is already in the requested state
/// (re-dismissing, restoring an active item); callers skip the write.
pub fn apply(
    current: &Notification,
    transition: Transition,
    now: DateTime<Utc>,
) -> Result<Option<Notification>, TransitionError> {
    let lifecycle = match (current.lifecycle, transition) {
        (Lifecycle::Dismissed, Transition::Dismiss) => return Ok(None),
        (Lifecycle::Active, Transition::Restore) => return Ok(None),

        (Lifecycle::Active | Lifecycle::Snoozed { .. }, Transition::Dismiss) => {
            Lifecycle::Dismissed
        }

        (_, Transition::Snooze { until }) if until <= now => {
            return Err(TransitionError::SnoozeNotInFuture)
        }
        (Lifecycle::Active | Lifecycle::Snoozed { .. }, Transition::Snooze { until }) => {
            Lifecycle::Snoozed { until }
        }
        (Lifecycle::Dismissed, Transition::Snooze { .. }) => {
            return Err(TransitionError::Invalid {
                action: transition.name(),
                state: current.lifecycle.name(),
            })
        }

        (Lifecycle::Dismissed | Lifecycle::Snoozed { .. }, Transition::Restore) => {
            Lifecycle::Active
        }
    };

    let mut next = current.clone();
    next.lifecycle = lifecycle;
    // A snooze means "treat as scheduled" unless the user already chose a zone.
    if matches!(transition, Transition::Snooze { .. }) && next.user_zone.is_none() {
        next.user_zone = Some(Zone::Scheduled);
    }
    next.updated_at = now;
    Ok(Some(next))
}

/// Returns the overridden notification and the effective zone it had before.
pub fn apply_override(
    current: &Notification,
    zone: Zone,
    now: DateTime<Utc>,
) -> (Notification, Zone) {
    let original = current.effective_zone();
    let mut next = current.clone();
    next.user_zone = Some(zone);
    // Strictly after the stored version so a pending compare-and-set misses.
    next.updated_at = now.max(current.updated_at + Duration::microseconds(1));
    (next, original)
}
