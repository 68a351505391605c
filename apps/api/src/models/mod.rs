pub mod correction;
pub mod item;
pub mod notification;
pub mod preferences;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to microseconds, the precision Postgres keeps.
/// Compare-and-set on `updated_at` relies on timestamps surviving a round trip.
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
