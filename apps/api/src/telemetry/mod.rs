// Telemetry: user-facing metrics derived on demand from notification history
// and the correction count. Nothing here is cached between calls.

pub mod handlers;
pub mod heatmap;
pub mod stats;
