// Zone state machine: lifecycle transitions, overrides with their correction
// log entries, and the zone-grouped listings.

pub mod corrections;
pub mod handlers;
pub mod service;
pub mod state_machine;
