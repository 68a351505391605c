// Triage: deduplicated ingestion from source adapters, classification with
// fallback, and persistence of canonical notifications.
// Classification goes through classifier::ClassifierAdapter only.

pub mod bulk;
pub mod dedup;
pub mod handlers;
pub mod pipeline;
pub mod sources;
