use std::collections::HashSet;

use crate::models::item::CanonicalItem;
use crate::triage::pipeline::{normalize_external_id, normalize_source};

/// External ids that need no classification.
///
/// Stored ids are keyed by `(source, external_id)` like the store's unique
/// key; ids the client reports as cached carry no source and match any.
#[derive(Debug, Default)]
pub struct KnownIds {
    stored: HashSet<(String, String)>,
    cached: HashSet<String>,
}

impl KnownIds {
    pub fn new(stored: HashSet<(String, String)>, cached: &[String]) -> Self {
        Self {
            stored,
            cached: cached
                .iter()
                .filter_map(|id| normalize_external_id(id))
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn contains(&self, source: &str, external_id: &str) -> bool {
        self.cached.contains(external_id)
            || self
                .stored
                .contains(&(source.to_string(), external_id.to_string()))
    }
}

/// Drops candidates whose external id is already known.
///
/// Runs before any classification so known items cost nothing. Source and id
/// are normalized the way the pipeline stores them. Items without an external
/// id are always kept. Order is preserved and duplicates within the batch are
/// left for the store's `(user, source, external_id)` key.
pub fn dedupe(candidates: Vec<CanonicalItem>, known: &KnownIds) -> Vec<CanonicalItem> {
    candidates
        .into_iter()
        .filter(|item| {
            match item.external_id.as_deref().and_then(normalize_external_id) {
                Some(id) => !known.contains(&normalize_source(&item.source), id),
                None => true,
            }
        })
        .collect()
}
