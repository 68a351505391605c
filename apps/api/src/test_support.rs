//! Doubles for the external capabilities, shared by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::classifier::{ClassifierAdapter, ClassifierError, TextClassifier};
use crate::config::{Config, StoreBackend};
use crate::feed::ChangeFeed;
use crate::models::item::CanonicalItem;
use crate::state::AppState;
use crate::store::MemoryStore;
use crate::triage::sources::{SourceAdapter, SourceError};

/// Classifier that answers every call with a canned body (or an error) and
/// records what it was asked.
pub struct StubClassifier {
    response: Option<Value>,
    inputs: Mutex<Vec<String>>,
}

impl StubClassifier {
    /// `[{label, score}, ...]` response.
    pub fn pairs(pairs: &[(&str, f64)]) -> Self {
        let body = pairs
            .iter()
            .map(|(label, score)| json!({ "label": label, "score": score }))
            .collect();
        Self::body(Value::Array(body))
    }

    pub fn body(body: Value) -> Self {
        Self {
            response: Some(body),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextClassifier for StubClassifier {
    fn model_id(&self) -> &str {
        "stub-model"
    }

    async fn classify_raw(&self, text: &str, _labels: &[&str]) -> Result<Value, ClassifierError> {
        self.inputs.lock().unwrap().push(text.to_string());
        match &self.response {
            Some(body) => Ok(body.clone()),
            None => Err(ClassifierError::Api {
                status: 503,
                message: "model loading".to_string(),
            }),
        }
    }
}

pub struct StubSource {
    name: String,
    items: Option<Vec<CanonicalItem>>,
}

impl StubSource {
    /// Items carry no source tag so they inherit `name`.
    pub fn with_items(name: &str, items: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            items: Some(
                items
                    .iter()
                    .map(|(id, text)| CanonicalItem {
                        external_id: Some(id.to_string()),
                        text: text.to_string(),
                        title: None,
                        sender: None,
                        source: String::new(),
                        timestamp: None,
                    })
                    .collect(),
            ),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: None,
        }
    }
}

#[async_trait]
impl SourceAdapter for StubSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _user_id: Uuid) -> Result<Vec<CanonicalItem>, SourceError> {
        self.items.clone().ok_or(SourceError::Status(502))
    }
}

/// App state over a fresh in-memory store.
pub fn test_state(classifier: StubClassifier, sources: Vec<Arc<dyn SourceAdapter>>) -> AppState {
    let config = Config {
        store_backend: StoreBackend::Memory,
        ..Config::default()
    };
    AppState {
        store: Arc::new(MemoryStore::new()),
        classifier: ClassifierAdapter::new(Arc::new(classifier), config.confidence_threshold),
        sources: Arc::new(sources),
        feed: ChangeFeed::new(64),
        config,
    }
}
