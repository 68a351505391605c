/// Classifier client: the single point of entry for calls to the external
/// zero-shot text classifier.
///
/// No other module talks to the classification endpoint directly. Callers go
/// through `ClassifierAdapter`, which owns the threshold and fallback policy.
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod adapter;

pub use adapter::ClassifierAdapter;

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Classifier credentials are not configured")]
    MissingCredentials,

    #[error("Malformed classifier response: {0}")]
    MalformedResponse(String),
}

/// External text-classification capability: scores `text` against `labels`
/// and returns the raw response body.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Recorded as `model_id` on notifications this backend classifies.
    fn model_id(&self) -> &str;

    async fn classify_raw(&self, text: &str, labels: &[&str]) -> Result<Value, ClassifierError>;
}

#[derive(Debug, Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Debug, Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [&'a str],
}

/// Zero-shot classification over HTTP (Hugging Face inference API shape).
#[derive(Clone)]
pub struct HttpClassifier {
    client: Client,
    url: String,
    api_token: Option<String>,
    model_id: String,
}

impl HttpClassifier {
    pub fn new(url: String, api_token: Option<String>, model_id: String) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            url,
            api_token,
            model_id,
        })
    }
}

#[async_trait]
impl TextClassifier for HttpClassifier {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    /// One attempt, no retries: a failure is absorbed by the adapter's fallback.
    async fn classify_raw(&self, text: &str, labels: &[&str]) -> Result<Value, ClassifierError> {
        let token = self
            .api_token
            .as_deref()
            .ok_or(ClassifierError::MissingCredentials)?;

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .json(&ZeroShotRequest {
                inputs: text,
                parameters: ZeroShotParameters {
                    candidate_labels: labels,
                },
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;
        debug!("Classifier responded for {} chars of input", text.len());
        Ok(body)
    }
}
