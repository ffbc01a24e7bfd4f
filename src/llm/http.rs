//! JSON-over-HTTP inference adapter
//!
//! POSTs `{"phase": "<kind>", "input": {...}}` to the configured endpoint and
//! reads the model text from the `output` field of the response. A body that
//! is not a JSON envelope is returned as-is.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{InferenceBackend, InferenceRequest};

#[derive(Serialize)]
struct WireRequest<'a> {
    phase: &'a str,
    input: &'a serde_json::Value,
}

/// HTTP client for a remote inference service
#[derive(Clone)]
pub struct HttpInferenceBackend {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpInferenceBackend {
    pub fn new(endpoint: &str, timeout: Duration, api_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Pull the model text out of a response body
pub(crate) fn decode_body(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(mut map)) => match map.remove("output") {
            Some(serde_json::Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        _ => body.to_string(),
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceBackend {
    async fn invoke(&self, request: &InferenceRequest) -> Result<String> {
        let wire = WireRequest {
            phase: request.kind.as_str(),
            input: &request.input,
        };

        let mut req = self.http.post(&self.endpoint).json(&wire);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Inference request to {} failed", self.endpoint))?;

        let status = resp.status();
        let body = resp.text().await.context("Failed to read inference response")?;
        if !status.is_success() {
            bail!("Inference service returned status {status}");
        }

        debug!(phase = %request.kind, bytes = body.len(), "Inference response received");
        Ok(decode_body(&body))
    }

    fn backend_name(&self) -> &'static str {
        "Http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_output_string() {
        assert_eq!(decode_body(r#"{"output": "{\"a\":1}"}"#), r#"{"a":1}"#);
    }

    #[test]
    fn test_decode_output_object() {
        let text = decode_body(r#"{"output": {"a": 1}}"#);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_decode_raw_body() {
        assert_eq!(decode_body("plain text"), "plain text");
        assert_eq!(decode_body(r#"{"a": 1}"#), r#"{"a": 1}"#);
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let backend =
            HttpInferenceBackend::new("http://localhost:8080/infer/", Duration::from_secs(5), None)
                .unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:8080/infer");
        assert_eq!(backend.backend_name(), "Http");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let backend =
            HttpInferenceBackend::new("http://127.0.0.1:9", Duration::from_millis(500), None)
                .unwrap();
        let request = InferenceRequest::new(crate::types::AnalysisKind::Discovery, &1).unwrap();
        assert!(backend.invoke(&request).await.is_err());
    }
}
