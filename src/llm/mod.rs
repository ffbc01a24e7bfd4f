//! Inference backend seam
//!
//! The orchestration layer treats the model as an opaque
//! `invoke(phase, input) -> text` capability. Phases build the request, the
//! backend returns raw text, and [`parsing`] turns that text into a JSON value
//! that is then deserialized against the phase's output contract.
//!
//! - [`HttpInferenceBackend`]: JSON-over-HTTP adapter (`reqwest`)

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

mod http;
pub mod parsing;

pub use http::HttpInferenceBackend;

use crate::types::AnalysisKind;

/// One call to the inference capability
#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    /// Phase name, also used by the backend to pick its prompt
    pub kind: AnalysisKind,
    /// Validated, PII-scrubbed phase input
    pub input: serde_json::Value,
}

impl InferenceRequest {
    pub fn new<T: Serialize>(kind: AnalysisKind, input: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind,
            input: serde_json::to_value(input)?,
        })
    }
}

/// Unified trait for inference backends
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run one phase and return the raw response text
    async fn invoke(&self, request: &InferenceRequest) -> Result<String>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}
