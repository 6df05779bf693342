use crate::error::{GateError, GateResult};
use common::{CompletionRequest, CompletionResponse, ModelList};
use std::fmt;
use std::time::Duration;

/// Prompt and token budget for the sample completion
const SMOKE_PROMPT: &str = "What is the capital of France?";
const SMOKE_MAX_TOKENS: u32 = 50;
const SMOKE_TEMPERATURE: f32 = 0.7;

/// The two fixed validation requests, issued in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    ListModels,
    Completion,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationKind::ListModels => "list-models",
            ValidationKind::Completion => "completion",
        };
        f.write_str(s)
    }
}

/// Outcome of one validation request
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub kind: ValidationKind,
    pub success: bool,
    /// Payload summary on success, error detail on failure
    pub detail: String,
}

impl ValidationResult {
    fn from_outcome(kind: ValidationKind, outcome: Result<String, String>) -> Self {
        match outcome {
            Ok(detail) => {
                tracing::info!("Validation {} passed: {}", kind, detail);
                Self {
                    kind,
                    success: true,
                    detail,
                }
            }
            Err(detail) => {
                tracing::warn!("Validation {} failed: {}", kind, detail);
                Self {
                    kind,
                    success: false,
                    detail,
                }
            }
        }
    }
}

/// Aggregated result of the smoke-validation sequence
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub results: Vec<ValidationResult>,
}

impl ValidationReport {
    /// Overall pass: every individual request succeeded
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Fixed smoke-test sequence against a ready inference server
///
/// Issues a model-listing request and one sample completion. The two
/// requests are independent: a failure in the first never suppresses the
/// second. Each request carries its own timeout so a hung server cannot
/// stall the gate.
pub struct SmokeRunner {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl SmokeRunner {
    pub fn new(base_url: String, model: String, request_timeout: Duration) -> GateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GateError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            model,
        })
    }

    /// Run both validation requests in fixed order, recording each
    /// independently
    pub async fn run(&self) -> ValidationReport {
        let listing = self.list_models().await;
        let completion = self.sample_completion().await;

        ValidationReport {
            results: vec![
                ValidationResult::from_outcome(ValidationKind::ListModels, listing),
                ValidationResult::from_outcome(ValidationKind::Completion, completion),
            ],
        }
    }

    async fn list_models(&self) -> Result<String, String> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(format!("server returned {}: {}", status, body));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| format!("malformed response: {}", e))?;

        let ids: Vec<&str> = list.data.iter().map(|m| m.id.as_str()).collect();
        Ok(format!("{} model(s): {}", ids.len(), ids.join(", ")))
    }

    async fn sample_completion(&self) -> Result<String, String> {
        let url = format!("{}/completions", self.base_url);
        let request = CompletionRequest {
            model: self.model.clone(),
            prompt: SMOKE_PROMPT.to_string(),
            max_tokens: SMOKE_MAX_TOKENS,
            temperature: SMOKE_TEMPERATURE,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(format!("server returned {}: {}", status, body));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| format!("malformed response: {}", e))?;

        let text = completion
            .choices
            .first()
            .map(|c| c.text.trim())
            .unwrap_or("");
        let mut preview: String = text.chars().take(100).collect();
        if text.chars().count() > 100 {
            preview.push_str("...");
        }
        Ok(format!(
            "{} completion tokens, output: {:?}",
            completion.completion_tokens(),
            preview
        ))
    }
}
