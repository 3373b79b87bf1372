// Request shape validator port
// Shape validation is delegated; the orchestrator only consumes the outcome.

use crate::domain::GenerationRequest;

/// Result of validating a raw `generate` body
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub success: bool,
    pub data: Option<GenerationRequest>,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn valid(data: GenerationRequest) -> Self {
        Self {
            success: true,
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            errors,
        }
    }

    /// Collapse into the request or an `InvalidRequest` error
    pub fn into_result(self) -> crate::Result<GenerationRequest> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (_, _) if self.errors.is_empty() => Err(crate::AppError::InvalidRequest(vec![
                "request rejected by validator".to_string(),
            ])),
            _ => Err(crate::AppError::InvalidRequest(self.errors)),
        }
    }
}

/// External request-shape validator
pub trait RequestValidator: Send + Sync {
    fn validate(&self, raw: &serde_json::Value) -> ValidationOutcome;
}
