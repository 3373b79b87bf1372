// Consistency Check Use Case
// Placeholder analysis: always a well-formed report, never spawns a process

use serde::{Deserialize, Serialize};

pub const STATUS_SUCCESS: &str = "success";

/// Consistency check request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyCheckRequest {
    pub content: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Consistency check report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub status: String,
    pub warnings: Vec<String>,
}

/// Execute consistency check
///
/// Side-effect free; the warnings list is currently always empty.
pub fn execute(req: &ConsistencyCheckRequest) -> ConsistencyReport {
    tracing::debug!(
        content_len = req.content.len(),
        has_context = !req.context.is_null(),
        "Consistency check requested"
    );
    ConsistencyReport {
        status: STATUS_SUCCESS.to_string(),
        warnings: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_is_success_with_empty_warnings() {
        let report = execute(&ConsistencyCheckRequest {
            content: "The hero was born in 1850 and died in 1820.".to_string(),
            context: json!({"projectId": "p1"}),
        });
        assert_eq!(report.status, "success");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_context_is_optional() {
        let req: ConsistencyCheckRequest =
            serde_json::from_value(json!({"content": "text"})).unwrap();
        assert!(req.context.is_null());
        assert_eq!(
            serde_json::to_value(execute(&req)).unwrap(),
            json!({"status": "success", "warnings": []})
        );
    }
}
