//! Request shape validation for `generate` bodies

use inkwell_core::domain::GenerationRequest;
use inkwell_core::port::{RequestValidator, ValidationOutcome};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

/// Wire shape of a `generate` body
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GenerateBody {
    #[validate(length(min = 1, max = 64, message = "must be 1-64 characters"))]
    agent_target: Option<String>,

    #[validate(length(min = 1, max = 64, message = "must be 1-64 characters"))]
    action: String,

    #[serde(default)]
    context: Option<Value>,

    #[serde(default)]
    payload: Option<Value>,
}

/// Validates `{agentTarget?, action, context?, payload?}`
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonShapeValidator;

impl RequestValidator for JsonShapeValidator {
    fn validate(&self, raw: &Value) -> ValidationOutcome {
        if !raw.is_object() {
            return ValidationOutcome::invalid(vec!["body: must be a JSON object".to_string()]);
        }

        let body: GenerateBody = match serde_json::from_value(raw.clone()) {
            Ok(body) => body,
            Err(e) => return ValidationOutcome::invalid(vec![format!("body: {}", e)]),
        };

        let mut errors = field_errors(&body);
        if matches!(body.context, Some(ref ctx) if !ctx.is_object()) {
            errors.push("context: must be an object".to_string());
        }
        if !errors.is_empty() {
            return ValidationOutcome::invalid(errors);
        }

        let mut request = GenerationRequest::new(body.action);
        request.agent_target = body.agent_target;
        request.context = body.context;
        request.payload = body.payload;
        ValidationOutcome::valid(request)
    }
}

/// Flatten `validator` errors into `field: message` strings, sorted for stable output
fn field_errors(body: &GenerateBody) -> Vec<String> {
    let Err(errors) = body.validate() else {
        return Vec::new();
    };

    let mut out: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let field = to_camel_case(&field);
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, message)
            })
        })
        .collect();
    out.sort();
    out
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
