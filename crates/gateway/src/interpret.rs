//! Normalization of heterogeneous gateway response bodies.
//!
//! The gateway is inconsistent across deployments: some answers carry
//! `success`/`reference`/`electronic_signature` at the top level, some nest
//! them under a `result` object, and the legacy deployment omits `success`
//! entirely and signals success by returning a non-empty `result`. The
//! interpreter reduces all of them to one [`GatewayResult`] using ordered
//! candidate paths rather than runtime shape inspection.

use serde_json::Value;

use ebms_core::GatewayResult;

use super::HttpReply;

/// Reference candidates, tried in order; the first non-empty value wins.
/// This order is a stable contract with response fixtures.
const REFERENCE_PATHS: &[&[&str]] = &[
    &["reference"],
    &["ref"],
    &["invoice_reference"],
    &["result", "reference"],
    &["result", "ref"],
    &["result", "invoice_reference"],
    &["result", "invoice_registered_number"],
];

const SIGNATURE_PATHS: &[&[&str]] = &[
    &["electronic_signature"],
    &["result", "electronic_signature"],
];

/// Reduce one parsed response body to the canonical result.
pub fn interpret_body(body: &Value) -> GatewayResult {
    let success = is_success(body);
    let reference = first_non_empty(body, REFERENCE_PATHS);
    let signature = first_non_empty(body, SIGNATURE_PATHS);
    let message = body
        .get("msg")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            if success {
                "success".to_string()
            } else {
                "unknown gateway error".to_string()
            }
        });

    GatewayResult {
        success,
        reference,
        signature,
        message,
        raw: raw_payload(body),
    }
}

/// An explicit `success` boolean wins; otherwise a non-empty `result`
/// object alone implies success (the legacy shape).
fn is_success(body: &Value) -> bool {
    match body.get("success") {
        Some(Value::Bool(b)) => *b,
        _ => body
            .get("result")
            .and_then(Value::as_object)
            .map(|m| !m.is_empty())
            .unwrap_or(false),
    }
}

/// The signed payload: the `result` object verbatim when present, otherwise
/// the whole body (flat answers carry their fields at the top level).
fn raw_payload(body: &Value) -> Value {
    match body.get("result") {
        Some(result @ Value::Object(_)) => result.clone(),
        _ => body.clone(),
    }
}

fn lookup<'a>(body: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut node = body;
    for segment in path {
        node = node.get(segment)?;
    }
    Some(node)
}

fn first_non_empty(body: &Value, paths: &[&[&str]]) -> String {
    for path in paths {
        if let Some(s) = lookup(body, path).and_then(Value::as_str) {
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }
    String::new()
}

/// Whether a reply is an authentication failure worth one token refresh:
/// HTTP 401, or an explicit unauthorized body.
pub fn is_auth_failure(reply: &HttpReply) -> bool {
    if reply.status == 401 {
        return true;
    }
    let Ok(body) = serde_json::from_str::<Value>(&reply.body) else {
        return false;
    };
    if matches!(body.get("success"), Some(Value::Bool(true))) {
        return false;
    }
    let msg = body
        .get("msg")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_ascii_lowercase();
    msg.contains("unauthorized") || msg.contains("token expired") || msg.contains("invalid token")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_success_shape() {
        let result = interpret_body(&json!({
            "success": true,
            "reference": "OBR123",
            "electronic_signature": "SIG1",
            "msg": "OK"
        }));
        assert!(result.success);
        assert_eq!(result.reference, "OBR123");
        assert_eq!(result.signature, "SIG1");
        assert_eq!(result.message, "OK");
    }

    #[test]
    fn nested_shape_pulls_fields_from_result() {
        let result = interpret_body(&json!({
            "success": true,
            "result": {
                "invoice_registered_number": "OBR/2024/42",
                "electronic_signature": "SIG2"
            }
        }));
        assert_eq!(result.reference, "OBR/2024/42");
        assert_eq!(result.signature, "SIG2");
        assert_eq!(result.raw, json!({
            "invoice_registered_number": "OBR/2024/42",
            "electronic_signature": "SIG2"
        }));
    }

    #[test]
    fn legacy_shape_success_implied_by_non_empty_result() {
        assert!(interpret_body(&json!({"result": {"reference": "X"}})).success);
        assert!(!interpret_body(&json!({"result": {}})).success);
        assert!(!interpret_body(&json!({"msg": "down"})).success);
    }

    #[test]
    fn explicit_success_false_wins_over_result_presence() {
        let result = interpret_body(&json!({
            "success": false,
            "msg": "Erreur OBR",
            "result": {"reference": "X"}
        }));
        assert!(!result.success);
        assert_eq!(result.message, "Erreur OBR");
    }

    #[test]
    fn empty_top_level_reference_falls_through_to_nested_ref() {
        let result = interpret_body(&json!({
            "success": true,
            "reference": "",
            "result": {"ref": "X"}
        }));
        assert_eq!(result.reference, "X");
    }

    #[test]
    fn top_level_reference_beats_top_level_ref() {
        let result = interpret_body(&json!({
            "success": true,
            "reference": "A",
            "ref": "B"
        }));
        assert_eq!(result.reference, "A");
    }

    #[test]
    fn flat_body_is_kept_as_raw_payload() {
        let body = json!({"success": true, "reference": "A"});
        assert_eq!(interpret_body(&body).raw, body);
    }

    #[test]
    fn auth_failure_on_401_or_explicit_body() {
        let http_401 = HttpReply { status: 401, body: String::new() };
        assert!(is_auth_failure(&http_401));

        let explicit = HttpReply {
            status: 200,
            body: r#"{"success": false, "msg": "Token expired"}"#.to_string(),
        };
        assert!(is_auth_failure(&explicit));

        let business = HttpReply {
            status: 200,
            body: r#"{"success": false, "msg": "Erreur OBR"}"#.to_string(),
        };
        assert!(!is_auth_failure(&business));

        let ok = HttpReply {
            status: 200,
            body: r#"{"success": true, "msg": "token refreshed earlier"}"#.to_string(),
        };
        assert!(!is_auth_failure(&ok));
    }
}
