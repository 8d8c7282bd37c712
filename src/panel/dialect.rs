//! Request shapes for the panel API generations we know about.
//!
//! Each table is ordered newest dialect first. Keep the order stable: the first accepted
//! candidate wins, so reordering changes which routes a mixed deployment ends up using.

use reqwest::Method;
use serde_json::{Value, json};

use crate::panel::record::ClientRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub dialect: &'static str,
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl Candidate {
    fn get(dialect: &'static str, path: String) -> Self {
        Self {
            dialect,
            method: Method::GET,
            path,
            body: None,
        }
    }

    fn post(dialect: &'static str, path: impl Into<String>, body: Value) -> Self {
        Self {
            dialect,
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }
}

pub fn inbound_candidates(inbound_id: u64) -> Vec<Candidate> {
    vec![
        Candidate::get(
            "panel-api-path",
            format!("/panel/api/inbounds/get/{inbound_id}"),
        ),
        Candidate::get(
            "panel-api-query",
            format!("/panel/api/inbounds/get?id={inbound_id}"),
        ),
        Candidate::get("xui-path", format!("/xui/inbound/get/{inbound_id}")),
        Candidate::post(
            "panel-api-post",
            "/panel/api/inbounds/get",
            json!({ "id": inbound_id }),
        ),
        Candidate::post("xui-post", "/xui/inbound/get", json!({ "id": inbound_id })),
    ]
}

pub fn add_client_candidates(record: &ClientRecord) -> Vec<Candidate> {
    vec![
        Candidate::post(
            "panel-api-clients",
            "/panel/api/inbounds/addClient",
            json!({ "id": record.inbound_id, "clients": [record.client_json()] }),
        ),
        Candidate::post(
            "panel-api-settings",
            "/panel/api/inbounds/addClient",
            json!({ "id": record.inbound_id, "settings": [record.client_json()] }),
        ),
        Candidate::post(
            "xui-flat",
            "/xui/inbound/addClient",
            record.legacy_flat_json(),
        ),
    ]
}

/// Pulls the inbound object out of a 200 response body.
///
/// Priority: `{success: true, obj}`, then any `{obj}`, then a bare object whose `id` is the
/// requested one.
pub fn extract_inbound(body: Value, inbound_id: u64) -> Result<Value, String> {
    let Value::Object(mut map) = body else {
        return Err("body is not a json object".to_string());
    };

    if let Some(obj) = map.remove("obj") {
        if obj.is_object() {
            return Ok(obj);
        }
        return Err(format!("obj is not an object: {}", json_kind(&obj)));
    }

    if map.get("id").and_then(Value::as_u64) == Some(inbound_id) {
        return Ok(Value::Object(map));
    }

    Err(format!(
        "neither obj nor matching id (success={})",
        map.get("success").map(Value::to_string).unwrap_or_default()
    ))
}

/// Whether an addClient response body counts as accepted.
///
/// A missing or null `success` is accepted because legacy x-ui builds omit the field. This
/// also accepts any other JSON object without it, so a failure reported some other way slips
/// through.
pub fn add_client_accepted(body: &Value) -> bool {
    let Some(obj) = body.as_object() else {
        return false;
    };
    match obj.get("success") {
        None | Some(Value::Null) | Some(Value::Bool(true)) => true,
        Some(Value::Number(n)) => n.as_f64() == Some(1.0),
        Some(Value::String(s)) => s == "true",
        Some(_) => false,
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
