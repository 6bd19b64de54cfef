use serde::Serialize;
use serde_json::{json, Value};

use crate::client::{ClientError, Collection};
use crate::gate::{Decision, View};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::photo::photo_url;

pub fn respond(req: &Request, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn required_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    optional_str(req, key).ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Trimmed, non-empty string param. Numbers are accepted for id-like keys.
pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    match req.params.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn require_view(state: &AppState, view: View) -> Result<(), HandlerErr> {
    let decision = view.check(state.session.identity());
    if decision == Decision::Allow {
        return Ok(());
    }
    tracing::info!(
        view = view.route(),
        decision = ?decision,
        session_id = state.session.session_id().unwrap_or("-"),
        "gate refused request"
    );
    Err(HandlerErr::denied(decision, view))
}

pub fn bearer(state: &AppState) -> Result<String, HandlerErr> {
    state
        .session
        .token()
        .map(str::to_string)
        .ok_or_else(|| HandlerErr::denied(Decision::RedirectToLogin, View::Login))
}

/// A 401/403 from the backend ends the session; the UI goes back to login.
pub fn backend_failure(state: &mut AppState, e: ClientError) -> HandlerErr {
    let message = e.to_string();
    match e {
        ClientError::Unauthorized { status } => {
            state.end_session();
            HandlerErr {
                code: "session_invalid",
                message,
                details: Some(json!({ "redirect": View::Login.route(), "status": status })),
            }
        }
        other => {
            tracing::warn!(error = %message, "backend request failed");
            HandlerErr::new(other.code(), message)
        }
    }
}

pub enum RecordWrite<'a> {
    Create(&'a Value),
    Update(&'a str, &'a Value),
    Delete(&'a str),
}

/// Sends one create/update/delete to the backend and echoes its answer.
pub fn forward_write(
    state: &mut AppState,
    collection: Collection,
    write: RecordWrite<'_>,
) -> Result<Value, HandlerErr> {
    let token = bearer(state)?;
    let (action, id, result) = match write {
        RecordWrite::Create(body) => ("created", None, state.client.create(&token, collection, body)),
        RecordWrite::Update(id, body) => (
            "updated",
            Some(id),
            state.client.update(&token, collection, id, body),
        ),
        RecordWrite::Delete(id) => ("deleted", Some(id), state.client.delete(&token, collection, id)),
    };
    let body = result.map_err(|e| backend_failure(state, e))?;
    tracing::info!(collection = ?collection, action, id = id.unwrap_or("-"), "record written");
    let message = body.get("message").cloned().unwrap_or(Value::Null);
    let mut out = json!({ "id": id, "message": message, "response": body });
    out[action] = Value::Bool(true);
    Ok(out)
}

/// A record as the UI lists it: camelCase fields plus its resolved photo URL.
pub fn with_photo_url<T: Serialize>(origin: &str, record: &T, photo: Option<&str>) -> Value {
    let mut v = json!(record);
    v["photoUrl"] = json!(photo_url(origin, photo));
    v
}
