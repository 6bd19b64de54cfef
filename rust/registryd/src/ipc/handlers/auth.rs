use crate::client::{LoginOutcome, RegisterRequest};
use crate::gate::View;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{backend_failure, required_str, require_view, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn auth_login(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let username = required_str(req, "username")?;
    let password = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| HandlerErr::bad_params("missing password"))?;

    let outcome = state
        .client
        .login(&username, password)
        .map_err(|e| backend_failure(state, e))?;
    match outcome {
        LoginOutcome::Rejected { message } => {
            tracing::info!(%username, "login rejected");
            let message = if message.is_empty() {
                "invalid username or password".to_string()
            } else {
                message
            };
            Err(HandlerErr::new("auth_failed", message))
        }
        LoginOutcome::Accepted { identity, message } => {
            // A new identity never sees screens fetched under the previous one.
            state.school_report = None;
            state.student_report = None;
            let current = std::mem::take(&mut state.session);
            state.session = current.login(identity, state.session_store());
            Ok(json!({
                "message": message,
                "session": state.session.to_json(),
            }))
        }
    }
}

fn auth_logout(state: &mut AppState) -> Result<Value, HandlerErr> {
    require_view(state, View::Dashboard)?;
    state.end_session();
    Ok(json!({ "session": state.session.to_json(), "redirect": View::Login.route() }))
}

fn auth_register(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let register = RegisterRequest::new(
        required_str(req, "name")?,
        required_str(req, "username")?,
        req.params
            .get("password")
            .and_then(|v| v.as_str())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .ok_or_else(|| HandlerErr::bad_params("missing password"))?,
        required_str(req, "schoolId")?,
    );
    let body = state
        .client
        .register(&register)
        .map_err(|e| backend_failure(state, e))?;
    tracing::info!(username = %register.usuario, "account registered");
    Ok(json!({
        "registered": true,
        "message": body.get("message").cloned().unwrap_or(Value::Null),
        "redirect": View::Login.route(),
    }))
}

fn gate_check(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let route = required_str(req, "route")?;
    let view = View::from_route(&route)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown route: {route}")))?;
    let decision = view.check(state.session.identity());
    Ok(json!({
        "route": view.route(),
        "decision": decision,
        "redirect": decision.redirect_route(),
        "requiredRoles": view.required_roles(),
        "public": view.is_public(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "auth.login" => Some(respond(req, auth_login(state, req))),
        "auth.logout" => Some(respond(req, auth_logout(state))),
        "auth.register" => Some(respond(req, auth_register(state, req))),
        "session.get" => Some(respond(req, Ok(state.session.to_json()))),
        "gate.check" => Some(respond(req, gate_check(state, req))),
        _ => None,
    }
}
