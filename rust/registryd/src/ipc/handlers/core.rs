use crate::config::{normalize_origin, Config};
use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{optional_str, required_str, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(
        req,
        Ok(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "apiOrigin": state.config.api_origin,
            "authenticated": state.session.is_authenticated(),
        })),
    )
}

fn workspace_select(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let path = PathBuf::from(required_str(req, "path")?);
    let origin_override = match optional_str(req, "apiOrigin") {
        Some(raw) => Some(
            normalize_origin(&raw)
                .ok_or_else(|| HandlerErr::bad_params(format!("invalid apiOrigin: {raw}")))?,
        ),
        None => None,
    };

    let conn = db::open_db(&path).map_err(|e| HandlerErr::new("db_open_failed", format!("{e:?}")))?;
    if let Some(origin) = &origin_override {
        Config::store_api_origin(&conn, origin)
            .map_err(|e| HandlerErr::new("db_update_failed", format!("{e:?}")))?;
    }
    let config = state
        .base_config
        .clone()
        .with_workspace_overrides(&conn)
        .map_err(|e| HandlerErr::new("db_query_failed", format!("{e:?}")))?;

    state
        .switch_workspace(path.clone(), conn, config)
        .map_err(|e| HandlerErr::new(e.code(), e.to_string()))?;
    // A session already held in memory moves into the new workspace;
    // otherwise the workspace's persisted one is restored.
    let current = std::mem::take(&mut state.session);
    state.session = current.hydrate_from_storage(state.session_store());
    state.session.persist(state.session_store());
    state.school_report = None;
    state.student_report = None;

    tracing::info!(
        workspace = %path.to_string_lossy(),
        api_origin = %state.config.api_origin,
        "workspace selected"
    );
    Ok(json!({
        "workspacePath": path.to_string_lossy(),
        "apiOrigin": state.config.api_origin,
        "session": state.session.to_json(),
    }))
}

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(
        req,
        Ok(json!({
            "config": state.config,
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        })),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(respond(req, workspace_select(state, req))),
        "config.get" => Some(handle_config_get(state, req)),
        _ => None,
    }
}
