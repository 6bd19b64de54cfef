use crate::client::Collection;
use crate::forms::parent_payload;
use crate::gate::View;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    backend_failure, bearer, forward_write, require_view, required_str, respond, RecordWrite,
};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn parents_list(state: &mut AppState) -> Result<Value, HandlerErr> {
    require_view(state, View::Parents)?;
    let token = bearer(state)?;
    let parents = state
        .client
        .list_parents(&token)
        .map_err(|e| backend_failure(state, e))?;
    Ok(json!({ "count": parents.len(), "parents": parents }))
}

fn parents_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Parents)?;
    let payload = parent_payload(&req.params)?;
    forward_write(state, Collection::Parents, RecordWrite::Create(&payload))
}

fn parents_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Parents)?;
    let id = required_str(req, "id")?;
    let payload = parent_payload(&req.params)?;
    forward_write(state, Collection::Parents, RecordWrite::Update(&id, &payload))
}

fn parents_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Parents)?;
    let id = required_str(req, "id")?;
    forward_write(state, Collection::Parents, RecordWrite::Delete(&id))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "parents.list" => Some(respond(req, parents_list(state))),
        "parents.create" => Some(respond(req, parents_create(state, req))),
        "parents.update" => Some(respond(req, parents_update(state, req))),
        "parents.delete" => Some(respond(req, parents_delete(state, req))),
        _ => None,
    }
}
