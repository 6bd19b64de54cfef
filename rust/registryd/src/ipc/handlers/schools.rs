use crate::client::Collection;
use crate::forms::school_payload;
use crate::gate::View;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    backend_failure, bearer, forward_write, require_view, required_str, respond, with_photo_url,
    RecordWrite,
};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn schools_list(state: &mut AppState) -> Result<Value, HandlerErr> {
    require_view(state, View::Schools)?;
    let token = bearer(state)?;
    let schools = state
        .client
        .list_schools(&token)
        .map_err(|e| backend_failure(state, e))?;
    let origin = &state.config.api_origin;
    let rows: Vec<Value> = schools
        .iter()
        .map(|s| with_photo_url(origin, s, s.photo.as_deref()))
        .collect();
    Ok(json!({ "count": rows.len(), "schools": rows }))
}

fn schools_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Schools)?;
    let payload = school_payload(&req.params)?;
    forward_write(state, Collection::Schools, RecordWrite::Create(&payload))
}

fn schools_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Schools)?;
    let id = required_str(req, "id")?;
    let payload = school_payload(&req.params)?;
    forward_write(state, Collection::Schools, RecordWrite::Update(&id, &payload))
}

fn schools_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Schools)?;
    let id = required_str(req, "id")?;
    forward_write(state, Collection::Schools, RecordWrite::Delete(&id))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "schools.list" => Some(respond(req, schools_list(state))),
        "schools.create" => Some(respond(req, schools_create(state, req))),
        "schools.update" => Some(respond(req, schools_update(state, req))),
        "schools.delete" => Some(respond(req, schools_delete(state, req))),
        _ => None,
    }
}
