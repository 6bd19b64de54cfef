use crate::client::Collection;
use crate::forms::student_payload;
use crate::gate::View;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    backend_failure, bearer, forward_write, require_view, required_str, respond, with_photo_url,
    RecordWrite,
};
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use serde_json::{json, Value};

fn student_row(origin: &str, s: &Student) -> Value {
    let mut v = with_photo_url(origin, s, s.photo.as_deref());
    v["guardiansText"] = json!(s.guardians_text());
    v
}

fn students_list(state: &mut AppState) -> Result<Value, HandlerErr> {
    require_view(state, View::Students)?;
    let token = bearer(state)?;
    let students = state
        .client
        .list_students(&token)
        .map_err(|e| backend_failure(state, e))?;
    let rows: Vec<Value> = students
        .iter()
        .map(|s| student_row(&state.config.api_origin, s))
        .collect();
    Ok(json!({ "count": rows.len(), "students": rows }))
}

fn students_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Students)?;
    let id = required_str(req, "id")?;
    let token = bearer(state)?;
    let student = state
        .client
        .get_student(&token, &id)
        .map_err(|e| backend_failure(state, e))?;
    Ok(json!({ "student": student_row(&state.config.api_origin, &student) }))
}

fn students_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Students)?;
    let payload = student_payload(&req.params)?;
    forward_write(state, Collection::Students, RecordWrite::Create(&payload))
}

fn students_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Students)?;
    let id = required_str(req, "id")?;
    let payload = student_payload(&req.params)?;
    forward_write(state, Collection::Students, RecordWrite::Update(&id, &payload))
}

fn students_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Students)?;
    let id = required_str(req, "id")?;
    forward_write(state, Collection::Students, RecordWrite::Delete(&id))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "students.list" => Some(respond(req, students_list(state))),
        "students.get" => Some(respond(req, students_get(state, req))),
        "students.create" => Some(respond(req, students_create(state, req))),
        "students.update" => Some(respond(req, students_update(state, req))),
        "students.delete" => Some(respond(req, students_delete(state, req))),
        _ => None,
    }
}
