use crate::gate::View;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{backend_failure, bearer, optional_str, require_view, respond};
use crate::ipc::types::{AppState, Request};
use crate::map::{build_view, pick, LatLng};
use crate::model::parse_coordinate;
use crate::photo::photo_url;
use serde_json::{json, Value};

fn point_param(params: &Value) -> Result<LatLng, HandlerErr> {
    let lat = params
        .get("lat")
        .and_then(parse_coordinate)
        .ok_or_else(|| HandlerErr::bad_params("lat must be a number"))?;
    let lng = params
        .get("lng")
        .and_then(parse_coordinate)
        .ok_or_else(|| HandlerErr::bad_params("lng must be a number"))?;
    LatLng::checked(lat, lng).map_err(|e| HandlerErr::bad_params(e.to_string()))
}

fn map_markers(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Dashboard)?;
    // An unusable explicit center falls back like a missing one.
    let center = req.params.get("center").and_then(|c| point_param(c).ok());
    let token = bearer(state)?;
    let schools = state
        .client
        .list_schools(&token)
        .map_err(|e| backend_failure(state, e))?;
    let is_admin = state
        .session
        .identity()
        .map(|i| i.role.is_admin())
        .unwrap_or(false);
    let students = if is_admin {
        state
            .client
            .list_students(&token)
            .map_err(|e| backend_failure(state, e))?
    } else {
        Vec::new()
    };
    let view = build_view(&state.config.api_origin, &schools, &students, center);
    Ok(json!(view))
}

fn map_pick(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Dashboard)?;
    let point = point_param(&req.params)?;
    Ok(json!(pick(point)))
}

fn photos_url(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Dashboard)?;
    let path = optional_str(req, "path");
    Ok(json!({ "url": photo_url(&state.config.api_origin, path.as_deref()) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "map.markers" => Some(respond(req, map_markers(state, req))),
        "map.pick" => Some(respond(req, map_pick(state, req))),
        "photos.url" => Some(respond(req, photos_url(state, req))),
        _ => None,
    }
}
