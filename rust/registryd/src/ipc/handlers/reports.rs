use crate::client::{ClientError, EntityClient};
use crate::gate::View;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{backend_failure, bearer, optional_str, require_view, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::model::{School, Student};
use crate::pdf;
use crate::report::{Locale, ReportError, ReportKind, ReportRecord};
use crate::screen::{ReportScreen, ScreenError, ScreenReportError, PREVIEW_ROWS};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;

/// Ties a report record type to its view, its screen slot and its fetch.
trait ReportSlot: ReportRecord + Serialize + Sized {
    const VIEW: View;

    fn slot(state: &mut AppState) -> &mut Option<ReportScreen<Self>>;
    fn fetch(client: &EntityClient, token: &str) -> Result<Vec<Self>, ClientError>;
}

impl ReportSlot for School {
    const VIEW: View = View::ReportSchool;

    fn slot(state: &mut AppState) -> &mut Option<ReportScreen<Self>> {
        &mut state.school_report
    }

    fn fetch(client: &EntityClient, token: &str) -> Result<Vec<Self>, ClientError> {
        client.list_schools(token)
    }
}

impl ReportSlot for Student {
    const VIEW: View = View::ReportStudent;

    fn slot(state: &mut AppState) -> &mut Option<ReportScreen<Self>> {
        &mut state.student_report
    }

    fn fetch(client: &EntityClient, token: &str) -> Result<Vec<Self>, ClientError> {
        client.list_students(token)
    }
}

fn report_kind(req: &Request) -> Result<ReportKind, HandlerErr> {
    let raw = required_str(req, "kind")?;
    ReportKind::parse(&raw).ok_or_else(|| HandlerErr::bad_params(format!("unknown report kind: {raw}")))
}

fn loaded<R: ReportSlot>(state: &mut AppState) -> Result<&mut ReportScreen<R>, HandlerErr> {
    R::slot(state)
        .as_mut()
        .ok_or_else(|| ScreenError::NotLoaded(R::KIND).into())
}

fn open<R: ReportSlot>(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, R::VIEW)?;
    let locale = match optional_str(req, "locale") {
        Some(raw) => Locale::parse(&raw)
            .ok_or_else(|| HandlerErr::bad_params(format!("unsupported locale: {raw}")))?,
        None => Locale::default(),
    };
    let token = bearer(state)?;

    let mut screen = ReportScreen::<R>::mount(locale);
    match R::fetch(&state.client, &token) {
        Ok(records) => screen.finish_load(Ok(records)),
        Err(e @ ClientError::Unauthorized { .. }) => return Err(backend_failure(state, e)),
        Err(e) => screen.finish_load(Err(e.to_string())),
    }
    tracing::info!(kind = R::KIND.as_str(), state = screen.state().as_str(), "report opened");
    let snapshot = screen.snapshot(PREVIEW_ROWS);
    *R::slot(state) = Some(screen);
    Ok(snapshot)
}

fn set_filter<R: ReportSlot>(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, R::VIEW)?;
    let patch = req
        .params
        .get("filters")
        .ok_or_else(|| HandlerErr::bad_params("missing filters"))?;
    let screen = loaded::<R>(state)?;
    screen.set_filter(patch)?;
    tracing::debug!(
        kind = R::KIND.as_str(),
        active = screen.criteria().active().count(),
        "filters updated"
    );
    Ok(screen.snapshot(PREVIEW_ROWS))
}

fn reset_filters<R: ReportSlot>(state: &mut AppState) -> Result<Value, HandlerErr> {
    require_view(state, R::VIEW)?;
    let screen = loaded::<R>(state)?;
    screen.reset_filters()?;
    Ok(screen.snapshot(PREVIEW_ROWS))
}

fn preview<R: ReportSlot>(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, R::VIEW)?;
    let limit = match req.params.get("limit") {
        None | Some(Value::Null) => PREVIEW_ROWS,
        Some(v) => v
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| HandlerErr::bad_params("limit must be a non-negative integer"))?,
    };
    let screen = loaded::<R>(state)?;
    Ok(screen.snapshot(limit))
}

fn generation_date(req: &Request) -> Result<NaiveDate, HandlerErr> {
    match optional_str(req, "date") {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|e| HandlerErr::bad_params(format!("invalid date {raw}: {e}"))),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn export<R: ReportSlot>(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, R::VIEW)?;
    let generated_on = generation_date(req)?;
    let out_override = optional_str(req, "outPath").map(PathBuf::from);
    let workspace = state.workspace.clone();

    let screen = loaded::<R>(state)?;
    let document = match screen.compose(generated_on) {
        Ok(d) => d,
        Err(ScreenReportError::Screen(e)) => return Err(e.into()),
        Err(ScreenReportError::Report(ReportError::Empty { kind, message })) => {
            tracing::info!(kind = kind.as_str(), "nothing to export");
            return Ok(json!({
                "exported": false,
                "kind": kind.as_str(),
                "warning": message,
            }));
        }
    };

    let out_path = match (out_override, workspace) {
        (Some(p), _) => p,
        (None, Some(ws)) => ws.join("exports").join(&document.file_name),
        (None, None) => {
            return Err(HandlerErr::new(
                "no_workspace",
                "select a workspace or pass outPath",
            ))
        }
    };

    let summary = pdf::write_report(&document, &out_path)
        .map_err(|e| HandlerErr::new("export_failed", format!("{e:?}")))?;
    tracing::info!(
        kind = document.kind.as_str(),
        path = %summary.path.to_string_lossy(),
        pages = summary.pages,
        records = document.record_count,
        "report exported"
    );
    Ok(json!({
        "exported": true,
        "kind": document.kind.as_str(),
        "path": summary.path.to_string_lossy(),
        "pages": summary.pages,
        "tablePages": document.table_pages,
        "detailPages": document.detail_pages,
        "records": document.record_count,
        "bytes": summary.bytes,
        "sha256": summary.sha256,
    }))
}

fn dispatch(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    require_view(state, View::Reports)?;
    let kind = report_kind(req)?;
    match (req.method.as_str(), kind) {
        ("reports.open", ReportKind::Schools) => open::<School>(state, req),
        ("reports.open", ReportKind::Students) => open::<Student>(state, req),
        ("reports.setFilter", ReportKind::Schools) => set_filter::<School>(state, req),
        ("reports.setFilter", ReportKind::Students) => set_filter::<Student>(state, req),
        ("reports.resetFilters", ReportKind::Schools) => reset_filters::<School>(state),
        ("reports.resetFilters", ReportKind::Students) => reset_filters::<Student>(state),
        ("reports.preview", ReportKind::Schools) => preview::<School>(state, req),
        ("reports.preview", ReportKind::Students) => preview::<Student>(state, req),
        (_, ReportKind::Schools) => export::<School>(state, req),
        (_, ReportKind::Students) => export::<Student>(state, req),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "reports.open"
        | "reports.setFilter"
        | "reports.resetFilters"
        | "reports.preview"
        | "reports.export" => Some(respond(req, dispatch(state, req))),
        _ => None,
    }
}
