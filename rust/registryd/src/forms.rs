//! Create/update payloads for the backend, built from IPC form params.
//!
//! Params come in the console's camelCase; payloads go out with the
//! backend's field names.

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::model::{parse_coordinate, DEFAULT_LATITUDE, DEFAULT_LONGITUDE};

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} is not a valid coordinate: {value}")]
    Coordinate { field: &'static str, value: String },
    #[error("gender must be M or F, got {0:?}")]
    Gender(String),
    #[error("guardians must be an array")]
    Guardians,
}

fn text(params: &Value, key: &str) -> String {
    match params.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn required(params: &Value, key: &str, wire: &'static str) -> Result<String, FormError> {
    let v = text(params, key);
    if v.is_empty() {
        return Err(FormError::Missing(wire));
    }
    Ok(v)
}

fn coordinate(params: &Value, key: &str, wire: &'static str, fallback: f64) -> Result<f64, FormError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(fallback),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(fallback),
        Some(v) => parse_coordinate(v).ok_or_else(|| FormError::Coordinate {
            field: wire,
            value: v.to_string(),
        }),
    }
}

/// Keeps the stored photo when the form carries one forward.
fn photo_fields(params: &Value, out: &mut Map<String, Value>) {
    let existing = text(params, "photo");
    if !existing.is_empty() {
        out.insert("mantener_foto_existente".into(), json!("true"));
        out.insert("foto_existente".into(), json!(existing));
    }
}

pub fn school_payload(params: &Value) -> Result<Value, FormError> {
    let mut out = Map::new();
    out.insert("nombre".into(), json!(required(params, "name", "nombre")?));
    out.insert("direccion".into(), json!(text(params, "address")));
    out.insert("email".into(), json!(text(params, "email")));
    out.insert(
        "latitud".into(),
        json!(coordinate(params, "latitude", "latitud", DEFAULT_LATITUDE)?),
    );
    out.insert(
        "longitud".into(),
        json!(coordinate(params, "longitude", "longitud", DEFAULT_LONGITUDE)?),
    );
    out.insert("id_user".into(), json!(text(params, "userId")));
    photo_fields(params, &mut out);
    Ok(Value::Object(out))
}

pub fn student_payload(params: &Value) -> Result<Value, FormError> {
    let gender = match text(params, "gender").to_uppercase().as_str() {
        "" | "M" => "M",
        "F" => "F",
        other => return Err(FormError::Gender(other.to_string())),
    };

    let mut out = Map::new();
    out.insert(
        "nombre_completo".into(),
        json!(required(params, "fullName", "nombre_completo")?),
    );
    out.insert("direccion".into(), json!(text(params, "address")));
    out.insert("telefono".into(), json!(text(params, "phone")));
    out.insert("email".into(), json!(text(params, "email")));
    out.insert("genero".into(), json!(gender));
    out.insert(
        "latitud".into(),
        json!(coordinate(params, "latitude", "latitud", DEFAULT_LATITUDE)?),
    );
    out.insert(
        "longitud".into(),
        json!(coordinate(params, "longitude", "longitud", DEFAULT_LONGITUDE)?),
    );
    out.insert("id_grado".into(), json!(text(params, "gradeId")));
    out.insert("id_seccion".into(), json!(text(params, "sectionId")));
    out.insert("id_school".into(), json!(text(params, "schoolId")));
    out.insert("padres".into(), guardian_links(params)?);
    photo_fields(params, &mut out);
    Ok(Value::Object(out))
}

/// Rows the user added but never picked a guardian for are dropped.
fn guardian_links(params: &Value) -> Result<Value, FormError> {
    let rows = match params.get("guardians") {
        None | Some(Value::Null) => return Ok(json!([])),
        Some(Value::Array(rows)) => rows,
        Some(_) => return Err(FormError::Guardians),
    };
    let links: Vec<Value> = rows
        .iter()
        .filter_map(|row| {
            let id = text(row, "guardianId");
            if id.is_empty() {
                return None;
            }
            Some(json!({ "id_padre": id, "parentesco": text(row, "relationship") }))
        })
        .collect();
    Ok(Value::Array(links))
}

pub fn parent_payload(params: &Value) -> Result<Value, FormError> {
    Ok(json!({
        "nombre": required(params, "name", "nombre")?,
        "direccion": text(params, "address"),
        "telefono": text(params, "phone"),
        "id_school": text(params, "schoolId"),
    }))
}
