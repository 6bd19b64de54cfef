//! Registry entities as served by the backend.
//!
//! The backend uses Spanish field names and is loose about types: ids and
//! coordinates arrive as numbers or strings, optional text as null or
//! missing. Deserialization accepts all of those; what goes back over IPC is
//! camelCase.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_LATITUDE: f64 = 13.701293;
pub const DEFAULT_LONGITUDE: f64 = -89.224063;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    #[serde(rename(deserialize = "id_school", serialize = "id"), deserialize_with = "de_id")]
    pub id: String,
    #[serde(rename(deserialize = "nombre", serialize = "name"), default, deserialize_with = "de_opt_text")]
    pub name: Option<String>,
    #[serde(rename(deserialize = "direccion", serialize = "address"), default, deserialize_with = "de_opt_text")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub email: Option<String>,
    #[serde(rename(deserialize = "foto", serialize = "photo"), default, deserialize_with = "de_opt_text")]
    pub photo: Option<String>,
    #[serde(rename(deserialize = "latitud", serialize = "latitude"), default, deserialize_with = "de_coord")]
    pub latitude: Option<f64>,
    #[serde(rename(deserialize = "longitud", serialize = "longitude"), default, deserialize_with = "de_coord")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianLink {
    #[serde(rename(deserialize = "id_padre", serialize = "guardianId"), default, deserialize_with = "de_opt_text")]
    pub guardian_id: Option<String>,
    #[serde(rename(deserialize = "parentesco", serialize = "relationship"), default, deserialize_with = "de_opt_text")]
    pub relationship: Option<String>,
    #[serde(rename(deserialize = "nombre", serialize = "name"), default, deserialize_with = "de_opt_text")]
    pub name: Option<String>,
}

impl GuardianLink {
    /// `"name (relationship)"` as shown in reports.
    pub fn display(&self) -> String {
        format!(
            "{} ({})",
            self.name.as_deref().unwrap_or_default(),
            self.relationship.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(rename(deserialize = "id_alumno", serialize = "id"), deserialize_with = "de_id")]
    pub id: String,
    #[serde(rename(deserialize = "nombre_completo", serialize = "fullName"), default, deserialize_with = "de_opt_text")]
    pub full_name: Option<String>,
    #[serde(rename(deserialize = "direccion", serialize = "address"), default, deserialize_with = "de_opt_text")]
    pub address: Option<String>,
    #[serde(rename(deserialize = "telefono", serialize = "phone"), default, deserialize_with = "de_opt_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub email: Option<String>,
    #[serde(rename(deserialize = "genero", serialize = "gender"), default, deserialize_with = "de_opt_text")]
    pub gender: Option<String>,
    #[serde(rename(deserialize = "foto", serialize = "photo"), default, deserialize_with = "de_opt_text")]
    pub photo: Option<String>,
    #[serde(rename(deserialize = "latitud", serialize = "latitude"), default, deserialize_with = "de_coord")]
    pub latitude: Option<f64>,
    #[serde(rename(deserialize = "longitud", serialize = "longitude"), default, deserialize_with = "de_coord")]
    pub longitude: Option<f64>,
    #[serde(rename(deserialize = "id_school", serialize = "schoolId"), default, deserialize_with = "de_opt_text")]
    pub school_id: Option<String>,
    #[serde(rename(deserialize = "nombre_school", serialize = "schoolName"), default, deserialize_with = "de_opt_text")]
    pub school_name: Option<String>,
    #[serde(rename(deserialize = "id_grado", serialize = "gradeId"), default, deserialize_with = "de_opt_text")]
    pub grade_id: Option<String>,
    #[serde(rename(deserialize = "id_seccion", serialize = "sectionId"), default, deserialize_with = "de_opt_text")]
    pub section_id: Option<String>,
    #[serde(rename(deserialize = "padres", serialize = "guardians"), default, deserialize_with = "de_guardians")]
    pub guardians: Vec<GuardianLink>,
}

impl Student {
    /// Guardians joined for display; `None` when the student has none.
    pub fn guardians_text(&self) -> Option<String> {
        if self.guardians.is_empty() {
            return None;
        }
        Some(
            self.guardians
                .iter()
                .map(GuardianLink::display)
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parent {
    #[serde(rename(deserialize = "id_padre", serialize = "id"), deserialize_with = "de_id")]
    pub id: String,
    #[serde(rename(deserialize = "nombre", serialize = "name"), default, deserialize_with = "de_opt_text")]
    pub name: Option<String>,
    #[serde(rename(deserialize = "direccion", serialize = "address"), default, deserialize_with = "de_opt_text")]
    pub address: Option<String>,
    #[serde(rename(deserialize = "telefono", serialize = "phone"), default, deserialize_with = "de_opt_text")]
    pub phone: Option<String>,
    #[serde(rename(deserialize = "id_school", serialize = "schoolId"), default, deserialize_with = "de_opt_text")]
    pub school_id: Option<String>,
}

/// Decodes each element independently; elements that fail (most often a
/// missing id) are skipped and counted.
pub fn decode_collection<T: DeserializeOwned>(items: Vec<Value>) -> (Vec<T>, usize) {
    let mut out = Vec::with_capacity(items.len());
    let mut skipped = 0usize;
    for item in items {
        match serde_json::from_value::<T>(item) {
            Ok(v) => out.push(v),
            Err(e) => {
                skipped += 1;
                tracing::warn!(error = %e, "skipping undecodable record");
            }
        }
    }
    (out, skipped)
}

/// Parses a coordinate the way the map widget does: numbers and numeric
/// strings are accepted, everything else is absent.
pub fn parse_coordinate(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn de_id<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(d)? {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("invalid identifier: {other}"))),
    }
}

fn de_opt_text<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn de_coord<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(parse_coordinate(&Value::deserialize(d)?))
}

fn de_guardians<'de, D>(d: D) -> Result<Vec<GuardianLink>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(d)? {
        Value::Array(items) => Ok(decode_collection(items).0),
        // Some endpoints send the list JSON-encoded, as the form submits it.
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Array(items)) => Ok(decode_collection(items).0),
            _ => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn student_decodes_loose_backend_shapes() {
        let s: Student = serde_json::from_value(json!({
            "id_alumno": 7,
            "nombre_completo": "Ana Pérez",
            "direccion": null,
            "telefono": 22223333,
            "latitud": "13.70",
            "longitud": "abc",
            "padres": [
                { "id_padre": 3, "parentesco": "Madre", "nombre": "Rosa" },
                { "parentesco": "Tío" }
            ]
        }))
        .expect("decode student");
        assert_eq!(s.id, "7");
        assert_eq!(s.address, None);
        assert_eq!(s.phone.as_deref(), Some("22223333"));
        assert_eq!(s.latitude, Some(13.70));
        assert_eq!(s.longitude, None);
        assert_eq!(s.guardians.len(), 2);
        assert_eq!(s.guardians[0].guardian_id.as_deref(), Some("3"));
        assert_eq!(
            s.guardians_text().as_deref(),
            Some("Rosa (Madre),  (Tío)")
        );
    }

    #[test]
    fn guardians_may_arrive_json_encoded() {
        let s: Student = serde_json::from_value(json!({
            "id_alumno": "a1",
            "padres": "[{\"id_padre\":\"1\",\"parentesco\":\"Padre\",\"nombre\":\"Luis\"}]"
        }))
        .expect("decode student");
        assert_eq!(s.guardians_text().as_deref(), Some("Luis (Padre)"));

        let none: Student =
            serde_json::from_value(json!({ "id_alumno": "a2", "padres": null })).expect("decode");
        assert_eq!(none.guardians_text(), None);
    }

    #[test]
    fn records_without_id_are_skipped() {
        let (schools, skipped) = decode_collection::<School>(vec![
            json!({ "id_school": 1, "nombre": "Centro Escolar" }),
            json!({ "nombre": "Sin id" }),
            json!({ "id_school": "" }),
        ]);
        assert_eq!(schools.len(), 1);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn serializes_camel_case_for_ipc() {
        let p: Parent = serde_json::from_value(json!({
            "id_padre": 4, "nombre": "Rosa", "id_school": 2
        }))
        .expect("decode parent");
        let v = serde_json::to_value(&p).expect("encode");
        assert_eq!(v["id"], "4");
        assert_eq!(v["schoolId"], "2");
        assert_eq!(v["name"], "Rosa");
    }

    #[test]
    fn coordinates_reject_non_finite_and_garbage() {
        assert_eq!(parse_coordinate(&json!(" -89.2 ")), Some(-89.2));
        assert_eq!(parse_coordinate(&json!("NaN")), None);
        assert_eq!(parse_coordinate(&json!(null)), None);
        assert_eq!(parse_coordinate(&json!(true)), None);
    }
}
