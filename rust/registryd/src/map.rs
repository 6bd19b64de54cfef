//! Marker preparation for the dashboard map and coordinate picking for forms.

use serde::Serialize;
use thiserror::Error;

use crate::model::{School, Student, DEFAULT_LATITUDE, DEFAULT_LONGITUDE};
use crate::photo::photo_url;

#[derive(Debug, Error, PartialEq)]
pub enum MapError {
    #[error("latitude {0} is outside -90..90")]
    Latitude(f64),
    #[error("longitude {0} is outside -180..180")]
    Longitude(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Student,
    School,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub kind: MarkerKind,
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    pub label: &'static str,
    /// School name for students, address for schools.
    pub detail: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn fallback() -> Self {
        LatLng {
            lat: DEFAULT_LATITUDE,
            lng: DEFAULT_LONGITUDE,
        }
    }

    pub fn checked(lat: f64, lng: f64) -> Result<Self, MapError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(MapError::Latitude(lat));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(MapError::Longitude(lng));
        }
        Ok(LatLng { lat, lng })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    fn around(p: LatLng) -> Self {
        Bounds {
            south: p.lat,
            west: p.lng,
            north: p.lat,
            east: p.lng,
        }
    }

    fn extend(&mut self, p: LatLng) {
        self.south = self.south.min(p.lat);
        self.north = self.north.max(p.lat);
        self.west = self.west.min(p.lng);
        self.east = self.east.max(p.lng);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub center: LatLng,
    pub bounds: Option<Bounds>,
    pub markers: Vec<Marker>,
    /// Records left off the map for lack of usable coordinates.
    pub excluded: usize,
}

fn position(lat: Option<f64>, lng: Option<f64>) -> Option<LatLng> {
    LatLng::checked(lat?, lng?).ok()
}

/// Students go first so school markers draw over them.
pub fn build_view(
    origin: &str,
    schools: &[School],
    students: &[Student],
    center: Option<LatLng>,
) -> MapView {
    let mut markers = Vec::with_capacity(schools.len() + students.len());
    let mut excluded = 0usize;

    for s in students {
        match position(s.latitude, s.longitude) {
            Some(p) => markers.push(Marker {
                kind: MarkerKind::Student,
                id: s.id.clone(),
                lat: p.lat,
                lng: p.lng,
                title: s.full_name.clone().unwrap_or_default(),
                label: "Estudiante",
                detail: s.school_name.clone(),
                photo_url: photo_url(origin, s.photo.as_deref()),
            }),
            None => excluded += 1,
        }
    }
    for s in schools {
        match position(s.latitude, s.longitude) {
            Some(p) => markers.push(Marker {
                kind: MarkerKind::School,
                id: s.id.clone(),
                lat: p.lat,
                lng: p.lng,
                title: s.name.clone().unwrap_or_default(),
                label: "Escuela",
                detail: s.address.clone(),
                photo_url: photo_url(origin, s.photo.as_deref()),
            }),
            None => excluded += 1,
        }
    }

    let mut bounds: Option<Bounds> = None;
    for m in &markers {
        let p = LatLng { lat: m.lat, lng: m.lng };
        match bounds.as_mut() {
            Some(b) => b.extend(p),
            None => bounds = Some(Bounds::around(p)),
        }
    }

    if excluded > 0 {
        tracing::debug!(excluded, "records without usable coordinates left off the map");
    }

    MapView {
        center: center.unwrap_or_else(LatLng::fallback),
        bounds,
        markers,
        excluded,
    }
}

/// `13° 42' 4.65" N`. Seconds keep two decimals.
pub fn decimal_to_dms(decimal: f64, is_latitude: bool) -> String {
    let absolute = decimal.abs();
    let degrees = absolute.floor();
    let minutes_full = (absolute - degrees) * 60.0;
    let minutes = minutes_full.floor();
    let seconds = (minutes_full - minutes) * 60.0;
    let direction = match (is_latitude, decimal >= 0.0) {
        (true, true) => 'N',
        (true, false) => 'S',
        (false, true) => 'E',
        (false, false) => 'W',
    };
    format!("{degrees:.0}° {minutes:.0}' {seconds:.2}\" {direction}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pick {
    pub latitude: String,
    pub longitude: String,
    pub latitude_dms: String,
    pub longitude_dms: String,
}

/// A map click as the location forms consume it.
pub fn pick(point: LatLng) -> Pick {
    Pick {
        latitude: format!("{:.6}", point.lat),
        longitude: format!("{:.6}", point.lng),
        latitude_dms: decimal_to_dms(point.lat, true),
        longitude_dms: decimal_to_dms(point.lng, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn school(id: &str, lat: serde_json::Value, lng: serde_json::Value) -> School {
        serde_json::from_value(json!({
            "id_school": id,
            "nombre": format!("Escuela {id}"),
            "direccion": "Calle 1",
            "foto": "uploads\\s.png",
            "latitud": lat,
            "longitud": lng,
        }))
        .expect("school")
    }

    #[test]
    fn dms_matches_console_format() {
        assert_eq!(decimal_to_dms(13.701293, true), "13° 42' 4.65\" N");
        assert_eq!(decimal_to_dms(-89.224063, false), "89° 13' 26.63\" W");
        assert_eq!(decimal_to_dms(0.0, true), "0° 0' 0.00\" N");
    }

    #[test]
    fn invalid_coordinates_are_excluded_not_fatal() {
        let schools = vec![
            school("1", json!(13.7), json!(-89.2)),
            school("2", json!(null), json!(-89.2)),
            school("3", json!("abc"), json!("1")),
            school("4", json!("13.6"), json!("-89.1")),
        ];
        let view = build_view("http://localhost:5000", &schools, &[], None);
        assert_eq!(view.markers.len(), 2);
        assert_eq!(view.excluded, 2);
        assert_eq!(view.center, LatLng::fallback());
        let b = view.bounds.expect("bounds");
        assert_eq!((b.south, b.north), (13.6, 13.7));
        assert_eq!((b.west, b.east), (-89.2, -89.1));
        assert_eq!(
            view.markers[0].photo_url.as_deref(),
            Some("http://localhost:5000/uploads/s.png")
        );
    }

    #[test]
    fn students_are_marked_with_school_name() {
        let students: Vec<Student> = vec![serde_json::from_value(json!({
            "id_alumno": 9,
            "nombre_completo": "Ana",
            "nombre_school": "CE Norte",
            "latitud": 13.7,
            "longitud": -89.2,
        }))
        .expect("student")];
        let view = build_view("http://x", &[], &students, Some(LatLng { lat: 1.0, lng: 2.0 }));
        assert_eq!(view.markers[0].kind, MarkerKind::Student);
        assert_eq!(view.markers[0].detail.as_deref(), Some("CE Norte"));
        assert_eq!(view.center, LatLng { lat: 1.0, lng: 2.0 });
    }

    #[test]
    fn empty_map_has_no_bounds() {
        let view = build_view("http://x", &[], &[], None);
        assert!(view.bounds.is_none());
        assert!(view.markers.is_empty());
    }

    #[test]
    fn pick_rejects_out_of_range() {
        assert_eq!(LatLng::checked(91.0, 0.0), Err(MapError::Latitude(91.0)));
        assert!(LatLng::checked(0.0, f64::NAN).is_err());
        let p = pick(LatLng::checked(13.701293, -89.224063).expect("valid"));
        assert_eq!(p.latitude, "13.701293");
        assert_eq!(p.longitude_dms, "89° 13' 26.63\" W");
    }
}
