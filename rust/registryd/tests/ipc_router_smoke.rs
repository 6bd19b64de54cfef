mod common;

use common::{temp_dir, Sidecar, StubBackend};
use serde_json::{json, Value};

fn code(resp: &Value) -> Option<&str> {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let backend = StubBackend::registry();
    let workspace = temp_dir("registryd-router-smoke");
    let mut sc = Sidecar::spawn(&backend.origin);

    sc.ok("health", json!({}));
    sc.ok("workspace.select", json!({ "path": workspace.to_string_lossy() }));
    sc.ok("config.get", json!({}));
    sc.ok(
        "auth.register",
        json!({ "name": "Ana", "username": "ana", "password": "secret", "schoolId": 1 }),
    );
    sc.login("admin", "secret");
    sc.ok("session.get", json!({}));
    sc.ok("gate.check", json!({ "route": "/students" }));

    let calls: Vec<(&str, Value)> = vec![
        ("schools.list", json!({})),
        ("schools.create", json!({ "name": "Centro Escolar Nuevo" })),
        ("schools.update", json!({ "id": 1, "name": "Centro Escolar Norte" })),
        ("schools.delete", json!({ "id": 4 })),
        ("students.list", json!({})),
        ("students.get", json!({ "id": 10 })),
        ("students.create", json!({ "fullName": "Marta Ruiz", "gender": "F" })),
        ("students.update", json!({ "id": 10, "fullName": "Ana María Pérez" })),
        ("students.delete", json!({ "id": 11 })),
        ("parents.list", json!({})),
        ("parents.create", json!({ "name": "Carlos Ruiz" })),
        ("parents.update", json!({ "id": 5, "name": "Rosa Pérez" })),
        ("parents.delete", json!({ "id": 6 })),
        ("photos.url", json!({ "path": "uploads\\a.png" })),
        ("map.markers", json!({})),
        ("map.pick", json!({ "lat": 13.701293, "lng": -89.224063 })),
        ("reports.open", json!({ "kind": "schools" })),
        ("reports.setFilter", json!({ "kind": "schools", "filters": {} })),
        ("reports.resetFilters", json!({ "kind": "schools" })),
        ("reports.preview", json!({ "kind": "schools" })),
        ("reports.export", json!({ "kind": "schools" })),
    ];
    for (method, params) in calls {
        let resp = sc.request(method, params);
        assert_eq!(resp["ok"], true, "{} failed: {}", method, resp);
    }

    sc.ok("auth.logout", json!({}));

    let resp = sc.request("nope.method", json!({}));
    assert_eq!(code(&resp), Some("not_implemented"));

    sc.shutdown();
}

#[test]
fn writes_send_backend_field_names() {
    let backend = StubBackend::registry();
    let mut sc = Sidecar::spawn(&backend.origin);
    sc.login("admin", "secret");

    let created = sc.ok(
        "students.create",
        json!({
            "fullName": "  Marta Ruiz ",
            "schoolId": 2,
            "guardians": [{ "guardianId": 5, "relationship": "Tía" }]
        }),
    );
    assert_eq!(created["created"], true);
    assert_eq!(created["message"], "Registro creado");

    let sent = backend
        .requests()
        .into_iter()
        .find(|r| r.method == "POST" && r.path == "/api/students")
        .expect("create request");
    let body = sent.json();
    assert_eq!(body["nombre_completo"], "Marta Ruiz");
    assert_eq!(body["genero"], "M");
    assert_eq!(body["latitud"], 13.701293);
    assert_eq!(body["longitud"], -89.224063);
    assert_eq!(body["id_school"], "2");
    assert_eq!(body["padres"], json!([{ "id_padre": "5", "parentesco": "Tía" }]));

    let e = sc.fail("schools.create", json!({ "address": "sin nombre" }));
    assert_eq!(e["code"], "bad_params");
    assert_eq!(e["details"]["field"], "nombre");

    sc.ok("schools.update", json!({ "id": "a b", "name": "X" }));
    let put = backend.requests().pop().expect("update request");
    assert_eq!(put.method, "PUT");
    assert_eq!(put.path, "/api/schools/a%20b");

    let pick = sc.ok("map.pick", json!({ "lat": "13.701293", "lng": -89.224063 }));
    assert_eq!(pick["latitudeDms"], "13° 42' 4.65\" N");
    assert_eq!(pick["longitude"], "-89.224063");
    let e = sc.fail("map.pick", json!({ "lat": 120, "lng": 0 }));
    assert_eq!(e["code"], "bad_params");

    sc.shutdown();
}

#[test]
fn unparseable_line_gets_bad_json() {
    use std::io::{BufRead, Write};

    let backend = StubBackend::registry();
    let mut sc = Sidecar::spawn(&backend.origin);
    writeln!(sc.stdin, "{{not json").expect("write");
    sc.stdin.flush().expect("flush");
    let mut line = String::new();
    sc.reader.read_line(&mut line).expect("read");
    let v: Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(v["ok"], false);
    assert_eq!(code(&v), Some("bad_json"));

    // The loop keeps going.
    sc.ok("health", json!({}));
    sc.shutdown();
}
