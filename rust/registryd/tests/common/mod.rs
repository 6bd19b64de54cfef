#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

pub const ADMIN_TOKEN: &str = "tok-admin-5f1c2e9a";
pub const USER_TOKEN: &str = "tok-user-77ab0c41";

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Sidecar {
    pub fn spawn(api_origin: &str) -> Self {
        let exe = env!("CARGO_BIN_EXE_registryd");
        let mut child = Command::new(exe)
            .env("REGISTRYD_API_ORIGIN", api_origin)
            .env("REGISTRYD_HTTP_TIMEOUT_SECS", "5")
            .env("REGISTRYD_LOG", "off")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn registryd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    /// Sends one request and returns the whole response envelope.
    pub fn request(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read response line");
        assert!(!line.trim().is_empty(), "empty response for {}", method);
        let value: Value = serde_json::from_str(line.trim()).expect("parse response json");
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn ok(&mut self, method: &str, params: Value) -> Value {
        let resp = self.request(method, params);
        assert_eq!(
            resp.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            resp
        );
        resp["result"].clone()
    }

    /// Expects a failure and returns its `error` object.
    pub fn fail(&mut self, method: &str, params: Value) -> Value {
        let resp = self.request(method, params);
        assert_eq!(
            resp.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            resp
        );
        resp["error"].clone()
    }

    pub fn login(&mut self, username: &str, password: &str) -> Value {
        self.ok(
            "auth.login",
            json!({ "username": username, "password": password }),
        )
    }

    pub fn shutdown(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
    }
}

#[derive(Debug, Clone)]
pub struct StubRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

impl StubRequest {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }

    pub fn bearer(&self) -> Option<&str> {
        self.authorization.as_deref()?.strip_prefix("Bearer ")
    }
}

type Handler = dyn Fn(&StubRequest) -> (u16, Value) + Send + Sync;

/// A throwaway HTTP/1.1 backend on a loopback port. Every response closes
/// its connection.
pub struct StubBackend {
    pub origin: String,
    seen: Arc<Mutex<Vec<StubRequest>>>,
}

impl StubBackend {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&StubRequest) -> (u16, Value) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub backend");
        let addr = listener.local_addr().expect("stub addr");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);
        let log = Arc::clone(&seen);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                serve_one(stream, handler.as_ref(), &log);
            }
        });
        StubBackend {
            origin: format!("http://{}", addr),
            seen,
        }
    }

    /// The registry backend with the fixture data below.
    pub fn registry() -> Self {
        Self::start(registry_routes)
    }

    pub fn requests(&self) -> Vec<StubRequest> {
        self.seen.lock().expect("stub log").clone()
    }
}

fn serve_one(mut stream: TcpStream, handler: &Handler, log: &Mutex<Vec<StubRequest>>) {
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    let (status, body) = handler(&req);
    log.lock().expect("stub log").push(req);
    let body = body.to_string();
    let reason = match status {
        200 => "OK",
        201 => "Created",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        _ => "Error",
    };
    let resp = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(resp.as_bytes());
    let _ = stream.flush();
}

fn read_request(stream: &mut TcpStream) -> Option<StubRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut start = lines.next()?.split_whitespace();
    let method = start.next()?.to_string();
    let path = start.next()?.to_string();

    let mut content_length = 0usize;
    let mut authorization = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        if name == "content-length" {
            content_length = value.trim().parse().unwrap_or(0);
        } else if name == "authorization" {
            authorization = Some(value.trim().to_string());
        }
    }
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = (header_end + content_length).min(buf.len());
    Some(StubRequest {
        method,
        path,
        authorization,
        body: String::from_utf8_lossy(&buf[header_end..body_end]).to_string(),
    })
}

pub fn fixture_schools() -> Value {
    json!([
        {
            "id_school": 1,
            "nombre": "Centro Escolar Norte",
            "direccion": "Santa Ana",
            "email": "norte@ce.edu.sv",
            "foto": "uploads\\schools\\norte.jpg",
            "latitud": "13.994",
            "longitud": "-89.559"
        },
        {
            "id_school": 2,
            "nombre": "Centro Escolar Sur",
            "direccion": "San Miguel",
            "email": "sur@ce.edu.sv",
            "foto": null,
            "latitud": 13.481,
            "longitud": -88.177
        },
        {
            "id_school": 3,
            "nombre": "Instituto Nacional",
            "direccion": "Santa Ana",
            "email": "inas@ce.edu.sv",
            "latitud": "",
            "longitud": null
        },
        {
            "id_school": 4,
            "nombre": "Complejo Educativo Oriente",
            "direccion": "Usulután"
        }
    ])
}

pub fn fixture_students() -> Value {
    json!([
        {
            "id_alumno": 10,
            "nombre_completo": "Ana María Pérez",
            "direccion": "Colonia Escalón",
            "telefono": "7777-0001",
            "email": "ana.perez@mail.sv",
            "genero": "F",
            "latitud": 13.701,
            "longitud": -89.224,
            "id_school": 1,
            "nombre_school": "Centro Escolar Norte",
            "padres": [
                { "id_padre": 5, "parentesco": "Madre", "nombre": "Rosa Pérez" },
                { "id_padre": 6, "parentesco": "Padre", "nombre": "Jorge Pérez" }
            ]
        },
        {
            "id_alumno": 11,
            "nombre_completo": "Luis Gómez",
            "direccion": "Barrio El Centro",
            "telefono": "7777-0002",
            "email": "luis@mail.sv",
            "genero": "M",
            "latitud": "abc",
            "longitud": "-89.1",
            "id_school": 2,
            "nombre_school": "Centro Escolar Sur",
            "padres": []
        },
        {
            "id_alumno": 12,
            "nombre_completo": "ANA Lucía Rivas",
            "direccion": "Colonia Flor Blanca",
            "email": "lucia@mail.sv",
            "genero": "F",
            "id_school": 1,
            "nombre_school": "Centro Escolar Norte"
        }
    ])
}

pub fn fixture_parents() -> Value {
    json!([
        { "id_padre": 5, "nombre": "Rosa Pérez", "direccion": "Colonia Escalón", "telefono": "2222-1111", "id_school": 1 },
        { "id_padre": 6, "nombre": "Jorge Pérez", "telefono": "2222-1112", "id_school": 1 }
    ])
}

/// Routes of the registry API, with the envelopes each collection uses.
pub fn registry_routes(req: &StubRequest) -> (u16, Value) {
    let path = req.path.split('?').next().unwrap_or("");
    match (req.method.as_str(), path) {
        ("POST", "/api/auth/login") => {
            let body = req.json();
            let user = body.get("usuario").and_then(|v| v.as_str()).unwrap_or("");
            let pass = body.get("password").and_then(|v| v.as_str()).unwrap_or("");
            match (user, pass) {
                ("admin", "secret") => (
                    200,
                    json!({ "success": true, "message": "Bienvenido", "token": ADMIN_TOKEN, "tipo": "Administrador" }),
                ),
                ("ana", "secret") => (
                    200,
                    json!({ "success": true, "message": "Bienvenido", "token": USER_TOKEN, "tipo": "Usuario", "id_school": 1 }),
                ),
                _ => (
                    401,
                    json!({ "success": false, "message": "Credenciales inválidas" }),
                ),
            }
        }
        ("POST", "/api/auth/register") => (201, json!({ "message": "Usuario registrado" })),
        _ if !path.starts_with("/api/") => (404, json!({ "message": "not found" })),
        _ if !matches!(req.bearer(), Some(ADMIN_TOKEN) | Some(USER_TOKEN)) => {
            (401, json!({ "message": "Token inválido" }))
        }
        ("GET", "/api/schools") => (200, json!({ "data": fixture_schools() })),
        ("GET", "/api/students") => (200, json!({ "students": fixture_students() })),
        ("GET", "/api/students/10") => (200, fixture_students()[0].clone()),
        ("GET", "/api/parents") => (200, json!({ "parents": fixture_parents() })),
        ("POST", _) => (201, json!({ "message": "Registro creado", "id": 99 })),
        ("PUT", _) => (200, json!({ "message": "Registro actualizado" })),
        ("DELETE", _) => (200, json!({ "message": "Registro eliminado" })),
        _ => (404, json!({ "message": "not found" })),
    }
}
