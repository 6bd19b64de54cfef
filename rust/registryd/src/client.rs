//! Entity Client: data access against the registry REST backend.
//!
//! Pure transport plus envelope handling. Every call is a single blocking
//! request; nothing is retried.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::Config;
use crate::model::{decode_collection, Parent, School, Student};
use crate::session::{Identity, Role, DEFAULT_USER_ROLE};

#[derive(Debug, Error)]
pub enum ClientError {
    /// 401/403 on an authenticated call: the token is no longer accepted.
    #[error("session rejected by backend (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected response shape: {0}")]
    Decode(String),
    #[error("invalid backend address: {0}")]
    Address(String),
}

impl ClientError {
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::Unauthorized { .. } => "session_invalid",
            ClientError::Status { .. } => "backend_error",
            ClientError::Network(_) => "network_error",
            ClientError::Decode(_) => "bad_response",
            ClientError::Address(_) => "bad_config",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Schools,
    Students,
    Parents,
}

impl Collection {
    fn path(self) -> &'static str {
        match self {
            Collection::Schools => "schools",
            Collection::Students => "students",
            Collection::Parents => "parents",
        }
    }

    /// Keys under which list responses wrap their array, in lookup order.
    fn envelope_keys(self) -> &'static [&'static str] {
        match self {
            Collection::Schools => &["data"],
            Collection::Students => &["students", "data"],
            Collection::Parents => &["parents", "data"],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Accepted { identity: Identity, message: String },
    Rejected { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub nombre: String,
    pub usuario: String,
    pub password: String,
    pub id_school: String,
    pub tipo: String,
}

impl RegisterRequest {
    /// Self-registration always creates a regular user account.
    pub fn new(nombre: String, usuario: String, password: String, id_school: String) -> Self {
        Self {
            nombre,
            usuario,
            password,
            id_school,
            tipo: DEFAULT_USER_ROLE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntityClient {
    http: Client,
    config: Config,
}

impl EntityClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("registryd/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    pub fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, ClientError> {
        let url = self.config.api_url("auth/login");
        tracing::debug!(%url, username, "login request");
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "usuario": username, "password": password }))
            .send()?;

        let status = resp.status();
        let body = read_json(resp)?;
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        // Bad credentials come back either as 401/403 or as success=false.
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(LoginOutcome::Rejected { message });
        }
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        if body.get("success").and_then(Value::as_bool) != Some(true) {
            return Ok(LoginOutcome::Rejected { message });
        }

        let token = body
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ClientError::Decode("login response has no token".into()))?;
        let role = body
            .get("tipo")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_USER_ROLE);
        let username = body
            .get("usuario")
            .and_then(Value::as_str)
            .unwrap_or(username);
        let school_id = body.get("id_school").and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        Ok(LoginOutcome::Accepted {
            identity: Identity {
                username: username.to_string(),
                role: Role::new(role),
                token: token.to_string(),
                school_id,
            },
            message,
        })
    }

    pub fn register(&self, req: &RegisterRequest) -> Result<Value, ClientError> {
        let url = self.config.api_url("auth/register");
        let resp = self.http.post(&url).json(req).send()?;
        let status = resp.status();
        let body = read_json(resp)?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: body_message(&body),
            });
        }
        Ok(body)
    }

    pub fn list_schools(&self, token: &str) -> Result<Vec<School>, ClientError> {
        self.list(token, Collection::Schools)
    }

    pub fn list_students(&self, token: &str) -> Result<Vec<Student>, ClientError> {
        self.list(token, Collection::Students)
    }

    pub fn list_parents(&self, token: &str) -> Result<Vec<Parent>, ClientError> {
        self.list(token, Collection::Parents)
    }

    pub fn get_student(&self, token: &str, id: &str) -> Result<Student, ClientError> {
        let url = self.item_url(Collection::Students, id)?;
        let body = self.send_authed(self.http.get(url), token)?;
        // Single-record responses may be wrapped like list responses.
        let raw = ["student", "data"]
            .iter()
            .find_map(|k| body.get(*k).filter(|v| v.is_object()).cloned())
            .unwrap_or(body);
        serde_json::from_value(raw).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub fn create(
        &self,
        token: &str,
        collection: Collection,
        body: &Value,
    ) -> Result<Value, ClientError> {
        let url = self.config.api_url(collection.path());
        self.send_authed(self.http.post(&url).json(body), token)
    }

    pub fn update(
        &self,
        token: &str,
        collection: Collection,
        id: &str,
        body: &Value,
    ) -> Result<Value, ClientError> {
        let url = self.item_url(collection, id)?;
        self.send_authed(self.http.put(url).json(body), token)
    }

    pub fn delete(&self, token: &str, collection: Collection, id: &str) -> Result<Value, ClientError> {
        let url = self.item_url(collection, id)?;
        self.send_authed(self.http.delete(url), token)
    }

    fn list<T: serde::de::DeserializeOwned>(
        &self,
        token: &str,
        collection: Collection,
    ) -> Result<Vec<T>, ClientError> {
        let url = self.config.api_url(collection.path());
        let body = self.send_authed(self.http.get(&url), token)?;
        let items = extract_items(body, collection.envelope_keys())?;
        let (records, skipped) = decode_collection(items);
        tracing::debug!(
            collection = collection.path(),
            count = records.len(),
            skipped,
            "fetched collection"
        );
        Ok(records)
    }

    fn item_url(&self, collection: Collection, id: &str) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.config.api_url(collection.path()))
            .map_err(|e| ClientError::Address(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Address(self.config.api_origin.clone()))?
            .push(id);
        Ok(url)
    }

    fn send_authed(&self, req: RequestBuilder, token: &str) -> Result<Value, ClientError> {
        let resp = req.bearer_auth(token).send()?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!(status = status.as_u16(), "backend rejected session token");
            return Err(ClientError::Unauthorized {
                status: status.as_u16(),
            });
        }
        let body = read_json(resp)?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: body_message(&body),
            });
        }
        Ok(body)
    }
}

fn read_json(resp: Response) -> Result<Value, ClientError> {
    let text = resp.text()?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
}

fn body_message(body: &Value) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "request failed".to_string())
}

/// Accepts a bare array or an object wrapping the array under one of `keys`.
pub fn extract_items(body: Value, keys: &[&str]) -> Result<Vec<Value>, ClientError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => {
            for key in keys {
                if let Some(Value::Array(items)) = obj.remove(*key) {
                    return Ok(items);
                }
            }
            Err(ClientError::Decode(format!(
                "expected an array or one of {keys:?}"
            )))
        }
        other => Err(ClientError::Decode(format!(
            "expected an array, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
