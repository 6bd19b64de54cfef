use serde_json::json;

use crate::filter::FilterError;
use crate::forms::FormError;
use crate::gate::{Decision, View};
use crate::screen::ScreenError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// A handler failure not yet tied to a request id.
#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    /// The gate's refusal, with the route the UI should navigate to.
    pub fn denied(decision: Decision, view: View) -> Self {
        let code = decision.error_code().unwrap_or("redirect_login");
        let message = match decision {
            Decision::RedirectToHome => "insufficient role for this view",
            _ => "sign in required",
        };
        Self {
            code,
            message: message.to_string(),
            details: Some(json!({
                "redirect": decision.redirect_route().unwrap_or("/login"),
                "view": view.route(),
            })),
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<FormError> for HandlerErr {
    fn from(e: FormError) -> Self {
        let field = match &e {
            FormError::Missing(f) => Some(*f),
            FormError::Coordinate { field, .. } => Some(*field),
            FormError::Gender(_) => Some("genero"),
            FormError::Guardians => Some("padres"),
        };
        Self {
            code: "bad_params",
            message: e.to_string(),
            details: field.map(|f| json!({ "field": f })),
        }
    }
}

impl From<FilterError> for HandlerErr {
    fn from(e: FilterError) -> Self {
        Self::bad_params(e.to_string())
    }
}

impl From<ScreenError> for HandlerErr {
    fn from(e: ScreenError) -> Self {
        let message = e.to_string();
        match e {
            ScreenError::NotLoaded(kind) => Self {
                code: "not_loaded",
                message,
                details: Some(json!({ "kind": kind.as_str() })),
            },
            ScreenError::Filter(f) => f.into(),
        }
    }
}
