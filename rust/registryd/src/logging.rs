//! Logging setup.
//!
//! stdout carries the IPC protocol, so every log line goes to stderr.
//! Verbosity comes from `REGISTRYD_LOG` (an `EnvFilter` directive string),
//! defaulting to `info`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const ENV_LOG: &str = "REGISTRYD_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

pub fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;
    Ok(())
}

/// Shortens a bearer token to something safe to print.
pub fn redact_token(token: &str) -> String {
    let tail: String = token.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    if token.chars().count() <= 8 {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED …{tail}]")
    }
}
