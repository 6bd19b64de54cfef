mod client;
mod config;
mod db;
mod filter;
mod forms;
mod gate;
mod ipc;
mod logging;
mod map;
mod model;
mod pdf;
mod photo;
mod report;
mod screen;
mod session;

use std::io::{self, BufRead, Write};

fn main() -> anyhow::Result<()> {
    logging::init_logging()?;
    let config = config::Config::from_env();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        api_origin = %config.api_origin,
        timeout_secs = config.http_timeout_secs,
        "registryd starting"
    );
    let mut state = ipc::AppState::new(config)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to reply to.
                tracing::warn!(error = %e, "unparseable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::info!("stdin closed, exiting");
    Ok(())
}
