//! pinmark RPC Server: JSON-RPC over stdin/stdout for the browser extension host.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmark.get", "params":{"url":"...","title":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//!
//! Logs go to stderr; stdout carries protocol messages only.

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use pinmark::app::App;
use pinmark::platform;
use pinmark::rpc_handler::handle_method;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Simple rate limiter: max requests per one-second window.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

fn emit(message: &Value) {
    let mut stdout = std::io::stdout().lock();
    if writeln!(stdout, "{}", message).and_then(|_| stdout.flush()).is_err() {
        tracing::error!("stdout_write_failed");
    }
}

/// `PINMARK_DATA_DIR/pinmark.db` when set, else the platform data dir.
fn database_path() -> PathBuf {
    match std::env::var("PINMARK_DATA_DIR") {
        Ok(dir) => PathBuf::from(dir).join("pinmark.db"),
        Err(_) => platform::get_database_path(),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pinmark=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let db_path = database_path();
    if let Some(parent) = db_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::error!(error = %e, dir = %parent.display(), "data_dir_create_failed");
        }
    }

    let settings_path = std::env::var("PINMARK_SETTINGS").ok();
    let app = match App::new(&db_path.to_string_lossy(), settings_path) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "startup_failed");
            emit(&json!({"event": "error", "error": e.to_string()}));
            std::process::exit(1);
        }
    };

    emit(&json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));
    tracing::info!(db = %db_path.display(), "rpc_server_ready");

    let mut rate_limiter = RateLimiter::new(200);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "stdin_read_failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                emit(&json!({"id": null, "error": format!("parse error: {}", e)}));
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            tracing::warn!(id = %id, "rate_limited");
            emit(&json!({"id": id, "error": "rate limit exceeded"}));
            continue;
        }

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let params = req.get("params").cloned().unwrap_or(json!({}));

        let response = match handle_method(&app, method, &params).await {
            Ok(val) => json!({"id": id, "result": val}),
            Err(err) => {
                tracing::debug!(method, error = %err, "rpc_method_failed");
                json!({"id": id, "error": err})
            }
        };
        emit(&response);
    }

    tracing::info!("rpc_server_stopped");
}
