use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "workflow.logs.jsonl";

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn logging_enabled() -> bool {
    std::env::var("WORKFLOW_OBSERVABILITY_ENABLED")
        .ok()
        .map(|value| parse_flag(&value).unwrap_or(true))
        .unwrap_or(true)
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    if let Ok(level) = std::env::var("WORKFLOW_LOG_LEVEL")
        && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
    {
        return filter;
    }
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Resolves the directory and file name for JSON logs, creating the directory.
fn json_log_target(raw: &str) -> std::io::Result<(PathBuf, String)> {
    let path = PathBuf::from(raw);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    Ok((dir, file_name))
}

fn install_console(filter: tracing_subscriber::EnvFilter) {
    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stdout);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}

/// Installs the process-wide `tracing` subscriber. Later calls are no-ops.
///
/// Environment variables:
/// - `WORKFLOW_OBSERVABILITY_ENABLED`: set to `false`/`0`/`off` to skip installation.
/// - `WORKFLOW_LOG_LEVEL`: filter directive (`info`, `workflow_stream=debug`, ...).
/// - `RUST_LOG`: fallback filter when `WORKFLOW_LOG_LEVEL` is unset or invalid.
/// - `WORKFLOW_JSON_LOG_PATH`: write JSON lines to this file instead of the
///   compact console format on stdout. If its directory cannot be created,
///   logs go to stdout and a warning is emitted.
pub fn init_observability() {
    INIT.get_or_init(|| {
        if !logging_enabled() {
            return;
        }

        let filter = env_filter();
        let raw = match std::env::var("WORKFLOW_JSON_LOG_PATH") {
            Ok(raw) if !raw.trim().is_empty() => raw,
            _ => return install_console(filter),
        };
        match json_log_target(&raw) {
            Ok((dir, file_name)) => {
                let writer = tracing_appender::rolling::never(dir, file_name);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(json_layer)
                    .try_init();
            }
            Err(e) => {
                install_console(filter);
                warn!(path = %raw, error = %e, "cannot create log directory; logging to stdout");
            }
        }
    });
}
