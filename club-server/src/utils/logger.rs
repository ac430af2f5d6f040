//! Logging setup
//!
//! Console output plus, when a log directory is given, three daily files:
//! - `app/` general logs, removed after 14 days
//! - `audit/` committed approval actions (target `audit`), kept
//! - `security/` authentication events (target `security`), kept

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, TimeZone};
use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, filter::filter_fn, fmt, layer::SubscriberExt, prelude::*};

const APP_LOG_RETENTION_DAYS: i64 = 14;

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Delete `app-YYYY-MM-DD.log` files older than the retention window
pub fn cleanup_old_logs(log_dir: &Path) -> anyhow::Result<usize> {
    let cutoff = Local::now() - chrono::Duration::days(APP_LOG_RETENTION_DAYS);
    let app_log_dir = log_dir.join("app");
    if !app_log_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(app_log_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(date) = name
            .strip_prefix("app.")
            .or_else(|| name.strip_prefix("app-"))
            .map(|rest| rest.trim_end_matches(".log"))
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        else {
            continue;
        };
        let Some(midnight) = date
            .and_hms_opt(0, 0, 0)
            .and_then(|dt| Local.from_local_datetime(&dt).single())
        else {
            continue;
        };
        if midnight < cutoff {
            fs::remove_file(&path)?;
            removed += 1;
            tracing::info!(file = %name, "Deleted old log file");
        }
    }
    Ok(removed)
}

fn file_layer<S>(
    dir: PathBuf,
    prefix: &str,
    json: bool,
    keep: fn(&str) -> bool,
) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, prefix);
    let filter = filter_fn(move |meta| keep(meta.target()));
    let base = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(appender));
    if json {
        base.json().with_current_span(true).with_filter(filter).boxed()
    } else {
        base.with_filter(filter).boxed()
    }
}

/// Initialize logging
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logger_with_file(
    level: &str,
    json_format: bool,
    log_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<BoxedLayer<_>> = Vec::new();
    let console = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);
    layers.push(if json_format {
        console.json().with_current_span(true).with_thread_ids(true).boxed()
    } else {
        console.boxed()
    });

    if let Some(dir) = log_dir {
        let (app_dir, audit_dir, security_dir) =
            (dir.join("app"), dir.join("audit"), dir.join("security"));
        for d in [&app_dir, &audit_dir, &security_dir] {
            fs::create_dir_all(d)?;
        }

        layers.push(file_layer(app_dir, "app", json_format, |t| {
            t != "audit" && t != "security"
        }));
        layers.push(file_layer(audit_dir, "audit", json_format, |t| t == "audit"));
        layers.push(file_layer(security_dir, "security", json_format, |t| {
            t == "security"
        }));

        tokio::spawn(periodic_cleanup(dir.to_path_buf()));
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;
    Ok(())
}

/// Console-only logging
pub fn init_logger(level: &str, json_format: bool) -> anyhow::Result<()> {
    init_logger_with_file(level, json_format, None)
}

async fn periodic_cleanup(log_dir: PathBuf) {
    let mut tick = tokio::time::interval(std::time::Duration::from_secs(3600));
    loop {
        tick.tick().await;
        if let Err(e) = cleanup_old_logs(&log_dir) {
            tracing::error!(error = %e, "Failed to cleanup old logs");
        }
    }
}
