use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{Subscriber, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

/// Target used for the one-line-per-call request report.
pub const REQUEST_TARGET: &str = "request";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub log_file: String,
    pub event_file: String,
    /// Echo human-readable logs on stderr as well.
    pub console: bool,
}

impl LogConfig {
    pub fn new(root: &Path, log_level: impl Into<String>) -> Self {
        Self {
            log_level: log_level.into(),
            log_dir: root.join("logs"),
            log_file: "xbytechat.log".to_string(),
            event_file: "xbytechat_requests.json".to_string(),
            console: false,
        }
    }

    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }
}

/// Installs the global subscriber: a daily rolling text log, a daily rolling
/// JSON log holding only `request` events, and optionally stderr.
///
/// Calling it twice is harmless; the second call keeps the first subscriber.
pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let installed = build_subscriber(config)?.try_init();

    if installed.is_err() {
        warn!("tracing subscriber already installed, keeping the existing one");
    } else {
        info!(dir = %config.log_dir.display(), "logging initialised");
    }
    Ok(())
}

/// The level filter applies to the text and console layers only; the request
/// report always receives `request` events.
pub fn build_subscriber(config: &LogConfig) -> Result<impl Subscriber + Send + Sync + 'static> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("could not create log dir {}", config.log_dir.display()))?;

    let level_filter = || {
        EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("invalid log level `{}`", config.log_level))
    };

    let txt_appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, &config.log_file);
    let txt_layer = fmt::layer()
        .with_writer(txt_appender)
        .with_ansi(false)
        .with_filter(level_filter()?);

    let json_appender =
        RollingFileAppender::new(Rotation::DAILY, &config.log_dir, &config.event_file);
    let json_layer = fmt::layer()
        .json()
        .with_writer(json_appender)
        .with_target(true)
        .with_filter(EnvFilter::new(format!("{REQUEST_TARGET}=info")));

    let console_layer = if config.console {
        Some(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
                .with_filter(level_filter()?),
        )
    } else {
        None
    };

    Ok(Registry::default()
        .with(txt_layer)
        .with(json_layer)
        .with(console_layer))
}

/// Measures one HTTP call and writes it to the request report when done.
#[derive(Debug)]
pub struct RequestTimer {
    method: String,
    path: String,
    started: Instant,
}

impl RequestTimer {
    pub fn start(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1_000.0
    }

    /// `status` is `None` when the call never got a response.
    pub fn finish(self, status: Option<u16>) -> f64 {
        let latency_ms = self.elapsed_ms();
        match status {
            Some(status) => info!(
                target: REQUEST_TARGET,
                method = %self.method,
                path = %self.path,
                status,
                latency_ms,
                "request completed"
            ),
            None => info!(
                target: REQUEST_TARGET,
                method = %self.method,
                path = %self.path,
                latency_ms,
                "request failed before a response"
            ),
        }
        latency_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_config_paths() {
        let tmp = TempDir::new().unwrap();
        let cfg = LogConfig::new(tmp.path(), "debug").with_console(true);
        assert_eq!(cfg.log_dir, tmp.path().join("logs"));
        assert_eq!(cfg.log_level, "debug");
        assert!(cfg.console);
    }

    #[test]
    fn test_init_tracing_creates_log_dir_and_tolerates_reinit() {
        let tmp = TempDir::new().unwrap();
        let cfg = LogConfig::new(tmp.path(), "info");
        init_tracing(&cfg).unwrap();
        init_tracing(&cfg).unwrap();
        assert!(tmp.path().join("logs").is_dir());
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let cfg = LogConfig::new(tmp.path(), "xbytechat=verbose");
        assert!(init_tracing(&cfg).is_err());
    }

    #[test]
    fn test_request_report_ignores_log_level() {
        let tmp = TempDir::new().unwrap();
        let cfg = LogConfig::new(tmp.path(), "warn");
        let subscriber = build_subscriber(&cfg).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            info!("hidden by the level filter");
            RequestTimer::start("GET", "/flows").finish(Some(200));
        });

        let read_logs = |prefix: &str| -> String {
            std::fs::read_dir(&cfg.log_dir)
                .unwrap()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
                .map(|entry| std::fs::read_to_string(entry.path()).unwrap())
                .collect()
        };
        let requests = read_logs(&cfg.event_file);
        assert!(requests.contains("\"path\":\"/flows\""));
        assert!(requests.contains("\"status\":200"));

        let text = read_logs(&cfg.log_file);
        assert!(!text.contains("hidden by the level filter"));
        assert!(!text.contains("request completed"));
    }

    #[test]
    fn test_request_timer_reports_latency() {
        let timer = RequestTimer::start("GET", "/plan/me");
        let ms = timer.finish(Some(200));
        assert!(ms >= 0.0);
    }
}
