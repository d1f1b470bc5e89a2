/// Configuration management
use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:3001";

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the CoHub REST backend
    pub backend_url: String,

    /// Logged-in viewer's user id
    pub viewer_id: Option<String>,

    /// Data directory for local read-state (defaults to `.cohub/<viewer>`)
    pub data_dir: Option<PathBuf>,

    /// Interval between conversation-summary refreshes
    pub summary_poll_interval: Duration,

    /// Interval between open-conversation transcript refreshes
    pub conversation_poll_interval: Duration,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            viewer_id: None,
            data_dir: None,
            summary_poll_interval: Duration::from_secs(5),
            conversation_poll_interval: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Create config from command line arguments
    pub fn from_args(args: &[String]) -> Result<Self> {
        if args.len() < 2 {
            return Err(ClientError::Config(format!(
                "Usage: {} <viewer_id> [--backend <url>] [--data-dir <path>] [--summary-interval-ms <n>] [--chat-interval-ms <n>] [--request-timeout-ms <n>]",
                args.first().unwrap_or(&"cohub".to_string())
            )));
        }

        let viewer_id = args[1].clone();
        if viewer_id.is_empty() || viewer_id.starts_with("--") {
            return Err(ClientError::Config(
                "First argument must be the viewer's user id".to_string(),
            ));
        }

        let mut backend_url: Option<String> = None;
        let mut data_dir: Option<PathBuf> = None;
        let mut summary_ms: Option<u64> = None;
        let mut chat_ms: Option<u64> = None;
        let mut timeout_ms: Option<u64> = None;

        let mut i = 2;
        while i < args.len() {
            match args[i].as_str() {
                "--backend" => {
                    let url = args.get(i + 1).ok_or_else(|| {
                        ClientError::Config("--backend requires a URL argument".to_string())
                    })?;
                    backend_url = Some(url.clone());
                    i += 2;
                }
                "--data-dir" => {
                    let path = args.get(i + 1).ok_or_else(|| {
                        ClientError::Config("--data-dir requires a path argument".to_string())
                    })?;
                    data_dir = Some(PathBuf::from(path));
                    i += 2;
                }
                "--summary-interval-ms" => {
                    summary_ms = Some(parse_ms(args.get(i + 1), "--summary-interval-ms")?);
                    i += 2;
                }
                "--chat-interval-ms" => {
                    chat_ms = Some(parse_ms(args.get(i + 1), "--chat-interval-ms")?);
                    i += 2;
                }
                "--request-timeout-ms" => {
                    timeout_ms = Some(parse_ms(args.get(i + 1), "--request-timeout-ms")?);
                    i += 2;
                }
                other => {
                    return Err(ClientError::Config(format!("Unknown flag: {}", other)));
                }
            }
        }

        // Env overrides (nice for scripts)
        if let Ok(url) = std::env::var("COHUB_BACKEND_URL") {
            backend_url = Some(url);
        }
        if let Ok(dir) = std::env::var("COHUB_DATA_DIR") {
            data_dir = Some(PathBuf::from(dir));
        }

        let defaults = Config::default();
        Ok(Self {
            backend_url: backend_url.unwrap_or(defaults.backend_url),
            viewer_id: Some(viewer_id),
            data_dir,
            summary_poll_interval: summary_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.summary_poll_interval),
            conversation_poll_interval: chat_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.conversation_poll_interval),
            request_timeout: timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
        })
    }
}

fn parse_ms(arg: Option<&String>, flag: &str) -> Result<u64> {
    let raw = arg
        .ok_or_else(|| ClientError::Config(format!("{} requires a millisecond value", flag)))?;
    raw.parse::<u64>()
        .map_err(|_| ClientError::Config(format!("{} must be a number of milliseconds", flag)))
}
