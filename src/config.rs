//! Engine configuration.
//!
//! Loaded from a YAML file (every field optional), then overridden from the
//! environment:
//!
//! - `LYRICAT_THREADS_COUNT` → [`EngineConfig::workers`]
//! - `LYRICAT_RETRY_COUNT` → [`EngineConfig::retry_count`]
//! - `LYRICAT_APP_ID` → [`UpstreamConfig::app_id`]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Songs counted from the old era
pub const OLD_ERA_SIZE: usize = 35;

/// Songs counted from the new era
pub const NEW_ERA_SIZE: usize = 15;

/// Where the game backend lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    /// Path prefix in front of `/parse/...`
    pub base_url: String,
    /// Sent as `X-Parse-Application-Id`
    pub app_id: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "lyrica.example.com".to_string(),
            port: 443,
            ssl: true,
            base_url: "/".to_string(),
            app_id: String::new(),
        }
    }
}

impl UpstreamConfig {
    /// Absolute URL of a backend path such as `parse/sessions/me`
    pub fn url(&self, path: &str) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        let base = self.base_url.trim_matches('/');
        let path = path.trim_start_matches('/');
        if base.is_empty() {
            format!("{}://{}:{}/{}", scheme, self.host, self.port, path)
        } else {
            format!("{}://{}:{}/{}/{}", scheme, self.host, self.port, base, path)
        }
    }
}

/// Timeouts in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// TCP connection timeout
    pub connect: f64,

    /// Whole request timeout
    pub read: f64,

    /// Deadline for one score fetch including retries
    pub score_call: Option<f64>,

    /// Deadline for one whole best-N batch
    pub batch: Option<f64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: 5.0,
            read: 30.0,
            score_call: None,
            batch: None,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs_f64(self.connect)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs_f64(self.read)
    }

    pub fn score_call(&self) -> Option<Duration> {
        self.score_call.map(Duration::from_secs_f64)
    }

    pub fn batch(&self) -> Option<Duration> {
        self.batch.map(Duration::from_secs_f64)
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            ("connect", Some(self.connect)),
            ("read", Some(self.read)),
            ("score_call", self.score_call),
            ("batch", self.batch),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(EngineError::Config(format!(
                        "timeouts.{} must be a positive number of seconds, got {}",
                        name, v
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for TimeoutConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connect={}s, read={}s", self.connect, self.read)?;
        if let Some(call) = self.score_call {
            write!(f, ", score_call={}s", call)?;
        }
        if let Some(batch) = self.batch {
            write!(f, ", batch={}s", batch)?;
        }
        Ok(())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub upstream: UpstreamConfig,

    /// Max simultaneous in-flight score fetches
    pub workers: usize,

    /// Attempts per upstream request when it times out
    pub retry_count: u32,

    pub timeouts: TimeoutConfig,

    /// Tokens expiring within this many milliseconds count as expired
    pub expiration_margin: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            workers: 8,
            retry_count: 3,
            timeouts: TimeoutConfig::default(),
            expiration_margin: 0,
        }
    }
}

impl EngineConfig {
    /// Parse YAML, apply env overrides and validate
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::from_yaml_with_env(yaml, |key| std::env::var(key).ok())
    }

    fn from_yaml_with_env<F>(yaml: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: EngineConfig = if yaml.trim().is_empty() {
            EngineConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; a missing file means all defaults
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = read_config(path.as_ref()).await?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply overrides from a key lookup (the process environment in practice)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LYRICAT_THREADS_COUNT") {
            self.workers = parse_env("LYRICAT_THREADS_COUNT", &v)?;
        }
        if let Some(v) = lookup("LYRICAT_RETRY_COUNT") {
            self.retry_count = parse_env("LYRICAT_RETRY_COUNT", &v)?;
        }
        if let Some(v) = lookup("LYRICAT_APP_ID") {
            self.upstream.app_id = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(EngineError::Config("workers must be at least 1".to_string()));
        }
        if self.retry_count == 0 {
            return Err(EngineError::Config("retry_count must be at least 1".to_string()));
        }
        self.timeouts.validate()
    }
}

/// File contents, or nothing when the file does not exist
async fn read_config(path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(yaml) => Ok(yaml),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("⚠️ Config {} not found, using defaults", path.display());
            Ok(String::new())
        }
        Err(e) => Err(e.into()),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::Config(format!("{} is not a valid number: {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.workers, 8);
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.timeouts.connect, 5.0);
        assert_eq!(config.timeouts.read, 30.0);
        assert_eq!(config.timeouts.batch, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "workers: 32\n\
                    upstream:\n  host: api.example.net\n  ssl: false\n  port: 8080\n\
                    timeouts:\n  score_call: 2.5\n";
        let mut config: EngineConfig = serde_yaml::from_str(yaml).unwrap();
        config.apply_env(no_env).unwrap();
        assert_eq!(config.workers, 32);
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.upstream.host, "api.example.net");
        assert_eq!(config.timeouts.read, 30.0);
        assert_eq!(config.timeouts.score_call(), Some(Duration::from_millis(2500)));
        assert_eq!(
            config.upstream.url("parse/functions/AskMyLeaderBoard"),
            "http://api.example.net:8080/parse/functions/AskMyLeaderBoard"
        );
    }

    #[test]
    fn test_url_with_base() {
        let upstream = UpstreamConfig {
            base_url: "/v2/".to_string(),
            ..UpstreamConfig::default()
        };
        assert_eq!(
            upstream.url("/parse/sessions/me"),
            "https://lyrica.example.com:443/v2/parse/sessions/me"
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LYRICAT_THREADS_COUNT", "64"),
            ("LYRICAT_RETRY_COUNT", " 5 "),
            ("LYRICAT_APP_ID", "app"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.workers, 64);
        assert_eq!(config.retry_count, 5);
        assert_eq!(config.upstream.app_id, "app");
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_env(|key| (key == "LYRICAT_THREADS_COUNT").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_validation() {
        let config = EngineConfig {
            workers: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.timeouts.batch = Some(-1.0);
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.timeouts.read = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let missing = Path::new("/nonexistent/lyricat.yml");
        let yaml = tokio_test::block_on(read_config(missing)).unwrap();
        assert!(yaml.is_empty());
        let config = EngineConfig::from_yaml_with_env(&yaml, no_env).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_yaml_with_env_validates() {
        let err = EngineConfig::from_yaml_with_env("workers: 4\n", |key| {
            (key == "LYRICAT_RETRY_COUNT").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_display() {
        let mut timeouts = TimeoutConfig::default();
        assert_eq!(timeouts.to_string(), "connect=5s, read=30s");
        timeouts.batch = Some(60.0);
        assert_eq!(timeouts.to_string(), "connect=5s, read=30s, batch=60s");
    }
}
