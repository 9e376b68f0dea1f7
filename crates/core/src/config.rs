use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracelensError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub ingest_http_addr: String,
    pub query_tcp_addr: String,
    pub uds_path: PathBuf,
    pub trace_log_limit: usize,
    pub aggregation_interval: Duration,
    pub aggregation_min_window: Duration,
    pub write_batch_size: usize,
    pub write_flush_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let xdg_runtime = env::var("XDG_RUNTIME_DIR").ok();
        let data_home = env::var("XDG_DATA_HOME").ok();

        let data_root = data_home
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(home).join(".local/share"));

        let uds_path = xdg_runtime
            .map(PathBuf::from)
            .unwrap_or_else(|| data_root.join("tracelens"))
            .join("tracelens.sock");

        Self {
            db_path: data_root.join("tracelens/tracelens.duckdb"),
            ingest_http_addr: "127.0.0.1:4380".to_string(),
            query_tcp_addr: "127.0.0.1:4381".to_string(),
            uds_path,
            trace_log_limit: 1000,
            aggregation_interval: Duration::from_secs(10 * 60),
            aggregation_min_window: Duration::from_secs(60),
            write_batch_size: 2048,
            write_flush_ms: 200,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trace_log_limit == 0 {
            return Err(TracelensError::Config(
                "trace_log_limit must be at least 1".to_string(),
            ));
        }
        if self.aggregation_interval.is_zero() {
            return Err(TracelensError::Config(
                "aggregation_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    db_path: Option<PathBuf>,
    ingest_http_addr: Option<String>,
    query_tcp_addr: Option<String>,
    uds_path: Option<PathBuf>,
    trace_log_limit: Option<usize>,
    aggregation_interval: Option<String>,
    aggregation_min_window: Option<String>,
    write_batch_size: Option<usize>,
    write_flush_ms: Option<u64>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("TRACELENS_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("tracelens/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| TracelensError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| TracelensError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    Ok(ConfigOverrides {
        db_path: env::var("TRACELENS_DB_PATH").ok().map(PathBuf::from),
        ingest_http_addr: env::var("TRACELENS_INGEST_HTTP_ADDR").ok(),
        query_tcp_addr: env::var("TRACELENS_QUERY_TCP_ADDR").ok(),
        uds_path: env::var("TRACELENS_QUERY_UDS_PATH").ok().map(PathBuf::from),
        trace_log_limit: parse_env_number("TRACELENS_TRACE_LOG_LIMIT")?,
        aggregation_interval: env::var("TRACELENS_AGGREGATION_INTERVAL").ok(),
        aggregation_min_window: env::var("TRACELENS_AGGREGATION_MIN_WINDOW").ok(),
        write_batch_size: parse_env_number("TRACELENS_WRITE_BATCH_SIZE")?,
        write_flush_ms: parse_env_number("TRACELENS_WRITE_FLUSH_MS")?,
    })
}

fn parse_env_number<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| TracelensError::Config(format!("bad {key} in environment: {e}"))),
        Err(_) => Ok(None),
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.db_path {
        cfg.db_path = v;
    }
    if let Some(v) = overrides.ingest_http_addr {
        cfg.ingest_http_addr = v;
    }
    if let Some(v) = overrides.query_tcp_addr {
        cfg.query_tcp_addr = v;
    }
    if let Some(v) = overrides.uds_path {
        cfg.uds_path = v;
    }
    if let Some(v) = overrides.trace_log_limit {
        cfg.trace_log_limit = v;
    }
    if let Some(v) = overrides.aggregation_interval {
        cfg.aggregation_interval = humantime::parse_duration(&v).map_err(|e| {
            TracelensError::Config(format!(
                "bad aggregation_interval in {source}: {e} (value={v})"
            ))
        })?;
    }
    if let Some(v) = overrides.aggregation_min_window {
        cfg.aggregation_min_window = humantime::parse_duration(&v).map_err(|e| {
            TracelensError::Config(format!(
                "bad aggregation_min_window in {source}: {e} (value={v})"
            ))
        })?;
    }
    if let Some(v) = overrides.write_batch_size {
        cfg.write_batch_size = v;
    }
    if let Some(v) = overrides.write_flush_ms {
        cfg.write_flush_ms = v;
    }
    Ok(())
}
