//! Runtime configuration for the device processor.
//!
//! [`Cli`] is what the binary parses from arguments and environment;
//! [`ProcessorConfig`] is the validated form the library consumes.

use crate::domain::transaction::Mode;
use crate::error::{ProcessorError, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Base URL of the authentication device.
    pub device_url: String,
    pub mode: Mode,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Time the device may spend with the user; sent with sync requests.
    pub auth_timeout: Duration,
    pub poll_interval: Duration,
    pub max_poll_wait: Duration,
    /// Number of background workers running strategies.
    pub workers: usize,
    /// Transactions that may wait for a free worker.
    pub queue_capacity: usize,
    /// Age at which an unanswered async correlation entry is failed.
    pub correlation_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            device_url: "http://localhost:3000/api/authenticate".to_string(),
            mode: Mode::Sync,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(130),
            auth_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            max_poll_wait: Duration::from_secs(130),
            workers: 8,
            queue_capacity: 256,
            correlation_ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl ProcessorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.device_url.is_empty() {
            return Err(ProcessorError::Config("device URL must not be empty".into()));
        }
        if self.workers == 0 {
            return Err(ProcessorError::Config("at least one worker is required".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ProcessorError::Config("queue capacity must be positive".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ProcessorError::Config("poll interval must be positive".into()));
        }
        if self.sweep_interval.is_zero() {
            return Err(ProcessorError::Config("sweep interval must be positive".into()));
        }
        if self.mode == Mode::Sync && self.read_timeout <= self.auth_timeout {
            return Err(ProcessorError::Config(
                "read timeout must be longer than the device authentication timeout".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(name = "ciba-device", author, version, about, long_about = None)]
pub struct Cli {
    /// Address the callback endpoint listens on
    #[arg(long, env = "CIBA_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Base URL of the authentication device
    #[arg(long, env = "CIBA_DEVICE_URL", default_value = "http://localhost:3000/api/authenticate")]
    pub device_url: String,

    /// Device communication mode: sync, async or poll
    #[arg(long, env = "CIBA_MODE", default_value = "sync")]
    pub mode: String,

    #[arg(long, env = "CIBA_CONNECT_TIMEOUT_MS", default_value_t = 5_000)]
    pub connect_timeout_ms: u64,

    #[arg(long, env = "CIBA_READ_TIMEOUT_MS", default_value_t = 130_000)]
    pub read_timeout_ms: u64,

    /// Seconds the device may spend authenticating the user
    #[arg(long, env = "CIBA_AUTH_TIMEOUT_SECS", default_value_t = 120)]
    pub auth_timeout_secs: u64,

    #[arg(long, env = "CIBA_POLL_INTERVAL_MS", default_value_t = 2_000)]
    pub poll_interval_ms: u64,

    #[arg(long, env = "CIBA_MAX_POLL_WAIT_SECS", default_value_t = 130)]
    pub max_poll_wait_secs: u64,

    #[arg(long, env = "CIBA_WORKERS", default_value_t = 8)]
    pub workers: usize,

    #[arg(long, env = "CIBA_QUEUE_CAPACITY", default_value_t = 256)]
    pub queue_capacity: usize,

    /// Seconds before an unanswered async request is failed
    #[arg(long, env = "CIBA_CORRELATION_TTL_SECS", default_value_t = 600)]
    pub correlation_ttl_secs: u64,

    #[arg(long, env = "CIBA_SWEEP_INTERVAL_SECS", default_value_t = 30)]
    pub sweep_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "CIBA_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl TryFrom<&Cli> for ProcessorConfig {
    type Error = ProcessorError;

    fn try_from(cli: &Cli) -> Result<Self> {
        let config = ProcessorConfig {
            device_url: cli.device_url.clone(),
            mode: cli.mode.parse()?,
            connect_timeout: Duration::from_millis(cli.connect_timeout_ms),
            read_timeout: Duration::from_millis(cli.read_timeout_ms),
            auth_timeout: Duration::from_secs(cli.auth_timeout_secs),
            poll_interval: Duration::from_millis(cli.poll_interval_ms),
            max_poll_wait: Duration::from_secs(cli.max_poll_wait_secs),
            workers: cli.workers,
            queue_capacity: cli.queue_capacity,
            correlation_ttl: Duration::from_secs(cli.correlation_ttl_secs),
            sweep_interval: Duration::from_secs(cli.sweep_interval_secs),
        };
        config.validate()?;
        Ok(config)
    }
}
