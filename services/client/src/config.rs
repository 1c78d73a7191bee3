use anyhow::{bail, Context};
use serde::Deserialize;
use shared::{
    BetRecord, ErrorCategory, ValidationError, DEFAULT_BATCH_MAX_AMOUNT, DEFAULT_BATCH_MAX_BYTES,
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_POLL_DELAY_MS, FIELD_SEPARATOR, LINE_TERMINATOR,
    MAX_FRAME_PAYLOAD,
};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::batching::BatchLimits;
use crate::codec::MessageType;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub server_address: String,
    pub connect_timeout_ms: u64,
    pub file_path: Option<PathBuf>,
    pub batch: BatchConfig,
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    pub max_amount: usize,
    pub max_bytes: usize,
    pub skip_invalid_rows: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    pub delay_ms: u64,
    /// 0 means unbounded
    pub max_attempts: u32,
}

impl ClientConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: String| lookup(key).unwrap_or(default);

        let config = ClientConfig {
            client_id: lookup("CLI_ID").context("CLI_ID must be set")?,
            server_address: var("CLI_SERVER_ADDRESS", "server:12345".to_string()),
            connect_timeout_ms: var("CLI_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS.to_string())
                .parse()
                .context("CLI_CONNECT_TIMEOUT_MS must be an integer")?,
            file_path: lookup("CLI_FILE_PATH")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            batch: BatchConfig {
                max_amount: var("CLI_BATCH_MAX_AMOUNT", DEFAULT_BATCH_MAX_AMOUNT.to_string())
                    .parse()
                    .context("CLI_BATCH_MAX_AMOUNT must be an integer")?,
                max_bytes: var("CLI_BATCH_MAX_BYTES", DEFAULT_BATCH_MAX_BYTES.to_string())
                    .parse()
                    .context("CLI_BATCH_MAX_BYTES must be an integer")?,
                skip_invalid_rows: var("CLI_SKIP_INVALID_ROWS", "false".to_string())
                    .parse()
                    .context("CLI_SKIP_INVALID_ROWS must be true or false")?,
            },
            poll: PollConfig {
                delay_ms: var("CLI_LOOP_PERIOD_MS", DEFAULT_POLL_DELAY_MS.to_string())
                    .parse()
                    .context("CLI_LOOP_PERIOD_MS must be an integer")?,
                max_attempts: var("CLI_LOOP_AMOUNT", "0".to_string())
                    .parse()
                    .context("CLI_LOOP_AMOUNT must be an integer")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.client_id.is_empty()
            || self.client_id.contains(FIELD_SEPARATOR)
            || self.client_id.contains(LINE_TERMINATOR)
        {
            bail!("CLI_ID must be non-empty and free of '|' and newlines");
        }

        if self.batch.max_amount == 0 {
            bail!("CLI_BATCH_MAX_AMOUNT must be at least 1");
        }

        // the "bets" tag line shares the frame with the records
        let max_bytes = MAX_FRAME_PAYLOAD - (MessageType::Bets.as_str().len() + 1);
        if self.batch.max_bytes == 0 || self.batch.max_bytes > max_bytes {
            bail!("CLI_BATCH_MAX_BYTES must be between 1 and {}", max_bytes);
        }

        Ok(())
    }

    pub fn batch_limits(&self) -> BatchLimits {
        BatchLimits {
            max_amount: self.batch.max_amount,
            max_bytes: self.batch.max_bytes,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll.delay_ms)
    }
}

/// Log a configuration failure the way other fatal errors are logged
pub fn log_load_error(err: &anyhow::Error) {
    tracing::error!(
        error_category = %ErrorCategory::Config,
        error = %format!("{err:#}"),
        "Failed to load configuration"
    );
}

/// Read the single bet placed through environment variables
pub fn bet_from_env(client_id: &str) -> Result<BetRecord, ValidationError> {
    bet_from_lookup(client_id, |key| env::var(key).ok())
}

pub fn bet_from_lookup<F>(client_id: &str, lookup: F) -> Result<BetRecord, ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).unwrap_or_default();

    BetRecord::new(
        client_id,
        var("NOMBRE"),
        var("APELLIDO"),
        var("DOCUMENTO"),
        var("NACIMIENTO"),
        var("NUMERO"),
    )
}
