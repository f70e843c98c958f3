use clap::Parser;
use std::time::Duration;

use crate::service::PollingConfig;

/// Match result acquisition and webhook notification service
#[derive(Parser, Debug, Clone)]
#[command(name = "result-service", version, about)]
pub struct Config {
    /// HTTP API listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "results.db")]
    pub database_path: String,

    /// Football API base URL
    #[arg(
        long,
        env = "FOOTBALL_API_URL",
        default_value = "https://api-football-v1.p.rapidapi.com/v3"
    )]
    pub football_api_url: String,

    /// Football API key
    #[arg(long, env = "FOOTBALL_API_KEY")]
    pub football_api_key: String,

    /// Timezone passed to fixture searches
    #[arg(long, env = "FOOTBALL_API_TIMEZONE", default_value = "UTC")]
    pub football_api_timezone: String,

    /// Minutes between kickoff and the first result check
    #[arg(long, env = "POLLING_FIRST_ATTEMPT_DELAY_MINS", default_value = "115")]
    pub polling_first_attempt_delay_mins: u64,

    /// Minutes between result checks
    #[arg(long, env = "POLLING_INTERVAL_MINS", default_value = "15")]
    pub polling_interval_mins: u64,

    /// Result checks allowed after the first one
    #[arg(long, env = "POLLING_MAX_RETRIES", default_value = "5")]
    pub polling_max_retries: u32,

    /// Seconds between notification sweeps
    #[arg(long, env = "NOTIFY_INTERVAL_SECS", default_value = "60")]
    pub notify_interval_secs: u64,

    /// Timeout of outgoing HTTP requests in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "10")]
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.football_api_key.trim().is_empty() {
            anyhow::bail!("FOOTBALL_API_KEY must not be empty");
        }
        if self.polling_interval_mins == 0 {
            anyhow::bail!("polling_interval_mins must be greater than zero");
        }
        if self.notify_interval_secs == 0 {
            anyhow::bail!("notify_interval_secs must be greater than zero");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("http_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn polling(&self) -> PollingConfig {
        PollingConfig {
            first_attempt_delay: Duration::from_secs(self.polling_first_attempt_delay_mins * 60),
            interval: Duration::from_secs(self.polling_interval_mins * 60),
            max_retries: self.polling_max_retries,
        }
    }

    pub fn notify_interval(&self) -> Duration {
        Duration::from_secs(self.notify_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
