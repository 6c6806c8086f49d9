//! Command-line and environment configuration.

use crate::error::CheckerError;
use clap::Parser;
use presence_report::{ReportFormatter, Thresholds};
use std::time::Duration;

/// Polls a presence API and keeps a Discord status message up to date.
#[derive(Parser, Debug, Clone)]
#[command(name = "offline-checker")]
#[command(about = "Publishes an offline member report into a single Discord message")]
pub struct Args {
    /// Presence API endpoint returning the member batch.
    #[arg(
        long,
        env = "OFFLINE_CHECKER_API_URL",
        default_value = "https://api.shiba99.com/batch/C4T6"
    )]
    pub api_url: String,

    /// Discord bot token.
    #[arg(long, env = "OFFLINE_CHECKER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Channel holding the status message.
    #[arg(short, long, env = "OFFLINE_CHECKER_CHANNEL_ID")]
    pub channel_id: Option<String>,

    /// Seconds between checks.
    #[arg(
        short,
        long,
        env = "OFFLINE_CHECKER_INTERVAL",
        default_value = "120",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval: u64,

    /// Minutes without activity before a member is reported offline.
    #[arg(long, env = "OFFLINE_CHECKER_OFFLINE_THRESHOLD", default_value = "20")]
    pub offline_threshold: f64,

    /// Minutes without activity after which no duration is shown.
    #[arg(long, env = "OFFLINE_CHECKER_LONG_GONE_THRESHOLD", default_value = "2880")]
    pub long_gone_threshold: f64,

    /// Report title.
    #[arg(long, env = "OFFLINE_CHECKER_TITLE", default_value = "C4T6 Offline Members")]
    pub title: String,

    /// Report footer text.
    #[arg(
        long,
        env = "OFFLINE_CHECKER_FOOTER",
        default_value = "Shiba offline checker for C4T6"
    )]
    pub footer: String,

    /// Discord REST API base URL.
    #[arg(
        long,
        env = "OFFLINE_CHECKER_DISCORD_API",
        default_value = "https://discord.com/api/v10"
    )]
    pub discord_api: String,

    /// HTTP request timeout in seconds.
    #[arg(
        short,
        long,
        env = "OFFLINE_CHECKER_TIMEOUT",
        default_value = "30",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Print reports to stdout instead of publishing them.
    #[arg(long, env = "OFFLINE_CHECKER_DRY_RUN")]
    pub dry_run: bool,

    /// Pretty-print JSON in dry-run mode.
    #[arg(short, long, env = "OFFLINE_CHECKER_PRETTY")]
    pub pretty: bool,

    /// Serve a keep-alive health endpoint on this port.
    #[arg(long, env = "OFFLINE_CHECKER_HEALTH_PORT")]
    pub health_port: Option<u16>,
}

/// Where rendered reports go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    Console {
        pretty: bool,
    },
    Discord {
        token: String,
        channel_id: String,
        api_base: String,
    },
}

/// Validated settings, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub formatter: ReportFormatter,
    pub publish: PublishTarget,
    pub health_port: Option<u16>,
}

impl Args {
    /// Checks the arguments and turns them into [`Settings`].
    pub fn into_settings(self) -> Result<Settings, CheckerError> {
        let thresholds = Thresholds {
            offline_minutes: self.offline_threshold,
            long_gone_minutes: self.long_gone_threshold,
        };

        if !thresholds.offline_minutes.is_finite() || thresholds.offline_minutes < 0.0 {
            return Err(CheckerError::Config(format!(
                "offline threshold must be a non-negative number of minutes, got {}",
                thresholds.offline_minutes
            )));
        }

        if !thresholds.long_gone_minutes.is_finite()
            || thresholds.long_gone_minutes <= thresholds.offline_minutes
        {
            return Err(CheckerError::Config(format!(
                "long-gone threshold ({}) must exceed the offline threshold ({})",
                thresholds.long_gone_minutes, thresholds.offline_minutes
            )));
        }

        let publish = if self.dry_run {
            PublishTarget::Console {
                pretty: self.pretty,
            }
        } else {
            let token = non_empty(self.token, "a Discord token is required unless --dry-run is set")?;
            let channel_id = non_empty(
                self.channel_id,
                "a channel id is required unless --dry-run is set",
            )?;
            PublishTarget::Discord {
                token,
                channel_id,
                api_base: self.discord_api.trim_end_matches('/').to_string(),
            }
        };

        Ok(Settings {
            api_url: self.api_url,
            interval: Duration::from_secs(self.interval),
            timeout: Duration::from_secs(self.timeout),
            formatter: ReportFormatter::default()
                .with_title(self.title)
                .with_footer(self.footer)
                .with_thresholds(thresholds),
            publish,
            health_port: self.health_port,
        })
    }
}

fn non_empty(value: Option<String>, message: &str) -> Result<String, CheckerError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CheckerError::Config(message.to_string()))
}
