//! Error type shared by the checker's collaborators.

use presence_report::SnapshotError;

#[derive(Debug, thiserror::Error)]
pub enum CheckerError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("discord api error ({status}): {body}")]
    Discord { status: u16, body: String },

    #[error("discord rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: f64 },

    #[error("channel {0} is not a text channel")]
    NotTextChannel(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
