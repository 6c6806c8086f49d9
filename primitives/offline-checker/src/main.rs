//! Offline Checker - Member Presence Reporter
//!
//! Polls a presence API on a fixed interval and keeps a single Discord
//! message up to date with who is offline, for how long, and who is on the
//! website.
//!
//! A failed check leaves the previously published report in place; the next
//! tick tries again.
//!
//! # Usage
//!
//! ```bash
//! # Publish into a channel every 120 seconds
//! offline-checker --token "$BOT_TOKEN" --channel-id 1256526266316619837
//!
//! # Check every minute against another batch
//! offline-checker --api-url https://api.shiba99.com/batch/C4T7 --interval 60
//!
//! # Print reports instead of publishing them
//! offline-checker --dry-run --pretty
//!
//! # Answer keep-alive pings on port 8080
//! offline-checker --health-port 8080
//! ```

mod api;
mod config;
mod console;
mod discord;
mod error;
mod health;
mod poller;

use anyhow::Context;
use api::PresenceApi;
use clap::Parser;
use config::{Args, PublishTarget, Settings};
use console::ConsolePublisher;
use discord::{DiscordPublisher, DiscordSession};
use health::{HealthStatus, SharedHealth};
use poller::Poller;
use std::{future::Future, net::SocketAddr, sync::Arc};
use tokio::{
    net::TcpListener,
    signal::unix::{SignalKind, signal},
    sync::{RwLock, watch},
};

/// Waits for SIGTERM or Ctrl-C.
///
/// If the Ctrl-C handler cannot be installed, the failure is logged and only
/// SIGTERM stops the checker.
async fn stop_requested(
    sigterm: impl Future<Output = Option<()>>,
    ctrl_c: impl Future<Output = std::io::Result<()>>,
) {
    let ctrl_c = async {
        match ctrl_c.await {
            Ok(()) => tracing::info!("received Ctrl-C"),
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for Ctrl-C, waiting for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = sigterm => tracing::info!("received SIGTERM"),
        () = ctrl_c => {}
    }
}

/// Resolves once a stop has been requested.
async fn stopped(mut stop: watch::Receiver<bool>) {
    let _ = stop.wait_for(|stop| *stop).await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings: Settings = Args::parse().into_settings()?;

    // Set up SIGTERM/Ctrl-C handling for graceful shutdown
    let mut sigterm = signal(SignalKind::terminate())?;
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        stop_requested(sigterm.recv(), tokio::signal::ctrl_c()).await;
        let _ = stop_tx.send(true);
    });

    let health: SharedHealth = Arc::new(RwLock::new(HealthStatus::default()));
    if let Some(port) = settings.health_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind health endpoint on {addr}"))?;
        tracing::info!(%addr, "serving health endpoint");

        let status = Arc::clone(&health);
        let stop = stopped(stop_rx.clone());
        tokio::spawn(async move {
            if let Err(e) = health::serve(listener, status, stop).await {
                tracing::error!(error = %e, "health endpoint failed");
            }
        });
    }

    let source = PresenceApi::new(settings.api_url.clone(), settings.timeout)?;
    tracing::info!(
        url = source.url(),
        interval_secs = settings.interval.as_secs(),
        "starting offline checker"
    );

    match settings.publish {
        PublishTarget::Console { pretty } => {
            let mut poller = Poller::new(source, ConsolePublisher::new(pretty), settings.formatter)
                .with_health(health);
            poller.run(settings.interval, stopped(stop_rx)).await;
            tracing::info!(ticks = poller.state().ticks, "poller stopped");
        }
        PublishTarget::Discord {
            token,
            channel_id,
            api_base,
        } => {
            let session = DiscordSession::connect(token, api_base, settings.timeout)
                .await
                .context("failed to log in to discord")?;
            let message = session
                .status_message(&channel_id)
                .await
                .with_context(|| format!("failed to set up status message in channel {channel_id}"))?;

            let mut poller = Poller::new(
                source,
                DiscordPublisher::new(session, message),
                settings.formatter,
            )
            .with_health(health);
            poller.run(settings.interval, stopped(stop_rx)).await;
            tracing::info!(ticks = poller.state().ticks, "poller stopped");

            poller.into_sink().into_session().disconnect();
        }
    }

    tracing::info!("offline checker stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test(start_paused = true)]
    async fn failed_ctrl_c_waits_for_sigterm() {
        let (term_tx, term_rx) = oneshot::channel::<()>();
        let stop = stop_requested(async move { term_rx.await.ok() }, async {
            Err(std::io::Error::other("no signal handler"))
        });
        tokio::pin!(stop);

        let early = tokio::time::timeout(Duration::from_secs(60), &mut stop).await;
        assert!(early.is_err(), "stopped without a signal");

        term_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), stop)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ctrl_c_stops() {
        stop_requested(std::future::pending(), async { Ok(()) }).await;
    }

    #[tokio::test]
    async fn sigterm_stops() {
        stop_requested(async { Some(()) }, std::future::pending()).await;
    }
}
