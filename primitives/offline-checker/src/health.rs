//! Keep-alive health endpoint.
//!
//! Hosting platforms that put idle processes to sleep can ping `GET /` or
//! `GET /health` to keep the checker running and see how the last tick went.

use crate::poller::PollState;
use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::RwLock};

pub type SharedHealth = Arc<RwLock<HealthStatus>>;

/// What the poller last reported.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HealthStatus {
    pub ticks: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub offline: Option<usize>,
    pub website: Option<usize>,
}

/// Body of the health response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    ticks: u64,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
    offline: Option<usize>,
    website: Option<usize>,
}

impl HealthStatus {
    pub fn record(&mut self, state: &PollState) {
        self.ticks = state.ticks;
        self.last_success = state.last_success;
        self.last_error = state.last_error.clone();
        self.offline = state.last_report.as_ref().map(|r| r.offline_count);
        self.website = state.last_report.as_ref().map(|r| r.website_count);
    }

    /// `starting` before the first tick, `ok` when the latest tick
    /// succeeded, `degraded` otherwise.
    pub fn status(&self) -> &'static str {
        if self.ticks == 0 {
            "starting"
        } else if self.last_error.is_none() {
            "ok"
        } else {
            "degraded"
        }
    }
}

async fn handle_health(State(health): State<SharedHealth>) -> Json<HealthResponse> {
    let health = health.read().await;

    Json(HealthResponse {
        status: health.status(),
        ticks: health.ticks,
        last_success: health.last_success,
        last_error: health.last_error.clone(),
        offline: health.offline,
        website: health.website,
    })
}

pub fn router(health: SharedHealth) -> Router {
    Router::new()
        .route("/", get(handle_health))
        .route("/health", get(handle_health))
        .with_state(health)
}

/// Serves the health endpoint on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    health: SharedHealth,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(health).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use presence_report::{ReportFormatter, Snapshot};
    use serde_json::Value;
    use tokio::sync::oneshot;

    #[test]
    fn status_reflects_last_tick() {
        let mut health = HealthStatus::default();
        assert_eq!(health.status(), "starting");

        let mut state = PollState {
            ticks: 1,
            last_report: Some(ReportFormatter::default().format(&Snapshot::default(), Utc::now())),
            last_success: Some(Utc::now()),
            last_error: None,
        };
        health.record(&state);
        assert_eq!(health.status(), "ok");
        assert_eq!(health.offline, Some(0));

        state.ticks = 2;
        state.last_error = Some("timeout".into());
        health.record(&state);
        assert_eq!(health.status(), "degraded");
        assert_eq!(health.offline, Some(0));
    }

    #[tokio::test]
    async fn serves_health_json() {
        let health: SharedHealth = Arc::new(RwLock::new(HealthStatus {
            ticks: 3,
            offline: Some(2),
            website: Some(1),
            ..Default::default()
        }));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, health, async move {
            let _ = stop_rx.await;
        }));

        let body: Value = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["status"], "ok");
        assert_eq!(body["ticks"], 3);
        assert_eq!(body["offline"], 2);
        assert_eq!(body["website"], 1);
        assert_eq!(body["last_error"], Value::Null);

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
