//! Fetch, format and publish on a fixed interval.

use crate::error::CheckerError;
use crate::health::SharedHealth;
use chrono::{DateTime, Utc};
use presence_report::{Report, ReportFormatter, Snapshot};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Where snapshots come from.
pub trait SnapshotSource {
    async fn fetch(&self) -> Result<Snapshot, CheckerError>;
}

/// Where rendered reports go.
pub trait ReportSink {
    async fn publish(&mut self, report: &Report) -> Result<(), CheckerError>;
}

/// State carried from one tick to the next.
#[derive(Debug, Default, Clone)]
pub struct PollState {
    /// The report currently on display.
    pub last_report: Option<Report>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub ticks: u64,
}

pub struct Poller<S, P> {
    source: S,
    sink: P,
    formatter: ReportFormatter,
    state: PollState,
    health: Option<SharedHealth>,
}

impl<S: SnapshotSource, P: ReportSink> Poller<S, P> {
    pub fn new(source: S, sink: P, formatter: ReportFormatter) -> Self {
        Self {
            source,
            sink,
            formatter,
            state: PollState::default(),
            health: None,
        }
    }

    /// Mirrors the poll state into `health` after every tick.
    pub fn with_health(mut self, health: SharedHealth) -> Self {
        self.health = Some(health);
        self
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn into_sink(self) -> P {
        self.sink
    }

    /// Runs one fetch, format, publish pass.
    ///
    /// On failure nothing is published, so the previous report stays on
    /// display until a later tick succeeds.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<Report, CheckerError> {
        self.state.ticks += 1;

        let result = match self.render_and_publish(now).await {
            Ok(report) => {
                self.state.last_success = Some(now);
                self.state.last_error = None;
                self.state.last_report = Some(report.clone());
                Ok(report)
            }
            Err(e) => {
                self.state.last_error = Some(e.to_string());
                Err(e)
            }
        };

        if let Some(health) = &self.health {
            health.write().await.record(&self.state);
        }

        result
    }

    async fn render_and_publish(&mut self, now: DateTime<Utc>) -> Result<Report, CheckerError> {
        let snapshot = self.source.fetch().await?;
        let report = self.formatter.format(&snapshot, now);
        self.sink.publish(&report).await?;
        Ok(report)
    }

    /// Ticks every `interval` until `shutdown` resolves.
    ///
    /// The first tick fires immediately. Ticks run inline, so a slow tick
    /// delays the next one instead of overlapping it; missed ticks are
    /// skipped.
    pub async fn run(&mut self, interval: Duration, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                _ = ticker.tick() => {
                    match self.tick(Utc::now()).await {
                        Ok(report) => tracing::info!(
                            offline = report.offline_count,
                            website = report.website_count,
                            "status report published"
                        ),
                        Err(e) => tracing::warn!(
                            error = %e,
                            "check failed, keeping previous report"
                        ),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::health::HealthStatus;
    use chrono::TimeZone;
    use presence_report::MemberRecord;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::sync::RwLock;

    /// Serves queued results, one per fetch.
    #[derive(Clone, Default)]
    struct ScriptedSource {
        results: Arc<Mutex<VecDeque<Result<Snapshot, CheckerError>>>>,
    }

    impl ScriptedSource {
        fn push(&self, result: Result<Snapshot, CheckerError>) {
            self.results.lock().unwrap().push_back(result);
        }
    }

    impl SnapshotSource for ScriptedSource {
        async fn fetch(&self) -> Result<Snapshot, CheckerError> {
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Snapshot::default()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        published: Vec<Report>,
        fail: bool,
    }

    impl ReportSink for RecordingSink {
        async fn publish(&mut self, report: &Report) -> Result<(), CheckerError> {
            if self.fail {
                return Err(CheckerError::Discord {
                    status: 500,
                    body: "boom".into(),
                });
            }
            self.published.push(report.clone());
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(vec![
            MemberRecord::last_online("Alice", now() - chrono::Duration::minutes(90)),
            MemberRecord::on_website("Bob"),
        ])
    }

    #[tokio::test]
    async fn tick_publishes_formatted_report() {
        let source = ScriptedSource::default();
        source.push(Ok(snapshot()));
        let mut poller = Poller::new(source, RecordingSink::default(), ReportFormatter::default());

        let report = poller.tick(now()).await.unwrap();

        assert_eq!(report.offline_count, 1);
        assert_eq!(report.website_count, 1);
        assert_eq!(poller.state().last_report.as_ref(), Some(&report));
        assert_eq!(poller.state().last_success, Some(now()));
        assert_eq!(poller.into_sink().published, vec![report]);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_previous_report() {
        let source = ScriptedSource::default();
        source.push(Ok(snapshot()));
        source.push(Err(CheckerError::Status {
            url: "http://api".into(),
            status: 502,
        }));
        let mut poller = Poller::new(source, RecordingSink::default(), ReportFormatter::default());

        let first = poller.tick(now()).await.unwrap();
        let later = now() + chrono::Duration::minutes(2);
        let err = poller.tick(later).await.unwrap_err();

        assert!(matches!(err, CheckerError::Status { status: 502, .. }));
        assert_eq!(poller.state().ticks, 2);
        assert_eq!(poller.state().last_report.as_ref(), Some(&first));
        assert_eq!(poller.state().last_success, Some(now()));
        assert!(poller.state().last_error.as_deref().unwrap().contains("502"));
        assert_eq!(poller.into_sink().published.len(), 1);
    }

    #[tokio::test]
    async fn document_without_members_keeps_previous_report() {
        let source = ScriptedSource::default();
        source.push(Ok(snapshot()));
        source.push(
            Snapshot::from_json(r#"{"error":"batch not found"}"#).map_err(CheckerError::from),
        );
        let mut poller = Poller::new(source, RecordingSink::default(), ReportFormatter::default());

        let first = poller.tick(now()).await.unwrap();
        let err = poller.tick(now() + chrono::Duration::minutes(2)).await.unwrap_err();

        assert!(matches!(err, CheckerError::Snapshot(_)));
        assert_eq!(poller.state().last_report.as_ref(), Some(&first));
        let published = poller.into_sink().published;
        assert_eq!(published.len(), 1);
        assert!(!published[0].description.contains("All users are online."));
    }

    #[tokio::test]
    async fn publish_failure_is_recorded() {
        let source = ScriptedSource::default();
        source.push(Ok(snapshot()));
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let mut poller = Poller::new(source, sink, ReportFormatter::default());

        assert!(poller.tick(now()).await.is_err());
        assert!(poller.state().last_report.is_none());
        assert!(poller.state().last_error.is_some());
    }

    #[tokio::test]
    async fn tick_updates_shared_health() {
        let health: SharedHealth = Arc::new(RwLock::new(HealthStatus::default()));
        let source = ScriptedSource::default();
        source.push(Ok(snapshot()));
        let mut poller = Poller::new(source, RecordingSink::default(), ReportFormatter::default())
            .with_health(Arc::clone(&health));

        poller.tick(now()).await.unwrap();

        let status = health.read().await.clone();
        assert_eq!(status.ticks, 1);
        assert_eq!(status.offline, Some(1));
        assert_eq!(status.website, Some(1));
        assert_eq!(status.status(), "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_until_shutdown() {
        let mut poller = Poller::new(
            ScriptedSource::default(),
            RecordingSink::default(),
            ReportFormatter::default(),
        );

        poller
            .run(
                Duration::from_secs(120),
                tokio::time::sleep(Duration::from_secs(250)),
            )
            .await;

        // Immediate tick, then at 120s and 240s.
        assert_eq!(poller.state().ticks, 3);
        assert_eq!(poller.into_sink().published.len(), 3);
    }
}
