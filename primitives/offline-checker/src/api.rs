//! Presence API client.

use crate::error::CheckerError;
use crate::poller::SnapshotSource;
use presence_report::Snapshot;
use reqwest::Client;
use std::time::Duration;

/// Fetches member presence batches over HTTP.
#[derive(Debug, Clone)]
pub struct PresenceApi {
    client: Client,
    url: String,
}

impl PresenceApi {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CheckerError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SnapshotSource for PresenceApi {
    /// Fetches and decodes one snapshot.
    async fn fetch(&self) -> Result<Snapshot, CheckerError> {
        tracing::debug!(url = %self.url, "fetching member presence");

        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CheckerError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let snapshot = Snapshot::from_json(&body)?;

        tracing::debug!(members = snapshot.len(), "member presence fetched");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use presence_report::Presence;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn api_for(server: &MockServer) -> PresenceApi {
        PresenceApi::new(format!("{}/batch/C4T6", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn fetches_and_decodes_members() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/batch/C4T6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "members": [
                    { "userData": { "name": "Alice" }, "presence": { "lastOnline": "2024-07-01T10:30:00Z" } },
                    { "userData": { "name": "Bob" }, "presence": { "userPresenceType": 1 } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = api_for(&server).await.fetch().await.unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.members[1].presence, Some(Presence::OnWebsite));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = api_for(&server).await.fetch().await.unwrap_err();

        assert!(matches!(err, CheckerError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn non_json_body_is_a_snapshot_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = api_for(&server).await.fetch().await.unwrap_err();

        assert!(matches!(err, CheckerError::Snapshot(_)));
    }

    #[tokio::test]
    async fn body_without_members_is_a_snapshot_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "error": "batch not found" })),
            )
            .mount(&server)
            .await;

        let err = api_for(&server).await.fetch().await.unwrap_err();

        assert!(matches!(
            err,
            CheckerError::Snapshot(presence_report::SnapshotError::MissingMembers)
        ));
    }
}
