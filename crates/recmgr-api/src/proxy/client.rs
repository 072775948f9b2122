//! `ProxyClient` - P2P proxy HTTP client implementation.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Client;
use tracing::instrument;
use url::Url;

use super::api::LocalProxyApi;
use super::endpoint::{Endpoint, ProxyAddress};
use super::error::{DeleteStep, ProxyError};
use super::markup::{parse_channels, parse_epg, parse_records};
use super::types::{ChannelListing, Recording, ScheduleRequest, Telecast};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// HTTP status the proxy uses for success.
const STATUS_OK: u16 = 200;

/// P2P proxy client.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ProxyClient {
    /// HTTP client (reqwest, per-request timeout).
    http_client: Client,
    /// Proxy root address.
    address: ProxyAddress,
}

/// Builder for `ProxyClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ProxyClientBuilder {
    address: Option<ProxyAddress>,
    base_url: Option<Url>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl ProxyClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            address: None,
            base_url: None,
            user_agent: None,
            timeout: None,
        }
    }

    /// Sets the proxy address.
    #[must_use]
    pub fn address(mut self, address: ProxyAddress) -> Self {
        self.address = Some(address);
        self
    }

    /// Sets the proxy root URL directly (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the per-request timeout (default: 2s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `user_agent` is not set.
    /// - Neither `address` nor `base_url` is set, or `base_url` is unusable.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<ProxyClient> {
        let user_agent = self.user_agent.context("user_agent is required")?;

        let address = match (self.address, self.base_url) {
            (Some(address), _) => address,
            (None, Some(url)) => ProxyAddress::from_url(url)?,
            (None, None) => bail!("proxy address is required"),
        };

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()
            .context("failed to build HTTP client")?;

        Ok(ProxyClient {
            http_client,
            address,
        })
    }
}

impl ProxyClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> ProxyClientBuilder {
        ProxyClientBuilder::new()
    }

    /// Proxy root address.
    #[must_use]
    pub const fn address(&self) -> &ProxyAddress {
        &self.address
    }

    /// Sends one GET request and returns the HTTP status with the body.
    ///
    /// Non-200 statuses are returned, not raised; callers decide.
    ///
    /// # Errors
    ///
    /// Returns `Timeout`, `Connect` or `Transport` when the request or the
    /// body read fails.
    #[instrument(skip(self, query))]
    pub async fn fetch(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
    ) -> Result<(u16, String), ProxyError> {
        let mut request = self.http_client.get(self.address.url(endpoint));
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProxyError::from_transport(endpoint, e))?;
        let status = response.status().as_u16();

        let body = response
            .text()
            .await
            .map_err(|e| ProxyError::from_transport(endpoint, e))?;

        tracing::debug!(%endpoint, status, body_len = body.len(), "Proxy response received");
        Ok((status, body))
    }

    /// Calls `login` and ignores the outcome.
    ///
    /// The proxy wants a session before protected endpoints, but only the
    /// following call decides success.
    async fn login(&self) {
        match self.fetch(Endpoint::Login, &[]).await {
            Ok((status, _)) => tracing::debug!(status, "Login call completed"),
            Err(e) => tracing::debug!(error = %e, "Login call failed, continuing"),
        }
    }

    /// Logs in if `endpoint` needs it, sends the request and requires HTTP 200.
    async fn fetch_ok(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
    ) -> Result<String, ProxyError> {
        if endpoint.requires_login() {
            self.login().await;
        }

        let (status, body) = self.fetch(endpoint, query).await?;
        if status != STATUS_OK {
            return Err(ProxyError::Status { endpoint, status });
        }
        Ok(body)
    }
}

impl LocalProxyApi for ProxyClient {
    #[instrument(skip_all)]
    async fn channels(&self) -> Result<ChannelListing, ProxyError> {
        let body = self.fetch_ok(Endpoint::Channels, &[]).await?;
        let listing = parse_channels(&body)?;
        tracing::debug!(
            channels = listing.channels.len(),
            groups = listing.groups.len(),
            "Channel listing parsed"
        );
        Ok(listing)
    }

    #[instrument(skip_all)]
    async fn records(&self) -> Result<Vec<Recording>, ProxyError> {
        let body = self.fetch_ok(Endpoint::Records, &[]).await?;
        Ok(parse_records(&body)?)
    }

    #[instrument(skip(self))]
    async fn epg(&self, epg_id: &str) -> Result<Vec<Telecast>, ProxyError> {
        let body = self
            .fetch_ok(Endpoint::Epg, &[("id", epg_id.to_owned())])
            .await?;
        Ok(parse_epg(&body)?)
    }

    #[instrument(skip_all, fields(channel_id = %request.channel_id))]
    async fn add_record(&self, request: &ScheduleRequest) -> Result<(), ProxyError> {
        self.fetch_ok(Endpoint::RecordAdd, &request.to_query())
            .await
            .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn delete_record(&self, id: &str) -> Result<(), ProxyError> {
        self.login().await;

        // The proxy stops an active capture on the first call and removes
        // the entry on the second.
        let query = [("id", id.to_owned())];
        let (stop_status, _) = self.fetch(Endpoint::RecordDelete, &query).await?;
        let (delete_status, _) = self.fetch(Endpoint::RecordDelete, &query).await?;

        if delete_status != STATUS_OK {
            return Err(ProxyError::Deletion {
                step: DeleteStep::Delete,
                status: delete_status,
            });
        }
        if stop_status != STATUS_OK {
            return Err(ProxyError::Deletion {
                step: DeleteStep::Stop,
                status: stop_status,
            });
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn is_alive(&self) -> bool {
        match self.fetch(Endpoint::Stat, &[]).await {
            Ok((STATUS_OK, _)) => true,
            Ok((status, _)) => {
                tracing::warn!(status, "Proxy stat probe returned non-200");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Proxy stat probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> ProxyClient {
        ProxyClient::builder()
            .base_url(server.uri().parse().unwrap())
            .user_agent("test/0.0.0")
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap()
    }

    async fn mount_login(server: &MockServer, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[test]
    fn test_builder_requires_user_agent() {
        // Arrange & Act
        let result = ProxyClient::builder()
            .address(ProxyAddress::new("127.0.0.1", 8081).unwrap())
            .build();

        // Assert
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("user_agent is required")
        );
    }

    #[test]
    fn test_builder_requires_address() {
        // Arrange & Act
        let result = ProxyClient::builder().user_agent("test/0.0.0").build();

        // Assert
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("proxy address is required")
        );
    }

    #[test]
    fn test_builder_with_address_succeeds() {
        // Arrange & Act
        let client = ProxyClient::builder()
            .address(ProxyAddress::new("10.0.0.2", 8081).unwrap())
            .user_agent("test/0.0.0")
            .build()
            .unwrap();

        // Assert
        assert_eq!(client.address().base().as_str(), "http://10.0.0.2:8081/");
    }

    #[tokio::test]
    async fn test_channels_logs_in_first() {
        // Arrange
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/channels/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(include_str!("../../../../fixtures/proxy/channels.xml")),
            )
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server);

        // Act
        let listing = client.channels().await.unwrap();

        // Assert
        assert_eq!(listing.channels.len(), 4);
        assert_eq!(listing.channels[0].name, "Eurosport 1");
        assert_eq!(listing.channels[0].group, "Спорт");
    }

    #[tokio::test]
    async fn test_login_failure_is_ignored() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/records/all"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(include_str!("../../../../fixtures/proxy/records_all.xml")),
            )
            .mount(&server)
            .await;
        let client = client_for(&server);

        // Act
        let records = client.records().await.unwrap();

        // Assert
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_records_are_fetched_on_every_call() {
        // Arrange
        let server = MockServer::start().await;
        mount_login(&server, 2).await;
        Mock::given(method("GET"))
            .and(path("/records/all"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(include_str!("../../../../fixtures/proxy/records_all.xml")),
            )
            .expect(2)
            .mount(&server)
            .await;
        let client = client_for(&server);

        // Act
        let first = client.records().await.unwrap();
        let second = client.records().await.unwrap();

        // Assert
        assert_eq!(first, second);
        assert_eq!(first[0].channel_name, "Eurosport 1");
    }

    #[tokio::test]
    async fn test_records_non_200_is_status_error() {
        // Arrange
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/records/all"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;
        let client = client_for(&server);

        // Act
        let err = client.records().await.unwrap_err();

        // Assert
        assert!(matches!(
            err,
            ProxyError::Status {
                endpoint: Endpoint::Records,
                status: 503
            }
        ));
    }

    #[tokio::test]
    async fn test_records_with_unparsable_name_is_markup_error() {
        // Arrange
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/records/all"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<records><record id="1" name="No prefix" start="01012024_100000" end="01012024_110000" status="s"/></records>"#,
            ))
            .mount(&server)
            .await;
        let client = client_for(&server);

        // Act
        let err = client.records().await.unwrap_err();

        // Assert
        assert!(matches!(err, ProxyError::Markup(_)));
    }

    #[tokio::test]
    async fn test_epg_sends_id_without_login() {
        // Arrange
        let server = MockServer::start().await;
        mount_login(&server, 0).await;
        Mock::given(method("GET"))
            .and(path("/epg/"))
            .and(query_param("id", "135"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(include_str!("../../../../fixtures/proxy/epg.xml")),
            )
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server);

        // Act
        let telecasts = client.epg("135").await.unwrap();

        // Assert
        assert_eq!(telecasts.len(), 3);
        assert_eq!(telecasts[1].name, "Доброе утро");
    }

    #[tokio::test]
    async fn test_add_record_sends_wire_format() {
        // Arrange
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/records/add"))
            .and(query_param("channel_id", "130"))
            .and(query_param("start", "01012024_100000"))
            .and(query_param("end", "01012024_110000"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let request = ScheduleRequest {
            channel_id: String::from("130"),
            start: day.and_hms_opt(10, 0, 0).unwrap(),
            end: day.and_hms_opt(11, 0, 0).unwrap(),
        };

        // Act & Assert
        client.add_record(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_record_non_200_fails() {
        // Arrange
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/records/add"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;
        let client = client_for(&server);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let request = ScheduleRequest {
            channel_id: String::from("130"),
            start: day.and_hms_opt(10, 0, 0).unwrap(),
            end: day.and_hms_opt(11, 0, 0).unwrap(),
        };

        // Act
        let err = client.add_record(&request).await.unwrap_err();

        // Assert
        assert_eq!(err.to_string(), "records/add returned HTTP 400");
    }

    #[tokio::test]
    async fn test_delete_record_calls_twice() {
        // Arrange
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/records/del"))
            .and(query_param("id", "9c02"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;
        let client = client_for(&server);

        // Act & Assert
        client.delete_record("9c02").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_record_stop_failure() {
        // Arrange: first call (stop) fails, second (delete) succeeds
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/records/del"))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/records/del"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let client = client_for(&server);

        // Act
        let err = client.delete_record("1").await.unwrap_err();

        // Assert
        assert!(matches!(
            err,
            ProxyError::Deletion {
                step: DeleteStep::Stop,
                status: 404
            }
        ));
    }

    #[tokio::test]
    async fn test_delete_record_delete_step_failure() {
        // Arrange: stop succeeds, delete fails
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/records/del"))
            .respond_with(ResponseTemplate::new(200))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/records/del"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let client = client_for(&server);

        // Act
        let err = client.delete_record("1").await.unwrap_err();

        // Assert
        assert!(matches!(
            err,
            ProxyError::Deletion {
                step: DeleteStep::Delete,
                status: 503
            }
        ));
    }

    #[tokio::test]
    async fn test_delete_record_stop_timeout_skips_delete() {
        // Arrange: the stop call outlives the client timeout
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/records/del"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .expect(1)
            .mount(&server)
            .await;
        let client = ProxyClient::builder()
            .base_url(server.uri().parse().unwrap())
            .user_agent("test/0.0.0")
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();

        // Act
        let err = client.delete_record("1").await.unwrap_err();

        // Assert (mock expect(1) verifies the delete call was never sent)
        assert!(matches!(
            err,
            ProxyError::Timeout {
                endpoint: Endpoint::RecordDelete
            }
        ));
    }

    #[tokio::test]
    async fn test_delete_record_delete_failure_reported_first() {
        // Arrange: both calls fail; the delete step is reported
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/records/del"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;
        let client = client_for(&server);

        // Act
        let err = client.delete_record("1").await.unwrap_err();

        // Assert
        assert_eq!(err.to_string(), "delete failed (HTTP 500)");
    }

    #[tokio::test]
    async fn test_is_alive_on_200() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stat"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server);

        // Act & Assert
        assert!(client.is_alive().await);
    }

    #[tokio::test]
    async fn test_is_alive_false_on_non_200() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stat"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let client = client_for(&server);

        // Act & Assert
        assert!(!client.is_alive().await);
    }

    #[tokio::test]
    async fn test_is_alive_false_on_timeout() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stat"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        let client = ProxyClient::builder()
            .base_url(server.uri().parse().unwrap())
            .user_agent("test/0.0.0")
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();

        // Act
        let err = client.fetch(Endpoint::Stat, &[]).await.unwrap_err();

        // Assert
        assert!(matches!(err, ProxyError::Timeout { endpoint: Endpoint::Stat }));
        assert!(!client.is_alive().await);
    }

    #[tokio::test]
    async fn test_is_alive_false_when_unreachable() {
        // Arrange: nothing listens on port 1
        let client = ProxyClient::builder()
            .address(ProxyAddress::new("127.0.0.1", 1).unwrap())
            .user_agent("test/0.0.0")
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap();

        // Act
        let err = client.fetch(Endpoint::Stat, &[]).await.unwrap_err();

        // Assert
        assert!(err.is_transport());
        assert!(!client.is_alive().await);
    }

    #[tokio::test]
    async fn test_user_agent_is_sent() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::header("User-Agent", "recmgr/0.1.0"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let client = ProxyClient::builder()
            .base_url(server.uri().parse().unwrap())
            .user_agent("recmgr/0.1.0")
            .build()
            .unwrap();

        // Act & Assert (mock expect(1) verifies User-Agent header)
        assert!(client.is_alive().await);
    }
}
