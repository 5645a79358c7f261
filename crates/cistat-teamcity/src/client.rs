//! TeamCity REST API client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cistat_core::{BuildRecord, BuildStatus, CistatError, QueuedBuild, Result, Settings};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::server::CiServer;
use crate::types::{format_teamcity_date, BuildList};

const QUEUE_FIELDS: &str = "build(id,buildTypeId)";
const BUILD_FIELDS: &str = "build(id,buildTypeId,status,queuedDate,startDate,finishDate)";

/// CI server client backed by the TeamCity REST API
#[derive(Debug, Clone)]
pub struct TeamCityClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl TeamCityClient {
    /// Create a client for `base_url`
    ///
    /// With credentials the client uses `httpAuth`, otherwise `guestAuth`.
    pub fn new(
        base_url: &str,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| CistatError::CiTransport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let credentials = settings
            .credentials()
            .map(|(user, pass)| (user.to_string(), pass.to_string()));
        Self::new(&settings.teamcity_server, credentials, settings.timeout)
    }

    /// Full URL for a REST resource, e.g. `app/rest/buildQueue`
    pub fn endpoint(&self, resource: &str) -> String {
        let auth = if self.credentials.is_some() {
            "httpAuth"
        } else {
            "guestAuth"
        };
        format!("{}/{}/{}", self.base_url, auth, resource)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.endpoint(resource);
        debug!("GET {} {:?}", url, query);

        let mut request = self
            .http
            .get(&url)
            .header("accept", "application/json")
            .query(query);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request
            .send()
            .await
            .map_err(|e| CistatError::CiTransport(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            return Err(CistatError::CiStatus {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| CistatError::CiResponse(format!("Failed to parse response: {}", e)))
    }
}

/// Build locator selecting finished builds by status since a timestamp
pub fn finished_builds_locator(status: BuildStatus, since: DateTime<Utc>, limit: usize) -> String {
    format!(
        "status:{},sinceDate:{},count:{}",
        status.locator_value(),
        format_teamcity_date(since),
        limit
    )
}

#[async_trait]
impl CiServer for TeamCityClient {
    #[instrument(skip(self), fields(server = %self.base_url))]
    async fn queued_builds(&self) -> Result<Vec<QueuedBuild>> {
        let list: BuildList = self
            .get_json("app/rest/buildQueue", &[("fields", QUEUE_FIELDS)])
            .await?;
        Ok(list.build.into_iter().map(|b| b.into_queued()).collect())
    }

    #[instrument(skip(self), fields(server = %self.base_url))]
    async fn finished_builds(
        &self,
        status: BuildStatus,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<BuildRecord>> {
        let locator = finished_builds_locator(status, since, limit);
        let list: BuildList = self
            .get_json(
                "app/rest/builds",
                &[("locator", locator.as_str()), ("fields", BUILD_FIELDS)],
            )
            .await?;

        let mut records = Vec::with_capacity(list.build.len());
        for raw in list.build {
            if let Some(record) = raw.into_record()? {
                records.push(record);
            }
        }
        Ok(records)
    }
}
