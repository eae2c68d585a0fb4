use std::time::Duration;

use async_trait::async_trait;
use common::config::REQUEST_TIMEOUT;
use common::models::Signal;
#[cfg(test)]
use mockall::automock;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{error, info};
use url::Url;

use super::responses::{AgentInfo, HealthStatus, ManualSignalAck};
use crate::error::RequestError;

pub const USER_AGENT: &str = "trading_dashboard/0.1.0";

/// Request/response calls against the backend. Every call is a single exchange,
/// nothing is retried.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn check_health(&self) -> Result<HealthStatus, RequestError>;

    async fn get_agents(&self) -> Result<Vec<AgentInfo>, RequestError>;

    async fn get_recent_signals(&self, limit: usize) -> Result<Vec<Signal>, RequestError>;

    async fn create_manual_signal(&self, signal: &Signal) -> Result<ManualSignalAck, RequestError>;
}

#[derive(Debug, Clone)]
pub struct DashboardClient {
    client: Client,
    base_url: Url,
}

impl DashboardClient {
    pub fn new(base_url: &str) -> Result<Self, RequestError> {
        Self::with_builder(base_url, Self::client_builder(REQUEST_TIMEOUT))
    }

    /// Default HTTP client settings: user agent, JSON content type and the request timeout.
    pub fn client_builder(timeout: Duration) -> ClientBuilder {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .default_headers(headers)
    }

    pub fn with_builder(base_url: &str, builder: ClientBuilder) -> Result<Self, RequestError> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join drops the last segment unless the path ends in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: builder.build().map_err(RequestError::Client)?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, RequestError> {
        Ok(self.base_url.join(path)?)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RequestError> {
        let request = request.build().map_err(RequestError::Client)?;
        let method = request.method().clone();
        let url = request.url().clone();
        info!("API Request: {} {}", method, url);

        let response = self.client.execute(request).await.map_err(|e| {
            error!("API Request Error: {} {}: {}", method, url, e);
            RequestError::Connectivity(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(RequestError::Connectivity)?;
            error!("API Response Error: {} {}", status.as_u16(), body);
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!("API Response: {} {}", status.as_u16(), url);
        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                error!("API Response Error: undecodable body from {}: {}", url, e);
                RequestError::Decode(e)
            } else {
                RequestError::Connectivity(e)
            }
        })
    }
}

#[async_trait]
impl DashboardApi for DashboardClient {
    async fn check_health(&self) -> Result<HealthStatus, RequestError> {
        let url = self.endpoint("health")?;
        self.execute(self.client.get(url)).await
    }

    async fn get_agents(&self) -> Result<Vec<AgentInfo>, RequestError> {
        let url = self.endpoint("agents")?;
        self.execute(self.client.get(url)).await
    }

    async fn get_recent_signals(&self, limit: usize) -> Result<Vec<Signal>, RequestError> {
        let url = self.endpoint("signals")?;
        self.execute(self.client.get(url).query(&[("limit", limit)])).await
    }

    async fn create_manual_signal(&self, signal: &Signal) -> Result<ManualSignalAck, RequestError> {
        let url = self.endpoint("manual_signal")?;
        self.execute(self.client.post(url).json(signal)).await
    }
}
