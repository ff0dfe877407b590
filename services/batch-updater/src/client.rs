//! NRP service gateway client.
//!
//! Posts batch DTOs to the bypass endpoint:
//! - `UpdateServices` for load-balancer service creation and removal
//! - `UpdateLocations` for location and address data
//!
//! Transport failures are retried with backoff. Any HTTP response other than
//! 2xx ends the call without a retry.

use std::error::Error as _;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use nrp_reconcile::{
    retry_with_backoff, AttemptError, RemoteOperation, RemoteSync, RetryPolicy, SyncError,
};
use nrp_types::{LocationsDataDto, ServicesDataDto, SyncScope};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::config::Config;

const SERVICE_GATEWAY_PATH: &str = "providers/Microsoft.Network/serviceGateways/ServiceGateway";

/// NRP bypass API client.
pub struct NrpClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl NrpClient {
    /// Create a client for `base_url`; `timeout` bounds each attempt.
    pub fn new(base_url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .with_context(|| format!("invalid NRP base URL: {base_url}"))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nrp-batch-updater/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            retry,
        })
    }

    /// Create a client from the service configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.nrp_base_url.clone(),
            config.request_timeout,
            config.retry.clone(),
        )
    }

    /// Full URL for `operation` under `scope`.
    pub fn url(&self, operation: RemoteOperation, scope: &SyncScope) -> String {
        format!(
            "{}{}/{}/{}",
            self.base_url,
            scope.resource_group_path(),
            SERVICE_GATEWAY_PATH,
            operation.action()
        )
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        operation: RemoteOperation,
        body: &T,
        scope: &SyncScope,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        let payload = serde_json::to_vec(body)?;
        let url = self.url(operation, scope);
        debug!(%operation, url = %url, bytes = payload.len(), "Sending NRP request");

        let response = retry_with_backoff(&self.retry, operation.action(), shutdown, |attempt| {
            let request = self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .body(payload.clone());
            async move {
                request.send().await.map_err(|e| {
                    let message = describe(&e);
                    debug!(attempt, error = %message, "NRP request failed to send");
                    AttemptError::Transport(message)
                })
            }
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%operation, status = %status, body = %body, "NRP rejected request");
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(%operation, status = %status, "NRP request accepted");
        Ok(())
    }
}

/// Render an error with its source chain.
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl RemoteSync for NrpClient {
    async fn update_services(
        &self,
        dto: &ServicesDataDto,
        scope: &SyncScope,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        self.post(RemoteOperation::UpdateServices, dto, scope, shutdown)
            .await
    }

    async fn update_locations(
        &self,
        dto: &LocationsDataDto,
        scope: &SyncScope,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        self.post(RemoteOperation::UpdateLocations, dto, scope, shutdown)
            .await
    }
}
