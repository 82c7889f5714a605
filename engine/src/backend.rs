//! Access to the report backend.
//!
//! `ReportBackend` is the seam between the orchestration code and the
//! service that actually builds reports. `HttpBackend` implements it over
//! the backend's HTTP API using [`reqwest`]; tests substitute a recording
//! mock.

use std::future::Future;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::EngineError;
use crate::model::{
    BatchRequest, GroupList, ProcessParams, ProgressStatus, ReportParams, ReportResult, StoreList,
};

/// Operations the client needs from the report backend.
pub trait ReportBackend: Send + Sync {
    /// List the warehouses a report can be built for.
    fn get_stores(&self) -> impl Future<Output = Result<StoreList, EngineError>> + Send;

    /// Fetch the product folder tree.
    fn get_product_groups(&self) -> impl Future<Output = Result<GroupList, EngineError>> + Send;

    /// Run one report job. Resolves only when the backend has finished.
    fn generate_report(
        &self,
        params: &ReportParams,
    ) -> impl Future<Output = Result<ReportResult, EngineError>> + Send;

    /// Progress of the job currently running on the backend.
    fn get_processing_status(
        &self,
    ) -> impl Future<Output = Result<ProgressStatus, EngineError>> + Send;

    /// Ask the backend to stop the running job. The acknowledgment carries
    /// no information.
    fn cancel_processing(&self) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Process a single store (one fan-out item).
    fn process_store(
        &self,
        store_id: &str,
        params: &ProcessParams,
    ) -> impl Future<Output = Result<serde_json::Value, EngineError>> + Send;

    /// Process several stores in one request.
    fn process_multiple(
        &self,
        request: &BatchRequest,
    ) -> impl Future<Output = Result<serde_json::Value, EngineError>> + Send;
}

/// HTTP client for the report backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpBackend {
    /// Create a client for the backend at `base_url`, e.g. `http://host:10000`.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, request_timeout)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            request_timeout,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.backend_url.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ---- private helpers ----

    /// Return the response unchanged on a 2xx status, otherwise an
    /// [`EngineError::Api`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

impl ReportBackend for HttpBackend {
    async fn get_stores(&self) -> Result<StoreList, EngineError> {
        let response = self
            .client
            .get(self.url("/stores"))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn get_product_groups(&self) -> Result<GroupList, EngineError> {
        let response = self
            .client
            .get(self.url("/product-groups"))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn generate_report(&self, params: &ReportParams) -> Result<ReportResult, EngineError> {
        // No timeout; the call resolves when the report is built.
        let response = self
            .client
            .post(self.url("/report"))
            .json(params)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn get_processing_status(&self) -> Result<ProgressStatus, EngineError> {
        let response = self
            .client
            .get(self.url("/status"))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn cancel_processing(&self) -> Result<(), EngineError> {
        let response = self
            .client
            .post(self.url("/cancel"))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn process_store(
        &self,
        store_id: &str,
        params: &ProcessParams,
    ) -> Result<serde_json::Value, EngineError> {
        let form = [
            ("store_id", store_id.to_string()),
            ("start_date", params.start_date.to_string()),
            ("end_date", params.end_date.to_string()),
            ("planning_days", params.planning_days.to_string()),
            ("search_days", params.search_days.to_string()),
        ];

        let response = self
            .client
            .post(self.url("/process"))
            .form(&form)
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn process_multiple(
        &self,
        request: &BatchRequest,
    ) -> Result<serde_json::Value, EngineError> {
        let response = self
            .client
            .post(self.url("/process-multiple"))
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }
}
