//! Recording in-memory backend used by the engine's tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::backend::ReportBackend;
use crate::error::EngineError;
use crate::model::{
    BatchRequest, GroupList, ProcessParams, ProgressStatus, ReportParams, ReportResult, StoreList,
};

pub struct MockBackend {
    pub stores: Mutex<Option<StoreList>>,
    pub groups: Mutex<Option<GroupList>>,
    pub statuses: Mutex<VecDeque<Result<ProgressStatus, String>>>,
    pub failing_stores: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
    /// Time a cancel request takes to reach the backend.
    pub cancel_delay: Duration,
    /// Time a status request takes to answer.
    pub status_delay: Duration,
    report_gate: Mutex<Option<oneshot::Receiver<Result<ReportResult, String>>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        MockBackend {
            stores: Mutex::new(None),
            groups: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            failing_stores: HashSet::new(),
            calls: Mutex::new(Vec::new()),
            cancel_delay: Duration::ZERO,
            status_delay: Duration::ZERO,
            report_gate: Mutex::new(None),
        }
    }

    pub fn with_failing_stores(ids: &[&str]) -> Self {
        let mut backend = Self::new();
        backend.failing_stores = ids.iter().map(|id| id.to_string()).collect();
        backend
    }

    /// Make `generate_report` wait until the returned sender fires.
    pub fn gate_report(&self) -> oneshot::Sender<Result<ReportResult, String>> {
        let (tx, rx) = oneshot::channel();
        *self.report_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn push_status(&self, status: Result<ProgressStatus, String>) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(name)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn backend_error(message: String) -> EngineError {
    EngineError::Api {
        status: 500,
        body: message,
    }
}

impl ReportBackend for MockBackend {
    async fn get_stores(&self) -> Result<StoreList, EngineError> {
        self.record("get_stores".to_string());
        let stores = self.stores.lock().unwrap().clone();
        stores.ok_or_else(|| backend_error("stores unavailable".to_string()))
    }

    async fn get_product_groups(&self) -> Result<GroupList, EngineError> {
        self.record("get_product_groups".to_string());
        let groups = self.groups.lock().unwrap().clone();
        groups.ok_or_else(|| backend_error("groups unavailable".to_string()))
    }

    async fn generate_report(&self, params: &ReportParams) -> Result<ReportResult, EngineError> {
        self.record(format!("generate_report({})", params.store_id));
        let gate = self.report_gate.lock().unwrap().take();
        match gate {
            Some(rx) => match rx.await {
                Ok(result) => result.map_err(backend_error),
                // Sender dropped: behave like a request that never finishes.
                Err(_) => std::future::pending().await,
            },
            None => Ok(ReportResult {
                success: true,
                message: None,
                filename: None,
                filedata: None,
            }),
        }
    }

    async fn get_processing_status(&self) -> Result<ProgressStatus, EngineError> {
        self.record("get_processing_status".to_string());
        if !self.status_delay.is_zero() {
            tokio::time::sleep(self.status_delay).await;
        }
        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(status) => status.map_err(backend_error),
            None => Ok(ProgressStatus::default()),
        }
    }

    async fn cancel_processing(&self) -> Result<(), EngineError> {
        if !self.cancel_delay.is_zero() {
            tokio::time::sleep(self.cancel_delay).await;
        }
        self.record("cancel_processing".to_string());
        Ok(())
    }

    async fn process_store(
        &self,
        store_id: &str,
        _params: &ProcessParams,
    ) -> Result<serde_json::Value, EngineError> {
        self.record(format!("process_store({})", store_id));
        if self.failing_stores.contains(store_id) {
            return Err(backend_error(format!("store {} failed", store_id)));
        }
        Ok(serde_json::json!({ "success": true }))
    }

    async fn process_multiple(
        &self,
        request: &BatchRequest,
    ) -> Result<serde_json::Value, EngineError> {
        self.record(format!("process_multiple({})", request.store_ids.join(",")));
        Ok(serde_json::json!({ "success": true, "processed": request.store_ids.len() }))
    }
}
