//! # Stockplan Engine - Report Client Library
//!
//! A headless client for the stock-planning report backend.
//! Designed as the foundation for multiple UIs (CLI, GUI, automation).
//!
//! ## Overview
//!
//! The backend builds stock and profitability workbooks for a warehouse over
//! a date range. Generating one can take minutes, so the client:
//! - Submits the job and polls its progress on a fixed interval
//! - Supports cancelling a running job
//! - Decodes the returned workbook and hands it to a save target
//! - Can also walk a list of warehouses one by one (fan-out) or hand them
//!   to the backend in one batch
//!
//! ## Basic Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use engine::{ClientConfig, DirectorySink, HttpBackend, JobController, ReportForm};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let backend = Arc::new(HttpBackend::from_config(&config));
//! let mut controller = JobController::new(
//!     backend,
//!     DirectorySink::new(&config.output_dir),
//!     config.poll_interval,
//! );
//!
//! let form = ReportForm {
//!     start_date: "2024-01-01".into(),
//!     end_date: "2024-01-31".into(),
//!     store_id: "main-warehouse".into(),
//!     ..ReportForm::default()
//! };
//!
//! if let Some(mut run) = controller.submit(form.to_report_params()?) {
//!     if let Some(outcome) = controller.drive(&mut run).await {
//!         println!("{}", outcome.message());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Backend payloads (stores, groups, report params/results, progress)
//! - **error**: Error types and handling
//! - **config**: Environment-driven client configuration
//! - **backend**: The `ReportBackend` seam and its HTTP implementation
//! - **session**: The job slot and its lifecycle state machine
//! - **job**: Submission, polling, cancellation and result delivery
//! - **fanout**: Sequential per-store processing and the batch alternative
//! - **artifact**: Payload decoding and save targets
//! - **catalog**: Non-fatal loading of stores and product groups
//! - **form**: Report form validation
//! - **progress**: Progress display helpers

pub mod artifact;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fanout;
pub mod form;
pub mod job;
pub mod model;
pub mod progress;
pub mod session;

#[cfg(test)]
mod mock;

// Re-export main types and functions
pub use artifact::{ArtifactSink, DirectorySink, ReportArtifact, XLSX_MIME};
pub use backend::{HttpBackend, ReportBackend};
pub use catalog::{load_product_groups, load_stores, Loaded};
pub use config::ClientConfig;
pub use error::EngineError;
pub use fanout::{process_batch, spawn_fan_out, FanOut, FanOutEvent, FanOutSummary};
pub use form::ReportForm;
pub use job::{JobController, JobEvent, JobEventKind, JobOutcome, JobRun};
pub use model::{
    BatchRequest, GroupList, ProcessParams, ProductGroup, ProgressStatus, ReportParams,
    ReportResult, Store, StoreList,
};
pub use progress::{progress_fraction, render_progress};
pub use session::{JobPhase, JobSession};
