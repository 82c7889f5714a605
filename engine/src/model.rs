//! Core data model for the report client.
//!
//! This module defines the payloads exchanged with the report backend:
//! - Store / StoreList: warehouses the report can be built for
//! - ProductGroup / GroupList: the product folder tree
//! - ReportParams / ReportResult: one report generation job
//! - ProgressStatus: what the backend reports while a job runs
//! - ProcessParams / BatchRequest: the per-store and batch processing calls

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A warehouse known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
}

impl std::fmt::Display for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Response of the store listing call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreList {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub stores: Vec<Store>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A node in the product folder tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<ProductGroup>,
}

impl ProductGroup {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Flatten a forest depth-first into `(level, group)` rows, parents
    /// before their children. Used to render an indented selector.
    pub fn flatten(groups: &[ProductGroup]) -> Vec<GroupRow<'_>> {
        fn walk<'a>(groups: &'a [ProductGroup], level: usize, rows: &mut Vec<GroupRow<'a>>) {
            for group in groups {
                rows.push(GroupRow { level, group });
                walk(&group.children, level + 1, rows);
            }
        }

        let mut rows = Vec::new();
        walk(groups, 0, &mut rows);
        rows
    }
}

/// One row of a flattened product group tree.
#[derive(Debug, Clone, Copy)]
pub struct GroupRow<'a> {
    pub level: usize,
    pub group: &'a ProductGroup,
}

impl GroupRow<'_> {
    /// Label with one dash per nesting level, e.g. `—— Shoes`.
    pub fn label(&self) -> String {
        if self.level == 0 {
            self.group.name.clone()
        } else {
            format!("{} {}", "—".repeat(self.level), self.group.name)
        }
    }
}

/// Response of the product group listing call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupList {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub groups: Vec<ProductGroup>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Parameters of one report generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub store_id: String,
    pub planning_days: u32,
    pub product_groups: Vec<String>,
}

/// Outcome of a report generation job as returned by the backend.
///
/// `filedata` is the base64-encoded workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub filedata: Option<String>,
}

/// Job progress as reported by the status endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressStatus {
    #[serde(default)]
    pub processed: u64,
    #[serde(default)]
    pub total: u64,
}

impl ProgressStatus {
    pub fn new(processed: u64, total: u64) -> Self {
        ProgressStatus { processed, total }
    }

    /// Percentage of rows processed, rounded half up and capped at 100.
    ///
    /// Returns `None` while the backend has not reported a total yet.
    pub fn percent(&self) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        let processed = self.processed.min(self.total) as u128;
        let total = self.total as u128;
        Some(((processed * 200 + total) / (total * 2)) as u8)
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.processed)
    }
}

/// Shared parameters for the per-store and batch processing endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub planning_days: u32,
    pub search_days: u32,
}

/// Body of the batch processing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRequest {
    pub store_ids: Vec<String>,
    #[serde(flatten)]
    pub params: ProcessParams,
}
