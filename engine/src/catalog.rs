//! Loading the store list and product group tree for the report form.
//!
//! Load failures never abort the form: they produce an empty selection and a
//! notice for the user.

use crate::backend::ReportBackend;
use crate::model::{ProductGroup, Store};

/// Result of a non-fatal load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<T> {
    pub items: Vec<T>,
    /// Message to show when the load did not succeed.
    pub notice: Option<String>,
}

impl<T> Loaded<T> {
    fn ok(items: Vec<T>) -> Self {
        Loaded { items, notice: None }
    }

    fn failed(notice: String) -> Self {
        Loaded {
            items: Vec::new(),
            notice: Some(notice),
        }
    }
}

pub async fn load_stores<B: ReportBackend>(backend: &B) -> Loaded<Store> {
    match backend.get_stores().await {
        Ok(list) if list.success => {
            tracing::debug!(count = list.stores.len(), "Stores loaded");
            Loaded::ok(list.stores)
        }
        Ok(list) => {
            let notice = list
                .message
                .unwrap_or_else(|| "Failed to load store list".to_string());
            tracing::warn!(%notice, "Backend refused store list");
            Loaded::failed(notice)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load store list");
            Loaded::failed("Failed to load store list".to_string())
        }
    }
}

pub async fn load_product_groups<B: ReportBackend>(backend: &B) -> Loaded<ProductGroup> {
    match backend.get_product_groups().await {
        Ok(list) if list.success => {
            tracing::debug!(count = list.groups.len(), "Product groups loaded");
            Loaded::ok(list.groups)
        }
        Ok(list) => {
            let notice = list
                .message
                .unwrap_or_else(|| "Failed to load product groups".to_string());
            tracing::warn!(%notice, "Backend refused product groups");
            Loaded::failed(notice)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load product groups");
            Loaded::failed("Failed to load product groups".to_string())
        }
    }
}
