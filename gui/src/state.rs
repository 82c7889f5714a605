use engine::{JobOutcome, Loaded, ProductGroup, ReportForm, Store};

use crate::progress::FanOutLog;

/// Message shown under the form after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub message: String,
    pub is_error: bool,
}

/// Application state, holding all UI and job-related data.
#[derive(Debug)]
pub struct AppState {
    // Input fields
    pub form: ReportForm,
    pub selected_store: Option<Store>,

    // Reference data
    pub stores: Vec<Store>,
    pub groups: Vec<ProductGroup>,

    // UI state
    pub notices: Vec<String>,
    pub status: Option<StatusLine>,
    pub fan_out: FanOutLog,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            form: ReportForm::default(),
            selected_store: None,

            stores: Vec::new(),
            groups: Vec::new(),

            notices: Vec::new(),
            status: None,
            fan_out: FanOutLog::default(),
        }
    }

    pub fn apply_stores(&mut self, loaded: Loaded<Store>) {
        self.stores = loaded.items;
        if let Some(notice) = loaded.notice {
            self.notices.push(notice);
        }

        let still_listed = self
            .selected_store
            .as_ref()
            .is_some_and(|selected| self.stores.contains(selected));
        if !still_listed {
            self.selected_store = None;
            self.form.store_id.clear();
        }
    }

    pub fn apply_groups(&mut self, loaded: Loaded<ProductGroup>) {
        self.groups = loaded.items;
        if let Some(notice) = loaded.notice {
            self.notices.push(notice);
        }

        let known: Vec<String> = ProductGroup::flatten(&self.groups)
            .iter()
            .map(|row| row.group.id.clone())
            .collect();
        self.form.product_groups.retain(|id| known.contains(id));
    }

    pub fn select_store(&mut self, store: Store) {
        self.form.store_id = store.id.clone();
        self.selected_store = Some(store);
    }

    pub fn store_ids(&self) -> Vec<String> {
        self.stores.iter().map(|s| s.id.clone()).collect()
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        self.status = Some(StatusLine {
            message: message.into(),
            is_error: true,
        });
    }

    pub fn show_info(&mut self, message: impl Into<String>) {
        self.status = Some(StatusLine {
            message: message.into(),
            is_error: false,
        });
    }

    pub fn apply_outcome(&mut self, outcome: &JobOutcome) {
        if outcome.is_success() {
            self.show_info(outcome.message());
        } else if let JobOutcome::Cancelled { message } = outcome {
            self.show_info(message.as_str());
        } else {
            self.show_error(outcome.message());
        }
    }

    pub fn clear_messages(&mut self) {
        self.status = None;
        self.notices.clear();
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
