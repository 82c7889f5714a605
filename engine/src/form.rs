//! Report form input and validation.
//!
//! UI widgets hand over raw strings; `ReportForm` checks them and produces
//! typed `ReportParams` / `ProcessParams`. Nothing is submitted while the
//! form is invalid.

use chrono::NaiveDate;

use crate::error::EngineError;
use crate::model::{ProcessParams, ReportParams};

/// Default planning horizon shown in a fresh form.
pub const DEFAULT_PLANNING_DAYS: u32 = 30;

/// Default sales search window shown in a fresh form.
pub const DEFAULT_SEARCH_DAYS: u32 = 30;

/// Raw values of the report form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportForm {
    pub start_date: String,
    pub end_date: String,
    pub store_id: String,
    pub planning_days: String,
    pub search_days: String,
    pub product_groups: Vec<String>,
}

impl Default for ReportForm {
    fn default() -> Self {
        ReportForm {
            start_date: String::new(),
            end_date: String::new(),
            store_id: String::new(),
            planning_days: DEFAULT_PLANNING_DAYS.to_string(),
            search_days: DEFAULT_SEARCH_DAYS.to_string(),
            product_groups: Vec::new(),
        }
    }
}

impl ReportForm {
    /// Validate the form for a single-store report job.
    pub fn to_report_params(&self) -> Result<ReportParams, EngineError> {
        let (start_date, end_date) = self.date_range()?;

        let store_id = self.store_id.trim();
        if store_id.is_empty() {
            return Err(invalid("Select a store"));
        }

        Ok(ReportParams {
            start_date,
            end_date,
            store_id: store_id.to_string(),
            planning_days: parse_days(&self.planning_days, "Planning days")?,
            product_groups: self.selected_groups(),
        })
    }

    /// Validate the form for fan-out or batch processing. The store field
    /// is ignored; stores come from the caller.
    pub fn to_process_params(&self) -> Result<ProcessParams, EngineError> {
        let (start_date, end_date) = self.date_range()?;
        Ok(ProcessParams {
            start_date,
            end_date,
            planning_days: parse_days(&self.planning_days, "Planning days")?,
            search_days: parse_days(&self.search_days, "Search days")?,
        })
    }

    /// Toggle a product group in the selection, keeping selection order.
    pub fn set_group(&mut self, group_id: &str, selected: bool) {
        let present = self.product_groups.iter().any(|g| g == group_id);
        if selected && !present {
            self.product_groups.push(group_id.to_string());
        } else if !selected {
            self.product_groups.retain(|g| g != group_id);
        }
    }

    pub fn is_group_selected(&self, group_id: &str) -> bool {
        self.product_groups.iter().any(|g| g == group_id)
    }

    fn selected_groups(&self) -> Vec<String> {
        self.product_groups
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn date_range(&self) -> Result<(NaiveDate, NaiveDate), EngineError> {
        let start = parse_date(&self.start_date, "Start date")?;
        let end = parse_date(&self.end_date, "End date")?;
        if start > end {
            return Err(invalid("Start date must not be after end date"));
        }
        Ok((start, end))
    }
}

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, EngineError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(&format!("{} is required", field)));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| invalid(&format!("{} must be a date like 2024-01-31", field)))
}

fn parse_days(value: &str, field: &str) -> Result<u32, EngineError> {
    match value.trim().parse::<u32>() {
        Ok(days) if days > 0 => Ok(days),
        _ => Err(invalid(&format!("{} must be a positive whole number", field))),
    }
}

fn invalid(reason: &str) -> EngineError {
    EngineError::InvalidParams {
        reason: reason.to_string(),
    }
}
