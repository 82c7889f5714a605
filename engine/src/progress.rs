//! Progress display helpers.
//!
//! Both front ends show job progress the same way: "Processed 3 of 10 (30%)"
//! once the backend knows how many rows there are, a waiting line before.

use crate::model::ProgressStatus;

/// Text shown while the backend has not reported a total yet.
pub const WAITING_TEXT: &str = "Waiting for progress...";

/// Render a status line for the progress display.
pub fn render_progress(status: Option<ProgressStatus>) -> String {
    match status {
        Some(status) => match status.percent() {
            Some(percent) => format!(
                "Processed {} of {} ({}%)",
                status.processed, status.total, percent
            ),
            None => WAITING_TEXT.to_string(),
        },
        None => WAITING_TEXT.to_string(),
    }
}

/// Completed fraction in `0.0..=1.0`; zero while the total is unknown.
pub fn progress_fraction(status: Option<ProgressStatus>) -> f32 {
    status
        .and_then(|s| s.percent())
        .map(|percent| f32::from(percent) / 100.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_known_total() {
        assert_eq!(
            render_progress(Some(ProgressStatus::new(3, 10))),
            "Processed 3 of 10 (30%)"
        );
    }

    #[test]
    fn test_render_zero_total_falls_back() {
        assert_eq!(render_progress(Some(ProgressStatus::new(0, 0))), WAITING_TEXT);
        assert_eq!(render_progress(None), WAITING_TEXT);
    }

    #[test]
    fn test_fraction() {
        assert_eq!(progress_fraction(Some(ProgressStatus::new(1, 4))), 0.25);
        assert_eq!(progress_fraction(Some(ProgressStatus::new(0, 0))), 0.0);
        assert_eq!(progress_fraction(None), 0.0);
    }
}
