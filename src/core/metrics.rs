use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) const ANSWER_TRANSITIONS: &str = "answer_transitions_total";
pub(crate) const REVIEW_COMMENTS: &str = "review_comments_total";
pub(crate) const REVIEWER_ASSIGNMENTS: &str = "reviewer_assignments_total";
pub(crate) const NOTIFICATION_FAILURES: &str = "notification_failures_total";

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!(ANSWER_TRANSITIONS, "Committed answer status transitions");
    metrics::describe_counter!(REVIEW_COMMENTS, "Review comments created");
    metrics::describe_counter!(REVIEWER_ASSIGNMENTS, "Reviewer assignments created");
    metrics::describe_counter!(NOTIFICATION_FAILURES, "Notification deliveries that failed");
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}
