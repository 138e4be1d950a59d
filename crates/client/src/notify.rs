//! User-facing notifications.
//!
//! Whatever renders toasts implements [`Notifier`] and is handed to the
//! controller at construction.

use std::time::Duration;

/// How long success toasts stay visible.
pub const SUCCESS_LIFETIME: Duration = Duration::from_secs(3);
/// How long error toasts stay visible.
pub const ERROR_LIFETIME: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub summary: String,
    pub detail: Option<String>,
    pub life: Duration,
}

impl Notice {
    pub fn success(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            summary: summary.into(),
            detail: None,
            life: SUCCESS_LIFETIME,
        }
    }

    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: Some(detail.into()),
            life: ERROR_LIFETIME,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log. Useful for headless clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Error => tracing::error!(
                summary = %notice.summary,
                detail = notice.detail.as_deref().unwrap_or_default(),
                "notice"
            ),
            Severity::Success => tracing::info!(summary = %notice.summary, "notice"),
        }
    }
}
