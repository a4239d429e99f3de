//! Notification and reporting sink.
//!
//! The engine never renders anything itself; it hands user-facing warnings
//! and analytics events to a `Notifier` supplied by the front end.

/// One analytics/reporting event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEvent {
    /// Endpoint label or operation kind.
    pub kind: String,
    pub success: bool,
    pub code: Option<u16>,
    pub message: Option<String>,
}

impl ReportEvent {
    pub fn success(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            success: true,
            code: None,
            message: None,
        }
    }

    pub fn failure(kind: impl Into<String>, code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            success: false,
            code,
            message: Some(message.into()),
        }
    }
}

pub trait Notifier: Send + Sync {
    /// Show a user-visible warning. The queue calls this once per operation.
    fn warn_once(&self, message: &str);

    fn report_event(&self, event: ReportEvent);
}

/// Notifier that forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn warn_once(&self, message: &str) {
        tracing::warn!(target: "waylist::notify", "{message}");
    }

    fn report_event(&self, event: ReportEvent) {
        if event.success {
            tracing::info!(target: "waylist::report", kind = %event.kind, "ok");
        } else {
            tracing::warn!(
                target: "waylist::report",
                kind = %event.kind,
                code = ?event.code,
                message = event.message.as_deref().unwrap_or_default(),
                "failed"
            );
        }
    }
}
