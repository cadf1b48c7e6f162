//! User-visible notices.
//!
//! User-initiated actions report their outcome through a [`Notifier`]; the
//! view decides how to show it. Background persistence never notifies.

use tracing::{info, warn};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Danger,
}

/// Receiver of user-visible notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Routes notices to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Success | NoticeLevel::Info => info!(?level, "{}", message),
            NoticeLevel::Warning | NoticeLevel::Danger => warn!(?level, "{}", message),
        }
    }
}
