use std::fmt;
use std::time::Duration;

use futures::channel::mpsc::UnboundedSender;

/// How long success toasts stay up before dismissing themselves.
pub const SUCCESS_DISMISS: Duration = Duration::from_secs(3);
/// Errors stay up a little longer so they can be read.
pub const ERROR_DISMISS: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Error,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Success => write!(f, "success"),
            Severity::Error => write!(f, "error"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A transient status message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
    /// `None` keeps the notice until the user dismisses it.
    pub auto_dismiss: Option<Duration>,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Success,
            auto_dismiss: Some(SUCCESS_DISMISS),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
            auto_dismiss: Some(ERROR_DISMISS),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Info,
            auto_dismiss: None,
        }
    }

    pub fn sticky(mut self) -> Self {
        self.auto_dismiss = None;
        self
    }
}

/// Sink for user-facing notices (toasts in the UI, log lines in the console).
pub trait Notifier {
    fn post(&self, notice: Notice);
}

/// Forwards notices over a channel to whatever renders them.
impl Notifier for UnboundedSender<Notice> {
    fn post(&self, notice: Notice) {
        if self.unbounded_send(notice).is_err() {
            tracing::debug!("Notice dropped, receiver gone");
        }
    }
}

/// Writes notices to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn post(&self, notice: Notice) {
        match notice.severity {
            Severity::Error => tracing::error!("{}", notice.message),
            Severity::Success | Severity::Info => tracing::info!("{}", notice.message),
        }
    }
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn post(&self, notice: Notice) {
        (**self).post(notice)
    }
}
