//! Transient UI feedback.

use std::time::{Duration, Instant};

use tracing::debug;

/// Text of the install toast.
pub const INSTALL_TOAST_MESSAGE: &str = "Install SplitFriend app?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastAction {
    Install,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub actions: Vec<ToastAction>,
    pub shown_at: Instant,
    /// `None` for toasts that stay until closed.
    pub expires_at: Option<Instant>,
}

impl Toast {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Single toast slot: showing a toast replaces whatever is on screen.
#[derive(Debug)]
pub struct Toaster {
    duration: Duration,
    current: Option<Toast>,
}

impl Toaster {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            current: None,
        }
    }

    /// Show a plain toast that expires after the configured duration.
    pub fn show(&mut self, message: impl Into<String>) -> &Toast {
        self.show_at(message, Instant::now())
    }

    pub fn show_at(&mut self, message: impl Into<String>, now: Instant) -> &Toast {
        let message = message.into();
        debug!(message = %message, "Toast");
        self.current.insert(Toast {
            message,
            actions: vec![ToastAction::Close],
            shown_at: now,
            expires_at: Some(now + self.duration),
        })
    }

    /// Show the install toast. It stays until an action closes it.
    pub fn show_install(&mut self) -> &Toast {
        self.current.insert(Toast {
            message: INSTALL_TOAST_MESSAGE.to_string(),
            actions: vec![ToastAction::Install, ToastAction::Close],
            shown_at: Instant::now(),
            expires_at: None,
        })
    }

    /// The toast on screen at `now`, dropping it if it has expired.
    pub fn visible_at(&mut self, now: Instant) -> Option<&Toast> {
        if self.current.as_ref().is_some_and(|t| t.is_expired(now)) {
            self.current = None;
        }
        self.current.as_ref()
    }

    pub fn visible(&mut self) -> Option<&Toast> {
        self.visible_at(Instant::now())
    }

    pub fn dismiss(&mut self) -> Option<Toast> {
        self.current.take()
    }
}
