//! App install prompt.

use async_trait::async_trait;

/// The user's answer to the install prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Accepted,
    Dismissed,
}

/// Deferred platform install prompt (`beforeinstallprompt`). Usable once.
#[async_trait]
pub trait InstallPrompt: Send + Sync {
    /// Show the prompt and wait for the user's choice.
    async fn prompt(&self) -> InstallOutcome;
}

/// Result of the install button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallResult {
    /// No deferred prompt; manual steps were shown instead.
    ManualInstructions(Platform),
    /// The platform prompt was shown.
    Prompted(InstallOutcome),
}

/// Platform families with different manual install steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
    Other,
}

impl Platform {
    pub fn from_user_agent(user_agent: &str) -> Self {
        if ["iPad", "iPhone", "iPod"].iter().any(|d| user_agent.contains(d)) {
            Platform::Ios
        } else if user_agent.contains("Android") {
            Platform::Android
        } else {
            Platform::Other
        }
    }

    pub fn manual_instructions(&self) -> &'static str {
        match self {
            Platform::Ios => "To install: tap the Share button, then \"Add to Home Screen\"",
            Platform::Android => {
                "To install: tap the menu (3 dots), then \"Add to Home Screen\" or \"Install app\""
            }
            Platform::Other => {
                "To install: look for the install icon in your browser's address bar, or use browser menu"
            }
        }
    }
}
