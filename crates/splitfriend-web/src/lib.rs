//! # SplitFriend Web
//!
//! Page-side state and handlers of the SplitFriend client.
//!
//! ## Features
//!
//! - **Theme**: persisted theme selection reflected on the document
//! - **Split form**: input visibility per split type and sum validation
//! - **Toasts**: single-slot transient feedback
//! - **Install prompt**: deferred platform prompt with manual fallback
//! - **Push**: subscribe/unsubscribe against the server push API
//!
//! Handlers run against a [`ClientSession`], which owns all state shared
//! between handlers.

pub mod config;
pub mod install;
pub mod push;
pub mod session;
pub mod split;
pub mod storage;
pub mod theme;
pub mod toast;

pub use config::ClientConfig;
pub use install::{InstallOutcome, InstallPrompt, InstallResult, Platform};
pub use push::{
    decode_application_server_key, Permission, PushApi, PushError, PushPlatform, PushStatus,
    PushSubscription, PushSubscriptionManager,
};
pub use session::ClientSession;
pub use split::{
    format_amount, format_currency, InputVisibility, ParticipantRow, SplitForm, SplitType,
    SplitValidationError,
};
pub use storage::{LocalStorage, StorageError};
pub use theme::{ThemeOption, ThemeStore, ThemeView, DEFAULT_THEME, THEME_STORAGE_KEY};
pub use toast::{Toast, ToastAction, Toaster};
