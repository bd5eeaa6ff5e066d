//! Per-page client state shared by the page handlers.

use splitfriend_sw::{ServiceWorkerContainer, ServiceWorkerId, WorkerConfig};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::install::{InstallOutcome, InstallPrompt, InstallResult, Platform};
use crate::storage::{LocalStorage, StorageError};
use crate::theme::{ThemeStore, ThemeView};
use crate::toast::{ToastAction, Toaster};

/// Everything the page handlers share: storage, the visible theme and toast,
/// the deferred install prompt, and the cached VAPID key.
pub struct ClientSession {
    pub config: ClientConfig,
    pub storage: LocalStorage,
    pub toaster: Toaster,
    pub theme: ThemeView,
    theme_store: ThemeStore,
    user_agent: String,
    deferred_prompt: Option<Box<dyn InstallPrompt>>,
    install_button_visible: bool,
    vapid_public_key: Option<String>,
}

impl ClientSession {
    pub fn new(config: ClientConfig, user_agent: impl Into<String>) -> Self {
        let storage = LocalStorage::open(config.storage_path());
        let theme_store = ThemeStore::new(&config.theme_storage_key, &config.default_theme);
        let toaster = Toaster::new(config.toast_duration());
        Self {
            config,
            storage,
            toaster,
            theme: ThemeView::default(),
            theme_store,
            user_agent: user_agent.into(),
            deferred_prompt: None,
            install_button_visible: false,
            vapid_public_key: None,
        }
    }

    /// Theme options offered by the page's theme menu.
    pub fn with_theme_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.theme = ThemeView::with_options(options);
        self
    }

    // ==================== Theme ====================

    /// Apply the stored theme (or the default) to the page.
    pub fn initialize_theme(&mut self) -> String {
        let theme = self.theme_store.current(&self.storage);
        self.theme.apply(&theme);
        theme
    }

    /// Switch theme, persist it, and confirm with a toast.
    pub fn set_theme(&mut self, theme: &str) -> Result<(), StorageError> {
        self.theme.apply(theme);
        self.theme_store.store(&mut self.storage, theme)?;
        self.toaster.show("Theme changed successfully!");
        Ok(())
    }

    // ==================== Install prompt ====================

    /// `beforeinstallprompt`: keep the prompt for later and offer install.
    pub fn on_before_install_prompt(&mut self, prompt: Box<dyn InstallPrompt>) {
        info!("beforeinstallprompt fired");
        self.deferred_prompt = Some(prompt);
        self.install_button_visible = true;
        self.toaster.show_install();
    }

    /// `appinstalled`
    pub fn on_app_installed(&mut self) {
        info!("PWA was installed");
        self.deferred_prompt = None;
        self.install_button_visible = false;
    }

    /// Install button. Without a deferred prompt, shows manual steps for the
    /// user's platform.
    pub async fn install(&mut self) -> InstallResult {
        let Some(prompt) = self.deferred_prompt.take() else {
            let platform = Platform::from_user_agent(&self.user_agent);
            self.toaster.show(platform.manual_instructions());
            return InstallResult::ManualInstructions(platform);
        };

        let outcome = prompt.prompt().await;
        if outcome == InstallOutcome::Accepted {
            info!("User accepted the install prompt");
        }
        InstallResult::Prompted(outcome)
    }

    /// A button on the visible toast was pressed. Any action closes it.
    pub async fn on_toast_action(&mut self, action: ToastAction) -> Option<InstallResult> {
        self.toaster.dismiss();
        match action {
            ToastAction::Install => Some(self.install().await),
            ToastAction::Close => None,
        }
    }

    pub fn install_button_visible(&self) -> bool {
        self.install_button_visible
    }

    pub fn has_deferred_prompt(&self) -> bool {
        self.deferred_prompt.is_some()
    }

    // ==================== Push ====================

    pub fn vapid_public_key(&self) -> Option<&str> {
        self.vapid_public_key.as_deref()
    }

    pub(crate) fn set_vapid_public_key(&mut self, key: String) {
        self.vapid_public_key = Some(key);
    }

    // ==================== Worker ====================

    /// Register the offline worker on page load. Failure is logged only.
    pub async fn register_worker(
        &self,
        container: &ServiceWorkerContainer,
        worker: WorkerConfig,
    ) -> Option<ServiceWorkerId> {
        match container.register(&self.config.worker_script, worker).await {
            Ok(id) => {
                let scope = container.get_registration(self.config.server_url.as_str()).await;
                info!(scope = ?scope, "ServiceWorker registered");
                Some(id)
            }
            Err(e) => {
                warn!(error = %e, "ServiceWorker registration failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("theme", &self.theme.data_theme)
            .field("has_deferred_prompt", &self.has_deferred_prompt())
            .field("install_button_visible", &self.install_button_visible)
            .finish_non_exhaustive()
    }
}
