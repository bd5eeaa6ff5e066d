//! Theme selection.

use tracing::info;

use crate::storage::{LocalStorage, StorageError};

pub const THEME_STORAGE_KEY: &str = "splitfriend-theme";
pub const DEFAULT_THEME: &str = "theme-emerald";

/// A selectable theme entry in the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeOption {
    pub theme: String,
    pub active: bool,
}

/// What the page shows: the document's `data-theme` and the menu options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeView {
    pub data_theme: Option<String>,
    pub options: Vec<ThemeOption>,
}

impl ThemeView {
    pub fn with_options<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data_theme: None,
            options: options
                .into_iter()
                .map(|theme| ThemeOption {
                    theme: theme.into(),
                    active: false,
                })
                .collect(),
        }
    }

    /// Apply `theme` to the document and mark the matching option.
    pub fn apply(&mut self, theme: &str) {
        self.data_theme = Some(theme.to_string());
        for option in &mut self.options {
            option.active = option.theme == theme;
        }
    }

    pub fn active_option(&self) -> Option<&ThemeOption> {
        self.options.iter().find(|o| o.active)
    }
}

/// Reads and writes the theme in local storage.
#[derive(Debug, Clone)]
pub struct ThemeStore {
    key: String,
    default_theme: String,
}

impl Default for ThemeStore {
    fn default() -> Self {
        Self::new(THEME_STORAGE_KEY, DEFAULT_THEME)
    }
}

impl ThemeStore {
    pub fn new(key: impl Into<String>, default_theme: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            default_theme: default_theme.into(),
        }
    }

    /// Stored theme, or the default.
    pub fn current(&self, storage: &LocalStorage) -> String {
        storage
            .get_item(&self.key)
            .unwrap_or(&self.default_theme)
            .to_string()
    }

    pub fn store(&self, storage: &mut LocalStorage, theme: &str) -> Result<(), StorageError> {
        storage.set_item(&self.key, theme)?;
        info!(theme, "Theme stored");
        Ok(())
    }
}
