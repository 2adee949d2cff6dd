//! Light/dark preference.
//!
//! Until the user picks a mode explicitly the theme follows the environment's
//! color-scheme preference, including live changes to it. The first
//! [`ThemeState::toggle`] or [`ThemeState::set_mode`] persists a choice and
//! the environment is ignored from then on.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::storage::KeyValueStore;

pub const THEME_KEY: &str = "kfz_theme_mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }

    pub fn from_preference(prefers_dark: bool) -> Self {
        if prefers_dark { ThemeMode::Dark } else { ThemeMode::Light }
    }

    pub fn flipped(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }
}

impl FromStr for ThemeMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            _ => Err(()),
        }
    }
}

pub struct ThemeState {
    store: Arc<dyn KeyValueStore>,
    mode: ThemeMode,
}

impl ThemeState {
    pub fn init(store: Arc<dyn KeyValueStore>, prefers_dark: bool) -> Self {
        let mode = explicit_choice(store.as_ref()).unwrap_or_else(|| ThemeMode::from_preference(prefers_dark));
        tracing::debug!(mode = mode.as_str(), "Theme initialized");
        ThemeState { store, mode }
    }

    pub fn mode(&self) -> ThemeMode {
        self.mode
    }

    pub fn is_dark_mode(&self) -> bool {
        self.mode == ThemeMode::Dark
    }

    pub fn has_explicit_choice(&self) -> bool {
        explicit_choice(self.store.as_ref()).is_some()
    }

    pub fn toggle(&mut self) -> ThemeMode {
        self.choose(self.mode.flipped());
        self.mode
    }

    /// Ignores anything other than `"light"` or `"dark"`. Returns whether the input was accepted.
    pub fn set_mode(&mut self, mode: &str) -> bool {
        match mode.parse::<ThemeMode>() {
            Ok(mode) => {
                self.choose(mode);
                true
            }
            Err(()) => {
                tracing::debug!(mode, "Ignoring unknown theme mode");
                false
            }
        }
    }

    /// The environment's color-scheme preference changed.
    pub fn environment_changed(&mut self, prefers_dark: bool) {
        if self.has_explicit_choice() {
            return;
        }
        self.mode = ThemeMode::from_preference(prefers_dark);
    }

    fn choose(&mut self, mode: ThemeMode) {
        self.mode = mode;
        if let Err(e) = self.store.set(THEME_KEY, mode.as_str()) {
            tracing::warn!(error = %e, "Failed to persist theme mode");
        }
    }
}

fn explicit_choice(store: &dyn KeyValueStore) -> Option<ThemeMode> {
    store.get(THEME_KEY).and_then(|raw| raw.parse().ok())
}
