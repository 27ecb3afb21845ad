// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Editor configuration.
//!
//! Loaded from JSON supplied by the host shell. Every field has a default, so an empty object
//! (or no config at all) yields a working editor.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_EXTRACTION_DELAY_MS: u64 = 50;
pub const DEFAULT_THEME: &str = "default";
pub const DEFAULT_RENDER_ID_PREFIX: &str = "diagram";

const BUILTIN_THEMES: [&str; 4] = ["default", "dark", "forest", "neutral"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EditorConfig {
    /// Quiet period after the last text change before a render is requested.
    pub debounce_ms: u64,
    /// Delay between a successful render and walking its output.
    pub extraction_delay_ms: u64,
    /// Name of the active entry in `themes`.
    pub theme: String,
    /// Named theme records, passed to the renderer without interpretation.
    pub themes: BTreeMap<String, Value>,
    /// Prefix of the unique id sent with every render request.
    pub render_id_prefix: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        let themes = BUILTIN_THEMES
            .into_iter()
            .map(|name| (name.to_owned(), serde_json::json!({ "theme": name })))
            .collect();
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            extraction_delay_ms: DEFAULT_EXTRACTION_DELAY_MS,
            theme: DEFAULT_THEME.to_owned(),
            themes,
            render_id_prefix: DEFAULT_RENDER_ID_PREFIX.to_owned(),
        }
    }
}

/// The theme handed to the render service alongside each request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ThemeConfig {
    pub name: String,
    pub variables: Value,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self { name: DEFAULT_THEME.to_owned(), variables: Value::Object(Default::default()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse { message: String },
    InvalidRenderIdPrefix { prefix: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { message } => write!(f, "invalid editor config: {message}"),
            Self::InvalidRenderIdPrefix { prefix } => {
                write!(f, "render id prefix must be a non-empty token without whitespace: {prefix:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse { message: value.to_string() }
    }
}

impl EditorConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config = serde_json::from_str::<Self>(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = self.render_id_prefix.as_str();
        if prefix.is_empty() || prefix.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidRenderIdPrefix { prefix: prefix.to_owned() });
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn extraction_delay(&self) -> Duration {
        Duration::from_millis(self.extraction_delay_ms)
    }

    /// Resolves the active theme. Unknown names keep the name with an empty variable record.
    pub fn theme_config(&self) -> ThemeConfig {
        let variables =
            self.themes.get(&self.theme).cloned().unwrap_or_else(|| Value::Object(Default::default()));
        ThemeConfig { name: self.theme.clone(), variables }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }
}
