use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::render::{MathEngine, RenderOptions, SymbolSource};

const DEFAULT_CONFIG: &str = include_str!("default_config.toml");

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub math: MathConfig,
    pub page: PageConfig,
    pub font: FontConfig,
    pub labels: LabelsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MathConfig {
    pub throw_on_error: bool,
    pub strict: bool,
    pub trust: bool,
    pub error_color: String,
    /// Symbol table replacing the built-in one.
    pub symbols: Option<PathBuf>,
}

impl Default for MathConfig {
    fn default() -> Self {
        let options = RenderOptions::default();
        Self {
            throw_on_error: options.throw_on_error,
            strict: options.strict,
            trust: options.trust,
            error_color: "#cc0000".to_string(),
            symbols: None,
        }
    }
}

impl MathConfig {
    /// Inline render options; equations switch to display mode themselves.
    pub fn options(&self) -> RenderOptions {
        RenderOptions {
            throw_on_error: self.throw_on_error,
            display_mode: false,
            strict: self.strict,
            trust: self.trust,
        }
    }

    /// An engine that has not loaded yet.
    pub fn engine(&self) -> MathEngine {
        let source = match &self.symbols {
            Some(path) => SymbolSource::File(path.clone()),
            None => SymbolSource::Builtin,
        };
        MathEngine::new(source, self.error_color.clone())
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PageConfig {
    pub numbers: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FontConfig {
    pub family: Option<String>,
    /// Typst length, e.g. `"11pt"`.
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    pub step: String,
    pub origin: String,
    pub application: String,
    /// `{count}` is replaced with the number of hidden steps.
    pub hidden_steps: String,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            step: "Schritt".to_string(),
            origin: "Ansatz / Herkunft".to_string(),
            application: "Anwendung".to_string(),
            hidden_steps: "{count} weitere Schritte".to_string(),
        }
    }
}

impl Config {
    /// The bundled default configuration.
    pub fn compiled_default() -> Self {
        toml::from_str(DEFAULT_CONFIG).unwrap_or_default()
    }

    /// Load config from a TOML file, or return defaults if not found.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("ignoring invalid config {}: {}", path.display(), e);
                Self::compiled_default()
            }),
            Err(e) => {
                tracing::debug!("no config at {}: {}", path.display(), e);
                Self::compiled_default()
            }
        }
    }
}
