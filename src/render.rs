use std::fmt;
use std::path::PathBuf;

use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::tex::{SymbolTable, TexRenderer};
use crate::typst::push_escaped;

/// Options passed to every [`MathRenderer::render`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Return errors instead of rendering them inline.
    #[serde(alias = "throwOnError")]
    pub throw_on_error: bool,
    #[serde(alias = "displayMode")]
    pub display_mode: bool,
    /// Reject input outside the supported character set.
    pub strict: bool,
    /// Allow commands that produce links.
    pub trust: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            throw_on_error: false,
            display_mode: false,
            strict: false,
            trust: true,
        }
    }
}

impl RenderOptions {
    pub fn display(self, display_mode: bool) -> Self {
        Self {
            display_mode,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    UnknownCommand(String),
    MissingArgument(String),
    UnbalancedBraces,
    NonAscii(char),
    Untrusted(String),
    /// Input the LaTeX parser could not make sense of.
    Syntax(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::UnknownCommand(name) => write!(f, "unknown command \\{}", name),
            RenderError::MissingArgument(name) => write!(f, "missing argument for \\{}", name),
            RenderError::UnbalancedBraces => write!(f, "unbalanced braces"),
            RenderError::NonAscii(ch) => write!(f, "unsupported character {:?} in strict mode", ch),
            RenderError::Untrusted(name) => write!(f, "\\{} requires trust", name),
            RenderError::Syntax(text) => write!(f, "cannot parse {:?}", text),
        }
    }
}

impl std::error::Error for RenderError {}

/// Typesets one math source into `out`.
pub trait MathRenderer: Send + Sync {
    fn render(
        &self,
        source: &str,
        out: &mut String,
        options: &RenderOptions,
    ) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOutcome {
    Typeset,
    Fallback,
}

/// Render a math segment, falling back to its raw source.
pub fn render_math(
    renderer: Option<&dyn MathRenderer>,
    source: &str,
    out: &mut String,
    options: &RenderOptions,
) -> MathOutcome {
    let Some(renderer) = renderer else {
        push_escaped(out, source);
        return MathOutcome::Fallback;
    };

    let mark = out.len();
    match renderer.render(source, out, options) {
        Ok(()) => MathOutcome::Typeset,
        Err(e) => {
            tracing::debug!(%source, error = %e, "math rendering failed, using raw source");
            out.truncate(mark);
            push_escaped(out, source);
            MathOutcome::Fallback
        }
    }
}

/// Where the typesetter's symbol tables come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SymbolSource {
    #[default]
    Builtin,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError(pub String);

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "math engine failed to load: {}", self.0)
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Pending,
    Ready,
    Failed,
}

/// Loads the typesetter once. A failed load stays failed.
pub struct MathEngine {
    source: SymbolSource,
    error_color: String,
    cell: OnceCell<Result<TexRenderer, LoadError>>,
}

impl MathEngine {
    pub fn new(source: SymbolSource, error_color: impl Into<String>) -> Self {
        Self {
            source,
            error_color: error_color.into(),
            cell: OnceCell::new(),
        }
    }

    /// Load the typesetter on first call; later calls return the same outcome.
    pub fn load(&self) -> Result<&TexRenderer, &LoadError> {
        self.cell
            .get_or_init(|| {
                let loaded = load_symbols(&self.source)
                    .map(|table| TexRenderer::new(table, self.error_color.clone()));
                match &loaded {
                    Ok(_) => tracing::debug!(source = ?self.source, "math engine ready"),
                    Err(e) => tracing::warn!("{}; math will be shown as source text", e),
                }
                loaded
            })
            .as_ref()
    }

    /// The typesetter, if it has already loaded successfully.
    pub fn renderer(&self) -> Option<&dyn MathRenderer> {
        match self.cell.get() {
            Some(Ok(renderer)) => Some(renderer),
            _ => None,
        }
    }

    pub fn state(&self) -> EngineState {
        match self.cell.get() {
            None => EngineState::Pending,
            Some(Ok(_)) => EngineState::Ready,
            Some(Err(_)) => EngineState::Failed,
        }
    }
}

fn load_symbols(source: &SymbolSource) -> Result<SymbolTable, LoadError> {
    match source {
        SymbolSource::Builtin => SymbolTable::builtin(),
        SymbolSource::File(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| LoadError(format!("reading {}: {}", path.display(), e)))?;
            SymbolTable::from_toml(&content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl MathRenderer for Failing {
        fn render(
            &self,
            source: &str,
            out: &mut String,
            _options: &RenderOptions,
        ) -> Result<(), RenderError> {
            out.push_str("partial");
            Err(RenderError::UnknownCommand(source.to_string()))
        }
    }

    #[test]
    fn failure_writes_raw_source_only() {
        let mut out = String::from("before ");
        let outcome = render_math(Some(&Failing), "x_1", &mut out, &RenderOptions::default());
        assert_eq!(outcome, MathOutcome::Fallback);
        assert_eq!(out, "before x\\_1");
    }

    #[test]
    fn missing_renderer_writes_raw_source() {
        let mut out = String::new();
        let outcome = render_math(None, "a", &mut out, &RenderOptions::default());
        assert_eq!(outcome, MathOutcome::Fallback);
        assert_eq!(out, "a");
    }

    #[test]
    fn engine_loads_once() {
        let engine = MathEngine::new(SymbolSource::Builtin, "#cc0000");
        assert_eq!(engine.state(), EngineState::Pending);
        assert!(engine.renderer().is_none());
        assert!(engine.load().is_ok());
        assert_eq!(engine.state(), EngineState::Ready);
        assert!(engine.renderer().is_some());
    }

    #[test]
    fn failed_load_is_permanent() {
        let engine = MathEngine::new(
            SymbolSource::File(PathBuf::from("/nonexistent/symbols.toml")),
            "#cc0000",
        );
        assert!(engine.load().is_err());
        assert!(engine.load().is_err());
        assert_eq!(engine.state(), EngineState::Failed);
        assert!(engine.renderer().is_none());
    }

    #[test]
    fn options_accept_camel_case() {
        let options: RenderOptions =
            serde_json::from_str(r#"{"throwOnError": true, "trust": false}"#).unwrap();
        assert!(options.throw_on_error);
        assert!(!options.trust);
        assert!(!options.strict);
    }
}
