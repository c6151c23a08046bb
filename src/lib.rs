mod block;
mod card;
mod config;
mod math;
mod parser;
mod render;
mod reveal;
mod task;
mod tex;
mod typst;

pub use block::{Block, Leaf, LeafKind, Leaves, Span, leaves, plain_text};
pub use card::task_to_blocks;
pub use config::{Config, FontConfig, LabelsConfig, MathConfig, PageConfig};
pub use math::{MathKind, MathToken, Tokenized, placeholder, tokenize};
pub use parser::{parse, segment};
pub use render::{
    EngineState, LoadError, MathEngine, MathOutcome, MathRenderer, RenderError, RenderOptions,
    SymbolSource, render_math,
};
pub use reveal::RevealSteps;
pub use task::{Difficulty, ImportError, Step, Subtask, TaskData, TaskMeta};
pub use tex::{SymbolTable, TexRenderer};
pub use typst::{blocks_to_typst, spans_to_typst, typst_to_pdf};

use once_cell::sync::Lazy;

/// Engine with the built-in symbol table, shared by the convenience functions.
static DEFAULT_ENGINE: Lazy<MathEngine> =
    Lazy::new(|| Config::compiled_default().math.engine());

/// The shared built-in engine, loaded on first use.
pub fn default_engine() -> &'static MathEngine {
    let engine: &'static MathEngine = &DEFAULT_ENGINE;
    // A failed load is recorded in the engine and leaves math as source text
    let _ = engine.load();
    engine
}

/// Convert annotated text to Typst markup using default config.
pub fn text_to_typst(text: &str) -> String {
    let blocks = [Block::Paragraph {
        content: parse(text),
    }];
    blocks_to_typst(
        &blocks,
        &Config::compiled_default(),
        default_engine().renderer(),
    )
}

/// Convert a task to Typst markup. `reveal` limits the steps shown per subtask.
pub fn task_to_typst(
    task: &TaskData,
    reveal: Option<usize>,
    config: &Config,
    engine: &MathEngine,
) -> String {
    let blocks = task_to_blocks(task, reveal, &config.labels);
    // The load outcome is kept in the engine; without it math falls back to source text
    let _ = engine.load();
    blocks_to_typst(&blocks, config, engine.renderer())
}

/// Convert a task to PDF bytes.
pub fn task_to_pdf(
    task: &TaskData,
    reveal: Option<usize>,
    config: &Config,
    engine: &MathEngine,
) -> Result<Vec<u8>, String> {
    typst_to_pdf(task_to_typst(task, reveal, config, engine))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_engine_follows_bundled_config() {
        assert_eq!(default_engine().state(), EngineState::Ready);

        let color = Config::compiled_default().math.error_color;
        let markup = text_to_typst(r"Wert $\foo$");
        assert!(markup.contains(&format!("#text(fill: rgb(\"{}\"))", color)), "{markup}");
    }
}
