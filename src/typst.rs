use typst_as_lib::TypstEngine;
use typst_as_lib::typst_kit_options::TypstKitFontOptions;
use typst_library::layout::PagedDocument;
use typst_pdf::PdfOptions;

use crate::block::{Block, Span};
use crate::config::Config;
use crate::render::{MathRenderer, RenderOptions, render_math};

/// Convert blocks to Typst markup
pub fn blocks_to_typst(
    blocks: &[Block],
    config: &Config,
    renderer: Option<&dyn MathRenderer>,
) -> String {
    let mut out = String::new();
    let options = config.math.options();

    // Set up paragraph settings to prevent widows/orphans
    out.push_str("#set par(linebreaks: \"optimized\")\n");
    if config.page.numbers {
        out.push_str("#set page(numbering: \"1\")\n");
    }
    if let Some(family) = &config.font.family {
        out.push_str(&format!("#set text(font: \"{}\")\n", family.replace('"', "")));
    }
    if let Some(size) = &config.font.size {
        out.push_str(&format!("#set text(size: {})\n", size));
    }
    out.push('\n');

    let mut i = 0;
    while i < blocks.len() {
        let block = &blocks[i];

        match block {
            Block::Heading { .. } => {
                // Keep heading with following content using a block that prevents breaks
                out.push_str("#block(breakable: false)[\n");
                emit_block(block, renderer, &options, &mut out);

                // Include the next block if it is not another heading
                if let Some(next) = blocks
                    .get(i + 1)
                    .filter(|next| !matches!(next, Block::Heading { .. }))
                {
                    i += 1;
                    emit_block(next, renderer, &options, &mut out);
                }
                out.push_str("]\n\n");
            }
            _ => {
                emit_block(block, renderer, &options, &mut out);
            }
        }

        i += 1;
    }

    out
}

fn emit_block(
    block: &Block,
    renderer: Option<&dyn MathRenderer>,
    options: &RenderOptions,
    out: &mut String,
) {
    match block {
        Block::Heading { level, content } => {
            for _ in 0..*level {
                out.push('=');
            }
            out.push(' ');
            spans_to_typst(content, renderer, options, out);
            out.push('\n');
            out.push('\n');
        }
        Block::Paragraph { content } => {
            spans_to_typst(content, renderer, options, out);
            out.push('\n');
            out.push('\n');
        }
        Block::Equation { label, source } => {
            if let Some(label) = label {
                out.push_str("#text(size: 0.8em, fill: gray)[");
                push_escaped(out, label);
                out.push_str("]\n");
            }
            render_math(renderer, source, out, &options.display(true));
            out.push('\n');
            out.push('\n');
        }
        Block::Rule => {
            out.push_str("#line(length: 100%)\n\n");
        }
    }
}

/// Append inline spans as Typst markup.
pub fn spans_to_typst(
    spans: &[Span],
    renderer: Option<&dyn MathRenderer>,
    options: &RenderOptions,
    out: &mut String,
) {
    for span in spans {
        span_to_typst(span, renderer, options, out);
    }
}

fn span_to_typst(
    span: &Span,
    renderer: Option<&dyn MathRenderer>,
    options: &RenderOptions,
    out: &mut String,
) {
    match span {
        Span::Text(text) => push_escaped(out, text),
        Span::Math { source, display } => {
            render_math(renderer, source, out, &options.display(*display));
        }
        Span::Bold(inner) => {
            out.push('*');
            spans_to_typst(inner, renderer, options, out);
            out.push('*');
        }
        Span::Italic(inner) => {
            out.push('_');
            spans_to_typst(inner, renderer, options, out);
            out.push('_');
        }
    }
}

/// Append text with Typst's special characters escaped.
///
/// Markers that only have meaning at the start of a line (`=`, `-`, `+`,
/// `1.`) are escaped there.
pub(crate) fn push_escaped(out: &mut String, text: &str) {
    let mut line_start = out
        .rsplit('\n')
        .next()
        .is_none_or(|line| line.trim().is_empty());
    // Only digits since the start of the line
    let mut numbered = false;

    for ch in text.chars() {
        let escape = match ch {
            '#' | '*' | '_' | '@' | '$' | '\\' | '`' | '<' | '>' | '[' | ']' | '/' | '~' => true,
            '=' | '-' | '+' => line_start,
            '.' => numbered,
            _ => false,
        };
        if escape {
            out.push('\\');
        }
        out.push(ch);

        if ch == '\n' {
            line_start = true;
            numbered = false;
        } else if ch.is_ascii_digit() {
            numbered = line_start || numbered;
            line_start = false;
        } else if !ch.is_whitespace() || numbered {
            line_start = false;
            numbered = false;
        }
    }
}

/// Compile Typst markup to PDF bytes.
pub fn typst_to_pdf(markup: String) -> Result<Vec<u8>, String> {
    let font_options = TypstKitFontOptions::new()
        .include_embedded_fonts(true)
        .include_system_fonts(false);

    let engine = TypstEngine::builder()
        .main_file(markup)
        .search_fonts_with(font_options)
        .build();

    let doc: PagedDocument = engine
        .compile()
        .output
        .map_err(|e| format!("Typst compilation failed: {:?}", e))?;

    typst_pdf::pdf(&doc, &PdfOptions::default())
        .map_err(|e| format!("PDF generation failed: {:?}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{MathEngine, SymbolSource};
    use crate::{parse, text_to_typst};

    const PREAMBLE: &str = "#set par(linebreaks: \"optimized\")\n#set page(numbering: \"1\")\n\n";

    fn bare_config() -> Config {
        let mut config = Config::compiled_default();
        config.font.family = None;
        config.font.size = None;
        config
    }

    fn markup(blocks: &[Block]) -> String {
        let engine = MathEngine::new(SymbolSource::Builtin, "#cc0000");
        let renderer = engine.load().ok().map(|r| r as &dyn MathRenderer);
        blocks_to_typst(blocks, &bare_config(), renderer)
    }

    fn paragraph(text: &str) -> Block {
        Block::Paragraph {
            content: parse(text),
        }
    }

    #[test]
    fn paragraph_with_math() {
        assert_eq!(
            markup(&[paragraph("Druck $p_4$ im Trenner")]),
            format!("{PREAMBLE}Druck $p_4$ im Trenner\n\n")
        );
    }

    #[test]
    fn bold_and_italic() {
        assert_eq!(
            markup(&[paragraph("**fett** und *kursiv*")]),
            format!("{PREAMBLE}*fett* und _kursiv_\n\n")
        );
    }

    #[test]
    fn heading_groups_with_following_paragraph() {
        let blocks = vec![
            Block::Heading {
                level: 1,
                content: parse("Title"),
            },
            paragraph("Some text."),
        ];
        assert_eq!(
            markup(&blocks),
            format!("{PREAMBLE}#block(breakable: false)[\n= Title\n\nSome text.\n\n]\n\n")
        );
    }

    #[test]
    fn consecutive_headings_are_not_merged() {
        let blocks = vec![
            Block::Heading {
                level: 1,
                content: parse("A"),
            },
            Block::Heading {
                level: 2,
                content: parse("B"),
            },
        ];
        assert_eq!(
            markup(&blocks),
            format!(
                "{PREAMBLE}#block(breakable: false)[\n= A\n\n]\n\n#block(breakable: false)[\n== B\n\n]\n\n"
            )
        );
    }

    #[test]
    fn labelled_equation_is_display_math() {
        let blocks = vec![Block::Equation {
            label: Some("Anwendung".to_string()),
            source: r"x_i = \frac{n_i}{n}".to_string(),
        }];
        assert_eq!(
            markup(&blocks),
            format!(
                "{PREAMBLE}#text(size: 0.8em, fill: gray)[Anwendung]\n$ x_i = frac(n_i, n) $\n\n"
            )
        );
    }

    #[test]
    fn escapes_special_chars() {
        assert_eq!(
            markup(&[paragraph("a # b [c]")]),
            format!("{PREAMBLE}a \\# b \\[c\\]\n\n")
        );
    }

    #[test]
    fn slashes_do_not_start_comments() {
        assert_eq!(
            markup(&[paragraph("Strom A // Strom B")]),
            format!("{PREAMBLE}Strom A \\/\\/ Strom B\n\n")
        );
        assert_eq!(
            markup(&[paragraph("kmol/h ~ 5")]),
            format!("{PREAMBLE}kmol\\/h \\~ 5\n\n")
        );
    }

    #[test]
    fn line_start_markers_stay_text() {
        assert_eq!(
            markup(&[paragraph("- x")]),
            format!("{PREAMBLE}\\- x\n\n")
        );
        assert_eq!(
            markup(&[paragraph("+ 1 = 2. Schritt")]),
            format!("{PREAMBLE}\\+ 1 = 2. Schritt\n\n")
        );
        assert_eq!(
            markup(&[paragraph("2. Schritt - a")]),
            format!("{PREAMBLE}2\\. Schritt - a\n\n")
        );
        assert_eq!(
            markup(&[paragraph("a\n= b")]),
            format!("{PREAMBLE}a\n\\= b\n\n")
        );
    }

    #[test]
    fn escaped_text_survives_compilation() {
        let pdf = typst_to_pdf(markup(&[paragraph("Strom A // Strom B\n- x")]));
        assert!(pdf.is_ok(), "{:?}", pdf.err());
    }

    #[test]
    fn empty_math_argument_falls_back_to_source() {
        let markup = markup(&[paragraph(r"a $\sqrt{}$ b")]);
        assert_eq!(
            markup,
            format!("{PREAMBLE}a #text(fill: rgb(\"#cc0000\"))[\\\\sqrt{{}}] b\n\n")
        );
        let pdf = typst_to_pdf(markup);
        assert!(pdf.is_ok(), "{:?}", pdf.err());
    }

    #[test]
    fn without_renderer_math_is_source_text() {
        let blocks = vec![paragraph("$a_1$ und b")];
        assert_eq!(
            blocks_to_typst(&blocks, &bare_config(), None),
            format!("{PREAMBLE}a\\_1 und b\n\n")
        );
    }

    #[test]
    fn text_to_typst_uses_builtin_engine() {
        assert!(text_to_typst("$\\alpha$").contains("$alpha$"));
    }

    #[test]
    fn rule() {
        assert_eq!(
            markup(&[Block::Rule]),
            format!("{PREAMBLE}#line(length: 100%)\n\n")
        );
    }
}
