use once_cell::sync::Lazy;
use regex::Regex;

use crate::block::Span;
use crate::math::{self, MathToken};

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*[^*]+\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*[^*]+\*").unwrap());
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"__MATH_TOKEN_(\d+)__").unwrap());

/// Parse annotated text into segments: math first, then bold, then italic.
pub fn parse(text: &str) -> Vec<Span> {
    let tokenized = math::tokenize(text);
    segment(&tokenized.text, &tokenized.tokens)
}

/// Segment placeholder-bearing text into emphasis, text and math spans.
///
/// Unmatched `*` and `**` stay in the output as literal text.
pub fn segment(text: &str, tokens: &[MathToken]) -> Vec<Span> {
    let mut spans = Vec::new();

    for piece in split_keeping(&BOLD, text) {
        match strip_marker(piece, "**") {
            Some(inner) => spans.push(Span::Bold(italics(inner, tokens))),
            None => spans.extend(italics(piece, tokens)),
        }
    }

    spans
}

fn italics(text: &str, tokens: &[MathToken]) -> Vec<Span> {
    let mut spans = Vec::new();

    for piece in split_keeping(&ITALIC, text) {
        match strip_marker(piece, "*") {
            Some(inner) => spans.push(Span::Italic(resolve_math(inner, tokens))),
            None => spans.extend(resolve_math(piece, tokens)),
        }
    }

    spans
}

/// Turn placeholders back into math spans; everything else is text.
fn resolve_math(text: &str, tokens: &[MathToken]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        let token = caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|index| tokens.get(index));

        // Unresolvable placeholders stay in the surrounding text
        let Some(token) = token else { continue };

        if last < m.start() {
            spans.push(Span::text(&text[last..m.start()]));
        }
        spans.push(Span::math(token.source.as_str()));
        last = m.end();
    }

    if last < text.len() {
        spans.push(Span::text(&text[last..]));
    }

    spans
}

/// Split `text` around every match of `pattern`, keeping the matches.
/// Empty pieces are dropped.
fn split_keeping<'t>(pattern: &Regex, text: &'t str) -> Vec<&'t str> {
    let mut pieces = Vec::new();
    let mut last = 0;

    for m in pattern.find_iter(text) {
        pieces.push(&text[last..m.start()]);
        pieces.push(m.as_str());
        last = m.end();
    }
    pieces.push(&text[last..]);

    pieces.retain(|piece| !piece.is_empty());
    pieces
}

/// Interior of `piece` if it is wrapped in `marker` with something in between.
fn strip_marker<'t>(piece: &'t str, marker: &str) -> Option<&'t str> {
    if piece.len() > 2 * marker.len() && piece.starts_with(marker) && piece.ends_with(marker) {
        Some(&piece[marker.len()..piece.len() - marker.len()])
    } else {
        None
    }
}
