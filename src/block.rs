use serde::Serialize;

/// Inline segments with formatting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum Span {
    Text(String),
    Math { source: String, display: bool },
    Bold(Vec<Span>),
    Italic(Vec<Span>),
}

impl Span {
    pub fn text(content: impl Into<String>) -> Self {
        Span::Text(content.into())
    }

    /// Inline math segment.
    pub fn math(source: impl Into<String>) -> Self {
        Span::Math {
            source: source.into(),
            display: false,
        }
    }

    /// Visible content: text as written, math as its source, emphasis dropped.
    pub fn plain_text(&self) -> String {
        match self {
            Span::Text(text) => text.clone(),
            Span::Math { source, .. } => source.clone(),
            Span::Bold(inner) | Span::Italic(inner) => plain_text(inner),
        }
    }
}

pub fn plain_text(spans: &[Span]) -> String {
    spans.iter().map(Span::plain_text).collect()
}

/// A Text or Math segment with the emphasis that encloses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leaf<'a> {
    pub kind: LeafKind<'a>,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind<'a> {
    Text(&'a str),
    Math { source: &'a str, display: bool },
}

/// Iterate the leaves of a span tree in document order.
pub fn leaves(spans: &[Span]) -> Leaves<'_> {
    Leaves {
        stack: vec![(spans.iter(), false, false)],
    }
}

/// Depth-first walk produced by [`leaves`].
pub struct Leaves<'a> {
    stack: Vec<(std::slice::Iter<'a, Span>, bool, bool)>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = Leaf<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (iter, bold, italic) = self.stack.last_mut()?;
            let (bold, italic) = (*bold, *italic);
            let Some(span) = iter.next() else {
                self.stack.pop();
                continue;
            };

            let kind = match span {
                Span::Text(text) => LeafKind::Text(text),
                Span::Math { source, display } => LeafKind::Math {
                    source,
                    display: *display,
                },
                Span::Bold(inner) => {
                    self.stack.push((inner.iter(), true, italic));
                    continue;
                }
                Span::Italic(inner) => {
                    self.stack.push((inner.iter(), bold, true));
                    continue;
                }
            };
            return Some(Leaf { kind, bold, italic });
        }
    }
}

/// Block-level elements of a rendered task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Heading {
        level: u8,
        content: Vec<Span>,
    },
    Paragraph {
        content: Vec<Span>,
    },
    /// Display-mode formula, given as raw math source.
    Equation {
        label: Option<String>,
        source: String,
    },
    Rule,
}
