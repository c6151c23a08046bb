use once_cell::sync::Lazy;
use regex::Regex;

pub const PLACEHOLDER_PREFIX: &str = "__MATH_TOKEN_";
pub const PLACEHOLDER_SUFFIX: &str = "__";

/// Control words recognized ahead of the subscript pattern.
pub const COMMANDS: &[&str] = &[
    "sum",
    "frac",
    "sqrt",
    "cdot",
    "rightarrow",
    "Delta",
    "xi",
    "eta",
    "nu",
    "alpha",
    "beta",
    "gamma",
    "delta",
    "epsilon",
    "theta",
    "lambda",
    "mu",
    "pi",
    "sigma",
    "tau",
    "phi",
    "psi",
    "omega",
];

/// Which matcher recognized a math span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathKind {
    /// `$...$`
    Delimited,
    /// One of [`COMMANDS`] with its backslash.
    Command,
    /// A letter with `_`/`^` attachments, e.g. `x_{6A}^2`.
    Script,
    /// Any other `\word`.
    BareCommand,
}

impl MathKind {
    /// Priority order; the first matcher that matches at the leftmost position wins.
    const ORDER: [MathKind; 4] = [
        MathKind::Delimited,
        MathKind::Command,
        MathKind::Script,
        MathKind::BareCommand,
    ];

    fn group(self) -> &'static str {
        match self {
            MathKind::Delimited => "delimited",
            MathKind::Command => "command",
            MathKind::Script => "script",
            MathKind::BareCommand => "bare",
        }
    }

    fn pattern(self) -> String {
        match self {
            MathKind::Delimited => r"\$[^$]+\$".to_string(),
            MathKind::Command => format!(r"\\(?:{})", COMMANDS.join("|")),
            MathKind::Script => {
                let arg = r"(?:[a-zA-Z0-9]|\{[^}]+\})";
                format!(r"[a-zA-Z](?:_{arg})+(?:\^{arg})?")
            }
            MathKind::BareCommand => r"\\[a-zA-Z]+".to_string(),
        }
    }
}

static MATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let alternation = MathKind::ORDER
        .iter()
        .map(|kind| format!("(?P<{}>{})", kind.group(), kind.pattern()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternation).unwrap()
});

/// A recognized math span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathToken {
    pub index: usize,
    /// Math source with `$` delimiters stripped.
    pub source: String,
    pub kind: MathKind,
}

/// Output of [`tokenize`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tokenized {
    /// Input text with every math span replaced by its placeholder.
    pub text: String,
    pub tokens: Vec<MathToken>,
}

impl Tokenized {
    pub fn token(&self, index: usize) -> Option<&MathToken> {
        self.tokens.get(index)
    }
}

/// Placeholder substituted for the token at `index`.
pub fn placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_PREFIX}{index}{PLACEHOLDER_SUFFIX}")
}

/// Extract math spans from `text`, numbering them in order of appearance.
pub fn tokenize(text: &str) -> Tokenized {
    let mut out = String::with_capacity(text.len());
    let mut tokens = Vec::new();
    let mut last = 0;

    for caps in MATH_PATTERN.captures_iter(text) {
        let Some((kind, m)) = MathKind::ORDER
            .iter()
            .find_map(|kind| caps.name(kind.group()).map(|m| (*kind, m)))
        else {
            continue;
        };

        let source = match kind {
            MathKind::Delimited => &m.as_str()[1..m.len() - 1],
            _ => m.as_str(),
        };

        let index = tokens.len();
        out.push_str(&text[last..m.start()]);
        out.push_str(&placeholder(index));
        tokens.push(MathToken {
            index,
            source: source.to_string(),
            kind,
        });
        last = m.end();
    }
    out.push_str(&text[last..]);

    Tokenized { text: out, tokens }
}
