use std::collections::HashMap;

use mitex_parser::CommandSpec;
use mitex_parser::syntax::{CmdItem, SyntaxElement, SyntaxKind, SyntaxNode};
use mitex_spec_gen::DEFAULT_SPEC;
use rowan::ast::AstNode;
use serde::Deserialize;

use crate::render::{LoadError, MathRenderer, RenderError, RenderOptions};
use crate::typst::push_escaped;

const BUILTIN_SYMBOLS: &str = include_str!("symbols.toml");

/// Lookup tables for control words without structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SymbolTable {
    /// e.g. `rightarrow = "arrow.r"`
    pub symbols: HashMap<String, String>,
    /// Commands taking one argument, e.g. `dot = "dot"`.
    pub accents: HashMap<String, String>,
    /// An empty value produces no output.
    pub spacing: HashMap<String, String>,
}

impl SymbolTable {
    pub fn builtin() -> Result<Self, LoadError> {
        Self::from_toml(BUILTIN_SYMBOLS)
    }

    pub fn from_toml(content: &str) -> Result<Self, LoadError> {
        toml::from_str(content).map_err(|e| LoadError(format!("invalid symbol table: {}", e)))
    }
}

/// Typesets LaTeX math as Typst math. Parsing is done by `mitex_parser`.
pub struct TexRenderer {
    spec: CommandSpec,
    table: SymbolTable,
    error_color: String,
}

impl TexRenderer {
    pub fn new(table: SymbolTable, error_color: impl Into<String>) -> Self {
        Self {
            spec: DEFAULT_SPEC.clone(),
            table,
            error_color: error_color.into(),
        }
    }

    /// Translate `source` into the body of a Typst equation.
    pub fn translate(&self, source: &str, options: &RenderOptions) -> Result<String, RenderError> {
        let root = mitex_parser::parse(source, self.spec.clone());
        let mut converter = Converter {
            table: &self.table,
            options,
            args: 0,
        };
        converter.sequence(&root)
    }
}

impl MathRenderer for TexRenderer {
    fn render(
        &self,
        source: &str,
        out: &mut String,
        options: &RenderOptions,
    ) -> Result<(), RenderError> {
        match self.translate(source, options) {
            Ok(body) if options.display_mode => {
                out.push_str("$ ");
                out.push_str(&body);
                out.push_str(" $");
            }
            Ok(body) => {
                out.push('$');
                out.push_str(&body);
                out.push('$');
            }
            Err(e) if options.throw_on_error => return Err(e),
            Err(e) => {
                tracing::debug!(%source, error = %e, "rendering math error inline");
                out.push_str("#text(fill: rgb(\"");
                out.push_str(&escape_string(&self.error_color));
                out.push_str("\"))[");
                push_escaped(out, source);
                out.push(']');
            }
        }
        Ok(())
    }
}

/// Walks a mitex syntax tree and writes Typst math atoms.
struct Converter<'t> {
    table: &'t SymbolTable,
    options: &'t RenderOptions,
    // Depth of function-call arguments; commas there must be quoted
    args: usize,
}

impl Converter<'_> {
    fn sequence(&mut self, node: &SyntaxNode) -> Result<String, RenderError> {
        let elems: Vec<SyntaxElement> = node.children_with_tokens().collect();
        self.elements(&elems)
    }

    fn elements(&mut self, elems: &[SyntaxElement]) -> Result<String, RenderError> {
        let mut atoms = Vec::new();
        let mut pos = 0;
        while pos < elems.len() {
            self.element(elems, &mut pos, &mut atoms)?;
        }
        Ok(atoms.join(" "))
    }

    /// Children of `node`, written into the caller's atoms so scripts attach across.
    fn inline(&mut self, node: &SyntaxNode, atoms: &mut Vec<String>) -> Result<(), RenderError> {
        let elems: Vec<SyntaxElement> = node.children_with_tokens().collect();
        let mut pos = 0;
        while pos < elems.len() {
            self.element(&elems, &mut pos, atoms)?;
        }
        Ok(())
    }

    fn element(
        &mut self,
        elems: &[SyntaxElement],
        pos: &mut usize,
        atoms: &mut Vec<String>,
    ) -> Result<(), RenderError> {
        use SyntaxKind::*;

        let elem = &elems[*pos];
        *pos += 1;

        match (elem.kind(), elem) {
            (
                TokenWhiteSpace | TokenLineBreak | TokenComment | ItemBlockComment
                | ClauseCommandName | TokenDollar | TokenBeginMath | TokenEndMath,
                _,
            ) => {}
            (
                ScopeRoot | ItemText | ItemParen | ClauseArgument | ItemFormula | ItemBracket
                | ItemLR,
                SyntaxElement::Node(n),
            ) => self.inline(n, atoms)?,
            (ClauseLR, SyntaxElement::Node(n)) => self.delimiter(n, atoms)?,
            (ItemCurly, SyntaxElement::Node(n)) => {
                let inner = self.group(n)?;
                atoms.push(if inner.is_empty() {
                    "\"\"".to_string()
                } else {
                    inner
                });
            }
            (ItemAttachComponent, SyntaxElement::Node(n)) => self.attachment(n, atoms)?,
            (ItemCmd, SyntaxElement::Node(n)) => self.command(n, elems, pos, atoms)?,
            (TokenWord, SyntaxElement::Token(t)) => self.word(t.text(), atoms)?,
            (TokenCommandSym, SyntaxElement::Token(t)) => {
                let name = t.text().strip_prefix('\\').unwrap_or(t.text());
                if let Some(atom) = self.symbol(name)? {
                    atoms.push(atom);
                }
            }
            (TokenUnderscore | TokenCaret, _) => {
                let marker = if elem.kind() == TokenCaret { '^' } else { '_' };
                let script = self.script(marker, elems, pos)?;
                attach(atoms, &script);
            }
            (TokenApostrophe, _) => attach(atoms, "'"),
            (TokenComma, _) => atoms.push(self.separator(',')),
            (TokenSemicolon, _) => atoms.push(self.separator(';')),
            (TokenLParen, _) => atoms.push("(".to_string()),
            (TokenRParen, _) => atoms.push(")".to_string()),
            (TokenLBracket, _) => atoms.push("[".to_string()),
            (TokenRBracket, _) => atoms.push("]".to_string()),
            (TokenSlash, _) => atoms.push("slash".to_string()),
            (TokenTilde, _) => atoms.push("space.nobreak".to_string()),
            (TokenAsterisk, _) => atoms.push("*".to_string()),
            (TokenAmpersand, _) => atoms.push("&".to_string()),
            (TokenHash, _) => atoms.push("\\#".to_string()),
            (TokenAtSign, _) => atoms.push("\\@".to_string()),
            (TokenDitto, _) => atoms.push("\\\"".to_string()),
            (ItemNewLine, _) => atoms.push("\\".to_string()),
            (TokenLBrace | TokenRBrace, _) => return Err(RenderError::UnbalancedBraces),
            (ItemEnv, _) => return Err(RenderError::UnknownCommand("begin".to_string())),
            _ => return Err(RenderError::Syntax(element_text(elem))),
        }
        Ok(())
    }

    /// Content of a `{...}` group without its braces.
    fn group(&mut self, node: &SyntaxNode) -> Result<String, RenderError> {
        let elems: Vec<SyntaxElement> = node.children_with_tokens().collect();
        let inner = match elems.as_slice() {
            [open, inner @ .., close]
                if open.kind() == SyntaxKind::TokenLBrace
                    && close.kind() == SyntaxKind::TokenRBrace =>
            {
                inner
            }
            _ => return Err(RenderError::UnbalancedBraces),
        };
        self.elements(inner)
    }

    /// `\left(` or `\right.`; `.` means no delimiter.
    fn delimiter(
        &mut self,
        node: &SyntaxNode,
        atoms: &mut Vec<String>,
    ) -> Result<(), RenderError> {
        for elem in node.children_with_tokens() {
            match &elem {
                SyntaxElement::Token(t) if matches!(t.text(), "\\left" | "\\right" | ".") => {}
                SyntaxElement::Token(t) if t.kind() == SyntaxKind::ClauseCommandName => {}
                _ => {
                    let mut pos = 0;
                    self.element(std::slice::from_ref(&elem), &mut pos, atoms)?;
                }
            }
        }
        Ok(())
    }

    fn attachment(
        &mut self,
        node: &SyntaxNode,
        atoms: &mut Vec<String>,
    ) -> Result<(), RenderError> {
        let elems: Vec<SyntaxElement> = node.children_with_tokens().collect();
        let mut pos = 0;
        while pos < elems.len() {
            let marker = match elems[pos].kind() {
                SyntaxKind::TokenUnderscore => '_',
                SyntaxKind::TokenCaret => '^',
                _ => {
                    self.element(&elems, &mut pos, atoms)?;
                    continue;
                }
            };
            pos += 1;
            let script = self.script(marker, &elems, &mut pos)?;
            attach(atoms, &script);
        }
        Ok(())
    }

    /// The argument after `_` or `^`, with its marker.
    fn script(
        &mut self,
        marker: char,
        elems: &[SyntaxElement],
        pos: &mut usize,
    ) -> Result<String, RenderError> {
        skip_space(elems, pos);
        if *pos >= elems.len() {
            return Err(RenderError::MissingArgument(marker.to_string()));
        }

        let arg = match &elems[*pos] {
            SyntaxElement::Node(n) if n.kind() == SyntaxKind::ItemCurly => {
                *pos += 1;
                self.group(n)?
            }
            _ => {
                let mut atoms = Vec::new();
                self.element(elems, pos, &mut atoms)?;
                atoms.join(" ")
            }
        };

        if arg.is_empty() {
            return Err(RenderError::MissingArgument(marker.to_string()));
        }
        let simple = arg.chars().all(|c| c.is_alphanumeric() || c == '.');
        Ok(if simple {
            format!("{}{}", marker, arg)
        } else {
            format!("{}({})", marker, arg)
        })
    }

    fn word(&self, word: &str, atoms: &mut Vec<String>) -> Result<(), RenderError> {
        let chars: Vec<char> = word.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            i += 1;
            if !c.is_ascii_digit() {
                atoms.push(self.character(c)?);
                continue;
            }

            let mut run = String::from(c);
            while let Some(&next) = chars.get(i) {
                let decimal = next == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit);
                if !next.is_ascii_digit() && !decimal {
                    break;
                }
                run.push(next);
                i += 1;
            }
            atoms.push(run);
        }
        Ok(())
    }

    fn character(&self, c: char) -> Result<String, RenderError> {
        if !c.is_ascii() {
            if self.options.strict {
                return Err(RenderError::NonAscii(c));
            }
            return Ok(c.to_string());
        }

        Ok(match c {
            ',' | ';' => self.separator(c),
            '/' => "slash".to_string(),
            '~' => "space.nobreak".to_string(),
            '#' | '$' | '"' | '\\' | '@' => format!("\\{}", c),
            _ => c.to_string(),
        })
    }

    fn separator(&self, c: char) -> String {
        if self.args > 0 {
            format!("\"{}\"", c)
        } else {
            c.to_string()
        }
    }

    /// Table lookups and control symbols such as `\,` or `\{`.
    fn symbol(&self, name: &str) -> Result<Option<String>, RenderError> {
        if let Some(symbol) = self.table.symbols.get(name) {
            return Ok(Some(symbol.clone()));
        }
        if let Some(space) = self.table.spacing.get(name) {
            return Ok((!space.is_empty()).then(|| space.clone()));
        }

        let mut chars = name.chars();
        let atom = match (chars.next(), chars.next()) {
            (Some('{'), None) => "brace.l".to_string(),
            (Some('}'), None) => "brace.r".to_string(),
            (Some('|'), None) => "bar.v.double".to_string(),
            (Some('%'), None) => "%".to_string(),
            (Some(c @ ('#' | '$' | '_' | '&' | '\\')), None) => format!("\\{}", c),
            _ => return Err(RenderError::UnknownCommand(name.to_string())),
        };
        Ok(Some(atom))
    }

    fn command(
        &mut self,
        node: &SyntaxNode,
        siblings: &[SyntaxElement],
        pos: &mut usize,
        atoms: &mut Vec<String>,
    ) -> Result<(), RenderError> {
        let name = CmdItem::cast(node.clone())
            .and_then(|cmd| cmd.name_tok())
            .map(|tok| {
                let text = tok.text();
                text.strip_prefix('\\').unwrap_or(text).to_string()
            })
            .ok_or_else(|| RenderError::Syntax(node.text().to_string()))?;
        let mut args = Arguments::new(node, siblings, pos);

        let atom = if let Some(accent) = self.table.accents.get(&name).cloned() {
            let body = self.math_argument(&name, &mut args)?;
            Some(format!("{}({})", accent, body))
        } else {
            match name.as_str() {
                "frac" | "dfrac" | "tfrac" => {
                    let num = self.math_argument(&name, &mut args)?;
                    let den = self.math_argument(&name, &mut args)?;
                    Some(format!("frac({}, {})", num, den))
                }
                "sqrt" => {
                    let index = match args.optional.take() {
                        Some(index) => self.bracket(&index)?,
                        None => String::new(),
                    };
                    let radicand = self.math_argument(&name, &mut args)?;
                    Some(if index.is_empty() {
                        format!("sqrt({})", radicand)
                    } else {
                        format!("root({}, {})", index, radicand)
                    })
                }
                "text" | "textrm" | "textit" | "textbf" | "textup" | "mbox" => {
                    let text = raw_argument(&name, &mut args)?;
                    Some(format!("\"{}\"", escape_string(&text)))
                }
                "operatorname" => {
                    let text = raw_argument(&name, &mut args)?;
                    if text.is_empty() {
                        return Err(RenderError::MissingArgument(name.clone()));
                    }
                    Some(format!("op(\"{}\")", escape_string(&text)))
                }
                "mathrm" => Some(format!("upright({})", self.math_argument(&name, &mut args)?)),
                "mathbf" => Some(format!("bold({})", self.math_argument(&name, &mut args)?)),
                "mathit" => Some(format!("italic({})", self.math_argument(&name, &mut args)?)),
                "mathcal" => Some(format!("cal({})", self.math_argument(&name, &mut args)?)),
                "mathbb" => Some(format!("bb({})", self.math_argument(&name, &mut args)?)),
                // Delimiters are emitted as-is
                "left" | "right" => None,
                "url" | "href" => Some(self.link(&name, &mut args)?),
                _ => self.symbol(&name)?,
            }
        };

        if let Some(atom) = atom {
            atoms.push(atom);
        }
        for child in node.children() {
            if child.kind() == SyntaxKind::ItemAttachComponent {
                self.attachment(&child, atoms)?;
            }
        }
        Ok(())
    }

    /// A required argument as math. Empty arguments are rejected.
    fn math_argument(
        &mut self,
        name: &str,
        args: &mut Arguments<'_>,
    ) -> Result<String, RenderError> {
        let missing = || RenderError::MissingArgument(name.to_string());
        let arg = args.next_required().ok_or_else(missing)?;

        self.args += 1;
        let body = self.argument_body(&arg);
        self.args -= 1;

        let body = body?;
        if body.trim().is_empty() {
            return Err(missing());
        }
        Ok(body)
    }

    fn argument_body(&mut self, arg: &SyntaxNode) -> Result<String, RenderError> {
        match arg.kind() {
            SyntaxKind::ItemCurly => self.group(arg),
            _ => {
                let mut curly = arg.children().filter(|c| c.kind() == SyntaxKind::ItemCurly);
                match (curly.next(), curly.next()) {
                    (Some(group), None) => self.group(&group),
                    _ => self.sequence(arg),
                }
            }
        }
    }

    /// `[...]` content of an optional argument.
    fn bracket(&mut self, arg: &SyntaxNode) -> Result<String, RenderError> {
        let bracket = arg
            .children()
            .find(|c| c.kind() == SyntaxKind::ItemBracket)
            .unwrap_or_else(|| arg.clone());
        let inner: Vec<SyntaxElement> = bracket
            .children_with_tokens()
            .filter(|e| !matches!(e.kind(), SyntaxKind::TokenLBracket | SyntaxKind::TokenRBracket))
            .collect();

        self.args += 1;
        let index = self.elements(&inner);
        self.args -= 1;
        index
    }

    fn link(&mut self, name: &str, args: &mut Arguments<'_>) -> Result<String, RenderError> {
        if !self.options.trust {
            return Err(RenderError::Untrusted(name.to_string()));
        }

        let url = raw_argument(name, args)?;
        if url.is_empty() {
            return Err(RenderError::MissingArgument(name.to_string()));
        }
        let mut atom = format!("#link(\"{}\")", escape_string(&url));
        if name == "href" {
            let label = raw_argument(name, args)?;
            atom.push('[');
            push_escaped(&mut atom, &label);
            atom.push(']');
        }
        Ok(atom)
    }
}

/// Arguments of one command: those the parser attached, then following groups.
struct Arguments<'e> {
    required: std::vec::IntoIter<SyntaxNode>,
    optional: Option<SyntaxNode>,
    siblings: &'e [SyntaxElement],
    pos: &'e mut usize,
}

impl<'e> Arguments<'e> {
    fn new(node: &SyntaxNode, siblings: &'e [SyntaxElement], pos: &'e mut usize) -> Self {
        let (optional, required): (Vec<_>, Vec<_>) = node
            .children()
            .filter(|c| c.kind() == SyntaxKind::ClauseArgument)
            .partition(|c| c.children().any(|g| g.kind() == SyntaxKind::ItemBracket));
        Self {
            required: required.into_iter(),
            optional: optional.into_iter().next(),
            siblings,
            pos,
        }
    }

    fn next_required(&mut self) -> Option<SyntaxNode> {
        if let Some(arg) = self.required.next() {
            return Some(arg);
        }

        // Commands unknown to the parser get their groups as siblings
        let mut at = *self.pos;
        skip_space(self.siblings, &mut at);
        match self.siblings.get(at) {
            Some(SyntaxElement::Node(n)) if n.kind() == SyntaxKind::ItemCurly => {
                *self.pos = at + 1;
                Some(n.clone())
            }
            _ => None,
        }
    }
}

/// Source text of an argument, for commands whose content is not math.
fn raw_argument(name: &str, args: &mut Arguments<'_>) -> Result<String, RenderError> {
    let arg = args
        .next_required()
        .ok_or_else(|| RenderError::MissingArgument(name.to_string()))?;
    let text = arg.text().to_string();
    let text = text.trim();
    let inner = match text.strip_prefix('{') {
        Some(rest) => rest.strip_suffix('}').ok_or(RenderError::UnbalancedBraces)?,
        None => text,
    };
    Ok(inner.to_string())
}

fn skip_space(elems: &[SyntaxElement], pos: &mut usize) {
    use SyntaxKind::{TokenLineBreak, TokenWhiteSpace};

    while elems
        .get(*pos)
        .is_some_and(|e| matches!(e.kind(), TokenWhiteSpace | TokenLineBreak))
    {
        *pos += 1;
    }
}

fn attach(atoms: &mut Vec<String>, suffix: &str) {
    match atoms.last_mut() {
        Some(last) => last.push_str(suffix),
        None => atoms.push(format!("\"\"{}", suffix)),
    }
}

fn element_text(elem: &SyntaxElement) -> String {
    match elem {
        SyntaxElement::Node(n) => n.text().to_string(),
        SyntaxElement::Token(t) => t.text().to_string(),
    }
}

/// Escape for the inside of a Typst string literal.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> TexRenderer {
        TexRenderer::new(SymbolTable::builtin().unwrap(), "#cc0000")
    }

    fn translate(source: &str) -> Result<String, RenderError> {
        renderer().translate(source, &RenderOptions::default())
    }

    #[test]
    fn builtin_table_loads() {
        let table = SymbolTable::builtin().unwrap();
        assert_eq!(table.symbols["rightarrow"], "arrow.r");
        assert_eq!(table.accents["dot"], "dot");
        assert_eq!(table.spacing[","], "thin");
    }

    #[test]
    fn letters_and_scripts() {
        assert_eq!(translate("p_4").unwrap(), "p_4");
        assert_eq!(translate("x_{6A}").unwrap(), "x_(6 A)");
        assert_eq!(translate("p_{s0A}").unwrap(), "p_(s 0 A)");
    }

    #[test]
    fn sum_over_index() {
        let body = translate(r"p = \sum_{i} x_i p_{s0i}(T)").unwrap();
        assert!(body.starts_with("p = sum_i x_i"), "{body}");
        assert!(body.contains("p_(s 0 i)"), "{body}");
    }

    #[test]
    fn fractions_quote_commas() {
        assert_eq!(translate(r"\frac{a}{b}").unwrap(), "frac(a, b)");
        assert!(
            translate(r"\frac{100}{0,2} = 500")
                .unwrap()
                .starts_with("frac(100, 0 \",\" 2)")
        );
    }

    #[test]
    fn accents_text_and_spacing() {
        let body = translate(r"\dot{n}_4 = 500 \, \text{kmol/h}").unwrap();
        assert!(body.starts_with("dot(n)_4 = 500"), "{body}");
        assert!(body.contains("thin"), "{body}");
        assert!(body.ends_with("\"kmol/h\""), "{body}");
    }

    #[test]
    fn roots() {
        assert_eq!(translate(r"\sqrt{2}").unwrap(), "sqrt(2)");
        assert_eq!(translate(r"\sqrt[3]{x}").unwrap(), "root(3, x)");
    }

    #[test]
    fn empty_required_arguments_are_errors() {
        for source in [r"\sqrt{}", r"\mathbf{}", r"\dot{}", r"\hat{}", r"\frac{}{b}", "x_{}"] {
            assert!(
                matches!(translate(source), Err(RenderError::MissingArgument(_))),
                "{source}: {:?}",
                translate(source)
            );
        }
    }

    #[test]
    fn left_right_are_dropped() {
        let body = translate(r"\left( a \right.").unwrap();
        assert!(body.starts_with("( a"), "{body}");
        assert!(!body.contains("left"), "{body}");
    }

    #[test]
    fn errors() {
        assert_eq!(
            translate(r"\foo"),
            Err(RenderError::UnknownCommand("foo".to_string()))
        );
        assert!(translate(r"\frac{a}").is_err());
        assert!(translate("{a").is_err());
        assert!(translate("a}").is_err());
    }

    #[test]
    fn strict_rejects_non_ascii() {
        let strict = RenderOptions {
            strict: true,
            ..RenderOptions::default()
        };
        assert_eq!(
            renderer().translate("ä", &strict),
            Err(RenderError::NonAscii('ä'))
        );
        assert_eq!(translate("ä").unwrap(), "ä");
    }

    #[test]
    fn links_need_trust() {
        let untrusted = RenderOptions {
            trust: false,
            ..RenderOptions::default()
        };
        assert_eq!(
            renderer().translate(r"\url{https://x.org}", &untrusted),
            Err(RenderError::Untrusted("url".to_string()))
        );
        assert_eq!(
            translate(r"\href{https://x.org}{x}").unwrap(),
            "#link(\"https://x.org\")[x]"
        );
    }

    #[test]
    fn inline_and_display_wrapping() {
        let mut out = String::new();
        renderer()
            .render("a", &mut out, &RenderOptions::default())
            .unwrap();
        renderer()
            .render("b", &mut out, &RenderOptions::default().display(true))
            .unwrap();
        assert_eq!(out, "$a$$ b $");
    }

    #[test]
    fn errors_render_inline_unless_thrown() {
        let mut out = String::new();
        renderer()
            .render(r"\foo_1", &mut out, &RenderOptions::default())
            .unwrap();
        assert_eq!(out, "#text(fill: rgb(\"#cc0000\"))[\\\\foo\\_1]");

        let throwing = RenderOptions {
            throw_on_error: true,
            ..RenderOptions::default()
        };
        let mut out = String::new();
        assert!(renderer().render(r"\sqrt{}", &mut out, &throwing).is_err());
        assert!(out.is_empty());
    }
}
