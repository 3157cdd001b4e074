//! Recursive-descent parser for provisioning documents
//!
//! The grammar is line-oriented: headings open sections (`#` at the top
//! level, `##` nested), `>` lines carry attributes, indented lines form
//! script blocks, anything else is free text. Syntax errors carry the source
//! name and 1-based line number.

mod ast;
mod lexer;

pub use ast::{AstChild, AstNode, Attribute, ScriptNode, SectionKind};

use std::path::Path;

use crate::error::{PurserError, PurserResult};
use lexer::{Token, TokenKind};

/// Parse the document at `path`.
pub fn parse_file(path: &Path) -> PurserResult<AstNode> {
    let input = std::fs::read_to_string(path)?;
    parse_str(&path.display().to_string(), &input)
}

/// Parse document text, reporting errors against `name`.
pub fn parse_str(name: &str, input: &str) -> PurserResult<AstNode> {
    Parser {
        name,
        tokens: lexer::lex(input),
        pos: 0,
    }
    .parse()
}

struct Parser<'a> {
    name: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn next(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn backup(&mut self, n: usize) {
        self.pos -= n;
    }

    fn error(&self, token: &Token, message: impl Into<String>) -> PurserError {
        PurserError::syntax(self.name, token.line, message)
    }

    fn unexpected(&self, token: &Token, expected: TokenKind) -> PurserError {
        self.error(
            token,
            format!(
                "unexpected token read: {} (expected {})",
                token.kind.name(),
                expected.name()
            ),
        )
    }

    fn parse(mut self) -> PurserResult<AstNode> {
        self.parse_section(true)
    }

    fn parse_section(&mut self, top_level: bool) -> PurserResult<AstNode> {
        let mut node: Option<AstNode> = None;
        loop {
            let token = self.peek().clone();
            let current = match node.as_mut() {
                Some(current) => current,
                None => {
                    // nothing but blank lines may precede the heading
                    match token.kind {
                        TokenKind::Blank => {
                            self.next();
                            continue;
                        }
                        TokenKind::Hash => {
                            let expected = if top_level { 1 } else { 2 };
                            let (depth, section) = self.parse_title()?;
                            if depth != expected {
                                return Err(self.error(
                                    &token,
                                    format!("invalid section depth {depth} (expected {expected})"),
                                ));
                            }
                            node = Some(section);
                            continue;
                        }
                        TokenKind::Eof => {
                            return Err(self.error(&token, "empty document"));
                        }
                        _ => return Err(self.unexpected(&token, TokenKind::Hash)),
                    }
                }
            };

            match token.kind {
                TokenKind::Text => {
                    let text = self.parse_text();
                    current.children.push(AstChild::Text(text));
                }
                TokenKind::Indent => {
                    let script = self.parse_script()?;
                    current.children.push(script);
                }
                TokenKind::Arrow => {
                    let attrs = self.parse_attributes()?;
                    current.children.push(attrs);
                }
                TokenKind::Hash if !top_level => break,
                TokenKind::Hash => {
                    let child = self.parse_section(false)?;
                    current.children.push(AstChild::Section(child));
                }
                TokenKind::Blank => {
                    self.next();
                }
                TokenKind::Eof => break,
            }
        }
        match node {
            Some(node) => Ok(node),
            // only reachable at the top level: nested sections always
            // start from a heading their caller has already seen
            None => {
                let eof = self.tokens[self.tokens.len() - 1].clone();
                Err(self.error(&eof, "empty document"))
            }
        }
    }

    fn parse_title(&mut self) -> PurserResult<(usize, AstNode)> {
        let hash = self.next();
        let depth = hash.value.len();

        let token = self.peek().clone();
        if token.kind != TokenKind::Text {
            return Err(self.unexpected(&token, TokenKind::Text));
        }
        let raw = self.next().value.trim().to_string();

        let parsed = split_title(&raw).ok_or_else(|| {
            self.error(
                &token,
                format!("expected title format \"<Type>: <Name of Section> [<Id>]\", got: {raw:?}"),
            )
        })?;
        let (kind, name, id) = parsed;

        let kind = SectionKind::parse(kind)
            .ok_or_else(|| self.error(&token, format!("unexpected section type: {kind}")))?;

        Ok((
            depth,
            AstNode {
                kind,
                name: name.to_string(),
                id: id.to_string(),
                children: Vec::new(),
            },
        ))
    }

    fn parse_attributes(&mut self) -> PurserResult<AstChild> {
        let mut attrs = Vec::new();
        loop {
            let token = self.peek().clone();
            if token.kind != TokenKind::Arrow {
                return Ok(AstChild::Attributes(attrs));
            }
            self.next();

            let value = self.peek().clone();
            if value.kind != TokenKind::Text {
                return Err(self.unexpected(&value, TokenKind::Arrow));
            }
            let raw = self.next().value;

            let (key, val) = raw.split_once(':').ok_or_else(|| {
                self.error(
                    &value,
                    format!("attribute must have format \"key: value\", got: {raw:?}"),
                )
            })?;
            attrs.push(Attribute {
                key: key.trim().to_string(),
                value: val.trim().to_string(),
            });
        }
    }

    fn parse_text(&mut self) -> String {
        let mut lines = Vec::new();
        while self.peek().kind == TokenKind::Text {
            lines.push(self.next().value.trim().to_string());
        }
        lines.join("\n") + "\n"
    }

    fn parse_script(&mut self) -> PurserResult<AstChild> {
        let mut indent: Option<String> = None;
        let mut lines: Vec<String> = Vec::new();
        loop {
            let token = self.peek().clone();
            if token.kind != TokenKind::Indent {
                break;
            }
            let ind = self.next();
            let block_indent = indent.get_or_insert_with(|| ind.value.clone());
            let prefix = ind
                .value
                .strip_prefix(block_indent.as_str())
                .unwrap_or(&ind.value)
                .to_string();

            let text = self.next();
            if text.kind != TokenKind::Text {
                return Err(self.unexpected(&text, TokenKind::Indent));
            }

            let value = text.value.trim();
            if value.is_empty() || !value.starts_with(':') {
                lines.push(format!("{prefix}{value}"));
                continue;
            }
            if lines.is_empty() {
                return Ok(AstChild::Script(ScriptNode::Directive(value.to_string())));
            }

            self.backup(2);
            break;
        }
        Ok(AstChild::Script(ScriptNode::Shell(lines.join("\n"))))
    }
}

/// Split a heading payload into `(type, name, id)`; the id is the trailing
/// bracketed word.
fn split_title(raw: &str) -> Option<(&str, &str, &str)> {
    let (kind, rest) = raw.split_once(':')?;
    let rest = rest.trim();
    if !rest.ends_with(']') {
        return None;
    }
    let open = rest.rfind('[')?;
    let name = rest[..open].trim();
    let id = &rest[open + 1..rest.len() - 1];

    let word = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !word(kind) || !word(id) {
        return None;
    }
    Some((kind, name, id))
}
