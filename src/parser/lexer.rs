//! Line lexer for provisioning documents
//!
//! Produces one or two tokens per physical line; the parser consumes the
//! resulting vector with single-token lookahead.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// One or more leading `#` characters (a heading opener)
    Hash,
    /// A leading `>` (an attribute line)
    Arrow,
    /// Leading whitespace (a script line)
    Indent,
    /// The remainder of a line
    Text,
    /// A completely empty line
    Blank,
    /// End of input
    Eof,
}

impl TokenKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            TokenKind::Hash => "heading",
            TokenKind::Arrow => "attribute",
            TokenKind::Indent => "script",
            TokenKind::Text => "text",
            TokenKind::Blank => "blank line",
            TokenKind::Eof => "end of file",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub value: String,
    /// 1-based source line
    pub line: usize,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>, line: usize) -> Self {
        Token {
            kind,
            value: value.into(),
            line,
        }
    }
}

/// Tokenize `input`. Never fails; all validation happens in the parser.
pub(crate) fn lex(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut line_no = 0;

    for line in input.lines() {
        line_no += 1;

        if line.is_empty() {
            tokens.push(Token::new(TokenKind::Blank, "", line_no));
        } else if line.starts_with('#') {
            let depth = line.chars().take_while(|&c| c == '#').count();
            tokens.push(Token::new(TokenKind::Hash, &line[..depth], line_no));
            tokens.push(Token::new(TokenKind::Text, &line[depth..], line_no));
        } else if line.starts_with('>') {
            tokens.push(Token::new(TokenKind::Arrow, ">", line_no));
            tokens.push(Token::new(TokenKind::Text, &line[1..], line_no));
        } else if line.starts_with(' ') || line.starts_with('\t') {
            let indent = line
                .chars()
                .take_while(|&c| c == ' ' || c == '\t')
                .count();
            tokens.push(Token::new(TokenKind::Indent, &line[..indent], line_no));
            tokens.push(Token::new(TokenKind::Text, &line[indent..], line_no));
        } else {
            tokens.push(Token::new(TokenKind::Text, line, line_no));
        }
    }

    tokens.push(Token::new(TokenKind::Eof, "", line_no + 1));
    tokens
}
