//! Lexer (tokenizer) for the C dialect used by SPICE3 device models.
//!
//! The lexer never fails: anything it does not recognize becomes a
//! one-character [`TokenKind::Punct`], and unterminated strings or comments
//! simply run to the end of the input. Whitespace is not tokenized; the byte
//! spans of the tokens let callers recover it.

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's text
    pub text: String,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Line number (1-indexed)
    pub line: usize,
}

impl Token {
    /// Check if this token is the given identifier or punctuator.
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }

    pub fn is_ident(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    pub fn is_comment(&self) -> bool {
        self.kind == TokenKind::Comment
    }
}

/// Token types of the C dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// An identifier or keyword
    Identifier,
    /// A numeric literal (integer, floating point, hexadecimal)
    Number,
    /// A string literal including its quotes
    Str,
    /// A character literal including its quotes
    Char,
    /// A line or block comment
    Comment,
    /// An operator or punctuation character sequence
    Punct,
}

/// Multi-character punctuators, longest first.
const PUNCTUATORS: [&str; 23] = [
    "<<=", ">>=", "...", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "##",
];

/// Lexer for tokenizing C source text.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
        }
    }

    /// Get the next token, or `None` at the end of the input.
    pub fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace();

        let bytes = self.input.as_bytes();
        if self.pos >= bytes.len() {
            return None;
        }

        let start = self.pos;
        let line = self.line;
        let ch = bytes[start];
        let next = bytes.get(start + 1).copied();

        let kind = match ch {
            b'/' if next == Some(b'/') => {
                self.read_line_comment();
                TokenKind::Comment
            }
            b'/' if next == Some(b'*') => {
                self.read_block_comment();
                TokenKind::Comment
            }
            b'"' => {
                self.read_quoted(b'"');
                TokenKind::Str
            }
            b'\'' => {
                self.read_quoted(b'\'');
                TokenKind::Char
            }
            b'0'..=b'9' => {
                self.read_number();
                TokenKind::Number
            }
            b'.' if next.is_some_and(|c| c.is_ascii_digit()) => {
                self.read_number();
                TokenKind::Number
            }
            _ if ch.is_ascii_alphabetic() || ch == b'_' => {
                self.read_identifier();
                TokenKind::Identifier
            }
            _ => {
                self.read_punct();
                TokenKind::Punct
            }
        };

        Some(Token {
            kind,
            text: self.input[start..self.pos].to_string(),
            start,
            end: self.pos,
            line,
        })
    }

    fn advance(&mut self) {
        if let Some(ch) = self.input[self.pos..].chars().next() {
            if ch == '\n' {
                self.line += 1;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == b'\n' || ch == b'\r' {
                break;
            }
            self.advance();
        }
    }

    fn read_block_comment(&mut self) {
        // Skip the opening "/*"
        self.advance();
        self.advance();
        while let Some(ch) = self.peek() {
            if ch == b'*' && self.input.as_bytes().get(self.pos + 1) == Some(&b'/') {
                self.advance();
                self.advance();
                return;
            }
            self.advance();
        }
    }

    fn read_quoted(&mut self, quote: u8) {
        self.advance();
        while let Some(ch) = self.peek() {
            if ch == b'\\' {
                self.advance();
                self.advance();
                continue;
            }
            self.advance();
            if ch == quote {
                return;
            }
        }
    }

    fn read_identifier(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == b'_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) {
        let bytes = self.input.as_bytes();
        let hex = bytes[self.pos] == b'0' && matches!(bytes.get(self.pos + 1), Some(b'x' | b'X'));
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == b'.' || ch == b'_' {
                let exponent = !hex && (ch == b'e' || ch == b'E');
                self.advance();
                if exponent && matches!(self.peek(), Some(b'+' | b'-')) {
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_punct(&mut self) {
        let rest = &self.input[self.pos..];
        if let Some(p) = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
            for _ in 0..p.len() {
                self.advance();
            }
        } else {
            self.advance();
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

/// Tokenize a whole text, comments included.
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).collect()
}

/// Tokenize a whole text, dropping comments.
pub fn tokenize_code(input: &str) -> Vec<Token> {
    Lexer::new(input).filter(|t| !t.is_comment()).collect()
}

/// Check if a word is a C identifier.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Parse a C numeric literal, ignoring the `f`, `l` and `u` suffixes.
pub fn parse_c_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        let digits = hex.trim_end_matches(['u', 'U', 'l', 'L']);
        return i64::from_str_radix(digits, 16).ok().map(|v| v as f64);
    }

    let mut num_str = text;
    while let Some(last) = num_str.chars().last() {
        if matches!(last, 'f' | 'F' | 'l' | 'L' | 'u' | 'U') {
            num_str = &num_str[..num_str.len() - 1];
        } else {
            break;
        }
    }

    num_str.parse::<f64>().ok()
}
