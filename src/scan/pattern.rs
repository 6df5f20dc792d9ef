//! Token-window patterns.
//!
//! The idioms the translator recognizes are short, fixed token sequences
//! (`* ( ckt -> CKTstate0 + x )`, `here -> F = value -> rValue ;`, ...).
//! A [`Pattern`] describes such a sequence with a tiny language of
//! whitespace-separated elements:
//!
//! | Element  | Matches                                                    |
//! |----------|------------------------------------------------------------|
//! | `$name`  | one identifier; a repeated name must match the same text   |
//! | `#name`  | one numeric literal                                        |
//! | `@name`  | one identifier or numeric literal (back-referenced too)    |
//! | `...name`| a non-empty, bracket-balanced run up to the next literal   |
//! | other    | a token with exactly this text                             |
//!
//! Matching is greedy-free and never backtracks: a run stops at the first
//! top-level occurrence of the literal that follows it, and it never crosses
//! a top-level `;` unless that is its terminator.

use super::lexer::{tokenize_code, Token, TokenKind};

/// A text together with its comment-free tokens.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    source: &'a str,
    tokens: Vec<Token>,
}

impl<'a> Tokens<'a> {
    /// Tokenize `source`, dropping comments.
    pub fn code(source: &'a str) -> Self {
        Self {
            source,
            tokens: tokenize_code(source),
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// Index of the first token starting at or after a byte offset.
    pub fn index_at(&self, offset: usize) -> usize {
        self.tokens.partition_point(|t| t.start < offset)
    }

    /// Source text covered by tokens `first..last`.
    pub fn slice(&self, first: usize, last: usize) -> &'a str {
        if first >= last || first >= self.tokens.len() {
            return "";
        }
        &self.source[self.tokens[first].start..self.tokens[last - 1].end]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Element {
    Literal(String),
    Ident(String),
    Number(String),
    Atom(String),
    Run(String),
}

impl Element {
    fn parse(word: &str) -> Self {
        if let Some(name) = word.strip_prefix("...").filter(|n| !n.is_empty()) {
            Element::Run(name.to_string())
        } else if let Some(name) = word.strip_prefix('$').filter(|n| !n.is_empty()) {
            Element::Ident(name.to_string())
        } else if let Some(name) = word.strip_prefix('#').filter(|n| !n.is_empty()) {
            Element::Number(name.to_string())
        } else if let Some(name) = word.strip_prefix('@').filter(|n| !n.is_empty()) {
            Element::Atom(name.to_string())
        } else {
            Element::Literal(word.to_string())
        }
    }
}

/// A captured piece of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Source text of the capture
    pub text: String,
    /// Byte offset of the capture start
    pub start: usize,
    /// Byte offset one past the capture end
    pub end: usize,
}

/// A successful pattern match.
#[derive(Debug, Clone)]
pub struct Match {
    /// Index of the first matched token
    pub first: usize,
    /// Index one past the last matched token
    pub last: usize,
    /// Byte offset of the match start
    pub start: usize,
    /// Byte offset one past the match end
    pub end: usize,
    captures: Vec<(String, Capture)>,
}

impl Match {
    /// Text of a named capture, or an empty string if the name is unknown.
    pub fn get(&self, name: &str) -> &str {
        self.capture(name).map(|c| c.text.as_str()).unwrap_or("")
    }

    pub fn capture(&self, name: &str) -> Option<&Capture> {
        self.captures
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    fn bind(&mut self, name: &str, capture: Capture) -> bool {
        match self.capture(name) {
            Some(existing) => squash(&existing.text) == squash(&capture.text),
            None => {
                self.captures.push((name.to_string(), capture));
                true
            }
        }
    }
}

/// A compiled token-window pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    elements: Vec<Element>,
}

impl Pattern {
    /// Compile a pattern from its whitespace-separated elements.
    pub fn new(source: &str) -> Self {
        Self {
            elements: source.split_whitespace().map(Element::parse).collect(),
        }
    }

    /// Try to match the pattern starting exactly at token `start`.
    pub fn match_at(&self, tokens: &Tokens<'_>, start: usize) -> Option<Match> {
        if start >= tokens.len() || self.elements.is_empty() {
            return None;
        }

        let mut m = Match {
            first: start,
            last: start,
            start: tokens.tokens[start].start,
            end: tokens.tokens[start].start,
            captures: Vec::new(),
        };
        let mut i = start;

        for (k, element) in self.elements.iter().enumerate() {
            match element {
                Element::Literal(text) => {
                    if !tokens.get(i)?.is(text) {
                        return None;
                    }
                    i += 1;
                }
                Element::Ident(name) | Element::Number(name) | Element::Atom(name) => {
                    let tok = tokens.get(i)?;
                    let accepted = match element {
                        Element::Ident(_) => tok.kind == TokenKind::Identifier,
                        Element::Number(_) => tok.kind == TokenKind::Number,
                        _ => matches!(tok.kind, TokenKind::Identifier | TokenKind::Number),
                    };
                    if !accepted || !m.bind(name, capture_of(tokens, i, i + 1)) {
                        return None;
                    }
                    i += 1;
                }
                Element::Run(name) => {
                    let stop = match self.elements.get(k + 1) {
                        Some(Element::Literal(text)) => Some(text.as_str()),
                        _ => None,
                    };
                    let end = scan_run(tokens, i, stop)?;
                    if !m.bind(name, capture_of(tokens, i, end)) {
                        return None;
                    }
                    i = end;
                }
            }
        }

        m.last = i;
        m.end = tokens.tokens[i - 1].end;
        Some(m)
    }

    /// Find the first match starting at or after token `from`.
    pub fn find(&self, tokens: &Tokens<'_>, from: usize) -> Option<Match> {
        (from..tokens.len()).find_map(|i| self.match_at(tokens, i))
    }

    /// Find all non-overlapping matches, left to right.
    pub fn find_all(&self, tokens: &Tokens<'_>) -> Vec<Match> {
        let mut matches = Vec::new();
        let mut from = 0;
        while let Some(m) = self.find(tokens, from) {
            from = m.last.max(m.first + 1);
            matches.push(m);
        }
        matches
    }

    /// Match the pattern against the whole token sequence.
    pub fn matches_exactly(&self, tokens: &Tokens<'_>) -> Option<Match> {
        self.match_at(tokens, 0).filter(|m| m.last == tokens.len())
    }

    /// Check if the pattern occurs anywhere in `text`.
    pub fn is_found_in(&self, text: &str) -> bool {
        self.find(&Tokens::code(text), 0).is_some()
    }
}

/// Replace every match of `pattern` in `source`.
///
/// The callback returns the replacement text, or `None` to leave the match
/// alone (scanning then resumes one token later).
pub fn replace_all(
    source: &str,
    pattern: &Pattern,
    mut replacement: impl FnMut(&Match, &Tokens<'_>) -> Option<String>,
) -> String {
    let tokens = Tokens::code(source);
    let mut result = String::with_capacity(source.len());
    let mut copied = 0;
    let mut from = 0;

    while let Some(m) = pattern.find(&tokens, from) {
        match replacement(&m, &tokens) {
            Some(text) => {
                result.push_str(&source[copied..m.start]);
                result.push_str(&text);
                copied = m.end;
                from = m.last.max(m.first + 1);
            }
            None => from = m.first + 1,
        }
    }

    result.push_str(&source[copied..]);
    result
}

/// Replace every whole-word occurrence of an identifier.
///
/// Occurrences reached through `->` or `.` are left alone when
/// `skip_members` is set.
pub fn replace_identifier(source: &str, name: &str, with: &str, skip_members: bool) -> String {
    let pattern = Pattern::new(name);
    replace_all(source, &pattern, |m, tokens| {
        if skip_members && is_member_access(tokens, m.first) {
            return None;
        }
        Some(with.to_string())
    })
}

/// Check if the token at `index` is reached through `->` or `.`.
pub fn is_member_access(tokens: &Tokens<'_>, index: usize) -> bool {
    index > 0
        && tokens
            .get(index - 1)
            .is_some_and(|t| t.is("->") || t.is("."))
}

/// Collapse all whitespace runs into single spaces.
pub fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn capture_of(tokens: &Tokens<'_>, first: usize, last: usize) -> Capture {
    let start = tokens.tokens[first].start;
    let end = tokens.tokens[last - 1].end;
    Capture {
        text: tokens.source[start..end].to_string(),
        start,
        end,
    }
}

/// Scan a balanced, non-empty run; returns the index one past its end.
fn scan_run(tokens: &Tokens<'_>, start: usize, stop: Option<&str>) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;

    while let Some(tok) = tokens.get(i) {
        if depth == 0 {
            if let Some(stop) = stop {
                if tok.is(stop) && i > start {
                    return Some(i);
                }
            }
            if tok.is(";") {
                return None;
            }
        }
        match tok.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => {
                if depth == 0 {
                    // An unmatched closer ends an open-ended run
                    return if stop.is_none() && i > start { Some(i) } else { None };
                }
                depth -= 1;
            }
            _ => {}
        }
        i += 1;
    }

    if stop.is_none() && i > start && depth == 0 {
        Some(i)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_and_back_references() {
        let tokens = Tokens::code("for (; model != NULL; model = model->DIOnextModel) {");
        let pattern = Pattern::new("for ( ; $var != NULL ; $var = $var -> $next ) {");
        let m = pattern.match_at(&tokens, 0).unwrap();
        assert_eq!(m.get("var"), "model");
        assert_eq!(m.get("next"), "DIOnextModel");

        let mismatch = Tokens::code("for (; a != NULL; b = b->next) {");
        assert!(pattern.match_at(&mismatch, 0).is_none());
    }

    #[test]
    fn test_run_is_balanced_and_stops_at_literal() {
        let tokens = Tokens::code("x = f(a, b) * (c + d); y = 2;");
        let m = Pattern::new("$lhs = ...rhs ;").find(&tokens, 0).unwrap();
        assert_eq!(m.get("lhs"), "x");
        assert_eq!(m.get("rhs"), "f(a, b) * (c + d)");

        let all = Pattern::new("$lhs = ...rhs ;").find_all(&tokens);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].get("rhs"), "2");
    }

    #[test]
    fn test_run_does_not_cross_statements() {
        let tokens = Tokens::code("a; b = c;");
        let m = Pattern::new("...x = $y ;").find(&tokens, 0).unwrap();
        assert_eq!(m.get("x"), "b");
    }

    #[test]
    fn test_matches_exactly() {
        let tokens = Tokens::code("break ;");
        assert!(Pattern::new("break ;").matches_exactly(&tokens).is_some());
        let tokens = Tokens::code("break ; x");
        assert!(Pattern::new("break ;").matches_exactly(&tokens).is_none());
    }

    #[test]
    fn test_replace_all_and_identifiers() {
        let code = "a = exp(x) + y->exp;";
        let replaced = replace_all(code, &Pattern::new("exp ("), |_, _| {
            Some("Math.Exp(".to_string())
        });
        assert_eq!(replaced, "a = Math.Exp(x) + y->exp;");

        let renamed = replace_identifier("vt = vt + m->vt;", "vt", "Model.vt", true);
        assert_eq!(renamed, "Model.vt = Model.vt + m->vt;");
    }

    #[test]
    fn test_number_capture() {
        let tokens = Tokens::code("*states += 5;");
        let m = Pattern::new("* $s += #count ;").match_at(&tokens, 0).unwrap();
        assert_eq!(m.get("count"), "5");
        assert_eq!(m.start, 0);
        assert_eq!(m.end, tokens.source().len());
    }
}
