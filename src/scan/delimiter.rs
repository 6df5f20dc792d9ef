//! Delimiter balancing and comment handling.
//!
//! Every structural extraction in the translator goes through
//! [`match_delimiter`]. The scanner walks the raw bytes in one of four modes
//! (normal code, string literal, line comment, block comment); brackets only
//! count in normal mode, so a `}` inside `"}"` or `/* } */` is ignored.

use std::ops::Range;

use crate::error::{Result, TranslateError};

/// Scanner mode while walking C source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Plain code
    Normal,
    /// Inside a string or character literal opened by the given quote
    Quoted(u8),
    /// Inside a `//` comment, ends at CR or LF
    LineComment,
    /// Inside a `/* */` comment
    BlockComment,
}

/// Kind of a contiguous run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Code,
    Quoted,
    Comment,
}

/// Iterator splitting a text into code, literal and comment segments.
pub struct Segments<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Segments<'a> {
    /// Segment `text` starting at byte offset `start` (assumed to be in code).
    pub fn new(text: &'a str, start: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: start,
        }
    }

    fn scan_until_mode_change(&mut self) -> (SegmentKind, usize) {
        let bytes = self.bytes;
        let start = self.pos;
        let mut mode = ScanMode::Normal;
        let mut i = start;

        // Determine the mode of the segment from its first bytes
        match bytes[i] {
            b'"' | b'\'' => {
                mode = ScanMode::Quoted(bytes[i]);
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                mode = ScanMode::LineComment;
                i += 2;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                mode = ScanMode::BlockComment;
                i += 2;
            }
            _ => {}
        }

        while i < bytes.len() {
            let c = bytes[i];
            match mode {
                ScanMode::Normal => {
                    let comment = c == b'/' && matches!(bytes.get(i + 1), Some(b'/' | b'*'));
                    if c == b'"' || c == b'\'' || comment {
                        return (SegmentKind::Code, i);
                    }
                    i += 1;
                }
                ScanMode::Quoted(quote) => {
                    if c == b'\\' {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    if c == quote {
                        return (SegmentKind::Quoted, i);
                    }
                }
                ScanMode::LineComment => {
                    if c == b'\r' || c == b'\n' {
                        return (SegmentKind::Comment, i);
                    }
                    i += 1;
                }
                ScanMode::BlockComment => {
                    if c == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        return (SegmentKind::Comment, i + 2);
                    }
                    i += 1;
                }
            }
        }

        let kind = match mode {
            ScanMode::Normal => SegmentKind::Code,
            ScanMode::Quoted(_) => SegmentKind::Quoted,
            ScanMode::LineComment | ScanMode::BlockComment => SegmentKind::Comment,
        };
        (kind, bytes.len())
    }
}

impl Iterator for Segments<'_> {
    type Item = (SegmentKind, Range<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.bytes.len() {
            return None;
        }
        let start = self.pos;
        let (kind, end) = self.scan_until_mode_change();
        let end = end.min(self.bytes.len()).max(start + 1);
        self.pos = end;
        Some((kind, start..end))
    }
}

/// Strip `//` and `/* */` comments, leaving strings untouched.
pub fn remove_comments(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for (kind, range) in Segments::new(text, 0) {
        if kind != SegmentKind::Comment {
            result.push_str(&text[range]);
        }
    }
    result
}

/// Find the index of the bracket closing the one at `open`.
///
/// The opening character must be `(`, `[` or `{`. Brackets inside string
/// literals and comments are ignored.
pub fn match_delimiter(text: &str, open: usize) -> Result<usize> {
    let bytes = text.as_bytes();
    let opening = *bytes.get(open).ok_or(TranslateError::NotADelimiter {
        found: '\0',
        offset: open,
    })?;
    let closing = match opening {
        b'(' => b')',
        b'[' => b']',
        b'{' => b'}',
        other => {
            return Err(TranslateError::NotADelimiter {
                found: other as char,
                offset: open,
            })
        }
    };

    let mut level = 1usize;
    for (kind, range) in Segments::new(text, open + 1) {
        if kind != SegmentKind::Code {
            continue;
        }
        for i in range {
            if bytes[i] == opening {
                level += 1;
            } else if bytes[i] == closing {
                level -= 1;
                if level == 0 {
                    return Ok(i);
                }
            }
        }
    }

    Err(TranslateError::unbalanced(opening as char, open))
}

/// Get the text strictly between the bracket at `open` and its match.
pub fn extract_block(text: &str, open: usize) -> Result<&str> {
    let close = match_delimiter(text, open)?;
    Ok(&text[open + 1..close])
}

/// Find the first occurrence of a byte in code (outside literals and comments).
pub fn find_in_code(text: &str, from: usize, needle: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    Segments::new(text, from)
        .filter(|(kind, _)| *kind == SegmentKind::Code)
        .flat_map(|(_, range)| range)
        .find(|&i| bytes[i] == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_delimiter_ignores_strings() {
        let text = r#"{ x = "}"; }"#;
        let close = match_delimiter(text, 0).unwrap();
        assert_eq!(close, text.len() - 1);
        assert_eq!(extract_block(text, 0).unwrap(), r#" x = "}"; "#);
    }

    #[test]
    fn test_match_delimiter_ignores_comments() {
        let text = "( a /* ) */ + b // )\n )";
        let close = match_delimiter(text, 0).unwrap();
        assert_eq!(close, text.len() - 1);
    }

    #[test]
    fn test_match_delimiter_nested_and_escaped() {
        let text = r#"[a[1] + s["\"]"]]"#;
        let close = match_delimiter(text, 0).unwrap();
        assert_eq!(close, text.len() - 1);
        assert_eq!(match_delimiter(text, 2).unwrap(), 4);
    }

    #[test]
    fn test_extract_block_is_inverse_of_match() {
        let text = "f(a, (b), \"(\") + g";
        let open = 1;
        let close = match_delimiter(text, open).unwrap();
        assert_eq!(extract_block(text, open).unwrap(), &text[open + 1..close]);
    }

    #[test]
    fn test_unbalanced_delimiter() {
        let err = match_delimiter("{ a; { b; }", 0).unwrap_err();
        assert!(matches!(
            err,
            TranslateError::UnbalancedDelimiter { open: '{', .. }
        ));
        assert!(matches!(
            match_delimiter("abc", 1),
            Err(TranslateError::NotADelimiter { found: 'b', .. })
        ));
    }

    #[test]
    fn test_remove_comments() {
        let text = "a = 1; // one\nb = \"/* keep */\"; /* drop\n me */c = 2;";
        assert_eq!(remove_comments(text), "a = 1; \nb = \"/* keep */\"; c = 2;");
    }

    #[test]
    fn test_find_in_code() {
        let text = "/* { */ \"{\" x {";
        assert_eq!(find_in_code(text, 0, b'{'), Some(text.len() - 1));
    }
}
