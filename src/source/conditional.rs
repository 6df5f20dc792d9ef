//! Conditional-compilation resolution.
//!
//! Only `#ifdef`/`#ifndef` blocks are resolved. `#define` and `#include`
//! lines are removed without expanding anything, and `#if` blocks are kept
//! as they are.

use indexmap::IndexSet;
use tracing::trace;

use crate::scan::delimiter::{SegmentKind, Segments};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectiveKind {
    IfDef,
    IfNDef,
    If,
    Elif,
    Else,
    EndIf,
    Define,
    Include,
    Other,
}

/// A preprocessor directive found in code.
#[derive(Debug, Clone)]
struct Directive {
    kind: DirectiveKind,
    /// Offset of the `#`
    start: usize,
    /// Offset one past the directive header
    end: usize,
    /// Symbol tested by `#ifdef`/`#ifndef`
    symbol: String,
}

/// Remove `#define` and `#include` lines and resolve every `#ifdef`/`#ifndef`
/// block against `defined`, repeating until nothing changes.
pub fn resolve_conditionals(code: &str, defined: &IndexSet<String>) -> String {
    let mut code = elide_definitions(code);

    while let Some(resolved) = resolve_innermost(&code, defined) {
        code = resolved;
    }
    code
}

/// Remove `#define` (with `\` continuations) and `#include` lines.
fn elide_definitions(code: &str) -> String {
    let directives = scan_directives(code);
    let mut result = code.to_string();

    for directive in directives.iter().rev() {
        match directive.kind {
            DirectiveKind::Define | DirectiveKind::Include => {
                let mut end = directive.end;
                // Swallow the line break of an include line as well
                if directive.kind == DirectiveKind::Include {
                    let rest = &code.as_bytes()[end..];
                    end += rest.iter().take_while(|b| **b == b'\r' || **b == b'\n').count();
                }
                result.replace_range(directive.start..end, "");
            }
            _ => {}
        }
    }
    result
}

/// Resolve the first `#ifdef`/`#ifndef` block to close, if any.
fn resolve_innermost(code: &str, defined: &IndexSet<String>) -> Option<String> {
    // Stack entries: (opener, else directive, has elif)
    let mut stack: Vec<(Directive, Option<Directive>, bool)> = Vec::new();

    for directive in scan_directives(code) {
        match directive.kind {
            DirectiveKind::IfDef | DirectiveKind::IfNDef | DirectiveKind::If => {
                stack.push((directive, None, false));
            }
            DirectiveKind::Elif => {
                if let Some(top) = stack.last_mut() {
                    top.2 = true;
                }
            }
            DirectiveKind::Else => {
                if let Some(top) = stack.last_mut() {
                    top.1 = Some(directive);
                }
            }
            DirectiveKind::EndIf => {
                let Some((opener, otherwise, has_elif)) = stack.pop() else {
                    continue;
                };
                if opener.kind == DirectiveKind::If || has_elif {
                    continue;
                }

                let is_defined = defined.contains(&opener.symbol);
                let take_first = match opener.kind {
                    DirectiveKind::IfDef => is_defined,
                    _ => !is_defined,
                };
                let branch = match (&otherwise, take_first) {
                    (Some(other), true) => &code[opener.end..other.start],
                    (None, true) => &code[opener.end..directive.start],
                    (Some(other), false) => &code[other.end..directive.start],
                    (None, false) => "",
                };
                trace!(
                    symbol = opener.symbol.as_str(),
                    taken = take_first,
                    "resolved conditional block"
                );

                let mut result = String::with_capacity(code.len());
                result.push_str(&code[..opener.start]);
                result.push_str(branch);
                result.push_str(&code[directive.end..]);
                return Some(result);
            }
            _ => {}
        }
    }
    None
}

/// Find the preprocessor directives outside literals and comments.
fn scan_directives(code: &str) -> Vec<Directive> {
    let bytes = code.as_bytes();
    let mut directives = Vec::new();

    for (kind, range) in Segments::new(code, 0) {
        if kind != SegmentKind::Code {
            continue;
        }
        let mut i = range.start;
        while i < range.end {
            if bytes[i] != b'#' || bytes.get(i + 1) == Some(&b'#') {
                i += 1;
                continue;
            }
            let directive = read_directive(code, i);
            i = directive.end.max(i + 1);
            directives.push(directive);
        }
    }
    directives
}

fn read_directive(code: &str, start: usize) -> Directive {
    let bytes = code.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    let word_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
        i += 1;
    }

    let kind = match &code[word_start..i] {
        "ifdef" => DirectiveKind::IfDef,
        "ifndef" => DirectiveKind::IfNDef,
        "if" => DirectiveKind::If,
        "elif" => DirectiveKind::Elif,
        "else" => DirectiveKind::Else,
        "endif" => DirectiveKind::EndIf,
        "define" => DirectiveKind::Define,
        "include" => DirectiveKind::Include,
        _ => DirectiveKind::Other,
    };

    let mut symbol = String::new();
    let end = match kind {
        DirectiveKind::IfDef | DirectiveKind::IfNDef => {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            let symbol_start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            symbol = code[symbol_start..i].to_string();
            i
        }
        DirectiveKind::Else | DirectiveKind::EndIf => i,
        DirectiveKind::Define => line_end(code, i, true),
        _ => line_end(code, i, false),
    };

    Directive {
        kind,
        start,
        end,
        symbol,
    }
}

/// End of the line starting at `from`, following `\` continuations if asked.
fn line_end(code: &str, from: usize, continued: bool) -> usize {
    let bytes = code.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'\n' || bytes[i] == b'\r' {
            let mut k = i;
            while k > from && (bytes[k - 1] == b' ' || bytes[k - 1] == b'\t') {
                k -= 1;
            }
            if continued && k > from && bytes[k - 1] == b'\\' {
                // Skip the line break and keep going
                i += if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                continue;
            }
            return i;
        }
        i += 1;
    }
    bytes.len()
}
