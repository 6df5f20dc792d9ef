//! Deterministic pretty-printer for translated code.
//!
//! [`format`] is idempotent: formatting already formatted code returns it
//! unchanged. The passes run in a fixed order:
//!
//! 1. normalize line endings to `\n`
//! 2. flatten the line breaks inside every `if ( ... )` condition
//! 3. put every `{` on its own line (and `} else {` on three lines)
//! 4. join a single assignment statement wrapped over several lines
//! 5. normalize spacing around binary operators
//! 6. collapse runs of blank lines to a single blank line

use super::delimiter::{match_delimiter, SegmentKind, Segments};
use super::lexer::{tokenize, Token, TokenKind};
use super::pattern::Tokens;

/// Operators that get exactly one space on each side.
const SPACED_OPERATORS: [&str; 18] = [
    "=", "==", "!=", "<=", ">=", "<", ">", "+=", "-=", "*=", "/=", "&&", "||", "+", "-", "*", "/",
    "%",
];

/// Operators that become unary after an opening bracket, comma or operator.
const UNARY_CAPABLE: [&str; 3] = ["-", "+", "*"];

const ASSIGNMENT_OPERATORS: [&str; 5] = ["=", "+=", "-=", "*=", "/="];

/// Keywords after which `-`, `+` and `*` are unary.
const PREFIX_KEYWORDS: [&str; 11] = [
    "return", "case", "double", "int", "float", "long", "short", "char", "unsigned", "void",
    "register",
];

/// Format a piece of code.
pub fn format(code: &str) -> String {
    let code = code.replace("\r\n", "\n").replace('\r', "\n");
    let code = flatten_conditions(&code);
    let code = place_braces(&code);
    let code = join_wrapped_assignments(&code);
    let code = space_operators(&code);
    collapse_blank_lines(&code).trim().to_string()
}

/// Replace the line breaks inside `if ( ... )` conditions by single spaces.
///
/// Conditions are processed from the last one backward so that flattening an
/// inner condition never shifts the offsets of one still to be processed.
fn flatten_conditions(code: &str) -> String {
    let tokens = Tokens::code(code);
    let opens: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(i, t)| t.is("if") && tokens.get(i + 1).is_some_and(|n| n.is("(")))
        .filter_map(|(i, _)| tokens.get(i + 1).map(|t| t.start))
        .collect();

    let mut result = code.to_string();
    for &open in opens.iter().rev() {
        let Ok(close) = match_delimiter(&result, open) else {
            continue;
        };
        let condition = &result[open..=close];
        if !condition.contains('\n') {
            continue;
        }
        // A line comment inside the condition would swallow the rest of it
        let commented = Segments::new(condition, 0)
            .any(|(kind, range)| kind == SegmentKind::Comment && condition[range].starts_with("//"));
        if commented {
            continue;
        }
        let flat = flatten_whitespace(condition);
        result.replace_range(open..=close, &flat);
    }
    result
}

fn flatten_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending = String::new();
    for ch in text.chars() {
        if ch.is_whitespace() {
            pending.push(ch);
            continue;
        }
        if !pending.is_empty() {
            if pending.contains('\n') {
                out.push(' ');
            } else {
                out.push_str(&pending);
            }
            pending.clear();
        }
        out.push(ch);
    }
    out
}

/// Mark every byte that belongs to plain code.
fn code_mask(code: &str) -> Vec<bool> {
    let mut mask = vec![false; code.len()];
    for (kind, range) in Segments::new(code, 0) {
        if kind == SegmentKind::Code {
            for flag in &mut mask[range] {
                *flag = true;
            }
        }
    }
    mask
}

/// Put every `{` on its own line and break `} else` apart.
fn place_braces(code: &str) -> String {
    let bytes = code.as_bytes();
    let mask = code_mask(code);
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len() + 64);
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if mask[i] && c == b'{' {
            while out.last().is_some_and(|b| b.is_ascii_whitespace()) {
                out.pop();
            }
            if !out.is_empty() {
                out.push(b'\n');
            }
            out.push(b'{');
            i += 1;
            while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
                i += 1;
            }
            if i < bytes.len() && bytes[i] != b'\n' {
                out.push(b'\n');
            }
            continue;
        }

        if mask[i] && c == b'}' {
            let line_start = out.iter().rposition(|&b| b == b'\n').map_or(0, |p| p + 1);
            if out[line_start..].iter().any(|b| !b.is_ascii_whitespace()) {
                while out.last().is_some_and(|&b| b == b' ' || b == b'\t') {
                    out.pop();
                }
                out.push(b'\n');
            }
            out.push(b'}');
            i += 1;

            // `} else` goes on two lines
            let mut k = i;
            while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if bytes[k..].starts_with(b"else")
                && !bytes
                    .get(k + 4)
                    .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
            {
                out.push(b'\n');
                i = k;
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Join `lhs = rhs` statements that were wrapped over several lines.
fn join_wrapped_assignments(code: &str) -> String {
    let lines: Vec<&str> = code.split('\n').collect();
    let clean = lines_free_of_literals(code, lines.len());
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        if clean[i] && starts_wrapped_assignment(line) {
            let mut parts = vec![line.trim_end().to_string()];
            let mut j = i + 1;
            let mut complete = false;
            while j < lines.len() && clean[j] {
                let next = lines[j].trim();
                if next.is_empty() || next.contains(['{', '}', '#']) || has_assignment(next) {
                    break;
                }
                parts.push(next.to_string());
                if next.ends_with(';') {
                    complete = true;
                    break;
                }
                j += 1;
            }
            if complete {
                out.push(parts.join(" "));
                i = j + 1;
                continue;
            }
        }
        out.push(line.to_string());
        i += 1;
    }

    out.join("\n")
}

/// For each line, whether it is free of comments and multi-line literals.
fn lines_free_of_literals(code: &str, line_count: usize) -> Vec<bool> {
    let mut clean = vec![true; line_count];
    let breaks: Vec<usize> = code.match_indices('\n').map(|(i, _)| i).collect();
    let line_of = |offset: usize| breaks.partition_point(|&b| b < offset);
    for (kind, range) in Segments::new(code, 0) {
        if kind == SegmentKind::Code {
            continue;
        }
        let first = line_of(range.start);
        let last = line_of(range.end.saturating_sub(1).max(range.start));
        let multi_line = first != last;
        if kind == SegmentKind::Comment || multi_line {
            for flag in clean.iter_mut().take(last + 1).skip(first) {
                *flag = false;
            }
        }
    }
    clean
}

fn starts_wrapped_assignment(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.ends_with(';') || trimmed.contains(['{', '}', '#']) {
        return false;
    }
    let tokens = tokenize(trimmed);
    match tokens.first() {
        Some(first) if first.kind == TokenKind::Identifier || first.is("*") => {
            !matches!(
                first.text.as_str(),
                "if" | "for" | "while" | "else" | "return" | "switch" | "case" | "do"
            ) && tokens.iter().any(|t| ASSIGNMENT_OPERATORS.contains(&t.text.as_str()))
        }
        _ => false,
    }
}

fn has_assignment(line: &str) -> bool {
    tokenize(line)
        .iter()
        .any(|t| ASSIGNMENT_OPERATORS.contains(&t.text.as_str()))
}

/// Classify each token as a binary (spaced) operator, a unary operator or neither.
fn operator_roles(tokens: &[Token]) -> Vec<(bool, bool)> {
    let mut roles = Vec::with_capacity(tokens.len());
    let mut prev: Option<&Token> = None;

    for tok in tokens {
        if tok.is_comment() {
            roles.push((false, false));
            continue;
        }
        let spaced = tok.kind == TokenKind::Punct && SPACED_OPERATORS.contains(&tok.text.as_str());
        let unary_position = match prev {
            None => true,
            Some(p) if p.kind == TokenKind::Punct => !matches!(p.text.as_str(), ")" | "]" | "++" | "--"),
            Some(p) => PREFIX_KEYWORDS.contains(&p.text.as_str()),
        };
        let unary = spaced && UNARY_CAPABLE.contains(&tok.text.as_str()) && unary_position;
        roles.push((spaced && !unary, unary));
        prev = Some(tok);
    }
    roles
}

/// Put exactly one space around binary operators.
fn space_operators(code: &str) -> String {
    let tokens = tokenize(code);
    let roles = operator_roles(&tokens);
    let mut out = String::with_capacity(code.len() + code.len() / 8);
    let mut prev_end = 0;

    for (k, tok) in tokens.iter().enumerate() {
        let gap = &code[prev_end..tok.start];
        if k == 0 {
            out.push_str(gap);
        } else if gap.contains('\n') {
            push_multiline_gap(&mut out, gap);
        } else if roles[k].0 || roles[k - 1].0 {
            out.push(' ');
        } else if roles[k - 1].1 {
            // Nothing between a unary operator and its operand
        } else {
            out.push_str(gap);
        }
        out.push_str(&tok.text);
        prev_end = tok.end;
    }

    push_multiline_gap(&mut out, &code[prev_end..]);
    out
}

fn push_multiline_gap(out: &mut String, gap: &str) {
    let pieces: Vec<&str> = gap.split('\n').collect();
    for (n, piece) in pieces.iter().enumerate() {
        if n + 1 < pieces.len() {
            out.push_str(piece.trim_end_matches([' ', '\t']));
            out.push('\n');
        } else {
            out.push_str(piece);
        }
    }
}

fn collapse_blank_lines(code: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut blank_run = 0;
    for line in code.split('\n') {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run == 1 {
                out.push("");
            }
        } else {
            blank_run = 0;
            out.push(line);
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_braces_on_own_lines() {
        let formatted = format("if (a) { x = 1; } else { x = 2; }");
        assert_eq!(formatted, "if (a)\n{\nx = 1;\n}\nelse\n{\nx = 2;\n}");
    }

    #[test]
    fn test_operator_spacing_and_unary_minus() {
        assert_eq!(format("x=a+b*-c;"), "x = a + b * -c;");
        assert_eq!(format("y = f(-a, -b)-1;"), "y = f(-a, -b) - 1;");
        assert_eq!(format("z=-1e-3;"), "z = -1e-3;");
        assert_eq!(format("p->q=*(r);"), "p->q = *(r);");
        assert_eq!(format("s = \"a=b\";"), "s = \"a=b\";");
    }

    #[test]
    fn test_wrapped_assignment_is_joined() {
        let code = "vte = model->DIOn\n    * vt\n    + 2;\nnext = 1;";
        assert_eq!(format(code), "vte = model->DIOn * vt + 2;\nnext = 1;");
    }

    #[test]
    fn test_condition_is_flattened() {
        let code = "if (a &&\n    (b ||\n     c))\n    x = 1;";
        assert_eq!(format(code), "if (a && (b || c))\n    x = 1;");
    }

    #[test]
    fn test_blank_lines_collapse() {
        let code = "a = 1;\n\n\n\n\nb = 2;\r\n\r\nc = 3;";
        assert_eq!(format(code), "a = 1;\n\nb = 2;\n\nc = 3;");
    }

    #[test]
    fn test_comment_lines_are_not_joined() {
        let code = "/* x =\n y */\nz = 1;";
        assert_eq!(format(code), code);
    }

    #[test]
    fn test_format_is_idempotent() {
        let samples = [
            "if (a) { x = 1; } else { x = 2; }",
            "for (i = 0; i<n; i++) {\n  s+=v[i]*-w[i];\n}\n\n\n\nreturn(OK);",
            "vte = model->DIOn\n    * vt;\nif (x\n  > 1) y = -(x - 1); // done\n",
            "double a, *b;\nswitch (k) {\ncase 1: a = b[0]; break;\n}",
            "while (1) { /* { */ s = \"}\"; }",
            "if (!(ckt->CKTmode & MODEINITJCT)) {\n\tvd = *(ckt->CKTstate0 + here->DIOvoltage);\n}",
        ];
        for sample in samples {
            let once = format(sample);
            assert_eq!(format(&once), once, "not idempotent for {:?}", sample);
        }
    }
}
