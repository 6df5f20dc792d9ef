//! Switch/case and method-signature extraction.

use indexmap::IndexMap;
use tracing::trace;

use super::delimiter::{extract_block, match_delimiter};
use super::pattern::Tokens;
use crate::error::{Result, TranslateError};

/// Extract the cases of the first `switch` statement at or after `start_at`.
///
/// Each `case <id>:` body runs up to the next sibling `case` label, or else up
/// to the trailing `default:` label, or else to the end of the block. Nested
/// `switch` statements are skipped whole, so their labels never show up.
///
/// Fallthrough labels (`case A: case B: stmt;`) each keep their own span: `A`
/// maps to an empty body and only `B` holds the shared statements.
pub fn extract_switch_cases(text: &str, start_at: usize) -> Result<IndexMap<String, String>> {
    let tokens = Tokens::code(text);
    let open = find_switch_block(text, &tokens, tokens.index_at(start_at))
        .ok_or(TranslateError::MissingSwitch { offset: start_at })?;
    let block = extract_block(text, open)?;

    let inner = Tokens::code(block);
    let mut labels: Vec<(String, usize, usize)> = Vec::new();
    let mut default_at: Option<usize> = None;
    let mut i = 0;

    while let Some(tok) = inner.get(i) {
        if tok.is("switch") {
            if let Some(nested) = switch_block_at(block, &inner, i) {
                let close = match_delimiter(block, nested)?;
                i = inner.index_at(close + 1);
                continue;
            }
        } else if tok.is("case") {
            // The label runs up to the first ':'
            let colon = (i + 1..inner.len()).find(|&k| inner.get(k).is_some_and(|t| t.is(":")));
            if let Some(colon) = colon {
                let id = inner.slice(i + 1, colon).split_whitespace().collect::<String>();
                let body_start = inner.get(colon).map(|t| t.end).unwrap_or(block.len());
                labels.push((id, tok.start, body_start));
                i = colon + 1;
                continue;
            }
        } else if tok.is("default") && inner.get(i + 1).is_some_and(|t| t.is(":")) {
            default_at = Some(tok.start);
        }
        i += 1;
    }

    let mut cases = IndexMap::new();
    for (k, (id, _, body_start)) in labels.iter().enumerate() {
        let end = match labels.get(k + 1) {
            Some((_, next_start, _)) => *next_start,
            None => default_at
                .filter(|&d| d >= *body_start)
                .unwrap_or(block.len()),
        };
        let body = block[*body_start..end].trim().to_string();
        trace!(id = id.as_str(), "extracted case body");
        cases.entry(id.clone()).or_insert(body);
    }

    Ok(cases)
}

/// Find the `{` of a `switch ( ... ) {` header starting at token `from` or later.
fn find_switch_block(text: &str, tokens: &Tokens<'_>, from: usize) -> Option<usize> {
    (from..tokens.len()).find_map(|i| switch_block_at(text, tokens, i))
}

/// The `{` of a `switch ( ... ) {` header starting exactly at token `index`.
fn switch_block_at(text: &str, tokens: &Tokens<'_>, index: usize) -> Option<usize> {
    if !tokens.get(index)?.is("switch") {
        return None;
    }
    let paren = tokens.get(index + 1).filter(|t| t.is("("))?;
    let close = match_delimiter(text, paren.start).ok()?;
    let brace = tokens.get(tokens.index_at(close + 1)).filter(|t| t.is("{"))?;
    Some(brace.start)
}

/// Get the parameter names of a call or definition of `method`.
///
/// Matches the first `name ( p1 , p2 , ... )` where every parameter is an
/// identifier list; typed declarations (`IFvalue *value`) contribute their
/// last identifier. When `method` is `None` any name matches. An empty list
/// is a valid result.
pub fn extract_method_parameters(text: &str, method: Option<&str>) -> Vec<String> {
    let tokens = Tokens::code(text);

    for (i, tok) in tokens.iter().enumerate() {
        if !tok.is_ident() || method.is_some_and(|m| !tok.is(m)) {
            continue;
        }
        let Some(paren) = tokens.get(i + 1).filter(|t| t.is("(")) else {
            continue;
        };
        let Ok(close) = match_delimiter(text, paren.start) else {
            continue;
        };
        if let Some(params) = parse_parameter_list(&tokens, i + 2, tokens.index_at(close)) {
            return params;
        }
    }

    Vec::new()
}

fn parse_parameter_list(tokens: &Tokens<'_>, first: usize, last: usize) -> Option<Vec<String>> {
    let mut params = Vec::new();
    let mut current: Option<String> = None;
    let mut seen_any = false;

    for k in first..last {
        let tok = tokens.get(k)?;
        if tok.is(",") {
            params.push(current.take()?);
            seen_any = false;
        } else if tok.is_ident() {
            current = Some(tok.text.clone());
            seen_any = true;
        } else if matches!(tok.text.as_str(), "*" | "&" | "[" | "]") {
            continue;
        } else {
            return None;
        }
    }

    if let Some(last_param) = current {
        params.push(last_param);
    } else if seen_any || !params.is_empty() {
        return None;
    }

    // `f(void)` declares no parameters
    if params.len() == 1 && params[0] == "void" {
        params.clear();
    }
    Some(params)
}
