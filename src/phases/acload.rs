//! The AC load entry point.
//!
//! SPICE stamps the real and imaginary parts of a complex matrix element in
//! separate statements (`*(ptr) += g; *(ptr + 1) += x;`). After the matrix
//! rewrite they are merged back into one complex increment per element.

use indexmap::IndexMap;
use tracing::{info, trace};

use super::{
    arrows_to_dots, matrix_accesses, mode_flags, state_accesses, temperature_idioms,
    MatrixPosition, Setup,
};
use crate::diagnostics::Diagnostics;
use crate::error::{Result, TranslateError};
use crate::iterate::DeviceIteration;
use crate::params::ParameterAccessors;
use crate::scan::format::format;
use crate::scan::pattern::{replace_all, Pattern, Tokens};
use crate::source::{DeviceSource, EntryPointKind};

/// Complex state of the simulator in the generated methods.
pub const COMPLEX_STATE: &str = "cstate";

#[derive(Debug, Clone)]
pub struct AcLoad {
    pub iteration: DeviceIteration,
    matrix: IndexMap<String, MatrixPosition>,
    states: String,
}

impl AcLoad {
    pub fn read(source: &DeviceSource, setup: &Setup, diagnostics: &mut Diagnostics) -> Result<Self> {
        let kind = EntryPointKind::AcLoad;
        let name = source
            .entry_point_name(kind)
            .ok_or_else(|| TranslateError::UndefinedEntryPoint {
                kind: kind.to_string(),
            })?;
        info!(entry_point = name, "translating AC load");
        Self::from_method(&source.get_entry_point(kind)?, name, setup, diagnostics)
    }

    pub fn from_method(
        method: &str,
        name: &str,
        setup: &Setup,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        Ok(Self {
            iteration: DeviceIteration::read(method, name, diagnostics)?,
            matrix: setup.matrix.clone(),
            states: setup.states_variable.clone().unwrap_or_default(),
        })
    }

    pub fn export_model(&mut self, model: &ParameterAccessors) -> String {
        let code = self.iteration.export_model_code(model);
        let code = self.apply_circuit(&code);
        format(&arrows_to_dots(&code))
    }

    pub fn export_device(&mut self, model: &ParameterAccessors, device: &ParameterAccessors) -> String {
        let code = self.iteration.export_device_code(model, device);
        let code = self.apply_circuit(&code);
        let code = matrix_accesses(
            &code,
            &self.matrix,
            COMPLEX_STATE,
            true,
            &mut self.iteration.device_extra,
        );
        let code = format(&arrows_to_dots(&code));
        format(&merge_complex_assignments(&code, COMPLEX_STATE, false))
    }

    fn apply_circuit(&self, code: &str) -> String {
        let circuit = self.iteration.circuit();
        let code = state_accesses(code, circuit, "state", &self.states);
        let code = replace_all(&code, &Pattern::new(&format!("{} -> CKTomega", circuit)), |_, _| {
            Some(format!("{}.Laplace.Imaginary", COMPLEX_STATE))
        });
        let code = temperature_idioms(&code, circuit);
        mode_flags(&code, circuit)
    }
}

/// One `target.Matrix[r, c](.Imag)? op= value;` statement.
#[derive(Debug, Clone)]
struct CellAssignment {
    start: usize,
    end: usize,
    block: usize,
    row: String,
    column: String,
    imaginary: bool,
    op: String,
    value: String,
}

/// Find the unconditional matrix increments of `code` with their block.
fn cell_assignments(code: &str, target: &str) -> Vec<CellAssignment> {
    let tokens = Tokens::code(code);
    let cell = Pattern::new(&format!("{} . Matrix [ ...row , ...column ]", target));
    let mut blocks = vec![0usize];
    let mut next_block = 1;
    let mut found = Vec::new();
    let mut i = 0;

    while let Some(tok) = tokens.get(i) {
        if tok.is("{") {
            blocks.push(next_block);
            next_block += 1;
        } else if tok.is("}") {
            if blocks.len() > 1 {
                blocks.pop();
            }
        } else if i == 0
            || tokens
                .get(i - 1)
                .is_some_and(|t| t.is(";") || t.is("{") || t.is("}"))
        {
            if let Some((assignment, next)) = cell_assignment(&tokens, &cell, i) {
                found.push(CellAssignment {
                    block: blocks.last().copied().unwrap_or(0),
                    ..assignment
                });
                i = next;
                continue;
            }
        }
        i += 1;
    }
    found
}

fn cell_assignment(
    tokens: &Tokens<'_>,
    cell: &Pattern,
    first: usize,
) -> Option<(CellAssignment, usize)> {
    let m = cell.match_at(tokens, first)?;
    let mut j = m.last;
    let imaginary = tokens.get(j).is_some_and(|t| t.is("."))
        && tokens.get(j + 1).is_some_and(|t| t.is("Imag"));
    if imaginary {
        j += 2;
    }
    let op = tokens.get(j).filter(|t| t.is("+=") || t.is("-="))?;

    let mut depth = 0usize;
    let mut k = j + 1;
    loop {
        let t = tokens.get(k)?;
        match t.text.as_str() {
            "(" | "[" => depth += 1,
            ")" | "]" => depth = depth.checked_sub(1)?,
            "{" | "}" => return None,
            ";" if depth == 0 => break,
            _ => {}
        }
        k += 1;
    }
    if k == j + 1 {
        return None;
    }

    let assignment = CellAssignment {
        start: m.start,
        end: tokens.get(k)?.end,
        block: 0,
        row: m.get("row").to_string(),
        column: m.get("column").to_string(),
        imaginary,
        op: op.text.clone(),
        value: tokens.slice(j + 1, k).to_string(),
    };
    Some((assignment, k + 1))
}

/// Sum the values of a part, relative to the increment operator `op`.
fn combine(parts: &[&CellAssignment], op: &str) -> String {
    let mut sum = String::new();
    for part in parts {
        if part.op == op {
            if !sum.is_empty() {
                sum.push_str(" + ");
            }
            sum.push_str(&part.value);
        } else {
            sum.push_str(if sum.is_empty() { "-" } else { " - " });
            if part.value.contains(|c: char| c == '+' || c == '-') {
                sum.push_str(&format!("({})", part.value));
            } else {
                sum.push_str(&part.value);
            }
        }
    }
    sum
}

/// Merge the real and imaginary increments of every matrix element within a
/// block into one statement at the position of the first one.
///
/// With `laplace` set, `r + x * s.Real` / `x * s.Imag` pairs collapse into a
/// multiplication with the Laplace variable.
pub fn merge_complex_assignments(code: &str, target: &str, laplace: bool) -> String {
    let assignments = cell_assignments(code, target);
    let mut groups: IndexMap<(usize, &str, &str), Vec<&CellAssignment>> = IndexMap::new();
    for a in &assignments {
        groups
            .entry((a.block, a.row.as_str(), a.column.as_str()))
            .or_default()
            .push(a);
    }

    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    for ((_, row, column), members) in &groups {
        let real: Vec<&CellAssignment> = members.iter().copied().filter(|a| !a.imaginary).collect();
        let imag: Vec<&CellAssignment> = members.iter().copied().filter(|a| a.imaginary).collect();
        let Some(op) = real.first().or(imag.first()).map(|a| a.op.as_str()) else {
            continue;
        };
        let real_part = combine(&real, op);
        let imag_part = combine(&imag, op);

        let value = if imag_part.is_empty() {
            real_part
        } else if let Some(product) = laplace
            .then(|| laplace_product(&real_part, &imag_part, target))
            .flatten()
        {
            product
        } else {
            let real_part = if real_part.is_empty() { "0.0".to_string() } else { real_part };
            format!("new Complex({}, {})", real_part, imag_part)
        };
        trace!(row, column, value = value.as_str(), "merged matrix element");

        let statement = format!("{}.Matrix[{}, {}] {} {};", target, row, column, op, value);
        for (n, member) in members.iter().enumerate() {
            let text = if n == 0 { statement.clone() } else { String::new() };
            edits.push((member.start, member.end, text));
        }
    }

    edits.sort_by_key(|(start, _, _)| *start);
    let mut result = String::with_capacity(code.len());
    let mut copied = 0;
    for (start, end, text) in edits {
        result.push_str(&code[copied..start]);
        result.push_str(&text);
        copied = end;
    }
    result.push_str(&code[copied..]);
    result
}

/// `r + x * L.Real` and `x * L.Imaginary` as `r + x * L`.
fn laplace_product(real: &str, imag: &str, target: &str) -> Option<String> {
    let laplace = format!("{}.Laplace", target);
    let imag_tokens = Tokens::code(imag);
    let m = Pattern::new(&format!("...factor * {} . Laplace . Imaginary", target))
        .matches_exactly(&imag_tokens)?;
    let factor = m.get("factor");

    let tail_source = format!("{} * {}.Real", factor, laplace);
    let tail = Tokens::code(&tail_source);
    let tail: Vec<&str> = tail.iter().map(|t| t.text.as_str()).collect();
    let real_tokens = Tokens::code(real);
    let texts: Vec<&str> = real_tokens.iter().map(|t| t.text.as_str()).collect();

    if texts == tail {
        return Some(format!("{} * {}", factor, laplace));
    }
    let n = texts.len();
    if n > tail.len() + 1 && texts.ends_with(&tail) && texts[n - tail.len() - 1] == "+" {
        let rest = real_tokens.slice(0, n - tail.len() - 1);
        return Some(format!("{} + {} * {}", rest, factor, laplace));
    }
    None
}
