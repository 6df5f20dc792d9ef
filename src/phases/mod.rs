//! Translators for the individual entry points.
//!
//! Every phase reads one iterating entry point through
//! [`DeviceIteration`](crate::iterate::DeviceIteration), resolves the
//! parameter references and then rewrites the SPICE idioms that belong to
//! that phase. The helpers in this module are shared between phases.

pub mod acload;
pub mod definitions;
pub mod load;
pub mod pzload;
pub mod setup;
pub mod temperature;
pub mod truncate;

pub use acload::AcLoad;
pub use definitions::StateDefinitions;
pub use load::Load;
pub use pzload::PzLoad;
pub use setup::Setup;
pub use temperature::Temperature;
pub use truncate::Truncate;

use indexmap::{IndexMap, IndexSet};

use crate::scan::lexer::TokenKind;
use crate::scan::pattern::{replace_all, Pattern, Tokens};

/// Row and column of a matrix element, by node field names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatrixPosition {
    pub row: String,
    pub column: String,
}

/// `ckt->CKTtemp` and `ckt->CKTnomTemp`.
pub fn temperature_idioms(code: &str, circuit: &str) -> String {
    let code = replace_all(code, &Pattern::new(&format!("{} -> CKTtemp", circuit)), |_, _| {
        Some("ckt.State.Temperature".to_string())
    });
    replace_all(&code, &Pattern::new(&format!("{} -> CKTnomTemp", circuit)), |_, _| {
        Some("ckt.State.NominalTemperature".to_string())
    })
}

/// Turn every `->` into `.`, dropping the whitespace around it.
pub fn arrows_to_dots(code: &str) -> String {
    let tokens = Tokens::code(code);
    let mut result = String::with_capacity(code.len());
    let mut copied = 0;

    for (i, tok) in tokens.iter().enumerate() {
        if !tok.is("->") {
            continue;
        }
        let before = match i {
            0 => tok.start,
            _ => tokens.get(i - 1).map_or(tok.start, |t| t.end.max(copied)),
        };
        let after = tokens.get(i + 1).map_or(tok.end, |t| t.start);
        result.push_str(&code[copied..before]);
        result.push('.');
        copied = after;
    }
    result.push_str(&code[copied..]);
    result
}

/// `*(ckt->CKTstateN + x)` becomes `<state>.States[N][<states> + x]`.
pub fn state_accesses(code: &str, circuit: &str, state: &str, states: &str) -> String {
    let pattern = Pattern::new(&format!("* ( {} -> $slot + ...offset )", circuit));
    replace_all(code, &pattern, |m, _| {
        let slot = m.get("slot").strip_prefix("CKTstate")?;
        if slot.is_empty() || !slot.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(format!(
            "{}.States[{}][{} + {}]",
            state,
            slot,
            states,
            m.get("offset")
        ))
    })
}

/// Old solution and right-hand side vector dereferences.
pub fn solution_accesses(code: &str, circuit: &str, rstate: &str) -> String {
    let code = replace_all(
        code,
        &Pattern::new(&format!("* ( {} -> CKTrhsOld + ...node )", circuit)),
        |m, _| Some(format!("{}.OldSolution[{}]", rstate, m.get("node"))),
    );
    replace_all(
        &code,
        &Pattern::new(&format!("* ( {} -> CKTrhs + ...node )", circuit)),
        |m, _| Some(format!("{}.Rhs[{}]", rstate, m.get("node"))),
    )
}

/// Matrix element dereferences `*(ptr)` and, with `imaginary`, `*(ptr + 1)`.
///
/// Each consumed pointer is removed from `extra`.
pub fn matrix_accesses(
    code: &str,
    matrix: &IndexMap<String, MatrixPosition>,
    target: &str,
    imaginary: bool,
    extra: &mut IndexSet<String>,
) -> String {
    let mut code = code.to_string();
    for (pointer, position) in matrix {
        let cell = format!("{}.Matrix[{}, {}]", target, position.row, position.column);
        if imaginary {
            code = replace_all(&code, &Pattern::new(&format!("* ( {} + 1 )", pointer)), |_, _| {
                Some(format!("{}.Imag", cell))
            });
        }
        code = replace_all(&code, &Pattern::new(&format!("* ( {} )", pointer)), |_, _| {
            Some(cell.clone())
        });
        code = replace_all(&code, &Pattern::new(&format!("* {}", pointer)), |m, tokens| {
            let unary = m.first == 0
                || tokens
                    .get(m.first - 1)
                    .is_some_and(|t| t.is(";") || t.is("{") || t.is("}") || t.is("("));
            unary.then(|| cell.clone())
        });
        extra.shift_remove(pointer);
    }
    code
}

/// Condition for a single analysis mode flag.
fn mode_condition(flag: &str) -> Option<&'static str> {
    let condition = match flag {
        "MODETRAN" => "method != null",
        "MODETRANOP" => "state.Domain == CircuitState.DomainTypes.Time && state.UseDC",
        "MODEINITTRAN" => "method != null && method.SavedTime == 0.0",
        "MODEDCOP" => "state.UseDC",
        "MODEINITSMSIG" => "state.UseSmallSignal",
        "MODEDCTRANCURVE" => "state.Domain == CircuitState.DomainTypes.None",
        "MODEUIC" => "state.UseIC",
        "MODEAC" => "true",
        "MODEINITJCT" => "state.Init == CircuitState.InitFlags.InitJct",
        "MODEINITFLOAT" => "state.Init == CircuitState.InitFlags.InitFloat",
        "MODEINITFIX" => "state.Init == CircuitState.InitFlags.InitFix",
        "TIMEDOMAIN" => "state.Domain == CircuitState.DomainTypes.Time",
        _ => return None,
    };
    Some(condition)
}

/// Simplify an OR-ed set of mode flags.
fn simplify_mode_flags(flags: &[&str]) -> IndexSet<&'static str> {
    let mut set: IndexSet<&'static str> = IndexSet::new();
    for flag in flags {
        match *flag {
            "MODEDC" => {
                set.extend(["MODEDCOP", "MODETRANOP", "MODEDCTRANCURVE"]);
            }
            "INITF" => {
                set.extend([
                    "MODEINITFLOAT",
                    "MODEINITJCT",
                    "MODEINITFIX",
                    "MODEINITSMSIG",
                    "MODEINITTRAN",
                ]);
            }
            "MODEAC" | "MODEINITPRED" => {}
            other => {
                if let Some(known) = KNOWN_FLAGS.iter().find(|k| **k == other) {
                    set.insert(*known);
                } else {
                    set.insert("?");
                }
            }
        }
    }

    if set.contains("MODETRAN") && set.contains("MODETRANOP") {
        set.shift_remove("MODETRAN");
        set.shift_remove("MODETRANOP");
        set.insert("TIMEDOMAIN");
    }
    if set.contains("MODEINITTRAN") {
        set.shift_remove("MODETRAN");
    }
    if set.contains("MODEUIC") {
        set.shift_remove("MODETRANOP");
        set.shift_remove("MODETRAN");
    }
    set
}

const KNOWN_FLAGS: [&str; 10] = [
    "MODETRAN",
    "MODETRANOP",
    "MODEINITTRAN",
    "MODEDCOP",
    "MODEINITSMSIG",
    "MODEDCTRANCURVE",
    "MODEUIC",
    "MODEINITJCT",
    "MODEINITFLOAT",
    "MODEINITFIX",
];

/// Translate `(ckt->CKTmode & FLAG)` and `(ckt->CKTmode & (A | B))` tests.
///
/// Unknown flags leave the test untouched.
pub fn mode_flags(code: &str, circuit: &str) -> String {
    let single = Pattern::new(&format!("( {} -> CKTmode & $flag )", circuit));
    let code = replace_all(code, &single, |m, _| {
        mode_condition(m.get("flag")).map(|c| format!("({})", c))
    });

    let group = Pattern::new(&format!("( {} -> CKTmode & ( ...flags ) )", circuit));
    replace_all(&code, &group, |m, _| {
        let tokens = Tokens::code(m.get("flags"));
        let mut flags = Vec::new();
        for (i, tok) in tokens.iter().enumerate() {
            match (i % 2, tok.kind) {
                (0, TokenKind::Identifier) => flags.push(tok.text.as_str()),
                (1, _) if tok.is("|") => {}
                _ => return None,
            }
        }

        let simplified = simplify_mode_flags(&flags);
        let conditions = simplified
            .iter()
            .map(|flag| mode_condition(flag))
            .collect::<Option<Vec<_>>>()?;
        let joined = match conditions.as_slice() {
            [] => "false".to_string(),
            [only] => only.to_string(),
            many => many
                .iter()
                .map(|c| if c.contains("&&") { format!("({})", c) } else { c.to_string() })
                .collect::<Vec<_>>()
                .join(" || "),
        };
        Some(format!("({})", joined))
    })
}

/// Name of a typed pointer argument of an entry point (`SPcomplex * s`).
pub fn typed_argument(method: &str, ty: &str) -> Option<String> {
    let tokens = Tokens::code(method);
    Pattern::new(&format!("{} * $name", ty))
        .find(&tokens, 0)
        .map(|m| m.get("name").to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::params::{Declaration, DeclarationKind, ParameterAccessors};
    use crate::source::ParamType;

    /// Accessors where every field is flagged and has a `<field>Given` flag.
    pub(crate) fn flagged_accessors(fields: &[&str]) -> ParameterAccessors {
        let mut accessors = ParameterAccessors::default();
        for field in fields {
            accessors.variables.insert(field.to_string());
            accessors.given.insert(format!("{}Given", field), field.to_string());
            accessors.declarations.insert(
                field.to_string(),
                Declaration {
                    id: field.to_uppercase(),
                    names: vec![field.to_lowercase()],
                    description: String::new(),
                    ty: ParamType::Real,
                    kind: DeclarationKind::Flagged {
                        field: field.to_string(),
                    },
                    default: None,
                },
            );
        }
        accessors
    }

    #[test]
    fn test_arrows_to_dots() {
        assert_eq!(arrows_to_dots("a -> b + c->d->e"), "a.b + c.d.e");
        assert_eq!(arrows_to_dots("x = 1;"), "x = 1;");
    }

    #[test]
    fn test_state_and_solution_accesses() {
        let code = "vd = *(ckt->CKTrhsOld + DIOposPrimeNode) - *(ckt->CKTstate0 + DIOvoltage);";
        let code = state_accesses(code, "ckt", "state", "DIOstate");
        let code = solution_accesses(&code, "ckt", "rstate");
        assert_eq!(
            code,
            "vd = rstate.OldSolution[DIOposPrimeNode] - state.States[0][DIOstate + DIOvoltage];"
        );
        assert_eq!(
            solution_accesses("*(ckt->CKTrhs + n) += x;", "ckt", "rstate"),
            "rstate.Rhs[n] += x;"
        );
    }

    #[test]
    fn test_matrix_accesses() {
        let mut matrix = IndexMap::new();
        matrix.insert(
            "DIOposPosPtr".to_string(),
            MatrixPosition {
                row: "DIOposNode".into(),
                column: "DIOposNode".into(),
            },
        );
        let mut extra: IndexSet<String> = ["DIOposPosPtr", "DIOcap"].iter().map(|s| s.to_string()).collect();

        let code = "*(DIOposPosPtr) += gd; *(DIOposPosPtr + 1) += xc;";
        assert_eq!(
            matrix_accesses(code, &matrix, "cstate", true, &mut extra),
            "cstate.Matrix[DIOposNode, DIOposNode] += gd; cstate.Matrix[DIOposNode, DIOposNode].Imag += xc;"
        );
        assert_eq!(extra.iter().collect::<Vec<_>>(), vec!["DIOcap"]);

        let code = "*DIOposPosPtr -= a * *(DIOposPosPtr);";
        assert_eq!(
            matrix_accesses(code, &matrix, "rstate", false, &mut extra),
            "rstate.Matrix[DIOposNode, DIOposNode] -= a * rstate.Matrix[DIOposNode, DIOposNode];"
        );
    }

    #[test]
    fn test_single_mode_flags() {
        assert_eq!(
            mode_flags("if (ckt->CKTmode & MODEINITJCT) {", "ckt"),
            "if (state.Init == CircuitState.InitFlags.InitJct) {"
        );
        assert_eq!(
            mode_flags("if (!(ckt->CKTmode & MODETRAN)) x = 1;", "ckt"),
            "if (!(method != null)) x = 1;"
        );
        assert_eq!(
            mode_flags("if (ckt->CKTmode & MODEWEIRD) x = 1;", "ckt"),
            "if (ckt->CKTmode & MODEWEIRD) x = 1;"
        );
    }

    #[test]
    fn test_grouped_mode_flags() {
        assert_eq!(
            mode_flags("if ((ckt->CKTmode & (MODETRAN | MODEAC | MODEINITSMSIG))) {", "ckt"),
            "if ((method != null || state.UseSmallSignal)) {"
        );
        assert_eq!(
            mode_flags("if (ckt->CKTmode & (MODETRAN | MODETRANOP)) {", "ckt"),
            "if (state.Domain == CircuitState.DomainTypes.Time) {"
        );
        assert_eq!(
            mode_flags("if (ckt->CKTmode & (MODETRANOP | MODEUIC)) {", "ckt"),
            "if (state.UseIC) {"
        );
        assert_eq!(
            mode_flags("if (ckt->CKTmode & (MODEDCOP | MODEINITTRAN)) {", "ckt"),
            "if (state.UseDC || (method != null && method.SavedTime == 0.0)) {"
        );
    }

    #[test]
    fn test_typed_argument() {
        let method = "int DIOpzLoad(GENmodel *inModel, CKTcircuit *ckt, SPcomplex *s)";
        assert_eq!(typed_argument(method, "SPcomplex"), Some("s".to_string()));
        assert_eq!(typed_argument(method, "double"), None);
    }
}
