//! Rewriting loop code into simulator code.

use indexmap::IndexSet;
use tracing::trace;

use crate::params::ParameterAccessors;
use crate::scan::pattern::{is_member_access, replace_all, replace_identifier, Pattern};

/// C math functions and their .NET counterparts.
const MATH_FUNCTIONS: [(&str, &str); 12] = [
    ("log", "Math.Log"),
    ("exp", "Math.Exp"),
    ("FABS", "Math.Abs"),
    ("MAX", "Math.Max"),
    ("MIN", "Math.Min"),
    ("sqrt", "Math.Sqrt"),
    ("pow", "Math.Pow"),
    ("sin", "Math.Sin"),
    ("cos", "Math.Cos"),
    ("tan", "Math.Tan"),
    ("atan", "Math.Atan"),
    ("atan2", "Math.Atan2"),
];

/// Physical constants, all exposed by the `Circuit` class.
const CIRCUIT_CONSTANTS: [(&str, &str); 9] = [
    ("REFTEMP", "CONSTRefTemp"),
    ("CHARGE", "CHARGE"),
    ("CONSTCtoK", "CONSTCtoK"),
    ("CONSTboltz", "CONSTBoltz"),
    ("CONSTroot2", "CONSTroot2"),
    ("CONSTvt0", "CONSTvt0"),
    ("CONSTKoverQ", "CONSTKoverQ"),
    ("CONSTE", "CONSTE"),
    ("CONSTPI", "CONSTPI"),
];

const LITERALS: [(&str, &str); 2] = [("TRUE", "true"), ("FALSE", "false")];

/// Translate math functions, constants and the minimum conductance.
pub fn apply_general(code: &str, circuit: &str) -> String {
    let mut code = code.to_string();
    for (function, replacement) in MATH_FUNCTIONS {
        code = replace_all(&code, &Pattern::new(&format!("{} (", function)), |m, tokens| {
            if is_member_access(tokens, m.first) {
                return None;
            }
            Some(format!("{}(", replacement))
        });
    }
    for (constant, replacement) in CIRCUIT_CONSTANTS {
        code = replace_identifier(&code, constant, &format!("Circuit.{}", replacement), true);
    }
    for (literal, replacement) in LITERALS {
        code = replace_identifier(&code, literal, replacement, true);
    }
    replace_all(
        &code,
        &Pattern::new(&format!("{} -> CKTgmin", circuit)),
        |_, _| Some("state.Gmin".to_string()),
    )
}

/// Rewrite every `loop_var->field` reference.
///
/// Given flags become `<field>.Given`, flagged fields `<field>.Value` and
/// other known fields the bare name. Unknown fields keep their bare name and
/// are added to `leftover`.
pub fn apply_parameters(
    code: &str,
    loop_var: &str,
    accessors: &ParameterAccessors,
    leftover: &mut IndexSet<String>,
    prefix: &str,
) -> String {
    let pattern = Pattern::new(&format!("{} -> $field", loop_var));
    replace_all(code, &pattern, |m, tokens| {
        if is_member_access(tokens, m.first) {
            return None;
        }
        let field = m.get("field");
        let replacement = if let Some(target) = accessors.given.get(field) {
            format!("{}{}.Given", prefix, target)
        } else if accessors.is_flagged(field) {
            format!("{}{}.Value", prefix, field)
        } else {
            if !accessors.variables.contains(field) && leftover.insert(field.to_string()) {
                trace!(field, loop_var, "unresolved field reference");
            }
            format!("{}{}", prefix, field)
        };
        Some(replacement)
    })
}

/// Qualify every bare occurrence of the shared variables.
pub fn apply_shared<'a>(
    code: &str,
    shared: impl IntoIterator<Item = &'a String>,
    qualifier: &str,
) -> String {
    shared.into_iter().fold(code.to_string(), |code, name| {
        replace_identifier(&code, name, &format!("{}.{}", qualifier, name), true)
    })
}
