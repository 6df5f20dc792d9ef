//! Roles of the local variables of an iterating entry point.

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use super::split::IterationSplit;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::scan::pattern::{is_member_access, Tokens};
use crate::source::LocalType;

/// Words that may precede the type of a declaration.
const QUALIFIERS: [&str; 6] = ["register", "static", "const", "volatile", "signed", "auto"];

/// Local variables grouped by where they live in the generated classes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Locals of the model method
    pub model: IndexMap<String, LocalType>,
    /// Locals of the device method
    pub device: IndexMap<String, LocalType>,
    /// Computed by the model, read by its devices
    pub shared: IndexMap<String, LocalType>,
}

impl Classification {
    /// Sort the locals assigned in each loop. A model-assigned name is shared
    /// when the device code reads it before assigning it, or never assigns it.
    pub fn classify(split: &IterationSplit, diagnostics: &mut Diagnostics) -> Self {
        let model_tokens = Tokens::code(&split.model_code);
        let device_tokens = Tokens::code(&split.device_code);
        let model_declared = declarators(&model_tokens);
        let device_declared = declarators(&device_tokens);
        let mut types = TypeInference::new(split);
        let mut result = Self::default();

        for (_, name) in bare_assignments(&model_tokens) {
            if result.model.contains_key(name)
                || result.shared.contains_key(name)
                || split.arguments.iter().any(|a| a == name)
                || model_declared.iter().any(|d| d.name == name)
            {
                continue;
            }
            if is_shared(&device_tokens, &device_declared, name) {
                let ty = types.infer(name, diagnostics);
                result.shared.insert(name.to_string(), ty);
            } else {
                let ty = types.infer(name, diagnostics);
                result.model.insert(name.to_string(), ty);
            }
        }

        for (_, name) in bare_assignments(&device_tokens) {
            if result.device.contains_key(name)
                || result.shared.contains_key(name)
                || split.arguments.iter().any(|a| a == name)
                || device_declared.iter().any(|d| d.name == name)
            {
                continue;
            }
            let ty = types.infer(name, diagnostics);
            result.device.insert(name.to_string(), ty);
        }

        trace!(
            model = ?result.model.keys().collect::<Vec<_>>(),
            device = ?result.device.keys().collect::<Vec<_>>(),
            shared = ?result.shared.keys().collect::<Vec<_>>(),
            "classified variables"
        );
        result
    }
}

/// Find the declared type of a local, searching the definition, then the
/// model code, then the device code.
pub fn infer_type(split: &IterationSplit, name: &str) -> Option<LocalType> {
    [&split.definition, &split.model_code, &split.device_code]
        .into_iter()
        .find_map(|code| {
            declarators(&Tokens::code(code))
                .into_iter()
                .find(|d| d.name == name)
                .map(|d| d.ty)
        })
}

/// A variable is shared when the device code reads it before (or without)
/// assigning it.
fn is_shared(device: &Tokens<'_>, declared: &[Declarator], name: &str) -> bool {
    if declared.iter().any(|d| d.name == name) {
        return false;
    }
    let declared_at: IndexSet<usize> = declared.iter().map(|d| d.index).collect();
    let Some(first_reference) = device.iter().enumerate().position(|(i, t)| {
        t.is_ident() && t.text == name && !is_member_access(device, i) && !declared_at.contains(&i)
    }) else {
        return false;
    };
    let first_assignment = bare_assignments(device)
        .into_iter()
        .find(|(_, n)| *n == name)
        .map(|(i, _)| i);
    first_assignment != Some(first_reference)
}

/// Identifiers directly followed by a plain `=`, outside member accesses.
fn bare_assignments<'t>(tokens: &'t Tokens<'_>) -> Vec<(usize, &'t str)> {
    tokens
        .iter()
        .enumerate()
        .filter(|(i, t)| {
            t.is_ident()
                && tokens.get(i + 1).is_some_and(|next| next.is("="))
                && !is_member_access(tokens, *i)
        })
        .map(|(i, t)| (i, t.text.as_str()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Declarator {
    index: usize,
    name: String,
    ty: LocalType,
}

/// Every variable declared by a statement starting with a C type.
fn declarators(tokens: &Tokens<'_>) -> Vec<Declarator> {
    let mut found = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let at_start = i == 0
            || tokens
                .get(i - 1)
                .is_some_and(|t| t.is(";") || t.is("{") || t.is("}"));
        let mut j = i;
        while tokens.get(j).is_some_and(|t| QUALIFIERS.contains(&t.text.as_str())) {
            j += 1;
        }
        let ty = tokens.get(j).and_then(|t| LocalType::from_c_type(&t.text));
        let (true, Some(ty)) = (at_start, ty) else {
            i += 1;
            continue;
        };
        while tokens
            .get(j)
            .is_some_and(|t| LocalType::from_c_type(&t.text).is_some())
        {
            j += 1;
        }

        loop {
            while tokens.get(j).is_some_and(|t| t.is("*")) {
                j += 1;
            }
            match tokens.get(j) {
                Some(t) if t.is_ident() => found.push(Declarator {
                    index: j,
                    name: t.text.clone(),
                    ty,
                }),
                _ => break,
            }
            j = skip_declarator(tokens, j + 1);
            if tokens.get(j).is_some_and(|t| t.is(",")) {
                j += 1;
            } else {
                break;
            }
        }
        i = j.max(i + 1);
    }
    found
}

/// Skip array bounds and initializers up to the next top-level `,` or `;`.
fn skip_declarator(tokens: &Tokens<'_>, mut j: usize) -> usize {
    let mut depth = 0usize;
    while let Some(t) = tokens.get(j) {
        match t.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            "," | ";" if depth == 0 => break,
            _ => {}
        }
        j += 1;
    }
    j
}

/// Caches inferred types so each unresolved name is reported once.
struct TypeInference {
    scopes: Vec<IndexMap<String, LocalType>>,
    resolved: IndexMap<String, LocalType>,
}

impl TypeInference {
    fn new(split: &IterationSplit) -> Self {
        let scopes = [&split.definition, &split.model_code, &split.device_code]
            .into_iter()
            .map(|code| {
                let mut scope = IndexMap::new();
                for d in declarators(&Tokens::code(code)) {
                    scope.entry(d.name).or_insert(d.ty);
                }
                scope
            })
            .collect();
        Self {
            scopes,
            resolved: IndexMap::new(),
        }
    }

    fn infer(&mut self, name: &str, diagnostics: &mut Diagnostics) -> LocalType {
        if let Some(ty) = self.resolved.get(name) {
            return *ty;
        }
        let ty = match self.scopes.iter().find_map(|s| s.get(name).copied()) {
            Some(ty) => ty,
            None => {
                diagnostics.push(Diagnostic::UnresolvedVariableType {
                    name: name.to_string(),
                });
                LocalType::Real
            }
        };
        self.resolved.insert(name.to_string(), ty);
        ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METHOD: &str = r#"int
DIOload(GENmodel *inModel, CKTcircuit *ckt)
{
    double vt, gmin;
    int count;
    for( ; model != NULL; model = model->DIOnextModel ) {
        vt = model->DIOtemp * 2;
        count = 0;
        gmin = 1e-12;
        for(here = model->DIOinstances; here != NULL; here = here->DIOnextInstance) {
            double local;
            local = vt * here->DIOarea;
            gmin = gmin + local;
            here->vt = local;
            cap = local;
        }
    }
    return(OK);
}"#;

    #[test]
    fn test_classify_variables() {
        let split = IterationSplit::split(METHOD, "DIOload").unwrap();
        let mut diags = Diagnostics::new();
        let vars = Classification::classify(&split, &mut diags);

        assert_eq!(vars.shared.get("vt"), Some(&LocalType::Real));
        assert_eq!(vars.model.keys().collect::<Vec<_>>(), vec!["count", "gmin"]);
        assert_eq!(vars.model["count"], LocalType::Integer);
        assert_eq!(vars.device.keys().collect::<Vec<_>>(), vec!["gmin", "cap"]);
        assert!(!vars.model.contains_key("vt"));

        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags.entries()[0],
            Diagnostic::UnresolvedVariableType {
                name: "cap".to_string()
            }
        );
    }

    #[test]
    fn test_infer_type_declarators() {
        let split = IterationSplit {
            definition: "register int i, *p, arr[3] = {1, 2, 3}, n;\ndouble f(double x);".into(),
            model_code: "unsigned long mask = 0;".into(),
            device_code: "x = (double) i;".into(),
            model_var: "model".into(),
            instance_var: "here".into(),
            circuit: "ckt".into(),
            arguments: vec!["ckt".into()],
        };

        assert_eq!(infer_type(&split, "i"), Some(LocalType::Integer));
        assert_eq!(infer_type(&split, "p"), Some(LocalType::Integer));
        assert_eq!(infer_type(&split, "arr"), Some(LocalType::Integer));
        assert_eq!(infer_type(&split, "n"), Some(LocalType::Integer));
        assert_eq!(infer_type(&split, "f"), Some(LocalType::Real));
        assert_eq!(infer_type(&split, "mask"), Some(LocalType::Integer));
        assert_eq!(infer_type(&split, "x"), None);
    }
}
