//! The setup entry point: defaults, matrix elements, nodes and state slots.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use super::{arrows_to_dots, temperature_idioms, MatrixPosition};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{Result, TranslateError};
use crate::iterate::DeviceIteration;
use crate::params::ParameterAccessors;
use crate::scan::extract_method_parameters;
use crate::scan::format::format;
use crate::scan::lexer::TokenKind;
use crate::scan::pattern::{replace_all, Pattern, Tokens};
use crate::source::{DeviceSource, EntryPointKind, ParamType};

/// Position of the state counter in the setup signature.
const STATES_ARGUMENT: usize = 3;

/// Default value statements, with and without braces.
const DEFAULT_PATTERNS: [&str; 2] = [
    "if ( ! $var . Given ) { $var . Value = ...value ; }",
    "if ( ! $var . Given ) $var . Value = ...value ;",
];

#[derive(Debug, Clone)]
pub struct Setup {
    pub iteration: DeviceIteration,
    /// Name of the `int *states` argument
    pub states_argument: String,
    pub model_defaults: IndexMap<String, String>,
    pub device_defaults: IndexMap<String, String>,
    /// Matrix element pointer -> row and column nodes
    pub matrix: IndexMap<String, MatrixPosition>,
    /// Every node used by a matrix element, in order of appearance
    pub nodes: IndexSet<String>,
    /// Nodes created by the device itself
    pub created_nodes: IndexSet<String>,
    /// Field holding the first state slot of an instance
    pub states_variable: Option<String>,
    /// Number of state slots per instance
    pub states_count: Option<String>,
}

impl Setup {
    pub fn read(source: &DeviceSource, diagnostics: &mut Diagnostics) -> Result<Self> {
        let kind = EntryPointKind::Setup;
        let name = source
            .entry_point_name(kind)
            .ok_or_else(|| TranslateError::UndefinedEntryPoint {
                kind: kind.to_string(),
            })?;
        info!(entry_point = name, "translating setup");
        Self::from_method(&source.get_entry_point(kind)?, name, diagnostics)
    }

    pub fn from_method(method: &str, name: &str, diagnostics: &mut Diagnostics) -> Result<Self> {
        let states_argument = extract_method_parameters(method, Some(name))
            .into_iter()
            .nth(STATES_ARGUMENT)
            .ok_or_else(|| TranslateError::missing_parameter(name, STATES_ARGUMENT))?;

        let mut created_nodes = IndexSet::new();
        let method = create_nodes(method, &mut created_nodes);

        Ok(Self {
            iteration: DeviceIteration::read(&method, name, diagnostics)?,
            states_argument,
            model_defaults: IndexMap::new(),
            device_defaults: IndexMap::new(),
            matrix: IndexMap::new(),
            nodes: IndexSet::new(),
            created_nodes,
            states_variable: None,
            states_count: None,
        })
    }

    /// Nodes that are bound to the pins of the device.
    pub fn pins(&self) -> impl Iterator<Item = &String> {
        self.nodes.iter().filter(|n| !self.created_nodes.contains(*n))
    }

    pub fn export_model(
        &mut self,
        model: &ParameterAccessors,
        diagnostics: &mut Diagnostics,
    ) -> String {
        let circuit = self.iteration.circuit().to_string();
        let code = self.iteration.export_model_code(model);
        let code = extract_defaults(&code, model, &mut self.model_defaults, diagnostics);
        let code = temperature_idioms(&code, &circuit);
        format(&arrows_to_dots(&code))
    }

    pub fn export_device(
        &mut self,
        model: &ParameterAccessors,
        device: &ParameterAccessors,
        diagnostics: &mut Diagnostics,
    ) -> String {
        let circuit = self.iteration.circuit().to_string();
        let code = self.iteration.export_device_code(model, device);
        let code = extract_defaults(&code, device, &mut self.device_defaults, diagnostics);
        let code = self.extract_matrix(&code);
        let code = self.extract_states(&code);
        let code = temperature_idioms(&code, &circuit);
        debug!(
            matrix = self.matrix.len(),
            nodes = self.nodes.len(),
            states = ?self.states_variable,
            "extracted setup tables"
        );
        format(&arrows_to_dots(&code))
    }

    /// Remove the `TSTALLOC(ptr, row, column)` allocations.
    fn extract_matrix(&mut self, code: &str) -> String {
        let mut code = code.to_string();
        for pattern in [
            "TSTALLOC ( $ptr , $row , $column ) ;",
            "TSTALLOC ( $ptr , $row , $column )",
        ] {
            code = replace_all(&code, &Pattern::new(pattern), |m, _| {
                let (row, column) = (m.get("row").to_string(), m.get("column").to_string());
                self.nodes.insert(row.clone());
                self.nodes.insert(column.clone());
                self.matrix
                    .insert(m.get("ptr").to_string(), MatrixPosition { row, column });
                Some(String::new())
            });
        }
        code
    }

    /// Remove `var = *states; *states += count;` and remember `var`.
    fn extract_states(&mut self, code: &str) -> String {
        let pattern = Pattern::new(&format!(
            "$var = * {s} ; * {s} += @count ;",
            s = self.states_argument
        ));
        replace_all(code, &pattern, |m, _| {
            self.states_variable = Some(m.get("var").to_string());
            self.states_count = Some(m.get("count").to_string());
            Some(String::new())
        })
    }
}

/// Replace `err = CKTmkVolt(ckt, &tmp, ...); if (err) return (err); node = tmp->number;`
/// by a node creation and collect the created node fields.
fn create_nodes(method: &str, created: &mut IndexSet<String>) -> String {
    let pattern = Pattern::new(
        "$err = CKTmkVolt ( $ckt , & $tmp , ...args ) ; if ( $err ) return ( $err ) ; ...node = $tmp -> number ;",
    );
    replace_all(method, &pattern, |m, _| {
        let node = m.get("node");
        let field = Tokens::code(node)
            .iter()
            .filter(|t| t.kind == TokenKind::Identifier)
            .last()
            .map(|t| t.text.clone())?;
        created.insert(field);
        Some(format!("{} = CreateNode(ckt).Index;", node))
    })
}

/// Lift literal defaults of flagged fields out of the code.
///
/// Defaults equal to the zero value of their type are dropped, other
/// literals are recorded. Non-literal defaults stay in the code.
fn extract_defaults(
    code: &str,
    accessors: &ParameterAccessors,
    defaults: &mut IndexMap<String, String>,
    diagnostics: &mut Diagnostics,
) -> String {
    let mut code = code.to_string();
    for pattern in DEFAULT_PATTERNS {
        code = replace_all(&code, &Pattern::new(pattern), |m, _| {
            let field = m.get("var");
            let value = m.get("value").trim();
            let Some(literal) = default_literal(value) else {
                diagnostics.push(Diagnostic::IgnoredDefault {
                    field: field.to_string(),
                    value: value.to_string(),
                });
                return None;
            };
            let ty = accessors
                .declarations
                .get(field)
                .map_or(ParamType::Real, |d| d.ty);
            if !ty.is_zero_literal(&literal) {
                defaults.insert(field.to_string(), literal);
            }
            Some(String::new())
        });
    }
    code
}

/// Boolean, numeric or string literal in its target form.
fn default_literal(value: &str) -> Option<String> {
    let tokens = Tokens::code(value);
    let parts: Vec<_> = tokens.iter().collect();
    match parts.as_slice() {
        [t] if t.kind == TokenKind::Identifier => {
            let lower = t.text.to_lowercase();
            (lower == "true" || lower == "false").then_some(lower)
        }
        [t] if matches!(t.kind, TokenKind::Number | TokenKind::Str) => Some(t.text.clone()),
        [sign, t] if (sign.is("-") || sign.is("+")) && t.kind == TokenKind::Number => {
            Some(format!("{}{}", sign.text, t.text))
        }
        _ => None,
    }
}
