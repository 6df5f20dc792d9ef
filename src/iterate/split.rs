//! Splitting an entry point into its model and instance loops.
//!
//! Nearly every SPICE entry point has the same skeleton:
//!
//! ```c
//! int DIOload(GENmodel *inModel, CKTcircuit *ckt)
//! {
//!     /* definition */
//!     for (; model != NULL; model = model->DIOnextModel) {
//!         /* model code */
//!         for (here = model->DIOinstances; here != NULL; here = here->DIOnextInstance) {
//!             /* device code */
//!         }
//!         /* more model code */
//!     }
//!     return (OK);
//! }
//! ```

use tracing::debug;

use crate::error::{Result, TranslateError};
use crate::scan::delimiter::{find_in_code, match_delimiter};
use crate::scan::extract_method_parameters;
use crate::scan::pattern::{Pattern, Tokens};

/// The parts of an entry point that iterates over models and instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationSplit {
    /// Code between the opening brace of the function and the model loop
    pub definition: String,
    /// Model loop body without the instance loop
    pub model_code: String,
    /// Instance loop body
    pub device_code: String,
    /// Variable of the model loop
    pub model_var: String,
    /// Variable of the instance loop
    pub instance_var: String,
    /// Name of the `CKTcircuit *` argument
    pub circuit: String,
    /// Names of all arguments of the entry point
    pub arguments: Vec<String>,
}

impl IterationSplit {
    /// Split `method`; `name` only labels the errors.
    pub fn split(method: &str, name: &str) -> Result<Self> {
        let tokens = Tokens::code(method);
        let model_loop = Pattern::new("for ( ; $var != NULL ; $var = $var -> $next ) {")
            .find(&tokens, 0)
            .ok_or_else(|| TranslateError::MissingModelIterator {
                method: name.to_string(),
            })?;
        let model_var = model_loop.get("var").to_string();

        let model_open = model_loop.end - 1;
        let model_close = match_delimiter(method, model_open)?;
        let content = &method[model_open + 1..model_close];

        let inner = Tokens::code(content);
        let instance_pattern = format!(
            "for ( $var = {} -> $first ; $var != NULL ; $var = $var -> $next ) {{",
            model_var
        );
        let instance_loop = Pattern::new(&instance_pattern)
            .find(&inner, 0)
            .ok_or_else(|| TranslateError::MissingInstanceIterator {
                method: name.to_string(),
            })?;
        let instance_var = instance_loop.get("var").to_string();

        let instance_open = instance_loop.end - 1;
        let instance_close = match_delimiter(content, instance_open)?;

        let definition = match find_in_code(method, 0, b'{') {
            Some(body) if body < model_loop.start => method[body + 1..model_loop.start].trim(),
            _ => "",
        };
        let model_code = [
            content[..instance_loop.start].trim(),
            content[instance_close + 1..].trim(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

        debug!(
            method = name,
            model = model_var.as_str(),
            instance = instance_var.as_str(),
            "split iteration"
        );
        Ok(Self {
            definition: definition.to_string(),
            model_code,
            device_code: content[instance_open + 1..instance_close].trim().to_string(),
            model_var,
            instance_var,
            circuit: circuit_variable(method),
            arguments: extract_method_parameters(method, Some(name)),
        })
    }
}

/// Name of the `CKTcircuit *` argument of an entry point, `ckt` if there is none.
pub fn circuit_variable(method: &str) -> String {
    let tokens = Tokens::code(method);
    Pattern::new("CKTcircuit * $ckt")
        .find(&tokens, 0)
        .map(|m| m.get("ckt").to_string())
        .unwrap_or_else(|| "ckt".to_string())
}
