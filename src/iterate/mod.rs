//! Entry points that iterate over all models and their instances.
//!
//! [`DeviceIteration`] splits such an entry point, classifies its locals and
//! exports the model and device halves with parameter references resolved.
//! The phase translators build their own idioms on top of it.

pub mod classify;
pub mod export;
pub mod split;

use indexmap::IndexSet;

pub use classify::{infer_type, Classification};
pub use export::{apply_general, apply_parameters, apply_shared};
pub use split::{circuit_variable, IterationSplit};

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::params::ParameterAccessors;

/// Qualifier of model members inside device code.
pub const MODEL_QUALIFIER: &str = "Model";

/// A split and classified iterating entry point.
#[derive(Debug, Clone)]
pub struct DeviceIteration {
    pub split: IterationSplit,
    pub variables: Classification,
    /// Model fields referenced without a parameter behind them
    pub model_extra: IndexSet<String>,
    /// Device fields referenced without a parameter behind them
    pub device_extra: IndexSet<String>,
}

impl DeviceIteration {
    pub fn read(method: &str, name: &str, diagnostics: &mut Diagnostics) -> Result<Self> {
        let split = IterationSplit::split(method, name)?;
        let variables = Classification::classify(&split, diagnostics);
        Ok(Self {
            split,
            variables,
            model_extra: IndexSet::new(),
            device_extra: IndexSet::new(),
        })
    }

    pub fn circuit(&self) -> &str {
        &self.split.circuit
    }

    /// Model code with the general idioms and model parameters resolved.
    pub fn export_model_code(&mut self, model: &ParameterAccessors) -> String {
        let code = apply_general(self.split.model_code.trim(), &self.split.circuit);
        apply_parameters(
            &code,
            &self.split.model_var,
            model,
            &mut self.model_extra,
            "",
        )
    }

    /// Device code with the general idioms, both parameter scopes and the
    /// shared variables resolved.
    pub fn export_device_code(
        &mut self,
        model: &ParameterAccessors,
        device: &ParameterAccessors,
    ) -> String {
        let code = apply_general(self.split.device_code.trim(), &self.split.circuit);
        let code = apply_parameters(
            &code,
            &self.split.instance_var,
            device,
            &mut self.device_extra,
            "",
        );
        let code = apply_parameters(
            &code,
            &self.split.model_var,
            model,
            &mut self.model_extra,
            &format!("{}.", MODEL_QUALIFIER),
        );
        apply_shared(&code, self.variables.shared.keys(), MODEL_QUALIFIER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METHOD: &str = r#"int
DIOtemp(GENmodel *inModel, CKTcircuit *ckt)
{
    double vt;
    for( ; model != NULL; model = model->DIOnextModel ) {
        vt = CONSTKoverQ * model->DIOnomTemp;
        for(here = model->DIOinstances; here != NULL; here = here->DIOnextInstance) {
            here->DIOtSatCur = model->DIOsatCur * exp(vt);
        }
    }
    return(OK);
}"#;

    #[test]
    fn test_export_both_halves() {
        let mut diags = Diagnostics::new();
        let mut iteration = DeviceIteration::read(METHOD, "DIOtemp", &mut diags).unwrap();
        let none = ParameterAccessors::default();

        assert_eq!(
            iteration.export_model_code(&none),
            "vt = Circuit.CONSTKoverQ * DIOnomTemp;"
        );
        assert_eq!(
            iteration.export_device_code(&none, &none),
            "DIOtSatCur = Model.DIOsatCur * Math.Exp(Model.vt);"
        );
        assert_eq!(
            iteration.model_extra.iter().collect::<Vec<_>>(),
            vec!["DIOnomTemp", "DIOsatCur"]
        );
        assert_eq!(iteration.device_extra.iter().collect::<Vec<_>>(), vec!["DIOtSatCur"]);
        assert!(diags.is_empty());
    }
}
