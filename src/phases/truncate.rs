//! The truncation error entry point.

use tracing::info;

use super::{arrows_to_dots, state_accesses, temperature_idioms, Setup};
use crate::diagnostics::Diagnostics;
use crate::error::{Result, TranslateError};
use crate::iterate::DeviceIteration;
use crate::params::ParameterAccessors;
use crate::scan::{extract_method_parameters, TokenKind};
use crate::scan::format::format;
use crate::scan::pattern::{replace_all, Pattern};
use crate::source::{DeviceSource, EntryPointKind};

const TIMESTEP_ARGUMENT: usize = 2;
const DEFAULT_TIMESTEP: &str = "timeStep";

#[derive(Debug, Clone)]
pub struct Truncate {
    pub iteration: DeviceIteration,
    /// Name of the time step argument, passed by reference
    pub timestep: String,
    states: String,
}

impl Truncate {
    pub fn read(source: &DeviceSource, setup: &Setup, diagnostics: &mut Diagnostics) -> Result<Self> {
        let kind = EntryPointKind::Trunc;
        let name = source
            .entry_point_name(kind)
            .ok_or_else(|| TranslateError::UndefinedEntryPoint {
                kind: kind.to_string(),
            })?;
        info!(entry_point = name, "translating truncation");
        Self::from_method(&source.get_entry_point(kind)?, name, setup, diagnostics)
    }

    pub fn from_method(
        method: &str,
        name: &str,
        setup: &Setup,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let timestep = extract_method_parameters(method, Some(name))
            .into_iter()
            .nth(TIMESTEP_ARGUMENT)
            .unwrap_or_else(|| DEFAULT_TIMESTEP.to_string());
        Ok(Self {
            iteration: DeviceIteration::read(method, name, diagnostics)?,
            timestep,
            states: setup.states_variable.clone().unwrap_or_default(),
        })
    }

    pub fn export_model(&mut self, model: &ParameterAccessors) -> String {
        let code = self.iteration.export_model_code(model);
        self.finish(&code)
    }

    pub fn export_device(&mut self, model: &ParameterAccessors, device: &ParameterAccessors) -> String {
        let code = self.iteration.export_device_code(model, device);
        self.finish(&code)
    }

    fn finish(&self, code: &str) -> String {
        let circuit = self.iteration.circuit();
        let code = state_accesses(code, circuit, "state", &self.states);
        let code = replace_all(
            &code,
            &Pattern::new("CKTterr ( ...slot , $ckt , ...timestep )"),
            |m, _| {
                Some(format!(
                    "method.Terr({} + {}, {}, ref {})",
                    self.states,
                    m.get("slot"),
                    m.get("ckt"),
                    self.timestep
                ))
            },
        );
        let code = dereference_timestep(&code, &self.timestep);
        let code = temperature_idioms(&code, circuit);
        format(&arrows_to_dots(&code))
    }
}

/// `*timeStep` is a plain reference argument in the generated method.
fn dereference_timestep(code: &str, timestep: &str) -> String {
    replace_all(code, &Pattern::new(&format!("* {}", timestep)), |m, tokens| {
        let unary = m.first == 0
            || tokens.get(m.first - 1).is_some_and(|t| {
                !(t.is_ident() || t.is(")") || t.is("]")) && t.kind != TokenKind::Number
            });
        unary.then(|| timestep.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETUP: &str = r#"int DIOsetup(SMPmatrix *matrix, GENmodel *inModel, CKTcircuit *ckt, int *states)
{
    for( ; model != NULL; model = model->DIOnextModel ) {
        for(here = model->DIOinstances; here != NULL; here = here->DIOnextInstance) {
            here->DIOstate = *states;
            *states += 3;
        }
    }
    return(OK);
}"#;

    const TRUNC: &str = r#"int DIOtrunc(GENmodel *inModel, CKTcircuit *ckt, double *timeStep)
{
    for( ; model != NULL; model = model->DIOnextModel) {
        for(here=model->DIOinstances;here!=NULL;here = here->DIOnextInstance){
            CKTterr(here->DIOcapCharge,ckt,timeStep);
            if (*timeStep > 1e-3) {
                *timeStep = 2 * *timeStep;
            }
        }
    }
    return(OK);
}"#;

    #[test]
    fn test_truncate_export() {
        let mut diags = Diagnostics::new();
        let none = ParameterAccessors::default();
        let mut setup = Setup::from_method(SETUP, "DIOsetup", &mut diags).unwrap();
        setup.export_device(&none, &none, &mut diags);

        let mut trunc = Truncate::from_method(TRUNC, "DIOtrunc", &setup, &mut diags).unwrap();
        assert_eq!(trunc.timestep, "timeStep");
        let code = trunc.export_device(&none, &none);
        assert!(code.contains("method.Terr(DIOstate + DIOcapCharge, ckt, ref timeStep);"));
        assert!(code.contains("timeStep = 2 * timeStep;"));
        assert!(!code.contains("*timeStep"));
    }

    #[test]
    fn test_dereference_timestep() {
        assert_eq!(dereference_timestep("a = b * ts;", "ts"), "a = b * ts;");
        assert_eq!(dereference_timestep("*ts = 1;", "ts"), "ts = 1;");
        assert_eq!(dereference_timestep("a = (*ts);", "ts"), "a = (ts);");
    }
}
