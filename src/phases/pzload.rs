//! The pole-zero load entry point.
//!
//! Same as the AC load, except that the Laplace variable is a method
//! argument instead of `jω`.

use indexmap::IndexMap;
use tracing::info;

use super::acload::{merge_complex_assignments, COMPLEX_STATE};
use super::{
    arrows_to_dots, matrix_accesses, mode_flags, state_accesses, temperature_idioms,
    typed_argument, MatrixPosition, Setup,
};
use crate::diagnostics::Diagnostics;
use crate::error::{Result, TranslateError};
use crate::iterate::DeviceIteration;
use crate::params::ParameterAccessors;
use crate::scan::format::format;
use crate::scan::pattern::{replace_all, Pattern};
use crate::source::{DeviceSource, EntryPointKind};

const LAPLACE_ARGUMENT: &str = "s";

#[derive(Debug, Clone)]
pub struct PzLoad {
    pub iteration: DeviceIteration,
    matrix: IndexMap<String, MatrixPosition>,
    states: String,
    laplace: String,
}

impl PzLoad {
    pub fn read(source: &DeviceSource, setup: &Setup, diagnostics: &mut Diagnostics) -> Result<Self> {
        let kind = EntryPointKind::PzLoad;
        let name = source
            .entry_point_name(kind)
            .ok_or_else(|| TranslateError::UndefinedEntryPoint {
                kind: kind.to_string(),
            })?;
        info!(entry_point = name, "translating pole-zero load");
        Self::from_method(&source.get_entry_point(kind)?, name, setup, diagnostics)
    }

    pub fn from_method(
        method: &str,
        name: &str,
        setup: &Setup,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let laplace =
            typed_argument(method, "SPcomplex").unwrap_or_else(|| LAPLACE_ARGUMENT.to_string());
        Ok(Self {
            iteration: DeviceIteration::read(method, name, diagnostics)?,
            matrix: setup.matrix.clone(),
            states: setup.states_variable.clone().unwrap_or_default(),
            laplace,
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
        format(&merge_complex_assignments(&code, COMPLEX_STATE, true))
    }

    fn apply_circuit(&self, code: &str) -> String {
        let circuit = self.iteration.circuit();
        let mut code = state_accesses(code, circuit, "state", &self.states);
        for (part, target) in [("real", "Real"), ("imag", "Imaginary")] {
            let pattern = Pattern::new(&format!("{} -> {}", self.laplace, part));
            code = replace_all(&code, &pattern, |_, _| {
                Some(format!("{}.Laplace.{}", COMPLEX_STATE, target))
            });
        }
        let code = temperature_idioms(&code, circuit);
        mode_flags(&code, circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::tests::flagged_accessors;

    const SETUP: &str = r#"int DIOsetup(SMPmatrix *matrix, GENmodel *inModel, CKTcircuit *ckt, int *states)
{
    for( ; model != NULL; model = model->DIOnextModel ) {
        for(here = model->DIOinstances; here != NULL; here = here->DIOnextInstance) {
            here->DIOstate = *states;
            *states += 3;
            TSTALLOC(DIOposPosPtr, DIOposNode, DIOposNode);
            TSTALLOC(DIOposNegPtr, DIOposNode, DIOnegNode);
        }
    }
    return(OK);
}"#;

    const PZLOAD: &str = r#"int DIOpzLoad(GENmodel *inModel, CKTcircuit *ckt, SPcomplex *sv)
{
    double gspr, xceq;
    for( ; model != NULL; model = model->DIOnextModel ) {
        for(here = model->DIOinstances; here != NULL; here = here->DIOnextInstance) {
            gspr = here->DIOtConductance * here->DIOarea;
            xceq = *(ckt->CKTstate0 + here->DIOcapCharge);
            *(here->DIOposPosPtr) += gspr + xceq * sv->real;
            *(here->DIOposPosPtr + 1) += xceq * sv->imag;
            *(here->DIOposNegPtr) -= xceq * sv->real;
            *(here->DIOposNegPtr + 1) -= xceq * sv->imag;
        }
    }
    return(OK);
}"#;

    #[test]
    fn test_pz_load_export() {
        let mut diags = Diagnostics::new();
        let none = ParameterAccessors::default();
        let device = flagged_accessors(&["DIOarea"]);
        let mut setup = Setup::from_method(SETUP, "DIOsetup", &mut diags).unwrap();
        setup.export_device(&none, &device, &mut diags);

        let mut pz = PzLoad::from_method(PZLOAD, "DIOpzLoad", &setup, &mut diags).unwrap();
        assert_eq!(pz.laplace, "sv");
        let code = pz.export_device(&none, &device);

        assert!(code.contains("xceq = state.States[0][DIOstate + DIOcapCharge];"));
        assert!(code.contains("cstate.Matrix[DIOposNode, DIOposNode] += gspr + xceq * cstate.Laplace;"));
        assert!(code.contains("cstate.Matrix[DIOposNode, DIOnegNode] -= xceq * cstate.Laplace;"));
        assert!(!code.contains("sv"));
        assert!(!code.contains("Imag +="));
    }

    #[test]
    fn test_default_laplace_argument() {
        let mut diags = Diagnostics::new();
        let setup = Setup::from_method(SETUP, "DIOsetup", &mut diags).unwrap();
        let method = PZLOAD.replace("SPcomplex *sv", "void *sv");
        let pz = PzLoad::from_method(&method, "DIOpzLoad", &setup, &mut diags).unwrap();
        assert_eq!(pz.laplace, LAPLACE_ARGUMENT);
    }
}
