//! The load entry point.

use indexmap::IndexMap;
use tracing::info;

use super::{
    arrows_to_dots, matrix_accesses, mode_flags, solution_accesses, state_accesses,
    temperature_idioms, MatrixPosition, Setup,
};
use crate::diagnostics::Diagnostics;
use crate::error::{Result, TranslateError};
use crate::iterate::DeviceIteration;
use crate::params::ParameterAccessors;
use crate::scan::format::format;
use crate::source::{DeviceSource, EntryPointKind};

#[derive(Debug, Clone)]
pub struct Load {
    pub iteration: DeviceIteration,
    matrix: IndexMap<String, MatrixPosition>,
    states: String,
}

impl Load {
    pub fn read(source: &DeviceSource, setup: &Setup, diagnostics: &mut Diagnostics) -> Result<Self> {
        let kind = EntryPointKind::Load;
        let name = source
            .entry_point_name(kind)
            .ok_or_else(|| TranslateError::UndefinedEntryPoint {
                kind: kind.to_string(),
            })?;
        info!(entry_point = name, "translating load");
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
            "rstate",
            false,
            &mut self.iteration.device_extra,
        );
        format(&arrows_to_dots(&code))
    }

    fn apply_circuit(&self, code: &str) -> String {
        let circuit = self.iteration.circuit();
        let code = state_accesses(code, circuit, "state", &self.states);
        let code = solution_accesses(&code, circuit, "rstate");
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

    const LOAD: &str = r#"int DIOload(GENmodel *inModel, CKTcircuit *ckt)
{
    double vd, cd, gd;
    for( ; model != NULL; model = model->DIOnextModel ) {
        for(here = model->DIOinstances; here != NULL; here = here->DIOnextInstance) {
            if(ckt->CKTmode & MODEINITJCT) {
                vd = here->DIOtVcrit;
            } else {
                vd = *(ckt->CKTrhsOld + here->DIOposNode) - *(ckt->CKTrhsOld + here->DIOnegNode);
            }
            cd = here->DIOarea * model->DIOsatCur * (exp(vd / 0.025) - 1) + ckt->CKTgmin * vd;
            gd = cd / vd;
            *(ckt->CKTstate0 + here->DIOcurrent) = cd;
            *(ckt->CKTrhs + here->DIOposNode) -= cd;
            *(here->DIOposPosPtr) += gd;
            *(here->DIOposNegPtr) -= gd;
        }
    }
    return(OK);
}"#;

    #[test]
    fn test_load_idioms() {
        let mut diags = Diagnostics::new();
        let model = flagged_accessors(&["DIOsatCur"]);
        let device = flagged_accessors(&["DIOarea"]);

        let mut setup = Setup::from_method(SETUP, "DIOsetup", &mut diags).unwrap();
        setup.export_device(&model, &device, &mut diags);
        let mut load = Load::from_method(LOAD, "DIOload", &setup, &mut diags).unwrap();
        let code = load.export_device(&model, &device);

        assert!(code.contains("(state.Init == CircuitState.InitFlags.InitJct)"));
        assert!(code.contains("vd = rstate.OldSolution[DIOposNode] - rstate.OldSolution[DIOnegNode];"));
        assert!(code.contains("Math.Exp(vd / 0.025)"));
        assert!(code.contains("state.Gmin * vd"));
        assert!(code.contains("state.States[0][DIOstate + DIOcurrent] = cd;"));
        assert!(code.contains("rstate.Rhs[DIOposNode] -= cd;"));
        assert!(code.contains("rstate.Matrix[DIOposNode, DIOposNode] += gd;"));
        assert!(code.contains("rstate.Matrix[DIOposNode, DIOnegNode] -= gd;"));
        assert!(!code.contains("CKT"));
        assert!(!code.contains("->"));

        let extra = &load.iteration.device_extra;
        assert!(!extra.contains("DIOposPosPtr"));
        assert!(extra.contains("DIOcurrent"));
        assert!(extra.contains("DIOtVcrit"));
        assert!(diags.is_empty());
    }
}
