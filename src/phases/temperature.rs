//! The temperature entry point.

use tracing::info;

use super::{arrows_to_dots, temperature_idioms};
use crate::diagnostics::Diagnostics;
use crate::error::{Result, TranslateError};
use crate::iterate::DeviceIteration;
use crate::params::ParameterAccessors;
use crate::scan::format::format;
use crate::source::{DeviceSource, EntryPointKind};

#[derive(Debug, Clone)]
pub struct Temperature {
    pub iteration: DeviceIteration,
}

impl Temperature {
    pub fn read(source: &DeviceSource, diagnostics: &mut Diagnostics) -> Result<Self> {
        let kind = EntryPointKind::Temperature;
        let name = source
            .entry_point_name(kind)
            .ok_or_else(|| TranslateError::UndefinedEntryPoint {
                kind: kind.to_string(),
            })?;
        info!(entry_point = name, "translating temperature");
        Self::from_method(&source.get_entry_point(kind)?, name, diagnostics)
    }

    pub fn from_method(method: &str, name: &str, diagnostics: &mut Diagnostics) -> Result<Self> {
        Ok(Self {
            iteration: DeviceIteration::read(method, name, diagnostics)?,
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
        let code = temperature_idioms(code, self.iteration.circuit());
        format(&arrows_to_dots(&code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::tests::flagged_accessors;

    const TEMP: &str = r#"int
DIOtemp(GENmodel *inModel, CKTcircuit *ckt)
{
    double vt;
    double fact;
    for( ; model != NULL; model = model->DIOnextModel ) {
        if(!model->DIOnomTempGiven) {
            model->DIOnomTemp = ckt->CKTnomTemp;
        }
        fact = model->DIOnomTemp/REFTEMP;
        for(here = model->DIOinstances; here != NULL; here = here->DIOnextInstance) {
            if(!here->DIOtempGiven) here->DIOtemp = ckt->CKTtemp;
            vt = CONSTKoverQ * here->DIOtemp;
            here->DIOtSatCur = model->DIOsatCur * here->DIOarea * exp(vt);
        }
    }
    return(OK);
}"#;

    #[test]
    fn test_temperature_export() {
        let mut diags = Diagnostics::new();
        let mut temp = Temperature::from_method(TEMP, "DIOtemp", &mut diags).unwrap();
        let model = flagged_accessors(&["DIOnomTemp", "DIOsatCur"]);
        let device = flagged_accessors(&["DIOtemp", "DIOarea"]);

        let model_code = temp.export_model(&model);
        assert!(model_code.contains("DIOnomTemp.Value = ckt.State.NominalTemperature;"));
        assert!(model_code.contains("fact = DIOnomTemp.Value / Circuit.CONSTRefTemp;"));

        let device_code = temp.export_device(&model, &device);
        assert!(device_code.contains("DIOtemp.Value = ckt.State.Temperature;"));
        assert!(device_code.contains("vt = Circuit.CONSTKoverQ * DIOtemp.Value;"));
        assert!(device_code
            .contains("DIOtSatCur = Model.DIOsatCur.Value * DIOarea.Value * Math.Exp(vt);"));
        assert!(!device_code.contains("->"));

        assert!(temp.iteration.variables.model.contains_key("fact"));
        assert!(temp.iteration.variables.device.contains_key("vt"));
        assert_eq!(
            temp.iteration.device_extra.iter().collect::<Vec<_>>(),
            vec!["DIOtSatCur"]
        );
        assert!(diags.is_empty());
    }
}
