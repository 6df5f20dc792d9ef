//! Translation of a small diode device folder.

use std::fs;
use std::path::Path;

use spicegen_core::{
    translate, Diagnostic, DeviceConfig, Diagnostics, PhaseSet, TranslateError, TranslatorConfig,
};

const ITF: &str = r#"#include "devdefs.h"

SPICEdev DIOinfo = {
    {   "Diode",
        "Junction Diode model",
        &DIOnSize, &DIOnSize, DIOnames,
        &DIOpTSize, DIOpTable,
        &DIOmPTSize, DIOmPTable,
        DEV_DEFAULT
    },
    DIOparam,
    DIOmParam,
    DIOload,
    DIOsetup,
    NULL,
    NULL,
    NULL,
    NULL,
    NULL,
    NULL,
    NULL,
    NULL,
    NULL,
    NULL,
    NULL,
    DIOask,
    DIOmAsk
};
"#;

const DEFS: &str = r#"#define DIOvoltage DIOstate
#define DIOcurrent DIOstate+1
"#;

const TABLES: &str = r#"#include "diodefs.h"

IFparm DIOpTable[] = {
    IOP("area", DIO_AREA, IF_REAL, "Area factor"),
    IP("off", DIO_OFF, IF_FLAG, "Initially off"),
};

IFparm DIOmPTable[] = {
    IOP("is", DIO_MOD_IS, IF_REAL, "Saturation current"),
};

int
DIOparam(int param, IFvalue *value, GENinstance *inst, IFvalue *select)
{
    DIOinstance *here = (DIOinstance*)inst;
    switch(param) {
        case DIO_AREA:
            here->DIOarea = value->rValue;
            here->DIOareaGiven = TRUE;
            break;
        case DIO_OFF:
            here->DIOoff = value->iValue;
            break;
        default:
            return(E_BADPARM);
    }
    return(OK);
}

int
DIOask(CKTcircuit *ckt, GENinstance *inst, int which, IFvalue *value, IFvalue *select)
{
    DIOinstance *here = (DIOinstance*)inst;
    switch(which) {
        case DIO_AREA:
            value->rValue = here->DIOarea;
            return(OK);
        default:
            return(E_BADPARM);
    }
}

int
DIOmParam(int param, IFvalue *value, GENmodel *inModel)
{
    DIOmodel *model = (DIOmodel*)inModel;
    switch(param) {
        case DIO_MOD_IS:
            model->DIOsatCur = value->rValue;
            model->DIOsatCurGiven = TRUE;
            break;
        default:
            return(E_BADPARM);
    }
    return(OK);
}

int
DIOmAsk(CKTcircuit *ckt, GENmodel *inModel, int which, IFvalue *value)
{
    DIOmodel *model = (DIOmodel*)inModel;
    switch(which) {
        case DIO_MOD_IS:
            value->rValue = model->DIOsatCur;
            return(OK);
        default:
            return(E_BADPARM);
    }
}
"#;

const SETUP: &str = r#"#include "diodefs.h"

int
DIOsetup(SMPmatrix *matrix, GENmodel *inModel, CKTcircuit *ckt, int *states)
{
    DIOmodel *model = (DIOmodel*)inModel;
    DIOinstance *here;

    for( ; model != NULL; model = model->DIOnextModel ) {
        if(!model->DIOsatCurGiven) {
            model->DIOsatCur = 1e-14;
        }
        for(here = model->DIOinstances; here != NULL; here = here->DIOnextInstance) {
            if(!here->DIOareaGiven) here->DIOarea = 1;
            here->DIOstate = *states;
            *states += 2;
            TSTALLOC(DIOposPosPtr, DIOposNode, DIOposNode);
            TSTALLOC(DIOposNegPtr, DIOposNode, DIOnegNode);
            TSTALLOC(DIOnegPosPtr, DIOnegNode, DIOposNode);
            TSTALLOC(DIOnegNegPtr, DIOnegNode, DIOnegNode);
        }
    }
    return(OK);
}
"#;

const LOAD: &str = r#"#include "diodefs.h"

int
DIOload(GENmodel *inModel, CKTcircuit *ckt)
{
    DIOmodel *model = (DIOmodel*)inModel;
    DIOinstance *here;
    double vd, cd, gd;

    for( ; model != NULL; model = model->DIOnextModel ) {
        for(here = model->DIOinstances; here != NULL; here = here->DIOnextInstance) {
            if(ckt->CKTmode & MODEINITJCT) {
                vd = 0.6;
            } else {
                vd = *(ckt->CKTrhsOld + here->DIOposNode) - *(ckt->CKTrhsOld + here->DIOnegNode);
            }
            cd = here->DIOarea * model->DIOsatCur * (exp(vd / 0.025) - 1) + ckt->CKTgmin * vd;
            gd = here->DIOarea * model->DIOsatCur / 0.025 * exp(vd / 0.025) + ckt->CKTgmin;
            *(ckt->CKTstate0 + here->DIOvoltage) = vd;
            *(ckt->CKTstate0 + here->DIOcurrent) = cd;
            *(ckt->CKTrhs + here->DIOposNode) -= cd;
            *(ckt->CKTrhs + here->DIOnegNode) += cd;
            *(here->DIOposPosPtr) += gd;
            *(here->DIOposNegPtr) -= gd;
            *(here->DIOnegPosPtr) -= gd;
            *(here->DIOnegNegPtr) += gd;
        }
    }
    return(OK);
}
"#;

fn diode_folder() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (file, content) in [
        ("dioitf.h", ITF),
        ("diodefs.h", DEFS),
        ("dio.c", TABLES),
        ("diosetup.c", SETUP),
        ("dioload.c", LOAD),
    ] {
        fs::write(dir.path().join(file), content).unwrap();
    }
    dir
}

fn config(folder: &Path) -> TranslatorConfig {
    TranslatorConfig::new(DeviceConfig::new(folder, "dioitf.h", "diodefs.h"))
}

#[test]
fn test_translate_diode() {
    let folder = diode_folder();
    let mut diagnostics = Diagnostics::new();
    let translation = translate(&config(folder.path()), &mut diagnostics).unwrap();

    assert_eq!(translation.name, "DIODE");
    let model = &translation.model;
    let device = &translation.device;

    assert!(model.contains("public class DIODEModel : CircuitModel"));
    assert!(model.contains("[SpiceName(\"is\"), SpiceInfo(\"Saturation current\")]"));
    assert!(model.contains("public Parameter DIOsatCur { get; } = new Parameter(1e-14);"));

    assert!(device.contains("public class DIODE : CircuitComponent"));
    assert!(device.contains("public Parameter DIOarea { get; } = new Parameter(1);"));
    assert!(device.contains("public bool DIOoff { get; set; }"));
    assert!(device.contains("public DIODE(string name) : base(name, 2)"));
    assert!(device.contains("private const int DIOvoltage = 0;"));
    assert!(device.contains("private const int DIOcurrent = 1;"));

    assert!(device.contains("var nodes = BindNodes(ckt);"));
    assert!(device.contains("DIOposNode = nodes[0].Index;"));
    assert!(device.contains("DIOnegNode = nodes[1].Index;"));
    assert!(device.contains("DIOstate = ckt.State.GetState(2);"));

    assert!(device.contains("var rstate = state.Real;"));
    assert!(device.contains("double vd;"));
    assert!(device.contains("rstate.Matrix[DIOposNode, DIOposNode] += gd;"));
    assert!(device.contains("rstate.Matrix[DIOnegNode, DIOposNode] -= gd;"));
    assert!(device.contains("state.States[0][DIOstate + DIOvoltage] = vd;"));
    assert!(device.contains("rstate.Rhs[DIOposNode] -= cd;"));

    for artifact in [model, device] {
        assert!(!artifact.contains("CKT"));
        assert!(!artifact.contains("->"));
        assert!(!artifact.contains("TSTALLOC"));
    }

    assert_eq!(
        diagnostics.count(|d| matches!(d, Diagnostic::UnresolvedParameterId { .. })),
        0
    );
    assert_eq!(
        diagnostics.count(|d| matches!(d, Diagnostic::UnresolvedReference { .. })),
        0
    );
}

#[test]
fn test_write_generated_classes() {
    let folder = diode_folder();
    let out = tempfile::tempdir().unwrap();
    let mut diagnostics = Diagnostics::new();
    let translation = translate(&config(folder.path()), &mut diagnostics).unwrap();

    let written = translation.write_to(out.path()).unwrap();
    assert_eq!(written.len(), 2);
    assert!(out.path().join("DIODEModel.cs").is_file());
    assert!(out.path().join("DIODE.cs").is_file());
    assert_eq!(
        fs::read_to_string(out.path().join("DIODE.cs")).unwrap(),
        translation.device
    );
}

#[test]
fn test_setup_only() {
    let folder = diode_folder();
    let mut diagnostics = Diagnostics::new();
    let config = config(folder.path()).with_phases(PhaseSet::SETUP);
    let translation = translate(&config, &mut diagnostics).unwrap();

    assert!(translation.device.contains("public override void Setup(Circuit ckt)"));
    assert!(!translation.device.contains("public override void Load(Circuit ckt)"));
    assert!(!translation.device.contains("rstate"));
}

#[test]
fn test_missing_folder() {
    let folder = tempfile::tempdir().unwrap();
    let mut diagnostics = Diagnostics::new();
    let err = translate(&config(&folder.path().join("missing")), &mut diagnostics).unwrap_err();
    assert!(matches!(err, TranslateError::FileReadError { .. }));
}
