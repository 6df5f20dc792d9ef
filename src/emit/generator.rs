//! Runs the phases of one device and renders its model and device classes.
//!
//! Phases run in a fixed order: setup, state definitions, temperature, load,
//! AC load (from the AC or the pole-zero entry point) and truncation. Each
//! phase contributes its shared variables and unresolved fields; the setup
//! defaults are applied to the parameter declarations once every phase ran.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use super::config::{AcSource, PhaseSet, TranslatorConfig};
use super::writer::CodeWriter;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{Result, TranslateError};
use crate::iterate::DeviceIteration;
use crate::params::{Declaration, ParameterAccessors, ParameterCatalog};
use crate::phases::{AcLoad, Load, PzLoad, Setup, StateDefinitions, Temperature, Truncate};
use crate::scan::pattern::{is_member_access, Tokens};
use crate::source::{DeviceSource, EntryPointKind, LocalType};

const USINGS: [&str; 4] = [
    "using System;",
    "using SpiceSharp.Circuits;",
    "using SpiceSharp.Diagnostics;",
    "using SpiceSharp.Parameters;",
];

const NAMESPACE: &str = "SpiceSharp.Components";

/// The generated classes of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Class name of the device
    pub name: String,
    pub model: String,
    pub device: String,
}

impl Translation {
    pub fn model_file_name(&self) -> String {
        format!("{}Model.cs", self.name)
    }

    pub fn device_file_name(&self) -> String {
        format!("{}.cs", self.name)
    }

    /// Write both classes into `dir` and return the written paths.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).map_err(|source| TranslateError::FileWriteError {
            path: dir.display().to_string(),
            source,
        })?;

        let mut written = Vec::with_capacity(2);
        for (file, content) in [
            (self.model_file_name(), &self.model),
            (self.device_file_name(), &self.device),
        ] {
            let path = dir.join(file);
            fs::write(&path, content).map_err(|source| TranslateError::FileWriteError {
                path: path.display().to_string(),
                source,
            })?;
            info!(file = %path.display(), "wrote class");
            written.push(path);
        }
        Ok(written)
    }
}

/// Translate the device described by `config`.
pub fn translate(config: &TranslatorConfig, diagnostics: &mut Diagnostics) -> Result<Translation> {
    let source = DeviceSource::open(config.device.clone())?;
    let generator = ClassGenerator::generate(&source, config, diagnostics)?;
    Ok(generator.render(config.wrap_column))
}

/// One exported method of the generated classes.
#[derive(Debug, Clone)]
struct PhaseMethod {
    summary: &'static str,
    signature: String,
    params: Vec<(String, String)>,
    /// Model body, `None` for device-only methods
    model: Option<String>,
    device: String,
    model_locals: IndexMap<String, LocalType>,
    device_locals: IndexMap<String, LocalType>,
    /// Lines leading the device body
    device_head: Vec<String>,
}

impl PhaseMethod {
    fn new(summary: &'static str, method: &str, iteration: &DeviceIteration) -> Self {
        Self {
            summary,
            signature: format!("public override void {}(Circuit ckt)", method),
            params: vec![("ckt".to_string(), "The circuit".to_string())],
            model: None,
            device: String::new(),
            model_locals: iteration.variables.model.clone(),
            device_locals: iteration.variables.device.clone(),
            device_head: Vec::new(),
        }
    }
}

/// Everything known about a device after running its phases.
#[derive(Debug, Clone)]
pub struct ClassGenerator {
    /// Class name (the device name in upper case)
    pub name: String,
    pub model: ParameterAccessors,
    pub device: ParameterAccessors,
    /// Locals computed by the model and read by its devices
    pub shared: IndexMap<String, LocalType>,
    pub model_extra: IndexSet<String>,
    pub device_extra: IndexSet<String>,
    /// Nodes bound to the pins, in pin order
    pub pins: Vec<String>,
    pub nodes: IndexSet<String>,
    pub states_variable: Option<String>,
    /// State slot constants
    pub constants: IndexMap<String, usize>,
    methods: Vec<PhaseMethod>,
}

impl ClassGenerator {
    fn new(name: String, model: ParameterAccessors, device: ParameterAccessors) -> Self {
        Self {
            name,
            model,
            device,
            shared: IndexMap::new(),
            model_extra: IndexSet::new(),
            device_extra: IndexSet::new(),
            pins: Vec::new(),
            nodes: IndexSet::new(),
            states_variable: None,
            constants: IndexMap::new(),
            methods: Vec::new(),
        }
    }

    /// Run every selected phase the device provides.
    pub fn generate(
        source: &DeviceSource,
        config: &TranslatorConfig,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let name = source.name().to_uppercase();
        let phases = config.phases;
        info!(device = name.as_str(), ?phases, "generating classes");

        let catalog = ParameterCatalog::extract(source, diagnostics)?;
        let model = ParameterAccessors::synthesize(
            source,
            &catalog.model,
            EntryPointKind::ModelParam,
            EntryPointKind::ModelAsk,
            diagnostics,
        )?;
        let device = ParameterAccessors::synthesize(
            source,
            &catalog.device,
            EntryPointKind::Param,
            EntryPointKind::Ask,
            diagnostics,
        )?;
        let mut generator = Self::new(name, model, device);

        let selected = |flag: PhaseSet, kind: EntryPointKind| {
            let run = phases.contains(flag) && source.has_entry_point(kind);
            if phases.contains(flag) && !run {
                debug!(phase = %kind, "device has no entry point for selected phase");
            }
            run
        };
        let load = selected(PhaseSet::LOAD, EntryPointKind::Load);
        let ac = selected(PhaseSet::AC_LOAD, EntryPointKind::AcLoad);
        let pz = selected(PhaseSet::PZ_LOAD, EntryPointKind::PzLoad);
        let truncate = selected(PhaseSet::TRUNCATE, EntryPointKind::Trunc);
        let temperature = selected(PhaseSet::TEMPERATURE, EntryPointKind::Temperature);

        let ac_source = match (ac, pz) {
            (true, true) => Some(config.ac_source),
            (true, false) => Some(AcSource::AcLoad),
            (false, true) => Some(AcSource::PzLoad),
            (false, false) => None,
        };

        let setup = if phases.contains(PhaseSet::SETUP) || load || ac_source.is_some() || truncate {
            Some(generator.setup(source, phases.contains(PhaseSet::SETUP), diagnostics)?)
        } else {
            None
        };

        if let Some(states) = setup.as_ref().and_then(|s| s.states_variable.as_deref()) {
            let definitions = StateDefinitions::read(source, states)?;
            generator.device.variables.extend(definitions.names().cloned());
            generator.constants = definitions.constants;
        }

        if temperature {
            generator.temperature(source, diagnostics)?;
        }
        if let Some(setup) = &setup {
            if load {
                generator.load(source, setup, diagnostics)?;
            }
            match ac_source {
                Some(AcSource::AcLoad) => generator.ac_load(source, setup, diagnostics)?,
                Some(AcSource::PzLoad) => generator.pz_load(source, setup, diagnostics)?,
                None => {}
            }
            if truncate {
                generator.truncate(source, setup, diagnostics)?;
            }
            generator.apply_defaults(setup);
        }

        let states = generator.states_variable.clone();
        let device_name = source.name().to_string();
        generator.model.update_methods(&device_name, states.as_deref());
        generator.device.update_methods(&device_name, states.as_deref());
        generator.settle_extras(setup.as_ref(), diagnostics);
        Ok(generator)
    }

    fn setup(
        &mut self,
        source: &DeviceSource,
        export: bool,
        diagnostics: &mut Diagnostics,
    ) -> Result<Setup> {
        let mut setup = Setup::read(source, diagnostics)?;
        let model_code = setup.export_model(&self.model, diagnostics);
        let device_code = setup.export_device(&self.model, &self.device, diagnostics);
        self.absorb(&setup.iteration)?;

        self.pins = setup.pins().cloned().collect();
        self.nodes = setup.nodes.clone();
        self.states_variable = setup.states_variable.clone();

        if export {
            let mut method = PhaseMethod::new("Setup the device", "Setup", &setup.iteration);
            if !self.pins.is_empty() {
                method.device_head.push("// Allocate nodes".to_string());
                method.device_head.push("var nodes = BindNodes(ckt);".to_string());
                for (i, pin) in self.pins.iter().enumerate() {
                    method.device_head.push(format!("{} = nodes[{}].Index;", pin, i));
                }
            }
            if let Some(states) = &setup.states_variable {
                if !method.device_head.is_empty() {
                    method.device_head.push(String::new());
                }
                method.device_head.push("// Allocate states".to_string());
                method.device_head.push(format!(
                    "{} = ckt.State.GetState({});",
                    states,
                    setup.states_count.as_deref().unwrap_or("1")
                ));
            }
            method.model = Some(model_code);
            method.device = device_code;
            self.methods.push(method);
        }
        Ok(setup)
    }

    fn temperature(&mut self, source: &DeviceSource, diagnostics: &mut Diagnostics) -> Result<()> {
        let mut temp = Temperature::read(source, diagnostics)?;
        let mut method = PhaseMethod::new(
            "Do temperature-dependent calculations",
            "Temperature",
            &temp.iteration,
        );
        method.model = Some(temp.export_model(&self.model));
        method.device = temp.export_device(&self.model, &self.device);
        self.absorb(&temp.iteration)?;
        self.methods.push(method);
        Ok(())
    }

    fn load(&mut self, source: &DeviceSource, setup: &Setup, diagnostics: &mut Diagnostics) -> Result<()> {
        let mut load = Load::read(source, setup, diagnostics)?;
        let mut method = PhaseMethod::new("Load the device", "Load", &load.iteration);
        method.model = Some(load.export_model(&self.model));
        method.device = load.export_device(&self.model, &self.device);
        self.absorb(&load.iteration)?;
        self.methods.push(method);
        Ok(())
    }

    fn ac_load(&mut self, source: &DeviceSource, setup: &Setup, diagnostics: &mut Diagnostics) -> Result<()> {
        let mut ac = AcLoad::read(source, setup, diagnostics)?;
        let mut method = PhaseMethod::new("Load the device for AC analysis", "AcLoad", &ac.iteration);
        method.model = Some(ac.export_model(&self.model));
        method.device = ac.export_device(&self.model, &self.device);
        self.absorb(&ac.iteration)?;
        self.methods.push(method);
        Ok(())
    }

    fn pz_load(&mut self, source: &DeviceSource, setup: &Setup, diagnostics: &mut Diagnostics) -> Result<()> {
        let mut pz = PzLoad::read(source, setup, diagnostics)?;
        let mut method = PhaseMethod::new("Load the device for AC analysis", "AcLoad", &pz.iteration);
        method.model = Some(pz.export_model(&self.model));
        method.device = pz.export_device(&self.model, &self.device);
        self.absorb(&pz.iteration)?;
        self.methods.push(method);
        Ok(())
    }

    fn truncate(&mut self, source: &DeviceSource, setup: &Setup, diagnostics: &mut Diagnostics) -> Result<()> {
        let mut trunc = Truncate::read(source, setup, diagnostics)?;
        let mut method = PhaseMethod::new("Truncate the timestep", "Truncate", &trunc.iteration);
        method.signature = format!(
            "public override void Truncate(Circuit ckt, ref double {})",
            trunc.timestep
        );
        method
            .params
            .push((trunc.timestep.clone(), "The timestep".to_string()));
        method.device = trunc.export_device(&self.model, &self.device);
        self.absorb(&trunc.iteration)?;
        self.methods.push(method);
        Ok(())
    }

    /// Merge the shared variables and the unresolved fields of a phase.
    fn absorb(&mut self, iteration: &DeviceIteration) -> Result<()> {
        for (name, ty) in &iteration.variables.shared {
            match self.shared.get(name) {
                Some(existing) if existing != ty => {
                    return Err(TranslateError::SharedVariableConflict {
                        name: name.clone(),
                        first: existing.target_name().to_string(),
                        second: ty.target_name().to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    self.shared.insert(name.clone(), *ty);
                }
            }
        }
        self.model_extra.extend(iteration.model_extra.iter().cloned());
        self.device_extra.extend(iteration.device_extra.iter().cloned());
        Ok(())
    }

    fn apply_defaults(&mut self, setup: &Setup) {
        for (defaults, accessors) in [
            (&setup.model_defaults, &mut self.model),
            (&setup.device_defaults, &mut self.device),
        ] {
            for (field, value) in defaults {
                if !accessors.apply_default(field, value) {
                    debug!(field = field.as_str(), "default for a field without parameter");
                }
            }
        }
    }

    /// Drop the extras that turned out to be known and report the rest.
    fn settle_extras(&mut self, setup: Option<&Setup>, diagnostics: &mut Diagnostics) {
        let device = &self.device;
        let nodes = &self.nodes;
        let constants = &self.constants;
        let states = self.states_variable.as_deref();
        self.device_extra.retain(|v| {
            !device.variables.contains(v)
                && !nodes.contains(v)
                && !constants.contains_key(v)
                && states != Some(v.as_str())
                && !setup.is_some_and(|s| s.matrix.contains_key(v))
        });

        let model = &self.model;
        let shared = &self.shared;
        self.model_extra
            .retain(|v| !model.variables.contains(v) && !shared.contains_key(v));

        for name in &self.model_extra {
            diagnostics.push(Diagnostic::UnresolvedReference {
                scope: "model",
                name: name.clone(),
            });
        }
        for name in &self.device_extra {
            diagnostics.push(Diagnostic::UnresolvedReference {
                scope: "device",
                name: name.clone(),
            });
        }
    }

    pub fn render(&self, wrap_column: usize) -> Translation {
        Translation {
            name: self.name.clone(),
            model: self.render_model(wrap_column),
            device: self.render_device(wrap_column),
        }
    }

    fn render_model(&self, wrap_column: usize) -> String {
        let mut w = CodeWriter::new(wrap_column);
        open_class(&mut w, &format!("public class {}Model : CircuitModel", self.name));

        section(&mut w, "Parameters", parameter_lines(&self.model));
        section(
            &mut w,
            "Shared parameters",
            self.shared
                .iter()
                .map(|(name, ty)| format!("public {} {} {{ get; private set; }}", ty.target_name(), name)),
        );
        section(
            &mut w,
            "Extra variables",
            self.model_extra
                .iter()
                .map(|v| format!("public double {} {{ get; private set; }}", v)),
        );

        w.blank();
        summary(&mut w, "Constructor", &[("name", "The name of the model")]);
        w.line(&format!("public {}Model(string name) : base(name)", self.name))
            .line("{")
            .line("}");

        for method in &self.methods {
            if let Some(code) = method.model.as_deref().filter(|c| !c.trim().is_empty()) {
                write_method(&mut w, method, code, &method.model_locals, &[]);
            }
        }
        close_class(&mut w);
        w.finish()
    }

    fn render_device(&self, wrap_column: usize) -> String {
        let mut w = CodeWriter::new(wrap_column);
        open_class(&mut w, &format!("public class {} : CircuitComponent", self.name));

        summary(&mut w, "Gets or sets the device model", &[]);
        w.line(&format!("public {}Model Model {{ get; set; }}", self.name));

        section(&mut w, "Parameters", parameter_lines(&self.device));
        section(
            &mut w,
            "Extra variables",
            self.device_extra
                .iter()
                .map(|v| format!("public double {} {{ get; private set; }}", v)),
        );

        let known = |v: &String| self.device.variables.contains(v) || self.device_extra.contains(v);
        let integers = self
            .nodes
            .iter()
            .chain(self.states_variable.as_ref())
            .filter(|v| !known(*v))
            .map(|v| format!("public int {} {{ get; private set; }}", v));
        section(&mut w, "Nodes and states", integers);
        section(
            &mut w,
            "Constants",
            self.constants
                .iter()
                .map(|(name, offset)| format!("private const int {} = {};", name, offset)),
        );

        w.blank();
        summary(&mut w, "Constructor", &[("name", "The name of the device")]);
        w.line(&format!(
            "public {}(string name) : base(name, {})",
            self.name,
            self.pins.len()
        ))
        .line("{")
        .line("}");

        w.blank();
        summary(&mut w, "Get the model", &[]);
        w.line("public override CircuitModel GetModel() => Model;");

        for method in &self.methods {
            write_method(&mut w, method, &method.device, &method.device_locals, &method.device_head);
        }
        close_class(&mut w);
        w.finish()
    }
}

fn parameter_lines(accessors: &ParameterAccessors) -> Vec<String> {
    accessors
        .declarations
        .values()
        .chain(&accessors.methods)
        .map(Declaration::render)
        .collect()
}

fn open_class(w: &mut CodeWriter, header: &str) {
    w.write_all(USINGS)
        .blank()
        .line(&format!("namespace {}", NAMESPACE))
        .line("{")
        .line(header)
        .line("{");
}

fn close_class(w: &mut CodeWriter) {
    w.line("}").line("}");
}

fn summary(w: &mut CodeWriter, text: &str, params: &[(&str, &str)]) {
    w.line("/// <summary>")
        .line(&format!("/// {}", text))
        .line("/// </summary>");
    for (name, description) in params {
        w.line(&format!("/// <param name=\"{}\">{}</param>", name, description));
    }
}

/// A documented group of members; nothing is written for an empty group.
fn section<I>(w: &mut CodeWriter, title: &str, members: I)
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut members = members.into_iter().peekable();
    if members.peek().is_none() {
        return;
    }
    w.blank();
    summary(w, title, &[]);
    w.write_all(members);
}

fn write_method(
    w: &mut CodeWriter,
    method: &PhaseMethod,
    code: &str,
    locals: &IndexMap<String, LocalType>,
    head: &[String],
) {
    let params: Vec<(&str, &str)> = method
        .params
        .iter()
        .map(|(name, description)| (name.as_str(), description.as_str()))
        .collect();
    w.blank();
    summary(w, method.summary, &params);
    w.line(&method.signature).line("{");

    for line in prelude(code) {
        w.line(line);
    }
    for (name, ty) in locals {
        w.line(&format!("{} {};", ty.target_name(), name));
    }
    if !head.is_empty() {
        w.blank();
        for line in head {
            w.line(line);
        }
    }
    if !code.trim().is_empty() {
        w.blank();
        w.write(code);
    }
    w.line("}");
}

/// Local aliases of the simulator state used by a method body.
fn prelude(code: &str) -> Vec<&'static str> {
    let tokens = Tokens::code(code);
    let used = |name: &str| {
        tokens
            .iter()
            .enumerate()
            .any(|(i, t)| t.is(name) && !is_member_access(&tokens, i))
    };
    let (rstate, cstate) = (used("rstate"), used("cstate"));

    let mut lines = Vec::new();
    if used("state") || rstate || cstate {
        lines.push("var state = ckt.State;");
    }
    if rstate {
        lines.push("var rstate = state.Real;");
    }
    if cstate {
        lines.push("var cstate = state.Complex;");
    }
    if used("method") {
        lines.push("var method = ckt.Method;");
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iteration(shared_type: &str) -> DeviceIteration {
        let method = format!(
            "void f(CKTcircuit *ckt){{ {} vt; double x; for(;m!=NULL;m=m->next){{ vt = 1; for(h=m->first;h!=NULL;h=h->next){{ x = vt; }} }} }}",
            shared_type
        );
        DeviceIteration::read(&method, "f", &mut Diagnostics::new()).unwrap()
    }

    fn empty_generator() -> ClassGenerator {
        ClassGenerator::new(
            "DIO".to_string(),
            ParameterAccessors::default(),
            ParameterAccessors::default(),
        )
    }

    #[test]
    fn test_shared_variable_conflict() {
        let mut generator = empty_generator();
        generator.absorb(&iteration("double")).unwrap();
        generator.absorb(&iteration("double")).unwrap();
        assert_eq!(generator.shared.get("vt"), Some(&LocalType::Real));

        let err = generator.absorb(&iteration("int")).unwrap_err();
        assert!(matches!(err, TranslateError::SharedVariableConflict { name, .. } if name == "vt"));
    }

    #[test]
    fn test_prelude() {
        assert_eq!(
            prelude("rstate.Rhs[a] += 1;\nif (method != null)\n{\n}"),
            vec!["var state = ckt.State;", "var rstate = state.Real;", "var method = ckt.Method;"]
        );
        assert_eq!(prelude("cstate.Matrix[a, a] += g;"), vec![
            "var state = ckt.State;",
            "var cstate = state.Complex;"
        ]);
        assert!(prelude("x = ckt.State.Temperature;").is_empty());
    }

    #[test]
    fn test_render_skeleton() {
        let mut generator = empty_generator();
        generator.shared.insert("vt".to_string(), LocalType::Real);
        generator.pins = vec!["DIOposNode".to_string(), "DIOnegNode".to_string()];
        generator.nodes = generator.pins.iter().cloned().collect();
        generator.states_variable = Some("DIOstate".to_string());
        generator.constants.insert("DIOvoltage".to_string(), 0);

        let translation = generator.render(120);
        assert_eq!(translation.model_file_name(), "DIOModel.cs");
        assert!(translation.model.contains("    public class DIOModel : CircuitModel\n"));
        assert!(translation.model.contains("        public double vt { get; private set; }\n"));
        assert!(translation.model.contains("public DIOModel(string name) : base(name)"));

        assert!(translation.device.contains("public DIOModel Model { get; set; }"));
        assert!(translation.device.contains("public int DIOposNode { get; private set; }"));
        assert!(translation.device.contains("public int DIOstate { get; private set; }"));
        assert!(translation.device.contains("private const int DIOvoltage = 0;"));
        assert!(translation.device.contains("public DIO(string name) : base(name, 2)"));
        assert!(translation.device.ends_with("    }\n}\n"));
    }

    #[test]
    fn test_write_to_folder() {
        let dir = tempfile::tempdir().unwrap();
        let translation = Translation {
            name: "DIO".to_string(),
            model: "model".to_string(),
            device: "device".to_string(),
        };
        let written = translation.write_to(&dir.path().join("out")).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "model");
        assert_eq!(fs::read_to_string(dir.path().join("out").join("DIO.cs")).unwrap(), "device");
    }
}
