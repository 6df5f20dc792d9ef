//! Accessor synthesis.
//!
//! The `param`/`ask` entry points of a device are big `switch` statements on
//! the parameter id. For every id the setter body and the getter body are
//! classified independently into a [`SetterShape`] and a [`GetterShape`];
//! the pair then decides which declaration is generated:
//!
//! | setter               | getter        | declaration                     |
//! |----------------------|---------------|---------------------------------|
//! | default with given   | default, same | flagged `Parameter` property    |
//! | default              | default, same | plain auto-property             |
//! | any (arbitrary)      | any (arbitrary), common field | custom get/set  |
//! | default with given   | none          | flagged `Parameter` property    |
//! | default              | none          | plain auto-property             |
//! | arbitrary            | none          | free `SetXxx` method            |
//! | none                 | default       | read-only auto-property         |
//! | none                 | arbitrary     | free `GetXxx` method            |

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use super::catalog::{ParameterDescriptor, ParameterTable};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{Result, TranslateError};
use crate::scan::delimiter::remove_comments;
use crate::scan::format::format;
use crate::scan::pattern::{is_member_access, replace_all, Match, Pattern, Tokens};
use crate::scan::switch::{extract_method_parameters, extract_switch_cases};
use crate::source::{DeviceSource, EntryPointKind, ParamType};

/// Members of `IFvalue` holding a scalar.
const VALUE_TAGS: [&str; 3] = ["rValue", "iValue", "sValue"];

/// Statements ending a case body.
const TERMINATORS: [&str; 2] = ["return ( OK ) ;", "break ;"];

/// One accessor entry point: its switch cases and the names it binds.
#[derive(Debug, Clone)]
pub struct AccessorSource {
    /// Name of the entry point
    pub method: String,
    /// Case bodies keyed by parameter id
    pub cases: IndexMap<String, String>,
    /// Instance (or model) pointer cast from the generic argument
    pub here: String,
    /// `IFvalue *` argument
    pub value: String,
    /// `CKTcircuit *` argument, if the entry point takes one first
    pub circuit: Option<String>,
}

impl AccessorSource {
    /// Parse a setter (`param(param, value, inst, select)`).
    pub fn setter(code: &str, method: &str) -> Result<Self> {
        Self::parse(code, method, 2, 1)
    }

    /// Parse a getter (`ask(ckt, inst, which, value, select)`).
    pub fn getter(code: &str, method: &str) -> Result<Self> {
        let mut source = Self::parse(code, method, 1, 3)?;
        source.circuit = extract_method_parameters(code, Some(method)).into_iter().next();
        Ok(source)
    }

    fn parse(code: &str, method: &str, instance_index: usize, value_index: usize) -> Result<Self> {
        let params = extract_method_parameters(code, Some(method));
        let instance = params
            .get(instance_index)
            .ok_or_else(|| TranslateError::missing_parameter(method, instance_index))?;
        let value = params
            .get(value_index)
            .ok_or_else(|| TranslateError::missing_parameter(method, value_index))?;

        // DIOinstance *here = (DIOinstance *) inst;
        let binding = Pattern::new(&format!("$ty * $here = ( $ty * ) {}", instance));
        let here = binding
            .find(&Tokens::code(code), 0)
            .map(|m| m.get("here").to_string())
            .ok_or_else(|| TranslateError::MissingHereBinding {
                method: method.to_string(),
            })?;

        Ok(Self {
            method: method.to_string(),
            cases: extract_switch_cases(code, 0)?,
            here,
            value: value.clone(),
            circuit: None,
        })
    }

    /// Comment-free, trimmed case body; `None` for unknown ids and empty
    /// fallthrough labels.
    fn body(&self, id: &str) -> Option<String> {
        self.cases
            .get(id)
            .map(|body| remove_comments(body).trim().to_string())
            .filter(|body| !body.is_empty())
    }

    /// Check `pattern` against the whole body with any accepted terminator.
    fn exact(&self, body: &str, pattern: &str) -> Option<Match> {
        let tokens = Tokens::code(body);
        TERMINATORS.iter().find_map(|term| {
            let full = format!("{} {}", pattern, term);
            Pattern::new(&full)
                .matches_exactly(&tokens)
                .filter(|m| VALUE_TAGS.contains(&m.get("tag")))
        })
    }

    /// Remove the `here->` and `value->xValue` qualifiers and the final
    /// `break;`/`return(OK);`.
    fn strip_qualifiers(&self, body: &str) -> String {
        let code = replace_all(body, &Pattern::new(&format!("{} ->", self.here)), |m, tokens| {
            (!is_member_access(tokens, m.first)).then(String::new)
        });
        let code = replace_all(&code, &Pattern::new(&format!("{} -> $tag", self.value)), |m, _| {
            VALUE_TAGS.contains(&m.get("tag")).then(|| "value".to_string())
        });
        format(drop_terminators(&code))
    }
}

/// Strip trailing `break;` and `return(OK);` statements.
fn drop_terminators(code: &str) -> &str {
    let tokens = Tokens::code(code);
    let is = |k: usize, text: &str| tokens.get(k).is_some_and(|t| t.text.eq_ignore_ascii_case(text));
    let mut end = tokens.len();
    loop {
        if end >= 2 && is(end - 2, "break") && is(end - 1, ";") {
            end -= 2;
        } else if end >= 5
            && is(end - 5, "return")
            && is(end - 4, "(")
            && is(end - 3, "OK")
            && is(end - 2, ")")
            && is(end - 1, ";")
        {
            end -= 5;
        } else {
            break;
        }
    }
    match tokens.get(end) {
        Some(tok) => code[..tok.start].trim_end(),
        None => code.trim_end(),
    }
}

/// Fields touched by an arbitrary setter, with the body rewritten so that
/// `here->x = v; here->xGiven = TRUE;` reads `x.Set(v);`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbitrarySet {
    pub fields: IndexSet<String>,
    /// Given flag correlations found in the body (given -> field)
    pub givens: IndexMap<String, String>,
    pub body: String,
}

/// Classification of a setter case body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetterShape {
    /// `here->F = value->xValue; here->FGiven = TRUE; return(OK);`
    DefaultWithGiven { field: String, given: String },
    /// `here->F = value->xValue; return(OK);`
    Default { field: String },
    /// Anything else touching at least one field
    Arbitrary(ArbitrarySet),
    Unrecognized,
}

/// Classification of a getter case body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetterShape {
    /// `value->xValue = here->F; return(OK);`
    Default { field: String },
    /// Reads of `here->F` assigned somewhere
    Arbitrary { fields: IndexSet<String> },
    Unrecognized,
}

/// Classify a setter body.
pub fn classify_setter(
    source: &AccessorSource,
    body: &str,
    known_givens: &IndexMap<String, String>,
) -> SetterShape {
    let (here, value) = (&source.here, &source.value);
    let with_given = format!(
        "{here} -> $field = {value} -> $tag ; {here} -> $given = TRUE ;",
        here = here,
        value = value
    );
    if let Some(m) = source.exact(body, &with_given) {
        if m.get("given").ends_with("Given") {
            return SetterShape::DefaultWithGiven {
                field: m.get("field").to_string(),
                given: m.get("given").to_string(),
            };
        }
    }

    let plain = format!("{} -> $field = {} -> $tag ;", here, value);
    if let Some(m) = source.exact(body, &plain) {
        return SetterShape::Default {
            field: m.get("field").to_string(),
        };
    }

    match arbitrary_set(source, body, known_givens) {
        Some(set) => SetterShape::Arbitrary(set),
        None => SetterShape::Unrecognized,
    }
}

/// Collect every field a setter assigns.
pub fn arbitrary_set(
    source: &AccessorSource,
    body: &str,
    known_givens: &IndexMap<String, String>,
) -> Option<ArbitrarySet> {
    let here = &source.here;
    let paired = Pattern::new(&format!(
        "{here} -> $var = ...value ; {here} -> $given = TRUE ;",
        here = here
    ));
    let mut fields = IndexSet::new();
    let mut givens = IndexMap::new();

    let rewritten = replace_all(body, &paired, |m, tokens| {
        if is_member_access(tokens, m.first) || !m.get("given").ends_with("Given") {
            return None;
        }
        fields.insert(m.get("var").to_string());
        givens
            .entry(m.get("given").to_string())
            .or_insert_with(|| m.get("var").to_string());
        Some(format!("{}.Set({});", m.get("var"), m.get("value")))
    });

    let loose = Pattern::new(&format!("{} -> $var = ...value ;", here));
    let tokens = Tokens::code(&rewritten);
    for m in loose.find_all(&tokens) {
        let var = m.get("var");
        if is_member_access(&tokens, m.first) || known_givens.contains_key(var) || givens.contains_key(var) {
            continue;
        }
        fields.insert(var.to_string());
    }

    (!fields.is_empty()).then_some(ArbitrarySet {
        fields,
        givens,
        body: rewritten,
    })
}

/// Classify a getter body.
pub fn classify_getter(source: &AccessorSource, body: &str) -> GetterShape {
    let pattern = format!("{} -> $tag = {} -> $field ;", source.value, source.here);
    if let Some(m) = source.exact(body, &pattern) {
        return GetterShape::Default {
            field: m.get("field").to_string(),
        };
    }
    let fields = arbitrary_get(source, body);
    if fields.is_empty() {
        GetterShape::Unrecognized
    } else {
        GetterShape::Arbitrary { fields }
    }
}

/// Fields read on the right-hand side of an assignment.
pub fn arbitrary_get(source: &AccessorSource, body: &str) -> IndexSet<String> {
    let tokens = Tokens::code(body);
    let mut fields = IndexSet::new();
    let mut assigned = false;

    for (i, tok) in tokens.iter().enumerate() {
        match tok.text.as_str() {
            ";" | "{" | "}" => assigned = false,
            "=" => assigned = true,
            _ => {}
        }
        if !assigned || !tok.is(&source.here) || is_member_access(&tokens, i) {
            continue;
        }
        let reads_field = tokens.get(i + 1).is_some_and(|t| t.is("->"))
            && tokens.get(i + 2).is_some_and(|t| t.is_ident());
        let terminated = tokens.iter().skip(i).any(|t| t.is(";"));
        if reads_field && terminated {
            if let Some(field) = tokens.get(i + 2) {
                fields.insert(field.text.clone());
            }
        }
    }
    fields
}

/// What kind of member a parameter id turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationKind {
    /// `Parameter` wrapper tracking whether the value was given
    Flagged { field: String },
    /// Auto-property
    Plain { field: String, read_only: bool },
    /// Property named after the id with hand-written accessors
    Custom {
        field: String,
        getter: String,
        setter: String,
        flagged: bool,
    },
    /// Setter method without a backing field
    FreeSetter { name: String, body: String },
    /// Getter method without a backing field
    FreeGetter { name: String, body: String },
}

/// A generated member for one parameter id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub id: String,
    pub names: Vec<String>,
    pub description: String,
    pub ty: ParamType,
    pub kind: DeclarationKind,
    /// Default value literal, for flagged fields
    pub default: Option<String>,
}

impl Declaration {
    fn new(descriptor: &ParameterDescriptor, kind: DeclarationKind) -> Self {
        Self {
            id: descriptor.id.clone(),
            names: descriptor.names.iter().cloned().collect(),
            description: descriptor.description.clone(),
            ty: descriptor.ty,
            kind,
            default: None,
        }
    }

    /// Field the declaration stores its value in.
    pub fn field(&self) -> Option<&str> {
        match &self.kind {
            DeclarationKind::Flagged { field }
            | DeclarationKind::Plain { field, .. }
            | DeclarationKind::Custom { field, .. } => Some(field),
            DeclarationKind::FreeSetter { .. } | DeclarationKind::FreeGetter { .. } => None,
        }
    }

    /// Whether the field is backed by a `Parameter` wrapper.
    pub fn is_flagged(&self) -> bool {
        matches!(
            self.kind,
            DeclarationKind::Flagged { .. } | DeclarationKind::Custom { flagged: true, .. }
        )
    }

    pub fn attributes(&self) -> String {
        let mut attributes: Vec<String> = self
            .names
            .iter()
            .map(|n| format!("SpiceName(\"{}\")", n))
            .collect();
        attributes.push(format!("SpiceInfo(\"{}\")", self.description));
        format!("[{}]", attributes.join(", "))
    }

    /// Render the declaration as unindented lines.
    pub fn render(&self) -> String {
        let ty = self.ty.target_name();
        let mut lines = vec![self.attributes()];

        match &self.kind {
            DeclarationKind::Flagged { field } => {
                lines.push(parameter_property(field, self.ty, self.default.as_deref()));
            }
            DeclarationKind::Plain { field, read_only } => {
                let setter = if *read_only { "private set;" } else { "set;" };
                lines.push(format!("public {} {} {{ get; {} }}", ty, field, setter));
            }
            DeclarationKind::Custom {
                field,
                getter,
                setter,
                flagged,
            } => {
                lines.push(format!("public {} {}", ty, self.id));
                lines.push("{".to_string());
                push_body(&mut lines, "get", getter, true);
                push_body(&mut lines, "set", setter, false);
                lines.push("}".to_string());
                if *flagged {
                    lines.push(parameter_property(field, self.ty, self.default.as_deref()));
                } else {
                    lines.push(format!("private {} {};", ty, field));
                }
            }
            DeclarationKind::FreeSetter { name, body } => {
                push_body(&mut lines, &format!("public void {}({} value)", name, ty), body, false);
            }
            DeclarationKind::FreeGetter { name, body } => {
                push_body(&mut lines, &format!("public {} {}(Circuit ckt)", ty, name), body, true);
            }
        }
        lines.join("\n")
    }
}

fn parameter_property(field: &str, ty: ParamType, default: Option<&str>) -> String {
    let value = default.unwrap_or("");
    if ty.is_numeric_scalar() {
        format!("public Parameter {} {{ get; }} = new Parameter({});", field, value)
    } else {
        let t = ty.target_name();
        format!(
            "public Parameter<{t}> {field} {{ get; }} = new Parameter<{t}>({value});",
            t = t,
            field = field,
            value = value
        )
    }
}

/// Push `head { body }`, or `head => expr;` when the body is one statement.
fn push_body(lines: &mut Vec<String>, head: &str, body: &str, returns: bool) {
    match expression_body(body, returns) {
        Some(expr) => lines.push(format!("{} => {};", head, expr)),
        None => {
            lines.push(head.to_string());
            lines.push("{".to_string());
            lines.extend(body.lines().map(str::to_string));
            lines.push("}".to_string());
        }
    }
}

/// The expression of a single-statement body. With `returns` set the
/// statement must be a `return`.
fn expression_body(body: &str, returns: bool) -> Option<String> {
    let tokens = Tokens::code(body);
    let n = tokens.len();
    if n < 2 || !tokens.get(n - 1)?.is(";") {
        return None;
    }
    if tokens.iter().take(n - 1).any(|t| t.is(";") || t.is("{") || t.is("}")) {
        return None;
    }
    let first = tokens.get(0)?;
    if matches!(first.text.as_str(), "if" | "for" | "while" | "switch" | "do" | "else") {
        return None;
    }
    let start = match (first.is("return"), returns) {
        (true, true) => 1,
        (false, false) => 0,
        _ => return None,
    };
    let expr = tokens.slice(start, n - 1);
    (!expr.is_empty()).then(|| expr.to_string())
}

/// Turn the `value = expr;` statements of a getter into `return expr;`.
fn returns_from_value(body: &str) -> String {
    replace_all(body, &Pattern::new("value = ...expr ;"), |m, tokens| {
        if is_member_access(tokens, m.first) {
            return None;
        }
        Some(format!("return {};", m.get("expr")))
    })
}

/// Outcome of combining both shapes of one id.
enum Resolution {
    Declared(Declaration),
    Skipped(Diagnostic),
}

/// All declarations generated for one scope (instance or model).
#[derive(Debug, Clone, Default)]
pub struct ParameterAccessors {
    /// Declarations with a field, keyed by field name
    pub declarations: IndexMap<String, Declaration>,
    /// Free accessor methods
    pub methods: Vec<Declaration>,
    /// Every field owned by a declaration
    pub variables: IndexSet<String>,
    /// Given flag name -> value field name
    pub given: IndexMap<String, String>,
    /// Circuit argument name of the getter
    pub circuit: Option<String>,
}

impl ParameterAccessors {
    /// Synthesize the accessors of one scope from a device's entry points.
    pub fn synthesize(
        source: &DeviceSource,
        table: &ParameterTable,
        setter: EntryPointKind,
        getter: EntryPointKind,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let set = match source.entry_point_name(setter) {
            Some(name) => Some(AccessorSource::setter(&source.get_entry_point(setter)?, name)?),
            None => None,
        };
        let get = match source.entry_point_name(getter) {
            Some(name) => Some(AccessorSource::getter(&source.get_entry_point(getter)?, name)?),
            None => None,
        };
        Self::from_sources(set.as_ref(), get.as_ref(), table, diagnostics)
    }

    /// Build the declarations from parsed accessor entry points.
    pub fn from_sources(
        set: Option<&AccessorSource>,
        get: Option<&AccessorSource>,
        table: &ParameterTable,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        let mut accessors = Self {
            circuit: get.and_then(|g| g.circuit.clone()),
            ..Self::default()
        };

        let mut ids: IndexSet<String> = IndexSet::new();
        for source in [set, get].into_iter().flatten() {
            ids.extend(source.cases.keys().cloned());
        }

        for id in ids {
            let set_body = set.and_then(|s| s.body(&id).map(|b| (s, b)));
            let get_body = get.and_then(|g| g.body(&id).map(|b| (g, b)));
            if set_body.is_none() && get_body.is_none() {
                debug!(id = id.as_str(), "fallthrough label without own body");
                continue;
            }
            let Some(descriptor) = table.get(&id) else {
                diagnostics.push(Diagnostic::UnresolvedParameterId { id });
                continue;
            };

            match accessors.resolve(descriptor, set_body, get_body)? {
                Resolution::Declared(declaration) => accessors.insert(declaration),
                Resolution::Skipped(diagnostic) => diagnostics.push(diagnostic),
            }
        }

        debug!(
            fields = accessors.declarations.len(),
            methods = accessors.methods.len(),
            "synthesized accessors"
        );
        Ok(accessors)
    }

    fn resolve(
        &mut self,
        descriptor: &ParameterDescriptor,
        set: Option<(&AccessorSource, String)>,
        get: Option<(&AccessorSource, String)>,
    ) -> Result<Resolution> {
        let set_shape = set
            .as_ref()
            .map(|(source, body)| classify_setter(source, body, &self.given));
        let get_shape = get.as_ref().map(|(source, body)| classify_getter(source, body));
        trace!(id = descriptor.id.as_str(), ?set_shape, ?get_shape, "classified accessors");

        let kind = match (set_shape, get_shape) {
            (
                Some(SetterShape::DefaultWithGiven { field, given }),
                Some(GetterShape::Default { field: read }),
            ) if field == read => {
                self.given.insert(given, field.clone());
                DeclarationKind::Flagged { field }
            }
            (Some(SetterShape::Default { field }), Some(GetterShape::Default { field: read }))
                if field == read =>
            {
                DeclarationKind::Plain {
                    field,
                    read_only: false,
                }
            }
            (Some(_), Some(_)) => {
                let (Some((setter, set_body)), Some((getter, get_body))) = (&set, &get) else {
                    return Err(TranslateError::InvalidDeclarationState {
                        id: descriptor.id.clone(),
                    });
                };
                let written = arbitrary_set(setter, set_body, &self.given);
                let read = arbitrary_get(getter, get_body);
                let common = written
                    .as_ref()
                    .and_then(|w| w.fields.iter().find(|f| read.contains(*f)).cloned());
                let (Some(written), Some(field)) = (written, common) else {
                    return Ok(Resolution::Skipped(Diagnostic::CouldNotProcessId {
                        id: descriptor.id.clone(),
                    }));
                };
                for (given, target) in &written.givens {
                    self.given.entry(given.clone()).or_insert_with(|| target.clone());
                }
                let flagged = self.given.values().any(|v| *v == field);
                DeclarationKind::Custom {
                    field,
                    getter: returns_from_value(&getter.strip_qualifiers(get_body)),
                    setter: setter.strip_qualifiers(&written.body),
                    flagged,
                }
            }
            (Some(SetterShape::DefaultWithGiven { field, given }), None) => {
                self.given.insert(given, field.clone());
                DeclarationKind::Flagged { field }
            }
            (Some(SetterShape::Default { field }), None) => DeclarationKind::Plain {
                field,
                read_only: false,
            },
            (Some(SetterShape::Arbitrary(written)), None) => {
                for (given, target) in &written.givens {
                    self.given.entry(given.clone()).or_insert_with(|| target.clone());
                }
                let body = match &set {
                    Some((setter, _)) => setter.strip_qualifiers(&written.body),
                    None => written.body,
                };
                DeclarationKind::FreeSetter {
                    name: format!("Set{}", descriptor.id),
                    body,
                }
            }
            (Some(SetterShape::Unrecognized), None) => {
                let body = match &set {
                    Some((setter, body)) => setter.strip_qualifiers(body),
                    None => String::new(),
                };
                DeclarationKind::FreeSetter {
                    name: format!("Set{}", descriptor.id),
                    body,
                }
            }
            (None, Some(GetterShape::Default { field })) => DeclarationKind::Plain {
                field,
                read_only: true,
            },
            (None, Some(GetterShape::Arbitrary { .. } | GetterShape::Unrecognized)) => {
                let body = match &get {
                    Some((getter, body)) => returns_from_value(&getter.strip_qualifiers(body)),
                    None => String::new(),
                };
                DeclarationKind::FreeGetter {
                    name: format!("Get{}", descriptor.id),
                    body,
                }
            }
            (None, None) => {
                return Err(TranslateError::InvalidDeclarationState {
                    id: descriptor.id.clone(),
                })
            }
        };

        Ok(Resolution::Declared(Declaration::new(descriptor, kind)))
    }

    fn insert(&mut self, declaration: Declaration) {
        let Some(field) = declaration.field().map(str::to_string) else {
            self.methods.push(declaration);
            return;
        };
        self.variables.insert(field.clone());
        match self.declarations.get_mut(&field) {
            // Another id for the same field only adds names
            Some(existing) => {
                for name in declaration.names {
                    if !existing.names.contains(&name) {
                        existing.names.push(name);
                    }
                }
            }
            None => {
                self.declarations.insert(field, declaration);
            }
        }
    }

    /// Whether a field is backed by a `Parameter` wrapper.
    pub fn is_flagged(&self, field: &str) -> bool {
        self.declarations.get(field).is_some_and(Declaration::is_flagged)
    }

    /// Set the default value of a flagged field. Returns `false` if the field
    /// is unknown or not flagged.
    pub fn apply_default(&mut self, field: &str, value: &str) -> bool {
        match self.declarations.get_mut(field) {
            Some(declaration) if declaration.is_flagged() => {
                declaration.default = Some(value.to_string());
                true
            }
            _ => false,
        }
    }

    /// Final rewrite of the free methods: SPICE state and solution accesses
    /// become simulator accesses and the device prefix is dropped from ids.
    pub fn update_methods(&mut self, device_name: &str, states: Option<&str>) {
        let circuit = self.circuit.clone().unwrap_or_else(|| "ckt".to_string());
        let prefix = format!("{}_", device_name);

        for declaration in &mut self.methods {
            let (DeclarationKind::FreeSetter { name, body } | DeclarationKind::FreeGetter { name, body }) =
                &mut declaration.kind
            else {
                continue;
            };

            let state = Pattern::new(&format!("* ( {} -> $slot + $node )", circuit));
            let mut code = replace_all(body, &state, |m, _| {
                let slot = m.get("slot").strip_prefix("CKTstate")?;
                if slot.is_empty() || !slot.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                let base = states.map(|s| format!("{} + ", s)).unwrap_or_default();
                Some(format!("ckt.State.States[{}][{}{}]", slot, base, m.get("node")))
            });
            code = replace_all(
                &code,
                &Pattern::new(&format!("* ( {} -> CKTrhsOld + $node )", circuit)),
                |m, _| Some(format!("ckt.State.Real.Solution[{}]", m.get("node"))),
            );

            *body = strip_identifier_prefix(&code, &prefix);
            *name = strip_identifier_prefix(name, &prefix);
        }
    }
}

/// Remove a case-insensitive prefix from every identifier that carries it.
fn strip_identifier_prefix(code: &str, prefix: &str) -> String {
    let prefix = prefix.to_lowercase();
    let tokens = Tokens::code(code);
    let mut result = String::with_capacity(code.len());
    let mut copied = 0;

    for tok in tokens.iter().filter(|t| t.is_ident()) {
        // Method names keep their Get/Set head
        let (head, rest) = match tok.text.strip_prefix("Get").or_else(|| tok.text.strip_prefix("Set")) {
            Some(rest) if rest.to_lowercase().starts_with(&prefix) => (&tok.text[..3], rest),
            _ => ("", tok.text.as_str()),
        };
        if rest.len() > prefix.len() && rest.to_lowercase().starts_with(&prefix) {
            result.push_str(&code[copied..tok.start]);
            result.push_str(head);
            result.push_str(&rest[prefix.len()..]);
            copied = tok.end;
        }
    }
    result.push_str(&code[copied..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAM: &str = r#"
int
DIOparam(param,value,inst,select)
    int param;
    IFvalue *value;
    GENinstance *inst;
    IFvalue *select;
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
        case DIO_IC:
            here->DIOinitCond = value->rValue;
            here->DIOinitCondGiven = TRUE;
            here->DIOicSet = 1;
            break;
        case DIO_TEMP:
            here->DIOtemp = value->rValue + CONSTCtoK;
            here->DIOtempGiven = TRUE;
            break;
        case DIO_UNKNOWN:
            here->DIOx = value->rValue;
            break;
        case DIO_SENS:
            if (value->iValue) here->DIOsenParmNo = 1;
            break;
        default:
            return(E_BADPARM);
    }
    return(OK);
}
"#;

    const ASK: &str = r#"
int
DIOask (CKTcircuit *ckt, GENinstance *inst, int which, IFvalue *value, IFvalue *select)
{
    DIOinstance *here = (DIOinstance*)inst;
    switch (which) {
        case DIO_AREA:
            value->rValue = here->DIOarea;
            return(OK);
        case DIO_IC:
            value->rValue = here->DIOinitCond;
            return(OK);
        case DIO_TEMP:
            value->rValue = here->DIOtemp - CONSTCtoK;
            return(OK);
        case DIO_CURRENT:
            value->rValue = *(ckt->CKTstate0 + here->DIOcurrent);
            return(OK);
        case DIO_VOLTAGE:
            value->rValue = here->DIOvoltage;
            return(OK);
        default:
            return(E_BADPARM);
    }
}
"#;

    const TABLE: &str = r#"IFparm DIOpTable[] = {
    IOPU("area", DIO_AREA, IF_REAL, "Area factor"),
    IOPU("off", DIO_OFF, IF_FLAG, "Initially off"),
    IOPAU("ic", DIO_IC, IF_REAL, "Initial device voltage"),
    IOPU("temp", DIO_TEMP, IF_REAL, "Instance temperature"),
    IP("sens_area", DIO_SENS, IF_FLAG, "flag to request sensitivity"),
    OP("c", DIO_CURRENT, IF_REAL, "Diode current"),
    OP("vd", DIO_VOLTAGE, IF_REAL, "Diode voltage"),
};"#;

    fn accessors() -> (ParameterAccessors, Diagnostics) {
        let mut diags = Diagnostics::new();
        let table = ParameterTable::parse(TABLE, &mut diags).unwrap();
        let set = AccessorSource::setter(PARAM, "DIOparam").unwrap();
        let get = AccessorSource::getter(ASK, "DIOask").unwrap();
        let accessors = ParameterAccessors::from_sources(Some(&set), Some(&get), &table, &mut diags).unwrap();
        (accessors, diags)
    }

    #[test]
    fn test_accessor_sources_bind_names() {
        let set = AccessorSource::setter(PARAM, "DIOparam").unwrap();
        assert_eq!(set.here, "here");
        assert_eq!(set.value, "value");
        assert_eq!(set.cases.len(), 6);

        let get = AccessorSource::getter(ASK, "DIOask").unwrap();
        assert_eq!(get.circuit.as_deref(), Some("ckt"));

        let unbound = "int f(a, b, c) { switch (a) { case X: break; } }";
        assert!(matches!(
            AccessorSource::setter(unbound, "f"),
            Err(TranslateError::MissingHereBinding { .. })
        ));
        assert!(matches!(
            AccessorSource::getter("int f(a, b) { }", "f"),
            Err(TranslateError::MissingMethodParameter { index: 3, .. })
        ));
    }

    #[test]
    fn test_default_set_with_given_and_default_get() {
        let set = AccessorSource::setter(PARAM, "DIOparam").unwrap();
        let shape = classify_setter(
            &set,
            "here->val = value->rValue; here->valGiven = TRUE; return(OK);",
            &IndexMap::new(),
        );
        assert_eq!(
            shape,
            SetterShape::DefaultWithGiven {
                field: "val".to_string(),
                given: "valGiven".to_string()
            }
        );

        let get = AccessorSource::getter(ASK, "DIOask").unwrap();
        let shape = classify_getter(&get, "value->rValue = here->val; break;");
        assert_eq!(shape, GetterShape::Default { field: "val".to_string() });

        let (accessors, _) = accessors();
        let area = &accessors.declarations["DIOarea"];
        assert_eq!(area.kind, DeclarationKind::Flagged { field: "DIOarea".to_string() });
        assert_eq!(accessors.given["DIOareaGiven"], "DIOarea");
        assert!(accessors.is_flagged("DIOarea"));
    }

    #[test]
    fn test_setter_only_and_getter_only() {
        let (accessors, _) = accessors();
        assert_eq!(
            accessors.declarations["DIOoff"].kind,
            DeclarationKind::Plain {
                field: "DIOoff".to_string(),
                read_only: false
            }
        );
        assert_eq!(
            accessors.declarations["DIOvoltage"].kind,
            DeclarationKind::Plain {
                field: "DIOvoltage".to_string(),
                read_only: true
            }
        );
        assert_eq!(
            accessors.declarations["DIOvoltage"].render(),
            "[SpiceName(\"vd\"), SpiceInfo(\"Diode voltage\")]\npublic double DIOvoltage { get; private set; }"
        );
    }

    #[test]
    fn test_custom_accessor_pair() {
        let (accessors, _) = accessors();
        let temp = &accessors.declarations["DIOtemp"];
        match &temp.kind {
            DeclarationKind::Custom {
                getter,
                setter,
                flagged,
                ..
            } => {
                assert_eq!(getter, "return DIOtemp - CONSTCtoK;");
                assert_eq!(setter, "DIOtemp.Set(value + CONSTCtoK);");
                assert!(*flagged);
            }
            other => panic!("unexpected declaration {:?}", other),
        }
        let rendered = temp.render();
        assert!(rendered.contains("public double DIO_TEMP\n{\nget => DIOtemp - CONSTCtoK;"));
        assert!(rendered.contains("set => DIOtemp.Set(value + CONSTCtoK);"));
        assert!(rendered.ends_with("public Parameter DIOtemp { get; } = new Parameter();"));

        let ic = &accessors.declarations["DIOinitCond"];
        assert!(matches!(ic.kind, DeclarationKind::Custom { flagged: true, .. }));
        assert_eq!(accessors.given["DIOinitCondGiven"], "DIOinitCond");
    }

    #[test]
    fn test_free_methods_and_diagnostics() {
        let (mut accessors, diags) = accessors();
        assert_eq!(
            diags.count(|d| matches!(d, Diagnostic::UnresolvedParameterId { id } if id == "DIO_UNKNOWN")),
            1
        );

        let names: Vec<String> = accessors
            .methods
            .iter()
            .map(|m| match &m.kind {
                DeclarationKind::FreeSetter { name, .. } | DeclarationKind::FreeGetter { name, .. } => {
                    name.clone()
                }
                _ => String::new(),
            })
            .collect();
        assert_eq!(names, vec!["SetDIO_SENS", "GetDIO_CURRENT"]);

        accessors.update_methods("DIO", Some("DIOstate"));
        let getter = accessors.methods[1].render();
        assert_eq!(
            getter,
            "[SpiceName(\"c\"), SpiceInfo(\"Diode current\")]\npublic double GetCURRENT(Circuit ckt) => ckt.State.States[0][DIOstate + DIOcurrent];"
        );
        let setter = accessors.methods[0].render();
        assert!(setter.contains("public void SetSENS(bool value)\n{\nif (value)"));
    }

    #[test]
    fn test_defaults_only_apply_to_flagged_fields() {
        let (mut accessors, _) = accessors();
        assert!(accessors.apply_default("DIOarea", "1.0"));
        assert!(!accessors.apply_default("DIOoff", "true"));
        assert!(!accessors.apply_default("nothing", "1"));
        assert!(accessors.declarations["DIOarea"]
            .render()
            .ends_with("public Parameter DIOarea { get; } = new Parameter(1.0);"));
    }

    #[test]
    fn test_drop_terminators() {
        assert_eq!(drop_terminators("x = 1; break;"), "x = 1;");
        assert_eq!(drop_terminators("x = 1;\nreturn (OK);"), "x = 1;");
        assert_eq!(drop_terminators("return(E_BADPARM);"), "return(E_BADPARM);");
    }
}
