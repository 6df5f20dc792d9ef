//! Parameter tables (`IFparm xxxPTable[] = { IOP(...), ... };`).

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::Result;
use crate::scan::delimiter::{extract_block, find_in_code, remove_comments};
use crate::scan::pattern::{Pattern, Tokens};
use crate::source::{DeviceSource, ParamType};

/// One parameter id of a table, with every name it is known by.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    /// Id token used in the `switch` of the accessor entry points
    pub id: String,
    /// Access macro (`IOP`, `IP`, `OP`, ...)
    pub access: String,
    /// Names the parameter is known by, first one first
    pub names: IndexSet<String>,
    pub ty: ParamType,
    pub description: String,
}

/// The descriptors of one scope, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ParameterTable {
    entries: IndexMap<String, ParameterDescriptor>,
}

impl ParameterTable {
    /// Parse a parameter table declaration.
    ///
    /// Entries with an unsupported type flag are skipped with a diagnostic.
    pub fn parse(declaration: &str, diagnostics: &mut Diagnostics) -> Result<Self> {
        let code = remove_comments(declaration);
        let Some(open) = find_in_code(&code, 0, b'{') else {
            return Ok(Self::default());
        };
        let body = extract_block(&code, open)?;
        let tokens = Tokens::code(body);
        let pattern = Pattern::new("$access ( ...name , @id , ...ty , ...desc )");

        let mut table = Self::default();
        for m in pattern.find_all(&tokens) {
            let name = unquote(m.get("name"));
            let flags = m.get("ty");
            let Some(ty) = flags.split('|').find_map(|f| ParamType::from_flag(f.trim())) else {
                diagnostics.push(Diagnostic::UnknownTypeFlag {
                    flag: flags.to_string(),
                    name,
                });
                continue;
            };

            let id = m.get("id").to_string();
            trace!(id = id.as_str(), name = name.as_str(), "parameter entry");
            table
                .entries
                .entry(id.clone())
                .or_insert_with(|| ParameterDescriptor {
                    id,
                    access: m.get("access").to_string(),
                    names: IndexSet::new(),
                    ty,
                    description: unquote(m.get("desc")),
                })
                .names
                .insert(name);
        }

        Ok(table)
    }

    pub fn get(&self, id: &str) -> Option<&ParameterDescriptor> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.entries.values()
    }
}

/// Instance and model parameter tables of a device.
#[derive(Debug, Clone, Default)]
pub struct ParameterCatalog {
    pub device: ParameterTable,
    pub model: ParameterTable,
}

impl ParameterCatalog {
    /// Read both parameter tables named in the device info structure.
    pub fn extract(source: &DeviceSource, diagnostics: &mut Diagnostics) -> Result<Self> {
        let device = source.get_variable("IFparm", Some(source.parameter_table()))?;
        let model = source.get_variable("IFparm", Some(source.model_parameter_table()))?;
        let catalog = Self {
            device: ParameterTable::parse(&device, diagnostics)?,
            model: ParameterTable::parse(&model, diagnostics)?,
        };
        debug!(
            device = catalog.device.len(),
            model = catalog.model.len(),
            "extracted parameter tables"
        );
        Ok(catalog)
    }
}

fn unquote(text: &str) -> String {
    let text = text.trim();
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
        .to_string()
}
