//! Device source set: the files of one SPICE3 device model.
//!
//! A [`DeviceSource`] is opened once per device. It reads the interface file,
//! resolves its conditional blocks, and decodes the `SPICEdev` info structure
//! into the device identity and the entry-point name table. Entry points and
//! variables are looked up on demand; each lookup reads the files again.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use super::conditional::resolve_conditionals;
use super::types::EntryPointKind;
use crate::error::{Result, TranslateError};
use crate::scan::delimiter::{match_delimiter, remove_comments};
use crate::scan::pattern::{Pattern, Tokens};

/// Where a device's source files live and how to read them.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Folder holding the device's `.c` and `.h` files
    pub folder: PathBuf,
    /// File holding the `SPICEdev` info structure (e.g. `dioitf.h`)
    pub interface_file: String,
    /// File holding the instance/model structures and state defines (e.g. `diodefs.h`)
    pub definitions_file: String,
    /// Symbols considered defined when resolving `#ifdef`/`#ifndef`
    pub defined: IndexSet<String>,
    /// File searched first for variables; defaults to `<device name>.c`
    pub device_file: Option<String>,
}

impl DeviceConfig {
    pub fn new(
        folder: impl Into<PathBuf>,
        interface_file: impl Into<String>,
        definitions_file: impl Into<String>,
    ) -> Self {
        Self {
            folder: folder.into(),
            interface_file: interface_file.into(),
            definitions_file: definitions_file.into(),
            defined: IndexSet::new(),
            device_file: None,
        }
    }

    /// Add a defined symbol.
    pub fn define(mut self, symbol: impl Into<String>) -> Self {
        self.defined.insert(symbol.into());
        self
    }

    /// Search this file first when looking up variables.
    pub fn with_device_file(mut self, file: impl Into<String>) -> Self {
        self.device_file = Some(file.into());
        self
    }
}

/// The decoded device: identity, parameter tables and entry points.
#[derive(Debug, Clone)]
pub struct DeviceSource {
    config: DeviceConfig,
    name: String,
    description: String,
    parameter_table: String,
    model_parameter_table: String,
    entry_points: IndexMap<EntryPointKind, String>,
}

impl DeviceSource {
    /// Open a device folder and decode its info structure.
    pub fn open(config: DeviceConfig) -> Result<Self> {
        let path = config.folder.join(&config.interface_file);
        let content = read_source(&path)?;
        let content = resolve_conditionals(&content, &config.defined);

        let info = find_device_info(&content, &config.interface_file)?;
        let (fields, methods) = split_device_info(info)?;

        let field = |index: usize| -> Result<String> {
            fields
                .get(index)
                .map(|f| f.trim_matches('"').to_string())
                .ok_or_else(|| TranslateError::MalformedDeviceInfo {
                    message: format!("missing field {} in the device description", index),
                })
        };
        let name = field(0)?;
        let description = field(1)?;
        let parameter_table = field(6)?.trim_start_matches('&').to_string();
        let model_parameter_table = field(8)?.trim_start_matches('&').to_string();

        let mut entry_points = IndexMap::new();
        for kind in EntryPointKind::ALL {
            match methods.get(kind.index()) {
                Some(method) if !method.is_empty() && method.to_lowercase() != "null" => {
                    entry_points.insert(kind, method.clone());
                }
                _ => {}
            }
        }

        info!(
            device = name.as_str(),
            entry_points = entry_points.len(),
            "opened device source"
        );
        debug!(
            parameters = parameter_table.as_str(),
            model_parameters = model_parameter_table.as_str(),
            "parameter tables"
        );

        Ok(Self {
            config,
            name,
            description,
            parameter_table,
            model_parameter_table,
            entry_points,
        })
    }

    /// Device name from the info structure (e.g. `Diode`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn folder(&self) -> &Path {
        &self.config.folder
    }

    /// Name of the instance parameter table variable.
    pub fn parameter_table(&self) -> &str {
        &self.parameter_table
    }

    /// Name of the model parameter table variable.
    pub fn model_parameter_table(&self) -> &str {
        &self.model_parameter_table
    }

    /// Source identifier of an entry point, if the device has one.
    pub fn entry_point_name(&self, kind: EntryPointKind) -> Option<&str> {
        self.entry_points.get(&kind).map(String::as_str)
    }

    pub fn has_entry_point(&self, kind: EntryPointKind) -> bool {
        self.entry_points.contains_key(&kind)
    }

    /// Resolve the conditional blocks of a piece of device code.
    pub fn resolve(&self, code: &str) -> String {
        resolve_conditionals(code, &self.config.defined)
    }

    /// Get the full definition (signature and body) of an entry point.
    pub fn get_entry_point(&self, kind: EntryPointKind) -> Result<String> {
        let name = self
            .entry_point_name(kind)
            .ok_or_else(|| TranslateError::UndefinedEntryPoint {
                kind: kind.to_string(),
            })?;

        let preferred = format!("{}.c", name.to_lowercase());
        for path in self.search_order(&preferred)? {
            let content = self.resolve(&read_source(&path)?);
            if let Some(definition) = find_function(&content, name) {
                debug!(entry_point = name, file = %path.display(), "found entry point");
                return Ok(self.resolve(definition));
            }
        }

        Err(TranslateError::entry_point_not_found(name, self.folder()))
    }

    /// Find a top-level declaration `TYPE NAME[] = ...;`.
    ///
    /// With `name` set to `None` the first declaration of the type is returned.
    pub fn get_variable(&self, ty: &str, name: Option<&str>) -> Result<String> {
        let preferred = self
            .config
            .device_file
            .clone()
            .unwrap_or_else(|| format!("{}.c", self.name.to_lowercase()));

        for path in self.search_order(&preferred)? {
            let content = self.resolve(&read_source(&path)?);
            if let Some(declaration) = find_declaration(&content, ty, name) {
                debug!(ty, file = %path.display(), "found variable");
                return Ok(declaration.to_string());
            }
        }

        Err(TranslateError::VariableNotFound {
            ty: ty.to_string(),
            name: name.unwrap_or("*").to_string(),
            folder: self.folder().display().to_string(),
        })
    }

    /// Read the definitions file as is (its `#define` lines are needed).
    pub fn read_definitions(&self) -> Result<String> {
        read_source(&self.config.folder.join(&self.config.definitions_file))
    }

    /// The preferred file first (if present), then every other file by name.
    fn search_order(&self, preferred: &str) -> Result<Vec<PathBuf>> {
        let folder = &self.config.folder;
        let entries = fs::read_dir(folder).map_err(|e| TranslateError::FileReadError {
            path: folder.display().to_string(),
            source: e,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        let preferred = folder.join(preferred);
        let mut order = Vec::with_capacity(files.len());
        if files.contains(&preferred) {
            order.push(preferred.clone());
        }
        order.extend(files.into_iter().filter(|f| *f != preferred));
        Ok(order)
    }
}

/// Read a source file as text; invalid UTF-8 is replaced, not rejected.
fn read_source(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| TranslateError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Find the single `SPICEdev name = { ... }` literal and return its outer block.
fn find_device_info<'a>(content: &'a str, file: &str) -> Result<&'a str> {
    let tokens = Tokens::code(content);
    let pattern = Pattern::new("SPICEdev $name = {");
    let found = pattern.find_all(&tokens);

    if found.len() != 1 {
        return Err(TranslateError::MissingDeviceInfo {
            file: file.to_string(),
            found: found.len(),
        });
    }
    let open = found[0].end - 1;
    let close = match_delimiter(content, open)?;
    Ok(&content[open..=close])
}

/// Split the info literal into the description fields and the method list.
fn split_device_info(info: &str) -> Result<(Vec<String>, Vec<String>)> {
    let inner = &info[1..info.len() - 1];
    let open = inner
        .find('{')
        .ok_or_else(|| TranslateError::MalformedDeviceInfo {
            message: "no device description block".to_string(),
        })?;
    let close = match_delimiter(inner, open)?;

    let fields = split_list(&inner[open + 1..close]);
    let methods = split_list(inner[close + 1..].trim_start().trim_start_matches(','));
    Ok((fields, methods))
}

/// Split a comma separated list, dropping comments and surrounding whitespace.
fn split_list(text: &str) -> Vec<String> {
    remove_comments(text)
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Locate the definition of function `name`, from its return type to its
/// closing brace. Prototypes and calls are skipped.
fn find_function<'a>(content: &'a str, name: &str) -> Option<&'a str> {
    let tokens = Tokens::code(content);

    for (i, tok) in tokens.iter().enumerate() {
        if !tok.is(name) || i == 0 {
            continue;
        }
        let Some(paren) = tokens.get(i + 1).filter(|t| t.is("(")) else {
            continue;
        };

        // A return type must precede the name
        let mut first = i - 1;
        let before = tokens.get(first)?;
        if before.is("*") && first > 0 {
            first -= 1;
        }
        match tokens.get(first) {
            Some(t) if t.is_ident() && !matches!(t.text.as_str(), "return" | "else") => {}
            _ => continue,
        }

        let Ok(close) = match_delimiter(content, paren.start) else {
            continue;
        };
        let after = tokens.index_at(close + 1);
        if tokens.get(after).map_or(true, |t| t.is(";") || t.is(",")) {
            continue;
        }
        // K&R declarations may sit between ')' and '{'
        let Some(body) = (after..tokens.len()).find(|&k| {
            tokens
                .get(k)
                .is_some_and(|t| t.is("{") || t.is("}") || t.is("="))
        }) else {
            continue;
        };
        let Some(open) = tokens.get(body).filter(|t| t.is("{")) else {
            continue;
        };
        let Ok(end) = match_delimiter(content, open.start) else {
            continue;
        };
        let start = tokens.get(first)?.start;
        return Some(&content[start..=end]);
    }
    None
}

/// Locate `TYPE NAME [ ] = ... ;` at any position, returning the whole declaration.
fn find_declaration<'a>(content: &'a str, ty: &str, name: Option<&str>) -> Option<&'a str> {
    let tokens = Tokens::code(content);
    let with_array = match name {
        Some(name) => format!("{} {} [ ] = ...value ;", ty, name),
        None => format!("{} $name [ ] = ...value ;", ty),
    };
    let plain = match name {
        Some(name) => format!("{} {} = ...value ;", ty, name),
        None => format!("{} $name = ...value ;", ty),
    };
    let patterns = [Pattern::new(&with_array), Pattern::new(&plain)];

    (0..tokens.len()).find_map(|i| {
        patterns
            .iter()
            .find_map(|p| p.match_at(&tokens, i))
            .map(|m| &content[m.start..m.end])
    })
}
