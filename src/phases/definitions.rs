//! State slot constants of the definitions file.
//!
//! SPICE headers name the state slots of an instance relative to the
//! instance's first slot: `#define DIOcurrent DIOstate+1`. These become
//! integer constants of the device class.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::Result;
use crate::scan::pattern::{Pattern, Tokens};
use crate::source::DeviceSource;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDefinitions {
    /// Constant name -> slot offset
    pub constants: IndexMap<String, usize>,
}

impl StateDefinitions {
    pub fn read(source: &DeviceSource, states_variable: &str) -> Result<Self> {
        let definitions = source.read_definitions()?;
        let result = Self::parse(&definitions, states_variable);
        debug!(constants = result.constants.len(), "read state definitions");
        Ok(result)
    }

    pub fn parse(definitions: &str, states_variable: &str) -> Self {
        let patterns = [
            Pattern::new("$name $base"),
            Pattern::new("$name $base + #offset"),
            Pattern::new("$name ( $base + #offset )"),
        ];
        let mut constants = IndexMap::new();

        for line in definitions.lines() {
            let Some(rest) = line.trim().strip_prefix('#') else {
                continue;
            };
            let Some(body) = rest.trim_start().strip_prefix("define") else {
                continue;
            };
            let tokens = Tokens::code(body);
            let Some(m) = patterns.iter().find_map(|p| p.matches_exactly(&tokens)) else {
                continue;
            };
            if m.get("base") != states_variable {
                continue;
            }
            let offset = match m.capture("offset") {
                Some(c) => match c.text.parse::<usize>() {
                    Ok(offset) => offset,
                    Err(_) => continue,
                },
                None => 0,
            };
            constants.insert(m.get("name").to_string(), offset);
        }
        Self { constants }
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.constants.keys()
    }
}
