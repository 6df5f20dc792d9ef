//! Translator configuration.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use super::writer::DEFAULT_WRAP_COLUMN;
use crate::error::TranslateError;
use crate::source::DeviceConfig;

bitflags! {
    /// Phases exported into the generated classes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PhaseSet: u32 {
        const SETUP = 0x01;
        const TEMPERATURE = 0x02;
        const LOAD = 0x04;
        const AC_LOAD = 0x08;
        const PZ_LOAD = 0x10;
        const TRUNCATE = 0x20;
    }
}

impl Default for PhaseSet {
    fn default() -> Self {
        Self::SETUP | Self::TEMPERATURE | Self::LOAD | Self::AC_LOAD
    }
}

impl FromStr for PhaseSet {
    type Err = TranslateError;

    /// Parse a comma-separated list such as `setup,load,acload`, or `all`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut phases = PhaseSet::empty();
        for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            phases |= match name.to_lowercase().replace(|c: char| c == '-' || c == '_', "").as_str() {
                "setup" => Self::SETUP,
                "temperature" | "temp" => Self::TEMPERATURE,
                "load" => Self::LOAD,
                "acload" | "ac" => Self::AC_LOAD,
                "pzload" | "pz" => Self::PZ_LOAD,
                "truncate" | "trunc" => Self::TRUNCATE,
                "all" => Self::all(),
                _ => return Err(TranslateError::config(format!("unknown phase '{}'", name))),
            };
        }
        if phases.is_empty() {
            return Err(TranslateError::config("no phase selected"));
        }
        Ok(phases)
    }
}

/// Which entry point provides the AC load when both are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcSource {
    #[default]
    AcLoad,
    PzLoad,
}

impl FromStr for AcSource {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(|c: char| c == '-' || c == '_', "").as_str() {
            "acload" | "ac" => Ok(Self::AcLoad),
            "pzload" | "pz" => Ok(Self::PzLoad),
            _ => Err(TranslateError::config(format!("unknown AC source '{}'", s))),
        }
    }
}

impl fmt::Display for AcSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcLoad => write!(f, "acload"),
            Self::PzLoad => write!(f, "pzload"),
        }
    }
}

/// Everything a translation run needs to know.
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub device: DeviceConfig,
    pub phases: PhaseSet,
    pub ac_source: AcSource,
    /// Lines at or beyond this column are wrapped
    pub wrap_column: usize,
}

impl TranslatorConfig {
    pub fn new(device: DeviceConfig) -> Self {
        Self {
            device,
            phases: PhaseSet::default(),
            ac_source: AcSource::default(),
            wrap_column: DEFAULT_WRAP_COLUMN,
        }
    }

    pub fn with_phases(mut self, phases: PhaseSet) -> Self {
        self.phases = phases;
        self
    }

    pub fn with_ac_source(mut self, ac_source: AcSource) -> Self {
        self.ac_source = ac_source;
        self
    }

    pub fn with_wrap_column(mut self, wrap_column: usize) -> Self {
        self.wrap_column = wrap_column;
        self
    }
}
