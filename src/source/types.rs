//! Core types shared by the device source and the translation stages.

use std::fmt;

/// The entry points of a SPICE3 device, in the order of the `SPICEdev`
/// method list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryPointKind {
    Param,
    ModelParam,
    Load,
    Setup,
    Unsetup,
    PzSetup,
    Temperature,
    Trunc,
    FindBranch,
    AcLoad,
    Accept,
    Destroy,
    ModelDelete,
    Delete,
    SetIc,
    Ask,
    ModelAsk,
    PzLoad,
    Convergence,
    SenSetup,
    SenLoad,
    SenUpdate,
    SenAcLoad,
    SenPrint,
    SenTrunc,
    Distortion,
    Noise,
}

impl EntryPointKind {
    /// Every kind, indexed by its position in the method list.
    pub const ALL: [EntryPointKind; 27] = [
        Self::Param,
        Self::ModelParam,
        Self::Load,
        Self::Setup,
        Self::Unsetup,
        Self::PzSetup,
        Self::Temperature,
        Self::Trunc,
        Self::FindBranch,
        Self::AcLoad,
        Self::Accept,
        Self::Destroy,
        Self::ModelDelete,
        Self::Delete,
        Self::SetIc,
        Self::Ask,
        Self::ModelAsk,
        Self::PzLoad,
        Self::Convergence,
        Self::SenSetup,
        Self::SenLoad,
        Self::SenUpdate,
        Self::SenAcLoad,
        Self::SenPrint,
        Self::SenTrunc,
        Self::Distortion,
        Self::Noise,
    ];

    /// Position of this kind in the method list.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Param => "Param",
            Self::ModelParam => "ModelParam",
            Self::Load => "Load",
            Self::Setup => "Setup",
            Self::Unsetup => "Unsetup",
            Self::PzSetup => "PzSetup",
            Self::Temperature => "Temperature",
            Self::Trunc => "Trunc",
            Self::FindBranch => "FindBranch",
            Self::AcLoad => "AcLoad",
            Self::Accept => "Accept",
            Self::Destroy => "Destroy",
            Self::ModelDelete => "ModelDelete",
            Self::Delete => "Delete",
            Self::SetIc => "SetIC",
            Self::Ask => "Ask",
            Self::ModelAsk => "ModelAsk",
            Self::PzLoad => "PzLoad",
            Self::Convergence => "Convergence",
            Self::SenSetup => "SenSetup",
            Self::SenLoad => "SenLoad",
            Self::SenUpdate => "SenUpdate",
            Self::SenAcLoad => "SenAcLoad",
            Self::SenPrint => "SenPrint",
            Self::SenTrunc => "SenTrunc",
            Self::Distortion => "Distortion",
            Self::Noise => "Noise",
        }
    }
}

impl fmt::Display for EntryPointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value type of a parameter, decoded from its `IF_*` type flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Real,
    Flag,
    Complex,
    Str,
    RealVector,
    Integer,
}

impl ParamType {
    /// Decode an `IF_*` data-type flag. Access flags (`IF_SET`, `IF_ASK`, ...)
    /// are not types and yield `None`.
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "IF_REAL" => Some(Self::Real),
            "IF_FLAG" => Some(Self::Flag),
            "IF_COMPLEX" => Some(Self::Complex),
            "IF_STRING" => Some(Self::Str),
            "IF_REALVEC" | "IF_VECTOR" => Some(Self::RealVector),
            "IF_INTEGER" => Some(Self::Integer),
            _ => None,
        }
    }

    /// Name of the type in generated code.
    pub fn target_name(&self) -> &'static str {
        match self {
            Self::Real => "double",
            Self::Flag => "bool",
            Self::Complex => "Complex",
            Self::Str => "string",
            Self::RealVector => "double[]",
            Self::Integer => "int",
        }
    }

    /// Numeric scalars use the bare `Parameter` wrapper.
    pub fn is_numeric_scalar(&self) -> bool {
        matches!(self, Self::Real | Self::Integer)
    }

    /// Check whether a literal equals the zero value of this type.
    pub fn is_zero_literal(&self, literal: &str) -> bool {
        let literal = literal.trim();
        match self {
            Self::Flag => literal == "false" || literal == "FALSE" || literal == "0",
            Self::Str => literal == "\"\"",
            _ => crate::scan::parse_c_number(literal.trim_start_matches(['+', '-']))
                .is_some_and(|v| v == 0.0),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target_name())
    }
}

/// Declared type of a local variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalType {
    Real,
    Integer,
}

impl LocalType {
    /// Map a C declaration keyword onto a local type.
    pub fn from_c_type(word: &str) -> Option<Self> {
        match word {
            "double" | "float" => Some(Self::Real),
            "int" | "long" | "short" | "unsigned" => Some(Self::Integer),
            _ => None,
        }
    }

    pub fn target_name(&self) -> &'static str {
        match self {
            Self::Real => "double",
            Self::Integer => "int",
        }
    }
}

impl fmt::Display for LocalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_point_order() {
        assert_eq!(EntryPointKind::ALL.len(), 27);
        for (i, kind) in EntryPointKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        assert_eq!(EntryPointKind::AcLoad.index(), 9);
        assert_eq!(EntryPointKind::PzLoad.to_string(), "PzLoad");
    }

    #[test]
    fn test_param_type_flags() {
        assert_eq!(ParamType::from_flag("IF_REAL"), Some(ParamType::Real));
        assert_eq!(ParamType::from_flag("IF_VECTOR"), Some(ParamType::RealVector));
        assert_eq!(ParamType::from_flag("IF_SET"), None);
        assert_eq!(ParamType::RealVector.target_name(), "double[]");
        assert!(ParamType::Integer.is_numeric_scalar());
        assert!(!ParamType::Flag.is_numeric_scalar());
    }

    #[test]
    fn test_zero_literals() {
        assert!(ParamType::Real.is_zero_literal("0.0"));
        assert!(ParamType::Real.is_zero_literal("0"));
        assert!(ParamType::Real.is_zero_literal("-0"));
        assert!(!ParamType::Real.is_zero_literal("1e-14"));
        assert!(ParamType::Flag.is_zero_literal("false"));
        assert!(!ParamType::Flag.is_zero_literal("true"));
        assert!(ParamType::Str.is_zero_literal("\"\""));
        assert!(!ParamType::Str.is_zero_literal("0"));
    }
}
