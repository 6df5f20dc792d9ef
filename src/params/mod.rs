//! Parameter tables and the accessors generated from them.

pub mod accessor;
pub mod catalog;

pub use accessor::{
    AccessorSource, Declaration, DeclarationKind, GetterShape, ParameterAccessors, SetterShape,
};
pub use catalog::{ParameterCatalog, ParameterDescriptor, ParameterTable};
