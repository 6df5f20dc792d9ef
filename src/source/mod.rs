//! Device sources: file lookup, conditional compilation and the entry-point table.

pub mod conditional;
pub mod device;
pub mod types;

pub use conditional::resolve_conditionals;
pub use device::{DeviceConfig, DeviceSource};
pub use types::{EntryPointKind, LocalType, ParamType};
