//! # Spicegen Core
//!
//! Translates SPICE3 C device models into circuit-simulation object-model code.
//!
//! A SPICE3 device lives in a folder of C sources: an interface file with the
//! `SPICEdev` info structure, a definitions header, parameter tables and one
//! function per simulation phase. This library reads such a folder and
//! produces two classes for the device: a model class holding the model
//! parameters and per-model computations, and a device class holding the
//! instance parameters, nodes, states and per-instance computations.
//!
//! ## Architecture
//!
//! - [`scan`] - C tokenizer, delimiter matching and token patterns
//! - [`source`] - Device folder, conditional blocks and the info structure
//! - [`params`] - Parameter tables and accessor declarations
//! - [`iterate`] - Model and instance loops of an entry point
//! - [`phases`] - Setup, temperature, load, AC, pole-zero and truncation
//! - [`emit`] - Class generation and the code writer
//!
//! ## Usage
//!
//! ```no_run
//! use spicegen_core::{translate, DeviceConfig, Diagnostics, TranslatorConfig};
//!
//! let device = DeviceConfig::new("spice3f5/dio", "dioitf.h", "diodefs.h");
//! let mut diagnostics = Diagnostics::new();
//! let translation = translate(&TranslatorConfig::new(device), &mut diagnostics)?;
//! translation.write_to(std::path::Path::new("out"))?;
//! # Ok::<(), spicegen_core::TranslateError>(())
//! ```
//!
//! Unsupported constructs do not stop a translation: they are collected in
//! [`Diagnostics`] and the affected code is kept as is.

pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod iterate;
pub mod params;
pub mod phases;
pub mod scan;
pub mod source;

// Re-export main types for convenience
pub use diagnostics::{Diagnostic, Diagnostics};
pub use emit::{translate, AcSource, PhaseSet, Translation, TranslatorConfig};
pub use error::{Result, TranslateError};
pub use source::{DeviceConfig, DeviceSource};
