//! Rendering of the translated device into model and device classes.

pub mod config;
pub mod generator;
pub mod writer;

pub use config::{AcSource, PhaseSet, TranslatorConfig};
pub use generator::{translate, ClassGenerator, Translation};
pub use writer::{CodeWriter, DEFAULT_WRAP_COLUMN};
