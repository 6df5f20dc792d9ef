//! Error types for the SPICE device translator.
//!
//! This module provides a unified error type [`TranslateError`] that covers
//! every fatal condition of a translation run: scanning, locating entry
//! points in the device sources, splitting the model/instance loops and
//! merging the phases. Non-fatal findings are not errors; they are recorded
//! in [`crate::diagnostics::Diagnostics`].

use thiserror::Error;

/// Result type alias using [`TranslateError`].
pub type Result<T> = std::result::Result<T, TranslateError>;

/// Unified error type for all translator operations.
#[derive(Error, Debug)]
pub enum TranslateError {
    // ============ Scanner Errors ============
    /// The text ended before the matching closing delimiter was found
    #[error("Unbalanced delimiter '{open}' at offset {offset}: no matching '{close}' before end of text")]
    UnbalancedDelimiter { open: char, close: char, offset: usize },

    /// The character at the requested position is not an opening bracket
    #[error("Character '{found}' at offset {offset} is not an opening delimiter")]
    NotADelimiter { found: char, offset: usize },

    /// No `switch (...) {` header could be found
    #[error("No switch statement found after offset {offset}")]
    MissingSwitch { offset: usize },

    // ============ Device Source Errors ============
    /// The interface file does not contain exactly one device info structure
    #[error("Expected exactly one SPICEdev info structure in '{file}', found {found}")]
    MissingDeviceInfo { file: String, found: usize },

    /// The device info structure does not have the expected layout
    #[error("Malformed device info structure: {message}")]
    MalformedDeviceInfo { message: String },

    /// The device does not provide this entry point
    #[error("Entry point '{kind}' is not defined for this device")]
    UndefinedEntryPoint { kind: String },

    /// No file in the device folder defines the entry point
    #[error("Could not find entry point '{name}' in '{folder}'")]
    EntryPointNotFound { name: String, folder: String },

    /// No file in the device folder declares the variable
    #[error("Could not find variable '{ty} {name}' in '{folder}'")]
    VariableNotFound {
        ty: String,
        name: String,
        folder: String,
    },

    /// An entry point lacks the parameter the translator relies on
    #[error("Entry point '{method}' has no parameter at position {index}")]
    MissingMethodParameter { method: String, index: usize },

    /// An accessor entry point does not cast its generic argument to the device type
    #[error("Could not find the instance binding ('here') in '{method}'")]
    MissingHereBinding { method: String },

    // ============ Iteration Errors ============
    /// The model loop `for (; m != NULL; m = m->next)` is missing
    #[error("Could not find the model iterator in '{method}'")]
    MissingModelIterator { method: String },

    /// The instance loop inside the model loop is missing
    #[error("Could not find the instance iterator in '{method}'")]
    MissingInstanceIterator { method: String },

    // ============ Generation Errors ============
    /// Two phases inferred different types for the same shared variable
    #[error("Cannot share variable '{name}': inferred as '{first}' and as '{second}'")]
    SharedVariableConflict {
        name: String,
        first: String,
        second: String,
    },

    /// A parameter id had neither a setter nor a getter body
    #[error("Invalid declaration state for parameter id '{id}': no setter and no getter")]
    InvalidDeclarationState { id: String },

    /// Invalid translator configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    // ============ I/O Errors ============
    /// Error reading a device source file
    #[error("Failed to read source file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing a generated artifact
    #[error("Failed to write output file '{path}': {source}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl TranslateError {
    /// Create an unbalanced delimiter error
    pub fn unbalanced(open: char, offset: usize) -> Self {
        let close = match open {
            '(' => ')',
            '[' => ']',
            _ => '}',
        };
        Self::UnbalancedDelimiter {
            open,
            close,
            offset,
        }
    }

    /// Create an entry point lookup error
    pub fn entry_point_not_found(name: impl Into<String>, folder: &std::path::Path) -> Self {
        Self::EntryPointNotFound {
            name: name.into(),
            folder: folder.display().to_string(),
        }
    }

    /// Create a missing method parameter error
    pub fn missing_parameter(method: impl Into<String>, index: usize) -> Self {
        Self::MissingMethodParameter {
            method: method.into(),
            index,
        }
    }

    /// Create an invalid configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
