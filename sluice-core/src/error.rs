//! Error types for Sluice.
//!
//! This module provides strongly-typed errors with actionable context.
//! All errors carry the identifiers needed to pinpoint the failing
//! variable, operator, or source location.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Sluice operations.
#[derive(Error, Debug)]
pub enum SluiceError {
    // =========================================================================
    // Graph Definition Errors (E001-E009)
    // =========================================================================
    /// A variable name was defined twice in the same graph.
    #[error("E001: variable '{name}' already defined in graph '{graph}'")]
    DuplicateVariable {
        /// The graph in which the collision occurred.
        graph: String,
        /// The colliding variable name.
        name: String,
    },

    /// An operator name was defined twice in the same graph.
    #[error("E002: operator '{name}' already defined in graph '{graph}'")]
    DuplicateOp {
        /// The graph in which the collision occurred.
        graph: String,
        /// The colliding operator name.
        name: String,
    },

    /// An operator referenced a variable that was never defined.
    #[error("E003: variable not found: '{name}'")]
    UndefinedVariable {
        /// The unknown variable name.
        name: String,
    },

    /// Two operators declared the same output variable.
    #[error("E004: variable '{var}' is already output from operator '{op}'")]
    DuplicateProducer {
        /// The variable with more than one producer.
        var: String,
        /// The operator that already owns the variable.
        op: String,
    },

    // =========================================================================
    // Variable Access Errors (E010-E019)
    // =========================================================================
    /// A variable was read before any value was set.
    #[error("E011: variable not set: '{name}'")]
    VariableNotSet {
        /// The unset variable name.
        name: String,
    },

    /// A variable was read as a different type than it holds.
    #[error("E012: invalid cast of variable '{name}' from {actual} to {requested}")]
    TypeMismatch {
        /// The variable name.
        name: String,
        /// The type the variable actually holds.
        actual: String,
        /// The type the caller requested.
        requested: String,
    },

    // =========================================================================
    // Execution Errors (E020-E029)
    // =========================================================================
    /// An operator signaled completion without setting one of its outputs.
    #[error("E021: operator '{op}' completed without setting output '{var}'")]
    OutputNotSet {
        /// The offending operator.
        op: String,
        /// The output variable left unset.
        var: String,
    },

    /// `defer()` was called more than once in a single invocation.
    #[error("E022: completion already deferred by operator '{op}'")]
    DeferAlreadyTaken {
        /// The offending operator.
        op: String,
    },

    /// A deferred completion token was dropped without being fired.
    #[error("E023: completion token dropped by operator '{op}'")]
    CompletionDropped {
        /// The operator whose round can no longer complete normally.
        op: String,
    },

    // =========================================================================
    // Factory Errors (E101-E109)
    // =========================================================================
    /// No factory is registered under the requested type name.
    #[error("E101: {kind} type not found: '{type_name}'")]
    FactoryNotFound {
        /// Factory kind ("op" or "ingress").
        kind: &'static str,
        /// The unknown type name.
        type_name: String,
    },

    /// A factory type name was registered twice.
    #[error("E102: {kind} factory already registered: '{type_name}'")]
    FactoryExists {
        /// Factory kind ("op" or "ingress").
        kind: &'static str,
        /// The colliding type name.
        type_name: String,
    },

    /// A factory rejected its parameters.
    #[error("E103: invalid parameters for '{name}': {cause}")]
    InvalidParam {
        /// The instance being created.
        name: String,
        /// Why the parameters were rejected.
        cause: String,
    },

    // =========================================================================
    // Definition Language Errors (E201-E209)
    // =========================================================================
    /// A located error from the definition-language tokenizer, parser, or
    /// cross-referencer. `line` and `col` are zero-based; the rendered
    /// message is one-based.
    #[error("E201: {}:L{}C{}: {}", .offset, .line + 1, .col + 1, .message)]
    Parse {
        /// Byte offset into the script.
        offset: usize,
        /// Zero-based source line.
        line: usize,
        /// Zero-based source column.
        col: usize,
        /// What went wrong.
        message: String,
    },

    /// A graph name was requested that the parsed definition does not contain.
    #[error("E202: graph not found: '{name}'")]
    GraphNotFound {
        /// The unknown graph name.
        name: String,
    },

    // =========================================================================
    // Runtime Errors (E301-E309)
    // =========================================================================
    /// A channel endpoint disappeared while the engine was still using it.
    #[error("E301: channel closed: {context}")]
    ChannelClosed {
        /// Which channel, and during what.
        context: String,
    },

    /// An OS thread could not be spawned.
    #[error("E302: failed to spawn thread '{name}': {cause}")]
    Spawn {
        /// The thread name.
        name: String,
        /// The OS error.
        cause: String,
    },

    // =========================================================================
    // I/O Errors (E401-E409)
    // =========================================================================
    /// File I/O error.
    #[error("E401: I/O error at {path}: {cause}")]
    Io {
        /// The path where the I/O error occurred.
        path: PathBuf,
        /// Description of the I/O error.
        cause: String,
    },
}

impl SluiceError {
    /// Get the error code (e.g., "E001").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateVariable { .. } => "E001",
            Self::DuplicateOp { .. } => "E002",
            Self::UndefinedVariable { .. } => "E003",
            Self::DuplicateProducer { .. } => "E004",
            Self::VariableNotSet { .. } => "E011",
            Self::TypeMismatch { .. } => "E012",
            Self::OutputNotSet { .. } => "E021",
            Self::DeferAlreadyTaken { .. } => "E022",
            Self::CompletionDropped { .. } => "E023",
            Self::FactoryNotFound { .. } => "E101",
            Self::FactoryExists { .. } => "E102",
            Self::InvalidParam { .. } => "E103",
            Self::Parse { .. } => "E201",
            Self::GraphNotFound { .. } => "E202",
            Self::ChannelClosed { .. } => "E301",
            Self::Spawn { .. } => "E302",
            Self::Io { .. } => "E401",
        }
    }

    /// Check if this error is a build/parse-time configuration error.
    ///
    /// Configuration errors are never retried; they indicate a broken
    /// pipeline definition and should be treated as fatal by the caller
    /// assembling the pipeline.
    #[must_use]
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateVariable { .. }
                | Self::DuplicateOp { .. }
                | Self::UndefinedVariable { .. }
                | Self::DuplicateProducer { .. }
                | Self::FactoryNotFound { .. }
                | Self::FactoryExists { .. }
                | Self::InvalidParam { .. }
                | Self::Parse { .. }
                | Self::GraphNotFound { .. }
        )
    }

    /// Check if this error indicates a mis-wired operator implementation
    /// (wrong type or missing value at execution time).
    #[must_use]
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            Self::VariableNotSet { .. } | Self::TypeMismatch { .. } | Self::OutputNotSet { .. }
        )
    }
}

/// Result type alias using `SluiceError`.
pub type Result<T> = std::result::Result<T, SluiceError>;
