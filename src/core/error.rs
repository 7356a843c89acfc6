//! Typed errors for command compilation, dispatch and context access
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Split dispatch failures from handler failures
//! - 1.0.0: Initial descriptor and context errors

use thiserror::Error;

/// A command descriptor (or one invocation bound against it) is invalid.
///
/// Compile-time variants discard the offending descriptor only; dispatch-time
/// variants abort the single invocation that raised them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescriptorError {
    #[error("invalid {what} name '{name}': must be 1-32 lowercase letters, digits, '-' or '_'")]
    InvalidName { what: &'static str, name: String },

    #[error("cannot register a default executor in command '{command}' which has sub-commands")]
    DirectWithSubcommands { command: String },

    #[error("cannot register sub-command '{subcommand}' in command '{command}' which has a default executor")]
    SubcommandWithDirect { command: String, subcommand: String },

    #[error("command '{command}' already has a default executor")]
    DuplicateDirect { command: String },

    #[error("command '{command}' already has a sub-command registered under '{key}'")]
    DuplicateSubcommand { command: String, key: String },

    #[error("option '{option}' has no wire type for parameter kind {kind}")]
    UnmappedKind { option: String, kind: String },

    #[error("invalid choices for '{choices}': {reason}")]
    InvalidChoices { choices: String, reason: String },

    #[error("command '{command}' has no handle for sub-command key '{key}'")]
    MissingSubcommand { command: String, key: String },

    #[error("unknown argument type {kind} at position {position}")]
    UnknownArgument { kind: String, position: usize },

    #[error("value {value} of option '{option}' matches no constant of '{choices}'")]
    UnknownChoice {
        option: String,
        choices: String,
        value: String,
    },

    #[error("option '{option}' cannot be read as {expected}")]
    OptionMismatch { option: String, expected: String },

    #[error("required option '{option}' is missing")]
    MissingOption { option: String },
}

/// Misuse of the ambient context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("no live context while requesting scoped object {kind}")]
    NoLiveContext { kind: &'static str },

    #[error("no provider registered for scoped object {kind}")]
    NoProvider { kind: &'static str },
}

/// Outcome of a failed dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Resolution or argument binding failed, the handler never ran.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// The handler itself returned an error.
    #[error("handler '{handle}' failed: {source}")]
    Handler {
        handle: String,
        #[source]
        source: anyhow::Error,
    },
}
