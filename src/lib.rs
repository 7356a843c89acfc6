// Core layer - configuration and error types
pub mod core;

// Event context and context-scoped objects
pub mod context;

// Locales and message lookup
pub mod locale;

// Remote session (serenity)
pub mod platform;

// Application layer
pub mod commands;

// Re-export core config for convenience
pub use core::Config;

pub use commands::{
    CommandDescriptor, CommandRegistry, DescriptorCompiler, Dispatcher, ExecutionHandle, Executor,
    Parameter, SlashCommand,
};
pub use context::{ContextData, ContextPropagation, ScopeManager};
pub use locale::{Locale, LocalizedMessages};
