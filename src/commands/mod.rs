//! # Command System
//!
//! Slash command declarations, their compilation into registration payloads,
//! the platform-id registry and the dispatcher that invokes handlers.
//!
//! - **Version**: 3.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 3.0.0: Declarative descriptors compiled into a command tree
//! - 2.0.0: Sub-command groups
//! - 1.0.0: Initial command structure

pub mod choices;
pub mod compiler;
pub mod descriptor;
pub mod dispatcher;
pub mod handlers;
pub mod interaction;
pub mod naming;
pub mod options;
pub mod registry;

pub use choices::{Choice, ChoiceSet, ChoiceValue, CommandChoices};
pub use compiler::{CommandDefinition, DescriptorCompiler};
pub use descriptor::{
    Argument, Arguments, CommandDescriptor, ExecutionHandle, Executor, Parameter, SlashCommand,
};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use interaction::{InteractionEvent, OptionValue};
pub use options::{ArgValue, OptionMapper, ParamKind, WireType};
pub use registry::{CommandRegistry, RegisteredCommand};
