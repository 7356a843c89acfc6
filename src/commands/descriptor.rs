//! Command declarations
//!
//! Handlers are declared explicitly: a [`CommandDescriptor`] names the command,
//! and each [`Executor`] attaches one [`ExecutionHandle`] either as the
//! command's direct executor or as a sub-command (optionally in a group).
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Typed argument accessors
//! - 1.0.0: Initial declaration API

use anyhow::{anyhow, Result};
use std::fmt;
use std::sync::Arc;

use super::choices::{ChoiceSet, CommandChoices};
use super::interaction::{AttachmentRef, ChannelRef, InteractionEvent, MemberRef, RoleRef, UserRef};
use super::options::{ArgValue, Mentionable, ParamKind};

pub const DEFAULT_TRANSLATION_PREFIX: &str = "interaction.slash.";

/// Top-level command declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: String,
    pub translation_prefix: String,
    pub nsfw: bool,
    /// Only affects global commands.
    pub guild_only: bool,
    /// When non-empty the command is registered in these guilds instead of globally.
    pub guilds: Vec<u64>,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            translation_prefix: DEFAULT_TRANSLATION_PREFIX.to_string(),
            nsfw: false,
            guild_only: false,
            guilds: Vec::new(),
        }
    }

    pub fn translation_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.translation_prefix = prefix.into();
        self
    }

    pub fn nsfw(mut self, nsfw: bool) -> Self {
        self.nsfw = nsfw;
        self
    }

    pub fn guild_only(mut self, guild_only: bool) -> Self {
        self.guild_only = guild_only;
        self
    }

    pub fn guilds(mut self, guilds: impl IntoIterator<Item = u64>) -> Self {
        self.guilds = guilds.into_iter().collect();
        self
    }
}

/// Marks a parameter as a command option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionAttrs {
    pub name: String,
    pub autocomplete: bool,
}

/// One declared handler parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub kind: ParamKind,
    /// Absence allowed; the option is registered as not required.
    pub optional: bool,
    pub option: Option<OptionAttrs>,
}

impl Parameter {
    pub fn option(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            kind,
            optional: false,
            option: Some(OptionAttrs {
                name: name.into(),
                autocomplete: false,
            }),
        }
    }

    pub fn choice<E: CommandChoices>(name: impl Into<String>) -> Self {
        Self::option(name, ParamKind::Choice(ChoiceSet::of::<E>()))
    }

    /// The originating interaction event.
    pub fn event() -> Self {
        Self {
            kind: ParamKind::Event,
            optional: false,
            option: None,
        }
    }

    /// A non-option parameter of a type the dispatcher knows nothing about.
    pub fn opaque<T>() -> Self {
        Self {
            kind: ParamKind::Opaque(std::any::type_name::<T>()),
            optional: false,
            option: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn autocomplete(mut self) -> Self {
        if let Some(attrs) = self.option.as_mut() {
            attrs.autocomplete = true;
        }
        self
    }

    pub fn option_name(&self) -> Option<&str> {
        self.option.as_ref().map(|attrs| attrs.name.as_str())
    }
}

/// A bound argument, positionally matching the handle's parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(ArgValue),
    /// Parameter that allows absence; `None` when the option was not supplied.
    Optional(Option<ArgValue>),
    Event(Arc<InteractionEvent>),
}

/// Positional argument list handed to an [`ExecutionHandle`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Vec<Argument>);

impl Arguments {
    pub fn new(arguments: Vec<Argument>) -> Self {
        Self(arguments)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Argument> {
        self.0.get(index)
    }

    pub fn as_slice(&self) -> &[Argument] {
        &self.0
    }

    pub fn event(&self, index: usize) -> Result<&Arc<InteractionEvent>> {
        match self.get(index) {
            Some(Argument::Event(event)) => Ok(event),
            other => Err(mismatch(index, "event", other)),
        }
    }

    /// A required option value.
    pub fn value(&self, index: usize) -> Result<&ArgValue> {
        match self.get(index) {
            Some(Argument::Value(value)) => Ok(value),
            other => Err(mismatch(index, "value", other)),
        }
    }

    /// An absence-allowed option value.
    pub fn optional(&self, index: usize) -> Result<Option<&ArgValue>> {
        match self.get(index) {
            Some(Argument::Optional(value)) => Ok(value.as_ref()),
            other => Err(mismatch(index, "optional value", other)),
        }
    }

    pub fn text(&self, index: usize) -> Result<&str> {
        as_text(self.value(index)?).ok_or_else(|| anyhow!("argument {index} is not text"))
    }

    pub fn optional_text(&self, index: usize) -> Result<Option<&str>> {
        self.optional(index)?
            .map(|v| as_text(v).ok_or_else(|| anyhow!("argument {index} is not text")))
            .transpose()
    }

    pub fn integer(&self, index: usize) -> Result<i64> {
        as_integer(self.value(index)?).ok_or_else(|| anyhow!("argument {index} is not an integer"))
    }

    pub fn optional_integer(&self, index: usize) -> Result<Option<i64>> {
        self.optional(index)?
            .map(|v| as_integer(v).ok_or_else(|| anyhow!("argument {index} is not an integer")))
            .transpose()
    }

    pub fn boolean(&self, index: usize) -> Result<bool> {
        match self.value(index)? {
            ArgValue::Boolean(b) => Ok(*b),
            _ => Err(anyhow!("argument {index} is not a boolean")),
        }
    }

    pub fn number(&self, index: usize) -> Result<f64> {
        match self.value(index)? {
            ArgValue::Number(n) => Ok(*n),
            _ => Err(anyhow!("argument {index} is not a number")),
        }
    }

    pub fn user(&self, index: usize) -> Result<&UserRef> {
        match self.value(index)? {
            ArgValue::User(user) => Ok(user),
            _ => Err(anyhow!("argument {index} is not a user")),
        }
    }

    pub fn member(&self, index: usize) -> Result<&MemberRef> {
        match self.value(index)? {
            ArgValue::Member(member) => Ok(member),
            _ => Err(anyhow!("argument {index} is not a member")),
        }
    }

    pub fn channel(&self, index: usize) -> Result<&ChannelRef> {
        match self.value(index)? {
            ArgValue::Channel(channel) => Ok(channel),
            _ => Err(anyhow!("argument {index} is not a channel")),
        }
    }

    pub fn role(&self, index: usize) -> Result<&RoleRef> {
        match self.value(index)? {
            ArgValue::Role(role) => Ok(role),
            _ => Err(anyhow!("argument {index} is not a role")),
        }
    }

    pub fn mentionable(&self, index: usize) -> Result<&Mentionable> {
        match self.value(index)? {
            ArgValue::Mentionable(target) => Ok(target),
            _ => Err(anyhow!("argument {index} is not a mentionable")),
        }
    }

    pub fn attachment(&self, index: usize) -> Result<&AttachmentRef> {
        match self.value(index)? {
            ArgValue::Attachment(attachment) => Ok(attachment),
            _ => Err(anyhow!("argument {index} is not an attachment")),
        }
    }

    pub fn choice<E: CommandChoices>(&self, index: usize) -> Result<E> {
        as_choice(self.value(index)?).ok_or_else(|| anyhow!("argument {index} is not a choice"))
    }

    pub fn optional_choice<E: CommandChoices>(&self, index: usize) -> Result<Option<E>> {
        self.optional(index)?
            .map(|v| as_choice(v).ok_or_else(|| anyhow!("argument {index} is not a choice")))
            .transpose()
    }
}

fn mismatch(index: usize, expected: &str, found: Option<&Argument>) -> anyhow::Error {
    match found {
        Some(found) => anyhow!("argument {index} is not a {expected}: {found:?}"),
        None => anyhow!("argument {index} is missing"),
    }
}

fn as_text(value: &ArgValue) -> Option<&str> {
    match value {
        ArgValue::Text(s) => Some(s),
        _ => None,
    }
}

fn as_integer(value: &ArgValue) -> Option<i64> {
    match value {
        ArgValue::Integer(i) => Some(*i),
        _ => None,
    }
}

fn as_choice<E: CommandChoices>(value: &ArgValue) -> Option<E> {
    match value {
        ArgValue::Choice(choice) => choice.constant::<E>(),
        _ => None,
    }
}

type HandlerFn = dyn Fn(Arguments) -> Result<()> + Send + Sync;

/// A handler plus the parameter signature it is invoked with.
#[derive(Clone)]
pub struct ExecutionHandle {
    name: String,
    parameters: Vec<Parameter>,
    handler: Arc<HandlerFn>,
}

impl ExecutionHandle {
    pub fn new<F>(name: impl Into<String>, parameters: Vec<Parameter>, handler: F) -> Self
    where
        F: Fn(Arguments) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters,
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub(crate) fn rename_option(&mut self, index: usize, name: String) {
        if let Some(attrs) = self.parameters.get_mut(index).and_then(|p| p.option.as_mut()) {
            attrs.name = name;
        }
    }

    pub fn invoke(&self, arguments: Arguments) -> Result<()> {
        (self.handler)(arguments)
    }
}

impl fmt::Debug for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionHandle")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Where a handle attaches inside its command.
#[derive(Debug, Clone)]
pub struct Executor {
    /// `None` (or empty) makes this the command's direct executor.
    pub subcommand: Option<String>,
    pub group: Option<String>,
    pub handle: ExecutionHandle,
}

impl Executor {
    pub fn direct(handle: ExecutionHandle) -> Self {
        Self {
            subcommand: None,
            group: None,
            handle,
        }
    }

    pub fn subcommand(name: impl Into<String>, handle: ExecutionHandle) -> Self {
        Self {
            subcommand: Some(name.into()),
            group: None,
            handle,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// A command module: one descriptor and all of its executors.
pub trait SlashCommand: Send + Sync + 'static {
    fn descriptor(&self) -> CommandDescriptor;

    fn executors(self: Arc<Self>) -> Vec<Executor>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::choices::tests::Speed;
    use crate::commands::choices::{Choice, ChoiceValue};

    #[test]
    fn test_descriptor_defaults() {
        let descriptor = CommandDescriptor::new("ping");
        assert_eq!(descriptor.translation_prefix, "interaction.slash.");
        assert!(!descriptor.nsfw);
        assert!(!descriptor.guild_only);
        assert!(descriptor.guilds.is_empty());
    }

    #[test]
    fn test_parameter_builders() {
        let p = Parameter::option("count", ParamKind::Integer).optional().autocomplete();
        assert!(p.optional);
        assert_eq!(p.option_name(), Some("count"));
        assert!(p.option.as_ref().unwrap().autocomplete);

        let e = Parameter::event();
        assert_eq!(e.kind, ParamKind::Event);
        assert!(e.option_name().is_none());

        assert!(matches!(Parameter::opaque::<String>().kind, ParamKind::Opaque(_)));
    }

    #[test]
    fn test_argument_accessors() {
        let event = Arc::new(InteractionEvent::new(1, "cmd"));
        let args = Arguments::new(vec![
            Argument::Event(Arc::clone(&event)),
            Argument::Value(ArgValue::Text("foo".into())),
            Argument::Optional(None),
            Argument::Optional(Some(ArgValue::Integer(5))),
            Argument::Value(ArgValue::Choice(Choice {
                index: 1,
                label: "fast",
                value: ChoiceValue::Integer(10),
            })),
        ]);

        assert_eq!(args.event(0).unwrap().command_id, 1);
        assert_eq!(args.text(1).unwrap(), "foo");
        assert_eq!(args.optional_integer(2).unwrap(), None);
        assert_eq!(args.optional_integer(3).unwrap(), Some(5));
        assert_eq!(args.choice::<Speed>(4).unwrap(), Speed::Fast);

        assert!(args.integer(1).is_err());
        assert!(args.text(0).is_err());
        assert!(args.text(9).is_err());
    }

    #[test]
    fn test_handle_invokes_handler() {
        let handle = ExecutionHandle::new("echo", vec![], |args: Arguments| {
            if args.is_empty() {
                Ok(())
            } else {
                Err(anyhow!("unexpected arguments"))
            }
        });
        assert!(handle.invoke(Arguments::default()).is_ok());
        assert!(handle
            .invoke(Arguments::new(vec![Argument::Optional(None)]))
            .is_err());
    }
}
