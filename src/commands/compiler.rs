//! # Descriptor Compiler
//!
//! Turns command declarations into the in-memory command tree and the
//! registration payloads sent to the platform.
//!
//! - **Version**: 1.3.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.3.0: A failed module rolls back to the definition it started from
//! - 1.2.0: Modules are discarded as a whole when any executor fails
//! - 1.1.0: Localized names and descriptions
//! - 1.0.0: Initial compiler

use dashmap::DashMap;
use log::{debug, error, warn};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::choices::Choice;
use super::descriptor::{CommandDescriptor, ExecutionHandle, Executor, SlashCommand};
use super::naming::{validate_name, MAX_NAME_LEN};
use super::options::{OptionMapper, ParamKind, WireType};
use crate::core::DescriptorError;
use crate::locale::{Locale, MessageSource};

pub type Localizations = BTreeMap<Locale, String>;

/// Display name and description of one tree node, per locale.
#[derive(Debug, Clone, PartialEq)]
pub struct Labels {
    pub name: String,
    pub name_localizations: Localizations,
    /// The fallback locale's description.
    pub description: String,
    pub description_localizations: Localizations,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceDescriptor {
    pub choice: Choice,
    pub name_localizations: Localizations,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionDescriptor {
    pub labels: Labels,
    pub wire: WireType,
    pub required: bool,
    pub autocomplete: bool,
    pub choices: Vec<ChoiceDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubcommandData {
    pub labels: Labels,
    pub options: Vec<OptionDescriptor>,
}

/// A sub-command group. The group keyed by the empty name holds ungrouped
/// sub-commands and has no labels of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupData {
    pub labels: Option<Labels>,
    pub subcommands: Vec<SubcommandData>,
}

#[derive(Debug, Clone, Default)]
pub struct SubcommandDefinitions {
    /// Keyed by group name followed by sub-command name.
    pub executions: HashMap<String, ExecutionHandle>,
    pub groups: BTreeMap<String, GroupData>,
}

/// A compiled top-level command. It owns either one direct executor or a set
/// of sub-commands, never both.
#[derive(Debug, Clone)]
pub struct CommandDefinition {
    pub labels: Labels,
    pub nsfw: bool,
    pub guild_only: bool,
    pub guilds: Vec<u64>,
    pub options: Vec<OptionDescriptor>,
    pub direct: Option<ExecutionHandle>,
    pub subcommands: Option<SubcommandDefinitions>,
}

impl CommandDefinition {
    /// The validated command name the platform sees.
    pub fn name(&self) -> &str {
        &self.labels.name
    }

    /// The handle invoked for `key` (see [`InteractionEvent::subcommand_key`]).
    ///
    /// [`InteractionEvent::subcommand_key`]: super::interaction::InteractionEvent::subcommand_key
    pub fn handle_for(&self, key: &str) -> Option<&ExecutionHandle> {
        match (&self.direct, &self.subcommands) {
            (Some(direct), _) => Some(direct),
            (None, Some(subcommands)) => subcommands.executions.get(key),
            (None, None) => None,
        }
    }

    /// Registration payload in the platform's JSON shape.
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("type".into(), json!(1));
        insert_labels(&mut payload, &self.labels);
        payload.insert("nsfw".into(), json!(self.nsfw));
        payload.insert("dm_permission".into(), json!(!self.guild_only));

        let options = match &self.subcommands {
            Some(subcommands) => subcommands
                .groups
                .iter()
                .flat_map(|(_, group)| group_payload(group))
                .collect(),
            None => options_payload(&self.options),
        };
        payload.insert("options".into(), Value::Array(options));
        Value::Object(payload)
    }
}

fn insert_labels(payload: &mut Map<String, Value>, labels: &Labels) {
    payload.insert("name".into(), json!(labels.name));
    payload.insert("name_localizations".into(), localizations_payload(&labels.name_localizations));
    payload.insert("description".into(), json!(labels.description));
    payload.insert(
        "description_localizations".into(),
        localizations_payload(&labels.description_localizations),
    );
}

fn localizations_payload(localizations: &Localizations) -> Value {
    Value::Object(
        localizations
            .iter()
            .map(|(locale, text)| (locale.tag().to_string(), json!(text)))
            .collect(),
    )
}

fn group_payload(group: &GroupData) -> Vec<Value> {
    let subcommands: Vec<Value> = group.subcommands.iter().map(subcommand_payload).collect();
    match &group.labels {
        None => subcommands,
        Some(labels) => {
            let mut payload = Map::new();
            payload.insert("type".into(), json!(2));
            insert_labels(&mut payload, labels);
            payload.insert("options".into(), Value::Array(subcommands));
            vec![Value::Object(payload)]
        }
    }
}

fn subcommand_payload(subcommand: &SubcommandData) -> Value {
    let mut payload = Map::new();
    payload.insert("type".into(), json!(1));
    insert_labels(&mut payload, &subcommand.labels);
    payload.insert("options".into(), Value::Array(options_payload(&subcommand.options)));
    Value::Object(payload)
}

// The platform wants required options ahead of optional ones.
fn options_payload(options: &[OptionDescriptor]) -> Vec<Value> {
    let (required, optional): (Vec<_>, Vec<_>) = options.iter().partition(|o| o.required);
    required
        .into_iter()
        .chain(optional)
        .map(|option| {
            let mut payload = Map::new();
            payload.insert("type".into(), json!(option.wire.code()));
            insert_labels(&mut payload, &option.labels);
            payload.insert("required".into(), json!(option.required));
            if option.autocomplete {
                payload.insert("autocomplete".into(), json!(true));
            }
            if !option.choices.is_empty() {
                let choices = option
                    .choices
                    .iter()
                    .map(|c| {
                        json!({
                            "name": c.choice.label,
                            "name_localizations": localizations_payload(&c.name_localizations),
                            "value": c.choice.value.to_json(),
                        })
                    })
                    .collect();
                payload.insert("choices".into(), Value::Array(choices));
            }
            Value::Object(payload)
        })
        .collect()
}

/// Label synthesized for a key the message source has no text for:
/// separators become underscores, the result is lowercased and only its last
/// 32 characters are kept.
pub fn synthesize_label(key: &str) -> String {
    let slug = key.replace('.', "_").to_lowercase();
    let skip = slug.chars().count().saturating_sub(MAX_NAME_LEN);
    slug.chars().skip(skip).collect()
}

/// Compiles declarations into [`CommandDefinition`]s keyed by command name.
pub struct DescriptorCompiler {
    mapper: OptionMapper,
    messages: Arc<dyn MessageSource>,
    fallback: Locale,
    commands: DashMap<String, CommandDefinition>,
}

impl DescriptorCompiler {
    /// Empty compiler reading labels from `messages`.
    pub fn new(messages: Arc<dyn MessageSource>, fallback: Locale) -> Self {
        Self {
            mapper: OptionMapper::default(),
            messages,
            fallback,
            commands: DashMap::new(),
        }
    }

    /// Use `mapper` instead of the built-in option type table.
    pub fn with_mapper(mut self, mapper: OptionMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// The table the dispatcher must share to bind arguments.
    pub fn mapper(&self) -> &OptionMapper {
        &self.mapper
    }

    /// Locale whose labels are synthesized when no message exists.
    pub fn fallback_locale(&self) -> Locale {
        self.fallback
    }

    /// Text for `prefix + key` in every locale the message source knows.
    ///
    /// The fallback locale always gets an entry, synthesized when missing.
    pub fn localize(&self, prefix: &str, key: &str) -> Localizations {
        let full_key = format!("{prefix}{key}");
        let mut localizations = Localizations::new();
        for locale in Locale::ALL {
            match self.messages.get_message(&full_key, locale) {
                Some(text) => {
                    localizations.insert(locale, text);
                }
                None if locale == self.fallback => {
                    warn!("Unlocalized command key found: {full_key}");
                    localizations.insert(locale, synthesize_label(&full_key));
                }
                None => {}
            }
        }
        localizations
    }

    fn labels(&self, prefix: &str, path: &str, name: &str) -> Labels {
        let description_localizations = self.localize(prefix, &format!("{path}.description"));
        let description = description_localizations
            .get(&self.fallback)
            .cloned()
            .unwrap_or_default();
        Labels {
            name: name.to_string(),
            name_localizations: self.localize(prefix, &format!("{path}.name")),
            description,
            description_localizations,
        }
    }

    fn compile_options(
        &self,
        prefix: &str,
        path: &str,
        handle: &mut ExecutionHandle,
    ) -> Result<Vec<OptionDescriptor>, DescriptorError> {
        let mut options = Vec::new();
        let mut renames = Vec::new();
        for (index, parameter) in handle.parameters().iter().enumerate() {
            let Some(attrs) = &parameter.option else {
                continue;
            };
            let name = validate_name("option", &attrs.name)?;
            let option_path = format!("{path}.options.{name}");
            let (wire, choices) = match &parameter.kind {
                ParamKind::Choice(set) => {
                    let wire = set.wire_type()?;
                    let choices = set
                        .entries()
                        .iter()
                        .map(|choice| ChoiceDescriptor {
                            choice: choice.clone(),
                            name_localizations: self.localize(
                                prefix,
                                &format!("{option_path}.choices.{}.name", choice.label),
                            ),
                        })
                        .collect();
                    (wire, choices)
                }
                kind => (self.wire_type(&attrs.name, kind)?, Vec::new()),
            };
            options.push(OptionDescriptor {
                labels: self.labels(prefix, &option_path, &name),
                wire,
                required: !parameter.optional,
                autocomplete: attrs.autocomplete,
                choices,
            });
            renames.push((index, name));
        }
        for (index, name) in renames {
            handle.rename_option(index, name);
        }
        Ok(options)
    }

    fn wire_type(&self, option: &str, kind: &ParamKind) -> Result<WireType, DescriptorError> {
        self.mapper
            .wire_type_of(kind)
            .ok_or_else(|| DescriptorError::UnmappedKind {
                option: option.to_string(),
                kind: kind.to_string(),
            })
    }

    /// Attach one executor to the command named by `descriptor`.
    ///
    /// The first executor seen for a command creates its definition.
    pub fn register(
        &self,
        descriptor: &CommandDescriptor,
        executor: Executor,
    ) -> Result<(), DescriptorError> {
        let command = validate_name("command", &descriptor.name)?;
        let prefix = descriptor.translation_prefix.as_str();
        let subcommand = executor.subcommand.filter(|s| !s.is_empty());
        let group = executor.group.filter(|g| !g.is_empty());
        let mut handle = executor.handle;

        let Some(subcommand) = subcommand else {
            let options = self.compile_options(prefix, &command, &mut handle)?;
            let mut definition = self
                .commands
                .entry(command.clone())
                .or_insert_with(|| self.new_definition(descriptor, &command));
            if definition.subcommands.is_some() {
                return Err(DescriptorError::DirectWithSubcommands { command });
            }
            if definition.direct.is_some() {
                return Err(DescriptorError::DuplicateDirect { command });
            }
            debug!("Created single executor {} for {command}", handle.name());
            definition.options = options;
            definition.direct = Some(handle);
            return Ok(());
        };

        let subcommand = validate_name("subcommand", &subcommand)?;
        let group = group.map(|g| validate_name("group", &g)).transpose()?;
        let path = match &group {
            Some(group) => format!("{command}.{group}.{subcommand}"),
            None => format!("{command}.{subcommand}"),
        };
        let options = self.compile_options(prefix, &path, &mut handle)?;
        let group_name = group.unwrap_or_default();
        let key = format!("{group_name}{subcommand}");

        let mut definition = self
            .commands
            .entry(command.clone())
            .or_insert_with(|| self.new_definition(descriptor, &command));
        if definition.direct.is_some() {
            return Err(DescriptorError::SubcommandWithDirect {
                command,
                subcommand: key,
            });
        }
        let subcommands = definition.subcommands.get_or_insert_with(Default::default);
        if subcommands.executions.contains_key(&key) {
            return Err(DescriptorError::DuplicateSubcommand { command, key });
        }
        let group_data = subcommands
            .groups
            .entry(group_name.clone())
            .or_insert_with(|| GroupData {
                labels: (!group_name.is_empty()).then(|| {
                    self.labels(prefix, &format!("{command}.{group_name}"), &group_name)
                }),
                subcommands: Vec::new(),
            });
        group_data.subcommands.push(SubcommandData {
            labels: self.labels(prefix, &path, &subcommand),
            options,
        });
        debug!("Created subcommand executor {} for {command} ({key})", handle.name());
        subcommands.executions.insert(key, handle);
        Ok(())
    }

    fn new_definition(&self, descriptor: &CommandDescriptor, command: &str) -> CommandDefinition {
        CommandDefinition {
            labels: self.labels(&descriptor.translation_prefix, command, command),
            nsfw: descriptor.nsfw,
            guild_only: descriptor.guild_only,
            guilds: descriptor.guilds.clone(),
            options: Vec::new(),
            direct: None,
            subcommands: None,
        }
    }

    /// Compile every executor of a module.
    ///
    /// Any failure discards everything this module attached. A command that
    /// other modules had already built is restored as it was; one the module
    /// created is removed.
    pub fn install(&self, module: Arc<dyn SlashCommand>) -> Result<(), DescriptorError> {
        let descriptor = module.descriptor();
        let command = validate_name("command", &descriptor.name).ok();
        let before = command.as_deref().and_then(|name| self.definition(name));
        let result = module
            .executors()
            .into_iter()
            .try_for_each(|executor| self.register(&descriptor, executor));
        if let Err(e) = &result {
            error!("Discarding command module '{}': {e}", descriptor.name);
            if let Some(command) = command {
                match before {
                    Some(definition) => {
                        self.commands.insert(command, definition);
                    }
                    None => {
                        self.commands.remove(&command);
                    }
                }
            }
        }
        result
    }

    /// A copy of the compiled command called `name`.
    pub fn definition(&self, name: &str) -> Option<CommandDefinition> {
        self.commands.get(name).map(|entry| entry.value().clone())
    }

    /// Snapshot of every compiled command.
    pub fn definitions(&self) -> Vec<Arc<CommandDefinition>> {
        self.commands
            .iter()
            .map(|entry| Arc::new(entry.value().clone()))
            .collect()
    }

    /// Number of distinct top-level commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True until a module installs successfully.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
