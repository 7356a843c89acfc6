//! # Dispatcher
//!
//! Routes one inbound interaction to its execution handle: look up the
//! registered command, pick the direct or sub-command handle, bind arguments
//! positionally, invoke.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Optional removal of stale registrations
//! - 1.0.0: Initial dispatcher

use log::{debug, error, warn};
use std::sync::Arc;

use super::compiler::CommandDefinition;
use super::descriptor::{Argument, Arguments, ExecutionHandle, Parameter};
use super::interaction::InteractionEvent;
use super::options::{ArgValue, OptionMapper, ParamKind};
use super::registry::CommandRegistry;
use crate::context;
use crate::core::{DescriptorError, DispatchError};
use crate::platform::CommandScope;

/// What happened to a dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handle ran to completion.
    Invoked { handle: String },
    /// No registered command has this id; the event was dropped.
    UnknownCommand { command_id: u64 },
}

pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    mapper: OptionMapper,
    remove_stale: bool,
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>, mapper: OptionMapper) -> Self {
        Self {
            registry,
            mapper,
            remove_stale: false,
        }
    }

    /// Delete unknown command ids from the platform when they are invoked.
    pub fn remove_stale_commands(mut self, enabled: bool) -> Self {
        self.remove_stale = enabled;
        self
    }

    /// Handle one event on the calling thread.
    ///
    /// Handler errors are returned as [`DispatchError::Handler`]; binding
    /// problems as [`DispatchError::Descriptor`].
    pub fn dispatch(&self, event: InteractionEvent) -> Result<DispatchOutcome, DispatchError> {
        let Some(registered) = self.registry.get(event.command_id) else {
            warn!(
                "Invalid command with ID:{} ({})",
                event.command_id, event.command_name
            );
            if self.remove_stale {
                self.delete_stale(event.command_id);
            }
            return Ok(DispatchOutcome::UnknownCommand {
                command_id: event.command_id,
            });
        };

        let event = Arc::new(event);
        let handle = resolve(&registered.definition, &event)?;
        let arguments = self.bind(handle, &event)?;
        debug!(
            "Dispatching /{} to {} with {} argument(s)",
            registered.definition.name(),
            handle.name(),
            arguments.len()
        );
        handle
            .invoke(arguments)
            .map_err(|source| DispatchError::Handler {
                handle: handle.name().to_string(),
                source,
            })?;
        Ok(DispatchOutcome::Invoked {
            handle: handle.name().to_string(),
        })
    }

    // Uses the live context's session; without one there is nothing to call.
    fn delete_stale(&self, command_id: u64) {
        let Some(context) = context::current() else {
            warn!("No live context, not removing stale command {command_id}");
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, not removing stale command {command_id}");
            return;
        };
        let session = Arc::clone(context.session());
        runtime.spawn(async move {
            if let Err(e) = session.delete_command(CommandScope::Global, command_id).await {
                error!("Failed to remove stale command {command_id}: {e}");
            }
        });
    }

    /// Bind each declared parameter of `handle` from `event`.
    pub fn bind(
        &self,
        handle: &ExecutionHandle,
        event: &Arc<InteractionEvent>,
    ) -> Result<Arguments, DescriptorError> {
        handle
            .parameters()
            .iter()
            .enumerate()
            .map(|(position, parameter)| self.bind_one(position, parameter, event))
            .collect::<Result<Vec<_>, _>>()
            .map(Arguments::new)
    }

    fn bind_one(
        &self,
        position: usize,
        parameter: &Parameter,
        event: &Arc<InteractionEvent>,
    ) -> Result<Argument, DescriptorError> {
        let Some(name) = parameter.option_name() else {
            return match parameter.kind {
                ParamKind::Event => Ok(Argument::Event(Arc::clone(event))),
                ref other => Err(DescriptorError::UnknownArgument {
                    kind: other.to_string(),
                    position,
                }),
            };
        };

        let Some(raw) = event.option(name) else {
            return if parameter.optional {
                Ok(Argument::Optional(None))
            } else {
                Err(DescriptorError::MissingOption {
                    option: name.to_string(),
                })
            };
        };

        let mismatch = || DescriptorError::OptionMismatch {
            option: name.to_string(),
            expected: parameter.kind.to_string(),
        };
        let value = match &parameter.kind {
            ParamKind::Choice(set) => {
                let value = self.mapper.choice_value(set, raw).ok_or_else(mismatch)?;
                let choice = set.find(&value).ok_or_else(|| DescriptorError::UnknownChoice {
                    option: name.to_string(),
                    choices: set.type_name().to_string(),
                    value: value.to_string(),
                })?;
                ArgValue::Choice(choice.clone())
            }
            kind => self.mapper.convert(kind, raw).ok_or_else(mismatch)?,
        };

        Ok(if parameter.optional {
            Argument::Optional(Some(value))
        } else {
            Argument::Value(value)
        })
    }
}

/// The direct handle, or the sub-command handle keyed by group and name.
fn resolve<'a>(
    definition: &'a CommandDefinition,
    event: &InteractionEvent,
) -> Result<&'a ExecutionHandle, DescriptorError> {
    let key = event.subcommand_key();
    definition
        .handle_for(&key)
        .ok_or_else(|| DescriptorError::MissingSubcommand {
            command: definition.name().to_string(),
            key,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::choices::tests::Speed;
    use crate::commands::compiler::DescriptorCompiler;
    use crate::commands::descriptor::{CommandDescriptor, Executor};
    use crate::commands::interaction::OptionValue;
    use crate::context::{ContextData, ContextPropagation};
    use crate::locale::{Locale, StaticMessages};
    use crate::platform::testing::RecordingPlatform;
    use anyhow::anyhow;
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<Arguments>>>;

    fn recording(name: &str, parameters: Vec<Parameter>, seen: &Seen) -> ExecutionHandle {
        let seen = Arc::clone(seen);
        ExecutionHandle::new(name, parameters, move |args: Arguments| {
            seen.lock().unwrap().push(args);
            Ok(())
        })
    }

    /// Compile `executors` under one command and register it as id 1.
    fn dispatcher(executors: Vec<Executor>) -> Dispatcher {
        let compiler = DescriptorCompiler::new(Arc::new(StaticMessages::new()), Locale::EnglishUs);
        let descriptor = CommandDescriptor::new("cmd");
        for executor in executors {
            compiler.register(&descriptor, executor).unwrap();
        }
        let registry = Arc::new(CommandRegistry::new());
        for definition in compiler.definitions() {
            registry.insert(1, CommandScope::Global, definition);
        }
        Dispatcher::new(registry, OptionMapper::default())
    }

    #[test]
    fn test_zero_option_command() {
        let seen = Seen::default();
        let dispatcher = dispatcher(vec![Executor::direct(recording("bare", vec![], &seen))]);

        let outcome = dispatcher.dispatch(InteractionEvent::new(1, "cmd")).unwrap();

        assert_eq!(outcome, DispatchOutcome::Invoked { handle: "bare".into() });
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_empty());
    }

    #[test]
    fn test_required_text_and_event() {
        let seen = Seen::default();
        let dispatcher = dispatcher(vec![Executor::direct(recording(
            "echo",
            vec![Parameter::event(), Parameter::option("text", ParamKind::Text)],
            &seen,
        ))]);

        let event = InteractionEvent::new(1, "cmd").with_option("text", OptionValue::Text("foo".into()));
        dispatcher.dispatch(event).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].event(0).unwrap().command_id, 1);
        assert_eq!(seen[0].text(1).unwrap(), "foo");
    }

    #[test]
    fn test_optional_integer_absent() {
        let seen = Seen::default();
        let dispatcher = dispatcher(vec![Executor::direct(recording(
            "count",
            vec![Parameter::option("n", ParamKind::Integer).optional()],
            &seen,
        ))]);

        dispatcher.dispatch(InteractionEvent::new(1, "cmd")).unwrap();
        dispatcher
            .dispatch(InteractionEvent::new(1, "cmd").with_option("n", OptionValue::Integer(4)))
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].get(0), Some(&Argument::Optional(None)));
        assert_eq!(seen[1].optional_integer(0).unwrap(), Some(4));
    }

    #[test]
    fn test_grouped_subcommand() {
        let seen = Seen::default();
        let dispatcher = dispatcher(vec![
            Executor::subcommand("bar", recording("grouped", vec![], &seen)).in_group("g"),
            Executor::subcommand("bar", recording("plain", vec![], &seen)),
        ]);

        let grouped = InteractionEvent::new(1, "cmd").with_subcommand(Some("g"), "bar");
        assert_eq!(
            dispatcher.dispatch(grouped).unwrap(),
            DispatchOutcome::Invoked { handle: "grouped".into() }
        );
        let plain = InteractionEvent::new(1, "cmd").with_subcommand(None, "bar");
        assert_eq!(
            dispatcher.dispatch(plain).unwrap(),
            DispatchOutcome::Invoked { handle: "plain".into() }
        );

        let unknown = InteractionEvent::new(1, "cmd").with_subcommand(Some("h"), "bar");
        assert!(matches!(
            dispatcher.dispatch(unknown),
            Err(DispatchError::Descriptor(DescriptorError::MissingSubcommand { .. }))
        ));
    }

    #[test]
    fn test_choice_binding() {
        let seen = Seen::default();
        let dispatcher = dispatcher(vec![Executor::direct(recording(
            "speed",
            vec![Parameter::choice::<Speed>("speed")],
            &seen,
        ))]);

        dispatcher
            .dispatch(InteractionEvent::new(1, "cmd").with_option("speed", OptionValue::Integer(10)))
            .unwrap();
        assert_eq!(seen.lock().unwrap()[0].choice::<Speed>(0).unwrap(), Speed::Fast);

        let result = dispatcher
            .dispatch(InteractionEvent::new(1, "cmd").with_option("speed", OptionValue::Integer(3)));
        assert!(matches!(
            result,
            Err(DispatchError::Descriptor(DescriptorError::UnknownChoice { .. }))
        ));
    }

    #[test]
    fn test_unknown_argument_kind() {
        let seen = Seen::default();
        let dispatcher = dispatcher(vec![Executor::direct(recording(
            "odd",
            vec![Parameter::event(), Parameter::opaque::<String>()],
            &seen,
        ))]);

        let result = dispatcher.dispatch(InteractionEvent::new(1, "cmd"));
        assert!(matches!(
            result,
            Err(DispatchError::Descriptor(DescriptorError::UnknownArgument { position: 1, .. }))
        ));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_option_type_mismatch() {
        let seen = Seen::default();
        let dispatcher = dispatcher(vec![Executor::direct(recording(
            "num",
            vec![Parameter::option("n", ParamKind::Integer)],
            &seen,
        ))]);

        let result = dispatcher
            .dispatch(InteractionEvent::new(1, "cmd").with_option("n", OptionValue::Text("x".into())));
        assert!(matches!(
            result,
            Err(DispatchError::Descriptor(DescriptorError::OptionMismatch { .. }))
        ));
        let result = dispatcher.dispatch(InteractionEvent::new(1, "cmd"));
        assert!(matches!(
            result,
            Err(DispatchError::Descriptor(DescriptorError::MissingOption { .. }))
        ));
    }

    #[test]
    fn test_handler_error_propagates() {
        let handle = ExecutionHandle::new("fails", vec![], |_: Arguments| Err(anyhow!("boom")));
        let dispatcher = dispatcher(vec![Executor::direct(handle)]);

        match dispatcher.dispatch(InteractionEvent::new(1, "cmd")) {
            Err(DispatchError::Handler { handle, source }) => {
                assert_eq!(handle, "fails");
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_command_dropped() {
        let seen = Seen::default();
        let dispatcher = dispatcher(vec![Executor::direct(recording("bare", vec![], &seen))]);

        let outcome = dispatcher.dispatch(InteractionEvent::new(99, "gone")).unwrap();

        assert_eq!(outcome, DispatchOutcome::UnknownCommand { command_id: 99 });
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_command_removed() {
        let platform = Arc::new(RecordingPlatform::new());
        let dispatcher = dispatcher(vec![]).remove_stale_commands(true);
        let context = ContextData::new(platform.clone(), 0);

        ContextPropagation::new().scope(context, || {
            dispatcher.dispatch(InteractionEvent::new(99, "gone")).unwrap()
        });

        for _ in 0..50 {
            if !platform.deletions().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(platform.deletions(), [(CommandScope::Global, 99)]);
    }

    #[tokio::test]
    async fn test_registered_ids_dispatch_to_handlers() {
        let seen = Seen::default();
        let compiler = DescriptorCompiler::new(Arc::new(StaticMessages::new()), Locale::EnglishUs);
        let commands = vec![
            ("bare", Executor::direct(recording("bare", vec![], &seen))),
            (
                "echo",
                Executor::direct(recording(
                    "echo",
                    vec![Parameter::event(), Parameter::option("text", ParamKind::Text)],
                    &seen,
                )),
            ),
            (
                "count",
                Executor::direct(recording(
                    "count",
                    vec![Parameter::option("n", ParamKind::Integer).optional()],
                    &seen,
                )),
            ),
            (
                "cmd",
                Executor::subcommand("bar", recording("grouped", vec![], &seen)).in_group("g"),
            ),
        ];
        for (name, executor) in commands {
            compiler.register(&CommandDescriptor::new(name), executor).unwrap();
        }

        let platform = Arc::new(RecordingPlatform::new());
        let registry = Arc::new(CommandRegistry::new());
        for pending in registry.register_definitions(platform.clone(), compiler.definitions()) {
            pending.await.unwrap();
        }
        let upserts = platform.upserts();
        assert_eq!(upserts.len(), 4);
        let id_of = |name: &str| {
            upserts
                .iter()
                .find(|(_, payload, _)| payload["name"] == name)
                .map(|(_, _, id)| *id)
                .unwrap()
        };
        let dispatcher = Dispatcher::new(Arc::clone(&registry), compiler.mapper().clone());

        let bare = InteractionEvent::new(id_of("bare"), "bare");
        assert_eq!(
            dispatcher.dispatch(bare).unwrap(),
            DispatchOutcome::Invoked { handle: "bare".into() }
        );

        let echo = InteractionEvent::new(id_of("echo"), "echo")
            .with_option("text", OptionValue::Text("foo".into()));
        assert_eq!(
            dispatcher.dispatch(echo).unwrap(),
            DispatchOutcome::Invoked { handle: "echo".into() }
        );

        let count = InteractionEvent::new(id_of("count"), "count");
        assert_eq!(
            dispatcher.dispatch(count).unwrap(),
            DispatchOutcome::Invoked { handle: "count".into() }
        );

        let grouped = InteractionEvent::new(id_of("cmd"), "cmd").with_subcommand(Some("g"), "bar");
        assert_eq!(
            dispatcher.dispatch(grouped).unwrap(),
            DispatchOutcome::Invoked { handle: "grouped".into() }
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen[0].is_empty());
        assert_eq!(seen[1].event(0).unwrap().command_id, id_of("echo"));
        assert_eq!(seen[1].text(1).unwrap(), "foo");
        assert_eq!(seen[2].get(0), Some(&Argument::Optional(None)));
        assert!(seen[3].is_empty());
    }
}
