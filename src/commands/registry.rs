//! Registered command table
//!
//! Pushes compiled commands to the platform once per process and records the
//! id the platform assigned to each registration.
//!
//! - **Version**: 2.0.1
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.1: Upsert success logged at debug
//! - 2.0.0: Keyed by platform command id, asynchronous upserts
//! - 1.0.0: Initial implementation for handler dispatch

use dashmap::DashMap;
use log::{debug, error, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::compiler::CommandDefinition;
use crate::platform::{CommandScope, Platform};

/// A command the platform accepted.
#[derive(Debug, Clone)]
pub struct RegisteredCommand {
    pub id: u64,
    pub scope: CommandScope,
    pub definition: Arc<CommandDefinition>,
}

/// Maps platform command ids to compiled definitions.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Arc<DashMap<u64, RegisteredCommand>>,
    started: AtomicBool,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert every definition, in its guilds when it lists any and globally
    /// otherwise.
    ///
    /// Only the first call per registry does anything. Upserts run as
    /// background tasks; failures are logged and never retried.
    pub fn register_definitions(
        &self,
        platform: Arc<dyn Platform>,
        definitions: Vec<Arc<CommandDefinition>>,
    ) -> Vec<JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Commands already registered for this process, skipping");
            return Vec::new();
        }

        let mut pending = Vec::new();
        for definition in definitions {
            let payload = Arc::new(definition.to_payload());
            let scopes: Vec<CommandScope> = if definition.guilds.is_empty() {
                vec![CommandScope::Global]
            } else {
                definition.guilds.iter().copied().map(CommandScope::Guild).collect()
            };
            for scope in scopes {
                let platform = Arc::clone(&platform);
                let payload = Arc::clone(&payload);
                let definition = Arc::clone(&definition);
                let commands = Arc::clone(&self.commands);
                pending.push(tokio::spawn(async move {
                    match platform.upsert_command(scope, &payload).await {
                        Ok(id) => {
                            debug!("Registered /{} ({scope}) as {id}", definition.name());
                            commands.insert(
                                id,
                                RegisteredCommand {
                                    id,
                                    scope,
                                    definition,
                                },
                            );
                        }
                        Err(e) => {
                            error!("Failed to register /{} ({scope}): {e}", definition.name());
                        }
                    }
                }));
            }
        }
        pending
    }

    /// The registration the platform knows under `id`.
    pub fn get(&self, id: u64) -> Option<RegisteredCommand> {
        self.commands.get(&id).map(|entry| entry.value().clone())
    }

    /// Whether an upsert for `id` has completed.
    pub fn contains(&self, id: u64) -> bool {
        self.commands.contains_key(&id)
    }

    /// Number of accepted registrations, one per scope.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True until the first upsert succeeds.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn insert(&self, id: u64, scope: CommandScope, definition: Arc<CommandDefinition>) {
        self.commands.insert(
            id,
            RegisteredCommand {
                id,
                scope,
                definition,
            },
        );
    }
}
