//! Built-in slash commands
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.0.0: /ping and /about

pub mod about;
pub mod ping;

use anyhow::{anyhow, Result};
use log::error;
use std::sync::Arc;

use super::descriptor::SlashCommand;
use super::interaction::InteractionEvent;
use crate::context::{self, ContextData, ContextPropagation, ScopeManager};

/// Every built-in command module, ready for
/// [`DescriptorCompiler::install`](super::compiler::DescriptorCompiler::install).
pub fn create_all_commands(
    propagation: &ContextPropagation,
    scopes: &ScopeManager,
) -> Vec<Arc<dyn SlashCommand>> {
    vec![
        Arc::new(ping::PingCommand::new(propagation.clone(), scopes.clone())),
        Arc::new(about::AboutCommand::new(scopes.clone())),
    ]
}

fn live_context(command: &str) -> Result<Arc<ContextData>> {
    context::current().ok_or_else(|| anyhow!("/{command} invoked outside an event context"))
}

/// Send `content` as the reply to `event` on a background task.
fn spawn_reply(context: &ContextData, event: Arc<InteractionEvent>, content: String) {
    let session = Arc::clone(context.session());
    tokio::spawn(async move {
        if let Err(e) = session.reply(&event, &content).await {
            error!("Failed to reply to /{}: {e}", event.command_name);
        }
    });
}
