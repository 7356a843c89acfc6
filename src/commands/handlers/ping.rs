//! /ping: report REST latency
//!
//! The latency check runs on a background task; its result is rendered by a
//! wrapped continuation so localization still sees the invoking user. An
//! explicit shard must exist in the session: `0 <= shard < shard_count`.

use anyhow::Result;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use super::{live_context, spawn_reply};
use crate::commands::descriptor::{
    Arguments, CommandDescriptor, ExecutionHandle, Executor, Parameter, SlashCommand,
};
use crate::commands::options::ParamKind;
use crate::context::{ContextPropagation, ScopeManager};
use crate::locale::LocalizedMessages;

const RESPONSE_KEY: &str = "interaction.ping.response";
const INVALID_SHARD_KEY: &str = "interaction.ping.invalid_shard";
const FAILED_KEY: &str = "interaction.ping.failed";

pub struct PingCommand {
    propagation: ContextPropagation,
    scopes: ScopeManager,
}

impl PingCommand {
    pub fn new(propagation: ContextPropagation, scopes: ScopeManager) -> Self {
        Self {
            propagation,
            scopes,
        }
    }

    fn ping(&self, args: &Arguments) -> Result<()> {
        let event = Arc::clone(args.event(0)?);
        let context = live_context("ping")?;

        let shard = match args.optional_integer(1)? {
            None => context.shard(),
            Some(requested) => {
                let shard_count = context.session().shard_count();
                match u32::try_from(requested) {
                    Ok(shard) if shard < shard_count => shard,
                    _ => {
                        let messages = self.scopes.get::<LocalizedMessages>()?;
                        let text = messages.get_or_key(INVALID_SHARD_KEY, &[&requested]);
                        spawn_reply(&context, event, text);
                        return Ok(());
                    }
                }
            }
        };

        let scopes = self.scopes.clone();
        let render = self.propagation.wrap(move |latency: Result<Duration>| -> Result<String> {
            let messages = scopes.get::<LocalizedMessages>()?;
            Ok(match latency {
                Ok(latency) => {
                    messages.get_or_key(RESPONSE_KEY, &[&shard, &latency.as_millis()])
                }
                Err(e) => {
                    warn!("REST latency check failed: {e}");
                    messages.get_or_key(FAILED_KEY, &[])
                }
            })
        });

        let session = Arc::clone(context.session());
        tokio::spawn(async move {
            let latency = session.rest_ping().await;
            let text = match render.call_with(latency) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to render /ping response: {e}");
                    return;
                }
            };
            match session.reply(&event, &text).await {
                Ok(()) => info!("Ping command completed on shard {shard}"),
                Err(e) => error!("Failed to reply to /ping: {e}"),
            }
        });
        Ok(())
    }
}

impl SlashCommand for PingCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new("ping")
    }

    fn executors(self: Arc<Self>) -> Vec<Executor> {
        let handle = ExecutionHandle::new(
            "ping",
            vec![
                Parameter::event(),
                Parameter::option("shard", ParamKind::Integer).optional(),
            ],
            move |args: Arguments| self.ping(&args),
        );
        vec![Executor::direct(handle)]
    }
}
