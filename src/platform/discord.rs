//! # Discord Session
//!
//! Serenity-backed [`Platform`] plus the gateway event handler that feeds
//! slash command interactions into the dispatcher.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Shard total from `Ready` is carried by every session
//! - 1.1.0: Nested sub-command options are flattened into the event
//! - 1.0.0: Initial serenity session

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info};
use serde_json::json;
use serenity::http::Http;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::interaction::application_command::{
    ApplicationCommandInteraction, CommandDataOption, CommandDataOptionValue,
};
use serenity::model::application::interaction::Interaction;
use serenity::model::gateway::Ready;
use serenity::model::user::User;
use serenity::prelude::{Context, EventHandler};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{CommandScope, Platform};
use crate::commands::compiler::DescriptorCompiler;
use crate::commands::dispatcher::{DispatchOutcome, Dispatcher};
use crate::commands::interaction::{
    AttachmentRef, ChannelRef, InteractionEvent, MemberRef, OptionValue, RoleRef, UserRef,
};
use crate::commands::registry::CommandRegistry;
use crate::context::{ContextData, ContextPropagation};
use crate::locale::Locale;

/// Interaction callback: reply with a channel message.
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;

pub struct SerenityPlatform {
    http: Arc<Http>,
    shard_count: u32,
}

impl SerenityPlatform {
    /// Session over `http` for a connection running `shard_count` shards.
    pub fn new(http: Arc<Http>, shard_count: u32) -> Self {
        Self {
            http,
            shard_count: shard_count.max(1),
        }
    }
}

#[async_trait]
impl Platform for SerenityPlatform {
    async fn upsert_command(&self, scope: CommandScope, payload: &serde_json::Value) -> Result<u64> {
        let command = match scope {
            CommandScope::Global => self.http.create_global_application_command(payload).await?,
            CommandScope::Guild(guild_id) => {
                self.http
                    .create_guild_application_command(guild_id, payload)
                    .await?
            }
        };
        Ok(command.id.0)
    }

    async fn delete_command(&self, scope: CommandScope, command_id: u64) -> Result<()> {
        match scope {
            CommandScope::Global => {
                self.http
                    .delete_global_application_command(command_id)
                    .await?
            }
            CommandScope::Guild(guild_id) => {
                self.http
                    .delete_guild_application_command(guild_id, command_id)
                    .await?
            }
        }
        Ok(())
    }

    async fn reply(&self, event: &InteractionEvent, content: &str) -> Result<()> {
        let body = json!({
            "type": CHANNEL_MESSAGE_WITH_SOURCE,
            "data": { "content": content },
        });
        self.http
            .create_interaction_response(event.interaction_id, &event.token, &body)
            .await?;
        Ok(())
    }

    async fn rest_ping(&self) -> Result<Duration> {
        let started = Instant::now();
        self.http.get_current_user().await?;
        Ok(started.elapsed())
    }

    fn shard_count(&self) -> u32 {
        self.shard_count
    }
}

/// Build the platform-neutral event for a command interaction.
pub fn interaction_event(command: &ApplicationCommandInteraction, shard: u32) -> InteractionEvent {
    let mut event = InteractionEvent {
        interaction_id: command.id.0,
        token: command.token.clone(),
        command_id: command.data.id.0,
        command_name: command.data.name.clone(),
        user: Some(user_ref(&command.user)),
        user_locale: Locale::from_tag(&command.locale),
        guild_id: command.guild_id.map(|g| g.0),
        guild_locale: command.guild_locale.as_deref().and_then(Locale::from_tag),
        channel_id: command.channel_id.0,
        shard,
        ..Default::default()
    };
    collect_options(&command.data.options, &mut event);
    event
}

fn collect_options(options: &[CommandDataOption], event: &mut InteractionEvent) {
    for option in options {
        match option.kind {
            CommandOptionType::SubCommandGroup => {
                event.group = Some(option.name.clone());
                collect_options(&option.options, event);
            }
            CommandOptionType::SubCommand => {
                event.subcommand = Some(option.name.clone());
                collect_options(&option.options, event);
            }
            _ => {
                if let Some(value) = option_value(option) {
                    event.options.insert(option.name.clone(), value);
                }
            }
        }
    }
}

fn user_ref(user: &User) -> UserRef {
    UserRef::new(user.id.0, user.name.clone())
}

fn option_value(option: &CommandDataOption) -> Option<OptionValue> {
    let Some(resolved) = &option.resolved else {
        return raw_option_value(option);
    };
    let value = match resolved {
        CommandDataOptionValue::String(s) => OptionValue::Text(s.clone()),
        CommandDataOptionValue::Integer(i) => OptionValue::Integer(*i),
        CommandDataOptionValue::Boolean(b) => OptionValue::Boolean(*b),
        CommandDataOptionValue::Number(n) => OptionValue::Number(*n),
        CommandDataOptionValue::User(user, member) => OptionValue::User {
            user: user_ref(user),
            member: member.as_ref().map(|m| MemberRef {
                user: user_ref(user),
                nick: m.nick.clone(),
                roles: m.roles.iter().map(|r| r.0).collect(),
            }),
        },
        CommandDataOptionValue::Channel(channel) => OptionValue::Channel(ChannelRef {
            id: channel.id.0,
            name: channel.name.clone(),
        }),
        CommandDataOptionValue::Role(role) => OptionValue::Role(RoleRef {
            id: role.id.0,
            name: role.name.clone(),
        }),
        CommandDataOptionValue::Attachment(attachment) => OptionValue::Attachment(AttachmentRef {
            id: attachment.id.0,
            filename: attachment.filename.clone(),
            url: attachment.url.clone(),
            size: attachment.size,
        }),
        _ => return raw_option_value(option),
    };
    Some(value)
}

// Values the gateway did not resolve, read straight from the JSON.
fn raw_option_value(option: &CommandDataOption) -> Option<OptionValue> {
    let raw = option.value.as_ref()?;
    match option.kind {
        CommandOptionType::String => raw.as_str().map(|s| OptionValue::Text(s.to_string())),
        CommandOptionType::Integer => raw.as_i64().map(OptionValue::Integer),
        CommandOptionType::Boolean => raw.as_bool().map(OptionValue::Boolean),
        CommandOptionType::Number => raw.as_f64().map(OptionValue::Number),
        CommandOptionType::Mentionable => raw
            .as_str()
            .and_then(|id| id.parse().ok())
            .map(OptionValue::Mentionable),
        _ => None,
    }
}

/// Gateway event handler: registers commands once ready and dispatches every
/// slash command inside its own context.
pub struct CommandRouter {
    compiler: Arc<DescriptorCompiler>,
    registry: Arc<CommandRegistry>,
    dispatcher: Dispatcher,
    propagation: ContextPropagation,
    shard_count: AtomicU32,
}

impl CommandRouter {
    pub fn new(
        compiler: Arc<DescriptorCompiler>,
        registry: Arc<CommandRegistry>,
        dispatcher: Dispatcher,
        propagation: ContextPropagation,
    ) -> Self {
        Self {
            compiler,
            registry,
            dispatcher,
            propagation,
            shard_count: AtomicU32::new(1),
        }
    }

    fn session(&self, ctx: &Context) -> Arc<dyn Platform> {
        Arc::new(SerenityPlatform::new(
            Arc::clone(&ctx.http),
            self.shard_count.load(Ordering::Relaxed),
        ))
    }
}

#[async_trait]
impl EventHandler for CommandRouter {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🎉 {} is connected and ready!", ready.user.name);
        info!("📡 Connected to {} guilds", ready.guilds.len());
        if let Some(shard) = ready.shard {
            info!("⚡ Shard: {}/{}", shard[0] + 1, shard[1]);
            let total = u32::try_from(shard[1]).unwrap_or(u32::MAX);
            self.shard_count.store(total.max(1), Ordering::Relaxed);
        }

        let platform = self.session(&ctx);
        let pending = self
            .registry
            .register_definitions(platform, self.compiler.definitions());
        info!("📝 Registering {} command(s)", pending.len());
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::ApplicationCommand(command) = interaction else {
            return;
        };
        let event = interaction_event(&command, ctx.shard_id as u32);
        let session = self.session(&ctx);
        let context = ContextData::from_interaction(&event, session);

        match self
            .propagation
            .scope(context, || self.dispatcher.dispatch(event))
        {
            Ok(DispatchOutcome::Invoked { handle }) => {
                debug!("Slash command '{}' handled by {handle}", command.data.name);
            }
            Ok(DispatchOutcome::UnknownCommand { .. }) => {}
            Err(e) => {
                error!("Error handling slash command '{}': {e:#}", command.data.name);
            }
        }
    }
}
