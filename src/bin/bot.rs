use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use serenity::prelude::*;
use std::sync::Arc;

use cordscope::commands::handlers::create_all_commands;
use cordscope::commands::{CommandRegistry, DescriptorCompiler, Dispatcher};
use cordscope::context::{ContextPropagation, ScopeManager};
use cordscope::core::Config;
use cordscope::locale::{LocaleResolver, LocalizedMessages, MessageSource, StaticMessages};
use cordscope::platform::CommandRouter;

fn load_messages(config: &Config) -> Result<Arc<dyn MessageSource>> {
    let messages = match &config.messages_path {
        Some(path) => {
            let messages = StaticMessages::load(path)?;
            info!("🌐 Loaded {} message(s) from {path}", messages.len());
            messages
        }
        None => {
            warn!("MESSAGES_PATH not set, command labels will be synthesized from keys");
            StaticMessages::new()
        }
    };
    Ok(Arc::new(messages))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting cordscope bot...");

    let messages = load_messages(&config)?;
    let resolver = LocaleResolver::new(config.default_locale);

    let scopes = ScopeManager::new();
    let scoped_source = Arc::clone(&messages);
    scopes.provide(move || LocalizedMessages::new(Arc::clone(&scoped_source), resolver));
    let propagation = ContextPropagation::new().with_listener(Arc::new(scopes.clone()));

    let compiler = Arc::new(DescriptorCompiler::new(messages, config.default_locale));
    for module in create_all_commands(&propagation, &scopes) {
        // A broken module is dropped on its own; the rest still register.
        if let Err(e) = compiler.install(module) {
            error!("Skipping command module: {e}");
        }
    }
    info!("📋 Compiled {} command(s)", compiler.len());

    let registry = Arc::new(CommandRegistry::new());
    let dispatcher = Dispatcher::new(Arc::clone(&registry), compiler.mapper().clone())
        .remove_stale_commands(config.remove_stale_commands);
    let router = CommandRouter::new(compiler, registry, dispatcher, propagation);

    let intents = GatewayIntents::GUILDS;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(router)
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    info!("Bot configured successfully. Connecting to Discord gateway...");

    if let Err(why) = client.start().await {
        error!("Gateway connection failed: {why:?}");
        return Err(anyhow::anyhow!(
            "Failed to establish gateway connection: {}",
            why
        ));
    }

    Ok(())
}
