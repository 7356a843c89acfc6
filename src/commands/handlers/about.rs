//! /about: bot name, version and who asked

use anyhow::Result;
use std::sync::Arc;

use super::{live_context, spawn_reply};
use crate::commands::descriptor::{
    Arguments, CommandDescriptor, ExecutionHandle, Executor, Parameter, SlashCommand,
};
use crate::context::ScopeManager;
use crate::locale::LocalizedMessages;

const RESPONSE_KEY: &str = "interaction.about.response";

pub struct AboutCommand {
    scopes: ScopeManager,
}

impl AboutCommand {
    pub fn new(scopes: ScopeManager) -> Self {
        Self { scopes }
    }

    fn about(&self, args: &Arguments) -> Result<()> {
        let event = Arc::clone(args.event(0)?);
        let context = live_context("about")?;
        let messages = self.scopes.get::<LocalizedMessages>()?;
        let actor = context.actor().map(|user| user.name.as_str()).unwrap_or("?");
        let text = messages.get_or_key(
            RESPONSE_KEY,
            &[&env!("CARGO_PKG_NAME"), &env!("CARGO_PKG_VERSION"), &actor],
        );
        spawn_reply(&context, event, text);
        Ok(())
    }
}

impl SlashCommand for AboutCommand {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new("about")
    }

    fn executors(self: Arc<Self>) -> Vec<Executor> {
        let handle = ExecutionHandle::new(
            "about",
            vec![Parameter::event()],
            move |args: Arguments| self.about(&args),
        );
        vec![Executor::direct(handle)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::descriptor::Argument;
    use crate::commands::interaction::{InteractionEvent, UserRef};
    use crate::context::{ContextData, ContextPropagation};
    use crate::locale::{Locale, LocaleResolver, MessageSource, StaticMessages};
    use crate::platform::testing::RecordingPlatform;

    #[tokio::test]
    async fn test_about_names_the_actor() {
        let source: Arc<dyn MessageSource> = Arc::new(
            StaticMessages::new().with(Locale::EnglishUs, RESPONSE_KEY, "{0} {1}, asked by {2}"),
        );
        let scopes = ScopeManager::new();
        scopes.provide(move || {
            LocalizedMessages::new(Arc::clone(&source), LocaleResolver::new(Locale::EnglishUs))
        });
        let propagation = ContextPropagation::new().with_listener(Arc::new(scopes.clone()));
        let command = AboutCommand::new(scopes);
        let platform = Arc::new(RecordingPlatform::new());
        let context = ContextData::new(platform.clone(), 0).with_actor(UserRef::new(5, "leia"));
        let args = Arguments::new(vec![Argument::Event(Arc::new(InteractionEvent::new(1, "about")))]);

        propagation.scope(context, || command.about(&args)).unwrap();

        for _ in 0..100 {
            if !platform.replies().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        let expected = format!(
            "{} {}, asked by leia",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
        assert_eq!(platform.replies()[0].1, expected);
    }
}
