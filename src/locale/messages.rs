//! Per-event localized messages
//!
//! A context-scoped object: the first lookup inside an event creates it,
//! fixes its locale from that event's context, and every later lookup in the
//! same context reuses it.

use std::fmt::Display;
use std::sync::Arc;

use super::{Locale, LocaleResolver, MessageSource};
use crate::context::{ContextAware, ContextData, ScopedObject};

pub struct LocalizedMessages {
    source: Arc<dyn MessageSource>,
    resolver: LocaleResolver,
    locale: Option<Locale>,
}

impl LocalizedMessages {
    pub fn new(source: Arc<dyn MessageSource>, resolver: LocaleResolver) -> Self {
        Self {
            source,
            resolver,
            locale: None,
        }
    }

    /// The locale chosen for the context, or the default outside one.
    pub fn locale(&self) -> Locale {
        self.locale.unwrap_or(self.resolver.default_locale())
    }

    /// Text for `key` with `{0}`, `{1}`, ... replaced by `args`.
    ///
    /// Falls back to the default locale before giving up.
    pub fn get(&self, key: &str, args: &[&dyn Display]) -> Option<String> {
        self.source
            .get_message(key, self.locale())
            .or_else(|| self.source.get_message(key, self.resolver.default_locale()))
            .map(|template| format_message(&template, args))
    }

    /// Like [`get`](Self::get) but returns the key itself when nothing matches.
    pub fn get_or_key(&self, key: &str, args: &[&dyn Display]) -> String {
        self.get(key, args).unwrap_or_else(|| key.to_string())
    }
}

impl ContextAware for LocalizedMessages {
    fn set_context(&mut self, context: &ContextData) {
        self.locale = Some(self.resolver.resolve(context));
    }
}

impl ScopedObject for LocalizedMessages {
    fn as_context_aware(&mut self) -> Option<&mut dyn ContextAware> {
        Some(self)
    }
}

/// Replace positional `{n}` placeholders.
pub fn format_message(template: &str, args: &[&dyn Display]) -> String {
    args.iter()
        .enumerate()
        .fold(template.to_string(), |text, (index, arg)| {
            text.replace(&format!("{{{index}}}"), &arg.to_string())
        })
}
