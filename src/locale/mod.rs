//! # Locales
//!
//! Platform locale tags, message lookup and per-context locale resolution.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Configurable fallback locale, YAML message bundles
//! - 1.0.0: Initial locale table and message source trait

pub mod messages;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

use crate::context::ContextData;

pub use messages::LocalizedMessages;

/// Locales the platform accepts in localization maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Locale {
    Indonesian,
    Danish,
    German,
    EnglishUk,
    EnglishUs,
    Spanish,
    SpanishLatam,
    French,
    Croatian,
    Italian,
    Lithuanian,
    Hungarian,
    Dutch,
    Norwegian,
    Polish,
    PortugueseBrazilian,
    Romanian,
    Finnish,
    Swedish,
    Vietnamese,
    Turkish,
    Czech,
    Greek,
    Bulgarian,
    Russian,
    Ukrainian,
    Hindi,
    Thai,
    ChineseChina,
    Japanese,
    ChineseTaiwan,
    Korean,
}

impl Locale {
    pub const ALL: [Locale; 32] = [
        Locale::Indonesian,
        Locale::Danish,
        Locale::German,
        Locale::EnglishUk,
        Locale::EnglishUs,
        Locale::Spanish,
        Locale::SpanishLatam,
        Locale::French,
        Locale::Croatian,
        Locale::Italian,
        Locale::Lithuanian,
        Locale::Hungarian,
        Locale::Dutch,
        Locale::Norwegian,
        Locale::Polish,
        Locale::PortugueseBrazilian,
        Locale::Romanian,
        Locale::Finnish,
        Locale::Swedish,
        Locale::Vietnamese,
        Locale::Turkish,
        Locale::Czech,
        Locale::Greek,
        Locale::Bulgarian,
        Locale::Russian,
        Locale::Ukrainian,
        Locale::Hindi,
        Locale::Thai,
        Locale::ChineseChina,
        Locale::Japanese,
        Locale::ChineseTaiwan,
        Locale::Korean,
    ];

    /// Wire tag, e.g. `en-US`.
    pub fn tag(self) -> &'static str {
        match self {
            Locale::Indonesian => "id",
            Locale::Danish => "da",
            Locale::German => "de",
            Locale::EnglishUk => "en-GB",
            Locale::EnglishUs => "en-US",
            Locale::Spanish => "es-ES",
            Locale::SpanishLatam => "es-419",
            Locale::French => "fr",
            Locale::Croatian => "hr",
            Locale::Italian => "it",
            Locale::Lithuanian => "lt",
            Locale::Hungarian => "hu",
            Locale::Dutch => "nl",
            Locale::Norwegian => "no",
            Locale::Polish => "pl",
            Locale::PortugueseBrazilian => "pt-BR",
            Locale::Romanian => "ro",
            Locale::Finnish => "fi",
            Locale::Swedish => "sv-SE",
            Locale::Vietnamese => "vi",
            Locale::Turkish => "tr",
            Locale::Czech => "cs",
            Locale::Greek => "el",
            Locale::Bulgarian => "bg",
            Locale::Russian => "ru",
            Locale::Ukrainian => "uk",
            Locale::Hindi => "hi",
            Locale::Thai => "th",
            Locale::ChineseChina => "zh-CN",
            Locale::Japanese => "ja",
            Locale::ChineseTaiwan => "zh-TW",
            Locale::Korean => "ko",
        }
    }

    /// Parse a wire tag. Matching ignores ASCII case and accepts `_` for `-`.
    pub fn from_tag(tag: &str) -> Option<Locale> {
        let wanted = tag.trim().replace('_', "-");
        Locale::ALL
            .iter()
            .copied()
            .find(|locale| locale.tag().eq_ignore_ascii_case(&wanted))
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Resolves `(key, locale)` pairs to text.
pub trait MessageSource: Send + Sync {
    fn get_message(&self, key: &str, locale: Locale) -> Option<String>;
}

/// In-memory message table.
#[derive(Debug, Clone, Default)]
pub struct StaticMessages {
    messages: HashMap<Locale, HashMap<String, String>>,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct MessageBundle(HashMap<String, HashMap<String, String>>);

impl StaticMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, locale: Locale, key: impl Into<String>, text: impl Into<String>) {
        self.messages
            .entry(locale)
            .or_default()
            .insert(key.into(), text.into());
    }

    pub fn with(mut self, locale: Locale, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(locale, key, text);
        self
    }

    /// Parse a YAML bundle shaped as `locale tag -> key -> text`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let bundle: MessageBundle = serde_yaml::from_str(yaml)?;
        let mut messages = Self::new();
        for (tag, entries) in bundle.0 {
            let locale = Locale::from_tag(&tag)
                .ok_or_else(|| anyhow!("Unsupported locale tag in message bundle: {tag}"))?;
            for (key, text) in entries {
                messages.insert(locale, key, text);
            }
        }
        Ok(messages)
    }

    /// Load a YAML bundle from disk.
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn len(&self) -> usize {
        self.messages.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageSource for StaticMessages {
    fn get_message(&self, key: &str, locale: Locale) -> Option<String> {
        self.messages
            .get(&locale)
            .and_then(|entries| entries.get(key))
            .cloned()
    }
}

/// Picks the locale used to talk to the actor of a context.
#[derive(Debug, Clone, Copy)]
pub struct LocaleResolver {
    default_locale: Locale,
}

impl LocaleResolver {
    pub fn new(default_locale: Locale) -> Self {
        Self { default_locale }
    }

    pub fn default_locale(&self) -> Locale {
        self.default_locale
    }

    /// User locale, then guild locale, then the configured default.
    pub fn resolve(&self, context: &ContextData) -> Locale {
        context
            .user_locale()
            .or_else(|| context.guild_locale())
            .unwrap_or(self.default_locale)
    }
}
