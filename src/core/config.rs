//! Environment-backed bot configuration
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{anyhow, Context as _, Result};
use std::env;

use crate::locale::Locale;

/// Runtime configuration read from the process environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub log_level: String,
    /// Locale whose missing labels are synthesized from the key.
    pub default_locale: Locale,
    /// Optional YAML message bundle (`locale tag -> key -> text`).
    pub messages_path: Option<String>,
    /// Delete commands the platform knows about but this process does not.
    pub remove_stale_commands: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let discord_token =
            env::var("DISCORD_TOKEN").context("DISCORD_TOKEN environment variable not set")?;
        Self::from_lookup(discord_token, |key| env::var(key).ok())
    }

    fn from_lookup(discord_token: String, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if discord_token.trim().is_empty() {
            return Err(anyhow!("DISCORD_TOKEN must not be blank"));
        }

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let default_locale = match lookup("DEFAULT_LOCALE") {
            Some(tag) => Locale::from_tag(&tag)
                .ok_or_else(|| anyhow!("DEFAULT_LOCALE '{tag}' is not a supported locale tag"))?,
            None => Locale::EnglishUs,
        };

        let messages_path = lookup("MESSAGES_PATH").filter(|p| !p.trim().is_empty());

        let remove_stale_commands = match lookup("REMOVE_STALE_COMMANDS") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| anyhow!("REMOVE_STALE_COMMANDS must be true or false, got '{raw}'"))?,
            None => false,
        };

        Ok(Self {
            discord_token,
            log_level,
            default_locale,
            messages_path,
            remove_stale_commands,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup("token".into(), lookup(&[])).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.default_locale, Locale::EnglishUs);
        assert!(config.messages_path.is_none());
        assert!(!config.remove_stale_commands);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(
            "token".into(),
            lookup(&[
                ("LOG_LEVEL", "debug"),
                ("DEFAULT_LOCALE", "pt-BR"),
                ("MESSAGES_PATH", "messages.yaml"),
                ("REMOVE_STALE_COMMANDS", "yes"),
            ]),
        )
        .unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.default_locale, Locale::PortugueseBrazilian);
        assert_eq!(config.messages_path.as_deref(), Some("messages.yaml"));
        assert!(config.remove_stale_commands);
    }

    #[test]
    fn test_rejects_unknown_locale() {
        let err = Config::from_lookup("token".into(), lookup(&[("DEFAULT_LOCALE", "xx-YY")]));
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_blank_token() {
        assert!(Config::from_lookup("  ".into(), lookup(&[])).is_err());
    }

    #[test]
    fn test_rejects_bad_bool() {
        let err = Config::from_lookup(
            "token".into(),
            lookup(&[("REMOVE_STALE_COMMANDS", "maybe")]),
        );
        assert!(err.is_err());
    }
}
