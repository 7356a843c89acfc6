//! Inbound slash command events
//!
//! Platform-neutral view of one command invocation: which registered command
//! it targets, which sub-command path was chosen, and the raw option values.

use std::collections::HashMap;

use crate::locale::Locale;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: u64,
    pub name: String,
}

impl UserRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A user seen through a guild membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub user: UserRef,
    pub nick: Option<String>,
    pub roles: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: u64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub id: u64,
    pub filename: String,
    pub url: String,
    pub size: u64,
}

/// Raw option value as delivered by the platform.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    /// A user option; `member` is present when invoked inside a guild.
    User {
        user: UserRef,
        member: Option<MemberRef>,
    },
    Channel(ChannelRef),
    Role(RoleRef),
    /// A mentionable option whose target could not be resolved.
    Mentionable(u64),
    Number(f64),
    Attachment(AttachmentRef),
}

impl OptionValue {
    pub fn describe(&self) -> String {
        match self {
            OptionValue::Text(s) => format!("{s:?}"),
            OptionValue::Integer(i) => i.to_string(),
            OptionValue::Boolean(b) => b.to_string(),
            OptionValue::User { user, .. } => format!("user {}", user.id),
            OptionValue::Channel(c) => format!("channel {}", c.id),
            OptionValue::Role(r) => format!("role {}", r.id),
            OptionValue::Mentionable(id) => format!("mentionable {id}"),
            OptionValue::Number(n) => n.to_string(),
            OptionValue::Attachment(a) => format!("attachment {}", a.id),
        }
    }
}

/// One slash command invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionEvent {
    pub interaction_id: u64,
    pub token: String,
    /// Platform-assigned id of the invoked command.
    pub command_id: u64,
    pub command_name: String,
    pub subcommand: Option<String>,
    pub group: Option<String>,
    pub options: HashMap<String, OptionValue>,
    pub user: Option<UserRef>,
    pub user_locale: Option<Locale>,
    pub guild_id: Option<u64>,
    pub guild_locale: Option<Locale>,
    pub channel_id: u64,
    pub shard: u32,
}

impl InteractionEvent {
    pub fn new(command_id: u64, command_name: impl Into<String>) -> Self {
        Self {
            command_id,
            command_name: command_name.into(),
            ..Default::default()
        }
    }

    pub fn with_subcommand(mut self, group: Option<&str>, name: &str) -> Self {
        self.group = group.map(str::to_string);
        self.subcommand = Some(name.to_string());
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: OptionValue) -> Self {
        self.options.insert(name.into(), value);
        self
    }

    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    /// Key into a command's sub-command table: group followed by name.
    pub fn subcommand_key(&self) -> String {
        format!(
            "{}{}",
            self.group.as_deref().unwrap_or(""),
            self.subcommand.as_deref().unwrap_or("")
        )
    }
}
