//! # Option Mapper
//!
//! Ordered table translating declared parameter kinds to wire option types
//! and raw option values back into handler arguments.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Choice value conversion
//! - 1.0.0: Initial precedence table

use std::fmt;

use super::choices::{Choice, ChoiceSet, ChoiceValue};
use super::interaction::{AttachmentRef, ChannelRef, MemberRef, OptionValue, RoleRef, UserRef};

/// Option types understood by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Text,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Attachment,
}

impl WireType {
    /// Numeric option type sent in registration payloads.
    pub fn code(self) -> u8 {
        match self {
            WireType::Text => 3,
            WireType::Integer => 4,
            WireType::Boolean => 5,
            WireType::User => 6,
            WireType::Channel => 7,
            WireType::Role => 8,
            WireType::Mentionable => 9,
            WireType::Number => 10,
            WireType::Attachment => 11,
        }
    }

    pub fn supports_choices(self) -> bool {
        matches!(self, WireType::Text | WireType::Integer | WireType::Number)
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Text => "text",
            WireType::Integer => "integer",
            WireType::Boolean => "boolean",
            WireType::User => "user",
            WireType::Channel => "channel",
            WireType::Role => "role",
            WireType::Mentionable => "mentionable",
            WireType::Number => "number",
            WireType::Attachment => "attachment",
        };
        f.write_str(name)
    }
}

/// Declared kind of a handler parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Text,
    Integer,
    Boolean,
    User,
    Member,
    Channel,
    Role,
    /// Anything that can be mentioned: users, members or roles.
    Mentionable,
    Number,
    Attachment,
    Choice(ChoiceSet),
    /// The originating interaction event.
    Event,
    /// A type the dispatcher cannot supply.
    Opaque(&'static str),
}

impl ParamKind {
    /// Whether this kind can stand in where a mentionable is expected.
    pub fn is_mentionable(&self) -> bool {
        matches!(
            self,
            ParamKind::User | ParamKind::Member | ParamKind::Role | ParamKind::Mentionable
        )
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Choice(set) => write!(f, "choice<{}>", set.type_name()),
            ParamKind::Opaque(name) => f.write_str(name),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mentionable {
    User(UserRef),
    Role(RoleRef),
    /// Target id without resolved data.
    Unresolved(u64),
}

/// A converted option value, ready to hand to a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    User(UserRef),
    Member(MemberRef),
    Channel(ChannelRef),
    Role(RoleRef),
    Mentionable(Mentionable),
    Number(f64),
    Attachment(AttachmentRef),
    Choice(Choice),
}

/// One row of the precedence table.
#[derive(Clone, Copy)]
pub struct TypeMapping {
    pub name: &'static str,
    pub matches: fn(&ParamKind) -> bool,
    pub wire: WireType,
    pub extract: fn(&OptionValue) -> Option<ArgValue>,
}

impl fmt::Debug for TypeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMapping")
            .field("name", &self.name)
            .field("wire", &self.wire)
            .finish()
    }
}

/// First matching row wins, so concrete kinds sit above broader capabilities.
#[derive(Debug, Clone)]
pub struct OptionMapper {
    table: Vec<TypeMapping>,
}

impl Default for OptionMapper {
    fn default() -> Self {
        Self::new(standard_table())
    }
}

impl OptionMapper {
    pub fn new(table: Vec<TypeMapping>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &[TypeMapping] {
        &self.table
    }

    fn mapping_for(&self, kind: &ParamKind) -> Option<&TypeMapping> {
        self.table.iter().find(|mapping| (mapping.matches)(kind))
    }

    /// Wire type for a declared kind; choice kinds defer to their constants.
    pub fn wire_type_of(&self, kind: &ParamKind) -> Option<WireType> {
        match kind {
            ParamKind::Choice(set) => set.wire_type().ok(),
            other => self.mapping_for(other).map(|mapping| mapping.wire),
        }
    }

    /// Convert a raw value for a (non-choice) declared kind.
    pub fn convert(&self, kind: &ParamKind, raw: &OptionValue) -> Option<ArgValue> {
        self.mapping_for(kind).and_then(|mapping| (mapping.extract)(raw))
    }

    /// Read a raw value as the value type of a choice set.
    pub fn choice_value(&self, set: &ChoiceSet, raw: &OptionValue) -> Option<ChoiceValue> {
        let kind = match set.wire_type().ok()? {
            WireType::Text => ParamKind::Text,
            WireType::Integer => ParamKind::Integer,
            WireType::Number => ParamKind::Number,
            _ => return None,
        };
        match self.convert(&kind, raw)? {
            ArgValue::Text(s) => Some(ChoiceValue::Text(s)),
            ArgValue::Integer(i) => Some(ChoiceValue::Integer(i)),
            ArgValue::Number(n) => Some(ChoiceValue::Number(n)),
            _ => None,
        }
    }
}

/// The default precedence table.
pub fn standard_table() -> Vec<TypeMapping> {
    vec![
        TypeMapping {
            name: "text",
            matches: |k| matches!(k, ParamKind::Text),
            wire: WireType::Text,
            extract: |raw| match raw {
                OptionValue::Text(s) => Some(ArgValue::Text(s.clone())),
                _ => None,
            },
        },
        TypeMapping {
            name: "integer",
            matches: |k| matches!(k, ParamKind::Integer),
            wire: WireType::Integer,
            extract: |raw| match raw {
                OptionValue::Integer(i) => Some(ArgValue::Integer(*i)),
                _ => None,
            },
        },
        TypeMapping {
            name: "boolean",
            matches: |k| matches!(k, ParamKind::Boolean),
            wire: WireType::Boolean,
            extract: |raw| match raw {
                OptionValue::Boolean(b) => Some(ArgValue::Boolean(*b)),
                _ => None,
            },
        },
        TypeMapping {
            name: "user",
            matches: |k| matches!(k, ParamKind::User),
            wire: WireType::User,
            extract: |raw| match raw {
                OptionValue::User { user, .. } => Some(ArgValue::User(user.clone())),
                _ => None,
            },
        },
        // Members travel as user options.
        TypeMapping {
            name: "member",
            matches: |k| matches!(k, ParamKind::Member),
            wire: WireType::User,
            extract: |raw| match raw {
                OptionValue::User {
                    member: Some(member),
                    ..
                } => Some(ArgValue::Member(member.clone())),
                _ => None,
            },
        },
        TypeMapping {
            name: "channel",
            matches: |k| matches!(k, ParamKind::Channel),
            wire: WireType::Channel,
            extract: |raw| match raw {
                OptionValue::Channel(c) => Some(ArgValue::Channel(c.clone())),
                _ => None,
            },
        },
        TypeMapping {
            name: "role",
            matches: |k| matches!(k, ParamKind::Role),
            wire: WireType::Role,
            extract: |raw| match raw {
                OptionValue::Role(r) => Some(ArgValue::Role(r.clone())),
                _ => None,
            },
        },
        TypeMapping {
            name: "mentionable",
            matches: ParamKind::is_mentionable,
            wire: WireType::Mentionable,
            extract: extract_mentionable,
        },
        TypeMapping {
            name: "number",
            matches: |k| matches!(k, ParamKind::Number),
            wire: WireType::Number,
            extract: |raw| match raw {
                OptionValue::Number(n) => Some(ArgValue::Number(*n)),
                OptionValue::Integer(i) => Some(ArgValue::Number(*i as f64)),
                _ => None,
            },
        },
        TypeMapping {
            name: "attachment",
            matches: |k| matches!(k, ParamKind::Attachment),
            wire: WireType::Attachment,
            extract: |raw| match raw {
                OptionValue::Attachment(a) => Some(ArgValue::Attachment(a.clone())),
                _ => None,
            },
        },
    ]
}

fn extract_mentionable(raw: &OptionValue) -> Option<ArgValue> {
    let target = match raw {
        OptionValue::User { user, .. } => Mentionable::User(user.clone()),
        OptionValue::Role(role) => Mentionable::Role(role.clone()),
        OptionValue::Mentionable(id) => Mentionable::Unresolved(*id),
        _ => return None,
    };
    Some(ArgValue::Mentionable(target))
}
