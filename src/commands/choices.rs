//! Enumerated option choices
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.0.0: Choice enums backed by text, integer or number values

use std::any::type_name;
use std::fmt;

use super::options::WireType;
use crate::core::DescriptorError;

/// Value carried by one choice constant.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoiceValue {
    Text(String),
    Integer(i64),
    Number(f64),
    /// Platforms reject boolean choices; kept so invalid enums are reported.
    Boolean(bool),
}

impl ChoiceValue {
    pub fn wire_type(&self) -> WireType {
        match self {
            ChoiceValue::Text(_) => WireType::Text,
            ChoiceValue::Integer(_) => WireType::Integer,
            ChoiceValue::Number(_) => WireType::Number,
            ChoiceValue::Boolean(_) => WireType::Boolean,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ChoiceValue::Text(s) => serde_json::Value::from(s.as_str()),
            ChoiceValue::Integer(i) => serde_json::Value::from(*i),
            ChoiceValue::Number(n) => serde_json::Value::from(*n),
            ChoiceValue::Boolean(b) => serde_json::Value::from(*b),
        }
    }
}

impl fmt::Display for ChoiceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceValue::Text(s) => write!(f, "{s:?}"),
            ChoiceValue::Integer(i) => write!(f, "{i}"),
            ChoiceValue::Number(n) => write!(f, "{n}"),
            ChoiceValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Enums offered to users as a fixed list of choices.
///
/// ```ignore
/// #[derive(Clone, Copy)]
/// enum Unit { Metric, Imperial }
///
/// impl CommandChoices for Unit {
///     fn constants() -> &'static [Self] { &[Unit::Metric, Unit::Imperial] }
///     fn label(&self) -> &'static str { match self { Unit::Metric => "metric", Unit::Imperial => "imperial" } }
///     fn value(&self) -> ChoiceValue { ChoiceValue::Text(self.label().into()) }
/// }
/// ```
pub trait CommandChoices: Copy + Send + Sync + 'static {
    fn constants() -> &'static [Self];
    fn label(&self) -> &'static str;
    fn value(&self) -> ChoiceValue;
}

/// One constant of a choice enum, as bound into handler arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub index: usize,
    pub label: &'static str,
    pub value: ChoiceValue,
}

/// Type-erased table of a [`CommandChoices`] enum.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceSet {
    type_name: &'static str,
    entries: Vec<Choice>,
}

impl ChoiceSet {
    pub fn of<E: CommandChoices>() -> Self {
        Self {
            type_name: type_name::<E>(),
            entries: E::constants()
                .iter()
                .enumerate()
                .map(|(index, constant)| Choice {
                    index,
                    label: constant.label(),
                    value: constant.value(),
                })
                .collect(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn entries(&self) -> &[Choice] {
        &self.entries
    }

    /// Wire type shared by every constant.
    ///
    /// Derived from the first constant; it must be text, integer or number and
    /// every other constant must carry the same kind of value.
    pub fn wire_type(&self) -> Result<WireType, DescriptorError> {
        let invalid = |reason: String| DescriptorError::InvalidChoices {
            choices: self.type_name.to_string(),
            reason,
        };
        let first = self
            .entries
            .first()
            .ok_or_else(|| invalid("command choices must have at least one element".into()))?;
        let wire = first.value.wire_type();
        if !wire.supports_choices() {
            return Err(invalid(format!("choice value type {wire} is not supported")));
        }
        if let Some(odd) = self.entries.iter().find(|c| c.value.wire_type() != wire) {
            return Err(invalid(format!(
                "constant '{}' has a {} value, expected {wire}",
                odd.label,
                odd.value.wire_type()
            )));
        }
        Ok(wire)
    }

    /// The constant whose value equals `value`.
    pub fn find(&self, value: &ChoiceValue) -> Option<&Choice> {
        self.entries.iter().find(|c| &c.value == value)
    }
}

impl Choice {
    /// Recover the enum constant this choice was built from.
    pub fn constant<E: CommandChoices>(&self) -> Option<E> {
        E::constants().get(self.index).copied()
    }
}
