//! Declared configuration structures and coercion of raw configuration.
//!
//! Strategies and markets declare the fields they accept with a
//! [`ConfigurationStructure`]. A raw mapping (parsed from a run file or a
//! stored strategy run) is coerced against it once with
//! [`format_data_to_typed`]:
//! - missing or `null` fields take the declared default
//! - unknown fields are dropped
//! - values that cannot be read as the declared type are a config error

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::error::CoinratError;

/// Raw, untyped configuration as it arrives from outside.
pub type RawConfiguration = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationFieldType {
    String,
    Int,
    Decimal,
    Bool,
}

impl fmt::Display for ConfigurationFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigurationFieldType::String => "string",
            ConfigurationFieldType::Int => "int",
            ConfigurationFieldType::Decimal => "decimal",
            ConfigurationFieldType::Bool => "bool",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationValue {
    String(String),
    Int(i64),
    Decimal(Decimal),
    Bool(bool),
}

impl ConfigurationValue {
    fn field_type(&self) -> ConfigurationFieldType {
        match self {
            ConfigurationValue::String(_) => ConfigurationFieldType::String,
            ConfigurationValue::Int(_) => ConfigurationFieldType::Int,
            ConfigurationValue::Decimal(_) => ConfigurationFieldType::Decimal,
            ConfigurationValue::Bool(_) => ConfigurationFieldType::Bool,
        }
    }
}

impl fmt::Display for ConfigurationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationValue::String(v) => write!(f, "{v}"),
            ConfigurationValue::Int(v) => write!(f, "{v}"),
            ConfigurationValue::Decimal(v) => write!(f, "{v}"),
            ConfigurationValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationField {
    pub name: &'static str,
    pub title: &'static str,
    pub default: ConfigurationValue,
    pub unit: &'static str,
}

impl ConfigurationField {
    pub fn field_type(&self) -> ConfigurationFieldType {
        self.default.field_type()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationStructure {
    fields: Vec<ConfigurationField>,
}

impl ConfigurationStructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(
        mut self,
        name: &'static str,
        title: &'static str,
        default: ConfigurationValue,
        unit: &'static str,
    ) -> Self {
        self.fields.push(ConfigurationField {
            name,
            title,
            default,
            unit,
        });
        self
    }

    pub fn fields(&self) -> &[ConfigurationField] {
        &self.fields
    }
}

/// Configuration after coercion: every declared field is present and typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    section: String,
    values: BTreeMap<String, ConfigurationValue>,
}

impl Configuration {
    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn get(&self, key: &str) -> Option<&ConfigurationValue> {
        self.values.get(key)
    }

    pub fn get_string(&self, key: &str) -> Result<&str, CoinratError> {
        match self.require(key)? {
            ConfigurationValue::String(v) => Ok(v),
            other => Err(self.wrong_type(key, ConfigurationFieldType::String, other)),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64, CoinratError> {
        match self.require(key)? {
            ConfigurationValue::Int(v) => Ok(*v),
            other => Err(self.wrong_type(key, ConfigurationFieldType::Int, other)),
        }
    }

    pub fn get_decimal(&self, key: &str) -> Result<Decimal, CoinratError> {
        match self.require(key)? {
            ConfigurationValue::Decimal(v) => Ok(*v),
            other => Err(self.wrong_type(key, ConfigurationFieldType::Decimal, other)),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, CoinratError> {
        match self.require(key)? {
            ConfigurationValue::Bool(v) => Ok(*v),
            other => Err(self.wrong_type(key, ConfigurationFieldType::Bool, other)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigurationValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn require(&self, key: &str) -> Result<&ConfigurationValue, CoinratError> {
        self.values
            .get(key)
            .ok_or_else(|| CoinratError::ConfigMissing {
                section: self.section.clone(),
                key: key.to_string(),
            })
    }

    fn wrong_type(
        &self,
        key: &str,
        expected: ConfigurationFieldType,
        actual: &ConfigurationValue,
    ) -> CoinratError {
        CoinratError::ConfigInvalid {
            section: self.section.clone(),
            key: key.to_string(),
            reason: format!("expected {expected}, found {}", actual.field_type()),
        }
    }
}

/// Coerce `raw` against `structure`. `section` names the configuration in
/// error messages (e.g. the strategy or market name).
pub fn format_data_to_typed(
    section: &str,
    raw: &RawConfiguration,
    structure: &ConfigurationStructure,
) -> Result<Configuration, CoinratError> {
    let mut values = BTreeMap::new();

    for field in structure.fields() {
        let value = match raw.get(field.name) {
            None | Some(Value::Null) => field.default.clone(),
            Some(raw_value) => coerce(raw_value, field.field_type()).ok_or_else(|| {
                CoinratError::ConfigInvalid {
                    section: section.to_string(),
                    key: field.name.to_string(),
                    reason: format!("expected {}, got {}", field.field_type(), raw_value),
                }
            })?,
        };
        values.insert(field.name.to_string(), value);
    }

    for key in raw.keys() {
        if !structure.fields().iter().any(|f| f.name == key) {
            log::debug!("ignoring unknown configuration field [{section}] {key}");
        }
    }

    Ok(Configuration {
        section: section.to_string(),
        values,
    })
}

fn coerce(value: &Value, field_type: ConfigurationFieldType) -> Option<ConfigurationValue> {
    match (field_type, value) {
        (ConfigurationFieldType::String, Value::String(s)) => {
            Some(ConfigurationValue::String(s.clone()))
        }
        (ConfigurationFieldType::Int, Value::Number(n)) => n.as_i64().map(ConfigurationValue::Int),
        (ConfigurationFieldType::Int, Value::String(s)) => {
            s.trim().parse().ok().map(ConfigurationValue::Int)
        }
        (ConfigurationFieldType::Decimal, Value::Number(n)) => {
            parse_decimal(&n.to_string()).map(ConfigurationValue::Decimal)
        }
        (ConfigurationFieldType::Decimal, Value::String(s)) => {
            parse_decimal(s).map(ConfigurationValue::Decimal)
        }
        (ConfigurationFieldType::Bool, Value::Bool(b)) => Some(ConfigurationValue::Bool(*b)),
        (ConfigurationFieldType::Bool, Value::String(s)) => {
            parse_bool(s).map(ConfigurationValue::Bool)
        }
        _ => None,
    }
}

/// Plain or exponent notation (`0.00001`, `1e-5`).
fn parse_decimal(value: &str) -> Option<Decimal> {
    let value = value.trim();
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Raw configuration from string key/value pairs, e.g. an INI section.
pub fn raw_configuration_from_pairs<I, K, V>(pairs: I) -> RawConfiguration
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), Value::String(v.into())))
        .collect()
}
