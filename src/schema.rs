//! Column schema model and resolution.
//!
//! A [`ColumnSpec`] is the declarative, serde-facing description of one column.
//! Before any input is read, the list of specs is resolved into a
//! [`ResolvedSchema`]: every spec is checked for its `name`/`column_name` pair,
//! rule tokens such as `"required|min_length[3]|uppercase"` are parsed once into
//! typed [`Rule`] values, and the `column_name -> name` lookup used to build
//! output records is indexed.

use std::{collections::HashMap, fmt, str::FromStr};

use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{error::ConfigError, header::normalize_cell, transform::Transform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    /// A declared type this engine does not know; every value fails it.
    Unknown(String),
}

impl ColumnType {
    pub fn as_str(&self) -> &str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Unknown(name) => name,
        }
    }

    pub fn from_token(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" => ColumnType::String,
            "integer" | "int" => ColumnType::Integer,
            "float" | "double" => ColumnType::Float,
            "boolean" | "bool" => ColumnType::Boolean,
            "date" => ColumnType::Date,
            _ => ColumnType::Unknown(value.trim().to_string()),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(ColumnType::from_token(value))
    }
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        Ok(ColumnType::from_token(&token))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    Unique,
    MinLength(usize),
    MaxLength(usize),
    Transform(Transform),
}

impl Rule {
    /// Parses one rule token, e.g. `required`, `max_length[5]`, `strip_tags`.
    pub fn parse(column: &str, token: &str) -> Result<Self, ConfigError> {
        let token = token.trim();
        if let Some((name, rest)) = token.split_once('[') {
            let argument = rest.strip_suffix(']').ok_or_else(|| ConfigError::MalformedRule {
                column: column.to_string(),
                token: token.to_string(),
                reason: "missing closing ']'".to_string(),
            })?;
            let length = argument
                .trim()
                .parse::<usize>()
                .map_err(|err| ConfigError::MalformedRule {
                    column: column.to_string(),
                    token: token.to_string(),
                    reason: err.to_string(),
                })?;
            return match name.trim() {
                "min_length" => Ok(Rule::MinLength(length)),
                "max_length" => Ok(Rule::MaxLength(length)),
                _ => Err(ConfigError::UnknownRule {
                    column: column.to_string(),
                    token: token.to_string(),
                }),
            };
        }
        match token {
            "required" => Ok(Rule::Required),
            "unique" => Ok(Rule::Unique),
            "min_length" | "max_length" => Err(ConfigError::MalformedRule {
                column: column.to_string(),
                token: token.to_string(),
                reason: "expected a bracketed length argument".to_string(),
            }),
            other => Transform::from_token(other)
                .map(Rule::Transform)
                .ok_or_else(|| ConfigError::UnknownRule {
                    column: column.to_string(),
                    token: token.to_string(),
                }),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => f.write_str("required"),
            Rule::Unique => f.write_str("unique"),
            Rule::MinLength(n) => write!(f, "min_length[{n}]"),
            Rule::MaxLength(n) => write!(f, "max_length[{n}]"),
            Rule::Transform(transform) => write!(f, "{transform}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub column_name: String,
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "Option::is_none"
    )]
    pub column_type: Option<ColumnType>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    #[serde(
        default,
        alias = "validate",
        deserialize_with = "deserialize_rule_tokens",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub rules: Vec<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_name: column_name.into(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.column_type = Some(column_type);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_min_length(mut self, length: usize) -> Self {
        self.min_length = Some(length);
        self
    }

    pub fn with_max_length(mut self, length: usize) -> Self {
        self.max_length = Some(length);
        self
    }

    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Appends `|`-separated rule tokens.
    pub fn with_rules(mut self, rules: &str) -> Self {
        self.rules.extend(split_rule_tokens(rules));
        self
    }
}

fn split_rule_tokens(joined: &str) -> impl Iterator<Item = String> + '_ {
    joined
        .split('|')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn deserialize_rule_tokens<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RuleTokens {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match RuleTokens::deserialize(deserializer)? {
        RuleTokens::Joined(joined) => split_rule_tokens(&joined).collect(),
        RuleTokens::List(list) => list
            .iter()
            .flat_map(|entry| split_rule_tokens(entry))
            .collect(),
    })
}

/// A column spec after validation, with rule tokens parsed and flags merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub name: String,
    pub column_name: String,
    /// `column_name` normalized the same way header cells are.
    pub header_key: String,
    pub column_type: Option<ColumnType>,
    pub required: bool,
    pub unique: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub allowed_values: Option<Vec<String>>,
    /// Transforms in evaluation order, without repeats.
    pub transforms: Vec<Transform>,
    pub rules: Vec<Rule>,
}

impl ResolvedColumn {
    fn resolve(position: usize, spec: &ColumnSpec) -> Result<Self, ConfigError> {
        let name = spec.name.trim();
        let column_name = spec.column_name.trim();
        if name.is_empty() || column_name.is_empty() {
            return Err(ConfigError::IncompleteColumn {
                position: position + 1,
                spec: describe_spec(spec),
            });
        }

        let rules = spec
            .rules
            .iter()
            .map(|token| Rule::parse(column_name, token))
            .collect::<Result<Vec<_>, _>>()?;

        let mut column = ResolvedColumn {
            name: name.to_string(),
            column_name: column_name.to_string(),
            header_key: normalize_cell(column_name),
            column_type: spec.column_type.clone(),
            required: spec.required,
            unique: spec.unique,
            min_length: spec.min_length,
            max_length: spec.max_length,
            allowed_values: spec.allowed_values.clone(),
            transforms: Vec::new(),
            rules,
        };
        for rule in &column.rules {
            match *rule {
                Rule::Required => column.required = true,
                Rule::Unique => column.unique = true,
                Rule::MinLength(n) => {
                    column.min_length.get_or_insert(n);
                }
                Rule::MaxLength(n) => {
                    column.max_length.get_or_insert(n);
                }
                Rule::Transform(transform) => column.transforms.push(transform),
            }
        }
        column.transforms.sort();
        column.transforms.dedup();

        if let (Some(min), Some(max)) = (column.min_length, column.max_length)
            && min > max
        {
            warn!(
                "Column '{}' declares min_length {} above max_length {}; every value will fail",
                column.column_name, min, max
            );
        }
        Ok(column)
    }
}

fn describe_spec(spec: &ColumnSpec) -> String {
    serde_json::to_string(spec).unwrap_or_else(|_| format!("{spec:?}"))
}

#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    columns: Vec<ResolvedColumn>,
    output_keys: HashMap<String, String>,
}

impl ResolvedSchema {
    /// Validates and indexes `specs`. Runs once per read, before the input is touched.
    pub fn resolve(specs: &[ColumnSpec]) -> Result<Self, ConfigError> {
        let columns = specs
            .iter()
            .enumerate()
            .map(|(position, spec)| ResolvedColumn::resolve(position, spec))
            .collect::<Result<Vec<_>, _>>()?;
        let output_keys = columns
            .iter()
            .map(|column| (column.header_key.clone(), column.name.clone()))
            .collect();
        debug!("Resolved schema with {} column(s)", columns.len());
        Ok(Self {
            columns,
            output_keys,
        })
    }

    pub fn columns(&self) -> &[ResolvedColumn] {
        &self.columns
    }

    /// Expected header keys in schema order.
    pub fn header_keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.header_key.as_str())
    }

    /// Output key (`name`) for a normalized header key.
    pub fn output_key(&self, header_key: &str) -> Option<&str> {
        self.output_keys.get(header_key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_parse_handles_arguments_and_transforms() {
        assert_eq!(Rule::parse("c", "required").unwrap(), Rule::Required);
        assert_eq!(Rule::parse("c", "min_length[3]").unwrap(), Rule::MinLength(3));
        assert_eq!(Rule::parse("c", " max_length[ 5 ] ").unwrap(), Rule::MaxLength(5));
        assert_eq!(
            Rule::parse("c", "uppercase").unwrap(),
            Rule::Transform(Transform::Uppercase)
        );
    }

    #[test]
    fn rule_parse_rejects_unknown_and_malformed_tokens() {
        assert!(matches!(
            Rule::parse("c", "shout"),
            Err(ConfigError::UnknownRule { .. })
        ));
        assert!(matches!(
            Rule::parse("c", "min_length[abc]"),
            Err(ConfigError::MalformedRule { .. })
        ));
        assert!(matches!(
            Rule::parse("c", "max_length[4"),
            Err(ConfigError::MalformedRule { .. })
        ));
        assert!(matches!(
            Rule::parse("c", "min_length"),
            Err(ConfigError::MalformedRule { .. })
        ));
    }

    #[test]
    fn resolve_requires_name_and_column_name() {
        let err = ResolvedSchema::resolve(&[
            ColumnSpec::new("id", "id"),
            ColumnSpec::new("", "email"),
        ])
        .expect_err("missing name");
        let message = err.to_string();
        assert!(message.contains("Column definition error"));
        assert!(message.contains("#2"));
        assert!(message.contains("email"));
    }

    #[test]
    fn resolve_merges_flags_and_rule_tokens() {
        let schema = ResolvedSchema::resolve(&[ColumnSpec::new("user", "Username")
            .with_max_length(8)
            .with_rules("required|unique|max_length[20]|min_length[3]|urlencode|lowercase")])
        .expect("valid schema");
        let column = &schema.columns()[0];
        assert!(column.required);
        assert!(column.unique);
        assert_eq!(column.min_length, Some(3));
        assert_eq!(column.max_length, Some(8));
        assert_eq!(
            column.transforms,
            vec![Transform::Lowercase, Transform::UrlEncode]
        );
        assert_eq!(schema.output_key("Username"), Some("user"));
    }

    #[test]
    fn column_type_keeps_unknown_names() {
        assert_eq!(ColumnType::from_str("INT").unwrap(), ColumnType::Integer);
        assert_eq!(
            ColumnType::from_str("currency").unwrap(),
            ColumnType::Unknown("currency".to_string())
        );
    }

    #[test]
    fn column_spec_deserializes_rule_string_and_list() {
        let yaml = r#"
- name: email
  column_name: Email Address
  type: string
  validate: "required|unique"
- name: age
  column_name: Age
  type: integer
  rules: [required, "min_length[1]"]
"#;
        let specs: Vec<ColumnSpec> = serde_yaml::from_str(yaml).expect("parse specs");
        assert_eq!(specs[0].rules, vec!["required", "unique"]);
        assert_eq!(specs[1].rules, vec!["required", "min_length[1]"]);
        assert_eq!(specs[1].column_type, Some(ColumnType::Integer));
    }
}
