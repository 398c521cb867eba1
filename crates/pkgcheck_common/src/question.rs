//! Install questions and their synthetic default answers.
//!
//! Unattended installs need a value for every install question. The resolution
//! order is fixed so the same manifest always yields the same answers:
//! well-known (type, name) pairs first, then the declared default, then
//! type-specific fallbacks, then the first declared choice.

use crate::error::{PkgcheckError, Result};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Password used when a password question has no declared default
pub const FALLBACK_PASSWORD: &str = "SomeSuperStrongPassword1234";

/// Question types understood by the defaulter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionType {
    Domain,
    Path,
    User,
    Group,
    Password,
    Boolean,
    WithDefault,
    String,
    Text,
    Select,
    Tags,
    Email,
    Url,
    Date,
    Time,
    Color,
    Number,
    Range,
    File,
    App,
    Alert,
    DisplayText,
    Markdown,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Domain => "domain",
            QuestionType::Path => "path",
            QuestionType::User => "user",
            QuestionType::Group => "group",
            QuestionType::Password => "password",
            QuestionType::Boolean => "boolean",
            QuestionType::WithDefault => "with_default",
            QuestionType::String => "string",
            QuestionType::Text => "text",
            QuestionType::Select => "select",
            QuestionType::Tags => "tags",
            QuestionType::Email => "email",
            QuestionType::Url => "url",
            QuestionType::Date => "date",
            QuestionType::Time => "time",
            QuestionType::Color => "color",
            QuestionType::Number => "number",
            QuestionType::Range => "range",
            QuestionType::File => "file",
            QuestionType::App => "app",
            QuestionType::Alert => "alert",
            QuestionType::DisplayText => "display_text",
            QuestionType::Markdown => "markdown",
        }
    }

    /// Infer a type for legacy questions that do not declare one.
    fn infer(name: &str, has_default: bool) -> Self {
        match name {
            "domain" => QuestionType::Domain,
            "admin" => QuestionType::User,
            "path" => QuestionType::Path,
            _ if has_default => QuestionType::WithDefault,
            _ => QuestionType::String,
        }
    }
}

impl FromStr for QuestionType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let kind = match s {
            "domain" => QuestionType::Domain,
            "path" => QuestionType::Path,
            "user" => QuestionType::User,
            "group" => QuestionType::Group,
            "password" => QuestionType::Password,
            "boolean" => QuestionType::Boolean,
            "with_default" => QuestionType::WithDefault,
            "string" => QuestionType::String,
            "text" => QuestionType::Text,
            "select" => QuestionType::Select,
            "tags" => QuestionType::Tags,
            "email" => QuestionType::Email,
            "url" => QuestionType::Url,
            "date" => QuestionType::Date,
            "time" => QuestionType::Time,
            "color" => QuestionType::Color,
            "number" => QuestionType::Number,
            "range" => QuestionType::Range,
            "file" => QuestionType::File,
            "app" => QuestionType::App,
            "alert" => QuestionType::Alert,
            "display_text" => QuestionType::DisplayText,
            "markdown" => QuestionType::Markdown,
            _ => return Err(()),
        };
        Ok(kind)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared default: booleans are kept apart so they can be coerced to "1"/"0"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    Bool(bool),
    Text(String),
}

/// One install-time question from the app manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub kind: QuestionType,
    pub default: Option<DefaultValue>,
    /// Choices in declaration order (mapping keys when declared as a table)
    pub choices: Vec<String>,
}

impl Question {
    pub fn new(name: impl Into<String>, kind: QuestionType) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            choices: Vec::new(),
        }
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    /// Decode a question descriptor from its manifest representation.
    pub fn from_value(name: &str, value: &Value) -> Result<Self> {
        let table = value.as_object().ok_or_else(|| {
            PkgcheckError::InvalidManifest(format!("question '{}' is not a table", name))
        })?;

        let default = match table.get("default") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(DefaultValue::Bool(*b)),
            Some(other) => scalar_to_string(other).map(DefaultValue::Text),
        };

        let kind = match table.get("type").and_then(Value::as_str) {
            Some(declared) => declared.parse().map_err(|_| PkgcheckError::UnknownQuestionType {
                name: name.to_string(),
                kind: declared.to_string(),
            })?,
            None => QuestionType::infer(name, default.is_some()),
        };

        let choices = match table.get("choices") {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            name: name.to_string(),
            kind,
            default,
            choices,
        })
    }
}

/// Render a manifest scalar the way it ends up in an install query string.
///
/// Booleans become "1"/"0"; tables and arrays have no scalar form.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn well_known_default(app_id: &str, question: &Question) -> Option<String> {
    let value = match (question.kind, question.name.as_str()) {
        (QuestionType::Domain, "domain") => "domain.tld".to_string(),
        (QuestionType::Path, "path") => format!("/{}", app_id),
        (QuestionType::User, "admin") => "package_checker".to_string(),
        (QuestionType::Group, "init_main_permission") => "visitors".to_string(),
        (QuestionType::Group, "init_admin_permission") => "admins".to_string(),
        (QuestionType::Password, "password") => "MySuperComplexPassword".to_string(),
        _ => return None,
    };
    Some(value)
}

/// Compute the synthetic answer for one question.
///
/// Returns `Ok(None)` when nothing applies and `raise_if_no_default` is false.
pub fn default_value(
    app_id: &str,
    question: &Question,
    raise_if_no_default: bool,
) -> Result<Option<String>> {
    if let Some(value) = well_known_default(app_id, question) {
        return Ok(Some(value));
    }

    match &question.default {
        Some(DefaultValue::Bool(b)) => return Ok(Some(if *b { "1" } else { "0" }.to_string())),
        Some(DefaultValue::Text(text)) => return Ok(Some(text.clone())),
        None => {}
    }

    match question.kind {
        QuestionType::Boolean => return Ok(Some("1".to_string())),
        QuestionType::Password => return Ok(Some(FALLBACK_PASSWORD.to_string())),
        _ => {}
    }

    if let Some(first) = question.choices.first() {
        return Ok(Some(first.clone()));
    }

    if raise_if_no_default {
        return Err(PkgcheckError::NoDefault(question.name.clone()));
    }
    Ok(None)
}

/// Ordered mapping from question name to answer.
///
/// Insertion order is kept; overriding an existing key keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallArgs {
    entries: Vec<(String, String)>,
}

impl InstallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy of `self` with `overrides` applied on top (overrides win).
    pub fn merged_with(&self, overrides: &InstallArgs) -> InstallArgs {
        let mut merged = self.clone();
        for (name, value) in overrides.iter() {
            merged.insert(name, value);
        }
        merged
    }

    /// Decode a manifest `args` table; non-scalar values are rejected.
    pub fn from_table(table: &serde_json::Map<String, Value>) -> Result<Self> {
        let mut args = InstallArgs::new();
        for (name, value) in table {
            let value = scalar_to_string(value).ok_or_else(|| {
                PkgcheckError::InvalidManifest(format!("argument '{}' must be a scalar", name))
            })?;
            args.insert(name.clone(), value);
        }
        Ok(args)
    }

    /// URL-encoded `name=value&...` form.
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl Serialize for InstallArgs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Answer every question, in declaration order.
///
/// With `raise_if_no_default` false, questions without any answer are left out
/// and the caller is expected to supply them.
pub fn default_values_for_questions(
    app_id: &str,
    questions: &[Question],
    raise_if_no_default: bool,
) -> Result<InstallArgs> {
    let mut args = InstallArgs::new();
    for question in questions {
        if let Some(value) = default_value(app_id, question, raise_if_no_default)? {
            args.insert(question.name.clone(), value);
        }
    }
    Ok(args)
}
