//! Test manifest (`tests.toml`) model.
//!
//! Top-level tables are test suites in declaration order; `test_format` is the
//! only reserved scalar. All structural checks happen here, before any
//! expansion, so a bad manifest never yields a partial test list.

use crate::error::{PkgcheckError, Result};
use crate::question::InstallArgs;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

pub const DEFAULT_SUITE: &str = "default";
pub const SUPPORTED_TEST_FORMAT: f64 = 1.0;
const UPGRADE_LABEL_PREFIX: &str = "Upgrade from ";

/// One `test_upgrade_from.<commit>` entry
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeFrom {
    pub commit: String,
    /// Display label, `"Upgrade from "` prefix removed
    pub label: Option<String>,
    /// Replaces the suite's install args when present
    pub args: Option<InstallArgs>,
    pub preinstall: Option<String>,
    pub preupgrade: Option<String>,
    /// Remaining fields, passed through untouched
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestSuite {
    pub id: String,
    pub args: InstallArgs,
    pub exclude: Vec<String>,
    pub only: Vec<String>,
    pub preinstall: String,
    pub preupgrade: String,
    pub upgrade_from: Vec<UpgradeFrom>,
}

impl TestSuite {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            args: InstallArgs::new(),
            exclude: Vec::new(),
            only: Vec::new(),
            preinstall: String::new(),
            preupgrade: String::new(),
            upgrade_from: Vec::new(),
        }
    }

    /// Whether a generated test kind survives this suite's `only`/`exclude`.
    pub fn keeps(&self, kind_id: &str) -> bool {
        if !self.only.is_empty() {
            self.only.iter().any(|k| k == kind_id)
        } else {
            !self.exclude.iter().any(|k| k == kind_id)
        }
    }

    fn from_value(id: &str, table: &Map<String, Value>) -> Result<Self> {
        let args = match table.get("args") {
            None => InstallArgs::new(),
            Some(Value::Object(map)) => InstallArgs::from_table(map)?,
            Some(_) => return Err(invalid(id, "'args' must be a table")),
        };

        let exclude = string_list(id, table, "exclude")?;
        let only = string_list(id, table, "only")?;

        if id == DEFAULT_SUITE && !only.is_empty() {
            return Err(PkgcheckError::OnlyOnDefaultSuite);
        }
        if !only.is_empty() && !exclude.is_empty() {
            return Err(PkgcheckError::OnlyAndExclude {
                suite: id.to_string(),
            });
        }

        let upgrade_from = match table.get("test_upgrade_from") {
            None => Vec::new(),
            Some(Value::Object(entries)) => entries
                .iter()
                .map(|(commit, entry)| UpgradeFrom::from_value(id, commit, entry))
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(invalid(id, "'test_upgrade_from' must be a table")),
        };

        Ok(Self {
            id: id.to_string(),
            args,
            exclude,
            only,
            preinstall: optional_string(id, table, "preinstall")?.unwrap_or_default(),
            preupgrade: optional_string(id, table, "preupgrade")?.unwrap_or_default(),
            upgrade_from,
        })
    }
}

impl UpgradeFrom {
    fn from_value(suite: &str, commit: &str, entry: &Value) -> Result<Self> {
        let table = entry.as_object().ok_or_else(|| {
            invalid(suite, &format!("test_upgrade_from.{} must be a table", commit))
        })?;

        let mut extra = Map::new();
        let mut label = None;
        let mut args = None;
        let mut preinstall = None;
        let mut preupgrade = None;

        for (key, value) in table {
            match (key.as_str(), value) {
                ("name", Value::String(name)) => {
                    label = Some(
                        name.strip_prefix(UPGRADE_LABEL_PREFIX)
                            .unwrap_or(name)
                            .to_string(),
                    );
                }
                ("args", Value::Object(map)) => args = Some(InstallArgs::from_table(map)?),
                ("preinstall", Value::String(s)) => preinstall = Some(s.clone()),
                ("preupgrade", Value::String(s)) => preupgrade = Some(s.clone()),
                ("name" | "args" | "preinstall" | "preupgrade", _) => {
                    return Err(invalid(
                        suite,
                        &format!("test_upgrade_from.{}.{} has the wrong type", commit, key),
                    ));
                }
                _ => {
                    extra.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(Self {
            commit: commit.to_string(),
            label,
            args,
            preinstall,
            preupgrade,
            extra,
        })
    }
}

/// Parsed and validated `tests.toml`
#[derive(Debug, Clone, PartialEq)]
pub struct TestManifest {
    pub suites: Vec<TestSuite>,
}

impl TestManifest {
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)?;
        let value = serde_json::to_value(table)?;
        match value {
            Value::Object(map) => Self::from_map(&map),
            _ => Err(PkgcheckError::InvalidManifest(
                "test manifest is not a table".to_string(),
            )),
        }
    }

    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        check_test_format(map.get("test_format"))?;

        match map.get(DEFAULT_SUITE) {
            Some(Value::Object(_)) => {}
            _ => return Err(PkgcheckError::MissingDefaultSuite),
        }

        let suites = map
            .iter()
            .filter_map(|(id, value)| value.as_object().map(|table| (id, table)))
            .map(|(id, table)| TestSuite::from_value(id, table))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { suites })
    }

    pub fn suite(&self, id: &str) -> Option<&TestSuite> {
        self.suites.iter().find(|s| s.id == id)
    }
}

fn check_test_format(value: Option<&Value>) -> Result<()> {
    match value.and_then(Value::as_f64) {
        Some(format) if format == SUPPORTED_TEST_FORMAT => Ok(()),
        Some(format) => Err(PkgcheckError::UnsupportedTestFormat(format.to_string())),
        None => Err(PkgcheckError::UnsupportedTestFormat(
            value.map_or_else(|| "nothing".to_string(), |v| v.to_string()),
        )),
    }
}

fn invalid(suite: &str, message: &str) -> PkgcheckError {
    PkgcheckError::InvalidManifest(format!("test suite '{}': {}", suite, message))
}

fn string_list(suite: &str, table: &Map<String, Value>, key: &str) -> Result<Vec<String>> {
    match table.get(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(suite, &format!("'{}' must list strings", key)))
            })
            .collect(),
        Some(_) => Err(invalid(suite, &format!("'{}' must be a list", key))),
    }
}

fn optional_string(suite: &str, table: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match table.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(suite, &format!("'{}' must be a string", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suites_keep_declaration_order() {
        let manifest = TestManifest::from_toml_str(
            r#"
test_format = 1.0

[default]

[zz_last]
args.language = "en"

[aa_first]
exclude = ["change_url"]
"#,
        )
        .unwrap();
        let ids: Vec<_> = manifest.suites.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["default", "zz_last", "aa_first"]);
        assert_eq!(manifest.suite("zz_last").unwrap().args.get("language"), Some("en"));
    }

    #[test]
    fn test_format_must_be_one() {
        let err = TestManifest::from_toml_str("test_format = 2.0\n[default]\n").unwrap_err();
        assert!(matches!(err, PkgcheckError::UnsupportedTestFormat(_)));

        let err = TestManifest::from_toml_str("[default]\n").unwrap_err();
        assert!(matches!(err, PkgcheckError::UnsupportedTestFormat(_)));

        assert!(TestManifest::from_toml_str("test_format = 1\n[default]\n").is_ok());
    }

    #[test]
    fn test_default_suite_required() {
        let err = TestManifest::from_toml_str("test_format = 1.0\n[other]\n").unwrap_err();
        assert!(matches!(err, PkgcheckError::MissingDefaultSuite));

        let err = TestManifest::from_toml_str("test_format = 1.0\ndefault = 3\n").unwrap_err();
        assert!(matches!(err, PkgcheckError::MissingDefaultSuite));
    }

    #[test]
    fn test_only_and_exclude_are_exclusive() {
        let err = TestManifest::from_toml_str(
            "test_format = 1.0\n[default]\n[x]\nonly = [\"upgrade\"]\nexclude = [\"install.root\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, PkgcheckError::OnlyAndExclude { suite } if suite == "x"));
    }

    #[test]
    fn test_upgrade_from_label_and_extra() {
        let manifest = TestManifest::from_toml_str(
            r#"
test_format = 1.0

[default]
test_upgrade_from.71c9b2a.name = "Upgrade from 2.1.0"
test_upgrade_from.71c9b2a.args.language = "de"
test_upgrade_from.71c9b2a.ticket = 42
"#,
        )
        .unwrap();
        let entry = &manifest.suites[0].upgrade_from[0];
        assert_eq!(entry.commit, "71c9b2a");
        assert_eq!(entry.label.as_deref(), Some("2.1.0"));
        assert_eq!(entry.args.as_ref().and_then(|a| a.get("language")), Some("de"));
        assert_eq!(entry.extra.get("ticket"), Some(&Value::from(42)));
    }
}
