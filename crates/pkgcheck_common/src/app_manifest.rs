//! App manifest loading.
//!
//! Supports the legacy packaging format (v1, `arguments.install` list, usually
//! JSON) and the current one (v2, ordered `install` table in TOML).

use crate::error::{PkgcheckError, Result};
use crate::question::{default_values_for_questions, InstallArgs, Question};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Helpers whose presence in `scripts/install` marks a web app
static NGINX_HELPERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(ynh_add_nginx_config|ynh_nginx_add_config|ynh_config_add_nginx)")
        .expect("nginx helper pattern is valid")
});

/// What the test planner needs to know about an app
#[derive(Debug, Clone, PartialEq)]
pub struct AppManifest {
    pub id: String,
    pub packaging_format: u32,
    pub multi_instance: bool,
    /// Install questions in declaration order
    pub questions: Vec<Question>,
}

impl AppManifest {
    /// Load `manifest.toml`, falling back to the legacy `manifest.json`.
    pub fn load(app_dir: &Path) -> Result<Self> {
        let toml_path = app_dir.join("manifest.toml");
        if toml_path.exists() {
            return Self::from_toml_str(&fs::read_to_string(&toml_path)?);
        }
        let json_path = app_dir.join("manifest.json");
        if json_path.exists() {
            return Self::from_json_str(&fs::read_to_string(&json_path)?);
        }
        Err(PkgcheckError::InvalidManifest(format!(
            "no manifest.toml or manifest.json in {}",
            app_dir.display()
        )))
    }

    /// Load a manifest file directly, picking the format from its extension.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)?;
        let value = serde_json::to_value(table)?;
        Self::from_value(&value)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| PkgcheckError::InvalidManifest("missing app 'id'".to_string()))?
            .to_string();

        let packaging_format = value
            .get("packaging_format")
            .and_then(Value::as_u64)
            .unwrap_or(1) as u32;

        let (multi_instance, questions) = if packaging_format <= 1 {
            (legacy_multi_instance(value), legacy_questions(value)?)
        } else {
            let multi = value
                .pointer("/integration/multi_instance")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            (multi, current_questions(value)?)
        };

        debug!(
            "Loaded manifest for {} (format {}, {} questions)",
            id,
            packaging_format,
            questions.len()
        );

        Ok(Self {
            id,
            packaging_format,
            multi_instance,
            questions,
        })
    }

    /// Default answers for every install question.
    pub fn default_install_args(&self, raise_if_no_default: bool) -> Result<InstallArgs> {
        default_values_for_questions(&self.id, &self.questions, raise_if_no_default)
    }
}

fn legacy_multi_instance(value: &Value) -> bool {
    match value.get("multi_instance") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

fn legacy_questions(value: &Value) -> Result<Vec<Question>> {
    let Some(list) = value.pointer("/arguments/install") else {
        return Ok(Vec::new());
    };
    let list = list.as_array().ok_or_else(|| {
        PkgcheckError::InvalidManifest("'arguments.install' must be a list".to_string())
    })?;

    list.iter()
        .map(|q| {
            let name = q.get("name").and_then(Value::as_str).ok_or_else(|| {
                PkgcheckError::InvalidManifest("install question without a name".to_string())
            })?;
            Question::from_value(name, q)
        })
        .collect()
}

fn current_questions(value: &Value) -> Result<Vec<Question>> {
    let Some(install) = value.get("install") else {
        return Ok(Vec::new());
    };
    let table = install
        .as_object()
        .ok_or_else(|| PkgcheckError::InvalidManifest("'install' must be a table".to_string()))?;

    table
        .iter()
        .map(|(name, q)| Question::from_value(name, q))
        .collect()
}

/// Whether the app's install script sets up an nginx vhost.
pub fn is_webapp(app_dir: &Path) -> Result<bool> {
    let install_script = app_dir.join("scripts").join("install");
    if !install_script.exists() {
        return Ok(false);
    }
    let content = fs::read_to_string(install_script)?;
    Ok(install_script_configures_nginx(&content))
}

pub fn install_script_configures_nginx(script: &str) -> bool {
    NGINX_HELPERS.is_match(script)
}
