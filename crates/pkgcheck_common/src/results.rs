//! Executed tests and their typed result records.
//!
//! Result JSON is decoded once at load time. Linter records get their own
//! variant so level predicates never poke at raw JSON fields.

use crate::dump::DumpRecord;
use crate::error::{PkgcheckError, Result};
use crate::test_plan::TestKind;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Warning codes the linter emits for apps outside the community org
pub const OUTSIDE_COMMUNITY_ORG_CODES: &[&str] = &["is_in_github_org", "app_in_github_org"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MainResult {
    Success,
    Failure,
}

/// Regression signals any test may raise
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RegressionFlags {
    /// A seeded witness file vanished
    #[serde(default, deserialize_with = "boolish")]
    pub witness: bool,
    /// nginx alias path traversal detected
    #[serde(default, deserialize_with = "boolish")]
    pub alias_traversal: bool,
    #[serde(default, deserialize_with = "boolish")]
    pub too_many_warnings: bool,
    /// Unsafe permission bits on the install directory
    #[serde(default, deserialize_with = "boolish")]
    pub install_dir_permissions: bool,
}

impl RegressionFlags {
    pub fn any(&self) -> bool {
        self.witness
            || self.alias_traversal
            || self.too_many_warnings
            || self.install_dir_permissions
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LinterVerdict {
    #[serde(default)]
    pub critical: Vec<String>,
    #[serde(default)]
    pub error: Vec<String>,
    #[serde(default)]
    pub warning: Vec<String>,
    #[serde(default)]
    pub info: Vec<String>,
    #[serde(default)]
    pub success: Vec<String>,
}

impl LinterVerdict {
    /// Whether the success set carries `qualify_for_level_<level>`.
    ///
    /// Codes may be namespaced (`App.qualify_for_level_7`).
    pub fn qualifies_for(&self, level: u8) -> bool {
        let marker = format!("qualify_for_level_{}", level);
        self.success.iter().any(|code| code_matches(code, &marker))
    }

    pub fn is_outside_community_org(&self) -> bool {
        self.warning.iter().any(|code| {
            OUTSIDE_COMMUNITY_ORG_CODES
                .iter()
                .any(|marker| code_matches(code, marker))
        })
    }

    pub fn has_critical(&self) -> bool {
        !self.critical.is_empty()
    }
}

fn code_matches(code: &str, marker: &str) -> bool {
    code == marker
        || code
            .rsplit_once('.')
            .map_or(false, |(_, suffix)| suffix == marker)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDetail {
    Linter(LinterVerdict),
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub main_result: MainResult,
    pub flags: RegressionFlags,
    pub detail: RecordDetail,
}

#[derive(Deserialize)]
struct RawRecord {
    main_result: MainResult,
    #[serde(flatten)]
    flags: RegressionFlags,
}

impl ResultRecord {
    pub fn success() -> Self {
        Self {
            main_result: MainResult::Success,
            flags: RegressionFlags::default(),
            detail: RecordDetail::Generic,
        }
    }

    pub fn failure() -> Self {
        Self {
            main_result: MainResult::Failure,
            ..Self::success()
        }
    }

    pub fn linter(main_result: MainResult, verdict: LinterVerdict) -> Self {
        Self {
            main_result,
            flags: RegressionFlags::default(),
            detail: RecordDetail::Linter(verdict),
        }
    }

    pub fn with_flags(mut self, flags: RegressionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Decode raw result JSON for a test of the given kind.
    pub fn from_json(kind: &TestKind, value: &Value) -> Result<Self> {
        let raw: RawRecord = serde_json::from_value(value.clone())?;
        let detail = match kind {
            TestKind::PackageLinter => {
                RecordDetail::Linter(serde_json::from_value(value.clone())?)
            }
            _ => RecordDetail::Generic,
        };
        Ok(Self {
            main_result: raw.main_result,
            flags: raw.flags,
            detail,
        })
    }

    pub fn succeeded(&self) -> bool {
        self.main_result == MainResult::Success
    }

    pub fn linter_verdict(&self) -> Option<&LinterVerdict> {
        match &self.detail {
            RecordDetail::Linter(verdict) => Some(verdict),
            RecordDetail::Generic => None,
        }
    }
}

/// A planned case joined with its recorded outcome
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTest {
    pub id: u32,
    pub suite_id: String,
    pub kind: TestKind,
    pub upgrade_name: Option<String>,
    pub results: ResultRecord,
    /// Untouched result JSON, echoed in the summary
    pub raw_results: Value,
}

impl ExecutedTest {
    pub fn new(suite_id: impl Into<String>, kind: TestKind, results: ResultRecord) -> Self {
        Self {
            id: 0,
            suite_id: suite_id.into(),
            kind,
            upgrade_name: None,
            results,
            raw_results: Value::Null,
        }
    }

    pub fn from_dump(id: u32, record: &DumpRecord, raw_results: Value) -> Result<Self> {
        let kind = record.kind()?;
        let results = ResultRecord::from_json(&kind, &raw_results)?;
        Ok(Self {
            id,
            suite_id: record.test_serie.clone(),
            kind,
            upgrade_name: record.upgrade_name().map(str::to_string),
            results,
            raw_results,
        })
    }
}

/// Load `tests/<id>.json` dump records in numeric id order, each joined with
/// `results/<id>.json`. Every planned case must have a result.
pub fn load_executed_tests(context_dir: &Path) -> Result<Vec<(DumpRecord, ExecutedTest)>> {
    let tests_dir = context_dir.join("tests");
    let results_dir = context_dir.join("results");

    let mut ids = Vec::new();
    for entry in fs::read_dir(&tests_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u32>().ok())
        {
            ids.push(id);
        }
    }
    ids.sort_unstable();

    let mut loaded = Vec::with_capacity(ids.len());
    for id in ids {
        let record: DumpRecord =
            serde_json::from_str(&fs::read_to_string(tests_dir.join(format!("{}.json", id)))?)?;

        let result_path = results_dir.join(format!("{}.json", id));
        if !result_path.exists() {
            return Err(PkgcheckError::MissingResult {
                id,
                path: result_path,
            });
        }
        let raw: Value = serde_json::from_str(&fs::read_to_string(&result_path)?)?;
        let test = ExecutedTest::from_dump(id, &record, raw)?;
        loaded.push((record, test));
    }

    debug!("Loaded {} executed tests from {}", loaded.len(), context_dir.display());
    Ok(loaded)
}

fn boolish<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    })
}
