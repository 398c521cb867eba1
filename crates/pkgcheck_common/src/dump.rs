//! Flat per-case records handed to the shell orchestrator.
//!
//! One `<id>.json` file per case, id = suite_index * 100 + case_index
//! (both 1-based), so lexical suite/case order survives as numeric order.

use crate::error::Result;
use crate::test_plan::{TestCase, TestKind, TestList};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpRecord {
    pub test_serie: String,
    pub test_type: String,
    #[serde(default)]
    pub test_arg: String,
    #[serde(default)]
    pub preinstall_template: String,
    #[serde(default)]
    pub preupgrade_template: String,
    /// URL-encoded query string
    #[serde(default)]
    pub install_args: String,
    /// Upgrade label and any other pass-through metadata
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl DumpRecord {
    pub fn from_case(case: &TestCase) -> Self {
        let mut extra = Map::new();
        if let Some(name) = &case.meta.upgrade_name {
            extra.insert("upgrade_name".to_string(), Value::String(name.clone()));
        }
        for (key, value) in &case.meta.extra {
            extra.insert(key.clone(), value.clone());
        }

        Self {
            test_serie: case.suite_id.clone(),
            test_type: case.kind.test_type().to_string(),
            test_arg: case.kind.test_arg().to_string(),
            preinstall_template: case.meta.preinstall.clone(),
            preupgrade_template: case.meta.preupgrade.clone(),
            install_args: case.meta.install_args.to_query_string(),
            extra,
        }
    }

    pub fn kind(&self) -> Result<TestKind> {
        TestKind::from_dump(&self.test_type, &self.test_arg)
    }

    pub fn upgrade_name(&self) -> Option<&str> {
        self.extra.get("upgrade_name").and_then(Value::as_str)
    }
}

pub fn test_file_id(suite_index: usize, case_index: usize) -> u32 {
    (suite_index * 100 + case_index) as u32
}

/// Pair every case with its file id.
pub fn numbered_records(list: &TestList) -> Vec<(u32, DumpRecord)> {
    list.suites
        .iter()
        .enumerate()
        .flat_map(|(suite_i, suite)| {
            suite.cases.iter().enumerate().map(move |(case_i, case)| {
                (test_file_id(suite_i + 1, case_i + 1), DumpRecord::from_case(case))
            })
        })
        .collect()
}

/// Write one JSON file per case into `dir` and return the written paths.
pub fn dump_for_package_check(list: &TestList, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for (id, record) in numbered_records(list) {
        let path = dir.join(format!("{}.json", id));
        fs::write(&path, serde_json::to_string(&record)?)?;
        written.push(path);
    }

    info!("Dumped {} test cases to {}", written.len(), dir.display());
    Ok(written)
}
