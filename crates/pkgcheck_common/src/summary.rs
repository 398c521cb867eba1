//! Machine-readable grading summary.

use crate::dump::DumpRecord;
use crate::grading::Grade;
use crate::results::ExecutedTest;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Where and on what the tests ran
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunContext {
    pub commit: String,
    pub architecture: String,
    pub yunohost_version: String,
    pub yunohost_branch: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryTest {
    pub id: u32,
    #[serde(flatten)]
    pub record: DumpRecord,
    pub results: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    #[serde(flatten)]
    pub context: RunContext,
    /// Unix seconds
    pub timestamp: i64,
    pub tests: Vec<SummaryTest>,
    pub level_results: BTreeMap<u8, bool>,
    pub level: u8,
}

impl Summary {
    pub fn build(
        context: RunContext,
        loaded: &[(DumpRecord, ExecutedTest)],
        grade: &Grade,
    ) -> Self {
        let tests = loaded
            .iter()
            .map(|(record, test)| SummaryTest {
                id: test.id,
                record: record.clone(),
                results: test.raw_results.clone(),
            })
            .collect();

        Self {
            context,
            timestamp: chrono::Utc::now().timestamp(),
            tests,
            level_results: grade.level_results.clone(),
            level: grade.global_level,
        }
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
