//! Level grading.
//!
//! The global level is the highest contiguous rung reached from level 1: the
//! first failing level caps the result even if later levels pass on their own.
//! Data-loss and broken-package signals then force the result to 0.

use crate::levels::{self, ladder};
use crate::results::ExecutedTest;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Why a computed level was forced down to 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelOverride {
    /// A witness file disappeared during the tests
    MissingWitness,
    /// The linter reported a critical finding
    CriticalLinterFinding,
}

impl LevelOverride {
    pub fn reason(&self) -> &'static str {
        match self {
            LevelOverride::MissingWitness => {
                "Some witness files have been deleted during those tests! It's a very bad thing!"
            }
            LevelOverride::CriticalLinterFinding => {
                "The package linter reported a critical failure! App is considered broken!"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grade {
    pub global_level: u8,
    /// Highest contiguous level before overrides
    pub ladder_level: u8,
    /// Each level's own predicate, independent of the cap
    pub level_results: BTreeMap<u8, bool>,
    pub overrides: Vec<LevelOverride>,
}

impl Grade {
    pub fn passed(&self, level: u8) -> bool {
        self.level_results.get(&level).copied().unwrap_or(false)
    }

    pub fn description(&self) -> &'static str {
        levels::describe(self.global_level)
    }
}

pub fn grade(tests: &[ExecutedTest]) -> Grade {
    let level_results: BTreeMap<u8, bool> = ladder()
        .iter()
        .map(|level| (level.number, level.passes(tests)))
        .collect();

    let mut ladder_level = 0;
    for (&number, &passed) in &level_results {
        if !passed {
            break;
        }
        ladder_level = number;
    }

    let mut overrides = Vec::new();
    if tests.iter().any(|t| t.results.flags.witness) {
        overrides.push(LevelOverride::MissingWitness);
    }
    if tests
        .iter()
        .filter_map(|t| t.results.linter_verdict())
        .any(|v| v.has_critical())
    {
        overrides.push(LevelOverride::CriticalLinterFinding);
    }

    for o in &overrides {
        error!("{}", o.reason());
    }

    if tests.iter().any(|t| t.results.flags.alias_traversal) {
        warn!(
            "Issue alias_traversal was detected! Please see https://github.com/YunoHost/example_ynh/pull/45 to fix that."
        );
    }

    let global_level = if overrides.is_empty() { ladder_level } else { 0 };
    info!(
        "Level of this application: {} ({})",
        global_level,
        levels::describe(global_level)
    );

    Grade {
        global_level,
        ladder_level,
        level_results,
        overrides,
    }
}
