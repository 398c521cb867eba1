//! The quality level ladder.
//!
//! Levels 1 to 9 are pure predicates over the whole set of executed tests.
//! Level 0 is the floor and level 10 is reserved with no predicate.

use crate::results::{ExecutedTest, LinterVerdict};
use crate::test_plan::TestKind;

pub const MAX_LEVEL: u8 = 9;

const DESCRIPTIONS: [&str; 11] = [
    "Broken",
    "Installable",
    "Installable in all situations",
    "Can be updated",
    "Backup and restore support",
    "Clean",
    "Open to contributions from the community",
    "Successfully pass all functional tests and linter tests",
    "Maintained and long-term good quality",
    "High quality app",
    "Package assessed as perfect",
];

/// One rung of the ladder
pub struct Level {
    pub number: u8,
    pub description: &'static str,
    predicate: fn(&[ExecutedTest]) -> bool,
}

impl Level {
    pub fn passes(&self, tests: &[ExecutedTest]) -> bool {
        (self.predicate)(tests)
    }
}

impl std::fmt::Debug for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Level")
            .field("number", &self.number)
            .field("description", &self.description)
            .finish()
    }
}

static LADDER: [Level; MAX_LEVEL as usize] = [
    Level {
        number: 1,
        description: DESCRIPTIONS[1],
        predicate: level_1,
    },
    Level {
        number: 2,
        description: DESCRIPTIONS[2],
        predicate: level_2,
    },
    Level {
        number: 3,
        description: DESCRIPTIONS[3],
        predicate: level_3,
    },
    Level {
        number: 4,
        description: DESCRIPTIONS[4],
        predicate: level_4,
    },
    Level {
        number: 5,
        description: DESCRIPTIONS[5],
        predicate: level_5,
    },
    Level {
        number: 6,
        description: DESCRIPTIONS[6],
        predicate: level_6,
    },
    Level {
        number: 7,
        description: DESCRIPTIONS[7],
        predicate: level_7,
    },
    Level {
        number: 8,
        description: DESCRIPTIONS[8],
        predicate: level_8,
    },
    Level {
        number: 9,
        description: DESCRIPTIONS[9],
        predicate: level_9,
    },
];

/// Levels 1..=9 in order
pub fn ladder() -> &'static [Level] {
    &LADDER
}

pub fn level(number: u8) -> Option<&'static Level> {
    if number == 0 || number > MAX_LEVEL {
        return None;
    }
    LADDER.get(number as usize - 1)
}

/// Description for any level 0..=10
pub fn describe(number: u8) -> &'static str {
    DESCRIPTIONS
        .get(number as usize)
        .copied()
        .unwrap_or("Unknown level")
}

fn linter_verdicts(tests: &[ExecutedTest]) -> impl Iterator<Item = &LinterVerdict> {
    tests.iter().filter_map(|t| t.results.linter_verdict())
}

fn first_linter(tests: &[ExecutedTest]) -> Option<&LinterVerdict> {
    linter_verdicts(tests).next()
}

fn first_linter_test(tests: &[ExecutedTest]) -> Option<&ExecutedTest> {
    tests.iter().find(|t| t.results.linter_verdict().is_some())
}

/// Non-empty and all succeeded
fn all_succeeded<'a>(mut selected: impl Iterator<Item = &'a ExecutedTest>) -> bool {
    let mut seen = false;
    let all = selected.all(|t| {
        seen = true;
        t.results.succeeded()
    });
    seen && all
}

/// Upgrades from older commits are noisy by nature and skip runtime checks
fn runtime_checked(tests: &[ExecutedTest]) -> impl Iterator<Item = &ExecutedTest> {
    tests.iter().filter(|t| !t.kind.is_upgrade_from_commit())
}

fn witness_missing(tests: &[ExecutedTest]) -> bool {
    tests.iter().any(|t| t.results.flags.witness)
}

fn alias_traversal(tests: &[ExecutedTest]) -> bool {
    tests.iter().any(|t| t.results.flags.alias_traversal)
}

fn level_1(tests: &[ExecutedTest]) -> bool {
    linter_verdicts(tests).any(|v| !v.has_critical())
        && !witness_missing(tests)
        && tests
            .iter()
            .any(|t| t.kind.is_install() && t.results.succeeded())
}

fn level_2(tests: &[ExecutedTest]) -> bool {
    all_succeeded(tests.iter().filter(|t| t.kind.is_install()))
}

fn level_3(tests: &[ExecutedTest]) -> bool {
    all_succeeded(tests.iter().filter(|t| {
        matches!(t.kind, TestKind::Upgrade(_)) && !t.kind.is_upgrade_from_commit()
    }))
}

fn level_4(tests: &[ExecutedTest]) -> bool {
    all_succeeded(tests.iter().filter(|t| t.kind == TestKind::BackupRestore))
}

fn level_5(tests: &[ExecutedTest]) -> bool {
    !alias_traversal(tests)
        && first_linter_test(tests).map_or(false, |t| t.results.succeeded())
}

fn level_6(tests: &[ExecutedTest]) -> bool {
    first_linter(tests).map_or(false, |v| !v.is_outside_community_org())
}

fn level_7(tests: &[ExecutedTest]) -> bool {
    let everything_passed = tests.iter().all(|t| t.results.succeeded());
    let runtime_clean = runtime_checked(tests).all(|t| !t.results.flags.any());
    everything_passed
        && runtime_clean
        && first_linter(tests).map_or(false, |v| v.qualifies_for(7))
}

fn level_8(tests: &[ExecutedTest]) -> bool {
    first_linter(tests).map_or(false, |v| v.qualifies_for(8))
}

fn level_9(tests: &[ExecutedTest]) -> bool {
    first_linter(tests).map_or(false, |v| v.qualifies_for(9))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{MainResult, RegressionFlags, ResultRecord};
    use crate::test_plan::InstallVariant;

    fn linter(success: &[&str]) -> ExecutedTest {
        ExecutedTest::new(
            "default",
            TestKind::PackageLinter,
            ResultRecord::linter(
                MainResult::Success,
                LinterVerdict {
                    success: success.iter().map(|s| s.to_string()).collect(),
                    ..Default::default()
                },
            ),
        )
    }

    fn test(kind: TestKind, record: ResultRecord) -> ExecutedTest {
        ExecutedTest::new("default", kind, record)
    }

    #[test]
    fn test_ladder_is_ordered_and_bounded() {
        let numbers: Vec<u8> = ladder().iter().map(|l| l.number).collect();
        assert_eq!(numbers, (1..=9).collect::<Vec<u8>>());
        assert!(level(0).is_none());
        assert!(level(10).is_none());
        assert_eq!(level(4).unwrap().description, "Backup and restore support");
        assert_eq!(describe(10), "Package assessed as perfect");
    }

    #[test]
    fn test_level_2_needs_at_least_one_install() {
        assert!(!level_2(&[linter(&[])]));
        let tests = vec![
            test(TestKind::Install(InstallVariant::Root), ResultRecord::success()),
            test(TestKind::Install(InstallVariant::Subdir), ResultRecord::failure()),
        ];
        assert!(!level_2(&tests));
        assert!(level_1(&[linter(&[]), tests[0].clone()]));
    }

    #[test]
    fn test_level_3_ignores_upgrades_from_commits() {
        let tests = vec![
            test(TestKind::Upgrade(None), ResultRecord::success()),
            test(TestKind::Upgrade(Some("abc".into())), ResultRecord::failure()),
        ];
        assert!(level_3(&tests));
        assert!(!level_3(&tests[1..]));
    }

    #[test]
    fn test_level_7_ignores_flags_on_upgrades_from_commits() {
        let noisy = ResultRecord::success().with_flags(RegressionFlags {
            too_many_warnings: true,
            ..Default::default()
        });
        let tests = vec![
            linter(&["qualify_for_level_7"]),
            test(TestKind::Upgrade(Some("abc".into())), noisy.clone()),
        ];
        assert!(level_7(&tests));

        let tests = vec![linter(&["qualify_for_level_7"]), test(TestKind::Upgrade(None), noisy)];
        assert!(!level_7(&tests));
    }
}
