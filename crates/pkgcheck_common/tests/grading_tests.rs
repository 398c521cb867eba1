//! Golden tests for level grading and the rendered report.

use pkgcheck_common::grading::{grade, LevelOverride};
use pkgcheck_common::report::{render_report, LevelMarker, ReportStyle};
use pkgcheck_common::results::{LinterVerdict, RegressionFlags};
use pkgcheck_common::test_plan::InstallVariant;
use pkgcheck_common::{ExecutedTest, MainResult, ResultRecord, TestKind};

fn linter_with(verdict: LinterVerdict) -> ExecutedTest {
    ExecutedTest::new(
        "default",
        TestKind::PackageLinter,
        ResultRecord::linter(MainResult::Success, verdict),
    )
}

fn qualifying_linter(levels: &[u8]) -> ExecutedTest {
    linter_with(LinterVerdict {
        success: levels
            .iter()
            .map(|l| format!("qualify_for_level_{}", l))
            .collect(),
        ..Default::default()
    })
}

fn ok(kind: TestKind) -> ExecutedTest {
    ExecutedTest::new("default", kind, ResultRecord::success())
}

fn failed(kind: TestKind) -> ExecutedTest {
    ExecutedTest::new("default", kind, ResultRecord::failure())
}

fn healthy_run() -> Vec<ExecutedTest> {
    vec![
        qualifying_linter(&[7]),
        ok(TestKind::Install(InstallVariant::Root)),
        ok(TestKind::Install(InstallVariant::Subdir)),
        ok(TestKind::BackupRestore),
        ok(TestKind::Upgrade(None)),
        ok(TestKind::ChangeUrl),
    ]
}

/// GOLDEN: clean run whose linter qualifies for 7 but not 8
#[test]
fn golden_clean_run_reaches_level_7() {
    let grade = grade(&healthy_run());
    assert_eq!(grade.global_level, 7);
    assert!(grade.overrides.is_empty());
    assert!(!grade.passed(8));
    assert_eq!(
        grade.description(),
        "Successfully pass all functional tests and linter tests"
    );
}

#[test]
fn test_first_failure_caps_but_later_levels_keep_their_result() {
    let mut tests = healthy_run();
    tests[4] = failed(TestKind::Upgrade(None));

    let grade = grade(&tests);
    assert_eq!(grade.global_level, 2);
    assert!(!grade.passed(3));
    assert!(grade.passed(4));
    assert!(grade.passed(5));
    assert!(grade.passed(6));
    assert_eq!(LevelMarker::for_level(&grade, 5), LevelMarker::Superseded);
    assert_eq!(LevelMarker::for_level(&grade, 2), LevelMarker::Active);
    assert_eq!(LevelMarker::for_level(&grade, 3), LevelMarker::NotReached);
}

#[test]
fn test_missing_witness_forces_zero() {
    let mut tests = healthy_run();
    // A linter qualifying for every upper level must not lift the result
    tests[0] = qualifying_linter(&[7, 8, 9]);
    tests[3].results = ResultRecord::success().with_flags(RegressionFlags {
        witness: true,
        ..Default::default()
    });

    let grade = grade(&tests);
    assert_eq!(grade.global_level, 0);
    assert_eq!(grade.ladder_level, 0);
    assert_eq!(grade.overrides, vec![LevelOverride::MissingWitness]);
    assert!(!grade.passed(1));
    assert!(grade.passed(8));
    assert!(grade.passed(9));
}

#[test]
fn test_critical_linter_finding_forces_zero_without_touching_the_table() {
    let mut tests = healthy_run();
    tests.push(linter_with(LinterVerdict {
        critical: vec!["App.disclaimer_has_dangerous_content".into()],
        ..Default::default()
    }));

    let grade = grade(&tests);
    assert_eq!(grade.global_level, 0);
    assert_eq!(grade.ladder_level, 7);
    assert!(grade.passed(1));
    assert_eq!(grade.overrides, vec![LevelOverride::CriticalLinterFinding]);
}

#[test]
fn test_upgrade_from_commit_failure_only_blocks_level_7() {
    let mut tests = healthy_run();
    tests.push(failed(TestKind::Upgrade(Some("abc123".into()))));

    let grade = grade(&tests);
    assert!(grade.passed(3));
    assert!(!grade.passed(7));
    assert_eq!(grade.global_level, 6);
}

#[test]
fn test_outside_community_org_stops_at_5() {
    let mut tests = healthy_run();
    tests[0] = linter_with(LinterVerdict {
        warning: vec!["App.is_in_github_org".into()],
        success: vec!["qualify_for_level_7".into()],
        ..Default::default()
    });

    let grade = grade(&tests);
    assert_eq!(grade.global_level, 5);
}

#[test]
fn test_no_tests_at_all_is_level_0() {
    let grade = grade(&[]);
    assert_eq!(grade.global_level, 0);
    assert!(grade.overrides.is_empty());
}

#[test]
fn test_report_ends_with_global_level() {
    let mut tests = healthy_run();
    tests[4] = failed(TestKind::Upgrade(None));
    let grade = grade(&tests);

    let lines = render_report(&tests, &grade, &ReportStyle::default());
    assert_eq!(lines[1], "[default]");
    assert!(lines.iter().any(|l| l.contains("Upgrade (from same version)") && l.contains("FAIL")));
    assert!(lines.iter().any(|l| l.starts_with("    Level  5") && l.ends_with("[ok]")));
    assert_eq!(
        lines.last().map(String::as_str),
        Some("Level of this application: 2 (Installable in all situations)")
    );
}
