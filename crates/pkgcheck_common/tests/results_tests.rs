//! Dump, execute, load: the files exchanged with the orchestrator.

use pkgcheck_common::dump::dump_for_package_check;
use pkgcheck_common::grading::grade;
use pkgcheck_common::results::load_executed_tests;
use pkgcheck_common::summary::{RunContext, Summary};
use pkgcheck_common::test_manifest::TestManifest;
use pkgcheck_common::test_plan::{expand_test_plan, AppTraits};
use pkgcheck_common::{InstallArgs, PkgcheckError, TestKind};
use serde_json::json;
use std::fs;
use std::path::Path;

fn plan_into(context: &Path) -> Vec<std::path::PathBuf> {
    let manifest = TestManifest::from_toml_str(
        "test_format = 1.0\n[default]\ntest_upgrade_from.abc123.name = \"Upgrade from 1.0\"\n",
    )
    .unwrap();
    let mut args = InstallArgs::new();
    args.insert("domain", "domain.tld");
    args.insert("path", "/app");
    let list = expand_test_plan(
        &manifest,
        &args,
        AppTraits {
            is_webapp: true,
            is_multi_instance: false,
        },
    );
    dump_for_package_check(&list, &context.join("tests")).unwrap()
}

fn write_result(context: &Path, id: u32, value: serde_json::Value) {
    let dir = context.join("results");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{}.json", id)), value.to_string()).unwrap();
}

#[test]
fn test_dumped_records_load_back_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let written = plan_into(dir.path());
    assert_eq!(written.len(), 7);
    assert!(written[0].ends_with("tests/101.json"));

    write_result(
        dir.path(),
        101,
        json!({
            "main_result": "success",
            "warning": ["App.some_warning"],
            "success": ["qualify_for_level_7"]
        }),
    );
    for id in 102..=107 {
        write_result(dir.path(), id, json!({"main_result": "success"}));
    }

    let loaded = load_executed_tests(dir.path()).unwrap();
    let ids: Vec<u32> = loaded.iter().map(|(_, t)| t.id).collect();
    assert_eq!(ids, (101..=107).collect::<Vec<u32>>());

    let (record, upgrade) = &loaded[5];
    assert_eq!(record.test_type, "TEST_UPGRADE");
    assert_eq!(upgrade.kind, TestKind::Upgrade(Some("abc123".into())));
    assert_eq!(upgrade.upgrade_name.as_deref(), Some("1.0"));
    assert_eq!(record.install_args, "domain=domain.tld&path=%2Fapp");

    let tests: Vec<_> = loaded.iter().map(|(_, t)| t.clone()).collect();
    let grade = grade(&tests);
    assert_eq!(grade.global_level, 7);

    let summary = Summary::build(RunContext::default(), &loaded, &grade);
    let value: serde_json::Value =
        serde_json::from_str(&summary.to_json_pretty().unwrap()).unwrap();
    assert_eq!(value["level"], 7);
    assert_eq!(value["tests"].as_array().unwrap().len(), 7);
    assert_eq!(value["tests"][0]["results"]["warning"][0], "App.some_warning");
}

#[test]
fn test_missing_result_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    plan_into(dir.path());
    write_result(dir.path(), 101, json!({"main_result": "success"}));

    let err = load_executed_tests(dir.path()).unwrap_err();
    assert!(matches!(err, PkgcheckError::MissingResult { id: 102, .. }));
    assert!(!err.is_configuration());
}

#[test]
fn test_boolish_flags_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    plan_into(dir.path());
    write_result(dir.path(), 101, json!({"main_result": "success"}));
    write_result(
        dir.path(),
        102,
        json!({"main_result": "success", "witness": "true", "alias_traversal": 0}),
    );
    for id in 103..=107 {
        write_result(dir.path(), id, json!({"main_result": "failure"}));
    }

    let loaded = load_executed_tests(dir.path()).unwrap();
    let flags = loaded[1].1.results.flags;
    assert!(flags.witness);
    assert!(!flags.alias_traversal);
    assert!(!loaded[2].1.results.succeeded());
}
