//! Test plan expansion.
//!
//! Turns a validated test manifest plus a few facts about the app into the
//! ordered list of test cases to run. Suites come out in manifest order and
//! within a suite kinds follow a fixed sequence:
//! linter, installs, backup/restore, upgrades, change_url.

use crate::app_manifest::{is_webapp, AppManifest};
use crate::error::{PkgcheckError, Result};
use crate::question::InstallArgs;
use crate::test_manifest::{TestManifest, TestSuite};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallVariant {
    Root,
    Subdir,
    NoUrl,
    Private,
    Multi,
}

impl InstallVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallVariant::Root => "root",
            InstallVariant::Subdir => "subdir",
            InstallVariant::NoUrl => "nourl",
            InstallVariant::Private => "private",
            InstallVariant::Multi => "multi",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "root" => Some(InstallVariant::Root),
            "subdir" => Some(InstallVariant::Subdir),
            "nourl" => Some(InstallVariant::NoUrl),
            "private" => Some(InstallVariant::Private),
            "multi" => Some(InstallVariant::Multi),
            _ => None,
        }
    }
}

/// The fixed vocabulary of test kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TestKind {
    PackageLinter,
    Install(InstallVariant),
    BackupRestore,
    /// `None` upgrades from the current version, `Some(commit)` from an older one
    Upgrade(Option<String>),
    ChangeUrl,
}

impl TestKind {
    /// Identifier used in manifests and test lists, e.g. `install.subdir`
    pub fn id(&self) -> String {
        match self {
            TestKind::PackageLinter => "package_linter".to_string(),
            TestKind::Install(variant) => format!("install.{}", variant.as_str()),
            TestKind::BackupRestore => "backup_restore".to_string(),
            TestKind::Upgrade(None) => "upgrade".to_string(),
            TestKind::Upgrade(Some(commit)) => format!("upgrade.{}", commit),
            TestKind::ChangeUrl => "change_url".to_string(),
        }
    }

    /// Upper-snake-case type used in dump records, e.g. `TEST_INSTALL`
    pub fn test_type(&self) -> &'static str {
        match self {
            TestKind::PackageLinter => "TEST_PACKAGE_LINTER",
            TestKind::Install(_) => "TEST_INSTALL",
            TestKind::BackupRestore => "TEST_BACKUP_RESTORE",
            TestKind::Upgrade(_) => "TEST_UPGRADE",
            TestKind::ChangeUrl => "TEST_CHANGE_URL",
        }
    }

    /// Sub-variant used in dump records (install variant or commit), may be empty
    pub fn test_arg(&self) -> &str {
        match self {
            TestKind::Install(variant) => variant.as_str(),
            TestKind::Upgrade(Some(commit)) => commit,
            _ => "",
        }
    }

    /// Rebuild a kind from a dump record's `test_type`/`test_arg` pair.
    pub fn from_dump(test_type: &str, test_arg: &str) -> Result<Self> {
        let unknown = || PkgcheckError::UnknownTestKind(format!("{} {}", test_type, test_arg));
        let kind = match test_type {
            "TEST_PACKAGE_LINTER" => TestKind::PackageLinter,
            "TEST_INSTALL" => {
                TestKind::Install(InstallVariant::parse(test_arg).ok_or_else(unknown)?)
            }
            "TEST_BACKUP_RESTORE" => TestKind::BackupRestore,
            "TEST_UPGRADE" if test_arg.is_empty() => TestKind::Upgrade(None),
            "TEST_UPGRADE" => TestKind::Upgrade(Some(test_arg.to_string())),
            "TEST_CHANGE_URL" => TestKind::ChangeUrl,
            _ => return Err(unknown()),
        };
        Ok(kind)
    }

    pub fn is_install(&self) -> bool {
        matches!(self, TestKind::Install(_))
    }

    /// Upgrade from an older commit rather than from the current version
    pub fn is_upgrade_from_commit(&self) -> bool {
        matches!(self, TestKind::Upgrade(Some(commit)) if !commit.is_empty())
    }
}

impl FromStr for TestKind {
    type Err = PkgcheckError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('.') {
            Some(("install", variant)) => TestKind::from_dump("TEST_INSTALL", variant),
            Some(("upgrade", commit)) if !commit.is_empty() => {
                Ok(TestKind::Upgrade(Some(commit.to_string())))
            }
            Some(_) => Err(PkgcheckError::UnknownTestKind(s.to_string())),
            None => match s {
                "package_linter" => Ok(TestKind::PackageLinter),
                "backup_restore" => Ok(TestKind::BackupRestore),
                "upgrade" => Ok(TestKind::Upgrade(None)),
                "change_url" => Ok(TestKind::ChangeUrl),
                _ => Err(PkgcheckError::UnknownTestKind(s.to_string())),
            },
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// What a test case needs at execution time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestMeta {
    pub preinstall: String,
    pub preupgrade: String,
    pub install_args: InstallArgs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub suite_id: String,
    pub kind: TestKind,
    pub meta: TestMeta,
}

/// Cases of one suite after filtering
#[derive(Debug, Clone, PartialEq)]
pub struct SuitePlan {
    pub suite_id: String,
    pub cases: Vec<TestCase>,
}

/// Full expansion: suites in manifest order, each with its ordered cases
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestList {
    pub suites: Vec<SuitePlan>,
}

impl TestList {
    pub fn case_count(&self) -> usize {
        self.suites.iter().map(|s| s.cases.len()).sum()
    }

    pub fn suite(&self, id: &str) -> Option<&SuitePlan> {
        self.suites.iter().find(|s| s.suite_id == id)
    }

    pub fn cases(&self) -> impl Iterator<Item = &TestCase> {
        self.suites.iter().flat_map(|s| s.cases.iter())
    }
}

impl Serialize for TestList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.suites.len()))?;
        for suite in &self.suites {
            map.serialize_entry(&suite.suite_id, &SuiteCases(&suite.cases))?;
        }
        map.end()
    }
}

struct SuiteCases<'a>(&'a [TestCase]);

impl Serialize for SuiteCases<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for case in self.0 {
            map.serialize_entry(&case.kind.id(), &case.meta)?;
        }
        map.end()
    }
}

/// Facts about the app that shape the test matrix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppTraits {
    pub is_webapp: bool,
    pub is_multi_instance: bool,
}

fn suite_cases(
    suite: &TestSuite,
    default_install_args: &InstallArgs,
    traits: AppTraits,
    is_full_domain_app: bool,
) -> Vec<TestCase> {
    let install_args = default_install_args.merged_with(&suite.args);
    let default_meta = TestMeta {
        preinstall: suite.preinstall.clone(),
        preupgrade: suite.preupgrade.clone(),
        install_args: install_args.clone(),
        upgrade_name: None,
        extra: Map::new(),
    };

    let mut kinds = vec![TestKind::PackageLinter];

    if traits.is_webapp {
        kinds.push(TestKind::Install(InstallVariant::Root));
        if !is_full_domain_app {
            kinds.push(TestKind::Install(InstallVariant::Subdir));
        }
    } else {
        kinds.push(TestKind::Install(InstallVariant::NoUrl));
    }

    if traits.is_webapp
        && (install_args.contains("is_public") || install_args.contains("init_main_permission"))
    {
        kinds.push(TestKind::Install(InstallVariant::Private));
    }

    if traits.is_multi_instance {
        kinds.push(TestKind::Install(InstallVariant::Multi));
    }

    kinds.push(TestKind::BackupRestore);
    kinds.push(TestKind::Upgrade(None));

    let mut cases: Vec<TestCase> = kinds
        .into_iter()
        .map(|kind| TestCase {
            suite_id: suite.id.clone(),
            kind,
            meta: default_meta.clone(),
        })
        .collect();

    for upgrade in &suite.upgrade_from {
        let meta = TestMeta {
            preinstall: upgrade
                .preinstall
                .clone()
                .unwrap_or_else(|| default_meta.preinstall.clone()),
            preupgrade: upgrade
                .preupgrade
                .clone()
                .unwrap_or_else(|| default_meta.preupgrade.clone()),
            install_args: upgrade
                .args
                .clone()
                .unwrap_or_else(|| install_args.clone()),
            upgrade_name: upgrade.label.clone(),
            extra: upgrade.extra.clone(),
        };
        cases.push(TestCase {
            suite_id: suite.id.clone(),
            kind: TestKind::Upgrade(Some(upgrade.commit.clone())),
            meta,
        });
    }

    if traits.is_webapp {
        cases.push(TestCase {
            suite_id: suite.id.clone(),
            kind: TestKind::ChangeUrl,
            meta: default_meta,
        });
    }

    cases
}

/// Generate every case of every suite, before `only`/`exclude` filtering.
pub fn generate_base_test_list(
    manifest: &TestManifest,
    default_install_args: &InstallArgs,
    traits: AppTraits,
) -> Vec<TestCase> {
    // Apps answering a domain but no path own a whole domain and cannot live in a subpath
    let is_full_domain_app =
        default_install_args.contains("domain") && !default_install_args.contains("path");

    manifest
        .suites
        .iter()
        .flat_map(|suite| suite_cases(suite, default_install_args, traits, is_full_domain_app))
        .collect()
}

/// Apply each suite's `only`/`exclude` to its own generated cases.
pub fn filter_test_list(manifest: &TestManifest, base: Vec<TestCase>) -> TestList {
    let mut suites: Vec<SuitePlan> = manifest
        .suites
        .iter()
        .map(|suite| SuitePlan {
            suite_id: suite.id.clone(),
            cases: Vec::new(),
        })
        .collect();

    for case in base {
        let Some(position) = manifest.suites.iter().position(|s| s.id == case.suite_id) else {
            continue;
        };
        if manifest.suites[position].keeps(&case.kind.id()) {
            suites[position].cases.push(case);
        }
    }

    TestList { suites }
}

/// Expand and filter in one go.
pub fn expand_test_plan(
    manifest: &TestManifest,
    default_install_args: &InstallArgs,
    traits: AppTraits,
) -> TestList {
    let base = generate_base_test_list(manifest, default_install_args, traits);
    let generated = base.len();
    let list = filter_test_list(manifest, base);
    debug!(
        "Expanded {} suites: {} generated cases, {} kept",
        list.suites.len(),
        generated,
        list.case_count()
    );
    list
}

/// Build the test list for an app directory holding `tests.toml`,
/// its manifest and `scripts/install`.
pub fn build_test_list(app_dir: &Path) -> Result<TestList> {
    let test_manifest = TestManifest::load(&app_dir.join("tests.toml"))?;
    let manifest = AppManifest::load(app_dir)?;

    let traits = AppTraits {
        is_webapp: is_webapp(app_dir)?,
        is_multi_instance: manifest.multi_instance,
    };

    // Suites may provide the answers the manifest cannot
    let default_install_args = manifest.default_install_args(false)?;

    info!(
        "Building test list for {} (webapp: {}, multi-instance: {})",
        manifest.id, traits.is_webapp, traits.is_multi_instance
    );

    Ok(expand_test_plan(&test_manifest, &default_install_args, traits))
}
