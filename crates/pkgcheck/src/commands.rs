//! Command implementations

use crate::cli::ProbeArgs;
use crate::probe_runner;
use anyhow::{Context, Result};
use pkgcheck_common::app_manifest::AppManifest;
use pkgcheck_common::config::PkgcheckConfig;
use pkgcheck_common::dump::dump_for_package_check;
use pkgcheck_common::probe::{parse_probe_specs, probe_exit_code, ProbeEnv, ProbeResult};
use pkgcheck_common::report::render_report;
use pkgcheck_common::results::{load_executed_tests, ExecutedTest};
use pkgcheck_common::summary::{RunContext, Summary};
use pkgcheck_common::{build_test_list, grade};
use serde_json::{Map, Value};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

/// Query string of default install answers for a manifest file or app dir.
pub fn default_args_line(manifest: &Path) -> Result<String> {
    let app = if manifest.is_dir() {
        AppManifest::load(manifest)
    } else {
        AppManifest::load_file(manifest)
    }
    .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;

    let args = app.default_install_args(true)?;
    Ok(args.to_query_string())
}

pub fn default_args(manifest: &Path) -> Result<()> {
    println!("{}", default_args_line(manifest)?);
    Ok(())
}

pub fn test_list(app_dir: &Path, dump_to: Option<&Path>) -> Result<()> {
    let list = build_test_list(app_dir)
        .with_context(|| format!("Failed to build test list for {}", app_dir.display()))?;

    match dump_to {
        Some(dir) => {
            let written = dump_for_package_check(&list, dir)?;
            for path in written {
                println!("{}", path.display());
            }
        }
        None => println!("{}", serde_json::to_string_pretty(&list)?),
    }
    Ok(())
}

/// Load, grade and render; returns report lines and the summary.
pub fn analyze_context(
    context_dir: &Path,
    run: RunContext,
    config: &PkgcheckConfig,
    no_color: bool,
) -> Result<(Vec<String>, Summary)> {
    let loaded = load_executed_tests(context_dir)
        .with_context(|| format!("Failed to load test results from {}", context_dir.display()))?;
    let tests: Vec<ExecutedTest> = loaded.iter().map(|(_, test)| test.clone()).collect();

    let grade = grade(&tests);
    let lines = render_report(&tests, &grade, &config.report_style(no_color));
    let summary = Summary::build(run, &loaded, &grade);
    Ok((lines, summary))
}

pub fn analyze(
    context_dir: &Path,
    summary_out: Option<&PathBuf>,
    no_color: bool,
    run: RunContext,
    config: &PkgcheckConfig,
) -> Result<()> {
    let (lines, summary) = analyze_context(context_dir, run, config, no_color)?;
    for line in lines {
        println!("{}", line);
    }

    let json = summary.to_json_pretty()?;
    match summary_out {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write summary to {}", path.display()))?;
            info!("Summary written to {}", path.display());
        }
        None => eprintln!("{}", json),
    }
    Ok(())
}

/// `{name: result}` object, in probe order
pub fn probe_results_json(results: &[(String, ProbeResult)]) -> Result<Value> {
    let mut map = Map::new();
    for (name, result) in results {
        map.insert(name.clone(), serde_json::to_value(result)?);
    }
    Ok(Value::Object(map))
}

/// Run probes read from stdin; returns the probe exit code.
pub async fn probe(args: ProbeArgs, config: &PkgcheckConfig) -> Result<i32> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read probe definitions from stdin")?;

    let env = ProbeEnv::from(args);
    let specs = parse_probe_specs(&input, &env)?;
    info!("Running {} probes against {}", specs.len(), env.base_url);

    let results = probe_runner::run_probes(&specs, &env, &config.probe).await?;
    println!("{}", serde_json::to_string_pretty(&probe_results_json(&results)?)?);

    Ok(probe_exit_code(results.iter().map(|(_, r)| r)))
}
