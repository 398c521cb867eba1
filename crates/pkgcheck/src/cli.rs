//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::{Args, Parser, Subcommand};
use pkgcheck_common::probe::ProbeEnv;
use pkgcheck_common::summary::RunContext;
use std::path::PathBuf;

/// Package check harness
#[derive(Parser)]
#[command(name = "pkgcheck")]
#[command(about = "Package check - test plans and quality levels for app packages", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Config file (defaults to /etc/pkgcheck/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print default install arguments for a manifest as a query string
    DefaultArgs {
        /// manifest.toml / manifest.json, or the app directory holding it
        manifest: PathBuf,
    },

    /// Expand tests.toml into the ordered test list
    TestList {
        /// App directory with tests.toml, the manifest and scripts/
        app_dir: PathBuf,

        /// Write one <id>.json per test case here instead of printing JSON
        #[arg(long)]
        dump_to: Option<PathBuf>,
    },

    /// Grade executed tests and print the level report
    Analyze {
        /// Directory holding tests/<id>.json and results/<id>.json
        context_dir: PathBuf,

        /// Write the JSON summary here instead of stderr
        #[arg(long)]
        summary_out: Option<PathBuf>,

        /// Disable colors in the report
        #[arg(long)]
        no_color: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Check app pages over HTTP; probe definitions are read from stdin
    Probe(ProbeArgs),
}

/// Run metadata copied into the summary
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[arg(long, env = "commit", default_value = "")]
    pub commit: String,

    #[arg(long, env = "ARCH", default_value = "")]
    pub arch: String,

    #[arg(long, env = "YNH_VERSION", default_value = "")]
    pub ynh_version: String,

    #[arg(long, env = "YNH_BRANCH", default_value = "")]
    pub ynh_branch: String,
}

impl From<RunArgs> for RunContext {
    fn from(args: RunArgs) -> Self {
        RunContext {
            commit: args.commit,
            architecture: args.arch,
            yunohost_version: args.ynh_version,
            yunohost_branch: args.ynh_branch,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ProbeArgs {
    #[arg(long, env = "DOMAIN", default_value = "")]
    pub domain: String,

    #[arg(long, env = "SUBDOMAIN", default_value = "")]
    pub subdomain: String,

    #[arg(long, env = "USER", default_value = "")]
    pub user: String,

    #[arg(long, env = "PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Container IP the app domains resolve to
    #[arg(long, env = "LXC_IP", default_value = "")]
    pub lxc_ip: String,

    #[arg(long, env = "BASE_URL")]
    pub base_url: String,
}

impl From<ProbeArgs> for ProbeEnv {
    fn from(args: ProbeArgs) -> Self {
        ProbeEnv {
            domain: args.domain,
            subdomain: args.subdomain,
            user: args.user,
            password: args.password,
            lxc_ip: args.lxc_ip,
            base_url: args.base_url,
        }
    }
}
