//! Exit codes for pkgcheck

use pkgcheck_common::probe;
use pkgcheck_common::PkgcheckError;

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for general errors (I/O, missing results, ...)
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code for invalid manifests, tests.toml or probe definitions
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Exit code when a probe got a 5xx answer
pub const EXIT_PROBE_SERVER_ERROR: i32 = probe::EXIT_SERVER_ERROR;

/// Exit code when a probe assertion failed
pub const EXIT_PROBE_ASSERTION_FAILED: i32 = probe::EXIT_ASSERTION_FAILED;

/// Map a command failure to the process exit code.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<PkgcheckError>() {
        Some(e) if e.is_configuration() => EXIT_CONFIG_ERROR,
        _ => EXIT_GENERAL_ERROR,
    }
}
