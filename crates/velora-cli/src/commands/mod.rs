pub mod reconcile;
pub mod validate;

use velora_engine::RunReport;

pub const EXIT_OK: i32 = 0;
/// A scope or an action failed
pub const EXIT_FAILED: i32 = 1;
/// The policy could not be loaded or validated
pub const EXIT_CONFIG: i32 = 2;

/// Process exit code for a finished run
pub fn exit_code(report: &RunReport) -> i32 {
    if report.succeeded() && report.summary().failed == 0 {
        EXIT_OK
    } else {
        EXIT_FAILED
    }
}
