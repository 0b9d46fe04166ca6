use fail::fail_point;

use crate::bail;
use crate::error::{BulkResult, ErrorKind};

pub const STAGING_AFTER_CREATE: &str = "staging.after_create";
pub const TRANSFER_BEFORE_BATCH: &str = "transfer.before_batch";
pub const RECONCILE_BEFORE_READ_BACK: &str = "reconcile.before_read_back";

/// Returns an error when the fail point `name` is configured to return.
///
/// The return parameter selects the kind of the error: `staging`, `transfer` or `reconcile`.
pub fn bulk_fail_point(name: &str) -> BulkResult<()> {
    fail_point!(name, |parameter| {
        let mut error_kind = ErrorKind::Unknown;
        if let Some(parameter) = parameter {
            error_kind = match parameter.as_str() {
                "staging" => ErrorKind::StagingFailure,
                "transfer" => ErrorKind::TransferFailure,
                "reconcile" => ErrorKind::ReconciliationFailure,
                _ => ErrorKind::Unknown,
            }
        }

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
