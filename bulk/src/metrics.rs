//! Metrics definitions for bulk operation monitoring.

/// Label for the destination table in metrics.
pub const TABLE_NAME_LABEL: &str = "table_name";

/// Label for the operation in metrics, e.g. `insert` or `binary_delete`.
pub const OPERATION_LABEL: &str = "operation";

/// Label for error kind in metrics.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Counter for rows written into destinations or staging relations through COPY.
pub const BULK_ROWS_LOADED_TOTAL: &str = "bulk_rows_loaded_total";

/// Counter for destination rows removed by delete operations.
pub const BULK_ROWS_DELETED_TOTAL: &str = "bulk_rows_deleted_total";

/// Counter for COPY invocations, one per batch.
pub const BULK_BATCHES_LOADED_TOTAL: &str = "bulk_batches_loaded_total";

/// Counter for failed operations.
pub const BULK_OPERATION_FAILURES_TOTAL: &str = "bulk_operation_failures_total";

/// Histogram of operation durations in seconds.
pub const BULK_OPERATION_DURATION_SECONDS: &str = "bulk_operation_duration_seconds";
