//! Wire vocabulary of the runtime API.

/// Absolute deadline, integer milliseconds since the Unix epoch.
pub const DEADLINE_HEADER: &str = "Lambda-Runtime-Deadline-Ms";
pub const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";
pub const INVOKED_FUNCTION_ARN_HEADER: &str = "Lambda-Runtime-Invoked-Function-Arn";
pub const TRACE_ID_HEADER: &str = "Lambda-Runtime-Trace-Id";
/// Type tag attached to failure reports.
pub const ERROR_TYPE_HEADER: &str = "Lambda-Runtime-Function-Error-Type";

pub const INVOCATION_SEGMENT: &str = "invocation";
pub const NEXT_SEGMENT: &str = "next";
pub const RESPONSE_SEGMENT: &str = "response";
pub const ERROR_SEGMENT: &str = "error";

/// Diagnostic prefix for handlers that panicked.
pub const PANICKED_MESSAGE: &str = "function invocation panicked";
/// Diagnostic prefix for handlers that returned an error.
pub const FAILED_MESSAGE: &str = "function invocation failed";
