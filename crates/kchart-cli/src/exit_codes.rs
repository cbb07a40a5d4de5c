//! Standard exit codes for CLI operations
//!
//! Each failure class has its own code so wrapper scripts can tell a wrong
//! cluster from a failed helm run. Usage errors follow sysexits.h.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Precondition failed - missing chart, environment, namespace, secret or tag
pub const PRECONDITION_FAILED: i32 = 2;

/// The running image belongs to another chart
pub const IDENTITY_MISMATCH: i32 = 3;

/// An external command (kubectl, helm, aws, ...) failed
pub const EXTERNAL_COMMAND_FAILED: i32 = 4;

/// Unparseable image, version, connection string or tool output
pub const PARSE_ERROR: i32 = 5;

/// A required executable is not installed
pub const MISSING_DEPENDENCY: i32 = 6;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
