//! Process exit codes.
//! Scripts and deploy checks rely on these values.

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1; // Failure envelope or failing healthcheck
pub const EXIT_INTERNAL_ERROR: i32 = 2; // Internal error, schema unavailable or bad setup
