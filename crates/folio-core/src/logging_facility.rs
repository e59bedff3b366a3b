//! Structured logging for the data-access layer
//!
//! - One initialization point, `init(profile)`, for binaries and services
//! - Operation boundary macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//!   emitted by every repository call with the entity it ran against
//! - An in-memory capture layer so tests can assert on emitted events
//!
//! ```rust
//! use folio_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
