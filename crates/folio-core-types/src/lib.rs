//! Leaf types shared across the Folio crates
//!
//! - **Schema constants**: canonical structured-logging field keys and event names
//! - **Sensitive data**: `Sensitive<T>` marker that redacts itself when formatted

pub mod schema;
pub mod sensitive;

pub use sensitive::Sensitive;
