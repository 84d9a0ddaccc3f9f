//! Transformation module.
//!
//! - Operations: the column rewrites and step parsing
//! - Executor: apply operations to table columns
//! - Pipeline: parse, select, transform and export in one call

pub mod executor;
pub mod operations;
pub mod pipeline;

pub use executor::{apply, apply_all, apply_in_place};
pub use operations::{operations_description, Operation, Step, PHONE_PREFIX};
pub use pipeline::*;
