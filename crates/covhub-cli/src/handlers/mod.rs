//! Command handlers - extracted from main.rs for testability

pub mod report;
pub mod serve;

pub use report::execute_report;
pub use serve::{build_app, execute_serve};
