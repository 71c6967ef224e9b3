//! Execution engine for hostform
//!
//! The engine orchestrates:
//! 1. Planning - Validate the desired state and order its steps
//! 2. Executing - Run the plan against the host, one step at a time
//! 3. Reporting - Per-step progress, then the report table or JSON

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{Output, run};
pub use planner::build;
