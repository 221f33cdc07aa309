//! Operations module
//!
//! Coordinates the edit workflow (derive, bind, reduce, write) and the status report

pub mod edit;
pub mod output;
pub mod status;
pub mod write;

pub use edit::{EditOperation, EditOutcome};
pub use output::{OutputFormat, format_output};
pub use status::{AgentStatus, Freshness, StatusOperation};
pub use write::{ConfigWriter, WritePlan};
