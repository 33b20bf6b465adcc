//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageStatus`: the per-URL crawl state machine
//! - `HostState`: per-host request spacing and robots.txt crawl-delay
//! - `AuditStatus`: the lifecycle of one audit

mod audit_status;
mod host_state;
mod page_status;

pub use audit_status::AuditStatus;
pub use host_state::HostState;
pub use page_status::PageStatus;
