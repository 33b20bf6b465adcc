//! Audit orchestration
//!
//! An [`Auditor`] owns the long-lived collaborators (storage, cache, HTTP
//! fetcher, configuration). Each audit gets its own [`AuditContext`]
//! carrying the validated parameters and the cancellation token; nothing
//! about a running audit lives in process-wide state.

mod pipeline;
mod request;

pub use pipeline::{AuditOutcome, Auditor};
pub use request::{
    AuditParams, AuditRequest, Language, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PAGES, MAX_DEPTH_LIMIT,
    MAX_PAGES_LIMIT,
};

use crate::cache::CacheManager;
use crate::config::Config;
use crate::crawler::Fetcher;
use crate::storage::SharedStorage;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything one audit needs, threaded through every stage
#[derive(Clone)]
pub struct AuditContext {
    pub params: AuditParams,
    pub config: Arc<Config>,
    pub cancel: CancellationToken,
    pub storage: SharedStorage,
    pub cache: Arc<CacheManager>,
    pub fetcher: Arc<dyn Fetcher>,
}
