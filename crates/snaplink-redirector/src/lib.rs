//! Resolution of short ids, visit accounting and stats.
//!
//! [`RedirectorService`] resolves through a [`UrlCache`](snaplink_core::UrlCache)
//! in front of the store and never fails because of the cache. Every
//! successful resolution hands a visit to a [`VisitRecorder`]; a background
//! [`VisitWorker`] applies them to the store.

pub mod error;
pub mod redirector;
pub mod service;
pub mod visits;

pub use error::{RedirectorError, Result};
pub use redirector::Redirector;
pub use service::{RedirectorConfig, RedirectorService};
pub use visits::{
    increment_visit, visit_channel, VisitRecorder, VisitSummary, VisitWorker, VisitWorkerConfig,
    MAX_VISIT_QUEUE_CAPACITY,
};
