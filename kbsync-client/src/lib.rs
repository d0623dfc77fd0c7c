//! # kbsync client
//!
//! Client-side state synchronization for server-executed knowledge-base
//! processing jobs (parsing, ingestion, summary and graph generation).
//! Tracks each job's lifecycle by polling a status endpoint, reconciles
//! updates into a local entity cache, and enforces at most one active
//! poller per entity identifier.

pub mod api;
pub mod cache;
pub mod normalize;
pub mod poller;
pub mod store;

pub use api::KbApiClient;
pub use cache::{EntityCache, SharedCache};
pub use normalize::Normalizer;
pub use poller::PollerRegistry;
pub use store::KnowledgeBaseStore;
