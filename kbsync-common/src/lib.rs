//! # KBSYNC Common Library
//!
//! Shared code for the kbsync workspace:
//! - Knowledge-base data model and job lifecycle predicates
//! - Common error type
//! - Client configuration loading

pub mod config;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{KbId, KbStatus, KnowledgeBase, ParsingStage, ParsingState};
