//! Document-level orchestration.
//!
//! [`MultiPageCoordinator`] fans pages out to workers and reconciles their
//! results; [`DocumentPipeline`] is the cache-aware entry point built on top.

pub mod coordinator;
pub mod facade;

pub use coordinator::{MultiPageCoordinator, analyze_transition};
pub use facade::{DocumentPipeline, PipelineCacheStats};
