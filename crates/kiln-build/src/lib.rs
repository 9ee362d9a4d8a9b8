//! Kiln Docker Image Build functionality
//!
//! This crate provides Docker image build capabilities for Kiln,
//! including build context creation, image building with dual tagging,
//! build scheduling, and retention-based pruning of stale tags.

pub mod args;
pub mod builder;
pub mod context;
pub mod error;
pub mod retention;
pub mod scheduler;

pub use args::{parse_build_args, validate_build_arg};
pub use builder::{BuildReport, ImageBuilder, timestamp_tag};
pub use context::ContextBuilder;
pub use error::{BuildError, BuildResult};
pub use retention::RetentionPruner;
pub use scheduler::{BuildMode, BuildScheduler, overall_success};
