//! lambuild-lib: build input generation for CodeBuild
//!
//! This crate turns a buildspec extended with a `lambuild` block into the
//! builds to start for a source-control event:
//! - `Buildspec`: the parsed document, with every expression compiled
//! - `Data`: the per-event evaluation context with memoized lazy facts
//! - `Generator`: selects graph, list, matrix or item mode and produces a `BuildInput`
//! - `Dispatcher`: generates and submits several documents concurrently

pub mod buildspec;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod expr;
pub mod generate;
pub mod template;
pub mod util;

pub use buildspec::Buildspec;
pub use context::Data;
pub use generate::{BuildInput, Generator, generate};
