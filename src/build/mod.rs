//! Build pipeline module for assetline
//!
//! Turns a source tree into a published output tree by running each source
//! through the transform chain of the first rule that matches it.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Discovery**: Walk the source root, drop ignored paths
//! - **Planning**: Classify every source against the rule table
//! - **Execution**: Run chains in two waves on a worker pool
//! - **Publishing**: Resolve destinations, detect collisions, write atomically
//!
//! # Example
//!
//! ```ignore
//! use assetline::build::{BuildContext, Pipeline};
//! use assetline::config::load_config;
//!
//! let config = load_config(None, None)?;
//! let context = BuildContext::new(config, project_root);
//! let pipeline = Pipeline::new(context)?;
//!
//! let report = pipeline.run()?;
//! println!("{}", report.summary());
//! ```

pub mod context;
pub mod discovery;
pub mod incremental;
pub mod manifest;
pub mod parallel;
pub mod pipeline;
pub mod result;
pub mod target;

pub use context::*;
pub use discovery::*;
pub use incremental::*;
pub use manifest::*;
pub use parallel::*;
pub use pipeline::*;
pub use result::*;
pub use target::*;
