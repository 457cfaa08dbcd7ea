//! Recon Path
//!
//! Dotted-key addressing and structural comparison over JSON object trees.
//!
//! # Core Concepts
//!
//! - [`DotPath`]: Parsed `a.b.c` key path, strictly object-keyed (no array indices)
//! - [`get`] / [`set`]: Lenient read and strict write over a [`serde_json::Value`]
//! - [`matches`]: Desired-vs-observed equality with numeric normalization
//!
//! # Example
//!
//! ```rust
//! use recon_path::{get, set, matches};
//! use serde_json::json;
//!
//! let mut doc = json!({});
//! set(&mut doc, "rateLimit.rpm", json!(120)).unwrap();
//! assert!(matches(Some(&json!(120.0)), get(&doc, "rateLimit.rpm")));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod dot_path;
mod matcher;

pub use dot_path::{get, set, DotPath, PathError};
pub use matcher::{matches, values_equal};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
