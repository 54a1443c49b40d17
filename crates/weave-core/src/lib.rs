//! Weave Core
//!
//! Domain types, traits, and error handling shared by every Weave crate:
//! the flat workflow document, the canonical workflow graph, access
//! control entries, variables, as-code operations and the port traits
//! implemented by external adapters.

pub mod ascode;
pub mod error;
pub mod events;
pub mod graph;
pub mod ids;
pub mod permission;
pub mod ports;
pub mod project;
pub mod variables;
pub mod workflow;

pub use error::{Error, Result};
pub use ids::*;
