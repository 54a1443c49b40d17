//! Weave As-Code
//!
//! Orchestrates workflow imports (parse, build, resolve permissions,
//! replace-or-fail persistence) and the as-code operations that push a
//! canonical export to a repository in the background.

pub mod dispatcher;
pub mod importer;
pub mod operation;
pub mod service;

pub use dispatcher::{ChannelDispatcher, DispatcherConfig};
pub use importer::{ImportOptions, ImportReport, ImportTarget, WorkflowImporter};
pub use operation::{OperationTracker, RetentionPolicy};
pub use service::AsCodeService;
