//! In-memory repository implementations.

mod project;
mod workflow;

pub use project::MemoryProjectDirectory;
pub use workflow::MemoryWorkflowRepository;
