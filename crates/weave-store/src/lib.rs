//! In-memory adapters for Weave's persistence, project directory and
//! event bus ports.

pub mod bus;
pub mod repositories;

pub use bus::MemoryEventBus;
pub use repositories::*;
