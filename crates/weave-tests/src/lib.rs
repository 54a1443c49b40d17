//! Integration test infrastructure for Weave.
//!
//! Wires the engine, the in-memory adapters and the as-code services into
//! one [`TestContext`] so scenario tests can drive whole imports.
//!
//! # Usage
//!
//! ```ignore
//! use weave_tests::{DocumentFixture, TestContext};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let ctx = TestContext::new().await;
//!     ctx.import(&DocumentFixture::scenario_a()).await.unwrap();
//! }
//! ```

pub mod context;
pub mod fixtures;
pub mod helpers;

pub use context::TestContext;
pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,weave_tests=debug")),
        )
        .with_test_writer()
        .try_init();
}
