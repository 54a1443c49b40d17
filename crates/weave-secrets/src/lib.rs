//! Secret-aware variable storage for Weave.

pub mod gateway;
pub mod vault;

pub use gateway::{GatewayConfig, SecretVariableGateway};
pub use vault::{NativeVault, Sealed};
