//! techworld/crates/tw-core/src/lib.rs
//!
//! The central domain types and interface definitions for the Tech World server.

pub mod models;
pub mod traits;
pub mod error;

// Re-exporting for easier access in other crates
pub use models::*;
pub use traits::*;
pub use error::*;
