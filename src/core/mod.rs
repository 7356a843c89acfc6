//! # Core Module
//!
//! Configuration and error types shared by every layer.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Add typed descriptor/context/dispatch errors
//! - 1.0.0: Initial creation with config module

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::Config;
pub use error::{ContextError, DescriptorError, DispatchError};
