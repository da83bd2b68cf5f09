//! # Nudge Core
//!
//! Shared error type, configuration and the collaborator traits used by the
//! provider and scheduler crates.

pub mod config;
pub mod error;
pub mod traits;

pub use config::NudgeConfig;
pub use error::{NudgeError, Result};
pub use traits::{Generator, Transport};
