//! patchcat Core Library
//!
//! This crate provides the error taxonomy, the classification data model
//! and the tracing setup shared by every patchcat component.

pub mod error;
pub mod logging;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

