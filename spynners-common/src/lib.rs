//! # SPYNNERS Common Library
//!
//! Shared code for the SPYNNERS backend services:
//! - Common error type
//! - Bootstrap configuration loading (TOML + environment)
//! - Time helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
