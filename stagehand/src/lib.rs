//! stagehand library crate.
//!
//! A media pipeline coordinated purely through object-store notifications.
//! This module exposes the core functionality for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod notification;
pub mod pipeline;
pub mod store;

pub use error::{Error, Result};
