//! HTTP front door.
//!
//! Converts platform notification payloads into dispatches and exposes
//! health, logging and classification endpoints.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
