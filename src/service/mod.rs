//! Service layer for the lobby-forge matchmaking service
//!
//! This module contains the main application state and the lifecycle of the
//! background matchmaking loop and HTTP server.

pub mod app;

pub use app::{AppState, ServiceError};
