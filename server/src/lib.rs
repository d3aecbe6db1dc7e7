//! poolvr server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod app;
pub mod cli;
pub mod config;
pub mod dist;
pub mod logging;
pub mod persist;
pub mod render;
pub mod revisions;
pub mod routes;
pub mod scene;
pub mod template;
