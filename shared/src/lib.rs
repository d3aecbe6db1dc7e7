//! Types shared between the poolvr server and its browser client.

pub mod config;
pub mod protocol;
