//! Dispo - disposable email domain lookup.
//!
//! Keeps a periodically refreshed set of disposable domains, persists it to a
//! JSON snapshot and answers membership queries over HTTP.

pub mod config;
pub mod domains;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod scheduler;
pub mod server;
pub mod stats;
