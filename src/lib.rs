//! pgscope - diagnostic inspection of a running PostgreSQL server.
//!
//! Opens a dedicated connection, isolated from any application pool, and
//! answers diagnostic questions about server state: active sessions, lock
//! waits, configuration settings, and cached statement statistics. SQL is
//! composed from parameterized fragments; caller values never appear in
//! statement text.

pub mod config;
pub mod db;
pub mod error;
pub mod fragment;
pub mod inspect;
pub mod logging;
pub mod safety;
