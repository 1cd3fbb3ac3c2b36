//! Database layer for pgscope.
//!
//! Provides a trait-based executor seam over a single dedicated
//! PostgreSQL connection, so the inspectors can be exercised against a
//! mock in tests.

mod connection;
pub mod mock;
pub mod types;

pub use connection::DiagnosticConnection;
pub use mock::MockExecutor;
pub use types::{DiagnosticRow, ExtensionStatus, ServerVersion, Value};

use crate::error::Result;
use crate::fragment::SqlFragment;
use async_trait::async_trait;

/// The execution interface the inspectors are written against.
///
/// Implemented by [`DiagnosticConnection`] for a live server and by
/// [`MockExecutor`] for offline tests. Operations take `&mut self`: the
/// underlying connection protocol is not reentrant, so calls on one
/// executor are strictly sequential.
#[async_trait]
pub trait Executor: Send {
    /// Runs a fragment's text with its bindings, returning rows as
    /// column-name to value mappings.
    async fn execute(&mut self, fragment: &SqlFragment) -> Result<Vec<DiagnosticRow>>;

    /// The server backend process id of this session.
    fn backend_pid(&self) -> i32;

    /// Releases the underlying connection. Idempotent: a second close is
    /// a no-op, never an error.
    async fn close(&mut self) -> Result<()>;
}
