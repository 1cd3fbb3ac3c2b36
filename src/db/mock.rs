//! Mock executor for testing.
//!
//! Returns scripted responses and records every fragment it is asked to
//! run, so inspector SQL composition can be asserted without a server.

use std::collections::VecDeque;

use async_trait::async_trait;

use super::types::DiagnosticRow;
use super::Executor;
use crate::error::{Error, Result};
use crate::fragment::SqlFragment;

/// Backend pid reported by the mock.
pub const MOCK_BACKEND_PID: i32 = 4242;

/// A mock executor with scripted responses, consumed in order.
#[derive(Debug, Default)]
pub struct MockExecutor {
    responses: VecDeque<Result<Vec<DiagnosticRow>>>,
    executed: Vec<SqlFragment>,
    closed: bool,
}

impl MockExecutor {
    /// Creates a mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response.
    pub fn push_rows(&mut self, rows: Vec<DiagnosticRow>) -> &mut Self {
        self.responses.push_back(Ok(rows));
        self
    }

    /// Queues an error response.
    pub fn push_error(&mut self, error: Error) -> &mut Self {
        self.responses.push_back(Err(error));
        self
    }

    /// The fragments executed so far, in order.
    pub fn executed(&self) -> &[SqlFragment] {
        &self.executed
    }

    /// Returns true after [`Executor::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&mut self, fragment: &SqlFragment) -> Result<Vec<DiagnosticRow>> {
        self.executed.push(fragment.clone());
        self.responses
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn backend_pid(&self) -> i32 {
        MOCK_BACKEND_PID
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
