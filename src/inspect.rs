//! Diagnostic inspectors over a dedicated connection.
//!
//! Each inspector composes parameterized fragments and hands them to the
//! executor: current sessions, lock waits, configuration settings, cached
//! statement statistics, and gated query-plan explanation.

use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::db::types::{DiagnosticRow, ExtensionStatus, ServerVersion, Value};
use crate::db::{DiagnosticConnection, Executor};
use crate::error::{Error, Result};
use crate::fragment::{limit_clause, ranking_case_clause, SqlFragment};
use crate::safety::{classify, Classification};

/// The optional statement-statistics extension.
pub const STATEMENT_STATS_EXTENSION: &str = "pg_stat_statements";

/// Hard cap on returned statement-statistics rows.
const STATEMENT_STATS_LIMIT: i64 = 500;

/// Filters for the activity inspector.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    /// Include the diagnostic connection's own backend in the results.
    pub include_self: bool,

    /// Restrict to the given backend process ids.
    pub pids: Option<Vec<i32>>,

    /// Restrict to sessions in the given states. An unrecognized state
    /// matches nothing and yields an empty result, not an error.
    pub states: Option<Vec<String>>,
}

/// Diagnostic inspectors bound to one executor.
///
/// Constructed over a live [`DiagnosticConnection`] via
/// [`connect`](DbInspector::connect), or over any [`Executor`] in tests.
/// Dropping the inspector releases the connection; [`close`](Self::close)
/// releases it explicitly and is idempotent.
#[derive(Debug)]
pub struct DbInspector<E: Executor> {
    executor: E,
    ranking: Vec<String>,
}

impl DbInspector<DiagnosticConnection> {
    /// Opens a dedicated connection for the named target and binds the
    /// inspectors to it.
    pub async fn connect(target: &str, config: &ConnectionConfig) -> Result<Self> {
        let conn = DiagnosticConnection::connect(target, config).await?;
        Ok(Self::new(conn))
    }
}

impl<E: Executor> DbInspector<E> {
    /// Binds the inspectors to an existing executor.
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            ranking: Vec::new(),
        }
    }

    /// Sets the database ranking used for custom ordering expressions;
    /// earlier entries sort first.
    pub fn with_ranking(mut self, ranking: Vec<String>) -> Self {
        self.ranking = ranking;
        self
    }

    /// The underlying executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// The backend process id of the diagnostic session.
    pub fn backend_pid(&self) -> i32 {
        self.executor.backend_pid()
    }

    /// Releases the underlying connection. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        self.executor.close().await
    }

    /// Fetches and parses the server engine version.
    pub async fn server_version(&mut self) -> Result<ServerVersion> {
        let fragment =
            SqlFragment::from_text("select current_setting('server_version') as server_version");
        let rows = self.executor.execute(&fragment).await?;
        let raw = rows
            .first()
            .and_then(|r| r.get("server_version"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::internal("server reported no version setting"))?;
        ServerVersion::parse(raw)
    }

    /// Returns current configuration settings.
    ///
    /// Without a filter, all settings; with one, exactly the requested
    /// settings that exist on the server. Absent names yield no row.
    pub async fn settings(&mut self, names: Option<&[String]>) -> Result<Vec<DiagnosticRow>> {
        let mut fragment = SqlFragment::from_text(
            "select name, setting, unit, source, short_desc from pg_settings",
        );

        if let Some(names) = names {
            fragment = fragment.concat(SqlFragment::with_bindings(
                " where name = any(%(setting_names)s)",
                [(
                    "setting_names".to_string(),
                    Value::TextArray(names.to_vec()),
                )],
            ))?;
        }
        fragment = fragment.concat(SqlFragment::from_text(" order by name"))?;

        self.executor.execute(&fragment).await
    }

    /// Lists current server sessions.
    ///
    /// The diagnostic connection's own backend is excluded unless the
    /// filter asks for it.
    pub async fn activity(&mut self, filter: &ActivityFilter) -> Result<Vec<DiagnosticRow>> {
        let mut fragment = SqlFragment::from_text(
            "select a.pid as backend_pid, \
                    a.datname::text as datname, \
                    a.usename::text as usename, \
                    a.application_name, \
                    a.client_addr::text as client_addr, \
                    a.backend_start::text as backend_start, \
                    a.xact_start::text as xact_start, \
                    a.query_start::text as query_start, \
                    a.wait_event_type, \
                    a.wait_event, \
                    a.state, \
                    a.query \
               from pg_stat_activity a \
              where a.backend_type = 'client backend'",
        );

        if !filter.include_self {
            fragment = fragment.concat(SqlFragment::with_bindings(
                " and a.pid != %(self_pid)s",
                [(
                    "self_pid".to_string(),
                    Value::Int(self.executor.backend_pid() as i64),
                )],
            ))?;
        }
        if let Some(pids) = &filter.pids {
            fragment = fragment.concat(SqlFragment::with_bindings(
                " and a.pid = any(%(pids)s)",
                [(
                    "pids".to_string(),
                    Value::IntArray(pids.iter().map(|p| *p as i64).collect()),
                )],
            ))?;
        }
        if let Some(states) = &filter.states {
            fragment = fragment.concat(SqlFragment::with_bindings(
                " and a.state = any(%(states)s)",
                [("states".to_string(), Value::TextArray(states.clone()))],
            ))?;
        }
        fragment = fragment.concat(SqlFragment::from_text(" order by a.backend_start"))?;

        self.executor.execute(&fragment).await
    }

    /// Lists current lock-wait information: each blocked session paired
    /// with the session holding the conflicting lock.
    ///
    /// A limit of zero or below means unlimited.
    pub async fn lock_info(&mut self, limit: Option<i64>) -> Result<Vec<DiagnosticRow>> {
        let fragment = SqlFragment::from_text(
            "select blocked.pid as blocked_pid, \
                    blocked_act.usename::text as blocked_user, \
                    blocked.locktype, \
                    blocked.mode as blocked_mode, \
                    blocked_act.query as blocked_query, \
                    blocking.pid as blocking_pid, \
                    blocking_act.usename::text as blocking_user, \
                    blocking_act.query as blocking_query \
               from pg_locks blocked \
               join pg_stat_activity blocked_act on blocked_act.pid = blocked.pid \
               join pg_locks blocking \
                 on blocking.locktype = blocked.locktype \
                and blocking.database is not distinct from blocked.database \
                and blocking.relation is not distinct from blocked.relation \
                and blocking.transactionid is not distinct from blocked.transactionid \
                and blocking.pid != blocked.pid \
               join pg_stat_activity blocking_act on blocking_act.pid = blocking.pid \
              where not blocked.granted \
                and blocking.granted \
              order by blocked_act.query_start",
        )
        .concat(limit_clause(limit))?;

        self.executor.execute(&fragment).await
    }

    /// Checks whether the named extension is installed, and its version.
    ///
    /// Derived fresh on every call; server state may change between calls.
    pub async fn validate_extension(&mut self, name: &str) -> Result<ExtensionStatus> {
        let fragment = SqlFragment::with_bindings(
            "select extversion from pg_extension where extname = %(extension)s",
            [("extension".to_string(), Value::from(name))],
        );
        let rows = self.executor.execute(&fragment).await?;

        Ok(match rows.first().and_then(|r| r.get("extversion")) {
            Some(Value::String(version)) => ExtensionStatus::present(version.clone()),
            _ => ExtensionStatus::absent(),
        })
    }

    /// Checks for the statement-statistics extension.
    pub async fn validate_pg_stat_statements(&mut self) -> Result<ExtensionStatus> {
        self.validate_extension(STATEMENT_STATS_EXTENSION).await
    }

    /// Returns cached statement statistics.
    ///
    /// With the extension installed, up to 500 top rows ordered by the
    /// configured database ranking then by total execution time. Without
    /// it, a single synthetic row keyed `Result`: extension absence is a
    /// degraded success, never an error.
    pub async fn statement_stats(&mut self) -> Result<Vec<DiagnosticRow>> {
        let status = self.validate_pg_stat_statements().await?;
        if !status.present {
            info!(
                extension = STATEMENT_STATS_EXTENSION,
                "extension not installed, returning placeholder row"
            );
            let mut row = DiagnosticRow::new();
            row.insert(
                "Result".to_string(),
                Value::String(format!(
                    "{STATEMENT_STATS_EXTENSION} extension is not installed on the server"
                )),
            );
            return Ok(vec![row]);
        }
        debug!(
            extension = STATEMENT_STATS_EXTENSION,
            version = status.version.as_deref().unwrap_or(""),
            "collecting statement statistics"
        );

        let mut fragment = SqlFragment::from_text(
            "select d.datname::text as dbname, \
                    s.calls, \
                    s.rows, \
                    s.total_exec_time, \
                    s.mean_exec_time, \
                    s.query \
               from pg_stat_statements s \
               join pg_database d on d.oid = s.dbid",
        );

        let ordering = self.database_ordering_clause("d.datname");
        if ordering.is_empty() {
            fragment = fragment.concat(SqlFragment::from_text(" order by s.total_exec_time desc"))?;
        } else {
            fragment = fragment
                .concat(SqlFragment::from_text(" order by "))?
                .concat(ordering)?
                .concat(SqlFragment::from_text(", s.total_exec_time desc"))?;
        }
        fragment = fragment.concat(limit_clause(Some(STATEMENT_STATS_LIMIT)))?;

        self.executor.execute(&fragment).await
    }

    /// Explains a read-only statement.
    ///
    /// Non-read-only statements are refused before any network round-trip.
    /// Returns one row with the newline-joined plan under `query_plan` and
    /// the original statement under `query_text`.
    pub async fn explain(&mut self, statement: &str) -> Result<Vec<DiagnosticRow>> {
        if classify(statement) == Classification::Unsafe {
            return Err(Error::not_permitted(statement.trim().to_string()));
        }

        let fragment = SqlFragment::from_text(format!("explain verbose {statement}"));
        let rows = self.executor.execute(&fragment).await?;

        let plan = rows
            .iter()
            .filter_map(|r| r.get("QUERY PLAN").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");

        let mut row = DiagnosticRow::new();
        row.insert("query_plan".to_string(), Value::String(plan));
        row.insert("query_text".to_string(), Value::from(statement));
        Ok(vec![row])
    }

    /// Ranking CASE expression over the given column, from the configured
    /// database ranking. Empty fragment when no ranking was configured.
    fn database_ordering_clause(&self, column_expression: &str) -> SqlFragment {
        ranking_case_clause(column_expression, &self.ranking)
    }
}
