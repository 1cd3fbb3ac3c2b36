//! The dedicated diagnostic connection.
//!
//! Owns exactly one PostgreSQL session, deliberately separate from any
//! application connection pool: lock and activity inspection must not be
//! blocked by, or show up as noise within, the application's own
//! transactional connections.

use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::query::Query;
use sqlx::{Column, Connection, Postgres, Row, TypeInfo};
use tracing::debug;

use super::types::{DiagnosticRow, Value};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result, StatementErrorKind};
use crate::fragment::SqlFragment;

/// A single dedicated database session.
///
/// Open on construction, closed on explicit [`close`](Self::close) or on
/// drop. A second close is a no-op. No other component issues statements
/// on the underlying connection.
#[derive(Debug)]
pub struct DiagnosticConnection {
    conn: Option<PgConnection>,
    backend_pid: i32,
}

impl DiagnosticConnection {
    /// Opens the dedicated connection for the named target.
    ///
    /// The session is tagged with an application name derived from the
    /// target so it is identifiable in `pg_stat_activity`. Fails with a
    /// connection error if the server is unreachable, credentials are
    /// rejected, or the configured CA certificate cannot establish a
    /// verified TLS channel.
    pub async fn connect(target: &str, config: &ConnectionConfig) -> Result<Self> {
        let mut options = PgConnectOptions::new()
            .host(config.host.as_deref().unwrap_or("localhost"))
            .port(config.port)
            .application_name(&format!("pgscope-{}", target.to_lowercase()));

        if let Some(database) = &config.database {
            options = options.database(database);
        }
        if let Some(user) = &config.user {
            options = options.username(user);
        }
        if let Some(password) = &config.password {
            options = options.password(password);
        }
        if let Some(ca) = config.get_database_ca() {
            options = options.ssl_mode(PgSslMode::VerifyFull).ssl_root_cert(ca);
        }

        let mut conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| map_connection_error(&e, config))?;

        let backend_pid: i32 = sqlx::query_scalar("select pg_backend_pid()")
            .fetch_one(&mut conn)
            .await
            .map_err(|e| map_connection_error(&e, config))?;

        debug!(backend_pid, "opened dedicated diagnostic connection");

        Ok(Self {
            conn: Some(conn),
            backend_pid,
        })
    }

    /// Returns true while the connection has not been released.
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }
}

#[async_trait::async_trait]
impl super::Executor for DiagnosticConnection {
    async fn execute(&mut self, fragment: &SqlFragment) -> Result<Vec<DiagnosticRow>> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| Error::connection("connection has been released"))?;

        let (sql, binds) = fragment.render()?;
        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = bind_value(query, value);
        }

        let rows: Vec<PgRow> = query.fetch_all(&mut *conn).await.map_err(map_query_error)?;

        Ok(rows.iter().map(convert_row).collect())
    }

    fn backend_pid(&self) -> i32 {
        self.backend_pid
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            debug!(backend_pid = self.backend_pid, "releasing diagnostic connection");
            conn.close()
                .await
                .map_err(|e| Error::connection(e.to_string()))?;
        }
        Ok(())
    }
}

/// Binds a single value onto a query. Owned clones keep the bind lifetime
/// independent of the fragment.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::IntArray(v) => query.bind(v.clone()),
        Value::TextArray(v) => query.bind(v.clone()),
    }
}

/// Converts a sqlx PgRow into a column-name keyed mapping.
fn convert_row(row: &PgRow) -> DiagnosticRow {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let value = convert_value(row, i, col.type_info().name());
            (col.name().to_string(), value)
        })
        .collect()
}

/// Decodes one nullable column, treating decode failures as NULL.
fn decode<'r, T>(row: &'r PgRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index).ok().flatten()
}

/// Converts a single column value to our Value type, by server type name.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    let cell = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode::<bool>(row, index).map(Value::Bool),
        "INT2" | "SMALLINT" => decode::<i16>(row, index).map(|v| Value::Int(v.into())),
        "INT4" | "INT" | "INTEGER" => decode::<i32>(row, index).map(|v| Value::Int(v.into())),
        "INT8" | "BIGINT" => decode::<i64>(row, index).map(Value::Int),
        "FLOAT4" | "REAL" => decode::<f32>(row, index).map(|v| Value::Float(v.into())),
        "FLOAT8" | "DOUBLE PRECISION" => decode::<f64>(row, index).map(Value::Float),
        "BYTEA" => decode::<Vec<u8>>(row, index).map(Value::Bytes),
        // Catalog queries cast non-core types to text; anything else that
        // still fails to decode as text becomes NULL.
        _ => decode::<String>(row, index).map(Value::String),
    };
    cell.unwrap_or(Value::Null)
}

/// Maps a server statement rejection onto the error taxonomy.
///
/// SQLSTATE codes distinguish undefined objects, syntax errors, and type
/// mismatches; anything without a database error payload is a
/// connectivity failure.
fn map_query_error(error: sqlx::Error) -> Error {
    match error.as_database_error() {
        Some(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            let kind = match code.as_str() {
                "42P01" | "42703" | "42704" | "42883" | "3F000" => {
                    StatementErrorKind::UndefinedObject
                }
                "42601" => StatementErrorKind::Syntax,
                "42804" | "42P18" | "22P02" => StatementErrorKind::InvalidType,
                _ => StatementErrorKind::Other,
            };
            Error::statement(kind, db_err.message().to_string())
        }
        None => Error::connection(error.to_string()),
    }
}

/// Maps sqlx connection errors to messages that name the failing target
/// without leaking credentials.
fn map_connection_error(error: &sqlx::Error, config: &ConnectionConfig) -> Error {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        Error::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        Error::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        Error::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        Error::connection(format!(
            "TLS negotiation with {host}:{port} failed. Check the configured CA certificate."
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        Error::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        Error::connection(error.to_string())
    }
}
