//! Connection lifecycle integration tests.
//!
//! Covers the dedicated-connection guarantees: isolation, release on
//! every exit path, and idempotent close.

use std::time::Duration;

use pgscope::config::ConnectionConfig;
use pgscope::db::{DiagnosticConnection, Value};
use pgscope::error::{Error, StatementErrorKind};
use pgscope::inspect::{ActivityFilter, DbInspector};

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create a test inspector.
async fn get_test_inspector() -> Option<DbInspector<DiagnosticConnection>> {
    let url = get_test_database_url()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    DbInspector::connect("test", &config).await.ok()
}

/// Checks from a second connection whether a backend pid is still listed.
async fn backend_is_listed(observer: &mut DbInspector<DiagnosticConnection>, pid: i32) -> bool {
    let filter = ActivityFilter {
        include_self: true,
        pids: Some(vec![pid]),
        ..Default::default()
    };
    !observer.activity(&filter).await.unwrap().is_empty()
}

#[tokio::test]
async fn test_dedicated_connection_is_tagged_and_visible() {
    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let pid = inspector.backend_pid();
    let filter = ActivityFilter {
        include_self: true,
        pids: Some(vec![pid]),
        ..Default::default()
    };
    let rows = inspector.activity(&filter).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("application_name"),
        Some(&Value::from("pgscope-test"))
    );

    inspector.close().await.unwrap();
}

#[tokio::test]
async fn test_scope_exit_releases_connection() {
    let Some(mut observer) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let Some(inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let pid = inspector.backend_pid();
    assert!(backend_is_listed(&mut observer, pid).await);

    drop(inspector);

    // The server needs a moment to reap the dropped backend.
    let mut released = false;
    for _ in 0..50 {
        if !backend_is_listed(&mut observer, pid).await {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(released, "backend {pid} still listed after drop");

    observer.close().await.unwrap();
}

#[tokio::test]
async fn test_error_exit_still_releases_connection() {
    let Some(mut observer) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let pid = inspector.backend_pid();

    // Provoke a statement error, then leave the scope.
    let err = inspector
        .explain("select * from no_table_here")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Statement {
            kind: StatementErrorKind::UndefinedObject,
            ..
        }
    ));
    drop(inspector);

    let mut released = false;
    for _ in 0..50 {
        if !backend_is_listed(&mut observer, pid).await {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(released, "backend {pid} still listed after error + drop");

    observer.close().await.unwrap();
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    inspector.close().await.unwrap();
    // Second close is a no-op, never an error.
    inspector.close().await.unwrap();
}

#[tokio::test]
async fn test_execute_after_close_is_connection_error() {
    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    inspector.close().await.unwrap();
    let err = inspector.settings(None).await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_host() {
    let config = ConnectionConfig {
        host: Some("invalid.host.that.does.not.exist.local".to_string()),
        port: 5432,
        database: Some("testdb".to_string()),
        user: Some("testuser".to_string()),
        password: Some("testpass".to_string()),
        database_ca: None,
    };

    let result = DbInspector::connect("test", &config).await;
    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), Error::Connection(_)));
}

#[tokio::test]
async fn test_connect_with_unusable_ca_certificate() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let mut config = ConnectionConfig::from_connection_string(&url).unwrap();
    config.database_ca = Some("/nonexistent/ca.pem".into());

    let result = DbInspector::connect("test", &config).await;
    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), Error::Connection(_)));
}
