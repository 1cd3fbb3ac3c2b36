//! Inspector integration tests against a live server.
//!
//! Each test skips cleanly when DATABASE_URL is not set.

use pgscope::config::ConnectionConfig;
use pgscope::db::{DiagnosticConnection, ServerVersion, Value};
use pgscope::error::Error;
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

#[tokio::test]
async fn test_server_version() {
    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let version = inspector.server_version().await.unwrap();
    assert!(version >= ServerVersion(9, 0, 0));

    inspector.close().await.unwrap();
}

#[tokio::test]
async fn test_settings_unfiltered() {
    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let rows = inspector.settings(None).await.unwrap();
    assert!(!rows.is_empty());
    assert!(rows
        .iter()
        .any(|r| r.get("name") == Some(&Value::from("application_name"))));

    inspector.close().await.unwrap();
}

#[tokio::test]
async fn test_settings_filtered_by_name() {
    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let names = vec!["application_name".to_string(), "search_path".to_string()];
    let rows = inspector.settings(Some(&names)).await.unwrap();

    let mut found: Vec<&str> = rows
        .iter()
        .filter_map(|r| r.get("name").and_then(Value::as_str))
        .collect();
    found.sort_unstable();
    assert_eq!(found, ["application_name", "search_path"]);

    inspector.close().await.unwrap();
}

#[tokio::test]
async fn test_activity_self_filtering() {
    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let pid = inspector.backend_pid();
    let own_pid = Value::Int(pid as i64);

    let rows = inspector.activity(&ActivityFilter::default()).await.unwrap();
    assert!(rows.iter().all(|r| r.get("backend_pid") != Some(&own_pid)));

    let filter = ActivityFilter {
        include_self: true,
        pids: Some(vec![pid]),
        ..Default::default()
    };
    let rows = inspector.activity(&filter).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("backend_pid"), Some(&own_pid));

    inspector.close().await.unwrap();
}

#[tokio::test]
async fn test_activity_unrecognized_state_matches_nothing() {
    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let filter = ActivityFilter {
        include_self: true,
        states: Some(vec!["COMPLETELY INVALID STATE HERE!".to_string()]),
        ..Default::default()
    };
    let rows = inspector.activity(&filter).await.unwrap();
    assert!(rows.is_empty());

    inspector.close().await.unwrap();
}

#[tokio::test]
async fn test_lock_info() {
    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    // An idle test server has no lock waits; the query just has to run.
    inspector.lock_info(None).await.unwrap();
    let rows = inspector.lock_info(Some(1)).await.unwrap();
    assert!(rows.len() <= 1);

    inspector.close().await.unwrap();
}

#[tokio::test]
async fn test_statement_stats_degrades_without_extension() {
    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let status = inspector.validate_pg_stat_statements().await.unwrap();
    let rows = inspector.statement_stats().await.unwrap();

    if status.present {
        assert!(rows.len() <= 500);
        assert!(rows.iter().all(|r| r.contains_key("calls")));
    } else {
        assert_eq!(rows.len(), 1);
        let message = rows[0].get("Result").and_then(Value::as_str).unwrap();
        assert!(message.contains("pg_stat_statements"));
    }

    inspector.close().await.unwrap();
}

#[tokio::test]
async fn test_validate_missing_extension() {
    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let status = inspector
        .validate_extension("no_such_extension_anywhere")
        .await
        .unwrap();
    assert!(!status.present);
    assert!(status.version.is_none());

    inspector.close().await.unwrap();
}

#[tokio::test]
async fn test_explain_read_only_statement() {
    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let rows = inspector.explain("select 1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("query_text"), Some(&Value::from("select 1")));
    let plan = rows[0].get("query_plan").and_then(Value::as_str).unwrap();
    assert!(plan.contains("Result"));

    inspector.close().await.unwrap();
}

#[tokio::test]
async fn test_explain_refuses_mutating_statements() {
    let Some(mut inspector) = get_test_inspector().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let refused = [
        "insert into t values (1)",
        "update t set x = 1",
        "delete from t",
        "drop table t",
        "create table t (x int)",
        "alter table t add column y int",
        "truncate t",
        "grant select on t to someone",
        "vacuum t",
    ];
    for statement in refused {
        let err = inspector.explain(statement).await.unwrap_err();
        assert!(
            matches!(err, Error::NotPermitted(_)),
            "expected refusal for {statement:?}, got {err:?}"
        );
    }

    // The connection stays usable after refusals.
    inspector.server_version().await.unwrap();
    inspector.close().await.unwrap();
}
