//! End-to-end migration runs against PostgreSQL.
//!
//! Requires a running PostgreSQL instance. Set CAUSEWAY_TEST_URL, e.g.:
//!   CAUSEWAY_TEST_URL="host=localhost user=postgres dbname=causeway_test"
//!
//! Tests are skipped when the variable is not set.

use std::path::Path;

use tokio_postgres::NoTls;

use causeway_core::config::{CausewayConfig, DatabaseType};
use causeway_core::error::CausewayError;
use causeway_core::Causeway;

fn test_url() -> Option<String> {
    std::env::var("CAUSEWAY_TEST_URL").ok()
}

async fn connect(url: &str) -> tokio_postgres::Client {
    let (client, connection) = tokio_postgres::connect(url, NoTls).await.unwrap();
    tokio::spawn(async move {
        let _ = connection.await;
    });
    client
}

fn test_config(url: &str, root: &Path, schema: &str) -> CausewayConfig {
    CausewayConfig {
        connection_string: url.to_string(),
        database_type: DatabaseType::Postgres,
        sql_files_directory: root.to_path_buf(),
        schema_name: schema.to_string(),
        version: "1.0.0".to_string(),
        create_database: false,
        ..Default::default()
    }
}

fn write_script(root: &Path, folder: &str, name: &str, sql: &str) {
    let dir = root.join(folder);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), sql).unwrap();
}

async fn reset(client: &tokio_postgres::Client, schema: &str, tables: &[&str]) {
    client
        .batch_execute(&format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", schema))
        .await
        .unwrap();
    for table in tables {
        client
            .batch_execute(&format!("DROP TABLE IF EXISTS \"{}\"", table))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn applies_scripts_and_records_bookkeeping() {
    let Some(url) = test_url() else {
        eprintln!("CAUSEWAY_TEST_URL not set, skipping");
        return;
    };
    let schema = "causeway_it_apply";
    let client = connect(&url).await;
    reset(&client, schema, &["cw_it_widgets"]).await;

    let tmp = tempfile::tempdir().unwrap();
    write_script(
        tmp.path(),
        "up",
        "1_create.sql",
        "CREATE TABLE cw_it_widgets (id INTEGER); INSERT INTO cw_it_widgets VALUES (1);",
    );

    let report = Causeway::new(test_config(&url, tmp.path(), schema))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.applied, 1);

    let row = client
        .query_one(
            &format!("SELECT COUNT(*)::BIGINT FROM \"{}\".scripts_run", schema),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(row.get::<_, i64>(0), 1);

    // Unchanged second run applies nothing new.
    let second = Causeway::new(test_config(&url, tmp.path(), schema))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(second.applied, 0);
    assert_eq!(second.skipped, 1);

    reset(&client, schema, &["cw_it_widgets"]).await;
}

#[tokio::test]
async fn transactional_failure_rolls_back_and_records_the_error() {
    let Some(url) = test_url() else {
        eprintln!("CAUSEWAY_TEST_URL not set, skipping");
        return;
    };
    let schema = "causeway_it_fail";
    let client = connect(&url).await;
    reset(&client, schema, &["cw_it_rollback"]).await;

    let tmp = tempfile::tempdir().unwrap();
    write_script(
        tmp.path(),
        "up",
        "1_ok.sql",
        "CREATE TABLE cw_it_rollback (id INTEGER);",
    );
    write_script(tmp.path(), "up", "2_bad.sql", "SELECT TOP");

    let config = CausewayConfig {
        transaction: true,
        ..test_config(&url, tmp.path(), schema)
    };
    let err = Causeway::new(config).unwrap().run().await.unwrap_err();
    assert!(matches!(err, CausewayError::ScriptFailed { .. }));

    // The valid script's table and success record rolled back; the error
    // record was committed through its own scope and survives.
    let exists = client
        .query_one(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = 'cw_it_rollback')",
            &[],
        )
        .await
        .unwrap();
    assert!(!exists.get::<_, bool>(0));

    let runs = client
        .query_one(
            &format!("SELECT COUNT(*)::BIGINT FROM \"{}\".scripts_run", schema),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(runs.get::<_, i64>(0), 0);

    let errors = client
        .query(
            &format!(
                "SELECT script_name FROM \"{}\".scripts_run_errors",
                schema
            ),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].get::<_, String>(0), "2_bad.sql");

    reset(&client, schema, &["cw_it_rollback"]).await;
}
