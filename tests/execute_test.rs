//! Integration tests for the execute_sql tool.

mod common;

use common::{Fixture, named, positional};
use serde_json::json;
use sqlite_mcp_server::DbError;
use sqlite_mcp_server::models::QueryParams;
use sqlite_mcp_server::tools::ExecuteSqlInput;
use sqlite_mcp_server::tools::format::OutputFormat;
use tokio_test::{assert_err, assert_ok};

fn input(db_path: &str, sql: &str, parameters: Option<QueryParams>) -> ExecuteSqlInput {
    ExecuteSqlInput {
        db_path: db_path.to_string(),
        sql_query: sql.to_string(),
        parameters,
        format: OutputFormat::Json,
    }
}

#[tokio::test]
async fn test_select_returns_rows_in_column_order() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let output = fx
        .exec(&db, "SELECT name, id FROM customers ORDER BY id", None)
        .await;
    assert_eq!(output.columns, vec!["name", "id"]);
    assert_eq!(output.row_count, Some(3));
    let keys: Vec<&String> = output.rows[0].keys().collect();
    assert_eq!(keys, vec!["name", "id"]);
    assert_eq!(output.rows[0]["name"], "Ada");
    assert_eq!(output.rows[2]["name"], "O'Brien");
    assert!(output.rows_affected.is_none());
}

#[tokio::test]
async fn test_empty_result_still_reports_columns() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let output = fx
        .exec(&db, "SELECT id, email FROM customers WHERE id < 0", None)
        .await;
    assert!(output.rows.is_empty());
    assert_eq!(output.row_count, Some(0));
    assert_eq!(output.columns, vec!["id", "email"]);
}

#[tokio::test]
async fn test_positional_parameters_store_quotes_verbatim() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let insert = fx
        .exec(
            &db,
            "INSERT INTO customers (name, email) VALUES (?, ?)",
            positional(vec![json!("D'Arcy; DROP TABLE customers; --"), json!(null)]),
        )
        .await;
    assert_eq!(insert.rows_affected, Some(1));
    assert_eq!(insert.last_insert_rowid, Some(4));

    let found = fx
        .exec(
            &db,
            "SELECT name, email FROM customers WHERE id = ?1",
            positional(vec![json!(4)]),
        )
        .await;
    assert_eq!(found.rows[0]["name"], "D'Arcy; DROP TABLE customers; --");
    assert!(found.rows[0]["email"].is_null());

    let tables = fx.rows(&db, "SELECT count(*) AS n FROM customers").await;
    assert_eq!(tables[0]["n"], 4);
}

#[tokio::test]
async fn test_named_parameters_with_and_without_prefix() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let output = fx
        .exec(
            &db,
            "SELECT id FROM customers WHERE name = :name OR email = @email",
            named(json!({ ":name": "O'Brien", "email": "ada@example.com" })),
        )
        .await;
    let mut ids: Vec<i64> = output
        .rows
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec![1, 3]);
}

#[tokio::test]
async fn test_repeated_named_parameter_binds_once() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let output = fx
        .exec(
            &db,
            "SELECT :v AS a, :v || '!' AS b",
            named(json!({ "v": "Zoë 🦀" })),
        )
        .await;
    assert_eq!(output.rows[0]["a"], "Zoë 🦀");
    assert_eq!(output.rows[0]["b"], "Zoë 🦀!");
}

#[tokio::test]
async fn test_value_types_round_trip() {
    let fx = Fixture::new();
    let db = fx.create_db("types.db").await;
    fx.exec(&db, "CREATE TABLE v (i INTEGER, r REAL, t TEXT, b BLOB, n)", None)
        .await;
    fx.exec(
        &db,
        "INSERT INTO v VALUES (?, ?, ?, x'00ff', ?)",
        positional(vec![json!(9007199254740993i64), json!(2.5), json!(""), json!(null)]),
    )
    .await;

    let rows = fx.rows(&db, "SELECT * FROM v").await;
    let row = &rows[0];
    assert_eq!(row["i"], json!(9007199254740993i64));
    assert_eq!(row["r"], json!(2.5));
    assert_eq!(row["t"], json!(""));
    assert!(row["n"].is_null());
    // Blobs come back base64-encoded.
    assert_eq!(row["b"], json!("AP8="));
}

#[tokio::test]
async fn test_placeholders_without_parameters_is_mismatch() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let err = fx
        .executor()
        .execute_sql(input(&db, "SELECT * FROM customers WHERE id = ?", None))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::ParameterMismatch { .. }));
    assert_eq!(err.kind(), "parameter_mismatch");
}

#[tokio::test]
async fn test_parameter_count_mismatch() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let too_many = fx
        .executor()
        .execute_sql(input(
            &db,
            "SELECT * FROM customers WHERE id = ?",
            positional(vec![json!(1), json!(2)]),
        ))
        .await;
    assert!(matches!(assert_err!(too_many), DbError::ParameterMismatch { .. }));

    let missing_name = fx
        .executor()
        .execute_sql(input(
            &db,
            "SELECT * FROM customers WHERE id = :id",
            named(json!({ "other": 1 })),
        ))
        .await;
    assert!(matches!(assert_err!(missing_name), DbError::ParameterMismatch { .. }));
}

#[tokio::test]
async fn test_parameters_reject_multiple_statements() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let err = fx
        .executor()
        .execute_sql(input(
            &db,
            "UPDATE customers SET tier = ?; DELETE FROM orders",
            positional(vec![json!("gold")]),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));

    let count = fx.rows(&db, "SELECT count(*) AS n FROM orders").await;
    assert_eq!(count[0]["n"], 3);
}

#[tokio::test]
async fn test_update_and_delete_report_rows_affected() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let update = fx
        .exec(&db, "UPDATE customers SET tier = 'silver' WHERE tier IS NOT 'gold'", None)
        .await;
    assert_eq!(update.rows_affected, Some(2));
    assert!(update.last_insert_rowid.is_none());
    assert!(update.message.unwrap().starts_with("Query OK, 2 rows affected"));

    let delete = fx.exec(&db, "DELETE FROM orders WHERE total < 100", None).await;
    assert_eq!(delete.rows_affected, Some(1));
}

#[tokio::test]
async fn test_foreign_key_cascade_is_enforced() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    fx.exec(&db, "DELETE FROM customers WHERE id = 1", None).await;
    let remaining = fx.rows(&db, "SELECT count(*) AS n FROM orders").await;
    assert_eq!(remaining[0]["n"], 1);
}

#[tokio::test]
async fn test_returning_clause_yields_rows() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let output = fx
        .exec(
            &db,
            "INSERT INTO orders (customer_id, total) VALUES (?, ?) RETURNING id, total",
            positional(vec![json!(2), json!(42.0)]),
        )
        .await;
    assert_eq!(output.columns, vec!["id", "total"]);
    assert_eq!(output.row_count, Some(1));
    assert_eq!(output.rows[0]["id"], 4);

    let stored = fx.rows(&db, "SELECT count(*) AS n FROM orders").await;
    assert_eq!(stored[0]["n"], 4);
}

#[tokio::test]
async fn test_script_runs_every_statement() {
    let fx = Fixture::new();
    let db = fx.create_db("script.db").await;

    let output = fx
        .exec(
            &db,
            "CREATE TABLE t (a TEXT); INSERT INTO t VALUES ('x;y'); INSERT INTO t VALUES ('z'); \
             SELECT a FROM t ORDER BY a",
            None,
        )
        .await;
    assert_eq!(output.row_count, Some(2));
    assert_eq!(output.rows[0]["a"], "x;y");
}

#[tokio::test]
async fn test_script_returns_only_last_result_set() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let output = fx
        .exec(
            &db,
            "SELECT id FROM customers; SELECT name FROM customers ORDER BY id",
            None,
        )
        .await;
    assert_eq!(output.columns, vec!["name"]);
    assert_eq!(output.row_count, Some(3));
    assert!(output.rows.iter().all(|r| !r.contains_key("id")));
    assert_eq!(output.rows[0]["name"], "Ada");

    let empty = fx
        .exec(
            &db,
            "UPDATE customers SET tier = 'gold' WHERE id = 1; SELECT id, tier FROM customers WHERE id < 0",
            None,
        )
        .await;
    assert_eq!(empty.columns, vec!["id", "tier"]);
    assert_eq!(empty.row_count, Some(0));
    let tier = fx.rows(&db, "SELECT tier FROM customers WHERE id = 1").await;
    assert_eq!(tier[0]["tier"], "gold");
}

#[tokio::test]
async fn test_empty_parameter_list_allows_script() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let output = assert_ok!(
        fx.executor()
            .execute_sql(input(&db, "SELECT 1 AS a; SELECT 2 AS b", positional(vec![])))
            .await
    );
    assert_eq!(output.columns, vec!["b"]);
    assert_eq!(output.rows[0]["b"], 2);
}

#[tokio::test]
async fn test_cte_insert_reports_changes() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let output = fx
        .exec(
            &db,
            "WITH x(n) AS (SELECT 'Zed') INSERT INTO customers (name) SELECT n FROM x",
            None,
        )
        .await;
    assert_eq!(output.rows_affected, Some(1));
    assert_eq!(output.last_insert_rowid, Some(4));
    assert!(output.row_count.is_none());

    let updated = fx
        .exec(
            &db,
            "WITH t(v) AS (SELECT 'gold') UPDATE customers SET tier = (SELECT v FROM t)",
            None,
        )
        .await;
    assert_eq!(updated.rows_affected, Some(4));
    assert!(updated.last_insert_rowid.is_none());
}

#[tokio::test]
async fn test_positional_values_cannot_fill_named_placeholders() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let result = fx
        .executor()
        .execute_sql(input(
            &db,
            "SELECT name FROM customers WHERE id = :id",
            positional(vec![json!(1)]),
        ))
        .await;
    let err = assert_err!(result);
    assert!(matches!(err, DbError::ParameterMismatch { .. }));
    assert_eq!(err.kind(), "parameter_mismatch");
}

#[tokio::test]
async fn test_syntax_error_kind() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let err = fx
        .executor()
        .execute_sql(input(&db, "SELEC * FROM customers", None))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Syntax { .. }));
    assert!(err.suggestion().is_some());
}

#[tokio::test]
async fn test_missing_table_in_query() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let err = fx
        .executor()
        .execute_sql(input(&db, "SELECT * FROM invoices", None))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::TableNotFound { ref table } if table == "invoices"));
}

#[tokio::test]
async fn test_constraint_violation_is_execution_error() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let err = fx
        .executor()
        .execute_sql(input(
            &db,
            "INSERT INTO customers (name, email) VALUES ('Dup', 'ada@example.com')",
            None,
        ))
        .await
        .unwrap_err();
    match err {
        DbError::Execution { message, code } => {
            assert!(message.contains("UNIQUE"));
            assert_eq!(code.as_deref(), Some("2067"));
        }
        other => panic!("expected execution error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_execute_on_missing_database_is_not_found() {
    let fx = Fixture::new();

    let err = fx
        .executor()
        .execute_sql(input(&fx.path("nope.db"), "SELECT 1", None))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
    assert!(!fx.path_buf("nope.db").exists());
}

#[tokio::test]
async fn test_empty_sql_is_invalid_input() {
    let fx = Fixture::new();
    let db = fx.create_db("empty.db").await;

    let err = fx
        .executor()
        .execute_sql(input(&db, "  -- only a comment\n", None))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_table_format() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let output = assert_ok!(
        fx.executor()
            .execute_sql(ExecuteSqlInput {
                format: OutputFormat::Table,
                ..input(&db, "SELECT id, name FROM customers WHERE id = 3", None)
            })
            .await
    );
    assert!(output.rows.is_empty());
    assert_eq!(output.row_count, Some(1));
    let formatted = output.formatted.unwrap();
    assert!(formatted.contains("| id |  name   |"));
    assert!(formatted.contains("|  3 | O'Brien |"));
    assert!(formatted.contains("1 row in set"));
}

#[tokio::test]
async fn test_markdown_format() {
    let fx = Fixture::new();
    let db = fx.shop_db("shop.db").await;

    let output = assert_ok!(
        fx.executor()
            .execute_sql(ExecuteSqlInput {
                format: OutputFormat::Markdown,
                ..input(&db, "SELECT note FROM orders WHERE id = 1", None)
            })
            .await
    );
    let formatted = output.formatted.unwrap();
    assert!(formatted.starts_with("| note |\n|---|\n"));
    assert!(formatted.contains("| first, with comma |"));
}
