//! Statement classification and execution.
//!
//! Requests without parameters run as raw SQL, which lets callers send a
//! `;`-separated script. Requests with parameters are limited to a single
//! statement, rewritten to numbered placeholders and bound through sqlx.

use crate::db::params::{ScannedSql, bind_parameters, bind_sqlite_param, scan_sql};
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{QueryParams, Row, StatementOutcome};
use schemars::JsonSchema;
use serde::Serialize;
use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use sqlx::sqlite::{SqliteConnection, SqliteQueryResult, SqliteRow};
use sqlx::{Column, Executor, Row as _};
use tracing::debug;

/// What a request does, judged by its final statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Produces a result set.
    Query,
    /// INSERT or REPLACE; reports the new rowid.
    Insert,
    /// Any other mutation, DDL or transaction control.
    Change,
}

impl StatementKind {
    pub fn returns_rows(&self) -> bool {
        matches!(self, Self::Query)
    }
}

/// Classify a request.
///
/// sqlparser handles the common grammar; statements it cannot parse
/// (SQLite extensions such as `VACUUM INTO` or `STRICT` tables) fall back
/// to their leading keyword.
pub fn classify(sql: &str, scanned: &ScannedSql) -> StatementKind {
    let Some(last) = scanned.statements.last() else {
        return StatementKind::Change;
    };
    if last.has_returning {
        return StatementKind::Query;
    }

    match Parser::parse_sql(&SQLiteDialect {}, &sql[last.span.clone()]) {
        Ok(statements) => statements
            .last()
            .map_or(StatementKind::Change, classify_statement),
        Err(_) => classify_keyword(&last.leading_keyword),
    }
}

fn classify_statement(statement: &Statement) -> StatementKind {
    match statement {
        // `WITH ... INSERT/UPDATE/DELETE` parses as a query wrapping the mutation.
        Statement::Query(query) => match query.body.as_ref() {
            SetExpr::Insert(inner) | SetExpr::Update(inner) | SetExpr::Delete(inner) => {
                classify_statement(inner)
            }
            _ => StatementKind::Query,
        },
        Statement::Explain { .. } | Statement::ExplainTable { .. } | Statement::Pragma { .. } => {
            StatementKind::Query
        }
        Statement::Insert(_) => StatementKind::Insert,
        _ => StatementKind::Change,
    }
}

fn classify_keyword(keyword: &str) -> StatementKind {
    match keyword {
        "SELECT" | "WITH" | "VALUES" | "PRAGMA" | "EXPLAIN" => StatementKind::Query,
        "INSERT" | "REPLACE" => StatementKind::Insert,
        _ => StatementKind::Change,
    }
}

/// One step of an `EXPLAIN QUERY PLAN` result.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct PlanStep {
    pub id: i64,
    pub parent: i64,
    pub detail: String,
}

/// Executes SQL requests against an open connection.
pub struct QueryExecutor;

impl QueryExecutor {
    /// Run a request, returning rows or change counts.
    pub async fn execute(
        conn: &mut SqliteConnection,
        sql: &str,
        params: Option<QueryParams>,
    ) -> DbResult<StatementOutcome> {
        let scanned = scan_sql(sql)?;
        let Some(last) = scanned.statements.last() else {
            return Err(DbError::invalid_input("SQL statement is required"));
        };
        let kind = classify(sql, &scanned);
        // An empty list or object binds nothing.
        let params = params.filter(|p| !p.is_empty());
        debug!(
            kind = ?kind,
            statements = scanned.statement_count(),
            placeholders = scanned.parameter_count(),
            "Executing SQL"
        );

        match params {
            None => {
                let expected = scanned.parameter_count();
                if expected > 0 {
                    return Err(DbError::parameter_mismatch(format!(
                        "Statement has {} placeholder(s) but no parameters were supplied",
                        expected
                    )));
                }
                if kind.returns_rows() {
                    // Only the final statement's result set is returned.
                    if scanned.statement_count() > 1 {
                        (&mut *conn).execute(&sql[..last.span.start]).await?;
                    }
                    let final_sql = &sql[last.span.clone()];
                    let rows = (&mut *conn).fetch_all(final_sql).await?;
                    Ok(Self::rows_outcome(conn, final_sql, rows).await)
                } else {
                    let result = (&mut *conn).execute(sql).await?;
                    Ok(Self::changes_outcome(kind, &result))
                }
            }
            Some(params) => {
                if scanned.statement_count() > 1 {
                    return Err(DbError::invalid_input(
                        "Parameters can only be bound to a single statement",
                    ));
                }
                let bound = bind_parameters(sql, &scanned, params)?;
                let mut query = sqlx::query(&bound.sql);
                for value in &bound.values {
                    query = bind_sqlite_param(query, value);
                }
                if kind.returns_rows() {
                    let rows = query.fetch_all(&mut *conn).await?;
                    Ok(Self::rows_outcome(conn, &bound.sql, rows).await)
                } else {
                    let result = query.execute(&mut *conn).await?;
                    Ok(Self::changes_outcome(kind, &result))
                }
            }
        }
    }

    async fn rows_outcome(
        conn: &mut SqliteConnection,
        sql: &str,
        rows: Vec<SqliteRow>,
    ) -> StatementOutcome {
        let columns = match rows.first() {
            Some(first) => first.column_names(),
            // No rows to read names from; ask the engine to describe the statement.
            None => match (&mut *conn).describe(sql).await {
                Ok(described) => described
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
                Err(_) => Vec::new(),
            },
        };
        let rows: Vec<Row> = rows.iter().map(RowToJson::to_json_map).collect();
        StatementOutcome::Rows { columns, rows }
    }

    fn changes_outcome(kind: StatementKind, result: &SqliteQueryResult) -> StatementOutcome {
        let rows_affected = result.rows_affected();
        let last_insert_rowid = (kind == StatementKind::Insert && rows_affected > 0)
            .then(|| result.last_insert_rowid());
        StatementOutcome::Changes {
            rows_affected,
            last_insert_rowid,
        }
    }

    /// Validate that `sql` is exactly one statement and return its text.
    fn single_statement(sql: &str) -> DbResult<&str> {
        let scanned = scan_sql(sql)?;
        match scanned.statements.as_slice() {
            [] => Err(DbError::invalid_input("SQL statement is required")),
            [stmt] if stmt.leading_keyword == "EXPLAIN" => Err(DbError::invalid_input(
                "Pass the statement itself; EXPLAIN is added automatically",
            )),
            [stmt] => Ok(sql[stmt.span.clone()].trim()),
            _ => Err(DbError::invalid_input(
                "Query plans can only be produced for a single statement",
            )),
        }
    }

    /// Run `EXPLAIN QUERY PLAN` for one statement without executing it.
    ///
    /// Placeholders may be left unbound.
    pub async fn query_plan(conn: &mut SqliteConnection, sql: &str) -> DbResult<Vec<PlanStep>> {
        let statement = Self::single_statement(sql)?;
        let explain_sql = format!("EXPLAIN QUERY PLAN {}", statement);
        let rows = (&mut *conn).fetch_all(explain_sql.as_str()).await?;
        rows.iter()
            .map(|row| -> DbResult<PlanStep> {
                Ok(PlanStep {
                    id: row.try_get("id")?,
                    parent: row.try_get("parent")?,
                    detail: row.try_get("detail")?,
                })
            })
            .collect()
    }

    /// Run `EXPLAIN` for one statement, returning the VDBE program listing.
    pub async fn bytecode(conn: &mut SqliteConnection, sql: &str) -> DbResult<Vec<Row>> {
        let statement = Self::single_statement(sql)?;
        let explain_sql = format!("EXPLAIN {}", statement);
        let rows = (&mut *conn).fetch_all(explain_sql.as_str()).await?;
        Ok(rows.iter().map(RowToJson::to_json_map).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(sql: &str) -> StatementKind {
        classify(sql, &scan_sql(sql).unwrap())
    }

    #[test]
    fn test_classify_queries() {
        assert_eq!(kind("SELECT 1"), StatementKind::Query);
        assert_eq!(kind("  with x as (select 1) select * from x"), StatementKind::Query);
        assert_eq!(kind("PRAGMA table_info(users)"), StatementKind::Query);
        assert_eq!(kind("VALUES (1), (2)"), StatementKind::Query);
    }

    #[test]
    fn test_classify_mutations() {
        assert_eq!(kind("INSERT INTO t VALUES (1)"), StatementKind::Insert);
        assert_eq!(kind("REPLACE INTO t VALUES (1)"), StatementKind::Insert);
        assert_eq!(kind("UPDATE t SET a = 1"), StatementKind::Change);
        assert_eq!(kind("DELETE FROM t"), StatementKind::Change);
        assert_eq!(kind("CREATE TABLE t (a TEXT) STRICT"), StatementKind::Change);
        assert_eq!(kind("VACUUM INTO '/tmp/copy.db'"), StatementKind::Change);
    }

    #[test]
    fn test_classify_cte_wrapped_mutations() {
        assert_eq!(
            kind("WITH x(n) AS (SELECT 'Zed') INSERT INTO customers(name) SELECT n FROM x"),
            StatementKind::Insert
        );
        assert_eq!(
            kind("WITH old AS (SELECT id FROM t) DELETE FROM t WHERE id IN (SELECT id FROM old)"),
            StatementKind::Change
        );
        assert_eq!(
            kind("WITH v AS (SELECT 1) UPDATE t SET a = (SELECT * FROM v)"),
            StatementKind::Change
        );
    }

    #[test]
    fn test_classify_returning_is_query() {
        assert_eq!(
            kind("INSERT INTO t (a) VALUES (1) RETURNING id"),
            StatementKind::Query
        );
    }

    #[test]
    fn test_classify_script_uses_last_statement() {
        assert_eq!(
            kind("CREATE TABLE t (a); INSERT INTO t VALUES (1); SELECT * FROM t"),
            StatementKind::Query
        );
        assert_eq!(
            kind("SELECT 1; DELETE FROM t"),
            StatementKind::Change
        );
    }

    #[test]
    fn test_single_statement_rules() {
        assert_eq!(
            QueryExecutor::single_statement("SELECT 1;").unwrap(),
            "SELECT 1"
        );
        assert!(QueryExecutor::single_statement("SELECT 1; DROP TABLE t").is_err());
        assert!(QueryExecutor::single_statement("EXPLAIN SELECT 1").is_err());
        assert!(QueryExecutor::single_statement("-- nothing").is_err());
    }
}
