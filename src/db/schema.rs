//! Schema introspection module.
//!
//! Catalog queries run against `sqlite_master` and the table-valued pragma
//! functions (`pragma_table_info`, `pragma_index_list`, ...), so object
//! names are always bound as parameters. SQL text lives in the `queries`
//! submodule.

use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{
    CatalogCounts, ColumnDefinition, ForeignKey, IndexInfo, Row, TableSchema, TableSummary,
    TriggerEvent, TriggerInfo, TriggerTiming, ViewInfo,
};
use sqlx::Row as _;
use sqlx::sqlite::SqliteConnection;
use tracing::debug;

/// Number of rows included in table descriptions.
pub const SAMPLE_ROW_COUNT: i64 = 5;

/// Quote an identifier for interpolation into SQL text.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

mod queries {
    pub const LIST_TABLES: &str = r#"
        SELECT name FROM sqlite_master
        WHERE type = 'table'
        AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
        ORDER BY name
        "#;

    pub const TABLE_NAME: &str = r#"
        SELECT name FROM sqlite_master
        WHERE type = 'table' AND name = ?1 COLLATE NOCASE
        "#;

    pub const RELATION_NAME: &str = r#"
        SELECT name FROM sqlite_master
        WHERE type IN ('table', 'view') AND name = ?1 COLLATE NOCASE
        "#;

    pub const TABLE_COLUMNS: &str = r#"
        SELECT cid, name, type, "notnull", dflt_value, pk
        FROM pragma_table_info(?1)
        ORDER BY cid
        "#;

    pub const INDEXES: &str = r#"
        SELECT m.name AS table_name,
               il.name AS index_name,
               il."unique" AS is_unique,
               il.origin AS origin,
               il.partial AS partial,
               s.sql AS sql
        FROM sqlite_master AS m
        JOIN pragma_index_list(m.name) AS il
        LEFT JOIN sqlite_master AS s ON s.type = 'index' AND s.name = il.name
        WHERE m.type = 'table'
        AND m.name NOT LIKE 'sqlite\_%' ESCAPE '\'
        AND (?1 IS NULL OR m.name = ?1 COLLATE NOCASE)
        ORDER BY m.name, il.name
        "#;

    pub const INDEX_COLUMNS: &str = r#"
        SELECT name FROM pragma_index_info(?1) ORDER BY seqno
        "#;

    pub const FOREIGN_KEYS: &str = r#"
        SELECT id, "table" AS ref_table, "from" AS from_col, "to" AS to_col,
               on_update, on_delete
        FROM pragma_foreign_key_list(?1)
        ORDER BY id, seq
        "#;

    pub const TRIGGERS: &str = r#"
        SELECT name, tbl_name, sql FROM sqlite_master
        WHERE type = 'trigger'
        AND (?1 IS NULL OR tbl_name = ?1 COLLATE NOCASE)
        ORDER BY name
        "#;

    pub const VIEWS: &str = r#"
        SELECT name, sql FROM sqlite_master
        WHERE type = 'view'
        ORDER BY name
        "#;

    pub const VIEW_COLUMNS: &str = r#"
        SELECT name FROM pragma_table_info(?1) ORDER BY cid
        "#;

    pub const CATALOG_COUNTS: &str = r#"
        SELECT
            COALESCE(SUM(type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'), 0) AS tables,
            COALESCE(SUM(type = 'view'), 0) AS views,
            COALESCE(SUM(type = 'index'), 0) AS indexes,
            COALESCE(SUM(type = 'trigger'), 0) AS triggers
        FROM sqlite_master
        "#;
}

/// Schema inspector for SQLite catalog introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// List user tables, ordered by name.
    pub async fn list_tables(conn: &mut SqliteConnection) -> DbResult<Vec<String>> {
        let rows = sqlx::query(queries::LIST_TABLES).fetch_all(&mut *conn).await?;
        let tables = rows
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = tables.len(), "Listed SQLite tables");
        Ok(tables)
    }

    /// Resolve a table name as stored in the catalog, or fail with `TableNotFound`.
    pub async fn require_table(conn: &mut SqliteConnection, table: &str) -> DbResult<String> {
        let table = table.trim();
        if table.is_empty() {
            return Err(DbError::invalid_input("table_name is required"));
        }
        let found: Option<String> = sqlx::query_scalar(queries::TABLE_NAME)
            .bind(table)
            .fetch_optional(&mut *conn)
            .await?;
        found.ok_or_else(|| DbError::table_not_found(table))
    }

    /// Resolve a table or view name, or fail with `TableNotFound`.
    pub async fn require_relation(conn: &mut SqliteConnection, name: &str) -> DbResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DbError::invalid_input("table_name is required"));
        }
        let found: Option<String> = sqlx::query_scalar(queries::RELATION_NAME)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
        found.ok_or_else(|| DbError::table_not_found(name))
    }

    /// Columns of a table in declaration order.
    pub async fn list_columns(
        conn: &mut SqliteConnection,
        table: &str,
    ) -> DbResult<Vec<ColumnDefinition>> {
        let table = Self::require_table(conn, table).await?;
        Self::fetch_columns(conn, &table).await
    }

    async fn fetch_columns(
        conn: &mut SqliteConnection,
        table: &str,
    ) -> DbResult<Vec<ColumnDefinition>> {
        let rows = sqlx::query(queries::TABLE_COLUMNS)
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let cid: i64 = row.try_get("cid")?;
            let name: String = row.try_get("name")?;
            let data_type: Option<String> = row.try_get("type")?;
            let not_null: i64 = row.try_get("notnull")?;
            let default: Option<String> = row.try_get("dflt_value")?;
            let pk: i64 = row.try_get("pk")?;

            let mut column = ColumnDefinition::new(cid, name, data_type.unwrap_or_default())
                .with_default(default)
                .with_primary_key(pk);
            if not_null != 0 {
                column = column.not_null();
            }
            columns.push(column);
        }
        Ok(columns)
    }

    /// Row count of a table.
    pub async fn row_count(conn: &mut SqliteConnection, table: &str) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&mut *conn).await?;
        Ok(count)
    }

    /// Indexes of one table, or of every table when `table` is `None`.
    pub async fn list_indexes(
        conn: &mut SqliteConnection,
        table: Option<&str>,
    ) -> DbResult<Vec<IndexInfo>> {
        let table = match table {
            Some(t) => Some(Self::require_table(conn, t).await?),
            None => None,
        };

        let rows = sqlx::query(queries::INDEXES)
            .bind(table.as_deref())
            .fetch_all(&mut *conn)
            .await?;

        let mut indexes = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("index_name")?;
            let is_unique: i64 = row.try_get("is_unique")?;
            let partial: i64 = row.try_get("partial")?;
            indexes.push(IndexInfo {
                table: row.try_get("table_name")?,
                is_unique: is_unique != 0,
                origin: row.try_get("origin")?,
                is_partial: partial != 0,
                columns: Vec::new(),
                sql: row.try_get("sql")?,
                name,
            });
        }
        for index in &mut indexes {
            index.columns = Self::index_columns(conn, &index.name).await?;
        }

        debug!(count = indexes.len(), "Listed SQLite indexes");
        Ok(indexes)
    }

    async fn index_columns(conn: &mut SqliteConnection, index: &str) -> DbResult<Vec<String>> {
        let names: Vec<Option<String>> = sqlx::query_scalar(queries::INDEX_COLUMNS)
            .bind(index)
            .fetch_all(&mut *conn)
            .await?;
        Ok(names
            .into_iter()
            .map(|n| n.unwrap_or_else(|| "<expr>".to_string()))
            .collect())
    }

    /// Foreign keys declared on a table, one entry per constraint.
    pub async fn foreign_keys(
        conn: &mut SqliteConnection,
        table: &str,
    ) -> DbResult<Vec<ForeignKey>> {
        let rows = sqlx::query(queries::FOREIGN_KEYS)
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

        let mut keys: Vec<(i64, ForeignKey)> = Vec::new();
        for row in &rows {
            let id: i64 = row.try_get("id")?;
            let from: String = row.try_get("from_col")?;
            let to: Option<String> = row.try_get("to_col")?;

            // Composite keys span several rows sharing one id.
            if let Some((_, fk)) = keys.last_mut().filter(|(last_id, _)| *last_id == id) {
                fk.columns.push(from);
                fk.referenced_columns.extend(to);
                continue;
            }
            keys.push((
                id,
                ForeignKey {
                    columns: vec![from],
                    referenced_table: row.try_get("ref_table")?,
                    referenced_columns: to.into_iter().collect(),
                    on_update: row.try_get("on_update")?,
                    on_delete: row.try_get("on_delete")?,
                },
            ));
        }
        Ok(keys.into_iter().map(|(_, fk)| fk).collect())
    }

    /// Triggers, optionally restricted to one table or view.
    pub async fn list_triggers(
        conn: &mut SqliteConnection,
        table: Option<&str>,
    ) -> DbResult<Vec<TriggerInfo>> {
        let table = match table {
            Some(t) => Some(Self::require_relation(conn, t).await?),
            None => None,
        };

        let rows = sqlx::query(queries::TRIGGERS)
            .bind(table.as_deref())
            .fetch_all(&mut *conn)
            .await?;

        let mut triggers = Vec::with_capacity(rows.len());
        for row in &rows {
            let sql: Option<String> = row.try_get("sql")?;
            let (timing, event) = sql
                .as_deref()
                .map(parse_trigger_header)
                .unwrap_or((None, None));
            triggers.push(TriggerInfo {
                name: row.try_get("name")?,
                table: row.try_get("tbl_name")?,
                timing,
                event,
                sql,
            });
        }
        debug!(count = triggers.len(), "Listed SQLite triggers");
        Ok(triggers)
    }

    /// Views with their definitions and result columns.
    pub async fn list_views(conn: &mut SqliteConnection) -> DbResult<Vec<ViewInfo>> {
        let rows = sqlx::query(queries::VIEWS).fetch_all(&mut *conn).await?;

        let mut views = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.try_get("name")?;
            let columns: Vec<String> = sqlx::query_scalar(queries::VIEW_COLUMNS)
                .bind(&name)
                .fetch_all(&mut *conn)
                .await?;
            views.push(ViewInfo {
                sql: row.try_get("sql")?,
                name,
                columns,
            });
        }
        debug!(count = views.len(), "Listed SQLite views");
        Ok(views)
    }

    /// First `limit` rows of a table in engine order.
    pub async fn sample_rows(
        conn: &mut SqliteConnection,
        table: &str,
        limit: i64,
    ) -> DbResult<Vec<Row>> {
        let sql = format!("SELECT * FROM {} LIMIT ?1", quote_identifier(table));
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&mut *conn).await?;
        Ok(rows.iter().map(RowToJson::to_json_map).collect())
    }

    /// Full description of one table.
    pub async fn describe_table(conn: &mut SqliteConnection, table: &str) -> DbResult<TableSchema> {
        let name = Self::require_table(conn, table).await?;
        let columns = Self::fetch_columns(conn, &name).await?;
        let primary_key = primary_key_columns(&columns);
        let foreign_keys = Self::foreign_keys(conn, &name).await?;
        let indexes = Self::list_indexes(conn, Some(name.as_str())).await?;
        let row_count = Self::row_count(conn, &name).await?;
        let sample_rows = Self::sample_rows(conn, &name, SAMPLE_ROW_COUNT).await?;

        Ok(TableSchema {
            name,
            columns,
            primary_key,
            foreign_keys,
            indexes,
            row_count,
            sample_rows,
        })
    }

    /// Overview of every table: counts, keys and relationships.
    pub async fn table_summaries(conn: &mut SqliteConnection) -> DbResult<Vec<TableSummary>> {
        let tables = Self::list_tables(conn).await?;
        let mut summaries = Vec::with_capacity(tables.len());
        for name in tables {
            let columns = Self::fetch_columns(conn, &name).await?;
            summaries.push(TableSummary {
                row_count: Self::row_count(conn, &name).await?,
                column_count: columns.len(),
                primary_key: primary_key_columns(&columns),
                foreign_keys: Self::foreign_keys(conn, &name).await?,
                name,
            });
        }
        Ok(summaries)
    }

    /// Count catalog objects by type.
    pub async fn catalog_counts(conn: &mut SqliteConnection) -> DbResult<CatalogCounts> {
        let row = sqlx::query(queries::CATALOG_COUNTS)
            .fetch_one(&mut *conn)
            .await?;
        Ok(CatalogCounts {
            tables: row.try_get("tables")?,
            views: row.try_get("views")?,
            indexes: row.try_get("indexes")?,
            triggers: row.try_get("triggers")?,
        })
    }
}

/// Primary-key column names ordered by key position.
fn primary_key_columns(columns: &[ColumnDefinition]) -> Vec<String> {
    let mut pk: Vec<&ColumnDefinition> = columns.iter().filter(|c| c.is_primary_key).collect();
    pk.sort_by_key(|c| c.primary_key_position);
    pk.into_iter().map(|c| c.name.clone()).collect()
}

/// Read timing and event from a CREATE TRIGGER statement.
///
/// Only the header (up to the `ON` keyword) is examined. SQLite treats a
/// missing timing as BEFORE.
pub fn parse_trigger_header(sql: &str) -> (Option<TriggerTiming>, Option<TriggerEvent>) {
    let upper = sql.to_ascii_uppercase();
    let words = upper
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .filter(|w| !w.is_empty())
        .skip_while(|w| *w != "TRIGGER");

    let mut timing = None;
    let mut event = None;
    let mut previous = "";
    for word in words {
        match word {
            "BEFORE" => timing = Some(TriggerTiming::Before),
            "AFTER" => timing = Some(TriggerTiming::After),
            "OF" if previous == "INSTEAD" => timing = Some(TriggerTiming::InsteadOf),
            "INSERT" if event.is_none() => event = Some(TriggerEvent::Insert),
            "UPDATE" if event.is_none() => event = Some(TriggerEvent::Update),
            "DELETE" if event.is_none() => event = Some(TriggerEvent::Delete),
            "ON" if event.is_some() => break,
            _ => {}
        }
        previous = word;
    }

    if event.is_some() && timing.is_none() {
        timing = Some(TriggerTiming::Before);
    }
    (timing, event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "\"users\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_parse_trigger_header() {
        assert_eq!(
            parse_trigger_header("CREATE TRIGGER t1 AFTER INSERT ON orders BEGIN SELECT 1; END"),
            (Some(TriggerTiming::After), Some(TriggerEvent::Insert))
        );
        assert_eq!(
            parse_trigger_header(
                "create trigger t2 instead of update of qty on v_orders begin select 1; end"
            ),
            (Some(TriggerTiming::InsteadOf), Some(TriggerEvent::Update))
        );
        assert_eq!(
            parse_trigger_header("CREATE TEMP TRIGGER IF NOT EXISTS t3 DELETE ON x BEGIN SELECT 1; END"),
            (Some(TriggerTiming::Before), Some(TriggerEvent::Delete))
        );
    }

    #[test]
    fn test_parse_trigger_header_ignores_body() {
        let (_, event) = parse_trigger_header(
            "CREATE TRIGGER audit BEFORE DELETE ON a BEGIN INSERT INTO log VALUES (old.id); END",
        );
        assert_eq!(event, Some(TriggerEvent::Delete));
    }

    #[test]
    fn test_primary_key_columns_in_key_order() {
        let columns = vec![
            ColumnDefinition::new(0, "b", "TEXT").with_primary_key(2),
            ColumnDefinition::new(1, "a", "TEXT").with_primary_key(1),
            ColumnDefinition::new(2, "c", "TEXT"),
        ];
        assert_eq!(primary_key_columns(&columns), vec!["a", "b"]);
    }
}
