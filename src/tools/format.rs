//! Output formatting utilities for MCP tools.
//!
//! Shared output format type and renderers used by `execute_sql` and
//! `get_query_plan` when the caller asks for a text table instead of JSON rows.

use crate::models::Row;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Output format for row-returning tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON rows (default)
    #[default]
    Json,
    /// ASCII table, like the sqlite3 shell in box mode
    Table,
    /// Markdown table
    Markdown,
}

impl OutputFormat {
    /// Render `rows` as text, or `None` for the JSON format.
    pub fn render(
        &self,
        columns: &[String],
        rows: &[Row],
        execution_time_ms: u64,
    ) -> Option<String> {
        match self {
            Self::Json => None,
            Self::Table => Some(format_as_table(columns, rows, execution_time_ms)),
            Self::Markdown => Some(format_as_markdown(columns, rows)),
        }
    }
}

pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn rows_label(count: usize) -> &'static str {
    if count == 1 { "row" } else { "rows" }
}

pub fn format_as_table(columns: &[String], rows: &[Row], execution_time_ms: u64) -> String {
    if columns.is_empty() {
        return "Empty set".to_string();
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.width()).collect();
    for row in rows {
        for (i, col) in columns.iter().enumerate() {
            if let Some(value) = row.get(col) {
                widths[i] = widths[i].max(format_value(value).width());
            }
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut output = String::new();
    output.push_str(&separator);
    for (col, w) in columns.iter().zip(&widths) {
        output.push_str(&format!("| {} ", pad(col, *w, Align::Center)));
    }
    output.push_str("|\n");
    output.push_str(&separator);

    for row in rows {
        for (col, w) in columns.iter().zip(&widths) {
            let value = row.get(col).unwrap_or(&JsonValue::Null);
            let align = if value.is_number() {
                Align::Right
            } else {
                Align::Left
            };
            output.push_str(&format!("| {} ", pad(&format_value(value), *w, align)));
        }
        output.push_str("|\n");
    }
    output.push_str(&separator);

    output.push_str(&format!(
        "{} {} in set ({:.2} sec)\n",
        rows.len(),
        rows_label(rows.len()),
        execution_time_ms as f64 / 1000.0
    ));
    output
}

pub fn format_as_markdown(columns: &[String], rows: &[Row]) -> String {
    if columns.is_empty() {
        return "*Empty set*".to_string();
    }

    let mut output = String::new();
    for col in columns {
        output.push_str(&format!("| {} ", escape_markdown(col)));
    }
    output.push_str("|\n");
    output.push_str(&"|---".repeat(columns.len()));
    output.push_str("|\n");

    for row in rows {
        for col in columns {
            let value = row.get(col).unwrap_or(&JsonValue::Null);
            output.push_str(&format!("| {} ", escape_markdown(&format_value(value))));
        }
        output.push_str("|\n");
    }

    output.push_str(&format!("\n*{} {}*", rows.len(), rows_label(rows.len())));
    output
}

/// Summary line for statements that change data instead of returning rows.
pub fn format_changes(rows_affected: u64, execution_time_ms: u64) -> String {
    format!(
        "Query OK, {} {} affected ({:.2} sec)",
        rows_affected,
        if rows_affected == 1 { "row" } else { "rows" },
        execution_time_ms as f64 / 1000.0
    )
}

enum Align {
    Left,
    Right,
    Center,
}

// `format!` width counts chars, not display columns, so pad by hand.
fn pad(text: &str, width: usize, align: Align) -> String {
    let fill = width.saturating_sub(text.width());
    match align {
        Align::Left => format!("{}{}", text, " ".repeat(fill)),
        Align::Right => format!("{}{}", " ".repeat(fill), text),
        Align::Center => {
            let left = fill / 2;
            format!("{}{}{}", " ".repeat(left), text, " ".repeat(fill - left))
        }
    }
}

fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
