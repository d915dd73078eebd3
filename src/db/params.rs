//! Placeholder scanning and parameter binding.
//!
//! SQLite assigns placeholder indexes itself (`?` takes the next free
//! index, `?NNN` is explicit, `:name`/`@name`/`$name` get an index on
//! first use). The scanner below reproduces that numbering while skipping
//! string literals, quoted identifiers and comments, so a request can be
//! checked against the supplied values and rewritten to explicit `?N`
//! placeholders before sqlx binds them. Values are never spliced into SQL.

use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, QueryParams};
use sqlx::Sqlite;
use sqlx::sqlite::SqliteArguments;
use std::collections::HashMap;
use std::ops::Range;
use tracing::debug;

/// Largest `?NNN` index SQLite accepts by default.
const MAX_PARAMETER_INDEX: usize = 32766;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// `?`
    Anonymous,
    /// `?NNN`
    Numbered(usize),
    /// `:name`, `@name` or `$name`; stored without the sigil
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    /// Byte range of the placeholder in the source text
    pub span: Range<usize>,
    /// Index SQLite will assign to this placeholder
    pub index: usize,
}

/// One statement found in the request text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementSpan {
    /// First keyword, upper-cased
    pub leading_keyword: String,
    /// Whether a RETURNING clause appears
    pub has_returning: bool,
    /// Byte range of the statement text (without the terminator)
    pub span: Range<usize>,
}

/// Lexical summary of a SQL request.
#[derive(Debug, Clone, Default)]
pub struct ScannedSql {
    pub placeholders: Vec<Placeholder>,
    pub statements: Vec<StatementSpan>,
}

impl ScannedSql {
    /// Highest placeholder index, i.e. how many values SQLite expects.
    pub fn parameter_count(&self) -> usize {
        self.placeholders.iter().map(|p| p.index).max().unwrap_or(0)
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

#[derive(Default)]
struct StatementState {
    start: usize,
    leading_keyword: Option<String>,
    has_returning: bool,
    in_trigger: bool,
    last_word: Option<String>,
    words: usize,
}

impl StatementState {
    fn observe_word(&mut self, word: &str) {
        let upper = word.to_ascii_uppercase();
        self.words += 1;
        if self.leading_keyword.is_none() {
            self.leading_keyword = Some(upper.clone());
        } else if upper == "TRIGGER"
            && self.words <= 4
            && self.leading_keyword.as_deref() == Some("CREATE")
        {
            self.in_trigger = true;
        }
        if upper == "RETURNING" {
            self.has_returning = true;
        }
        self.last_word = Some(upper);
    }

    /// Trigger bodies contain `;` and only finish after `END`.
    fn ends_at_semicolon(&self) -> bool {
        !self.in_trigger || self.last_word.as_deref() == Some("END")
    }

    fn finish(self, end: usize) -> Option<StatementSpan> {
        self.leading_keyword.map(|leading_keyword| StatementSpan {
            leading_keyword,
            has_returning: self.has_returning,
            span: self.start..end,
        })
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// Scan SQL text for statements and placeholders.
pub fn scan_sql(sql: &str) -> DbResult<ScannedSql> {
    let bytes = sql.as_bytes();
    let mut out = ScannedSql::default();
    let mut names: HashMap<String, usize> = HashMap::new();
    let mut max_index = 0usize;
    let mut stmt = StatementState::default();
    let mut i = 0;

    // Skip to the byte after the closing `quote`, honouring doubled quotes.
    let skip_quoted = |mut j: usize, quote: u8| -> usize {
        while j < bytes.len() {
            if bytes[j] == quote {
                if quote != b']' && j + 1 < bytes.len() && bytes[j + 1] == quote {
                    j += 2;
                    continue;
                }
                return j + 1;
            }
            j += 1;
        }
        bytes.len()
    };

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\'' | b'"' | b'`' => {
                i = skip_quoted(i + 1, b);
                stmt.last_word = None;
            }
            b'[' => {
                i = skip_quoted(i + 1, b']');
                stmt.last_word = None;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            b';' => {
                if stmt.ends_at_semicolon() {
                    let finished = std::mem::take(&mut stmt);
                    if let Some(span) = finished.finish(i) {
                        out.statements.push(span);
                    }
                    stmt.start = i + 1;
                } else {
                    stmt.last_word = None;
                }
                i += 1;
            }
            b'?' => {
                let start = i;
                i += 1;
                let digits_start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let (kind, index) = if i > digits_start {
                    let n: usize = sql[digits_start..i]
                        .parse()
                        .map_err(|_| DbError::parameter_mismatch("Placeholder index is too large"))?;
                    if n == 0 || n > MAX_PARAMETER_INDEX {
                        return Err(DbError::parameter_mismatch(format!(
                            "Placeholder ?{} is out of range (1..={})",
                            n, MAX_PARAMETER_INDEX
                        )));
                    }
                    max_index = max_index.max(n);
                    (PlaceholderKind::Numbered(n), n)
                } else {
                    max_index += 1;
                    (PlaceholderKind::Anonymous, max_index)
                };
                out.placeholders.push(Placeholder {
                    kind,
                    span: start..i,
                    index,
                });
                stmt.last_word = None;
            }
            b':' | b'@' | b'$' if bytes.get(i + 1).is_some_and(|&n| is_ident_char(n)) => {
                let start = i;
                i += 1;
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    i += 1;
                }
                let name = sql[start + 1..i].to_string();
                let index = match names.get(&name) {
                    Some(&idx) => idx,
                    None => {
                        max_index += 1;
                        names.insert(name.clone(), max_index);
                        max_index
                    }
                };
                out.placeholders.push(Placeholder {
                    kind: PlaceholderKind::Named(name),
                    span: start..i,
                    index,
                });
                stmt.last_word = None;
            }
            _ if is_ident_start(b) => {
                let start = i;
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    i += 1;
                }
                stmt.observe_word(&sql[start..i]);
            }
            _ if b.is_ascii_digit() => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                    i += 1;
                }
                stmt.last_word = None;
            }
            _ if b.is_ascii_whitespace() => i += 1,
            _ => {
                stmt.last_word = None;
                i += 1;
            }
        }
    }

    if let Some(span) = stmt.finish(bytes.len()) {
        out.statements.push(span);
    }
    Ok(out)
}

/// SQL rewritten to explicit `?N` placeholders plus the values in index order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundSql {
    pub sql: String,
    pub values: Vec<QueryParam>,
}

/// Match `params` against the placeholders in `sql`.
///
/// Positional values fill `?` and `?NNN` placeholders and must cover every
/// index exactly. Named values must name every named placeholder (a
/// leading `:`, `@` or `$` on the key is optional) and may not include
/// unused keys. The two styles do not mix: a list cannot fill named
/// placeholders and an object cannot fill positional ones.
pub fn bind_parameters(sql: &str, scanned: &ScannedSql, params: QueryParams) -> DbResult<BoundSql> {
    let expected = scanned.parameter_count();
    let supplied = params.len();

    let values = match params {
        QueryParams::Positional(values) => {
            if let Some(name) = scanned.placeholders.iter().find_map(|p| match &p.kind {
                PlaceholderKind::Named(name) => Some(name),
                _ => None,
            }) {
                return Err(DbError::parameter_mismatch(format!(
                    "Statement uses named placeholder '{}'; pass parameters as an object",
                    name
                )));
            }
            if supplied != expected {
                return Err(DbError::parameter_mismatch(format!(
                    "Statement expects {} parameter(s) but {} were supplied",
                    expected, supplied
                )));
            }
            values
        }
        QueryParams::Named(map) => {
            let mut by_name: HashMap<String, QueryParam> = HashMap::new();
            for (key, value) in map {
                let bare = key
                    .strip_prefix([':', '@', '$'])
                    .unwrap_or(&key)
                    .to_string();
                by_name.insert(bare, value);
            }

            let mut slots: Vec<Option<QueryParam>> = vec![None; expected];
            for placeholder in &scanned.placeholders {
                let PlaceholderKind::Named(name) = &placeholder.kind else {
                    return Err(DbError::parameter_mismatch(
                        "Statement uses positional placeholders; pass parameters as a list",
                    ));
                };
                let slot = &mut slots[placeholder.index - 1];
                if slot.is_none() {
                    let value = by_name.remove(name).ok_or_else(|| {
                        DbError::parameter_mismatch(format!("Missing value for parameter '{}'", name))
                    })?;
                    *slot = Some(value);
                }
            }
            if !by_name.is_empty() {
                let mut unused: Vec<_> = by_name.into_keys().collect();
                unused.sort();
                return Err(DbError::parameter_mismatch(format!(
                    "Parameter(s) not used by the statement: {}",
                    unused.join(", ")
                )));
            }
            slots.into_iter().map(Option::unwrap_or_default).collect()
        }
    };

    debug!(
        types = ?values.iter().map(QueryParam::type_name).collect::<Vec<_>>(),
        "Bound parameters"
    );
    Ok(BoundSql {
        sql: rewrite_placeholders(sql, &scanned.placeholders),
        values,
    })
}

/// Replace every placeholder with `?N` using its SQLite-assigned index.
fn rewrite_placeholders(sql: &str, placeholders: &[Placeholder]) -> String {
    let mut out = String::with_capacity(sql.len() + placeholders.len() * 2);
    let mut last = 0;
    for placeholder in placeholders {
        out.push_str(&sql[last..placeholder.span.start]);
        out.push('?');
        out.push_str(&placeholder.index.to_string());
        last = placeholder.span.end;
    }
    out.push_str(&sql[last..]);
    out
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        // SQLite has no JSON storage class; store the text
        QueryParam::Json(v) => query.bind(v.to_string()),
    }
}
