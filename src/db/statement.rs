//! SQL statements with positional `?` parameters.
//!
//! A [`Statement`] can run in two ways: with its parameters bound through the
//! driver, or with the parameters substituted into the SQL text as inline
//! literals. Both use the same placeholder syntax.

use super::types::{is_decimal_text, Value, TIMESTAMP_FORMAT};
use super::DatabaseBackend;
use crate::error::{DbError, Result};

/// Builds a `Vec<Value>` from a list of expressions convertible into [`Value`].
///
/// ```
/// use db_query::params;
/// use db_query::db::Value;
///
/// let p = params![1, "foo", None::<i64>];
/// assert_eq!(p, vec![Value::Int(1), Value::from("foo"), Value::Null]);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::db::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::db::Value::from($value)),+]
    };
}

/// A SQL statement and its positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    /// Creates a statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Replaces the parameter list.
    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Appends one parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Number of `?` placeholders in the SQL text.
    pub fn placeholder_count(&self) -> usize {
        code_positions(&self.sql, '?').len()
    }

    /// Rewrites `?` placeholders as `$1`, `$2`, ... for PostgreSQL.
    ///
    /// A statement without parameters is returned unchanged, so operators
    /// spelled `?` (such as jsonb key tests) survive.
    pub fn numbered_sql(&self) -> String {
        if self.params.is_empty() {
            return self.sql.clone();
        }
        let positions = code_positions(&self.sql, '?');
        if positions.is_empty() {
            return self.sql.clone();
        }

        let mut out = String::with_capacity(self.sql.len() + positions.len() * 2);
        let mut last = 0;
        for (n, pos) in positions.iter().enumerate() {
            out.push_str(&self.sql[last..*pos]);
            out.push('$');
            out.push_str(&(n + 1).to_string());
            last = pos + 1;
        }
        out.push_str(&self.sql[last..]);
        out
    }

    /// Renders every parameter into the SQL text as an inline literal and
    /// returns the resulting parameterless statement.
    pub fn substitute(&self, backend: DatabaseBackend) -> Result<Statement> {
        let positions = code_positions(&self.sql, '?');
        if positions.len() != self.params.len() {
            return Err(DbError::invalid_argument(format!(
                "Statement has {} placeholders but {} parameters were given",
                positions.len(),
                self.params.len()
            )));
        }

        let mut out = String::with_capacity(self.sql.len() + self.params.len() * 8);
        let mut last = 0;
        for (pos, value) in positions.iter().zip(&self.params) {
            out.push_str(&self.sql[last..*pos]);
            out.push_str(&sql_literal(value, backend)?);
            last = pos + 1;
        }
        out.push_str(&self.sql[last..]);

        Ok(Statement::new(out))
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Statement::new(sql)
    }
}

/// Splits a script into statements on `;`, ignoring semicolons inside
/// literals, quoted identifiers and comments. Empty statements are dropped.
pub fn split_script(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut last = 0;
    for pos in code_positions(script, ';') {
        push_trimmed(&mut statements, &script[last..pos]);
        last = pos + 1;
    }
    push_trimmed(&mut statements, &script[last..]);
    statements
}

fn push_trimmed(statements: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() && !is_comment_only(piece) {
        statements.push(piece.to_string());
    }
}

fn is_comment_only(piece: &str) -> bool {
    piece
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Renders a value as an inline SQL literal for `backend`.
pub fn sql_literal(value: &Value, backend: DatabaseBackend) -> Result<String> {
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(DbError::invalid_argument(format!(
                    "Cannot render non-finite float {f} as a SQL literal"
                )));
            }
            // Debug keeps a decimal point so the literal stays a float.
            format!("{f:?}")
        }
        Value::Decimal(d) => {
            if !is_decimal_text(d) {
                return Err(DbError::invalid_argument(format!(
                    "Invalid decimal value '{d}'"
                )));
            }
            match (d.as_str(), backend) {
                ("NaN" | "Infinity" | "-Infinity", DatabaseBackend::Postgres) => {
                    format!("'{d}'::numeric")
                }
                ("NaN" | "Infinity" | "-Infinity", DatabaseBackend::Sqlite) => quote(d),
                _ => d.clone(),
            }
        }
        Value::String(s) => quote(s),
        Value::Bytes(b) => {
            let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
            match backend {
                DatabaseBackend::Sqlite => format!("X'{hex}'"),
                DatabaseBackend::Postgres => format!("'\\x{hex}'::bytea"),
            }
        }
        Value::Date(d) => quote(&d.format("%Y-%m-%d").to_string()),
        Value::Timestamp(ts) => quote(&ts.format(TIMESTAMP_FORMAT).to_string()),
    })
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Region<'a> {
    Code,
    SingleQuoted,
    /// PostgreSQL `E'...'` string, where a backslash escapes the next character.
    EscapeQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment,
    /// PostgreSQL dollar-quoted body; holds the full `$tag$` delimiter.
    DollarQuoted(&'a str),
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// True when the quote at `quote_at` opens an `E'...'` string.
fn opens_escape_string(sql: &str, quote_at: usize) -> bool {
    let mut before = sql[..quote_at].chars().rev();
    matches!(before.next(), Some('e' | 'E')) && !before.next().is_some_and(is_ident_char)
}

/// The `$tag$` delimiter starting at `start`, if one does.
fn dollar_tag(sql: &str, start: usize) -> Option<&str> {
    if sql[..start].chars().next_back().is_some_and(is_ident_char) {
        return None;
    }
    let rest = &sql[start + 1..];
    let tag_len = rest
        .char_indices()
        .find(|&(i, c)| !(c.is_alphanumeric() || c == '_') || (i == 0 && c.is_ascii_digit()))
        .map(|(i, _)| i)?;
    rest[tag_len..]
        .starts_with('$')
        .then(|| &sql[start..start + tag_len + 2])
}

/// Byte offsets of `target` where it appears in plain SQL code.
fn code_positions(sql: &str, target: char) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut region = Region::Code;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match region {
            Region::Code => match c {
                '\'' if opens_escape_string(sql, i) => region = Region::EscapeQuoted,
                '\'' => region = Region::SingleQuoted,
                '"' => region = Region::DoubleQuoted,
                '-' if matches!(chars.peek(), Some((_, '-'))) => {
                    chars.next();
                    region = Region::LineComment;
                }
                '/' if matches!(chars.peek(), Some((_, '*'))) => {
                    chars.next();
                    region = Region::BlockComment;
                }
                '$' => {
                    if let Some(tag) = dollar_tag(sql, i) {
                        skip_to(&mut chars, i + tag.len());
                        region = Region::DollarQuoted(tag);
                    }
                }
                c if c == target => positions.push(i),
                _ => {}
            },
            // A doubled quote closes and reopens, which lands in the same region.
            Region::SingleQuoted if c == '\'' => region = Region::Code,
            Region::EscapeQuoted if c == '\\' => {
                chars.next();
            }
            Region::EscapeQuoted if c == '\'' => {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                } else {
                    region = Region::Code;
                }
            }
            Region::DoubleQuoted if c == '"' => region = Region::Code,
            Region::LineComment if c == '\n' => region = Region::Code,
            Region::BlockComment if c == '*' && matches!(chars.peek(), Some((_, '/'))) => {
                chars.next();
                region = Region::Code;
            }
            Region::DollarQuoted(tag) if sql[i..].starts_with(tag) => {
                skip_to(&mut chars, i + tag.len());
                region = Region::Code;
            }
            _ => {}
        }
    }

    positions
}

/// Advances `chars` to the first character at or after byte offset `end`.
fn skip_to(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>, end: usize) {
    while chars.next_if(|&(j, _)| j < end).is_some() {}
}
