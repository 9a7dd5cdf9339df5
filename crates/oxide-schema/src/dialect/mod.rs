//! Database dialects and per-dialect statement builders.
//!
//! A [`Dialect`] selects the catalog queries and SQL syntax used for a
//! target database. Each builder knows how to normalize type spellings and
//! how to render a [`MigrationOperation`] into one SQL statement.

mod mysql;
mod postgres;

pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;

use std::fmt;
use std::str::FromStr;

use crate::error::SchemaError;
use crate::operations::MigrationOperation;
use crate::schema::{Column, ForeignKey, Index, PrimaryKeyConstraint};

/// Supported target databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// MySQL and MariaDB.
    Mysql,
    /// CockroachDB, which speaks the PostgreSQL wire protocol and catalog.
    CockroachDb,
}

impl Dialect {
    /// Returns the driver token for this dialect.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::CockroachDb => "cockroachdb",
        }
    }

    /// Returns the statement builder for this dialect.
    #[must_use]
    pub fn builder(self) -> &'static dyn MigrationDialect {
        match self {
            Self::Postgres | Self::CockroachDb => &PostgresDialect,
            Self::Mysql => &MysqlDialect,
        }
    }

    /// Renders one operation with this dialect's builder.
    #[must_use]
    pub fn generate_sql(self, operation: &MigrationOperation) -> String {
        self.builder().generate_sql(operation)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            "cockroachdb" => Ok(Self::CockroachDb),
            _ => Err(SchemaError::UnknownDialect(s.to_string())),
        }
    }
}

/// Trait for dialect-specific SQL generation.
///
/// The default methods produce the syntax shared by PostgreSQL and MySQL;
/// implementations override the statements where the two diverge.
pub trait MigrationDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Normalizes a type spelling so declared and introspected types compare
    /// byte-for-byte. The result is a comparison key, never rendered.
    fn normalize_type(&self, data_type: &str) -> String;

    /// Returns whether a declared type and a catalog-reported type denote the
    /// same column type.
    fn types_match(&self, declared: &str, reported: &str) -> bool {
        self.normalize_type(declared) == self.normalize_type(reported)
    }

    /// Returns whether the live column's default satisfies the desired one.
    fn defaults_match(&self, desired: &Column, existing: &Column) -> bool {
        default_values_equal(desired.default.as_deref(), existing.default.as_deref())
    }

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quote a string literal.
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Renders a raw default as SQL: expressions pass through, plain text is
    /// quoted.
    fn render_default(&self, value: &str) -> String {
        if is_raw_default(value) {
            value.trim().to_string()
        } else {
            self.quote_literal(value)
        }
    }

    /// Returns the column type as written in DDL.
    fn column_type(&self, column: &Column) -> String {
        if column.is_array {
            format!("{}[]", column.data_type)
        } else {
            column.data_type.clone()
        }
    }

    /// Generates a column definition: name, type, NOT NULL and DEFAULT.
    fn column_definition(&self, column: &Column) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.column_type(column)
        );
        if column.is_not_null() {
            sql.push_str(" NOT NULL");
        }
        if let Some(ref default) = column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.render_default(default));
        }
        sql
    }

    /// Quotes and joins a column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Generates SQL for an operation.
    fn generate_sql(&self, operation: &MigrationOperation) -> String {
        match operation {
            MigrationOperation::CreateTable {
                table,
                columns,
                primary_key,
                foreign_keys,
            } => self.create_table_sql(table, columns, primary_key.as_ref(), foreign_keys),
            MigrationOperation::AddColumn { table, column } => self.add_column_sql(table, column),
            MigrationOperation::ModifyColumn { table, column } => {
                self.modify_column_sql(table, column)
            }
            MigrationOperation::DropColumn { table, column_name } => {
                self.drop_column_sql(table, column_name)
            }
            MigrationOperation::CreateIndex { table, index } => self.create_index_sql(table, index),
            MigrationOperation::DropIndex { table, name } => self.drop_index_sql(table, name),
            MigrationOperation::AddForeignKey { table, foreign_key } => {
                self.add_foreign_key_sql(table, foreign_key)
            }
            MigrationOperation::DropForeignKey { table, name } => {
                self.drop_foreign_key_sql(table, name)
            }
            MigrationOperation::AddPrimaryKey { table, primary_key } => {
                self.add_primary_key_sql(table, primary_key)
            }
            MigrationOperation::DropPrimaryKey { table, name } => {
                self.drop_primary_key_sql(table, name.as_deref())
            }
        }
    }

    /// Generates SQL for CREATE TABLE.
    fn create_table_sql(
        &self,
        table: &str,
        columns: &[Column],
        primary_key: Option<&PrimaryKeyConstraint>,
        foreign_keys: &[ForeignKey],
    ) -> String {
        let mut defs: Vec<String> = columns.iter().map(|c| self.column_definition(c)).collect();

        if let Some(pk) = primary_key.filter(|pk| !pk.columns.is_empty()) {
            defs.push(format!("PRIMARY KEY ({})", self.column_list(&pk.columns)));
        }

        defs.extend(foreign_keys.iter().map(|fk| self.foreign_key_clause(fk)));

        format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(table),
            defs.join(", ")
        )
    }

    /// Generates SQL for adding a column.
    fn add_column_sql(&self, table: &str, column: &Column) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        )
    }

    /// Generates SQL redefining an existing column.
    fn modify_column_sql(&self, table: &str, column: &Column) -> String;

    /// Generates SQL for dropping a column.
    fn drop_column_sql(&self, table: &str, column_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column_name)
        )
    }

    /// Generates SQL for creating an index.
    fn create_index_sql(&self, table: &str, index: &Index) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.name),
            self.quote_identifier(table),
            self.column_list(&index.columns)
        )
    }

    /// Generates SQL for dropping an index.
    fn drop_index_sql(&self, table: &str, name: &str) -> String;

    /// Generates the `CONSTRAINT ... FOREIGN KEY ... REFERENCES ...` clause.
    fn foreign_key_clause(&self, foreign_key: &ForeignKey) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
            self.quote_identifier(&foreign_key.name),
            self.column_list(&foreign_key.child_columns),
            self.quote_identifier(&foreign_key.parent_table),
            self.column_list(&foreign_key.parent_columns),
            foreign_key.on_delete.as_sql()
        )
    }

    /// Generates SQL for adding a foreign key.
    fn add_foreign_key_sql(&self, table: &str, foreign_key: &ForeignKey) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.foreign_key_clause(foreign_key)
        )
    }

    /// Generates SQL for dropping a foreign key.
    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String;

    /// Generates SQL for adding a primary key.
    fn add_primary_key_sql(&self, table: &str, primary_key: &PrimaryKeyConstraint) -> String {
        format!(
            "ALTER TABLE {} ADD PRIMARY KEY ({})",
            self.quote_identifier(table),
            self.column_list(&primary_key.columns)
        )
    }

    /// Generates SQL for dropping the primary key.
    fn drop_primary_key_sql(&self, table: &str, name: Option<&str>) -> String;
}

/// SQL keywords that are valid default expressions without quoting.
const DEFAULT_KEYWORDS: &[&str] = &[
    "NULL",
    "TRUE",
    "FALSE",
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "LOCALTIMESTAMP",
    "LOCALTIME",
];

/// Returns whether a default literal is an expression that must not be quoted.
pub(crate) fn is_raw_default(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    is_numeric_literal(trimmed)
        || DEFAULT_KEYWORDS
            .iter()
            .any(|k| k.eq_ignore_ascii_case(trimmed))
        || trimmed.contains('(')
        || trimmed.contains("::")
}

/// Matches `[+-]digits[.digits][e[+-]digits]` with at least one mantissa
/// digit. Words such as `inf` or `NaN` are not numeric literals in SQL.
pub(crate) fn is_numeric_literal(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let mut mantissa_digits = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        mantissa_digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            mantissa_digits += 1;
        }
    }
    if mantissa_digits == 0 {
        return false;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return false;
        }
    }
    i == bytes.len()
}

/// Compares two raw defaults. Numeric literals compare by value, so `1.5`
/// equals the `1.50` a catalog reports for a `numeric(5,2)` column.
pub(crate) fn default_values_equal(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            let (a, b) = (a.trim(), b.trim());
            a == b
                || (is_numeric_literal(a)
                    && is_numeric_literal(b)
                    && canonical_number(a) == canonical_number(b))
        }
        _ => false,
    }
}

/// Canonical text of a numeric literal: no `+`, no leading zeros in the
/// integer part, no trailing zeros in the fraction. Exponent forms fall back
/// to the shortest float rendering.
fn canonical_number(value: &str) -> String {
    if value.contains(['e', 'E']) {
        return value
            .parse::<f64>()
            .map_or_else(|_| value.to_string(), |f| f.to_string());
    }

    let (negative, digits) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
    let int = int.trim_start_matches('0');
    let frac = frac.trim_end_matches('0');

    let mut out = String::new();
    if negative && !(int.is_empty() && frac.is_empty()) {
        out.push('-');
    }
    out.push_str(if int.is_empty() { "0" } else { int });
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// A type spelling split into its parts, lowercased and whitespace-collapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TypeName {
    /// Base name plus any trailing words (`timestamp with time zone`).
    pub base: String,
    /// Comma-joined parameters without spaces (`10,2`).
    pub params: Option<String>,
}

impl TypeName {
    /// Splits `data_type` into base and parameters.
    pub fn parse(data_type: &str) -> Self {
        let lower = data_type.trim().to_lowercase();
        let (base, params) = match (lower.find('('), lower.rfind(')')) {
            (Some(open), Some(close)) if close > open => {
                let params = lower[open + 1..close]
                    .split(',')
                    .map(str::trim)
                    .collect::<Vec<_>>()
                    .join(",");
                let base = format!("{} {}", &lower[..open], &lower[close + 1..]);
                (base, Some(params).filter(|p| !p.is_empty()))
            }
            _ => (lower, None),
        };
        Self {
            base: base.split_whitespace().collect::<Vec<_>>().join(" "),
            params,
        }
    }

    /// Renders the type, keeping parameters only when `keep_params` is set.
    pub fn render(&self, keep_params: bool) -> String {
        match &self.params {
            Some(params) if keep_params => format!("{}({params})", self.base),
            _ => self.base.clone(),
        }
    }
}
