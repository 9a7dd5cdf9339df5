//! Live database connections and catalog queries.
//!
//! [`SchemaConnection`] is the capability the introspector needs: list the
//! tables of the connected database and report one table's columns, key,
//! indexes and foreign keys. Each dialect family answers these from its own
//! catalog and folds the result into the canonical model.

mod mysql;
mod postgres;

pub use mysql::MysqlConnection;
pub use postgres::PostgresConnection;

use std::collections::HashMap;

use sqlx::pool::PoolConnection;
use sqlx::{MySql, Postgres};
use tracing::{info, warn};

use crate::dialect::Dialect;
use crate::error::Result;
use crate::schema::{
    Column, ColumnConstraints, ForeignKey, ForeignKeyAction, Index, PrimaryKeyConstraint,
};

/// Maximum pooled connections per target.
pub const MAX_CONNECTIONS: u32 = 5;

/// Catalog access for one database.
///
/// Tables are resolved against the schema (PostgreSQL) or database (MySQL)
/// that was current when the connection was opened. A table that does not
/// exist yields empty results, never an error.
#[allow(async_fn_in_trait)]
pub trait SchemaConnection {
    /// Returns the dialect this connection speaks.
    fn dialect(&self) -> Dialect;

    /// Returns the schema or database name tables are resolved against.
    fn database_name(&self) -> &str;

    /// Lists base tables, sorted by name.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Returns the columns of `table` in ordinal order.
    async fn table_columns(&self, table: &str) -> Result<Vec<Column>>;

    /// Returns the primary key of `table`, if it has one.
    async fn primary_key(&self, table: &str) -> Result<Option<PrimaryKeyConstraint>>;

    /// Returns the secondary indexes of `table`, excluding key-backed ones.
    async fn list_indexes(&self, table: &str) -> Result<Vec<Index>>;

    /// Returns the foreign keys of `table`.
    async fn list_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>>;
}

/// A pooled connection to any supported database.
#[derive(Debug, Clone)]
pub enum Connection {
    /// PostgreSQL or CockroachDB.
    Postgres(PostgresConnection),
    /// MySQL.
    Mysql(MysqlConnection),
}

impl Connection {
    /// Opens a pool for `dialect` at `uri` and resolves the current schema.
    pub async fn connect(dialect: Dialect, uri: &str) -> Result<Self> {
        let connection = match dialect {
            Dialect::Postgres | Dialect::CockroachDb => {
                Self::Postgres(PostgresConnection::connect(dialect, uri).await?)
            }
            Dialect::Mysql => Self::Mysql(MysqlConnection::connect(uri).await?),
        };
        info!(
            driver = %dialect,
            database = %connection.database_name(),
            "Connected"
        );
        Ok(connection)
    }

    /// Acquires one session from the pool.
    pub async fn session(&self) -> Result<Session> {
        Ok(match self {
            Self::Postgres(c) => Session::Postgres(c.pool().acquire().await?),
            Self::Mysql(c) => Session::Mysql(c.pool().acquire().await?),
        })
    }

    /// Closes the pool, waiting for checked-out sessions to be returned.
    pub async fn close(&self) {
        match self {
            Self::Postgres(c) => c.pool().close().await,
            Self::Mysql(c) => c.pool().close().await,
        }
    }
}

impl SchemaConnection for Connection {
    fn dialect(&self) -> Dialect {
        match self {
            Self::Postgres(c) => c.dialect(),
            Self::Mysql(c) => c.dialect(),
        }
    }

    fn database_name(&self) -> &str {
        match self {
            Self::Postgres(c) => c.database_name(),
            Self::Mysql(c) => c.database_name(),
        }
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        match self {
            Self::Postgres(c) => c.list_tables().await,
            Self::Mysql(c) => c.list_tables().await,
        }
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<Column>> {
        match self {
            Self::Postgres(c) => c.table_columns(table).await,
            Self::Mysql(c) => c.table_columns(table).await,
        }
    }

    async fn primary_key(&self, table: &str) -> Result<Option<PrimaryKeyConstraint>> {
        match self {
            Self::Postgres(c) => c.primary_key(table).await,
            Self::Mysql(c) => c.primary_key(table).await,
        }
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<Index>> {
        match self {
            Self::Postgres(c) => c.list_indexes(table).await,
            Self::Mysql(c) => c.list_indexes(table).await,
        }
    }

    async fn list_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        match self {
            Self::Postgres(c) => c.list_foreign_keys(table).await,
            Self::Mysql(c) => c.list_foreign_keys(table).await,
        }
    }
}

/// One session checked out of a pool, used to run statements in order.
#[derive(Debug)]
pub enum Session {
    /// PostgreSQL or CockroachDB session.
    Postgres(PoolConnection<Postgres>),
    /// MySQL session.
    Mysql(PoolConnection<MySql>),
}

/// One row of a column catalog query.
#[derive(Debug, Clone, Default)]
pub(crate) struct ColumnRow {
    pub column_name: String,
    pub data_type: String,
    /// Full catalog spelling with modifiers, when the catalog reports one
    /// (`format_type()` or `COLUMN_TYPE`).
    pub column_type: Option<String>,
    /// PostgreSQL `udt_name`, used for arrays and user-defined types.
    pub udt_name: Option<String>,
    pub is_nullable: String,
    pub column_default: Option<String>,
    pub character_maximum_length: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
}

impl ColumnRow {
    /// Folds the row into a canonical column.
    ///
    /// The type keeps the catalog's spelling; comparison against a declared
    /// type is left to the dialect.
    pub fn into_column(self, strip_casts: bool) -> Column {
        let (data_type, is_array) = match self.column_type.as_deref().map(str::trim) {
            Some(full) if !full.is_empty() => match full.strip_suffix("[]") {
                Some(element) => (element.trim_end().to_string(), true),
                None => (full.to_string(), false),
            },
            _ => self.composed_type(),
        };

        let default = self.column_default.map(|d| {
            if strip_casts {
                strip_postgres_cast(&d)
            } else {
                d
            }
        });

        Column {
            name: self.column_name,
            data_type,
            default,
            constraints: Some(ColumnConstraints {
                not_null: Some(self.is_nullable.eq_ignore_ascii_case("NO")),
            }),
            is_array,
        }
    }

    fn composed_type(&self) -> (String, bool) {
        match (self.data_type.as_str(), self.udt_name.as_deref()) {
            ("ARRAY", Some(udt)) => (
                catalog_type(
                    udt.trim_start_matches('_'),
                    self.character_maximum_length,
                    self.numeric_precision,
                    self.numeric_scale,
                ),
                true,
            ),
            ("USER-DEFINED", Some(udt)) => (udt.to_string(), false),
            (data_type, _) => (
                catalog_type(
                    data_type,
                    self.character_maximum_length,
                    self.numeric_precision,
                    self.numeric_scale,
                ),
                false,
            ),
        }
    }
}

/// One row of an index catalog query.
#[derive(Debug, Clone)]
pub(crate) struct IndexRow {
    pub index_name: String,
    pub column_name: String,
    pub is_unique: bool,
}

/// One row of a foreign key catalog query.
#[derive(Debug, Clone)]
pub(crate) struct ForeignKeyRow {
    pub constraint_name: String,
    pub child_column: String,
    pub parent_table: String,
    pub parent_column: String,
    pub delete_rule: String,
}

/// Composes a catalog type with its length or precision.
pub(crate) fn catalog_type(
    data_type: &str,
    max_length: Option<i64>,
    precision: Option<i64>,
    scale: Option<i64>,
) -> String {
    let lower = data_type.trim().to_lowercase();
    match lower.as_str() {
        "char" | "varchar" | "bpchar" | "binary" | "varbinary" | "character"
        | "character varying" | "bit" | "bit varying" => match max_length {
            Some(len) => format!("{lower}({len})"),
            None => lower,
        },
        "numeric" | "decimal" => match precision {
            Some(p) => format!("{lower}({p},{})", scale.unwrap_or(0)),
            None => lower,
        },
        _ => lower,
    }
}

/// Unwraps a PostgreSQL literal default from its cast: `'abc'::text` becomes
/// `abc`. Anything else is returned unchanged.
pub(crate) fn strip_postgres_cast(default: &str) -> String {
    let trimmed = default.trim();
    if let Some(rest) = trimmed.strip_prefix('\'') {
        if let Some(end) = rest.rfind("'::") {
            let cast = &rest[end + 3..];
            if !cast.is_empty() && !cast.contains('\'') && !cast.contains('(') {
                return rest[..end].replace("''", "'");
            }
        }
    }
    trimmed.to_string()
}

/// Aggregates index rows per index name, keeping first-seen order.
pub(crate) fn group_index_rows(rows: Vec<IndexRow>) -> Vec<Index> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut indexes: Vec<Index> = Vec::new();

    for row in rows {
        let position = *positions.entry(row.index_name.clone()).or_insert_with(|| {
            indexes.push(Index {
                name: row.index_name.clone(),
                columns: Vec::new(),
                unique: row.is_unique,
            });
            indexes.len() - 1
        });

        let index = &mut indexes[position];
        if !index.columns.contains(&row.column_name) {
            index.columns.push(row.column_name);
        }
    }

    indexes
}

/// Aggregates foreign key rows per constraint name, keeping first-seen
/// order of constraints and of column pairs. Exact duplicate pairs are
/// ignored.
pub(crate) fn group_foreign_key_rows(rows: Vec<ForeignKeyRow>) -> Vec<ForeignKey> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut foreign_keys: Vec<ForeignKey> = Vec::new();

    for row in rows {
        let position = *positions
            .entry(row.constraint_name.clone())
            .or_insert_with(|| {
                let on_delete = row.delete_rule.parse().unwrap_or_else(|_| {
                    warn!(
                        constraint = %row.constraint_name,
                        rule = %row.delete_rule,
                        "Unrecognized delete rule, assuming NO ACTION"
                    );
                    ForeignKeyAction::NoAction
                });
                foreign_keys.push(ForeignKey {
                    name: row.constraint_name.clone(),
                    child_columns: Vec::new(),
                    parent_table: row.parent_table.clone(),
                    parent_columns: Vec::new(),
                    on_delete,
                });
                foreign_keys.len() - 1
            });

        let fk = &mut foreign_keys[position];
        let duplicate = fk
            .child_columns
            .iter()
            .zip(&fk.parent_columns)
            .any(|(c, p)| *c == row.child_column && *p == row.parent_column);
        if !duplicate {
            fk.child_columns.push(row.child_column);
            fk.parent_columns.push(row.parent_column);
        }
    }

    foreign_keys
}
