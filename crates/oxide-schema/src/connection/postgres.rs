//! PostgreSQL-family catalog queries (PostgreSQL and CockroachDB).

use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use tracing::debug;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::schema::{Column, ForeignKey, Index, PrimaryKeyConstraint};

use super::{
    ColumnRow, ForeignKeyRow, IndexRow, MAX_CONNECTIONS, SchemaConnection,
    group_foreign_key_rows, group_index_rows,
};

const TABLES_QUERY: &str = "\
SELECT table_name::text AS table_name
FROM information_schema.tables
WHERE table_schema = $1 AND table_type = 'BASE TABLE'
ORDER BY table_name";

const COLUMNS_QUERY: &str = "\
SELECT c.column_name::text AS column_name,
       c.data_type::text AS data_type,
       format_type(a.atttypid, a.atttypmod)::text AS column_type,
       c.udt_name::text AS udt_name,
       c.is_nullable::text AS is_nullable,
       c.column_default::text AS column_default,
       c.character_maximum_length::int8 AS character_maximum_length,
       c.numeric_precision::int8 AS numeric_precision,
       c.numeric_scale::int8 AS numeric_scale
FROM information_schema.columns c
JOIN pg_namespace n ON n.nspname = c.table_schema
JOIN pg_class t ON t.relnamespace = n.oid AND t.relname = c.table_name
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attname = c.column_name AND NOT a.attisdropped
WHERE c.table_schema = $1 AND c.table_name = $2
ORDER BY c.ordinal_position";

const PRIMARY_KEY_QUERY: &str = "\
SELECT c.conname::text AS constraint_name, a.attname::text AS column_name
FROM pg_constraint c
JOIN pg_class t ON t.oid = c.conrelid
JOIN pg_namespace n ON n.oid = t.relnamespace
JOIN LATERAL unnest(c.conkey) WITH ORDINALITY AS k(attnum, ordinality) ON true
JOIN pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = k.attnum
WHERE c.contype = 'p' AND n.nspname = $1 AND t.relname = $2
ORDER BY k.ordinality";

const INDEXES_QUERY: &str = "\
SELECT i.relname::text AS index_name, a.attname::text AS column_name, ix.indisunique AS is_unique
FROM pg_class t
JOIN pg_namespace n ON n.oid = t.relnamespace
JOIN pg_index ix ON ix.indrelid = t.oid
JOIN pg_class i ON i.oid = ix.indexrelid
JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ordinality) ON true
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
WHERE n.nspname = $1 AND t.relname = $2 AND NOT ix.indisprimary
ORDER BY i.relname, k.ordinality";

const FOREIGN_KEYS_QUERY: &str = "\
SELECT c.conname::text AS constraint_name,
       ca.attname::text AS child_column,
       pt.relname::text AS parent_table,
       pa.attname::text AS parent_column,
       CASE c.confdeltype
           WHEN 'c' THEN 'CASCADE'
           WHEN 'r' THEN 'RESTRICT'
           WHEN 'n' THEN 'SET NULL'
           WHEN 'd' THEN 'SET DEFAULT'
           ELSE 'NO ACTION'
       END AS delete_rule
FROM pg_constraint c
JOIN pg_class t ON t.oid = c.conrelid
JOIN pg_namespace n ON n.oid = t.relnamespace
JOIN pg_class pt ON pt.oid = c.confrelid
JOIN LATERAL unnest(c.conkey, c.confkey) WITH ORDINALITY AS k(child_attnum, parent_attnum, ordinality) ON true
JOIN pg_attribute ca ON ca.attrelid = c.conrelid AND ca.attnum = k.child_attnum
JOIN pg_attribute pa ON pa.attrelid = c.confrelid AND pa.attnum = k.parent_attnum
WHERE c.contype = 'f' AND n.nspname = $1 AND t.relname = $2
ORDER BY c.conname, k.ordinality";

/// Connection to a PostgreSQL or CockroachDB database.
#[derive(Debug, Clone)]
pub struct PostgresConnection {
    pool: PgPool,
    dialect: Dialect,
    schema: String,
}

impl PostgresConnection {
    /// Opens a pool and resolves the current schema.
    pub async fn connect(dialect: Dialect, uri: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(uri)
            .await?;

        let schema: Option<String> = sqlx::query_scalar("SELECT current_schema()::text")
            .fetch_one(&pool)
            .await?;
        let schema = schema.ok_or_else(|| {
            sqlx::Error::Configuration("connection has no current schema".into())
        })?;

        Ok(Self::from_pool(pool, dialect, schema))
    }

    /// Wraps an existing pool, resolving tables against `schema`.
    #[must_use]
    pub fn from_pool(pool: PgPool, dialect: Dialect, schema: impl Into<String>) -> Self {
        Self {
            pool,
            dialect,
            schema: schema.into(),
        }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch(&self, sql: &str, table: &str) -> Result<Vec<PgRow>> {
        debug!(schema = %self.schema, table = %table, "Querying catalog");
        Ok(sqlx::query(sql)
            .bind(&self.schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await?)
    }
}

impl SchemaConnection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn database_name(&self) -> &str {
        &self.schema
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(TABLES_QUERY)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;
        let tables = rows
            .iter()
            .map(|r| r.try_get::<String, _>("table_name"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tables)
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = self.fetch(COLUMNS_QUERY, table).await?;
        rows.iter()
            .map(|r| -> Result<Column> {
                let row = ColumnRow {
                    column_name: r.try_get("column_name")?,
                    data_type: r.try_get("data_type")?,
                    column_type: r.try_get("column_type")?,
                    udt_name: r.try_get("udt_name")?,
                    is_nullable: r.try_get("is_nullable")?,
                    column_default: r.try_get("column_default")?,
                    character_maximum_length: r.try_get("character_maximum_length")?,
                    numeric_precision: r.try_get("numeric_precision")?,
                    numeric_scale: r.try_get("numeric_scale")?,
                };
                Ok(row.into_column(true))
            })
            .collect()
    }

    async fn primary_key(&self, table: &str) -> Result<Option<PrimaryKeyConstraint>> {
        let rows = self.fetch(PRIMARY_KEY_QUERY, table).await?;
        let Some(first) = rows.first() else {
            return Ok(None);
        };

        let name: String = first.try_get("constraint_name")?;
        let columns = rows
            .iter()
            .map(|r| r.try_get("column_name"))
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(Some(PrimaryKeyConstraint::new(columns).named(name)))
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<Index>> {
        let rows = self
            .fetch(INDEXES_QUERY, table)
            .await?
            .iter()
            .map(|r| -> Result<IndexRow> {
                Ok(IndexRow {
                    index_name: r.try_get("index_name")?,
                    column_name: r.try_get("column_name")?,
                    is_unique: r.try_get("is_unique")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(group_index_rows(rows))
    }

    async fn list_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        let rows = self
            .fetch(FOREIGN_KEYS_QUERY, table)
            .await?
            .iter()
            .map(|r| -> Result<ForeignKeyRow> {
                Ok(ForeignKeyRow {
                    constraint_name: r.try_get("constraint_name")?,
                    child_column: r.try_get("child_column")?,
                    parent_table: r.try_get("parent_table")?,
                    parent_column: r.try_get("parent_column")?,
                    delete_rule: r.try_get("delete_rule")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(group_foreign_key_rows(rows))
    }
}
