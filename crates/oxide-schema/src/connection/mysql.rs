//! MySQL catalog queries.
//!
//! Every text column is cast to `CHAR` and every number to `SIGNED` so the
//! driver decodes them the same way on MySQL 5.7, 8.x and MariaDB.

use sqlx::Row;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use tracing::debug;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::schema::{Column, ForeignKey, Index, PrimaryKeyConstraint};

use super::{
    ColumnRow, ForeignKeyRow, IndexRow, MAX_CONNECTIONS, SchemaConnection,
    group_foreign_key_rows, group_index_rows,
};

const TABLES_QUERY: &str = "\
SELECT CAST(TABLE_NAME AS CHAR) AS table_name
FROM information_schema.TABLES
WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_NAME";

const COLUMNS_QUERY: &str = "\
SELECT CAST(COLUMN_NAME AS CHAR) AS column_name,
       CAST(DATA_TYPE AS CHAR) AS data_type,
       CAST(COLUMN_TYPE AS CHAR) AS column_type,
       CAST(IS_NULLABLE AS CHAR) AS is_nullable,
       CAST(COLUMN_DEFAULT AS CHAR) AS column_default,
       CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS character_maximum_length,
       CAST(NUMERIC_PRECISION AS SIGNED) AS numeric_precision,
       CAST(NUMERIC_SCALE AS SIGNED) AS numeric_scale
FROM information_schema.COLUMNS
WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
ORDER BY ORDINAL_POSITION";

const PRIMARY_KEY_QUERY: &str = "\
SELECT CAST(COLUMN_NAME AS CHAR) AS column_name
FROM information_schema.KEY_COLUMN_USAGE
WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY'
ORDER BY ORDINAL_POSITION";

// Foreign keys get a backing index named after the constraint; those are
// reported with the foreign key, not as indexes.
const INDEXES_QUERY: &str = "\
SELECT CAST(s.INDEX_NAME AS CHAR) AS index_name,
       CAST(s.COLUMN_NAME AS CHAR) AS column_name,
       CAST(s.NON_UNIQUE AS SIGNED) AS non_unique
FROM information_schema.STATISTICS s
WHERE s.TABLE_SCHEMA = ? AND s.TABLE_NAME = ?
  AND s.INDEX_NAME <> 'PRIMARY'
  AND s.COLUMN_NAME IS NOT NULL
  AND s.INDEX_NAME NOT IN (
      SELECT r.CONSTRAINT_NAME
      FROM information_schema.REFERENTIAL_CONSTRAINTS r
      WHERE r.CONSTRAINT_SCHEMA = s.TABLE_SCHEMA AND r.TABLE_NAME = s.TABLE_NAME)
ORDER BY s.INDEX_NAME, s.SEQ_IN_INDEX";

const FOREIGN_KEYS_QUERY: &str = "\
SELECT CAST(k.CONSTRAINT_NAME AS CHAR) AS constraint_name,
       CAST(k.COLUMN_NAME AS CHAR) AS child_column,
       CAST(k.REFERENCED_TABLE_NAME AS CHAR) AS parent_table,
       CAST(k.REFERENCED_COLUMN_NAME AS CHAR) AS parent_column,
       CAST(r.DELETE_RULE AS CHAR) AS delete_rule
FROM information_schema.KEY_COLUMN_USAGE k
JOIN information_schema.REFERENTIAL_CONSTRAINTS r
  ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA
 AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME
 AND r.TABLE_NAME = k.TABLE_NAME
WHERE k.TABLE_SCHEMA = ? AND k.TABLE_NAME = ? AND k.REFERENCED_TABLE_NAME IS NOT NULL
ORDER BY k.CONSTRAINT_NAME, k.ORDINAL_POSITION";

/// Connection to a MySQL database.
#[derive(Debug, Clone)]
pub struct MysqlConnection {
    pool: MySqlPool,
    database: String,
}

impl MysqlConnection {
    /// Opens a pool and resolves the current database.
    pub async fn connect(uri: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(uri)
            .await?;

        let database: Option<String> = sqlx::query_scalar("SELECT CAST(DATABASE() AS CHAR)")
            .fetch_one(&pool)
            .await?;
        let database = database.ok_or_else(|| {
            sqlx::Error::Configuration("connection URI does not select a database".into())
        })?;

        Ok(Self::from_pool(pool, database))
    }

    /// Wraps an existing pool, resolving tables against `database`.
    #[must_use]
    pub fn from_pool(pool: MySqlPool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn fetch(&self, sql: &str, table: &str) -> Result<Vec<MySqlRow>> {
        debug!(database = %self.database, table = %table, "Querying catalog");
        Ok(sqlx::query(sql)
            .bind(&self.database)
            .bind(table)
            .fetch_all(&self.pool)
            .await?)
    }
}

impl SchemaConnection for MysqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(TABLES_QUERY)
            .bind(&self.database)
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
                    udt_name: None,
                    is_nullable: r.try_get("is_nullable")?,
                    column_default: r.try_get("column_default")?,
                    character_maximum_length: r.try_get("character_maximum_length")?,
                    numeric_precision: r.try_get("numeric_precision")?,
                    numeric_scale: r.try_get("numeric_scale")?,
                };
                Ok(row.into_column(false))
            })
            .collect()
    }

    async fn primary_key(&self, table: &str) -> Result<Option<PrimaryKeyConstraint>> {
        let rows = self.fetch(PRIMARY_KEY_QUERY, table).await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let columns = rows
            .iter()
            .map(|r| r.try_get("column_name"))
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(Some(PrimaryKeyConstraint::new(columns).named("PRIMARY")))
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<Index>> {
        let rows = self
            .fetch(INDEXES_QUERY, table)
            .await?
            .iter()
            .map(|r| -> Result<IndexRow> {
                let non_unique: i64 = r.try_get("non_unique")?;
                Ok(IndexRow {
                    index_name: r.try_get("index_name")?,
                    column_name: r.try_get("column_name")?,
                    is_unique: non_unique == 0,
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
