//! Builds canonical table models from a live connection.

use futures::future::try_join_all;
use tracing::debug;

use crate::connection::SchemaConnection;
use crate::error::Result;
use crate::schema::TableModel;

/// Reads tables from a [`SchemaConnection`] into [`TableModel`]s.
pub struct Introspector<'a, C: SchemaConnection> {
    connection: &'a C,
}

impl<'a, C: SchemaConnection> Introspector<'a, C> {
    /// Creates an introspector over `connection`.
    pub fn new(connection: &'a C) -> Self {
        Self { connection }
    }

    /// Returns whether `table` exists as a base table.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self
            .connection
            .list_tables()
            .await?
            .iter()
            .any(|t| t == table))
    }

    /// Reads one table, or `None` when it does not exist.
    pub async fn introspect_table(&self, table: &str) -> Result<Option<TableModel>> {
        if !self.table_exists(table).await? {
            debug!(table = %table, "Table does not exist");
            return Ok(None);
        }
        self.read_table(table).await.map(Some)
    }

    /// Reads every base table of the connected database, sorted by name.
    ///
    /// Tables are read concurrently over the connection's pool.
    pub async fn introspect_database(&self) -> Result<Vec<TableModel>> {
        let tables = self.connection.list_tables().await?;
        debug!(
            database = %self.connection.database_name(),
            count = tables.len(),
            "Introspecting tables"
        );
        try_join_all(tables.iter().map(|t| self.read_table(t))).await
    }

    async fn read_table(&self, table: &str) -> Result<TableModel> {
        let columns = self.connection.table_columns(table).await?;
        let primary_key = self.connection.primary_key(table).await?;
        let indexes = self.connection.list_indexes(table).await?;
        let foreign_keys = self.connection.list_foreign_keys(table).await?;

        debug!(
            table = %table,
            columns = columns.len(),
            indexes = indexes.len(),
            foreign_keys = foreign_keys.len(),
            "Introspected table"
        );

        Ok(TableModel {
            name: table.to_string(),
            columns,
            primary_key,
            indexes,
            foreign_keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::StaticConnection;
    use crate::dialect::Dialect;
    use crate::schema::{Column, PrimaryKeyConstraint};

    fn users() -> TableModel {
        TableModel::new("users")
            .column(Column::new("id", "integer").not_null())
            .column(Column::new("email", "text").nullable())
            .primary_key(PrimaryKeyConstraint::new(vec!["id".to_string()]).named("users_pkey"))
    }

    #[tokio::test]
    async fn test_introspect_table() {
        let conn = StaticConnection::new(Dialect::Postgres, vec![users()]);
        let introspector = Introspector::new(&conn);

        let table = introspector.introspect_table("users").await.unwrap().unwrap();
        assert_eq!(table, users());

        assert!(introspector.introspect_table("missing").await.unwrap().is_none());
        assert!(!introspector.table_exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_introspect_database_sorted() {
        let conn = StaticConnection::new(
            Dialect::Mysql,
            vec![users(), TableModel::new("accounts").column(Column::new("id", "int"))],
        );
        let tables = Introspector::new(&conn).introspect_database().await.unwrap();

        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["accounts", "users"]);
        assert_eq!(tables[1].primary_key_columns(), ["id".to_string()]);
    }
}
