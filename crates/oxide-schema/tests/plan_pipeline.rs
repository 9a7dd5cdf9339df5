//! End-to-end planning against an in-memory catalog.

use std::path::Path;

use oxide_schema::prelude::*;

/// Catalog double serving fixed tables.
struct FakeCatalog {
    dialect: Dialect,
    tables: Vec<TableModel>,
}

impl FakeCatalog {
    fn table(&self, name: &str) -> Option<&TableModel> {
        self.tables.iter().find(|t| t.name == name)
    }
}

impl SchemaConnection for FakeCatalog {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn database_name(&self) -> &str {
        "app"
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<Column>> {
        Ok(self.table(table).map(|t| t.columns.clone()).unwrap_or_default())
    }

    async fn primary_key(&self, table: &str) -> Result<Option<PrimaryKeyConstraint>> {
        Ok(self.table(table).and_then(|t| t.primary_key.clone()))
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<Index>> {
        Ok(self.table(table).map(|t| t.indexes.clone()).unwrap_or_default())
    }

    async fn list_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        Ok(self
            .table(table)
            .map(|t| t.foreign_keys.clone())
            .unwrap_or_default())
    }
}

/// Records statements instead of running them.
#[derive(Default)]
struct Recorder {
    executed: Vec<String>,
}

impl Execute for Recorder {
    async fn execute(&mut self, sql: &str) -> std::result::Result<(), sqlx::Error> {
        self.executed.push(sql.to_string());
        Ok(())
    }
}

fn users_document(dialect: &str) -> String {
    format!(
        "apiVersion: schemas.oxide-sql.dev/v1alpha1
kind: Table
metadata:
  name: users
spec:
  database: app
  name: users
  schema:
    {dialect}:
      primaryKey: [id]
      columns:
        - name: id
          type: integer
          constraints:
            notNull: true
        - name: email
          type: text
          constraints:
            notNull: true
"
    )
}

fn live_users(id_type: &str) -> TableModel {
    TableModel::new("users")
        .column(Column::new("id", id_type).not_null())
        .column(Column::new("email", "text").nullable())
        .column(Column::new("legacy", "text").nullable())
        .primary_key(PrimaryKeyConstraint::new(vec!["id".to_string()]))
}

#[tokio::test]
async fn test_postgres_modify_and_drop() {
    let catalog = FakeCatalog {
        dialect: Dialect::Postgres,
        tables: vec![live_users("integer")],
    };
    let spec = parse_table_spec(&users_document("postgres"), Path::new("users.yaml")).unwrap();

    let ops = plan_table_spec(&catalog, Dialect::Postgres, &spec).await.unwrap();
    assert_eq!(ops.len(), 2);
    assert!(matches!(
        &ops[0],
        MigrationOperation::ModifyColumn { column, .. } if column.name == "email"
    ));
    assert!(matches!(
        &ops[1],
        MigrationOperation::DropColumn { column_name, .. } if column_name == "legacy"
    ));

    assert_eq!(
        render_statements(Dialect::Postgres, &ops),
        vec![
            "ALTER TABLE \"users\" ALTER COLUMN \"email\" TYPE text, \
             ALTER COLUMN \"email\" SET NOT NULL, ALTER COLUMN \"email\" DROP DEFAULT"
                .to_string(),
            "ALTER TABLE \"users\" DROP COLUMN \"legacy\"".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_mysql_modify_and_drop() {
    let catalog = FakeCatalog {
        dialect: Dialect::Mysql,
        tables: vec![live_users("int")],
    };
    let spec = parse_table_spec(&users_document("mysql"), Path::new("users.yaml")).unwrap();

    let ops = plan_table_spec(&catalog, Dialect::Mysql, &spec).await.unwrap();
    assert_eq!(
        render_statements(Dialect::Mysql, &ops),
        vec![
            "ALTER TABLE `users` MODIFY COLUMN `email` text NOT NULL".to_string(),
            "ALTER TABLE `users` DROP COLUMN `legacy`".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_cockroachdb_uses_postgres_syntax() {
    let catalog = FakeCatalog {
        dialect: Dialect::CockroachDb,
        tables: Vec::new(),
    };
    let spec =
        parse_table_spec(&users_document("cockroachdb"), Path::new("users.yaml")).unwrap();

    let ops = plan_table_spec(&catalog, Dialect::CockroachDb, &spec).await.unwrap();
    assert_eq!(
        render_statements(Dialect::CockroachDb, &ops),
        vec![
            "CREATE TABLE \"users\" (\"id\" integer NOT NULL, \"email\" text NOT NULL, \
             PRIMARY KEY (\"id\"))"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn test_replanning_after_apply_is_idempotent() {
    let spec = parse_table_spec(&users_document("postgres"), Path::new("users.yaml")).unwrap();
    let desired = spec.to_table_model(Dialect::Postgres).unwrap();

    // The catalog after the plan has been applied.
    let catalog = FakeCatalog {
        dialect: Dialect::Postgres,
        tables: vec![TableModel::new("users")
            .column(Column::new("id", "integer").not_null())
            .column(Column::new("email", "text").not_null())
            .primary_key(PrimaryKeyConstraint::new(vec!["id".to_string()]).named("users_pkey"))],
    };
    assert_eq!(desired.columns.len(), 2);

    let ops = plan_table_spec(&catalog, Dialect::Postgres, &spec).await.unwrap();
    assert!(ops.is_empty(), "unexpected operations: {ops:?}");
}

#[tokio::test]
async fn test_statement_file_round_trip_through_executor() {
    let catalog = FakeCatalog {
        dialect: Dialect::Postgres,
        tables: vec![live_users("integer")],
    };
    let spec = parse_table_spec(&users_document("postgres"), Path::new("users.yaml")).unwrap();
    let ops = plan_table_spec(&catalog, Dialect::Postgres, &spec)
        .await
        .unwrap();
    let statements = render_statements(Dialect::Postgres, &ops);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.sql");
    std::fs::write(&path, render_statement_file(&statements)).unwrap();
    let reloaded = parse_statement_file(&std::fs::read_to_string(&path).unwrap());
    assert_eq!(reloaded, statements);

    let mut executor = StatementExecutor::new(Recorder::default());
    assert_eq!(executor.apply(&reloaded).await.unwrap(), 2);
    assert_eq!(executor.into_inner().executed, statements);
}

#[tokio::test]
async fn test_generate_then_plan_is_empty() {
    let live = TableModel::new("order_items")
        .column(Column::new("order_id", "integer").not_null())
        .column(Column::new("sku", "character varying(32)").not_null())
        .column(Column::new("quantity", "integer").not_null().default("1"))
        .primary_key(
            PrimaryKeyConstraint::new(vec!["order_id".to_string(), "sku".to_string()])
                .named("order_items_pkey"),
        )
        .index(Index::new("idx_order_items_sku", vec!["sku".to_string()]))
        .foreign_key(
            ForeignKey::new("order_items_order_id_fkey", "order_id", "orders", "id")
                .on_delete(ForeignKeyAction::Cascade),
        );
    let catalog = FakeCatalog {
        dialect: Dialect::Postgres,
        tables: vec![live],
    };

    let orchestrator = Orchestrator::new(Config::new(Dialect::Postgres));
    let documents = orchestrator.generate_from(&catalog).await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].metadata.name, "order-items");

    let dir = tempfile::tempdir().unwrap();
    write_documents(dir.path(), &documents).unwrap();
    let specs = collect_specs(dir.path()).unwrap();
    assert_eq!(specs.len(), 1);

    let ops = plan_table_spec(&catalog, Dialect::Postgres, &specs[0].1)
        .await
        .unwrap();
    assert!(ops.is_empty(), "unexpected operations: {ops:?}");
}
