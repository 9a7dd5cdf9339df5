//! Declarative table schemas for PostgreSQL, MySQL and CockroachDB.
//!
//! `oxide-schema` compares a declarative description of a table with the
//! live database and produces the DDL that brings the table into line:
//! - Catalog metadata from different engines is normalized into one model
//! - Changes are planned in a safe order, constraints first
//! - Nullability compares by meaning: an absent flag equals `notNull: false`
//!
//! It also runs the other way, describing live tables as documents.
//!
//! # Architecture
//!
//! - **Schema** - Canonical table model shared by both sides of a diff
//! - **Spec** - Table documents (YAML) and their conversion to the model
//! - **Connection** - Catalog queries per database family, over sqlx pools
//! - **Introspect** - Builds table models from a connection
//! - **Planner** - Diffs desired and actual tables into operations
//! - **Dialect** - Renders each operation as one SQL statement
//! - **Executor** - Runs statements in order, stopping at the first failure
//! - **Generate** - Table models to documents, documents to fixture SQL
//! - **Orchestrator** - Plan, apply, generate and fixtures entry points
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_schema::prelude::*;
//!
//! let orchestrator = Orchestrator::new(
//!     Config::new(Dialect::Postgres).uri("postgres://localhost/app"),
//! );
//! let statements = orchestrator.plan_file(Path::new("users.yaml")).await?;
//! orchestrator.apply(&statements).await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show the statements for one table
//! oxide-schema --driver postgres --uri postgres://localhost/app plan --spec-file users.yaml
//!
//! # Save them, review, then apply
//! oxide-schema plan --spec-file users.yaml --out users.sql
//! oxide-schema apply --ddl users.sql
//!
//! # Describe the live database as documents
//! oxide-schema generate --output-dir schemas/
//! ```

pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod generate;
pub mod introspect;
pub mod operations;
pub mod orchestrator;
pub mod planner;
pub mod schema;
pub mod spec;
pub mod statements;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::connection::{Connection, SchemaConnection, Session};
    pub use crate::dialect::{Dialect, MigrationDialect, MysqlDialect, PostgresDialect};
    pub use crate::error::{Result, SchemaError};
    pub use crate::executor::{Execute, StatementExecutor};
    pub use crate::generate::{
        Manifest, collect_specs, fixture_statements, render_document_stream, table_document,
        write_documents,
    };
    pub use crate::introspect::Introspector;
    pub use crate::operations::MigrationOperation;
    pub use crate::orchestrator::{Orchestrator, plan_table_spec, render_statements};
    pub use crate::planner::Planner;
    pub use crate::schema::{
        Column, ColumnConstraints, ForeignKey, ForeignKeyAction, Index, PrimaryKeyConstraint,
        TableModel,
    };
    pub use crate::spec::{
        SqlTableSchema, TableDocument, TableSchema, TableSpec, parse_table_spec, read_table_spec,
    };
    pub use crate::statements::{
        parse_statement_file, read_statement_file, render_statement_file, write_statement_file,
    };
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn test_prelude_plans_and_renders() {
        let desired = TableModel::new("tags")
            .column(Column::new("id", "bigint").not_null())
            .primary_key(PrimaryKeyConstraint::new(vec!["id".to_string()]));

        let ops = Planner::new(Dialect::Mysql).plan_table(&desired, None);
        let statements = render_statements(Dialect::Mysql, &ops);
        assert_eq!(
            statements,
            vec!["CREATE TABLE `tags` (`id` bigint NOT NULL, PRIMARY KEY (`id`))".to_string()]
        );
    }
}
