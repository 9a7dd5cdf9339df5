//! Entry points tying parsing, introspection, planning and execution
//! together: plan, apply, generate and fixtures.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Config;
use crate::connection::{Connection, SchemaConnection};
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};
use crate::executor::StatementExecutor;
use crate::generate::{FIXTURES_FILE, collect_specs, fixture_statements, table_document};
use crate::introspect::Introspector;
use crate::operations::MigrationOperation;
use crate::planner::Planner;
use crate::spec::{TableDocument, TableSpec, read_table_spec};
use crate::statements::write_statement_file;

/// Plans the operations that bring the live table described by `spec` into
/// line with it.
///
/// A specification without a payload for `dialect` plans to nothing.
pub async fn plan_table_spec<C: SchemaConnection>(
    connection: &C,
    dialect: Dialect,
    spec: &TableSpec,
) -> Result<Vec<MigrationOperation>> {
    let Some(desired) = spec.to_table_model(dialect) else {
        info!(table = %spec.name, driver = %dialect, "No schema for this driver, nothing to plan");
        return Ok(Vec::new());
    };

    let actual = Introspector::new(connection)
        .introspect_table(&desired.name)
        .await?;
    let operations = Planner::new(dialect).plan_table(&desired, actual.as_ref());

    info!(table = %desired.name, operations = operations.len(), "Planned table");
    Ok(operations)
}

/// Renders operations as statements for `dialect`.
#[must_use]
pub fn render_statements(dialect: Dialect, operations: &[MigrationOperation]) -> Vec<String> {
    operations.iter().map(|op| dialect.generate_sql(op)).collect()
}

/// Runs plan, apply, generate and fixtures against one configured target.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: Config,
}

impl Orchestrator {
    /// Creates an orchestrator for `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolves the URI and opens a pool.
    pub async fn connect(&self) -> Result<Connection> {
        let uri = self.config.resolve_uri()?;
        Connection::connect(self.config.dialect, &uri).await
    }

    /// Plans the specification document at `path` and returns the
    /// statements.
    pub async fn plan_file(&self, path: &Path) -> Result<Vec<String>> {
        let spec = read_table_spec(path)?;
        if spec.payload_for(self.config.dialect).is_none() {
            info!(path = %path.display(), "No schema for this driver, nothing to plan");
            return Ok(Vec::new());
        }

        let connection = self.connect().await?;
        let statements = self.plan_spec(&connection, &spec).await;
        connection.close().await;
        statements
    }

    /// Plans `spec` against `connection` and returns the statements.
    pub async fn plan_spec<C: SchemaConnection>(
        &self,
        connection: &C,
        spec: &TableSpec,
    ) -> Result<Vec<String>> {
        let operations = plan_table_spec(connection, self.config.dialect, spec).await?;
        Ok(render_statements(self.config.dialect, &operations))
    }

    /// Executes `statements` in order on one session, stopping at the first
    /// failure.
    pub async fn apply(&self, statements: &[String]) -> Result<usize> {
        if statements.is_empty() {
            info!("No statements to apply");
            return Ok(0);
        }

        let connection = self.connect().await?;
        let result = match connection.session().await {
            Ok(session) => StatementExecutor::new(session).apply(statements).await,
            Err(e) => Err(e),
        };
        connection.close().await;
        result
    }

    /// Introspects every table and describes each as a `Table` document.
    pub async fn generate(&self) -> Result<Vec<TableDocument>> {
        let connection = self.connect().await?;
        let documents = self.generate_from(&connection).await;
        connection.close().await;
        documents
    }

    /// Describes every table reachable through `connection`.
    pub async fn generate_from<C: SchemaConnection>(
        &self,
        connection: &C,
    ) -> Result<Vec<TableDocument>> {
        let tables = Introspector::new(connection).introspect_database().await?;
        let database = connection.database_name();
        Ok(tables
            .iter()
            .map(|table| table_document(table, self.config.dialect, database))
            .collect())
    }

    /// Renders fixture statements for the documents under `input_dir` into
    /// `output_dir/fixtures.sql`, returning the written path.
    pub fn fixtures(&self, input_dir: &Path, output_dir: &Path) -> Result<PathBuf> {
        let specs: Vec<TableSpec> = collect_specs(input_dir)?
            .into_iter()
            .map(|(_, spec)| spec)
            .collect();
        let statements = fixture_statements(&specs, self.config.dialect);

        std::fs::create_dir_all(output_dir).map_err(|e| SchemaError::io(output_dir, e))?;
        let path = output_dir.join(FIXTURES_FILE);
        write_statement_file(&path, &statements)?;

        info!(
            path = %path.display(),
            tables = specs.len(),
            statements = statements.len(),
            "Wrote fixtures"
        );
        Ok(path)
    }
}
