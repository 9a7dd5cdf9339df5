//! Statement executor.
//!
//! Runs planned statements one after another on a single session and stops
//! at the first failure. Statements already executed stay applied; there is
//! no rollback.

use tracing::{debug, info, warn};

use crate::connection::Session;
use crate::error::{Result, SchemaError};

/// Something that can run one SQL statement.
#[allow(async_fn_in_trait)]
pub trait Execute {
    /// Runs `sql`.
    async fn execute(&mut self, sql: &str) -> std::result::Result<(), sqlx::Error>;
}

impl Execute for Session {
    // DDL goes over the simple query protocol; MySQL cannot prepare every
    // ALTER form.
    async fn execute(&mut self, sql: &str) -> std::result::Result<(), sqlx::Error> {
        match self {
            Self::Postgres(conn) => {
                sqlx::raw_sql(sql).execute(&mut **conn).await?;
            }
            Self::Mysql(conn) => {
                sqlx::raw_sql(sql).execute(&mut **conn).await?;
            }
        }
        Ok(())
    }
}

/// Applies statement lists to one target.
pub struct StatementExecutor<E: Execute> {
    target: E,
}

impl<E: Execute> StatementExecutor<E> {
    /// Creates an executor over `target`.
    pub fn new(target: E) -> Self {
        Self { target }
    }

    /// Executes `statements` in order and returns how many ran.
    ///
    /// The first failure aborts the remaining statements and is reported with
    /// its position and text.
    pub async fn apply(&mut self, statements: &[String]) -> Result<usize> {
        info!(count = statements.len(), "Applying statements");

        for (index, statement) in statements.iter().enumerate() {
            debug!(sql = %statement, "Executing SQL");
            if let Err(source) = self.target.execute(statement).await {
                warn!(
                    index,
                    sql = %statement,
                    error = %source,
                    skipped = statements.len() - index - 1,
                    "Statement failed, stopping"
                );
                return Err(SchemaError::Execution {
                    index,
                    statement: statement.clone(),
                    source,
                });
            }
        }

        info!(count = statements.len(), "Statements applied successfully");
        Ok(statements.len())
    }

    /// Returns the target, for inspection after a run.
    pub fn into_inner(self) -> E {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        executed: Vec<String>,
        fail_on: Option<usize>,
    }

    impl Execute for Recorder {
        async fn execute(&mut self, sql: &str) -> std::result::Result<(), sqlx::Error> {
            if self.fail_on == Some(self.executed.len()) {
                return Err(sqlx::Error::Protocol(format!("rejected: {sql}")));
            }
            self.executed.push(sql.to_string());
            Ok(())
        }
    }

    fn statements() -> Vec<String> {
        vec![
            "ALTER TABLE a ADD COLUMN x int".to_string(),
            "ALTER TABLE a ADD COLUMN y int".to_string(),
            "ALTER TABLE a ADD COLUMN z int".to_string(),
        ]
    }

    #[tokio::test]
    async fn test_apply_runs_in_order() {
        let mut executor = StatementExecutor::new(Recorder::default());
        let count = executor.apply(&statements()).await.unwrap();

        assert_eq!(count, 3);
        assert_eq!(executor.into_inner().executed, statements());
    }

    #[tokio::test]
    async fn test_apply_stops_at_first_failure() {
        let mut executor = StatementExecutor::new(Recorder {
            fail_on: Some(1),
            ..Recorder::default()
        });

        let err = executor.apply(&statements()).await.unwrap_err();
        match err {
            SchemaError::Execution {
                index, statement, ..
            } => {
                assert_eq!(index, 1);
                assert_eq!(statement, "ALTER TABLE a ADD COLUMN y int");
            }
            other => panic!("expected execution error, got {other:?}"),
        }

        // Nothing after the failing statement ran.
        assert_eq!(
            executor.into_inner().executed,
            vec!["ALTER TABLE a ADD COLUMN x int".to_string()]
        );
    }

    #[tokio::test]
    async fn test_apply_empty() {
        let mut executor = StatementExecutor::new(Recorder::default());
        assert_eq!(executor.apply(&[]).await.unwrap(), 0);
    }
}
