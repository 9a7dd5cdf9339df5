//! Planned schema changes.
//!
//! The planner emits these in execution order; each one renders to exactly
//! one SQL statement through a [`MigrationDialect`](crate::dialect::MigrationDialect).

use std::fmt;

use crate::schema::{Column, ForeignKey, Index, PrimaryKeyConstraint};

/// A single planned change to one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOperation {
    /// Create a table that does not exist yet.
    CreateTable {
        /// Table name.
        table: String,
        /// Column definitions.
        columns: Vec<Column>,
        /// Primary key, if any.
        primary_key: Option<PrimaryKeyConstraint>,
        /// Foreign keys declared inline.
        foreign_keys: Vec<ForeignKey>,
    },

    /// Add a column to an existing table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: Column,
    },

    /// Redefine an existing column with the desired definition.
    ModifyColumn {
        /// Table name.
        table: String,
        /// Desired column definition.
        column: Column,
    },

    /// Drop a column that is no longer desired.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column_name: String,
    },

    /// Create an index.
    CreateIndex {
        /// Table name.
        table: String,
        /// Index definition.
        index: Index,
    },

    /// Drop an index.
    DropIndex {
        /// Table name (needed by MySQL).
        table: String,
        /// Index name.
        name: String,
    },

    /// Add a foreign key constraint.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Foreign key definition.
        foreign_key: ForeignKey,
    },

    /// Drop a foreign key constraint.
    DropForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Add a primary key to a table without one.
    AddPrimaryKey {
        /// Table name.
        table: String,
        /// Key definition.
        primary_key: PrimaryKeyConstraint,
    },

    /// Drop the primary key.
    DropPrimaryKey {
        /// Table name.
        table: String,
        /// Constraint name, when the catalog reported one.
        name: Option<String>,
    },
}

impl MigrationOperation {
    /// Creates an AddColumn operation.
    #[must_use]
    pub fn add_column(table: impl Into<String>, column: Column) -> Self {
        Self::AddColumn {
            table: table.into(),
            column,
        }
    }

    /// Creates a ModifyColumn operation.
    #[must_use]
    pub fn modify_column(table: impl Into<String>, column: Column) -> Self {
        Self::ModifyColumn {
            table: table.into(),
            column,
        }
    }

    /// Creates a DropColumn operation.
    #[must_use]
    pub fn drop_column(table: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self::DropColumn {
            table: table.into(),
            column_name: column_name.into(),
        }
    }

    /// Creates a CreateIndex operation.
    #[must_use]
    pub fn create_index(table: impl Into<String>, index: Index) -> Self {
        Self::CreateIndex {
            table: table.into(),
            index,
        }
    }

    /// Creates a DropIndex operation.
    #[must_use]
    pub fn drop_index(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DropIndex {
            table: table.into(),
            name: name.into(),
        }
    }

    /// Creates an AddForeignKey operation.
    #[must_use]
    pub fn add_foreign_key(table: impl Into<String>, foreign_key: ForeignKey) -> Self {
        Self::AddForeignKey {
            table: table.into(),
            foreign_key,
        }
    }

    /// Creates a DropForeignKey operation.
    #[must_use]
    pub fn drop_foreign_key(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DropForeignKey {
            table: table.into(),
            name: name.into(),
        }
    }

    /// Returns the table this operation targets.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table, .. }
            | Self::AddColumn { table, .. }
            | Self::ModifyColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::DropForeignKey { table, .. }
            | Self::AddPrimaryKey { table, .. }
            | Self::DropPrimaryKey { table, .. } => table,
        }
    }

    /// Returns whether the operation can discard data.
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(self, Self::DropColumn { .. })
    }
}

impl fmt::Display for MigrationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { table, columns, .. } => {
                write!(f, "create table {table} ({} columns)", columns.len())
            }
            Self::AddColumn { table, column } => write!(f, "add column {table}.{}", column.name),
            Self::ModifyColumn { table, column } => {
                write!(f, "modify column {table}.{}", column.name)
            }
            Self::DropColumn { table, column_name } => {
                write!(f, "drop column {table}.{column_name}")
            }
            Self::CreateIndex { table, index } => {
                write!(f, "create index {} on {table}", index.name)
            }
            Self::DropIndex { table, name } => write!(f, "drop index {name} on {table}"),
            Self::AddForeignKey { table, foreign_key } => {
                write!(f, "add foreign key {} on {table}", foreign_key.name)
            }
            Self::DropForeignKey { table, name } => {
                write!(f, "drop foreign key {name} on {table}")
            }
            Self::AddPrimaryKey { table, .. } => write!(f, "add primary key on {table}"),
            Self::DropPrimaryKey { table, .. } => write!(f, "drop primary key on {table}"),
        }
    }
}
