//! Canonical, dialect-neutral table model.
//!
//! Both sides of a diff are expressed with these types: the desired table
//! (converted from a specification document) and the actual table (read from
//! the live catalog by the introspector). Values are built fresh for every
//! planning cycle and never mutated into one another.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Column-level constraints.
///
/// `not_null` is tri-state: `None` and `Some(false)` both mean the column is
/// nullable, only `Some(true)` means NOT NULL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnConstraints {
    /// NOT NULL requirement.
    pub not_null: Option<bool>,
}

impl ColumnConstraints {
    /// Constraints asserting NOT NULL.
    #[must_use]
    pub const fn not_null() -> Self {
        Self {
            not_null: Some(true),
        }
    }

    /// Constraints explicitly allowing NULL.
    #[must_use]
    pub const fn nullable() -> Self {
        Self {
            not_null: Some(false),
        }
    }

    /// Returns whether these constraints require NOT NULL.
    #[must_use]
    pub fn is_not_null(&self) -> bool {
        self.not_null.unwrap_or(false)
    }
}

/// Compares two NOT NULL flags under the tri-state rule.
///
/// Absent and `false` are equivalent; only `true` asserts NOT NULL.
#[must_use]
pub fn not_null_constraint_equals(a: Option<bool>, b: Option<bool>) -> bool {
    a.unwrap_or(false) == b.unwrap_or(false)
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name, unique within its table.
    pub name: String,
    /// Dialect-native type name, including any length or precision suffix
    /// but excluding the array suffix.
    pub data_type: String,
    /// Raw default literal, if the column has one.
    pub default: Option<String>,
    /// Column constraints, if any were declared or reported.
    pub constraints: Option<ColumnConstraints>,
    /// Whether the column holds an array of `data_type`.
    pub is_array: bool,
}

impl Column {
    /// Creates a nullable column without default.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            default: None,
            constraints: None,
            is_array: false,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(self) -> Self {
        self.with_not_null(Some(true))
    }

    /// Marks the column explicitly nullable.
    #[must_use]
    pub fn nullable(self) -> Self {
        self.with_not_null(Some(false))
    }

    /// Replaces the NOT NULL flag, keeping any other constraint state.
    #[must_use]
    pub fn with_not_null(mut self, not_null: Option<bool>) -> Self {
        self.constraints = Some(ColumnConstraints { not_null });
        self
    }

    /// Sets the raw default literal.
    #[must_use]
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Marks the column as an array column.
    #[must_use]
    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    /// Returns the raw NOT NULL flag.
    #[must_use]
    pub fn not_null_flag(&self) -> Option<bool> {
        self.constraints.and_then(|c| c.not_null)
    }

    /// Returns whether the column is NOT NULL under the tri-state rule.
    #[must_use]
    pub fn is_not_null(&self) -> bool {
        self.not_null_flag().unwrap_or(false)
    }
}

/// Foreign key delete rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete to referencing rows.
    Cascade,
    /// Set the referencing columns to NULL.
    SetNull,
    /// Set the referencing columns to their defaults.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

impl fmt::Display for ForeignKeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for ForeignKeyAction {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace(['_', '-'], " ").to_ascii_uppercase();
        match normalized.split_whitespace().collect::<Vec<_>>().join(" ").as_str() {
            "NO ACTION" => Ok(Self::NoAction),
            "RESTRICT" => Ok(Self::Restrict),
            "CASCADE" => Ok(Self::Cascade),
            "SET NULL" => Ok(Self::SetNull),
            "SET DEFAULT" => Ok(Self::SetDefault),
            _ => Err(SchemaError::InvalidSpec(format!(
                "unknown foreign key delete rule '{s}'"
            ))),
        }
    }
}

impl TryFrom<String> for ForeignKeyAction {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ForeignKeyAction> for String {
    fn from(action: ForeignKeyAction) -> Self {
        action.as_sql().to_string()
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Referencing columns in this table.
    pub child_columns: Vec<String>,
    /// Referenced table.
    pub parent_table: String,
    /// Referenced columns, paired by position with `child_columns`.
    pub parent_columns: Vec<String>,
    /// Delete rule.
    pub on_delete: ForeignKeyAction,
}

impl ForeignKey {
    /// Creates a single-column foreign key with `NO ACTION` delete rule.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        child_column: impl Into<String>,
        parent_table: impl Into<String>,
        parent_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            child_columns: vec![child_column.into()],
            parent_table: parent_table.into(),
            parent_columns: vec![parent_column.into()],
            on_delete: ForeignKeyAction::NoAction,
        }
    }

    /// Appends another child/parent column pair.
    #[must_use]
    pub fn column_pair(mut self, child: impl Into<String>, parent: impl Into<String>) -> Self {
        self.child_columns.push(child.into());
        self.parent_columns.push(parent.into());
        self
    }

    /// Sets the delete rule.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }
}

/// A secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Indexed columns, in index order.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    pub unique: bool,
}

impl Index {
    /// Creates a non-unique index.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
        }
    }

    /// Marks the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A primary key constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyConstraint {
    /// Constraint name, when known.
    pub name: Option<String>,
    /// Key columns in key order.
    pub columns: Vec<String>,
}

impl PrimaryKeyConstraint {
    /// Creates an unnamed primary key over `columns`.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            name: None,
            columns,
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns whether `column` is part of the key.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// One table in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableModel {
    /// Table name.
    pub name: String,
    /// Columns in declaration (or ordinal) order.
    pub columns: Vec<Column>,
    /// Primary key, if the table has one.
    pub primary_key: Option<PrimaryKeyConstraint>,
    /// Secondary indexes, excluding key-backed ones.
    pub indexes: Vec<Index>,
    /// Foreign keys.
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableModel {
    /// Creates an empty table model.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the primary key.
    #[must_use]
    pub fn primary_key(mut self, primary_key: PrimaryKeyConstraint) -> Self {
        self.primary_key = Some(primary_key);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the primary key columns, empty when there is no key.
    #[must_use]
    pub fn primary_key_columns(&self) -> &[String] {
        self.primary_key
            .as_ref()
            .map(|pk| pk.columns.as_slice())
            .unwrap_or(&[])
    }

    /// Returns whether `column` is part of the primary key.
    #[must_use]
    pub fn is_primary_key_column(&self, column: &str) -> bool {
        self.primary_key
            .as_ref()
            .is_some_and(|pk| pk.contains(column))
    }
}
