//! Declarative table specification documents.
//!
//! A specification is either wrapped in a `Table` resource envelope:
//!
//! ```yaml
//! apiVersion: schemas.oxide-sql.dev/v1alpha1
//! kind: Table
//! metadata:
//!   name: users
//! spec:
//!   database: app
//!   name: users
//!   schema:
//!     postgres:
//!       primaryKey: [id]
//!       columns:
//!         - name: id
//!           type: integer
//! ```
//!
//! or given bare, as the `spec` mapping alone. [`parse_table_spec`] accepts
//! both.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};
use crate::schema::{
    Column, ColumnConstraints, ForeignKey, ForeignKeyAction, Index, PrimaryKeyConstraint,
    TableModel,
};

/// API version written into generated documents.
pub const API_VERSION: &str = "schemas.oxide-sql.dev/v1alpha1";

/// Resource kind of a table document.
pub const TABLE_KIND: &str = "Table";

/// A `Table` resource: envelope plus specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDocument {
    /// Always [`API_VERSION`] for generated documents.
    pub api_version: String,
    /// Always [`TABLE_KIND`].
    pub kind: String,
    /// Resource metadata.
    pub metadata: ObjectMeta,
    /// The table specification.
    pub spec: TableSpec,
}

impl TableDocument {
    /// Wraps a specification in an envelope named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, spec: TableSpec) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: TABLE_KIND.to_string(),
            metadata: ObjectMeta { name: name.into() },
            spec,
        }
    }
}

/// Resource metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Resource name.
    pub name: String,
}

/// Desired state of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpecShape", into = "SpecShape")]
pub struct TableSpec {
    /// Database (or schema) the table lives in.
    pub database: String,
    /// Table name.
    pub name: String,
    /// Tables that should exist before this one. Not ordered by the planner.
    pub requires: Vec<String>,
    /// Dialect-tagged column layout; `None` means nothing to plan.
    pub schema: Option<TableSchema>,
}

impl TableSpec {
    /// Creates a specification without a schema payload.
    #[must_use]
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
            requires: Vec::new(),
            schema: None,
        }
    }

    /// Sets the schema payload.
    #[must_use]
    pub fn schema(mut self, schema: TableSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Returns the payload for `dialect`, if the document carries one.
    #[must_use]
    pub fn payload_for(&self, dialect: Dialect) -> Option<&SqlTableSchema> {
        self.schema
            .as_ref()
            .and_then(|schema| schema.payload_for(dialect))
    }

    /// Converts the payload for `dialect` into the canonical model.
    #[must_use]
    pub fn to_table_model(&self, dialect: Dialect) -> Option<TableModel> {
        self.payload_for(dialect)
            .map(|payload| payload.to_table_model(&self.name))
    }
}

/// A schema payload tagged with the dialect it targets.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSchema {
    /// PostgreSQL layout.
    Postgres(SqlTableSchema),
    /// MySQL layout.
    Mysql(SqlTableSchema),
    /// CockroachDB layout.
    CockroachDb(SqlTableSchema),
}

impl TableSchema {
    /// Tags `payload` with `dialect`.
    #[must_use]
    pub fn new(dialect: Dialect, payload: SqlTableSchema) -> Self {
        match dialect {
            Dialect::Postgres => Self::Postgres(payload),
            Dialect::Mysql => Self::Mysql(payload),
            Dialect::CockroachDb => Self::CockroachDb(payload),
        }
    }

    /// Returns the dialect this payload targets.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        match self {
            Self::Postgres(_) => Dialect::Postgres,
            Self::Mysql(_) => Dialect::Mysql,
            Self::CockroachDb(_) => Dialect::CockroachDb,
        }
    }

    /// Returns the payload regardless of dialect.
    #[must_use]
    pub const fn payload(&self) -> &SqlTableSchema {
        match self {
            Self::Postgres(p) | Self::Mysql(p) | Self::CockroachDb(p) => p,
        }
    }

    /// Returns the payload only when it targets exactly `dialect`.
    #[must_use]
    pub fn payload_for(&self, dialect: Dialect) -> Option<&SqlTableSchema> {
        (self.dialect() == dialect).then(|| self.payload())
    }
}

/// Column layout of a SQL table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlTableSchema {
    /// Primary key columns in key order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    /// Columns in declaration order.
    #[serde(default)]
    pub columns: Vec<SqlTableColumn>,
    /// Foreign keys.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<SqlTableForeignKey>,
    /// Secondary indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<SqlTableIndex>,
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlTableColumn {
    /// Column name.
    pub name: String,
    /// Type as written, with a `[]` suffix for arrays.
    #[serde(rename = "type")]
    pub column_type: String,
    /// Declared constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<SqlTableColumnConstraints>,
    /// Raw default. Scalars of any YAML type are accepted and kept as text.
    #[serde(
        default,
        deserialize_with = "deserialize_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<String>,
}

impl SqlTableColumn {
    /// Creates a column without constraints or default.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            constraints: None,
            default: None,
        }
    }
}

/// Declared column constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlTableColumnConstraints {
    /// NOT NULL flag; absent means nullable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_null: Option<bool>,
}

/// A declared index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlTableIndex {
    /// Indexed columns in order.
    pub columns: Vec<String>,
    /// Index name; generated from table and columns when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the index is unique.
    #[serde(default)]
    pub is_unique: bool,
}

/// A declared foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlTableForeignKey {
    /// Referencing columns.
    pub columns: Vec<String>,
    /// Referenced table and columns.
    pub references: ForeignKeyReferences,
    /// Constraint name; generated from table and columns when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Delete rule; absent means `NO ACTION`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ForeignKeyAction>,
}

/// Target of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyReferences {
    /// Referenced table.
    pub table: String,
    /// Referenced columns, paired by position with the referencing ones.
    pub columns: Vec<String>,
}

/// Default index name for `columns` on `table`.
#[must_use]
pub fn index_name(table: &str, columns: &[String]) -> String {
    format!("idx_{table}_{}", columns.join("_"))
}

/// Default foreign key name for `columns` on `table`.
#[must_use]
pub fn foreign_key_name(table: &str, columns: &[String]) -> String {
    format!("{table}_{}_fkey", columns.join("_"))
}

impl SqlTableSchema {
    /// Converts this layout into the canonical model for `table`.
    ///
    /// Types keep their declared spelling, a `[]` suffix becomes the array
    /// flag, and missing index and foreign key names are generated.
    #[must_use]
    pub fn to_table_model(&self, table: &str) -> TableModel {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let declared = c.column_type.trim();
                let (element, is_array) = match declared.strip_suffix("[]") {
                    Some(element) => (element, true),
                    None => (declared, false),
                };
                Column {
                    name: c.name.clone(),
                    data_type: element.trim_end().to_string(),
                    default: c.default.clone(),
                    constraints: c.constraints.map(|k| ColumnConstraints {
                        not_null: k.not_null,
                    }),
                    is_array,
                }
            })
            .collect();

        let indexes = self
            .indexes
            .iter()
            .map(|i| Index {
                name: i
                    .name
                    .clone()
                    .unwrap_or_else(|| index_name(table, &i.columns)),
                columns: i.columns.clone(),
                unique: i.is_unique,
            })
            .collect();

        let foreign_keys = self
            .foreign_keys
            .iter()
            .map(|fk| ForeignKey {
                name: fk
                    .name
                    .clone()
                    .unwrap_or_else(|| foreign_key_name(table, &fk.columns)),
                child_columns: fk.columns.clone(),
                parent_table: fk.references.table.clone(),
                parent_columns: fk.references.columns.clone(),
                on_delete: fk.on_delete.unwrap_or_default(),
            })
            .collect();

        TableModel {
            name: table.to_string(),
            columns,
            primary_key: (!self.primary_key.is_empty())
                .then(|| PrimaryKeyConstraint::new(self.primary_key.clone())),
            indexes,
            foreign_keys,
        }
    }

    /// Builds a layout describing an introspected table.
    ///
    /// Only a NOT NULL flag is written as a constraint; nullable columns carry
    /// no constraints block.
    #[must_use]
    pub fn from_table_model(table: &TableModel) -> Self {
        let columns = table
            .columns
            .iter()
            .map(|c| SqlTableColumn {
                name: c.name.clone(),
                column_type: if c.is_array {
                    format!("{}[]", c.data_type)
                } else {
                    c.data_type.clone()
                },
                constraints: c.is_not_null().then_some(SqlTableColumnConstraints {
                    not_null: Some(true),
                }),
                default: c.default.clone(),
            })
            .collect();

        Self {
            primary_key: table.primary_key_columns().to_vec(),
            columns,
            foreign_keys: table
                .foreign_keys
                .iter()
                .map(|fk| SqlTableForeignKey {
                    columns: fk.child_columns.clone(),
                    references: ForeignKeyReferences {
                        table: fk.parent_table.clone(),
                        columns: fk.parent_columns.clone(),
                    },
                    name: Some(fk.name.clone()),
                    on_delete: Some(fk.on_delete),
                })
                .collect(),
            indexes: table
                .indexes
                .iter()
                .map(|i| SqlTableIndex {
                    columns: i.columns.clone(),
                    name: Some(i.name.clone()),
                    is_unique: i.unique,
                })
                .collect(),
        }
    }
}

/// Parses a table document, enveloped or bare.
///
/// The enveloped form is tried first. When both forms fail, the error of the
/// bare attempt is returned, tagged with `path`.
pub fn parse_table_spec(contents: &str, path: &Path) -> Result<TableSpec> {
    let shape = match serde_yaml::from_str::<DocumentShape>(contents) {
        Ok(document) => document.spec,
        Err(error) => {
            debug!(path = %path.display(), %error, "Not an enveloped document, trying bare form");
            serde_yaml::from_str::<SpecShape>(contents).map_err(|source| SchemaError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        }
    };
    TableSpec::try_from(shape)
}

/// Reads and parses the table document at `path`.
pub fn read_table_spec(path: &Path) -> Result<TableSpec> {
    let contents = std::fs::read_to_string(path).map_err(|e| SchemaError::io(path, e))?;
    parse_table_spec(&contents, path)
}

// Wire shapes. Deserializing into these first lets a document with zero or
// several dialect payloads surface as `InvalidSpec` rather than a YAML error.

#[derive(Deserialize)]
struct DocumentShape {
    spec: SpecShape,
}

#[derive(Serialize, Deserialize)]
struct SpecShape {
    #[serde(default)]
    database: String,
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    requires: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema: Option<SchemaPayloads>,
}

#[derive(Default, Serialize, Deserialize)]
struct SchemaPayloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    postgres: Option<SqlTableSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mysql: Option<SqlTableSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cockroachdb: Option<SqlTableSchema>,
}

impl TryFrom<SpecShape> for TableSpec {
    type Error = SchemaError;

    fn try_from(shape: SpecShape) -> Result<Self> {
        let schema = match shape.schema {
            None => None,
            Some(payloads) => Some(TableSchema::try_from(payloads).map_err(|e| match e {
                SchemaError::InvalidSpec(msg) => {
                    SchemaError::InvalidSpec(format!("table '{}': {msg}", shape.name))
                }
                other => other,
            })?),
        };
        Ok(Self {
            database: shape.database,
            name: shape.name,
            requires: shape.requires,
            schema,
        })
    }
}

impl From<TableSpec> for SpecShape {
    fn from(spec: TableSpec) -> Self {
        Self {
            database: spec.database,
            name: spec.name,
            requires: spec.requires,
            schema: spec.schema.map(SchemaPayloads::from),
        }
    }
}

impl TryFrom<SchemaPayloads> for TableSchema {
    type Error = SchemaError;

    fn try_from(payloads: SchemaPayloads) -> Result<Self> {
        match (payloads.postgres, payloads.mysql, payloads.cockroachdb) {
            (Some(p), None, None) => Ok(Self::Postgres(p)),
            (None, Some(p), None) => Ok(Self::Mysql(p)),
            (None, None, Some(p)) => Ok(Self::CockroachDb(p)),
            (None, None, None) => Err(SchemaError::InvalidSpec(
                "schema has no postgres, mysql or cockroachdb payload".to_string(),
            )),
            _ => Err(SchemaError::InvalidSpec(
                "schema has more than one dialect payload".to_string(),
            )),
        }
    }
}

impl From<TableSchema> for SchemaPayloads {
    fn from(schema: TableSchema) -> Self {
        match schema {
            TableSchema::Postgres(p) => Self {
                postgres: Some(p),
                ..Self::default()
            },
            TableSchema::Mysql(p) => Self {
                mysql: Some(p),
                ..Self::default()
            },
            TableSchema::CockroachDb(p) => Self {
                cockroachdb: Some(p),
                ..Self::default()
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarDefault {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn deserialize_default<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<ScalarDefault>::deserialize(deserializer)?.map(|value| match value {
            ScalarDefault::Bool(b) => b.to_string(),
            ScalarDefault::Int(i) => i.to_string(),
            ScalarDefault::Float(f) => f.to_string(),
            ScalarDefault::Text(s) => s,
        }),
    )
}
