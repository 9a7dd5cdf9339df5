//! PostgreSQL dialect, also used for CockroachDB.
//!
//! PostgreSQL can change a column's type, nullability and default in one
//! `ALTER TABLE` with several `ALTER COLUMN` actions, and names every
//! constraint, so drops always go through `DROP CONSTRAINT`.

use crate::schema::Column;

use super::{MigrationDialect, TypeName, default_values_equal};

/// PostgreSQL migration dialect.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Maps short or internal type names to the spelling the catalog reports.
fn canonical_base(base: &str) -> &str {
    match base {
        "varchar" => "character varying",
        "char" | "bpchar" => "character",
        "int" | "int4" | "serial" | "serial4" => "integer",
        "int2" | "smallserial" | "serial2" => "smallint",
        "int8" | "bigserial" | "serial8" => "bigint",
        "bool" => "boolean",
        "decimal" => "numeric",
        "float8" | "double" => "double precision",
        "float4" => "real",
        "timestamp" => "timestamp without time zone",
        "timestamptz" => "timestamp with time zone",
        "time" => "time without time zone",
        "timetz" => "time with time zone",
        "varbit" => "bit varying",
        other => other,
    }
}

/// Storage type behind a `serial` pseudo-type, which only exists in
/// `CREATE TABLE` and `ADD COLUMN`.
fn serial_storage(data_type: &str) -> Option<&'static str> {
    match TypeName::parse(data_type).base.as_str() {
        "serial" | "serial4" => Some("integer"),
        "smallserial" | "serial2" => Some("smallint"),
        "bigserial" | "serial8" => Some("bigint"),
        _ => None,
    }
}

impl MigrationDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    // Time types default to precision 6.
    fn normalize_type(&self, data_type: &str) -> String {
        let parsed = TypeName::parse(data_type);
        let base = canonical_base(&parsed.base).to_string();
        let keeps_params = match base.as_str() {
            "character" | "character varying" | "bit" | "bit varying" | "numeric" => true,
            "timestamp without time zone"
            | "timestamp with time zone"
            | "time without time zone"
            | "time with time zone"
            | "interval" => parsed.params.as_deref() != Some("6"),
            _ => false,
        };
        let normalized = TypeName {
            base,
            params: parsed.params,
        };
        match normalized.params {
            None if normalized.base == "character" => "character(1)".to_string(),
            _ => normalized.render(keeps_params),
        }
    }

    // A serial column owns a sequence default the document never spells out.
    fn defaults_match(&self, desired: &Column, existing: &Column) -> bool {
        if desired.default.is_none() && serial_storage(&desired.data_type).is_some() {
            return existing
                .default
                .as_deref()
                .map_or(true, |d| d.trim_start().starts_with("nextval("));
        }
        default_values_equal(desired.default.as_deref(), existing.default.as_deref())
    }

    fn modify_column_sql(&self, table: &str, column: &Column) -> String {
        let name = self.quote_identifier(&column.name);
        let serial = serial_storage(&column.data_type);
        let data_type = serial.map_or_else(|| self.column_type(column), str::to_string);
        let mut actions = vec![format!("ALTER COLUMN {name} TYPE {data_type}")];

        match column.not_null_flag() {
            Some(true) => actions.push(format!("ALTER COLUMN {name} SET NOT NULL")),
            Some(false) => actions.push(format!("ALTER COLUMN {name} DROP NOT NULL")),
            None => {}
        }

        match (&column.default, serial) {
            (Some(default), _) => actions.push(format!(
                "ALTER COLUMN {name} SET DEFAULT {}",
                self.render_default(default)
            )),
            (None, Some(_)) => {}
            (None, None) => actions.push(format!("ALTER COLUMN {name} DROP DEFAULT")),
        }

        format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(table),
            actions.join(", ")
        )
    }

    fn drop_index_sql(&self, _table: &str, name: &str) -> String {
        format!("DROP INDEX {}", self.quote_identifier(name))
    }

    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(table),
            self.quote_identifier(name)
        )
    }

    fn drop_primary_key_sql(&self, table: &str, name: Option<&str>) -> String {
        let constraint = name.map_or_else(|| format!("{table}_pkey"), str::to_string);
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(table),
            self.quote_identifier(&constraint)
        )
    }
}
