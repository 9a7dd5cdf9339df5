//! MySQL dialect.
//!
//! MySQL redefines a column as a whole with `MODIFY COLUMN`, drops indexes
//! per table and uses dedicated `DROP FOREIGN KEY` / `DROP PRIMARY KEY`
//! clauses.

use crate::schema::Column;

use super::{MigrationDialect, TypeName};

/// MySQL migration dialect.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn canonical_base(base: &str) -> &str {
    match base {
        "integer" => "int",
        "bool" | "boolean" => "tinyint",
        "dec" | "fixed" | "numeric" => "decimal",
        "double precision" | "real" => "double",
        "character varying" => "varchar",
        "character" => "char",
        other => other,
    }
}

impl MigrationDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    // Integer display widths are cosmetic and dropped; `zerofill` implies
    // `unsigned`, `signed` is the default.
    fn normalize_type(&self, data_type: &str) -> String {
        let parsed = TypeName::parse(data_type);
        let (modifiers, words): (Vec<&str>, Vec<&str>) = parsed
            .base
            .split_whitespace()
            .partition(|w| matches!(*w, "unsigned" | "signed" | "zerofill"));
        let base = canonical_base(&words.join(" ")).to_string();
        let zerofill = modifiers.contains(&"zerofill");
        let unsigned = zerofill || modifiers.contains(&"unsigned");

        let params = match (base.as_str(), parsed.params) {
            ("char" | "binary" | "bit", None) => Some("1".to_string()),
            ("decimal", None) => Some("10,0".to_string()),
            ("datetime" | "time" | "timestamp", Some(p)) if p == "0" => None,
            (_, params) => params,
        };
        let keeps_params = matches!(
            base.as_str(),
            "char"
                | "varchar"
                | "binary"
                | "varbinary"
                | "bit"
                | "decimal"
                | "float"
                | "double"
                | "datetime"
                | "time"
                | "timestamp"
                | "enum"
                | "set"
        );

        let mut normalized = TypeName { base, params }.render(keeps_params);
        if unsigned {
            normalized.push_str(" unsigned");
        }
        if zerofill {
            normalized.push_str(" zerofill");
        }
        normalized
    }

    fn modify_column_sql(&self, table: &str, column: &Column) -> String {
        let mut definition = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.column_type(column)
        );
        match column.not_null_flag() {
            Some(true) => definition.push_str(" NOT NULL"),
            Some(false) => definition.push_str(" NULL"),
            None => {}
        }
        if let Some(ref default) = column.default {
            definition.push_str(" DEFAULT ");
            definition.push_str(&self.render_default(default));
        }

        format!(
            "ALTER TABLE {} MODIFY COLUMN {definition}",
            self.quote_identifier(table)
        )
    }

    fn drop_index_sql(&self, table: &str, name: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(name),
            self.quote_identifier(table)
        )
    }

    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.quote_identifier(table),
            self.quote_identifier(name)
        )
    }

    fn drop_primary_key_sql(&self, table: &str, _name: Option<&str>) -> String {
        format!("ALTER TABLE {} DROP PRIMARY KEY", self.quote_identifier(table))
    }
}
