//! Compares a desired table with the live one and plans the changes.
//!
//! The planner never mutates either side. It walks the actual table's
//! columns (drop or modify), then the desired table's columns (add), and
//! matches indexes and foreign keys by name. The result is ordered so that
//! constraints referencing a column are dropped before the column changes
//! and recreated after:
//!
//! 1. drop foreign keys, drop indexes, drop the primary key
//! 2. modify columns, drop columns, add columns
//! 3. add the primary key, create indexes, add foreign keys

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::dialect::{Dialect, MigrationDialect};
use crate::operations::MigrationOperation;
use crate::schema::{Column, ForeignKey, Index, TableModel, not_null_constraint_equals};

/// Plans the operations that turn one table into another.
///
/// Column types and defaults are compared the way `dialect` spells them in
/// its catalog; the emitted operations keep the declared spelling.
#[derive(Debug, Clone, Copy)]
pub struct Planner {
    dialect: Dialect,
}

impl Planner {
    /// Creates a planner for `dialect`.
    #[must_use]
    pub const fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Returns the dialect columns are compared under.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns the operations that turn `actual` into `desired`.
    ///
    /// A missing `actual` table is created outright, with its indexes.
    #[must_use]
    pub fn plan_table(
        &self,
        desired: &TableModel,
        actual: Option<&TableModel>,
    ) -> Vec<MigrationOperation> {
        let operations = match actual {
            None => self.create_table(desired),
            Some(actual) => self.diff_table(desired, actual),
        };

        for op in &operations {
            debug!(operation = %op, "Planned");
        }
        operations
    }

    fn create_table(&self, desired: &TableModel) -> Vec<MigrationOperation> {
        let mut operations = vec![MigrationOperation::CreateTable {
            table: desired.name.clone(),
            columns: desired.columns.clone(),
            primary_key: desired.primary_key.clone(),
            foreign_keys: desired.foreign_keys.clone(),
        }];
        operations.extend(
            desired
                .indexes
                .iter()
                .map(|idx| MigrationOperation::create_index(&desired.name, idx.clone())),
        );
        operations
    }

    fn diff_table(&self, desired: &TableModel, actual: &TableModel) -> Vec<MigrationOperation> {
        let table = desired.name.as_str();
        let builder = self.dialect.builder();
        let desired_cols: HashMap<&str, &Column> = desired
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c))
            .collect();

        let mut modified = Vec::new();
        let mut dropped = Vec::new();
        for existing in &actual.columns {
            match desired_cols.get(existing.name.as_str()) {
                None => dropped.push(MigrationOperation::drop_column(table, &existing.name)),
                Some(&wanted) => {
                    let primary = desired.is_primary_key_column(&wanted.name);
                    if let Some(column) = alter_column(builder, wanted, existing, primary) {
                        modified.push(MigrationOperation::modify_column(table, column));
                    }
                }
            }
        }

        let mut added = Vec::new();
        for wanted in &desired.columns {
            if actual.get_column(&wanted.name).is_some() {
                continue;
            }
            let primary = desired.is_primary_key_column(&wanted.name);
            let column = emitted_column(wanted, primary);
            if column.is_not_null() && column.default.is_none() {
                warn!(
                    table = %table,
                    column = %column.name,
                    "Adding a NOT NULL column without a default fails on non-empty tables"
                );
            }
            added.push(MigrationOperation::add_column(table, column));
        }

        let (drop_indexes, create_indexes) = diff_indexes(table, &desired.indexes, &actual.indexes);
        let (drop_fks, add_fks) =
            diff_foreign_keys(table, &desired.foreign_keys, &actual.foreign_keys);
        let (drop_pk, add_pk) = diff_primary_key(desired, actual);

        let mut operations = drop_fks;
        operations.extend(drop_indexes);
        operations.extend(drop_pk);
        operations.extend(modified);
        operations.extend(dropped);
        operations.extend(added);
        operations.extend(add_pk);
        operations.extend(create_indexes);
        operations.extend(add_fks);
        operations
    }
}

/// Returns the column definition to emit when `existing` must change to
/// match `desired`, or `None` when they already match.
///
/// Primary key columns are compared as NOT NULL, since the key implies it.
#[must_use]
pub fn alter_column(
    builder: &dyn MigrationDialect,
    desired: &Column,
    existing: &Column,
    primary_key: bool,
) -> Option<Column> {
    if columns_match(builder, desired, existing, primary_key) {
        None
    } else {
        Some(emitted_column(desired, primary_key))
    }
}

/// Returns whether `existing` already satisfies `desired`.
#[must_use]
pub fn columns_match(
    builder: &dyn MigrationDialect,
    desired: &Column,
    existing: &Column,
    primary_key: bool,
) -> bool {
    let wanted_not_null = if primary_key {
        Some(true)
    } else {
        desired.not_null_flag()
    };

    builder.types_match(&desired.data_type, &existing.data_type)
        && desired.is_array == existing.is_array
        && builder.defaults_match(desired, existing)
        && not_null_constraint_equals(wanted_not_null, existing.not_null_flag())
}

/// Key columns leave nullability to the key; others carry an explicit flag
/// so the statement can both set and drop NOT NULL.
fn emitted_column(desired: &Column, primary_key: bool) -> Column {
    let not_null = if primary_key {
        None
    } else {
        Some(desired.is_not_null())
    };
    desired.clone().with_not_null(not_null)
}

fn diff_indexes(
    table: &str,
    desired: &[Index],
    actual: &[Index],
) -> (Vec<MigrationOperation>, Vec<MigrationOperation>) {
    let desired_map: HashMap<&str, &Index> = desired.iter().map(|i| (i.name.as_str(), i)).collect();
    let actual_map: HashMap<&str, &Index> = actual.iter().map(|i| (i.name.as_str(), i)).collect();

    let drops = actual
        .iter()
        .filter(|existing| {
            desired_map
                .get(existing.name.as_str())
                .map_or(true, |wanted| !indexes_equal(wanted, existing))
        })
        .map(|existing| MigrationOperation::drop_index(table, &existing.name))
        .collect();

    let creates = desired
        .iter()
        .filter(|wanted| {
            actual_map
                .get(wanted.name.as_str())
                .map_or(true, |existing| !indexes_equal(wanted, existing))
        })
        .map(|wanted| MigrationOperation::create_index(table, wanted.clone()))
        .collect();

    (drops, creates)
}

fn indexes_equal(a: &Index, b: &Index) -> bool {
    a.columns == b.columns && a.unique == b.unique
}

fn diff_foreign_keys(
    table: &str,
    desired: &[ForeignKey],
    actual: &[ForeignKey],
) -> (Vec<MigrationOperation>, Vec<MigrationOperation>) {
    let desired_map: HashMap<&str, &ForeignKey> =
        desired.iter().map(|fk| (fk.name.as_str(), fk)).collect();
    let actual_map: HashMap<&str, &ForeignKey> =
        actual.iter().map(|fk| (fk.name.as_str(), fk)).collect();

    let drops = actual
        .iter()
        .filter(|existing| {
            desired_map
                .get(existing.name.as_str())
                .map_or(true, |wanted| !foreign_keys_equal(wanted, existing))
        })
        .map(|existing| MigrationOperation::drop_foreign_key(table, &existing.name))
        .collect();

    let adds = desired
        .iter()
        .filter(|wanted| {
            actual_map
                .get(wanted.name.as_str())
                .map_or(true, |existing| !foreign_keys_equal(wanted, existing))
        })
        .map(|wanted| MigrationOperation::add_foreign_key(table, wanted.clone()))
        .collect();

    (drops, adds)
}

fn foreign_keys_equal(a: &ForeignKey, b: &ForeignKey) -> bool {
    a.child_columns == b.child_columns
        && a.parent_table == b.parent_table
        && a.parent_columns == b.parent_columns
        && a.on_delete == b.on_delete
}

fn diff_primary_key(
    desired: &TableModel,
    actual: &TableModel,
) -> (Option<MigrationOperation>, Option<MigrationOperation>) {
    if desired.primary_key_columns() == actual.primary_key_columns() {
        return (None, None);
    }

    let drop = actual
        .primary_key
        .as_ref()
        .map(|pk| MigrationOperation::DropPrimaryKey {
            table: desired.name.clone(),
            name: pk.name.clone(),
        });
    let add = desired
        .primary_key
        .as_ref()
        .filter(|pk| !pk.columns.is_empty())
        .map(|pk| MigrationOperation::AddPrimaryKey {
            table: desired.name.clone(),
            primary_key: pk.clone(),
        });
    (drop, add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ForeignKeyAction, PrimaryKeyConstraint};

    fn pk(columns: &[&str]) -> PrimaryKeyConstraint {
        PrimaryKeyConstraint::new(columns.iter().map(|c| (*c).to_string()).collect())
    }

    fn users_actual() -> TableModel {
        TableModel::new("users")
            .column(Column::new("id", "integer").not_null())
            .column(Column::new("email", "text").nullable())
            .column(Column::new("legacy", "text").nullable())
            .primary_key(pk(&["id"]).named("users_pkey"))
    }

    #[test]
    fn test_missing_table_is_created() {
        let desired = TableModel::new("users")
            .column(Column::new("id", "integer").not_null())
            .primary_key(pk(&["id"]))
            .index(Index::new("idx_users_id", vec!["id".to_string()]));

        let ops = Planner::new(Dialect::Postgres).plan_table(&desired, None);
        assert_eq!(ops.len(), 2);
        assert!(matches!(
            &ops[0],
            MigrationOperation::CreateTable { table, primary_key: Some(_), .. } if table == "users"
        ));
        assert!(matches!(&ops[1], MigrationOperation::CreateIndex { index, .. } if index.name == "idx_users_id"));
    }

    #[test]
    fn test_matching_table_plans_nothing() {
        let desired = TableModel::new("users")
            .column(Column::new("id", "integer"))
            .column(Column::new("email", "text"))
            .column(Column::new("legacy", "text").nullable())
            .primary_key(pk(&["id"]));

        // `id` is nullable in the document but implied NOT NULL by the key,
        // and an absent flag equals an explicit false.
        let ops = Planner::new(Dialect::Postgres).plan_table(&desired, Some(&users_actual()));
        assert!(ops.is_empty(), "unexpected operations: {ops:?}");
    }

    #[test]
    fn test_modify_then_drop() {
        let desired = TableModel::new("users")
            .column(Column::new("id", "integer").not_null())
            .column(Column::new("email", "text").not_null())
            .primary_key(pk(&["id"]));

        let ops = Planner::new(Dialect::Postgres).plan_table(&desired, Some(&users_actual()));
        assert_eq!(
            ops,
            vec![
                MigrationOperation::modify_column(
                    "users",
                    Column::new("email", "text").with_not_null(Some(true))
                ),
                MigrationOperation::drop_column("users", "legacy"),
            ]
        );
    }

    #[test]
    fn test_drop_detection() {
        let actual = TableModel::new("people")
            .column(Column::new("id", "integer"))
            .column(Column::new("name", "text"))
            .column(Column::new("legacy_col", "text"));
        let desired = TableModel::new("people")
            .column(Column::new("id", "integer"))
            .column(Column::new("name", "text"));

        let ops = Planner::new(Dialect::Postgres).plan_table(&desired, Some(&actual));
        assert_eq!(ops, vec![MigrationOperation::drop_column("people", "legacy_col")]);
    }

    #[test]
    fn test_primary_key_column_emits_no_null_clause() {
        let actual = TableModel::new("users")
            .column(Column::new("id", "integer").not_null())
            .primary_key(pk(&["id"]));
        let desired = TableModel::new("users")
            .column(Column::new("id", "bigint").not_null())
            .primary_key(pk(&["id"]));

        let ops = Planner::new(Dialect::Postgres).plan_table(&desired, Some(&actual));
        assert_eq!(ops.len(), 1);
        let MigrationOperation::ModifyColumn { column, .. } = &ops[0] else {
            panic!("expected modify, got {:?}", ops[0]);
        };
        assert_eq!(column.not_null_flag(), None);

        for dialect in [Dialect::Postgres, Dialect::Mysql] {
            let sql = dialect.generate_sql(&ops[0]);
            assert!(!sql.contains("NOT NULL"), "{dialect}: {sql}");
        }
    }

    #[test]
    fn test_add_columns_follow_desired_order() {
        let actual = TableModel::new("users").column(Column::new("id", "integer").not_null());
        let desired = TableModel::new("users")
            .column(Column::new("id", "integer").not_null())
            .column(Column::new("b", "text").not_null().default("x"))
            .column(Column::new("a", "text"));

        let ops = Planner::new(Dialect::Postgres).plan_table(&desired, Some(&actual));
        assert_eq!(
            ops,
            vec![
                MigrationOperation::add_column(
                    "users",
                    Column::new("b", "text").not_null().default("x")
                ),
                MigrationOperation::add_column(
                    "users",
                    Column::new("a", "text").with_not_null(Some(false))
                ),
            ]
        );
    }

    #[test]
    fn test_default_and_type_changes_are_detected() {
        let pg = Dialect::Postgres.builder();
        let existing = Column::new("status", "text").default("new");
        assert!(columns_match(pg, &Column::new("status", "text").default("new"), &existing, false));
        assert!(!columns_match(pg, &Column::new("status", "text"), &existing, false));
        assert!(!columns_match(
            pg,
            &Column::new("status", "character varying(10)").default("new"),
            &existing,
            false
        ));
        assert!(!columns_match(
            pg,
            &Column::new("status", "text").default("new").array(),
            &existing,
            false
        ));
        assert!(
            alter_column(pg, &Column::new("status", "text").default("new"), &existing, false)
                .is_none()
        );
    }

    #[test]
    fn test_declared_spelling_compares_to_catalog_spelling() {
        let pg = Dialect::Postgres.builder();
        let live = Column::new("email", "character varying(255)").nullable();
        assert!(columns_match(pg, &Column::new("email", "VARCHAR(255)"), &live, false));

        let live = Column::new("price", "numeric(5,2)").default("1.50");
        assert!(columns_match(
            pg,
            &Column::new("price", "decimal(5, 2)").default("1.5"),
            &live,
            false
        ));
    }

    #[test]
    fn test_modify_keeps_declared_type() {
        let actual = TableModel::new("events")
            .column(Column::new("at", "timestamp without time zone").nullable());
        let desired = TableModel::new("events").column(Column::new("at", "timestamp(3)").not_null());

        let ops = Planner::new(Dialect::Postgres).plan_table(&desired, Some(&actual));
        assert_eq!(
            render(Dialect::Postgres, &ops),
            vec![
                "ALTER TABLE \"events\" ALTER COLUMN \"at\" TYPE timestamp(3), \
                 ALTER COLUMN \"at\" SET NOT NULL, ALTER COLUMN \"at\" DROP DEFAULT"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_mysql_unsigned_change_is_detected() {
        let actual = TableModel::new("t").column(Column::new("n", "bigint(20)").nullable());
        let desired = TableModel::new("t").column(Column::new("n", "bigint unsigned"));

        let ops = Planner::new(Dialect::Mysql).plan_table(&desired, Some(&actual));
        assert_eq!(
            render(Dialect::Mysql, &ops),
            vec!["ALTER TABLE `t` MODIFY COLUMN `n` bigint unsigned NULL".to_string()]
        );
    }

    fn render(dialect: Dialect, ops: &[MigrationOperation]) -> Vec<String> {
        ops.iter().map(|op| dialect.generate_sql(op)).collect()
    }

    #[test]
    fn test_index_changes() {
        let actual = TableModel::new("users")
            .column(Column::new("email", "text"))
            .index(Index::new("idx_old", vec!["email".to_string()]))
            .index(Index::new("idx_email", vec!["email".to_string()]));
        let desired = TableModel::new("users")
            .column(Column::new("email", "text"))
            .index(Index::new("idx_email", vec!["email".to_string()]).unique())
            .index(Index::new("idx_new", vec!["email".to_string()]));

        let ops = Planner::new(Dialect::Postgres).plan_table(&desired, Some(&actual));
        assert_eq!(
            ops,
            vec![
                MigrationOperation::drop_index("users", "idx_old"),
                MigrationOperation::drop_index("users", "idx_email"),
                MigrationOperation::create_index(
                    "users",
                    Index::new("idx_email", vec!["email".to_string()]).unique()
                ),
                MigrationOperation::create_index(
                    "users",
                    Index::new("idx_new", vec!["email".to_string()])
                ),
            ]
        );
    }

    #[test]
    fn test_foreign_key_changes_and_ordering() {
        let actual = TableModel::new("orders")
            .column(Column::new("customer_id", "integer"))
            .column(Column::new("old_ref", "integer"))
            .foreign_key(ForeignKey::new("fk_customer", "customer_id", "customers", "id"))
            .index(Index::new("idx_old_ref", vec!["old_ref".to_string()]));
        let desired = TableModel::new("orders")
            .column(Column::new("customer_id", "integer"))
            .foreign_key(
                ForeignKey::new("fk_customer", "customer_id", "customers", "id")
                    .on_delete(ForeignKeyAction::Cascade),
            );

        let ops = Planner::new(Dialect::Postgres).plan_table(&desired, Some(&actual));
        assert_eq!(
            ops,
            vec![
                MigrationOperation::drop_foreign_key("orders", "fk_customer"),
                MigrationOperation::drop_index("orders", "idx_old_ref"),
                MigrationOperation::drop_column("orders", "old_ref"),
                MigrationOperation::add_foreign_key(
                    "orders",
                    ForeignKey::new("fk_customer", "customer_id", "customers", "id")
                        .on_delete(ForeignKeyAction::Cascade)
                ),
            ]
        );
    }

    #[test]
    fn test_primary_key_change() {
        let actual = TableModel::new("memberships")
            .column(Column::new("user_id", "integer").not_null())
            .column(Column::new("org_id", "integer").not_null())
            .primary_key(pk(&["user_id"]).named("memberships_pkey"));
        let desired = TableModel::new("memberships")
            .column(Column::new("user_id", "integer").not_null())
            .column(Column::new("org_id", "integer").not_null())
            .primary_key(pk(&["user_id", "org_id"]));

        let ops = Planner::new(Dialect::Postgres).plan_table(&desired, Some(&actual));
        assert_eq!(
            ops,
            vec![
                MigrationOperation::DropPrimaryKey {
                    table: "memberships".to_string(),
                    name: Some("memberships_pkey".to_string()),
                },
                MigrationOperation::AddPrimaryKey {
                    table: "memberships".to_string(),
                    primary_key: pk(&["user_id", "org_id"]),
                },
            ]
        );
    }
}
