//! Reverse direction: table models to specification documents, and
//! specification documents to fixture SQL.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};
use crate::planner::Planner;
use crate::schema::TableModel;
use crate::spec::{SqlTableSchema, TableDocument, TableSchema, TableSpec, read_table_spec};

/// File name of the manifest listing generated documents.
pub const MANIFEST_FILE: &str = "kustomization.yaml";

/// File name of the rendered fixture statements.
pub const FIXTURES_FILE: &str = "fixtures.sql";

/// Manifest listing generated documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Document paths relative to the manifest, as `./<file>`.
    pub resources: Vec<String>,
}

/// Resource names cannot carry underscores.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.replace('_', "-")
}

/// Describes `table` as a specification for `dialect`.
#[must_use]
pub fn table_spec_for(table: &TableModel, dialect: Dialect, database: &str) -> TableSpec {
    TableSpec::new(database, &table.name).schema(TableSchema::new(
        dialect,
        SqlTableSchema::from_table_model(table),
    ))
}

/// Wraps the specification of `table` in a `Table` document.
#[must_use]
pub fn table_document(table: &TableModel, dialect: Dialect, database: &str) -> TableDocument {
    TableDocument::new(
        sanitize_name(&table.name),
        table_spec_for(table, dialect, database),
    )
}

/// Serializes one document.
pub fn render_document(document: &TableDocument) -> Result<String> {
    Ok(serde_yaml::to_string(document)?)
}

/// Serializes documents into one stream separated by `---`.
pub fn render_document_stream(documents: &[TableDocument]) -> Result<String> {
    let rendered = documents
        .iter()
        .map(render_document)
        .collect::<Result<Vec<_>>>()?;
    Ok(rendered.join("---\n"))
}

/// Writes one `<name>.yaml` per document plus the manifest into `dir`.
///
/// Returns the paths written, manifest last.
pub fn write_documents(dir: &Path, documents: &[TableDocument]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).map_err(|e| SchemaError::io(dir, e))?;

    let mut written = Vec::with_capacity(documents.len() + 1);
    let mut manifest = Manifest::default();

    for document in documents {
        let file_name = format!("{}.yaml", document.metadata.name);
        let path = dir.join(&file_name);
        std::fs::write(&path, render_document(document)?).map_err(|e| SchemaError::io(&path, e))?;
        debug!(path = %path.display(), "Wrote document");

        manifest.resources.push(format!("./{file_name}"));
        written.push(path);
    }

    let path = dir.join(MANIFEST_FILE);
    std::fs::write(&path, serde_yaml::to_string(&manifest)?)
        .map_err(|e| SchemaError::io(&path, e))?;
    written.push(path);

    info!(
        dir = %dir.display(),
        documents = documents.len(),
        "Wrote table documents"
    );
    Ok(written)
}

/// Reads every `.yaml`/`.yml` specification under `dir`, sorted by path.
///
/// Manifests are skipped.
pub fn collect_specs(dir: &Path) -> Result<Vec<(PathBuf, TableSpec)>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
            SchemaError::io(path, e.into())
        })?;
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        let is_manifest = path.file_name().is_some_and(|name| name == MANIFEST_FILE);
        if entry.file_type().is_file() && is_yaml && !is_manifest {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let spec = read_table_spec(&path)?;
            Ok((path, spec))
        })
        .collect()
}

/// Renders `CREATE TABLE` and index statements for every specification that
/// carries a payload for `dialect`, in input order.
#[must_use]
pub fn fixture_statements(specs: &[TableSpec], dialect: Dialect) -> Vec<String> {
    let planner = Planner::new(dialect);
    specs
        .iter()
        .filter_map(|spec| spec.to_table_model(dialect))
        .flat_map(|model| planner.plan_table(&model, None))
        .map(|op| dialect.generate_sql(&op))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, Index, PrimaryKeyConstraint};
    use crate::spec::parse_table_spec;

    fn user_accounts() -> TableModel {
        TableModel::new("user_accounts")
            .column(Column::new("id", "integer").not_null())
            .column(Column::new("email", "character varying(255)").nullable())
            .primary_key(PrimaryKeyConstraint::new(vec!["id".to_string()]).named("user_accounts_pkey"))
            .index(Index::new("idx_user_accounts_email", vec!["email".to_string()]).unique())
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("user_accounts"), "user-accounts");
        assert_eq!(sanitize_name("plain"), "plain");
    }

    #[test]
    fn test_table_document() {
        let document = table_document(&user_accounts(), Dialect::Postgres, "app");
        assert_eq!(document.metadata.name, "user-accounts");
        assert_eq!(document.spec.name, "user_accounts");
        assert_eq!(document.spec.database, "app");

        let yaml = render_document(&document).unwrap();
        let spec = parse_table_spec(&yaml, Path::new("user-accounts.yaml")).unwrap();
        let model = spec.to_table_model(Dialect::Postgres).unwrap();

        // The generated document plans to nothing against the table it
        // describes.
        assert!(Planner::new(Dialect::Postgres)
            .plan_table(&model, Some(&user_accounts()))
            .is_empty());
    }

    #[test]
    fn test_document_stream() {
        let documents = vec![
            table_document(&user_accounts(), Dialect::Mysql, "app"),
            table_document(&TableModel::new("logs"), Dialect::Mysql, "app"),
        ];
        let stream = render_document_stream(&documents).unwrap();
        assert_eq!(stream.matches("---\n").count(), 1);
        assert!(stream.contains("name: user-accounts"));
        assert!(stream.contains("name: logs"));
    }

    #[test]
    fn test_write_documents_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let documents = vec![table_document(&user_accounts(), Dialect::Postgres, "app")];

        let written = write_documents(dir.path(), &documents).unwrap();
        assert_eq!(
            written,
            vec![
                dir.path().join("user-accounts.yaml"),
                dir.path().join(MANIFEST_FILE)
            ]
        );

        let manifest: Manifest =
            serde_yaml::from_str(&std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(manifest.resources, vec!["./user-accounts.yaml".to_string()]);

        let specs = collect_specs(dir.path()).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].1.name, "user_accounts");
    }

    #[test]
    fn test_fixture_statements() {
        let specs = vec![
            table_spec_for(&user_accounts(), Dialect::Postgres, "app"),
            table_spec_for(&TableModel::new("other"), Dialect::Mysql, "app"),
        ];

        let statements = fixture_statements(&specs, Dialect::Postgres);
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE \"user_accounts\" (\"id\" integer NOT NULL, \
                 \"email\" character varying(255), PRIMARY KEY (\"id\"))"
                    .to_string(),
                "CREATE UNIQUE INDEX \"idx_user_accounts_email\" ON \"user_accounts\" (\"email\")"
                    .to_string(),
            ]
        );
    }
}
