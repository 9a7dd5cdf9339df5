//! Statement files: planned SQL written to disk and read back for apply.

use std::path::Path;

use tracing::debug;

use crate::error::{Result, SchemaError};

/// Comment written at the top of every generated statement file.
pub const GENERATED_HEADER: &str =
    "/* Auto generated file. Do not edit by hand. This file was generated by oxide-schema. */";

/// Renders statements as a file: header, blank line, then the statements
/// joined by `;\n` and terminated by `;`.
#[must_use]
pub fn render_statement_file(statements: &[String]) -> String {
    let mut out = format!("{GENERATED_HEADER}\n\n");
    if !statements.is_empty() {
        out.push_str(&statements.join(";\n"));
        out.push_str(";\n");
    }
    out
}

/// Splits a statement file back into statements.
///
/// The generated header is dropped, then the text is split on `;` outside
/// quoted literals and identifiers. Empty fragments are skipped.
#[must_use]
pub fn parse_statement_file(contents: &str) -> Vec<String> {
    let body = contents.trim_start();
    let body = body.strip_prefix(GENERATED_HEADER).unwrap_or(body);

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in body.chars() {
        match (quote, c) {
            (None, ';') => {
                push_statement(&mut statements, &mut current);
                continue;
            }
            (None, '\'' | '"' | '`') => quote = Some(c),
            // A doubled quote closes and reopens, so it needs no lookahead.
            (Some(open), _) if open == c => quote = None,
            _ => {}
        }
        current.push(c);
    }
    push_statement(&mut statements, &mut current);

    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

/// Writes `statements` to `path` as a statement file.
pub fn write_statement_file(path: &Path, statements: &[String]) -> Result<()> {
    std::fs::write(path, render_statement_file(statements))
        .map_err(|e| SchemaError::io(path, e))?;
    debug!(path = %path.display(), statements = statements.len(), "Wrote statement file");
    Ok(())
}

/// Reads the statement file at `path` back into statements.
pub fn read_statement_file(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|e| SchemaError::io(path, e))?;
    Ok(parse_statement_file(&contents))
}
