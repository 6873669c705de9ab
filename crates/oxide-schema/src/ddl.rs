//! CREATE TABLE and ADD COLUMN generation.

use oxide_codec::Codec;

use crate::column::{quote_identifier, Column};
use crate::error::Result;
use crate::model::TableModel;

/// Generates the column definition used in CREATE TABLE and ADD COLUMN.
///
/// Parts are emitted in the order SQLite expects:
/// `"name" TYPE [NOT NULL] [DEFAULT literal] [PRIMARY KEY] [AUTOINCREMENT]`.
pub fn build_column_clause(column: &Column, codec: &Codec<'_>) -> Result<String> {
    column.validate()?;

    let mut parts = vec![
        quote_identifier(column.physical_name()),
        column.column_type.storage_type().to_string(),
    ];

    if !column.nullable {
        parts.push("NOT NULL".to_string());
    }

    if let Some(literal) = column.default_literal(codec)? {
        parts.push(format!("DEFAULT {literal}"));
    }

    if column.is_primary_key {
        parts.push("PRIMARY KEY".to_string());
    }

    if column.auto_increment {
        parts.push("AUTOINCREMENT".to_string());
    }

    Ok(parts.join(" "))
}

/// Generates `CREATE TABLE "db"."table" (...)` for a model.
pub fn build_create_table(model: &TableModel, codec: &Codec<'_>) -> Result<String> {
    let col_defs = model
        .columns
        .iter()
        .map(|c| build_column_clause(c, codec))
        .collect::<Result<Vec<_>>>()?;

    Ok(format!(
        "CREATE TABLE {} ({})",
        model.qualified_name(),
        col_defs.join(", ")
    ))
}

/// Generates `ALTER TABLE ... ADD COLUMN ...` for one column of a model.
pub fn build_add_column(model: &TableModel, column: &Column, codec: &Codec<'_>) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {}",
        model.qualified_name(),
        build_column_clause(column, codec)?
    ))
}
