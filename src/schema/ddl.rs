// ABOUTME: DDL generation for the full-refresh schema reset
// ABOUTME: Emits DROP/CREATE statements in dependency order and a prose schema description

use anyhow::{Context, Result};

use super::{ColumnType, Schema, TableDef};
use crate::utils::validate_postgres_identifier;

/// DROP statements ordered dependents-first
pub fn drop_statements(schema: &Schema) -> Result<Vec<String>> {
    let mut order = schema.dependency_order()?;
    order.reverse();

    order
        .into_iter()
        .map(|table| {
            validate_postgres_identifier(&table.name)?;
            Ok(format!("DROP TABLE IF EXISTS {} CASCADE;", table.name))
        })
        .collect()
}

/// CREATE TABLE statements ordered referents-first
pub fn create_statements(schema: &Schema) -> Result<Vec<String>> {
    schema
        .dependency_order()?
        .into_iter()
        .map(create_table_statement)
        .collect()
}

/// Complete drop-and-recreate script, safe to run against an empty or populated target
pub fn reset_script(schema: &Schema) -> Result<String> {
    let mut statements = drop_statements(schema)?;
    statements.extend(create_statements(schema)?);
    Ok(statements.join("\n"))
}

fn create_table_statement(table: &TableDef) -> Result<String> {
    validate_postgres_identifier(&table.name)
        .with_context(|| format!("Invalid table name '{}'", table.name))?;

    let mut lines = Vec::with_capacity(table.columns.len() + table.foreign_keys.len());

    for column in &table.columns {
        validate_postgres_identifier(&column.name).with_context(|| {
            format!("Invalid column name '{}.{}'", table.name, column.name)
        })?;

        let mut line = format!("    {} {}", column.name, column.column_type.sql_type());
        if column.unique {
            line.push_str(" UNIQUE");
        }
        if !column.nullable {
            line.push_str(" NOT NULL");
        }
        if column.name == table.primary_key {
            line.push_str(" PRIMARY KEY");
        }
        lines.push(line);
    }

    for fk in &table.foreign_keys {
        lines.push(format!(
            "    FOREIGN KEY ({}) REFERENCES {}({})",
            fk.column, fk.references_table, fk.references_column
        ));
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
        table.name,
        lines.join(",\n")
    ))
}

/// Plain-text schema listing for language-model prompts
pub fn describe(schema: &Schema) -> String {
    let mut out = String::from("Database Schema:\n");

    for table in schema.tables() {
        out.push_str(&format!("- {}(\n", table.name));
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                let mut line = format!("        {} {}", column.name, column.column_type.sql_type());
                if column.unique {
                    line.push_str(" UNIQUE");
                }
                if !column.nullable {
                    line.push_str(" NOT NULL");
                }
                if column.name == table.primary_key {
                    line.push_str(" PRIMARY KEY");
                }
                if let Some(fk) = table.foreign_keys.iter().find(|fk| fk.column == column.name) {
                    line.push_str(&format!(" (FK to {})", fk.references_table));
                }
                line
            })
            .collect();
        out.push_str(&columns.join(",\n"));
        out.push_str("\n        )\n\n");
    }

    let timestamps: Vec<String> = schema
        .tables()
        .iter()
        .flat_map(|t| t.columns.iter())
        .filter(|c| c.column_type == ColumnType::Timestamp)
        .map(|c| c.name.clone())
        .collect();
    if !timestamps.is_empty() {
        out.push_str(&format!(
            "NOTE: {} {} TIMESTAMP typed.\n",
            timestamps.join(", "),
            if timestamps.len() == 1 { "is" } else { "are" }
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::sales_schema;

    #[test]
    fn test_drop_statements_drop_dependents_first() {
        let drops = drop_statements(&sales_schema()).unwrap();
        assert_eq!(drops.len(), 6);

        let idx = |name: &str| {
            drops
                .iter()
                .position(|s| s == &format!("DROP TABLE IF EXISTS {} CASCADE;", name))
                .unwrap()
        };
        assert!(idx("OrderDetail") < idx("Customer"));
        assert!(idx("OrderDetail") < idx("Product"));
        assert!(idx("Country") < idx("Region"));
        assert!(idx("Product") < idx("ProductCategory"));
    }

    #[test]
    fn test_create_statements_create_referents_first() {
        let creates = create_statements(&sales_schema()).unwrap();
        let idx = |name: &str| {
            creates
                .iter()
                .position(|s| s.starts_with(&format!("CREATE TABLE IF NOT EXISTS {} (", name)))
                .unwrap()
        };
        assert!(idx("Region") < idx("Country"));
        assert!(idx("Customer") < idx("OrderDetail"));
    }

    #[test]
    fn test_create_statement_carries_constraints() {
        let schema = sales_schema();
        let sql = create_table_statement(schema.table("Country").unwrap()).unwrap();

        assert!(sql.contains("CountryID SERIAL NOT NULL PRIMARY KEY"));
        assert!(sql.contains("Country TEXT UNIQUE NOT NULL"));
        assert!(sql.contains("RegionID INTEGER NOT NULL"));
        assert!(sql.contains("FOREIGN KEY (RegionID) REFERENCES Region(RegionID)"));
    }

    #[test]
    fn test_reset_script_drops_before_creating() {
        let script = reset_script(&sales_schema()).unwrap();
        let last_drop = script.rfind("DROP TABLE").unwrap();
        let first_create = script.find("CREATE TABLE").unwrap();
        assert!(last_drop < first_create);
    }

    #[test]
    fn test_describe_lists_foreign_keys() {
        let text = describe(&sales_schema());
        assert!(text.starts_with("Database Schema:"));
        assert!(text.contains("- OrderDetail("));
        assert!(text.contains("CustomerID INTEGER NOT NULL (FK to Customer)"));
        assert!(text.contains("OrderDate is TIMESTAMP typed"));
    }
}
