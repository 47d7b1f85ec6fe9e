// ABOUTME: Fixed relational schema shared by the loader and the query assistant
// ABOUTME: Declares tables, columns and keys, and orders tables by foreign-key dependency

pub mod ddl;

use anyhow::{bail, Result};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::error::MigrationError;

/// Column storage type in the target database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Auto-incrementing integer primary key
    Serial,
    Integer,
    /// DOUBLE PRECISION
    Real,
    Text,
    /// TIMESTAMP WITHOUT TIME ZONE
    Timestamp,
}

impl ColumnType {
    /// SQL type used in CREATE TABLE
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Serial => "SERIAL",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }

    /// PostgreSQL array type used to bind a whole column of a page
    pub fn array_type(&self) -> &'static str {
        match self {
            ColumnType::Serial | ColumnType::Integer => "int4[]",
            ColumnType::Real => "float8[]",
            ColumnType::Text => "text[]",
            ColumnType::Timestamp => "timestamp[]",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub unique: bool,
}

impl ColumnDef {
    fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: false,
            unique: false,
        }
    }

    fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: String,
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableDef {
    fn new(name: &str, primary_key: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: vec![ColumnDef::new(primary_key, ColumnType::Serial)],
            primary_key: primary_key.to_string(),
            foreign_keys: Vec::new(),
        }
    }

    fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    fn references(mut self, column: &str, table: &str, referenced: &str) -> Self {
        self.columns.push(ColumnDef::new(column, ColumnType::Integer));
        self.foreign_keys.push(ForeignKey {
            column: column.to_string(),
            references_table: table.to_string(),
            references_column: referenced.to_string(),
        });
        self
    }

    /// Look up a column by name, ignoring ASCII case
    ///
    /// PostgreSQL folds unquoted identifiers to lower case, so `RegionID`
    /// coming from SQLite and `regionid` in the target name the same column.
    pub fn find_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A validated set of tables with resolvable foreign keys
#[derive(Debug, Clone)]
pub struct Schema {
    tables: Vec<TableDef>,
}

impl Schema {
    /// Build a schema, checking that every foreign key names a known table
    /// and column and that the dependency graph has no cycle
    pub fn new(tables: Vec<TableDef>) -> Result<Self> {
        let schema = Self { tables };

        for table in &schema.tables {
            if table.find_column(&table.primary_key).is_none() {
                bail!(MigrationError::Schema(format!(
                    "table '{}' declares unknown primary key column '{}'",
                    table.name, table.primary_key
                )));
            }
            for fk in &table.foreign_keys {
                let target = schema.table(&fk.references_table).ok_or_else(|| {
                    MigrationError::Schema(format!(
                        "table '{}' references unknown table '{}'",
                        table.name, fk.references_table
                    ))
                })?;
                if target.find_column(&fk.references_column).is_none() {
                    bail!(MigrationError::Schema(format!(
                        "table '{}' references unknown column {}.{}",
                        table.name, fk.references_table, fk.references_column
                    )));
                }
            }
        }

        schema.dependency_order()?;
        Ok(schema)
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// Look up a table by name, ignoring ASCII case
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Tables ordered so that every referenced table precedes its dependents
    ///
    /// Returns a schema error when the foreign keys form a cycle.
    pub fn dependency_order(&self) -> Result<Vec<&TableDef>> {
        let mut graph = DiGraph::<usize, ()>::new();
        let nodes: Vec<_> = (0..self.tables.len()).map(|i| graph.add_node(i)).collect();

        for (idx, table) in self.tables.iter().enumerate() {
            for fk in &table.foreign_keys {
                if let Some(parent) = self
                    .tables
                    .iter()
                    .position(|t| t.name.eq_ignore_ascii_case(&fk.references_table))
                {
                    // Self-references do not constrain load order
                    if parent != idx {
                        graph.add_edge(nodes[parent], nodes[idx], ());
                    }
                }
            }
        }

        let sorted = toposort(&graph, None).map_err(|cycle| {
            let table = &self.tables[graph[cycle.node_id()]].name;
            MigrationError::Schema(format!(
                "foreign keys form a cycle through table '{}'",
                table
            ))
        })?;

        Ok(sorted
            .into_iter()
            .map(|node| &self.tables[graph[node]])
            .collect())
    }
}

/// The six-entity sales schema loaded by this tool
pub fn sales_schema() -> Schema {
    let tables = vec![
        TableDef::new("Region", "RegionID")
            .column(ColumnDef::new("Region", ColumnType::Text).unique()),
        TableDef::new("Country", "CountryID")
            .column(ColumnDef::new("Country", ColumnType::Text).unique())
            .references("RegionID", "Region", "RegionID"),
        TableDef::new("Customer", "CustomerID")
            .column(ColumnDef::new("FirstName", ColumnType::Text))
            .column(ColumnDef::new("LastName", ColumnType::Text))
            .column(ColumnDef::new("Address", ColumnType::Text))
            .column(ColumnDef::new("City", ColumnType::Text))
            .references("CountryID", "Country", "CountryID"),
        TableDef::new("ProductCategory", "ProductCategoryID")
            .column(ColumnDef::new("ProductCategory", ColumnType::Text).unique())
            .column(ColumnDef::new(
                "ProductCategoryDescription",
                ColumnType::Text,
            )),
        TableDef::new("Product", "ProductID")
            .column(ColumnDef::new("ProductName", ColumnType::Text).unique())
            .column(ColumnDef::new("ProductUnitPrice", ColumnType::Real))
            .references("ProductCategoryID", "ProductCategory", "ProductCategoryID"),
        TableDef::new("OrderDetail", "OrderID")
            .references("CustomerID", "Customer", "CustomerID")
            .references("ProductID", "Product", "ProductID")
            .column(ColumnDef::new("OrderDate", ColumnType::Timestamp))
            .column(ColumnDef::new("QuantityOrdered", ColumnType::Integer)),
    ];

    Schema { tables }
}
