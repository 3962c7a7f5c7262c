// Statement vocabulary of the dialect.
//
// Every namespace and DDL statement the adapter emits is spelled here.
use crate::error::AdapterError;
use crate::models::{Predicate, Value};

pub const DEFAULT_NAMESPACE: &str = "default";

/// Lookup operators understood by the dialect
const OPERATORS: &[(&str, &str)] = &[
    ("exact", "= %s"),
    ("iexact", "LIKE %s"),
    ("contains", "LIKE %s"),
    ("icontains", "LIKE %s"),
    ("regex", "REGEXP %s"),
    ("iregex", "REGEXP %s"),
    ("gt", "> %s"),
    ("gte", ">= %s"),
    ("lt", "< %s"),
    ("lte", "<= %s"),
    ("startswith", "LIKE %s"),
    ("endswith", "LIKE %s"),
    ("istartswith", "LIKE %s"),
    ("iendswith", "LIKE %s"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct DialectOperations;

impl DialectOperations {
    /// Identifiers are emitted bare
    pub fn quote_name(&self, name: &str) -> String {
        name.to_string()
    }

    pub fn random_function_sql(&self) -> &'static str {
        "RAND()"
    }

    pub fn start_transaction_sql(&self) -> &'static str {
        ""
    }

    pub fn end_transaction_sql(&self, _success: bool) -> &'static str {
        ""
    }

    pub fn use_namespace_sql(&self, name: Option<&str>) -> String {
        format!("USE {}", self.quote_name(name.unwrap_or(DEFAULT_NAMESPACE)))
    }

    pub fn show_tables_sql(&self) -> &'static str {
        "SHOW TABLES"
    }

    pub fn create_database_sql(&self, name: &str) -> String {
        format!("CREATE DATABASE {}", self.quote_name(name))
    }

    pub fn drop_database_sql(&self, name: &str) -> String {
        format!("DROP DATABASE {}", self.quote_name(name))
    }

    pub fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_name(table))
    }

    /// Flushing rewrites nothing in place; tables are dropped outright.
    pub fn sql_flush(&self, tables: &[String]) -> Vec<String> {
        // TODO: overwrite with an empty table instead so the schema survives a flush
        tables.iter().map(|t| self.drop_table_sql(t)).collect()
    }

    pub fn lookup_operator(&self, lookup: &str) -> Option<&'static str> {
        OPERATORS
            .iter()
            .find(|(name, _)| *name == lookup)
            .map(|(_, op)| *op)
    }

    /// Build a single-column predicate such as `name LIKE %s`.
    ///
    /// Pattern lookups wrap text values in `%` wildcards the way the lookup
    /// name implies.
    pub fn lookup(&self, column: &str, lookup: &str, value: Value) -> Result<Predicate, AdapterError> {
        let operator = self.lookup_operator(lookup).ok_or_else(|| {
            AdapterError::Compilation(format!("Unsupported lookup '{}' on column {}", lookup, column))
        })?;

        let value = match (lookup, value) {
            ("contains" | "icontains", Value::Text(s)) => Value::Text(format!("%{}%", s)),
            ("startswith" | "istartswith", Value::Text(s)) => Value::Text(format!("{}%", s)),
            ("endswith" | "iendswith", Value::Text(s)) => Value::Text(format!("%{}", s)),
            (_, value) => value,
        };

        Ok(Predicate::new(
            format!("{} {}", self.quote_name(column), operator),
            vec![value],
        ))
    }
}
