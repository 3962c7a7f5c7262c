// Query compilation.
//
// Only INSERT needs dialect handling: auto-keyed tables get a client-side
// synthetic key per row, reported back as the last inserted id. Everything
// else goes through the generic compiler unchanged.
use crate::error::AdapterError;
use crate::models::{
    AbstractQuery, CompiledStatement, Predicate, QueryKind, QueryResult, SyntheticKey, Value,
};
use crate::services::connection::ConnectionAdapter;
use crate::services::key_generator::{KeyGenerator, TruncatedUuidKeys};
use crate::services::operations::DialectOperations;
use std::time::Instant;

/// Generic abstract-query compiler
pub trait SqlCompiler: Send + Sync {
    fn compile(&self, query: &AbstractQuery) -> Result<Vec<CompiledStatement>, AdapterError>;
}

/// Plain SQL compiler: one INSERT per row, UPDATE/DELETE/SELECT with an
/// optional pass-through WHERE clause.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCompiler {
    ops: DialectOperations,
}

impl StandardCompiler {
    fn push_predicate(&self, sql: &mut String, params: &mut Vec<Value>, predicate: Option<&Predicate>) {
        if let Some(predicate) = predicate {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate.sql);
            params.extend(predicate.params.iter().cloned());
        }
    }
}

impl SqlCompiler for StandardCompiler {
    fn compile(&self, query: &AbstractQuery) -> Result<Vec<CompiledStatement>, AdapterError> {
        let table = self.ops.quote_name(&query.table.name);

        match &query.kind {
            QueryKind::Insert { fields, rows } => {
                if fields.is_empty() {
                    return Err(AdapterError::Compilation(format!(
                        "Insert into {} has no writable fields",
                        query.table.name
                    )));
                }
                if rows.is_empty() {
                    return Err(AdapterError::Compilation(format!(
                        "Insert into {} has no rows",
                        query.table.name
                    )));
                }

                let columns: Vec<String> = fields.iter().map(|f| self.ops.quote_name(&f.name)).collect();
                let placeholders = vec!["%s"; fields.len()].join(", ");
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table,
                    columns.join(", "),
                    placeholders
                );

                rows.iter()
                    .enumerate()
                    .map(|(i, row)| {
                        if row.len() != fields.len() {
                            return Err(AdapterError::Compilation(format!(
                                "Insert row {} has {} values for {} fields",
                                i,
                                row.len(),
                                fields.len()
                            )));
                        }
                        Ok(CompiledStatement::new(sql.clone(), row.clone()))
                    })
                    .collect()
            }
            QueryKind::Update { assignments } => {
                if assignments.is_empty() {
                    return Err(AdapterError::Compilation(format!(
                        "Update of {} has no assignments",
                        query.table.name
                    )));
                }

                let set: Vec<String> = assignments
                    .iter()
                    .map(|(field, _)| format!("{} = %s", self.ops.quote_name(&field.name)))
                    .collect();
                let mut sql = format!("UPDATE {} SET {}", table, set.join(", "));
                let mut params: Vec<Value> = assignments.iter().map(|(_, v)| v.clone()).collect();
                self.push_predicate(&mut sql, &mut params, query.predicate.as_ref());
                Ok(vec![CompiledStatement::new(sql, params)])
            }
            QueryKind::Delete => {
                let mut sql = format!("DELETE FROM {}", table);
                let mut params = Vec::new();
                self.push_predicate(&mut sql, &mut params, query.predicate.as_ref());
                Ok(vec![CompiledStatement::new(sql, params)])
            }
            QueryKind::Select { columns } => {
                let columns = if columns.is_empty() {
                    "*".to_string()
                } else {
                    columns
                        .iter()
                        .map(|c| self.ops.quote_name(c))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                let mut sql = format!("SELECT {} FROM {}", columns, table);
                let mut params = Vec::new();
                self.push_predicate(&mut sql, &mut params, query.predicate.as_ref());
                Ok(vec![CompiledStatement::new(sql, params)])
            }
        }
    }
}

/// Statements for one abstract query plus the keys minted for it
#[derive(Debug, Clone, Default)]
pub struct CompiledQuery {
    pub statements: Vec<CompiledStatement>,
    /// One synthetic key per inserted row, in row order
    pub keys: Vec<SyntheticKey>,
}

pub struct QueryCompiler {
    generic: Box<dyn SqlCompiler>,
    keys: Box<dyn KeyGenerator>,
}

impl QueryCompiler {
    pub fn new(generic: Box<dyn SqlCompiler>, keys: Box<dyn KeyGenerator>) -> Self {
        Self { generic, keys }
    }

    pub fn compile(&self, query: &AbstractQuery) -> Result<CompiledQuery, AdapterError> {
        let (fields, rows) = match &query.kind {
            QueryKind::Insert { fields, rows } => (fields, rows),
            _ => {
                return Ok(CompiledQuery {
                    statements: self.generic.compile(query)?,
                    keys: Vec::new(),
                })
            }
        };

        let Some(pk) = query.table.auto_key() else {
            return Ok(CompiledQuery {
                statements: self.generic.compile(query)?,
                keys: Vec::new(),
            });
        };

        if fields.iter().any(|f| f.name == pk.name) {
            return Err(AdapterError::Compilation(format!(
                "Auto key {}.{} is generated by the adapter and cannot be written",
                query.table.name, pk.name
            )));
        }

        let mut keyed_fields = Vec::with_capacity(fields.len() + 1);
        keyed_fields.push(pk.clone());
        keyed_fields.extend(fields.iter().cloned());

        let mut keys = Vec::with_capacity(rows.len());
        let keyed_rows = rows
            .iter()
            .map(|row| {
                let key = self.keys.next_key();
                keys.push(key);
                let mut keyed = Vec::with_capacity(row.len() + 1);
                keyed.push(Value::from(key));
                keyed.extend(row.iter().cloned());
                keyed
            })
            .collect();

        let keyed_query = AbstractQuery::insert(query.table.clone(), keyed_fields, keyed_rows);
        Ok(CompiledQuery {
            statements: self.generic.compile(&keyed_query)?,
            keys,
        })
    }

    /// Compile and run `query`, one statement at a time.
    ///
    /// Statements are independent; a failure part-way leaves the earlier ones applied.
    pub async fn execute(
        &self,
        conn: &mut ConnectionAdapter,
        query: &AbstractQuery,
    ) -> Result<QueryResult, AdapterError> {
        let start_time = Instant::now();
        let compiled = self.compile(query)?;
        tracing::debug!(
            kind = query.kind_name(),
            table = %query.table.name,
            statements = compiled.statements.len(),
            "compiled query"
        );

        for statement in &compiled.statements {
            conn.execute(&statement.sql, &statement.params).await?;
        }

        let rows = match query.kind {
            QueryKind::Select { .. } => conn.fetch_all().await?,
            _ => Vec::new(),
        };

        let row_count = match query.kind {
            QueryKind::Insert { .. } => compiled.statements.len(),
            _ => rows.len(),
        };

        let last_insert_id = compiled.keys.last().copied();
        if let Some(key) = last_insert_id {
            tracing::debug!(table = %query.table.name, %key, "reporting synthetic key as last insert id");
        }

        Ok(QueryResult {
            rows,
            row_count,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
            last_insert_id,
        })
    }
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self::new(Box::new(StandardCompiler::default()), Box::new(TruncatedUuidKeys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionSettings;
    use crate::models::{FieldSpec, FieldType, TableSpec};
    use crate::services::driver::MemoryEngine;
    use crate::services::key_generator::SequentialKeys;
    use crate::services::literal;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn orders() -> TableSpec {
        TableSpec::new(
            "orders",
            vec![
                FieldSpec::new("customer", FieldType::Text),
                FieldSpec::new("amount", FieldType::Decimal { precision: 10, scale: 2 }),
            ],
        )
    }

    fn users() -> TableSpec {
        TableSpec::new(
            "users",
            vec![FieldSpec::auto_key("id"), FieldSpec::new("name", FieldType::Text)],
        )
    }

    fn name_field() -> FieldSpec {
        FieldSpec::new("name", FieldType::Text)
    }

    #[test]
    fn test_insert_without_auto_key() {
        let table = orders();
        let query = AbstractQuery::insert_one(
            table.clone(),
            vec![
                (table.fields[0].clone(), Value::from("O'Brien")),
                (table.fields[1].clone(), Value::Float(12.5)),
            ],
        );
        let compiled = QueryCompiler::default().compile(&query).unwrap();
        assert!(compiled.keys.is_empty());
        assert_eq!(compiled.statements.len(), 1);

        let statement = &compiled.statements[0];
        assert_eq!(
            literal::prepare(&statement.sql, &statement.params).unwrap(),
            "INSERT INTO orders (customer, amount) VALUES ('O''Brien', 12.5)"
        );
    }

    #[test]
    fn test_insert_with_auto_key_prepends_generated_id() {
        let query = AbstractQuery::insert_one(users(), vec![(name_field(), Value::from("alice"))]);
        let compiled = QueryCompiler::default().compile(&query).unwrap();

        assert_eq!(compiled.keys.len(), 1);
        let statement = &compiled.statements[0];
        assert_eq!(statement.sql, "INSERT INTO users (id, name) VALUES (%s, %s)");
        assert_eq!(statement.params[0], Value::from(compiled.keys[0]));
        assert_eq!(statement.params[1], Value::from("alice"));
        assert_eq!(compiled.keys[0].to_string().len(), 18);
    }

    #[test]
    fn test_multi_row_insert_compiles_one_statement_per_row() {
        let query = AbstractQuery::insert(
            users(),
            vec![name_field()],
            vec![
                vec![Value::from("alice")],
                vec![Value::from("bob")],
                vec![Value::from("carol")],
            ],
        );
        let compiled = QueryCompiler::default().compile(&query).unwrap();
        assert_eq!(compiled.statements.len(), 3);
        for (statement, key) in compiled.statements.iter().zip(&compiled.keys) {
            assert_eq!(statement.params[0], Value::from(*key));
        }
        let distinct: HashSet<_> = compiled.keys.iter().collect();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn test_insert_with_no_fields_is_compilation_error() {
        let query = AbstractQuery::insert(orders(), vec![], vec![vec![]]);
        assert!(matches!(
            QueryCompiler::default().compile(&query),
            Err(AdapterError::Compilation(_))
        ));
    }

    #[test]
    fn test_insert_with_mismatched_row_is_compilation_error() {
        let table = orders();
        let query = AbstractQuery::insert(
            table.clone(),
            table.fields.clone(),
            vec![vec![Value::from("only one")]],
        );
        assert!(matches!(
            QueryCompiler::default().compile(&query),
            Err(AdapterError::Compilation(_))
        ));
    }

    #[test]
    fn test_writing_auto_key_explicitly_is_rejected() {
        let table = users();
        let query = AbstractQuery::insert_one(
            table.clone(),
            vec![(table.fields[0].clone(), Value::Int(1))],
        );
        assert!(QueryCompiler::default().compile(&query).is_err());
    }

    #[test]
    fn test_update_delete_select_pass_through() {
        let compiler = QueryCompiler::default();
        let generic = StandardCompiler::default();
        let predicate = DialectOperations.lookup("name", "exact", Value::from("alice")).unwrap();

        let queries = vec![
            AbstractQuery::update(users(), vec![(name_field(), Value::from("bob"))])
                .filter(predicate.clone()),
            AbstractQuery::delete(users()).filter(predicate.clone()),
            AbstractQuery::select(users(), vec!["id".to_string(), "name".to_string()])
                .filter(predicate),
        ];

        for query in &queries {
            let compiled = compiler.compile(query).unwrap();
            assert!(compiled.keys.is_empty());
            assert_eq!(compiled.statements, generic.compile(query).unwrap());
        }

        let update = compiler.compile(&queries[0]).unwrap();
        assert_eq!(update.statements[0].sql, "UPDATE users SET name = %s WHERE name = %s");
        assert_eq!(
            update.statements[0].params,
            vec![Value::from("bob"), Value::from("alice")]
        );
    }

    #[tokio::test]
    async fn test_execute_reports_generated_key_as_last_insert_id() {
        let engine = MemoryEngine::new();
        let mut conn = ConnectionAdapter::new(ConnectionSettings::default(), Arc::new(engine.connector()));
        let compiler = QueryCompiler::new(
            Box::new(StandardCompiler::default()),
            Box::new(SequentialKeys::with_seed(0, 482_910_337_201)),
        );

        let query = AbstractQuery::insert_one(users(), vec![(name_field(), Value::from("alice"))]);
        let result = compiler.execute(&mut conn, &query).await.unwrap();

        let key = result.last_insert_id.unwrap();
        assert_eq!(key.value(), 100_000_482_910_337_201);
        assert_eq!(result.row_count, 1);
        assert_eq!(
            engine.statements().last().map(String::as_str),
            Some("INSERT INTO users (id, name) VALUES (100000482910337201, 'alice')")
        );
    }

    #[tokio::test]
    async fn test_sequential_inserts_report_their_own_keys() {
        let engine = MemoryEngine::new();
        let mut conn = ConnectionAdapter::new(ConnectionSettings::default(), Arc::new(engine.connector()));
        let compiler = QueryCompiler::default();

        let mut seen = HashSet::new();
        for i in 0..50 {
            let query = AbstractQuery::insert_one(
                users(),
                vec![(name_field(), Value::from(format!("user{}", i)))],
            );
            let result = compiler.execute(&mut conn, &query).await.unwrap();
            let key = result.last_insert_id.unwrap();
            assert_eq!(key.to_string().len(), 18);
            assert!(seen.insert(key));

            let last = engine.statements().last().cloned().unwrap();
            assert!(last.starts_with(&format!("INSERT INTO users (id, name) VALUES ({}, ", key)));
        }
    }

    #[tokio::test]
    async fn test_execute_select_fetches_rows() {
        let engine = MemoryEngine::new();
        let mut conn = ConnectionAdapter::new(ConnectionSettings::default(), Arc::new(engine.connector()));
        let result = QueryCompiler::default()
            .execute(&mut conn, &AbstractQuery::select(orders(), vec![]))
            .await
            .unwrap();
        assert!(result.last_insert_id.is_none());
        assert_eq!(result.row_count, 0);
        assert_eq!(
            engine.statements().last().map(String::as_str),
            Some("SELECT * FROM orders")
        );
    }
}
