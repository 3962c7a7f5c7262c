// Schema emulation over the dialect's narrow DDL vocabulary.
//
// Only CREATE TABLE, ADD COLUMNS, DROP COLUMN and DROP TABLE exist. Requests
// for constraints the engine cannot enforce are accepted and ignored.
use crate::error::AdapterError;
use crate::models::{FieldSpec, TableSpec, Value};
use crate::services::connection::ConnectionAdapter;
use crate::services::features::DialectFeatures;
use crate::services::literal;
use crate::services::operations::DialectOperations;
use crate::services::type_mapper::{ImpalaTypes, TypeMapper};
use std::sync::Arc;

/// What `add_column` ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnChange {
    Added,
    /// The field was a many-to-many relation; its junction table was created
    JunctionCreated(String),
    /// The dialect cannot store the field; nothing was emitted
    Skipped,
}

#[derive(Clone)]
pub struct SchemaEmulator {
    types: Arc<dyn TypeMapper>,
    features: DialectFeatures,
    ops: DialectOperations,
}

impl SchemaEmulator {
    pub fn new(types: Arc<dyn TypeMapper>, features: DialectFeatures) -> Self {
        Self {
            types,
            features,
            ops: DialectOperations,
        }
    }

    pub fn features(&self) -> &DialectFeatures {
        &self.features
    }

    /// `<column> <type>` for a field, or None if the dialect cannot store it
    pub fn column_sql(&self, field: &FieldSpec) -> Option<String> {
        self.types
            .map_type(field)
            .map(|mapped| format!("{} {}", self.ops.quote_name(&field.name), mapped.type_text))
    }

    /// CREATE TABLE statement for this table alone
    pub fn table_sql(&self, table: &TableSpec) -> Result<String, AdapterError> {
        let columns: Vec<String> = table
            .fields
            .iter()
            .filter_map(|field| self.column_sql(field))
            .collect();
        if columns.is_empty() {
            return Err(AdapterError::Compilation(format!(
                "Table {} has no columns the dialect can store",
                table.name
            )));
        }
        Ok(format!(
            "CREATE TABLE {} ({})",
            self.ops.quote_name(&table.name),
            columns.join(", ")
        ))
    }

    /// Every CREATE TABLE `create_table` would run: the table first, then its
    /// auto-created junction tables depth-first.
    pub fn create_table_sql(&self, table: &TableSpec) -> Result<Vec<String>, AdapterError> {
        let mut statements = Vec::new();
        let mut pending = vec![table];
        while let Some(next) = pending.pop() {
            statements.push(self.table_sql(next)?);
            let junctions: Vec<&TableSpec> = next.junction_tables().collect();
            pending.extend(junctions.into_iter().rev());
        }
        Ok(statements)
    }

    pub async fn create_table(
        &self,
        conn: &mut ConnectionAdapter,
        table: &TableSpec,
    ) -> Result<(), AdapterError> {
        for sql in self.create_table_sql(table)? {
            tracing::info!("Creating table: {}", sql);
            conn.execute(&sql, &[]).await?;
        }
        Ok(())
    }

    pub async fn add_column(
        &self,
        conn: &mut ConnectionAdapter,
        table: &TableSpec,
        field: &FieldSpec,
    ) -> Result<ColumnChange, AdapterError> {
        if let Some(junction) = field.auto_created_junction() {
            self.create_table(conn, junction).await?;
            return Ok(ColumnChange::JunctionCreated(junction.name.clone()));
        }

        let Some(definition) = self.column_sql(field) else {
            tracing::debug!(
                table = %table.name,
                column = %field.name,
                "skipping column the dialect cannot store"
            );
            return Ok(ColumnChange::Skipped);
        };

        let sql = format!(
            "ALTER TABLE {} ADD COLUMNS ({})",
            self.ops.quote_name(&table.name),
            definition
        );
        tracing::info!("Adding column: {}", sql);
        conn.execute(&sql, &[]).await?;

        if self.features.connection_persists_old_columns {
            conn.close().await?;
        }

        Ok(ColumnChange::Added)
    }

    pub async fn drop_column(
        &self,
        conn: &mut ConnectionAdapter,
        table: &TableSpec,
        field: &FieldSpec,
    ) -> Result<(), AdapterError> {
        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.ops.quote_name(&table.name),
            self.ops.quote_name(&field.name)
        );
        tracing::info!("Dropping column: {}", sql);
        conn.execute(&sql, &[]).await
    }

    pub async fn drop_table(
        &self,
        conn: &mut ConnectionAdapter,
        table_name: &str,
    ) -> Result<(), AdapterError> {
        conn.execute(&self.ops.drop_table_sql(table_name), &[]).await
    }

    /// No-op: the engine has no uniqueness enforcement.
    pub fn alter_unique_together(
        &self,
        table: &TableSpec,
        _old: &[Vec<String>],
        _new: &[Vec<String>],
    ) {
        tracing::debug!(table = %table.name, "unique_together ignored");
    }

    /// No-op: the engine has no secondary indexes.
    pub fn alter_index_together(
        &self,
        table: &TableSpec,
        _old: &[Vec<String>],
        _new: &[Vec<String>],
    ) {
        tracing::debug!(table = %table.name, "index_together ignored");
    }

    /// Literal form of a default value
    pub fn quote_value(&self, value: &Value) -> String {
        literal::quote_value(value)
    }
}

impl Default for SchemaEmulator {
    fn default() -> Self {
        Self::new(Arc::new(ImpalaTypes), DialectFeatures::default())
    }
}
