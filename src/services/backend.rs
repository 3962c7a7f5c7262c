use crate::config::{Config, ConnectionSettings};
use crate::error::AdapterError;
use crate::models::{AbstractQuery, FieldSpec, QueryResult, TableSpec};
use crate::services::compiler::{QueryCompiler, StandardCompiler};
use crate::services::connection::ConnectionAdapter;
use crate::services::creation::{Confirmation, TestNamespaceLifecycle, DEFAULT_SETTLE_INTERVAL};
use crate::services::driver::Connector;
use crate::services::features::DialectFeatures;
use crate::services::key_generator::KeyGenerator;
use crate::services::operations::DialectOperations;
use crate::services::schema::{ColumnChange, SchemaEmulator};
use crate::services::type_mapper::{ImpalaTypes, TypeMapper};
use std::sync::Arc;
use std::time::Duration;

/// Backend for an Impala-style engine
///
/// Composes the connection, the key-emulating query compiler, schema
/// emulation and the test namespace lifecycle over one connector.
pub struct ImpalaBackend {
    connection: ConnectionAdapter,
    compiler: QueryCompiler,
    schema: SchemaEmulator,
    types: Arc<dyn TypeMapper>,
    features: DialectFeatures,
    settle_interval: Duration,
}

impl ImpalaBackend {
    pub fn new(settings: ConnectionSettings, connector: Arc<dyn Connector>) -> Self {
        let types: Arc<dyn TypeMapper> = Arc::new(ImpalaTypes);
        let features = DialectFeatures::impala();
        Self {
            connection: ConnectionAdapter::new(settings, connector),
            compiler: QueryCompiler::default(),
            schema: SchemaEmulator::new(types.clone(), features),
            types,
            features,
            settle_interval: DEFAULT_SETTLE_INTERVAL,
        }
    }

    /// Backend configured from `config`: key strategy, column recycling and settle interval
    pub fn from_config(config: &Config, connector: Arc<dyn Connector>) -> Self {
        let dialect = &config.dialect;
        tracing::info!(
            "Configuring backend for {} (keys: {:?})",
            config.database.masked(),
            dialect.key_strategy
        );
        Self::new(config.database.clone(), connector)
            .with_key_generator(dialect.key_strategy.generator(dialect.node_id))
            .with_features(
                DialectFeatures::impala()
                    .with_persisted_columns(dialect.connection_persists_old_columns),
            )
            .with_settle_interval(Duration::from_millis(dialect.settle_interval_ms))
    }

    pub fn with_type_mapper(mut self, types: Arc<dyn TypeMapper>) -> Self {
        self.schema = SchemaEmulator::new(types.clone(), self.features);
        self.types = types;
        self
    }

    pub fn with_key_generator(mut self, keys: Box<dyn KeyGenerator>) -> Self {
        self.compiler = QueryCompiler::new(Box::new(StandardCompiler::default()), keys);
        self
    }

    pub fn with_features(mut self, features: DialectFeatures) -> Self {
        self.schema = SchemaEmulator::new(self.types.clone(), features);
        self.features = features;
        self
    }

    pub fn with_settle_interval(mut self, interval: Duration) -> Self {
        self.settle_interval = interval;
        self
    }

    pub fn features(&self) -> &DialectFeatures {
        &self.features
    }

    pub fn ops(&self) -> &DialectOperations {
        self.connection.ops()
    }

    pub fn schema(&self) -> &SchemaEmulator {
        &self.schema
    }

    pub fn connection(&mut self) -> &mut ConnectionAdapter {
        &mut self.connection
    }

    pub async fn execute_query(&mut self, query: &AbstractQuery) -> Result<QueryResult, AdapterError> {
        self.compiler.execute(&mut self.connection, query).await
    }

    pub async fn create_table(&mut self, table: &TableSpec) -> Result<(), AdapterError> {
        self.schema.create_table(&mut self.connection, table).await
    }

    pub async fn add_column(
        &mut self,
        table: &TableSpec,
        field: &FieldSpec,
    ) -> Result<ColumnChange, AdapterError> {
        self.schema.add_column(&mut self.connection, table, field).await
    }

    pub async fn drop_column(&mut self, table: &TableSpec, field: &FieldSpec) -> Result<(), AdapterError> {
        self.schema.drop_column(&mut self.connection, table, field).await
    }

    pub async fn drop_table(&mut self, table_name: &str) -> Result<(), AdapterError> {
        self.schema.drop_table(&mut self.connection, table_name).await
    }

    pub fn alter_unique_together(&self, table: &TableSpec, old: &[Vec<String>], new: &[Vec<String>]) {
        self.schema.alter_unique_together(table, old, new);
    }

    pub fn alter_index_together(&self, table: &TableSpec, old: &[Vec<String>], new: &[Vec<String>]) {
        self.schema.alter_index_together(table, old, new);
    }

    pub async fn is_usable(&mut self) -> bool {
        self.connection.is_usable().await
    }

    pub async fn close(&mut self) -> Result<(), AdapterError> {
        self.connection.close().await
    }

    /// Lifecycle for this backend's test namespace
    pub fn test_lifecycle(&self, confirmation: Box<dyn Confirmation>) -> TestNamespaceLifecycle {
        TestNamespaceLifecycle::new(
            self.connection.settings().clone(),
            self.connection.connector(),
            self.schema.clone(),
            confirmation,
        )
        .with_settle_interval(self.settle_interval)
    }
}

impl std::fmt::Debug for ImpalaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImpalaBackend")
            .field("database", &self.connection.settings().masked())
            .field("features", &self.features)
            .field("settle_interval", &self.settle_interval)
            .finish()
    }
}
